use crate::action::Action;
use crate::features::FeatureVector;

/// Wire request: `{"features": [7 floats], "action": "edge1:high" | null}`.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct PredictRequest {
    pub features: Vec<f64>,
    #[serde(default)]
    pub action: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
pub struct BatchRequest {
    pub requests: Vec<serde_json::Value>,
}

/// Boundary check result. Only `Accepted` reaches the service.
#[derive(Debug, Clone)]
pub enum Admission {
    Accepted { features: FeatureVector, action: Action },
    Rejected { reason: String },
}

impl Admission {
    pub fn admit(req: &PredictRequest) -> Self {
        match FeatureVector::validate(&req.features) {
            Ok(features) => Admission::Accepted {
                features,
                action: Action::from_request(req.action.as_deref()),
            },
            Err(e) => Admission::Rejected { reason: e.to_string() },
        }
    }

    /// Admit an untyped JSON item, as found inside a batch.
    pub fn from_json(value: serde_json::Value) -> Self {
        match serde_json::from_value::<PredictRequest>(value) {
            Ok(req) => Self::admit(&req),
            Err(e) => Admission::Rejected {
                reason: format!("invalid feature vector: malformed request: {e}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Kind, Tier};

    #[test]
    fn test_accepts_well_formed() {
        let v = serde_json::json!({
            "features": [50.0, 20.0, 0.01, 0.4, 0.9, 256.0, 150.0],
            "action": "edge1:high"
        });
        match Admission::from_json(v) {
            Admission::Accepted { features, action } => {
                assert_eq!(features.edge_cpu, 0.9);
                assert_eq!(action, Action::new(Kind::Edge, Tier::High));
            }
            Admission::Rejected { reason } => panic!("rejected: {reason}"),
        }
    }

    #[test]
    fn test_null_action_is_default_bucket() {
        let v = serde_json::json!({ "features": [50, 20, 0.01, 0.4, 0.5, 256, 150], "action": null });
        assert!(matches!(
            Admission::from_json(v),
            Admission::Accepted { action, .. } if action == Action::default()
        ));
    }

    #[test]
    fn test_rejects_bad_shapes() {
        for v in [
            serde_json::json!({ "features": [1, 2, 3] }),
            serde_json::json!({ "features": ["a", 2, 3, 4, 5, 6, 7] }),
            serde_json::json!({ "action": "edge:med" }),
            serde_json::json!({ "features": [50, 20, 0.01, 0.4, 1.5, 256, 150] }),
        ] {
            assert!(matches!(Admission::from_json(v), Admission::Rejected { .. }));
        }
    }
}
