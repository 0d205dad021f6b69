use crate::errors::{PredictorError, PredictorResult};

/// Number of features. Order is fixed and shared with every base model backend.
pub const FEATURE_DIM: usize = 7;

/// Uniform sampling ranges for synthetic calibration draws, in feature order.
pub const SAMPLE_RANGES: [(f64, f64); FEATURE_DIM] = [
    (2.0, 120.0),   // bw_mbps
    (5.0, 120.0),   // rtt_ms
    (0.0, 0.02),    // loss
    (0.05, 0.95),   // device_cpu
    (0.05, 0.95),   // edge_cpu
    (16.0, 2048.0), // input_kb
    (60.0, 240.0),  // slo_p95_ms
];

/// Network/device context for one request. Stack-allocated, Copy.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
#[repr(C)]
pub struct FeatureVector {
    pub bw_mbps: f64,
    pub rtt_ms: f64,
    pub loss: f64,
    pub device_cpu: f64,
    pub edge_cpu: f64,
    pub input_kb: f64,
    pub slo_p95_ms: f64,
}

impl FeatureVector {
    /// Wire order: `[bw, rtt, loss, device_cpu, edge_cpu, input_kb, slo_p95_ms]`.
    #[inline]
    pub fn to_array(&self) -> [f64; FEATURE_DIM] {
        [
            self.bw_mbps,
            self.rtt_ms,
            self.loss,
            self.device_cpu,
            self.edge_cpu,
            self.input_kb,
            self.slo_p95_ms,
        ]
    }

    /// Build without domain checks. Used for synthetic draws already inside range.
    #[inline]
    pub fn from_array(v: [f64; FEATURE_DIM]) -> Self {
        Self {
            bw_mbps: v[0],
            rtt_ms: v[1],
            loss: v[2],
            device_cpu: v[3],
            edge_cpu: v[4],
            input_kb: v[5],
            slo_p95_ms: v[6],
        }
    }

    /// Arity and domain validation at the service boundary.
    pub fn validate(raw: &[f64]) -> PredictorResult<Self> {
        let arr: [f64; FEATURE_DIM] = raw.try_into().map_err(|_| {
            PredictorError::InvalidFeatureVector(format!(
                "expected {FEATURE_DIM} features, got {}",
                raw.len()
            ))
        })?;

        if let Some(i) = arr.iter().position(|x| !x.is_finite()) {
            return Err(PredictorError::InvalidFeatureVector(format!(
                "feature {} ({}) is not finite",
                i,
                FEATURE_NAMES[i]
            )));
        }

        let f = Self::from_array(arr);
        check(f.bw_mbps > 0.0, "bw_mbps must be > 0")?;
        check(f.rtt_ms >= 0.0, "rtt_ms must be >= 0")?;
        check((0.0..=1.0).contains(&f.loss), "loss must be in [0, 1]")?;
        check((0.0..=1.0).contains(&f.device_cpu), "device_cpu must be in [0, 1]")?;
        check((0.0..=1.0).contains(&f.edge_cpu), "edge_cpu must be in [0, 1]")?;
        check(f.input_kb > 0.0, "input_kb must be > 0")?;
        check(f.slo_p95_ms > 0.0, "slo_p95_ms must be > 0")?;
        Ok(f)
    }
}

pub const FEATURE_NAMES: [&str; FEATURE_DIM] = [
    "bw_mbps",
    "rtt_ms",
    "loss",
    "device_cpu",
    "edge_cpu",
    "input_kb",
    "slo_p95_ms",
];

#[inline]
fn check(ok: bool, msg: &str) -> PredictorResult<()> {
    if ok {
        Ok(())
    } else {
        Err(PredictorError::InvalidFeatureVector(msg.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: [f64; 7] = [50.0, 20.0, 0.01, 0.4, 0.5, 256.0, 150.0];

    #[test]
    fn test_array_order_roundtrip() {
        let f = FeatureVector::validate(&GOOD).unwrap();
        assert_eq!(f.edge_cpu, 0.5);
        assert_eq!(f.to_array(), GOOD);
    }

    #[test]
    fn test_wrong_arity_rejected() {
        let err = FeatureVector::validate(&GOOD[..6]).unwrap_err();
        assert!(matches!(err, PredictorError::InvalidFeatureVector(_)));
        let mut long = GOOD.to_vec();
        long.push(1.0);
        assert!(FeatureVector::validate(&long).is_err());
    }

    #[test]
    fn test_out_of_domain_rejected() {
        let mut bad = GOOD;
        bad[4] = 1.2;
        assert!(FeatureVector::validate(&bad).is_err());

        let mut bad = GOOD;
        bad[0] = 0.0;
        assert!(FeatureVector::validate(&bad).is_err());

        let mut bad = GOOD;
        bad[6] = f64::NAN;
        let msg = FeatureVector::validate(&bad).unwrap_err().to_string();
        assert!(msg.contains("slo_p95_ms"), "{msg}");
    }

    #[test]
    fn test_sample_ranges_are_valid_inputs() {
        let lo = SAMPLE_RANGES.map(|(lo, _)| lo);
        let hi = SAMPLE_RANGES.map(|(_, hi)| hi);
        // loss lower bound is 0, which is in domain
        assert!(FeatureVector::validate(&lo).is_ok());
        assert!(FeatureVector::validate(&hi).is_ok());
    }
}
