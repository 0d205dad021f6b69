pub mod remote;
pub mod synthetic;

use crate::errors::PredictorResult;
use crate::features::FeatureVector;
use futures_util::future::BoxFuture;

/// Action-agnostic point prediction from a base regression model.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BasePrediction {
    pub latency_ms: f64,
    pub energy_j: f64,
}

/// All base model backends implement this trait.
/// predict_base() must be deterministic for a fixed model artifact.
/// Send + Sync required for sharing across request tasks.
pub trait BaseModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Map a feature vector to `(latency_ms, energy_j)`.
    /// Any backend failure is `PredictorError::ModelUnavailable`.
    fn predict_base<'a>(
        &'a self,
        features: &'a FeatureVector,
    ) -> BoxFuture<'a, PredictorResult<BasePrediction>>;
}
