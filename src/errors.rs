/// Domain-specific error types for the predictor.
/// The service must:
/// - Reject a single malformed request without affecting others
/// - Surface base model failures to the caller, never a silent default
/// - Keep serving on a missing calibration table (degraded mode)
#[derive(Debug, thiserror::Error)]
pub enum PredictorError {
    #[error("invalid feature vector: {0}")]
    InvalidFeatureVector(String),

    #[error("base model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("calibration table missing: {0}")]
    CalibrationTableMissing(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for PredictorError {
    fn from(e: reqwest::Error) -> Self {
        PredictorError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for PredictorError {
    fn from(e: serde_json::Error) -> Self {
        PredictorError::Parse(e.to_string())
    }
}

impl From<std::io::Error> for PredictorError {
    fn from(e: std::io::Error) -> Self {
        PredictorError::Io(e.to_string())
    }
}

pub type PredictorResult<T> = Result<T, PredictorError>;
