use crate::errors::{PredictorError, PredictorResult};
use std::path::PathBuf;
use std::time::Duration;

/// How the service turns a point prediction into a tail bound.
/// Chosen once at start-up; a process never mixes the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundStrategy {
    /// `mu + qhat[bucket]`: split-conformal, distribution-free, marginal per bucket.
    Conformal,
    /// `mu + 1.645 * sqrt(var)`: assumes Gaussian residuals.
    Parametric,
}

impl std::str::FromStr for BoundStrategy {
    type Err = PredictorError;

    fn from_str(s: &str) -> PredictorResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "conformal" => Ok(Self::Conformal),
            "parametric" => Ok(Self::Parametric),
            other => Err(PredictorError::Config(format!(
                "BOUND_STRATEGY: expected conformal|parametric, got {other:?}"
            ))),
        }
    }
}

impl std::fmt::Display for BoundStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Conformal => write!(f, "conformal"),
            Self::Parametric => write!(f, "parametric"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseModelKind {
    Synthetic,
    Remote,
}

impl std::str::FromStr for BaseModelKind {
    type Err = PredictorError;

    fn from_str(s: &str) -> PredictorResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "synthetic" => Ok(Self::Synthetic),
            "remote" => Ok(Self::Remote),
            other => Err(PredictorError::Config(format!(
                "BASE_MODEL: expected synthetic|remote, got {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_port: u16,
    pub conformal_table_path: PathBuf,
    pub bound_strategy: BoundStrategy,
    pub default_qhat_ms: f64,
    pub base_model: BaseModelKind,
    pub base_model_url: String,
    pub base_model_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> PredictorResult<Self> {
        dotenvy::dotenv().ok();

        let server_port = env_var_or("SERVER_PORT", "8000")
            .parse::<u16>()
            .map_err(|e| PredictorError::Config(format!("SERVER_PORT: {e}")))?;

        let default_qhat_ms = env_var_or("DEFAULT_QHAT_MS", "10.0")
            .parse::<f64>()
            .map_err(|e| PredictorError::Config(format!("DEFAULT_QHAT_MS: {e}")))?;
        if !default_qhat_ms.is_finite() || default_qhat_ms < 0.0 {
            return Err(PredictorError::Config(format!(
                "DEFAULT_QHAT_MS must be a non-negative number, got {default_qhat_ms}"
            )));
        }

        let timeout_ms = env_var_or("BASE_MODEL_TIMEOUT_MS", "500")
            .parse::<u64>()
            .map_err(|e| PredictorError::Config(format!("BASE_MODEL_TIMEOUT_MS: {e}")))?;

        Ok(Self {
            server_port,
            conformal_table_path: PathBuf::from(env_var_or(
                "CONFORMAL_TABLE_PATH",
                "models/conformal.json",
            )),
            bound_strategy: env_var_or("BOUND_STRATEGY", "conformal").parse()?,
            default_qhat_ms,
            base_model: env_var_or("BASE_MODEL", "synthetic").parse()?,
            base_model_url: env_var_or("BASE_MODEL_URL", "http://127.0.0.1:8500"),
            base_model_timeout: Duration::from_millis(timeout_ms),
        })
    }
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
