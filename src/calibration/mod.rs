//! Split-conformal tail calibration.
//!
//! For each bucket, residuals `r = max(0, true_latency - predicted_latency)`
//! are collected on a calibration sample and `qhat` is their `alpha`
//! quantile, taking the higher order statistic whenever the quantile falls
//! between two samples. Under exchangeability of calibration and serving data:
//!
//!   P(true_latency <= predicted_latency + qhat_bucket) >= alpha
//!
//! marginally per bucket. It is not a joint guarantee across buckets and does
//! not survive a shift in the serving feature distribution.
//!
//! Residuals are clipped at zero, so only under-prediction is corrected.

pub mod engine;
pub mod ground_truth;

use crate::action::Action;
use crate::errors::{PredictorError, PredictorResult};
use std::collections::BTreeMap;
use std::path::Path;

pub const DEFAULT_ALPHA: f64 = 0.95;

/// Persisted per-bucket quantile offsets.
///
/// File form: `{"alpha": 0.95, "qhat": {"edge:med": 7.1, ...}}` plus the optional
/// `generated_at` and `samples` fields written by the calibration run.
/// Immutable once loaded; the service replaces it wholesale on reload.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConformalTable {
    pub alpha: f64,
    pub qhat: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub samples: BTreeMap<String, usize>,
}

impl ConformalTable {
    /// Table with no buckets: every lookup misses and takes the default offset.
    pub fn empty(alpha: f64) -> Self {
        Self {
            alpha,
            qhat: BTreeMap::new(),
            generated_at: None,
            samples: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn lookup(&self, action: Action) -> Option<f64> {
        self.qhat.get(&action.bucket_key()).copied()
    }

    /// Reject tables that would break the bound invariants.
    pub fn validate(&self) -> PredictorResult<()> {
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(PredictorError::Parse(format!(
                "alpha must be in (0, 1), got {}",
                self.alpha
            )));
        }
        for (key, q) in &self.qhat {
            if !q.is_finite() || *q < 0.0 {
                return Err(PredictorError::Parse(format!(
                    "qhat[{key}] must be finite and >= 0, got {q}"
                )));
            }
        }
        Ok(())
    }

    /// Load and validate. A missing file is `CalibrationTableMissing`;
    /// callers decide whether that is fatal.
    pub fn load(path: &Path) -> PredictorResult<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PredictorError::CalibrationTableMissing(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let table: Self = serde_json::from_str(&raw)?;
        table.validate()?;
        Ok(table)
    }

    /// Write via a sibling temp file and rename, so readers never see a torn file.
    pub fn save(&self, path: &Path) -> PredictorResult<()> {
        self.validate()?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// Empirical `q` quantile, taking the higher neighbour when the rank is fractional.
/// Returns 0.0 for an empty slice.
pub fn quantile_higher(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let rank = (q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64).ceil() as usize;
    sorted[rank.min(sorted.len() - 1)]
}
