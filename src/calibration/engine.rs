use crate::action::{parse_action, Action};
use crate::adjust::adjust;
use crate::base::BaseModel;
use crate::calibration::ground_truth::{Draw, GroundTruthSampler};
use crate::calibration::{quantile_higher, ConformalTable, DEFAULT_ALPHA};
use crate::errors::{PredictorError, PredictorResult};
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// Actions calibrated by default. Names are parsed exactly as in serving.
pub const DEFAULT_ACTIONS: [&str; 5] = ["local:med", "edge1:low", "edge1:med", "edge1:high", "cloud1:low"];

#[derive(Debug, Clone)]
pub struct CalibrationConfig {
    pub samples: usize,
    pub seed: u64,
    pub alpha: f64,
    /// Fraction of each bucket's residuals kept out of the quantile and used
    /// to measure empirical coverage. 0 disables the split.
    pub holdout: f64,
    pub actions: SmallVec<[Action; 8]>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            samples: 8000,
            seed: 7,
            alpha: DEFAULT_ALPHA,
            holdout: 0.0,
            actions: DEFAULT_ACTIONS.iter().map(|a| parse_action(a)).collect(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct BucketSummary {
    pub bucket: String,
    pub calibration_n: usize,
    pub holdout_n: usize,
    pub qhat: f64,
    /// Share of hold-out points with `true <= pred + qhat`.
    pub holdout_coverage: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct CalibrationReport {
    pub table: ConformalTable,
    pub buckets: Vec<BucketSummary>,
}

/// Run one offline calibration pass against `model`.
///
/// Each draw is predicted once by the base model (the base is action-agnostic),
/// then adjusted per action with the same transform serving uses. Actions that
/// share a bucket pool their residuals.
pub async fn run_calibration(
    model: &dyn BaseModel,
    config: &CalibrationConfig,
) -> PredictorResult<CalibrationReport> {
    if !(config.alpha > 0.0 && config.alpha < 1.0) {
        return Err(PredictorError::Config(format!("alpha must be in (0, 1), got {}", config.alpha)));
    }
    if !(0.0..1.0).contains(&config.holdout) {
        return Err(PredictorError::Config(format!("holdout must be in [0, 1), got {}", config.holdout)));
    }

    tracing::info!(
        model = model.name(),
        samples = config.samples,
        seed = config.seed,
        alpha = config.alpha,
        actions = config.actions.len(),
        "calibration started"
    );

    let draws = GroundTruthSampler::new(config.seed).draws(config.samples);

    let mut residuals: BTreeMap<String, Vec<f64>> = config
        .actions
        .iter()
        .map(|a| (a.bucket_key(), Vec::with_capacity(config.samples)))
        .collect();

    for draw in &draws {
        let base = model.predict_base(&draw.features).await?;
        for &action in &config.actions {
            let r = residual(draw, action, base.latency_ms, base.energy_j);
            if let Some(bucket) = residuals.get_mut(&action.bucket_key()) {
                bucket.push(r);
            }
        }
    }

    let mut table = ConformalTable::empty(config.alpha);
    table.generated_at = Some(chrono::Utc::now().to_rfc3339());
    let mut buckets = Vec::with_capacity(residuals.len());

    for (key, resid) in residuals {
        let summary = summarize(&key, &resid, config.alpha, config.holdout);
        tracing::info!(
            bucket = %key,
            qhat = summary.qhat,
            n = summary.calibration_n,
            coverage = ?summary.holdout_coverage,
            "bucket calibrated"
        );
        table.qhat.insert(key.clone(), summary.qhat);
        table.samples.insert(key, summary.calibration_n);
        buckets.push(summary);
    }

    Ok(CalibrationReport { table, buckets })
}

/// One-sided residual: only under-prediction counts.
#[inline]
fn residual(draw: &Draw, action: Action, base_latency_ms: f64, base_energy_j: f64) -> f64 {
    let predicted = adjust(base_latency_ms, base_energy_j, &draw.features, action);
    (draw.true_latency_ms(action) - predicted.latency_ms).max(0.0)
}

fn summarize(key: &str, resid: &[f64], alpha: f64, holdout: f64) -> BucketSummary {
    let holdout_n = (resid.len() as f64 * holdout).floor() as usize;
    let (calib, held) = resid.split_at(resid.len() - holdout_n);
    let qhat = quantile_higher(calib, alpha);

    let holdout_coverage = if held.is_empty() {
        None
    } else {
        let covered = held.iter().filter(|&&r| r <= qhat).count();
        Some(covered as f64 / held.len() as f64)
    };

    BucketSummary {
        bucket: key.to_string(),
        calibration_n: calib.len(),
        holdout_n: held.len(),
        qhat,
        holdout_coverage,
    }
}
