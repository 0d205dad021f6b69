use crate::action::Action;
use crate::adjust::adjust;
use crate::base::BaseModel;
use crate::calibration::{ConformalTable, DEFAULT_ALPHA};
use crate::config::BoundStrategy;
use crate::errors::{PredictorError, PredictorResult};
use crate::features::FeatureVector;
use arc_swap::ArcSwap;
use portable_atomic::{AtomicU64, Ordering};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// One-sided 95% standard-normal quantile used by the parametric bound.
pub const PARAMETRIC_Z: f64 = 1.645;

/// Response of a prediction. `p95_conformal_ms >= mu_latency_ms` always.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PredictionResult {
    pub mu_latency_ms: f64,
    pub var_latency: f64,
    pub mu_energy_j: f64,
    pub var_energy: f64,
    pub p95_conformal_ms: f64,
}

/// Caller-side SLO check on a calibrated bound.
#[inline]
pub fn slo_violation(result: &PredictionResult, slo_p95_ms: f64) -> bool {
    result.p95_conformal_ms > slo_p95_ms
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TableSource {
    /// Loaded from the calibration file.
    File,
    /// No usable file; every bucket takes the default offset.
    Fallback,
}

/// Immutable table snapshot. Replaced whole on reload, never mutated.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TableSnapshot {
    pub version: u64,
    pub source: TableSource,
    pub table: ConformalTable,
}

/// Lock-free counters. Relaxed ordering is fine: monotonic stats only.
#[derive(Debug, Default)]
pub struct ServiceCounters {
    pub requests: AtomicU64,
    pub rejected: AtomicU64,
    pub model_failures: AtomicU64,
    pub default_offset_used: AtomicU64,
    pub reloads: AtomicU64,
}

/// Online predictor. Stateless per request: reads the base model and the
/// current table snapshot, writes nothing but counters.
pub struct PredictionService {
    model: Arc<dyn BaseModel>,
    strategy: BoundStrategy,
    default_qhat_ms: f64,
    base_timeout: Duration,
    table_path: PathBuf,
    table: ArcSwap<TableSnapshot>,
    pub counters: ServiceCounters,
}

impl PredictionService {
    /// Build the service and load the table. A missing or unreadable table
    /// puts the service in degraded mode instead of failing start-up.
    pub fn new(
        model: Arc<dyn BaseModel>,
        strategy: BoundStrategy,
        default_qhat_ms: f64,
        base_timeout: Duration,
        table_path: &Path,
    ) -> Self {
        let snapshot = match ConformalTable::load(table_path) {
            Ok(table) => {
                tracing::info!(
                    path = %table_path.display(),
                    alpha = table.alpha,
                    buckets = table.qhat.len(),
                    "conformal table loaded"
                );
                TableSnapshot { version: 1, source: TableSource::File, table }
            }
            Err(e) => {
                match &e {
                    PredictorError::CalibrationTableMissing(_) => tracing::warn!(
                        error = %e,
                        default_qhat_ms,
                        "degraded mode: no calibration table, using default offset"
                    ),
                    _ => tracing::error!(
                        error = %e,
                        default_qhat_ms,
                        "degraded mode: calibration table unusable, using default offset"
                    ),
                }
                TableSnapshot {
                    version: 1,
                    source: TableSource::Fallback,
                    table: ConformalTable::empty(DEFAULT_ALPHA),
                }
            }
        };

        Self {
            model,
            strategy,
            default_qhat_ms,
            base_timeout,
            table_path: table_path.to_path_buf(),
            table: ArcSwap::from_pointee(snapshot),
            counters: ServiceCounters::default(),
        }
    }

    #[inline]
    pub fn strategy(&self) -> BoundStrategy {
        self.strategy
    }

    #[inline]
    pub fn model_name(&self) -> &'static str {
        self.model.name()
    }

    /// Current snapshot. Holders keep a consistent view even across a reload.
    #[inline]
    pub fn snapshot(&self) -> Arc<TableSnapshot> {
        self.table.load_full()
    }

    /// Re-read the table file and publish it atomically. On failure the
    /// active snapshot stays in place.
    pub fn reload(&self) -> PredictorResult<Arc<TableSnapshot>> {
        let table = ConformalTable::load(&self.table_path)?;
        let version = self.table.load().version + 1;
        let snapshot = Arc::new(TableSnapshot { version, source: TableSource::File, table });
        self.table.store(snapshot.clone());
        self.counters.reloads.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            version,
            buckets = snapshot.table.qhat.len(),
            alpha = snapshot.table.alpha,
            "conformal table reloaded"
        );
        Ok(snapshot)
    }

    /// Base model -> adjustment -> bound.
    pub async fn predict(
        &self,
        features: &FeatureVector,
        action: Action,
    ) -> PredictorResult<PredictionResult> {
        self.counters.requests.fetch_add(1, Ordering::Relaxed);

        let base = match tokio::time::timeout(self.base_timeout, self.model.predict_base(features)).await {
            Ok(Ok(b)) if b.latency_ms.is_finite() && b.energy_j.is_finite() => b,
            Ok(Ok(b)) => {
                return Err(self.model_failure(PredictorError::ModelUnavailable(format!(
                    "non-finite base output: latency={} energy={}",
                    b.latency_ms, b.energy_j
                ))));
            }
            Ok(Err(e)) => {
                let e = match e {
                    PredictorError::ModelUnavailable(_) => e,
                    other => PredictorError::ModelUnavailable(other.to_string()),
                };
                return Err(self.model_failure(e));
            }
            Err(_) => {
                return Err(self.model_failure(PredictorError::ModelUnavailable(format!(
                    "{} timed out after {:?}",
                    self.model.name(),
                    self.base_timeout
                ))));
            }
        };

        let adj = adjust(base.latency_ms, base.energy_j, features, action);

        let p95 = match self.strategy {
            BoundStrategy::Conformal => adj.latency_ms + self.qhat_for(action),
            BoundStrategy::Parametric => adj.latency_ms + PARAMETRIC_Z * adj.var_latency.sqrt(),
        };

        Ok(PredictionResult {
            mu_latency_ms: adj.latency_ms,
            var_latency: adj.var_latency,
            mu_energy_j: adj.energy_j,
            var_energy: adj.var_energy,
            p95_conformal_ms: p95,
        })
    }

    /// Offset for the action's bucket; unseen buckets take the default.
    fn qhat_for(&self, action: Action) -> f64 {
        match self.table.load().table.lookup(action) {
            Some(q) => q,
            None => {
                self.counters.default_offset_used.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(bucket = %action, "bucket not in table, default offset");
                self.default_qhat_ms
            }
        }
    }

    fn model_failure(&self, e: PredictorError) -> PredictorError {
        self.counters.model_failures.fetch_add(1, Ordering::Relaxed);
        tracing::error!(model = self.model.name(), error = %e, "base model call failed");
        e
    }
}
