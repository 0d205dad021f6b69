use crate::base::{BaseModel, BasePrediction};
use crate::errors::PredictorResult;
use crate::features::FeatureVector;
use futures_util::future::{self, BoxFuture, FutureExt};

/// Closed-form latency/energy model of an offload over a shared uplink.
///
/// latency = max(5, tx + prop + queue + compute)
///   tx      = input_kb * 8 / (bw_mbps * 1e3) * 1e3
///   prop    = rtt_ms / 2
///   queue   = edge_cpu^3 * 80 + loss * 8000
///   compute = input_kb^0.6 * (0.3 + 0.7 * edge_cpu) * 0.8
///
/// energy = max(0.05, device_cpu * 0.8 + input_kb / 2048 * 0.2 + input_kb / bw_mbps * 0.5 + loss * 2)
///
/// This is the noiseless generator the learned models were fitted to, so it
/// doubles as an in-process stand-in for them.
pub struct SyntheticBaseModel;

pub const MIN_BASE_LATENCY_MS: f64 = 5.0;
pub const MIN_BASE_ENERGY_J: f64 = 0.05;

impl SyntheticBaseModel {
    pub fn new() -> Self {
        Self
    }

    /// Sum of the latency terms before the floor.
    #[inline]
    pub fn unfloored_latency_ms(f: &FeatureVector) -> f64 {
        let tx = (f.input_kb * 8.0 / (f.bw_mbps * 1e3)) * 1e3;
        let prop = f.rtt_ms * 0.5;
        let queue = f.edge_cpu.powi(3) * 80.0 + f.loss * 8000.0;
        let compute = f.input_kb.powf(0.6) * (0.3 + f.edge_cpu * 0.7) * 0.8;
        tx + prop + queue + compute
    }

    #[inline]
    pub fn latency_ms(f: &FeatureVector) -> f64 {
        Self::unfloored_latency_ms(f).max(MIN_BASE_LATENCY_MS)
    }

    #[inline]
    pub fn energy_j(f: &FeatureVector) -> f64 {
        let e_cpu = f.device_cpu * 0.8 + (f.input_kb / 2048.0) * 0.2;
        let e_tx = (f.input_kb / f.bw_mbps) * 0.5 + f.loss * 2.0;
        (e_cpu + e_tx).max(MIN_BASE_ENERGY_J)
    }

    #[inline]
    pub fn evaluate(f: &FeatureVector) -> BasePrediction {
        BasePrediction {
            latency_ms: Self::latency_ms(f),
            energy_j: Self::energy_j(f),
        }
    }
}

impl Default for SyntheticBaseModel {
    fn default() -> Self {
        Self::new()
    }
}

impl BaseModel for SyntheticBaseModel {
    #[inline]
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn predict_base<'a>(
        &'a self,
        features: &'a FeatureVector,
    ) -> BoxFuture<'a, PredictorResult<BasePrediction>> {
        future::ready(Ok(Self::evaluate(features))).boxed()
    }
}
