use crate::action::Action;
use crate::adjust::adjust;
use crate::base::synthetic::{SyntheticBaseModel, MIN_BASE_LATENCY_MS};
use crate::features::{FeatureVector, SAMPLE_RANGES};
use rand::distributions::Distribution;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use statrs::distribution::Normal;

/// Std-dev (ms) of the queueing noise the synthetic world adds on top of the
/// closed-form latency.
pub const LATENCY_NOISE_SD_MS: f64 = 5.0;

/// One calibration context: a feature draw plus its realised noise.
/// The noise belongs to the context, so every action evaluated on the
/// same draw sees the same world.
#[derive(Debug, Clone, Copy)]
pub struct Draw {
    pub features: FeatureVector,
    pub noise_ms: f64,
}

impl Draw {
    /// Realised latency if `action` had been taken in this context.
    #[inline]
    pub fn true_latency_ms(&self, action: Action) -> f64 {
        let base = (SyntheticBaseModel::unfloored_latency_ms(&self.features) + self.noise_ms)
            .max(MIN_BASE_LATENCY_MS);
        adjust(base, 1.0, &self.features, action).latency_ms
    }
}

/// Seeded sampler over the synthetic feature space.
pub struct GroundTruthSampler {
    rng: ChaCha8Rng,
    noise: Normal,
}

impl GroundTruthSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            noise: Normal::new(0.0, LATENCY_NOISE_SD_MS).unwrap_or(Normal::standard()),
        }
    }

    pub fn draw(&mut self) -> Draw {
        let mut v = [0.0; 7];
        for (slot, &(lo, hi)) in v.iter_mut().zip(SAMPLE_RANGES.iter()) {
            *slot = self.rng.gen_range(lo..hi);
        }
        Draw {
            features: FeatureVector::from_array(v),
            noise_ms: self.noise.sample(&mut self.rng),
        }
    }

    pub fn draws(&mut self, n: usize) -> Vec<Draw> {
        (0..n).map(|_| self.draw()).collect()
    }
}
