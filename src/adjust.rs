//! Action-conditioned adjustment of an action-agnostic base prediction.
//!
//! latency = max(1, base_lat * kind_lat_mult * tier_lat_mult + kind_offset + load_penalty)
//! energy  = max(0.01, base_en * kind_en_mult * tier_en_mult)
//!
//! load_penalty applies to edge only: max(0, edge_cpu - 0.6) * 40 ms.
//!
//! The variance outputs are fixed heuristics, not learned. They only feed the
//! parametric bound. Calibration and serving both call [`adjust`]; there is
//! no second copy of this arithmetic anywhere in the crate.

use crate::action::{Action, Kind, Tier};
use crate::features::FeatureVector;

/// Edge utilization above which queuing adds latency.
pub const EDGE_LOAD_THRESHOLD: f64 = 0.6;
/// Milliseconds added per unit of utilization above the threshold.
pub const EDGE_LOAD_MS_PER_UNIT: f64 = 40.0;
/// Edge utilization above which variance starts inflating.
pub const EDGE_VARIANCE_THRESHOLD: f64 = 0.5;

const BASE_LATENCY_VARIANCE: f64 = 25.0;
const MIN_LATENCY_MS: f64 = 1.0;
const MIN_ENERGY_J: f64 = 0.01;

/// Per-kind effect on a base prediction. Stack-allocated, Copy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KindEffect {
    pub latency_offset_ms: f64,
    pub energy_mult: f64,
    pub latency_mult: f64,
    pub variance_mult: f64,
}

/// Result of the adjustment transform. Stack-allocated, Copy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adjusted {
    pub latency_ms: f64,
    pub energy_j: f64,
    pub var_latency: f64,
    pub var_energy: f64,
}

#[inline]
pub fn tier_latency_mult(tier: Tier) -> f64 {
    match tier {
        Tier::Low => 1.25,
        Tier::Med => 1.00,
        Tier::High => 0.97,
    }
}

#[inline]
pub fn tier_energy_mult(tier: Tier) -> f64 {
    match tier {
        Tier::Low => 0.90,
        Tier::Med => 1.00,
        Tier::High => 1.40,
    }
}

#[inline]
pub fn kind_effect(kind: Kind) -> KindEffect {
    match kind {
        // Device pays full compute, no WAN hop
        Kind::Local => KindEffect {
            latency_offset_ms: 3.0,
            energy_mult: 1.25,
            latency_mult: 1.00,
            variance_mult: 0.9,
        },
        Kind::Edge => KindEffect {
            latency_offset_ms: -10.0,
            energy_mult: 0.80,
            latency_mult: 0.96,
            variance_mult: 1.0,
        },
        // WAN + queuing; device energy drops, tails get heavier
        Kind::Cloud => KindEffect {
            latency_offset_ms: 45.0,
            energy_mult: 0.70,
            latency_mult: 1.05,
            variance_mult: 1.3,
        },
    }
}

/// Extra edge latency from node load. Exactly zero at or below the threshold.
#[inline]
pub fn edge_load_penalty(edge_cpu: f64) -> f64 {
    (edge_cpu - EDGE_LOAD_THRESHOLD).max(0.0) * EDGE_LOAD_MS_PER_UNIT
}

/// Apply the action adjustment. Pure function: deterministic output from inputs only.
pub fn adjust(
    base_latency_ms: f64,
    base_energy_j: f64,
    features: &FeatureVector,
    action: Action,
) -> Adjusted {
    let tier_lat = tier_latency_mult(action.tier);
    let tier_en = tier_energy_mult(action.tier);
    let effect = kind_effect(action.kind);

    let mut latency_offset = effect.latency_offset_ms;
    let mut variance_mult = effect.variance_mult;

    if action.kind == Kind::Edge {
        latency_offset += edge_load_penalty(features.edge_cpu);
        variance_mult *= 1.0 + (features.edge_cpu - EDGE_VARIANCE_THRESHOLD).max(0.0);
    }

    let latency_ms = (base_latency_ms * effect.latency_mult * tier_lat + latency_offset)
        .max(MIN_LATENCY_MS);
    let energy_j = (base_energy_j * effect.energy_mult * tier_en).max(MIN_ENERGY_J);

    let mut var_latency = BASE_LATENCY_VARIANCE * variance_mult;
    match action.tier {
        Tier::Low => var_latency *= 1.25,
        Tier::High => var_latency *= 1.35,
        Tier::Med => {}
    }
    let var_energy = if action.tier == Tier::High { 0.02 } else { 0.01 };

    Adjusted {
        latency_ms,
        energy_j,
        var_latency,
        var_energy,
    }
}
