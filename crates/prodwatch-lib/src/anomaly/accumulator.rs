//! Energy-loss accumulation
//!
//! Period totals can be taken from the flat per-sample losses or from the
//! dip list; for pipeline output the two agree.

use crate::models::{Dip, PeriodSummary, Sample};
use thiserror::Error;

/// Relative tolerance for comparing the two totals
const CONSERVATION_TOLERANCE: f64 = 1e-9;

/// Flat and per-dip totals disagree
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("energy loss mismatch: dips sum to {per_dip}, samples sum to {per_sample}")]
pub struct ConservationMismatch {
    pub per_dip: f64,
    pub per_sample: f64,
}

pub fn total_from_samples(samples: &[Sample]) -> f64 {
    samples
        .iter()
        .filter(|s| s.is_anomalous)
        .map(|s| s.energy_lost)
        .sum()
}

pub fn total_from_dips(dips: &[Dip]) -> f64 {
    dips.iter().map(|d| d.energy_lost).sum()
}

/// Verify both representations give the same total
pub fn check_conservation(samples: &[Sample], dips: &[Dip]) -> Result<f64, ConservationMismatch> {
    let per_sample = total_from_samples(samples);
    let per_dip = total_from_dips(dips);
    let scale = per_sample.abs().max(per_dip.abs()).max(1.0);

    if (per_sample - per_dip).abs() <= CONSERVATION_TOLERANCE * scale {
        Ok(per_dip)
    } else {
        Err(ConservationMismatch {
            per_dip,
            per_sample,
        })
    }
}

impl PeriodSummary {
    pub fn from_parts(samples: &[Sample], dips: &[Dip]) -> Self {
        Self {
            sample_count: samples.len(),
            anomalous_samples: samples.iter().filter(|s| s.is_anomalous).count(),
            dip_count: dips.len(),
            total_energy_lost: total_from_dips(dips),
            longest_dip_minutes: dips
                .iter()
                .map(|d| d.duration_minutes)
                .fold(0.0, f64::max),
        }
    }
}
