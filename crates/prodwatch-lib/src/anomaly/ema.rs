//! EMA baseline smoothing
//!
//! Computes a causal exponential moving average over a production series,
//! used as the expected production at each sample:
//!
//! `baseline[i] = baseline[i-1] * weight + raw[i] * (1 - weight)`
//!
//! The carried baseline is threaded through an explicit fold, so the
//! computation is strictly sequential in timestamp order.

use crate::error::ConfigError;
use crate::models::Sample;
use serde::{Deserialize, Serialize};

/// How the baseline is seeded and when it is switched off
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "threshold", rename_all = "snake_case")]
pub enum SeedPolicy {
    /// First sample seeds the baseline at its own value
    #[default]
    FirstSample,
    /// Readings below the threshold are "off" and pin the baseline to 0;
    /// the recurrence then continues from that 0
    ActivationThreshold(f64),
}

/// Single-pole exponential smoother
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmaSmoother {
    weight: f64,
    seed: SeedPolicy,
}

impl EmaSmoother {
    /// `weight` is the share kept from the previous baseline, 0 < weight < 1
    pub fn new(weight: f64) -> Result<Self, ConfigError> {
        if !(weight.is_finite() && weight > 0.0 && weight < 1.0) {
            return Err(ConfigError::SmoothingWeight(weight));
        }
        Ok(Self {
            weight,
            seed: SeedPolicy::FirstSample,
        })
    }

    /// Equivalent of pandas `ewm(span, adjust=False)`
    pub fn from_span(span: f64) -> Result<Self, ConfigError> {
        if !(span.is_finite() && span > 1.0) {
            return Err(ConfigError::Span(span));
        }
        Self::new(1.0 - 2.0 / (span + 1.0))
    }

    pub fn with_activation_threshold(mut self, threshold: f64) -> Result<Self, ConfigError> {
        if !(threshold.is_finite() && threshold >= 0.0) {
            return Err(ConfigError::ActivationThreshold(threshold));
        }
        self.seed = SeedPolicy::ActivationThreshold(threshold);
        Ok(self)
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// One step of the recurrence; `carried` is `None` only at series start
    pub fn step(&self, carried: Option<f64>, raw: f64) -> f64 {
        if let SeedPolicy::ActivationThreshold(threshold) = self.seed {
            if raw < threshold {
                return 0.0;
            }
        }
        match carried {
            Some(previous) => previous * self.weight + raw * (1.0 - self.weight),
            None => raw,
        }
    }

    /// Populate `baseline` on every sample, in order
    pub fn smooth(&self, samples: &mut [Sample]) {
        samples.iter_mut().fold(None, |carried, sample| {
            let baseline = self.step(carried, sample.raw_production);
            sample.baseline = baseline;
            Some(baseline)
        });
    }

    pub fn baselines(&self, values: &[f64]) -> Vec<f64> {
        values
            .iter()
            .scan(None, |carried, &raw| {
                let baseline = self.step(*carried, raw);
                *carried = Some(baseline);
                Some(baseline)
            })
            .collect()
    }
}
