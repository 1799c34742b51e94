//! Deviation tagging
//!
//! Flags a sample as anomalous when production falls below a fraction of its
//! baseline, inside the active hour-of-day window only.

use crate::error::ConfigError;
use crate::models::Sample;
use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Half-open hour-of-day range `[start_hour, end_hour)` on site wall-clock time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveWindow {
    start_hour: u32,
    end_hour: u32,
}

impl ActiveWindow {
    pub fn new(start_hour: u32, end_hour: u32) -> Result<Self, ConfigError> {
        if start_hour >= end_hour || end_hour > 24 {
            return Err(ConfigError::ActiveWindow {
                start: start_hour,
                end: end_hour,
            });
        }
        Ok(Self {
            start_hour,
            end_hour,
        })
    }

    pub fn contains(&self, timestamp: &NaiveDateTime) -> bool {
        let hour = timestamp.hour();
        hour >= self.start_hour && hour < self.end_hour
    }
}

impl Default for ActiveWindow {
    fn default() -> Self {
        Self {
            start_hour: 10,
            end_hour: 15,
        }
    }
}

/// Loss for one anomalous sample: shortfall below baseline over one interval
pub fn energy_loss(baseline: f64, raw_production: f64, interval_hours: f64) -> f64 {
    (baseline - raw_production).max(0.0) * interval_hours
}

/// Sets `is_anomalous` and `energy_lost` on smoothed samples
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviationTagger {
    relative_threshold: f64,
    window: ActiveWindow,
    interval_hours: f64,
}

impl DeviationTagger {
    pub fn new(
        relative_threshold: f64,
        window: ActiveWindow,
        interval_hours: f64,
    ) -> Result<Self, ConfigError> {
        if !(relative_threshold.is_finite() && relative_threshold > 0.0 && relative_threshold < 1.0)
        {
            return Err(ConfigError::RelativeThreshold(relative_threshold));
        }
        if !(interval_hours.is_finite() && interval_hours > 0.0) {
            return Err(ConfigError::SamplingInterval(interval_hours * 60.0));
        }
        Ok(Self {
            relative_threshold,
            window,
            interval_hours,
        })
    }

    pub fn window(&self) -> ActiveWindow {
        self.window
    }

    pub fn is_anomalous(&self, sample: &Sample) -> bool {
        self.window.contains(&sample.timestamp)
            && sample.baseline != 0.0
            && sample.raw_production < self.relative_threshold * sample.baseline
    }

    pub fn tag(&self, samples: &mut [Sample]) {
        for sample in samples.iter_mut() {
            sample.is_anomalous = self.is_anomalous(sample);
            sample.energy_lost = if sample.is_anomalous {
                energy_loss(sample.baseline, sample.raw_production, self.interval_hours)
            } else {
                0.0
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_at(hour: u32, raw: f64, baseline: f64) -> Sample {
        let ts = NaiveDate::from_ymd_opt(2024, 5, 2)
            .unwrap()
            .and_hms_opt(hour, 30, 0)
            .unwrap();
        Sample {
            baseline,
            ..Sample::new(ts, raw)
        }
    }

    fn tagger() -> DeviationTagger {
        DeviationTagger::new(0.8, ActiveWindow::default(), 1.0 / 12.0).unwrap()
    }

    #[test]
    fn test_flags_drop_below_threshold() {
        let mut samples = vec![sample_at(11, 40.0, 100.0), sample_at(11, 85.0, 100.0)];
        tagger().tag(&mut samples);

        assert!(samples[0].is_anomalous);
        assert!((samples[0].energy_lost - 60.0 / 12.0).abs() < 1e-12);
        assert!(!samples[1].is_anomalous);
        assert_eq!(samples[1].energy_lost, 0.0);
    }

    #[test]
    fn test_window_exclusion() {
        let mut samples = vec![
            sample_at(9, 0.0, 100.0),
            sample_at(15, 0.0, 100.0),
            sample_at(23, 0.0, 100.0),
            sample_at(10, 0.0, 100.0),
            sample_at(14, 0.0, 100.0),
        ];
        tagger().tag(&mut samples);

        let flags: Vec<bool> = samples.iter().map(|s| s.is_anomalous).collect();
        assert_eq!(flags, vec![false, false, false, true, true]);
        assert!(samples[..3].iter().all(|s| s.energy_lost == 0.0));
    }

    #[test]
    fn test_zero_baseline_never_anomalous() {
        let mut samples = vec![sample_at(12, 0.0, 0.0)];
        tagger().tag(&mut samples);
        assert!(!samples[0].is_anomalous);
    }

    #[test]
    fn test_energy_loss_is_clamped() {
        assert_eq!(energy_loss(100.0, 120.0, 0.5), 0.0);
        assert_eq!(energy_loss(100.0, 40.0, 0.5), 30.0);
    }

    #[test]
    fn test_active_window_validation() {
        assert!(ActiveWindow::new(10, 15).is_ok());
        assert!(ActiveWindow::new(0, 24).is_ok());
        assert!(ActiveWindow::new(15, 15).is_err());
        assert!(ActiveWindow::new(10, 25).is_err());
    }

    #[test]
    fn test_rejects_bad_threshold() {
        assert!(DeviationTagger::new(0.0, ActiveWindow::default(), 0.1).is_err());
        assert!(DeviationTagger::new(1.0, ActiveWindow::default(), 0.1).is_err());
        assert!(DeviationTagger::new(0.8, ActiveWindow::default(), 0.0).is_err());
    }
}
