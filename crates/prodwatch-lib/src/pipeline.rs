//! Dip detection pipeline
//!
//! Runs smoother, tagger and aggregator in order over one series. Each series
//! is processed in isolation, so independent periods can run concurrently.

use crate::anomaly::{DeviationTagger, DipAggregator, EmaSmoother, WindowPolicy};
use crate::config::AnalysisConfig;
use crate::error::ConfigError;
use crate::models::{Dip, PeriodSummary, Sample};
use serde::{Deserialize, Serialize};

/// Enriched series, its dips and the period summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub samples: Vec<Sample>,
    pub dips: Vec<Dip>,
    pub summary: PeriodSummary,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DipPipeline {
    smoother: EmaSmoother,
    tagger: DeviationTagger,
    aggregator: DipAggregator,
}

impl DipPipeline {
    /// The aggregator always shares the tagger's window
    fn new(smoother: EmaSmoother, tagger: DeviationTagger, policy: WindowPolicy) -> Self {
        Self {
            smoother,
            tagger,
            aggregator: DipAggregator::new(tagger.window(), policy),
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Result<Self, ConfigError> {
        let mut smoother = match config.ema_span {
            Some(span) => EmaSmoother::from_span(span)?,
            None => EmaSmoother::new(config.smoothing_weight)?,
        };
        if let Some(threshold) = config.activation_threshold {
            smoother = smoother.with_activation_threshold(threshold)?;
        }

        let tagger = DeviationTagger::new(
            config.relative_threshold,
            config.active_window()?,
            config.interval_hours(),
        )?;

        Ok(Self::new(smoother, tagger, config.window_policy))
    }

    pub fn smoother(&self) -> &EmaSmoother {
        &self.smoother
    }

    /// Run all stages over a time-ordered series
    pub fn run(&self, mut samples: Vec<Sample>) -> PipelineOutput {
        self.smoother.smooth(&mut samples);
        self.tagger.tag(&mut samples);
        let report = self.aggregator.aggregate(&samples);
        let summary = PeriodSummary::from_parts(&samples, &report.dips);

        PipelineOutput {
            samples,
            dips: report.dips,
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::{check_conservation, total_from_samples, ActiveWindow};
    use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 8)
            .unwrap()
            .and_hms_opt(11, 0, 0)
            .unwrap()
    }

    fn series_from(start: NaiveDateTime, values: &[f64]) -> Vec<Sample> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Sample::new(start + Duration::minutes(5 * i as i64), *v))
            .collect()
    }

    fn pipeline() -> DipPipeline {
        DipPipeline::from_config(&AnalysisConfig::default()).unwrap()
    }

    #[test]
    fn test_six_sample_dip_scenario() {
        let samples = series_from(start(), &[100.0, 100.0, 100.0, 40.0, 40.0, 100.0]);
        let timestamps: Vec<_> = samples.iter().map(|s| s.timestamp).collect();
        let output = pipeline().run(samples);

        let flags: Vec<bool> = output.samples.iter().map(|s| s.is_anomalous).collect();
        assert_eq!(flags, vec![false, false, false, true, true, false]);

        assert_eq!(output.dips.len(), 1);
        let dip = &output.dips[0];
        assert_eq!(dip.start_time, timestamps[3]);
        assert_eq!(dip.end_time, timestamps[5]);
        assert_eq!(dip.duration_minutes, 10.0);
        assert!(dip.energy_lost > 0.0);

        // baselines at the dip are 91 and 83.35
        assert!((dip.energy_lost - (51.0 + 43.35) / 12.0).abs() < 1e-9);
        assert_eq!(output.summary.total_energy_lost, dip.energy_lost);
    }

    #[test]
    fn test_single_sample_series_has_no_dips() {
        let output = pipeline().run(series_from(start(), &[250.0]));

        assert_eq!(output.samples[0].baseline, 250.0);
        assert!(!output.samples[0].is_anomalous);
        assert!(output.dips.is_empty());
    }

    #[test]
    fn test_empty_series() {
        let output = pipeline().run(Vec::new());
        assert!(output.samples.is_empty());
        assert!(output.dips.is_empty());
        assert_eq!(output.summary.total_energy_lost, 0.0);
    }

    #[test]
    fn test_run_is_deterministic() {
        let values: Vec<f64> = (0..200)
            .map(|i| 500.0 + ((i * 37) % 11) as f64 * 40.0 - if i % 17 == 0 { 400.0 } else { 0.0 })
            .collect();
        let morning = start().with_hour(9).unwrap();

        let a = pipeline().run(series_from(morning, &values));
        let b = pipeline().run(series_from(morning, &values));
        assert_eq!(a, b);
    }

    #[test]
    fn test_conservation_and_window_exclusion_over_a_day() {
        let midnight = start().with_hour(0).unwrap();
        let values: Vec<f64> = (0..288)
            .map(|i| {
                let hour = i / 12;
                let base = if (7..18).contains(&hour) { 1000.0 } else { 0.0 };
                if i % 9 == 0 {
                    base * 0.3
                } else {
                    base
                }
            })
            .collect();

        for policy in [WindowPolicy::Visible, WindowPolicy::Skip] {
            let config = AnalysisConfig {
                window_policy: policy,
                ..Default::default()
            };
            let output = DipPipeline::from_config(&config)
                .unwrap()
                .run(series_from(midnight, &values));

            let window = ActiveWindow::default();
            assert!(output
                .samples
                .iter()
                .filter(|s| !window.contains(&s.timestamp))
                .all(|s| !s.is_anomalous && s.energy_lost == 0.0));

            assert!(!output.dips.is_empty());
            let total = check_conservation(&output.samples, &output.dips).unwrap();
            assert!((total - total_from_samples(&output.samples)).abs() < 1e-9);

            for pair in output.dips.windows(2) {
                assert!(!pair[0].overlaps(&pair[1]));
            }
        }
    }

    #[test]
    fn test_dip_ending_series_is_flushed() {
        let samples = series_from(start(), &[100.0, 100.0, 30.0, 30.0]);
        let last = samples.last().unwrap().timestamp;
        let output = pipeline().run(samples);

        assert_eq!(output.dips.len(), 1);
        assert_eq!(output.dips[0].end_time, last);
    }

    #[test]
    fn test_activation_threshold_suppresses_off_readings() {
        let values = [50_000.0, 50_000.0, 5_000.0, 50_000.0];

        let plain = pipeline().run(series_from(start(), &values));
        assert!(plain.samples[2].is_anomalous);

        let config = AnalysisConfig {
            activation_threshold: Some(crate::config::DEFAULT_ACTIVATION_THRESHOLD),
            ..Default::default()
        };
        let gated = DipPipeline::from_config(&config)
            .unwrap()
            .run(series_from(start(), &values));

        assert_eq!(gated.samples[2].baseline, 0.0);
        assert!(gated.samples.iter().all(|s| !s.is_anomalous));
        // Back on: the recurrence resumes from the zero baseline
        assert!((gated.samples[3].baseline - 7_500.0).abs() < 1e-9);
        assert!(gated.dips.is_empty());
    }

    #[test]
    fn test_custom_window_bounds_dips_and_conserves_energy() {
        let quarter_to = start().with_minute(45).unwrap();
        let config = AnalysisConfig {
            window_start_hour: 12,
            window_end_hour: 15,
            ..Default::default()
        };
        // 11:55 drops too, but lies before the window
        let values = [100.0, 100.0, 40.0, 40.0, 40.0, 100.0];
        let output = DipPipeline::from_config(&config)
            .unwrap()
            .run(series_from(quarter_to, &values));

        assert!(!output.samples[2].is_anomalous);
        assert_eq!(output.dips.len(), 1);
        assert_eq!(output.dips[0].start_time, output.samples[3].timestamp);
        assert_eq!(output.dips[0].end_time, output.samples[5].timestamp);

        let total = check_conservation(&output.samples, &output.dips).unwrap();
        assert!((total - total_from_samples(&output.samples)).abs() < 1e-9);
    }

    #[test]
    fn test_span_overrides_weight() {
        let config = AnalysisConfig {
            ema_span: Some(5.0),
            ..Default::default()
        };
        let pipeline = DipPipeline::from_config(&config).unwrap();
        assert!((pipeline.smoother().weight() - 2.0 / 3.0).abs() < 1e-12);
    }
}
