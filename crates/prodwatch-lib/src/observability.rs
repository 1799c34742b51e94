//! Observability infrastructure for production analysis
//!
//! Provides:
//! - Prometheus metrics (analysis latency, samples, dips, skipped rows, energy lost)
//! - Structured JSON logging with tracing

use crate::models::{Dip, NormalizeStats, PeriodSummary};
use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    GaugeVec, Histogram, IntCounter, IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for analysis latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<PipelineMetricsInner> = OnceLock::new();

struct PipelineMetricsInner {
    analysis_latency_seconds: Histogram,
    samples_processed: IntCounter,
    rows_skipped: IntCounter,
    dips_detected: IntCounterVec,
    energy_lost: GaugeVec,
    analysis_errors: IntCounter,
}

impl PipelineMetricsInner {
    fn new() -> Self {
        Self {
            analysis_latency_seconds: register_histogram!(
                "prodwatch_analysis_latency_seconds",
                "Time spent analysing one submitted export",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register analysis_latency_seconds"),

            samples_processed: register_int_counter!(
                "prodwatch_samples_processed_total",
                "Total number of normalized production samples analysed"
            )
            .expect("Failed to register samples_processed"),

            rows_skipped: register_int_counter!(
                "prodwatch_rows_skipped_total",
                "Total number of rows dropped for unparseable timestamps"
            )
            .expect("Failed to register rows_skipped"),

            dips_detected: register_int_counter_vec!(
                "prodwatch_dips_detected_total",
                "Total number of production dips detected",
                &["period"]
            )
            .expect("Failed to register dips_detected"),

            energy_lost: register_gauge_vec!(
                "prodwatch_energy_lost",
                "Energy lost to dips in the most recent analysis",
                &["period"]
            )
            .expect("Failed to register energy_lost"),

            analysis_errors: register_int_counter!(
                "prodwatch_analysis_errors_total",
                "Total number of rejected analysis requests"
            )
            .expect("Failed to register analysis_errors"),
        }
    }
}

/// Pipeline metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share it.
#[derive(Clone)]
pub struct PipelineMetrics {
    _private: (),
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(PipelineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &PipelineMetricsInner {
        GLOBAL_METRICS.get_or_init(PipelineMetricsInner::new)
    }

    pub fn observe_analysis_latency(&self, duration_secs: f64) {
        self.inner().analysis_latency_seconds.observe(duration_secs);
    }

    pub fn record_normalized(&self, stats: &NormalizeStats) {
        let kept = stats.rows_read.saturating_sub(stats.rows_skipped);
        self.inner().samples_processed.inc_by(kept as u64);
        self.inner().rows_skipped.inc_by(stats.rows_skipped as u64);
    }

    pub fn record_period(&self, period: &str, summary: &PeriodSummary) {
        self.inner()
            .dips_detected
            .with_label_values(&[period])
            .inc_by(summary.dip_count as u64);
        self.inner()
            .energy_lost
            .with_label_values(&[period])
            .set(summary.total_energy_lost);
    }

    pub fn inc_analysis_errors(&self) {
        self.inner().analysis_errors.inc();
    }
}

/// Structured logger for analysis events
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    site: String,
}

impl StructuredLogger {
    pub fn new(site: impl Into<String>) -> Self {
        Self { site: site.into() }
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    pub fn log_normalized(&self, stats: &NormalizeStats) {
        if stats.rows_skipped > 0 {
            warn!(
                event = "rows_skipped",
                site = %self.site,
                rows_read = stats.rows_read,
                rows_skipped = stats.rows_skipped,
                "Dropped production rows with invalid timestamps"
            );
        }
        info!(
            event = "series_normalized",
            site = %self.site,
            rows_read = stats.rows_read,
            channels = stats.channels.len(),
            "Production export normalized"
        );
    }

    pub fn log_dip(&self, period: &str, dip: &Dip) {
        info!(
            event = "dip_detected",
            site = %self.site,
            period = %period,
            start_time = %dip.start_time,
            end_time = %dip.end_time,
            duration_minutes = dip.duration_minutes,
            energy_lost = dip.energy_lost,
            samples = dip.sample_count,
            "Production dip detected"
        );
    }

    pub fn log_period_analyzed(&self, period: &str, summary: &PeriodSummary) {
        info!(
            event = "period_analyzed",
            site = %self.site,
            period = %period,
            samples = summary.sample_count,
            anomalous_samples = summary.anomalous_samples,
            dips = summary.dip_count,
            total_energy_lost = summary.total_energy_lost,
            "Reporting period analysed"
        );
    }

    pub fn log_conservation_mismatch(&self, period: &str, per_dip: f64, per_sample: f64) {
        warn!(
            event = "conservation_mismatch",
            site = %self.site,
            period = %period,
            per_dip = per_dip,
            per_sample = per_sample,
            "Dip and per-sample energy totals disagree"
        );
    }

    pub fn log_analysis_failed(&self, error: &str) {
        warn!(
            event = "analysis_failed",
            site = %self.site,
            error = %error,
            "Analysis request rejected"
        );
    }

    pub fn log_startup(&self, version: &str, addr: &str) {
        info!(
            event = "service_started",
            site = %self.site,
            version = %version,
            addr = %addr,
            "prodwatch service started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            site = %self.site,
            reason = %reason,
            "prodwatch service shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_metrics_creation() {
        // Prometheus registry is process-global; handles share one instance
        let metrics = PipelineMetrics::new();
        let again = metrics.clone();

        metrics.observe_analysis_latency(0.002);
        metrics.record_normalized(&NormalizeStats {
            rows_read: 10,
            rows_skipped: 2,
            channels: vec!["a dci /5min".into()],
        });
        again.record_period("january", &PeriodSummary::default());
        again.inc_analysis_errors();
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("north-array");
        assert_eq!(logger.site(), "north-array");
    }
}
