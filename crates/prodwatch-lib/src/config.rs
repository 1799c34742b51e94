//! Analysis parameters
//!
//! Every field has a serde default so partial overrides (from a config file,
//! environment, CLI flags or a request body) deserialize cleanly.

use crate::anomaly::{ActiveWindow, WindowPolicy};
use crate::error::ConfigError;
use crate::normalizer::ChannelSelector;
use serde::{Deserialize, Serialize};

/// Threshold below which a reading counts as "off" when the activation
/// policy is enabled
pub const DEFAULT_ACTIVATION_THRESHOLD: f64 = 10_000.0;

/// Pipeline and ingestion parameters for one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Site label used in structured logs
    #[serde(default = "default_site_name")]
    pub site_name: String,

    /// Column holding the sample timestamp
    #[serde(default = "default_timestamp_column")]
    pub timestamp_column: String,

    /// Which columns are production channels
    #[serde(default)]
    pub channels: ChannelSelector,

    /// Fixed sampling interval of the telemetry export
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: f64,

    /// Weight of the previous baseline in the EMA recurrence
    #[serde(default = "default_smoothing_weight")]
    pub smoothing_weight: f64,

    /// pandas-style span; overrides `smoothing_weight` when set
    #[serde(default)]
    pub ema_span: Option<f64>,

    /// Fraction of the baseline below which production is anomalous
    #[serde(default = "default_relative_threshold")]
    pub relative_threshold: f64,

    /// Readings below this are treated as "off" (baseline forced to zero)
    #[serde(default)]
    pub activation_threshold: Option<f64>,

    /// First hour of the active detection window (inclusive)
    #[serde(default = "default_window_start")]
    pub window_start_hour: u32,

    /// End hour of the active detection window (exclusive)
    #[serde(default = "default_window_end")]
    pub window_end_hour: u32,

    #[serde(default)]
    pub window_policy: WindowPolicy,

    /// DC bus voltage used to convert production to kWh
    #[serde(default = "default_system_voltage")]
    pub system_voltage: f64,

    /// Metadata lines preceding the header of a revenue meter export
    #[serde(default = "default_revenue_skip_rows")]
    pub revenue_skip_rows: usize,
}

fn default_site_name() -> String {
    "site".to_string()
}

fn default_timestamp_column() -> String {
    "sitetime".to_string()
}

fn default_interval_minutes() -> f64 {
    5.0
}

fn default_smoothing_weight() -> f64 {
    0.85
}

fn default_relative_threshold() -> f64 {
    0.8
}

fn default_window_start() -> u32 {
    10
}

fn default_window_end() -> u32 {
    15
}

fn default_system_voltage() -> f64 {
    1500.0
}

fn default_revenue_skip_rows() -> usize {
    5
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            site_name: default_site_name(),
            timestamp_column: default_timestamp_column(),
            channels: ChannelSelector::default(),
            interval_minutes: default_interval_minutes(),
            smoothing_weight: default_smoothing_weight(),
            ema_span: None,
            relative_threshold: default_relative_threshold(),
            activation_threshold: None,
            window_start_hour: default_window_start(),
            window_end_hour: default_window_end(),
            window_policy: WindowPolicy::default(),
            system_voltage: default_system_voltage(),
            revenue_skip_rows: default_revenue_skip_rows(),
        }
    }
}

impl AnalysisConfig {
    /// Sampling interval in hours (5 minutes => 1/12)
    pub fn interval_hours(&self) -> f64 {
        self.interval_minutes / 60.0
    }

    pub fn active_window(&self) -> Result<ActiveWindow, ConfigError> {
        ActiveWindow::new(self.window_start_hour, self.window_end_hour)
    }

    /// Check every parameter without building the pipeline
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.interval_minutes.is_finite() && self.interval_minutes > 0.0) {
            return Err(ConfigError::SamplingInterval(self.interval_minutes));
        }
        if !(self.system_voltage.is_finite() && self.system_voltage > 0.0) {
            return Err(ConfigError::SystemVoltage(self.system_voltage));
        }
        self.channels.validate()?;
        crate::pipeline::DipPipeline::from_config(self).map(|_| ())
    }
}
