//! Subcommand implementations and the flags they share

pub mod analyze;
pub mod status;
pub mod submit;

use anyhow::{Context, Result};
use clap::Args;
use prodwatch_lib::{anomaly::WindowPolicy, AnalysisConfig, ReportPeriod};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Input exports
#[derive(Debug, Clone, Args)]
pub struct InputArgs {
    /// Telemetry export with a timestamp column and production channels
    #[arg(long, short)]
    pub production: PathBuf,

    /// Revenue meter export for January
    #[arg(long)]
    pub revenue_january: Option<PathBuf>,

    /// Revenue meter export for May
    #[arg(long)]
    pub revenue_may: Option<PathBuf>,
}

impl InputArgs {
    pub fn revenue_paths(&self) -> Vec<(ReportPeriod, &Path)> {
        [
            (ReportPeriod::January, self.revenue_january.as_deref()),
            (ReportPeriod::May, self.revenue_may.as_deref()),
        ]
        .into_iter()
        .filter_map(|(period, path)| path.map(|p| (period, p)))
        .collect()
    }
}

/// Analysis parameter overrides
#[derive(Debug, Clone, Default, Args)]
pub struct AnalysisArgs {
    /// Site label used in logs
    #[arg(long)]
    pub site: Option<String>,

    /// Timestamp column name
    #[arg(long)]
    pub timestamp_column: Option<String>,

    /// Explicit production channel columns (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub channels: Vec<String>,

    /// Sampling interval in minutes
    #[arg(long)]
    pub interval_minutes: Option<f64>,

    /// EMA weight of the previous baseline
    #[arg(long)]
    pub alpha: Option<f64>,

    /// EMA span (overrides --alpha)
    #[arg(long)]
    pub span: Option<f64>,

    /// Fraction of the baseline below which production is anomalous
    #[arg(long)]
    pub rho: Option<f64>,

    /// Readings below this count as "off" and reset the baseline
    #[arg(long)]
    pub activation_threshold: Option<f64>,

    /// First hour of the detection window
    #[arg(long)]
    pub window_start: Option<u32>,

    /// Hour the detection window ends (exclusive)
    #[arg(long)]
    pub window_end: Option<u32>,

    /// How samples outside the window affect open dips (visible, skip)
    #[arg(long)]
    pub window_policy: Option<WindowPolicy>,

    /// DC system voltage for kWh conversion
    #[arg(long)]
    pub system_voltage: Option<f64>,
}

impl AnalysisArgs {
    /// Only the parameters given on the command line
    pub fn overrides(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        let mut set = |key: &str, value: Option<Value>| {
            if let Some(value) = value {
                fields.insert(key.to_string(), value);
            }
        };

        set("site_name", self.site.clone().map(Value::from));
        set("timestamp_column", self.timestamp_column.clone().map(Value::from));
        set(
            "channels",
            (!self.channels.is_empty())
                .then(|| serde_json::json!({ "kind": "columns", "names": self.channels })),
        );
        set("interval_minutes", self.interval_minutes.map(Value::from));
        set("smoothing_weight", self.alpha.map(Value::from));
        set("ema_span", self.span.map(Value::from));
        set("relative_threshold", self.rho.map(Value::from));
        set("activation_threshold", self.activation_threshold.map(Value::from));
        set("window_start_hour", self.window_start.map(Value::from));
        set("window_end_hour", self.window_end.map(Value::from));
        set(
            "window_policy",
            self.window_policy.map(|p| Value::from(p.to_string())),
        );
        set("system_voltage", self.system_voltage.map(Value::from));

        fields
    }

    /// Base configuration with the command-line overrides applied
    pub fn apply(&self, base: &AnalysisConfig) -> Result<AnalysisConfig> {
        let mut merged = serde_json::to_value(base)?;
        if let Value::Object(target) = &mut merged {
            target.extend(self.overrides());
        }
        serde_json::from_value(merged).context("Invalid analysis parameters")
    }
}

pub fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}
