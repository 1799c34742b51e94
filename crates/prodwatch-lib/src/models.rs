//! Core data models for production analysis

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One telemetry reading, enriched in place by each pipeline stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Site wall-clock time of the reading
    pub timestamp: NaiveDateTime,
    /// Total production summed across all channels
    pub raw_production: f64,
    /// EMA baseline (expected production)
    #[serde(default)]
    pub baseline: f64,
    #[serde(default)]
    pub is_anomalous: bool,
    /// Loss for this sample's interval, production units x hours
    #[serde(default)]
    pub energy_lost: f64,
}

impl Sample {
    pub fn new(timestamp: NaiveDateTime, raw_production: f64) -> Self {
        Self {
            timestamp,
            raw_production,
            baseline: 0.0,
            is_anomalous: false,
            energy_lost: 0.0,
        }
    }
}

/// One contiguous anomalous run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dip {
    pub start_time: NaiveDateTime,
    /// Closing sample's timestamp, or the last sample's when flushed
    pub end_time: NaiveDateTime,
    pub duration_minutes: f64,
    pub energy_lost: f64,
    /// Anomalous samples accumulated into this dip
    pub sample_count: usize,
}

impl Dip {
    pub fn overlaps(&self, other: &Dip) -> bool {
        self.start_time < other.end_time && other.start_time < self.end_time
    }
}

/// Aggregate view over one analysed series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub sample_count: usize,
    pub anomalous_samples: usize,
    pub dip_count: usize,
    pub total_energy_lost: f64,
    pub longest_dip_minutes: f64,
}

/// Utility revenue meter export row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueRecord {
    /// Parsed meter time, when the label is a recognised format
    pub time: Option<NaiveDateTime>,
    /// Meter time as exported
    pub time_label: String,
    pub exported_kwh: f64,
}

/// Production against metered export for one sample position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetPoint {
    pub timestamp: NaiveDateTime,
    pub production_kwh: f64,
    pub exported_kwh: f64,
    pub net_kwh: f64,
}

/// Counters produced while normalising raw rows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizeStats {
    pub rows_read: usize,
    /// Rows dropped because the timestamp did not parse
    pub rows_skipped: usize,
    /// Production channel columns that were summed
    pub channels: Vec<String>,
}
