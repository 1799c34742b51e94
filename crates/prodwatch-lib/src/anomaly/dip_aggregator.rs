//! Dip aggregation
//!
//! Scans a tagged series once, in timestamp order, grouping contiguous
//! anomalous samples into [`Dip`] events with a two-state machine:
//!
//! - `Idle -> InDip` on an anomalous in-window sample
//! - `InDip -> InDip` while samples stay anomalous
//! - `InDip -> Idle` on a non-anomalous sample, which becomes the dip's end
//!
//! A series that ends mid-dip is flushed with the last sample's timestamp.

use crate::models::{Dip, Sample};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::ActiveWindow;

/// How samples outside the active window are seen by the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowPolicy {
    /// Out-of-window samples count as non-anomalous and close an open dip
    #[default]
    Visible,
    /// Out-of-window samples are ignored; they neither open nor close a dip
    Skip,
}

impl std::fmt::Display for WindowPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WindowPolicy::Visible => write!(f, "visible"),
            WindowPolicy::Skip => write!(f, "skip"),
        }
    }
}

impl std::str::FromStr for WindowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "visible" => Ok(WindowPolicy::Visible),
            "skip" => Ok(WindowPolicy::Skip),
            other => Err(format!("unknown window policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DipState {
    Idle,
    InDip {
        start: NaiveDateTime,
        energy: f64,
        count: usize,
    },
}

/// Dips found in one series and their summed loss
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DipReport {
    pub dips: Vec<Dip>,
    pub total_energy_lost: f64,
}

/// Groups tagged samples into dips
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DipAggregator {
    window: ActiveWindow,
    policy: WindowPolicy,
}

impl DipAggregator {
    pub fn new(window: ActiveWindow, policy: WindowPolicy) -> Self {
        Self { window, policy }
    }

    /// Run the state machine over a tagged series
    pub fn aggregate(&self, samples: &[Sample]) -> DipReport {
        let mut dips = Vec::new();
        let mut state = DipState::Idle;

        for sample in samples {
            let in_window = self.window.contains(&sample.timestamp);
            if !in_window && self.policy == WindowPolicy::Skip {
                continue;
            }
            let anomalous = in_window && sample.is_anomalous;

            state = match (state, anomalous) {
                (DipState::Idle, true) => DipState::InDip {
                    start: sample.timestamp,
                    energy: sample.energy_lost,
                    count: 1,
                },
                (DipState::InDip { start, energy, count }, true) => DipState::InDip {
                    start,
                    energy: energy + sample.energy_lost,
                    count: count + 1,
                },
                (DipState::InDip { start, energy, count }, false) => {
                    dips.push(close_dip(start, sample.timestamp, energy, count));
                    DipState::Idle
                }
                (DipState::Idle, false) => DipState::Idle,
            };
        }

        if let (DipState::InDip { start, energy, count }, Some(last)) = (state, samples.last()) {
            dips.push(close_dip(start, last.timestamp, energy, count));
        }

        let total_energy_lost = dips.iter().map(|d| d.energy_lost).sum();
        DipReport {
            dips,
            total_energy_lost,
        }
    }
}

fn close_dip(start: NaiveDateTime, end: NaiveDateTime, energy: f64, count: usize) -> Dip {
    Dip {
        start_time: start,
        end_time: end,
        duration_minutes: (end - start).num_seconds() as f64 / 60.0,
        energy_lost: energy,
        sample_count: count,
    }
}
