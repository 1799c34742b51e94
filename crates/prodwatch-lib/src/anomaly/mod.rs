//! Production anomaly detection
//!
//! This module provides the stages of the dip pipeline:
//! - EMA baseline smoothing
//! - Deviation tagging inside the active hour window
//! - Dip aggregation (two-state scan with end-of-series flush)
//! - Energy-loss accumulation and the conservation check

pub mod accumulator;
mod dip_aggregator;
mod ema;
mod tagger;

pub use accumulator::{check_conservation, total_from_dips, total_from_samples, ConservationMismatch};
pub use dip_aggregator::{DipAggregator, DipReport, WindowPolicy};
pub use ema::{EmaSmoother, SeedPolicy};
pub use tagger::{energy_loss, ActiveWindow, DeviationTagger};
