//! Production dip analysis for solar telemetry exports
//!
//! This crate provides the core functionality for:
//! - Normalizing multi-channel telemetry CSVs into a production series
//! - EMA baselines, deviation tagging and dip aggregation
//! - Energy-loss accounting per dip and per reporting period
//! - Reconciling sensor production against revenue meter exports
//! - Health checks and observability

pub mod anomaly;
pub mod config;
pub mod error;
pub mod health;
pub mod models;
pub mod normalizer;
pub mod observability;
pub mod pipeline;
pub mod reconcile;
pub mod report;
pub mod revenue;

pub use config::AnalysisConfig;
pub use error::{AnalysisError, AnalysisResult, ConfigError, InputError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use normalizer::{ChannelSelector, RawTable, SeriesNormalizer};
pub use observability::{PipelineMetrics, StructuredLogger};
pub use pipeline::{DipPipeline, PipelineOutput};
pub use report::{AnalysisReport, Analyzer, PeriodReport, ReportPeriod, ReportRequest};
