//! Error taxonomy for the analysis pipeline
//!
//! Structural input problems surface as [`InputError`], bad tuning parameters
//! as [`ConfigError`]. Per-row timestamp failures are not errors: the
//! normalizer drops and counts them.

use thiserror::Error;

/// Malformed or structurally invalid input
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InputError {
    #[error("The uploaded file is empty.")]
    EmptyInput,

    #[error("Required timestamp column '{0}' is missing.")]
    MissingTimestampColumn(String),

    #[error("No valid energy production columns found.")]
    NoProductionChannels,

    #[error("No rows with a valid '{0}' timestamp remain after filtering.")]
    NoUsableRows(String),

    #[error("Missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Error reading file: {0}")]
    Unreadable(String),
}

impl From<csv::Error> for InputError {
    fn from(err: csv::Error) -> Self {
        InputError::Unreadable(err.to_string())
    }
}

/// Invalid pipeline parameter
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("smoothing weight must lie strictly between 0 and 1, got {0}")]
    SmoothingWeight(f64),

    #[error("EMA span must be greater than 1, got {0}")]
    Span(f64),

    #[error("relative threshold must lie strictly between 0 and 1, got {0}")]
    RelativeThreshold(f64),

    #[error("activation threshold must be finite and non-negative, got {0}")]
    ActivationThreshold(f64),

    #[error("active window [{start}, {end}) is not a valid hour range")]
    ActiveWindow { start: u32, end: u32 },

    #[error("sampling interval must be positive, got {0} minutes")]
    SamplingInterval(f64),

    #[error("system voltage must be positive, got {0}")]
    SystemVoltage(f64),

    #[error("channel selector has no markers or columns")]
    EmptyChannelSelector,
}

/// Failure of a whole analysis request
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalysisError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

pub type AnalysisResult<T> = std::result::Result<T, AnalysisError>;
