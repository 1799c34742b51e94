//! prodwatch service: HTTP surface over the production dip analysis library

pub mod api;
pub mod config;

pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");
