//! Service configuration

use anyhow::{Context, Result};
use prodwatch_lib::AnalysisConfig;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Optional config file location
pub const CONFIG_PATH_ENV: &str = "PRODWATCH_CONFIG";

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Upper bound on an analyze request body
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Defaults for every request; request bodies may override fields
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

fn default_listen_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_max_body_bytes() -> usize {
    32 * 1024 * 1024
}

fn default_request_timeout() -> u64 {
    60
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            api_port: default_api_port(),
            max_body_bytes: default_max_body_bytes(),
            request_timeout_secs: default_request_timeout(),
            analysis: AnalysisConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Load from `PRODWATCH_CONFIG` (if set) and `PRODWATCH__*` environment variables
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).ok();
        Self::load_from(path.as_deref().map(Path::new))
    }

    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix("PRODWATCH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read service configuration")?;

        let config: ServiceConfig = settings
            .try_deserialize()
            .context("Invalid service configuration")?;
        config
            .analysis
            .validate()
            .context("Invalid default analysis parameters")?;
        Ok(config)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.listen_addr, self.api_port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
