//! prodwatch CLI
//!
//! Runs production dip analysis over local telemetry exports, or submits
//! them to a running prodwatch service.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use commands::{analyze, status, submit, AnalysisArgs, InputArgs};
use prodwatch_lib::ReportPeriod;
use tracing_subscriber::EnvFilter;

const DEFAULT_API_URL: &str = "http://localhost:8080";

/// prodwatch CLI
#[derive(Parser)]
#[command(name = "pwatch")]
#[command(author, version, about = "Production dip analysis for solar telemetry exports", long_about = None)]
pub struct Cli {
    /// Service URL for submit/status (can also be set via PWATCH_API_URL env var)
    #[arg(long, env = "PWATCH_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short)]
    pub format: Option<output::OutputFormat>,

    /// Log analysis events to stderr
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyse exports locally and print a per-period summary
    Analyze {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        params: AnalysisArgs,
    },

    /// List the dips detected in one reporting period
    Dips {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        params: AnalysisArgs,

        /// Reporting period (january, may)
        #[arg(long, default_value = "january")]
        period: ReportPeriod,
    },

    /// Send exports to a prodwatch service for analysis
    Submit {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        params: AnalysisArgs,
    },

    /// Show service health
    Status,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let default_filter = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = config::Config::load()?;
    let format = cli
        .format
        .or_else(|| {
            config
                .default_format
                .as_deref()
                .and_then(|f| output::OutputFormat::from_str(f, true).ok())
        })
        .unwrap_or_default();
    let api_url = cli
        .api_url
        .or_else(|| config.api_url.clone())
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());

    match cli.command {
        Commands::Analyze { input, params } => {
            let analysis = params.apply(&config.analysis())?;
            analyze::analyze(analysis, &input, format)?;
        }
        Commands::Dips {
            input,
            params,
            period,
        } => {
            let analysis = params.apply(&config.analysis())?;
            analyze::dips(analysis, &input, period, format)?;
        }
        Commands::Submit { input, params } => {
            let client = client::ApiClient::new(&api_url)?;
            submit::submit(&client, &input, &params, format).await?;
        }
        Commands::Status => {
            let client = client::ApiClient::new(&api_url)?;
            status::status(&client, format).await?;
        }
    }

    Ok(())
}
