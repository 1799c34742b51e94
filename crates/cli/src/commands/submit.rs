//! Remote analysis through a running service

use anyhow::Result;
use std::collections::BTreeMap;

use super::{read_file, AnalysisArgs, InputArgs};
use crate::client::{AnalyzeBody, ApiClient};
use crate::output::{print_report, OutputFormat};

/// Build the request body; only flags given on the command line are sent,
/// so the service keeps its own defaults for the rest
pub fn build_body(input: &InputArgs, params: &AnalysisArgs) -> Result<AnalyzeBody> {
    let mut revenue_csv = BTreeMap::new();
    for (period, path) in input.revenue_paths() {
        revenue_csv.insert(period, read_file(path)?);
    }

    let overrides = params.overrides();
    Ok(AnalyzeBody {
        production_csv: read_file(&input.production)?,
        revenue_csv,
        config: (!overrides.is_empty()).then(|| serde_json::Value::Object(overrides)),
    })
}

pub async fn submit(
    client: &ApiClient,
    input: &InputArgs,
    params: &AnalysisArgs,
    format: OutputFormat,
) -> Result<()> {
    let body = build_body(input, params)?;
    let report = client.analyze(&body).await?;
    print_report(&report, format)
}
