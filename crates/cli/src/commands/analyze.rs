//! Local analysis commands

use anyhow::{Context, Result};
use prodwatch_lib::{AnalysisConfig, AnalysisReport, Analyzer, RawTable, ReportPeriod, ReportRequest};

use super::InputArgs;
use crate::output::{print_dips, print_report, OutputFormat};

/// Load the production export and any revenue exports from disk
pub fn load_request(input: &InputArgs, revenue_skip_rows: usize) -> Result<ReportRequest> {
    let production = RawTable::from_path(&input.production, 0)
        .with_context(|| format!("Failed to load {}", input.production.display()))?;

    let mut request = ReportRequest::new(production);
    for (period, path) in input.revenue_paths() {
        let table = RawTable::from_path(path, revenue_skip_rows)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        request = request.with_revenue(period, table);
    }
    Ok(request)
}

pub fn run_report(config: AnalysisConfig, input: &InputArgs) -> Result<AnalysisReport> {
    let analyzer = Analyzer::new(config).context("Invalid analysis parameters")?;
    let request = load_request(input, analyzer.config().revenue_skip_rows)?;
    Ok(analyzer.analyze(&request)?)
}

pub fn analyze(config: AnalysisConfig, input: &InputArgs, format: OutputFormat) -> Result<()> {
    let report = run_report(config, input)?;
    print_report(&report, format)
}

pub fn dips(
    config: AnalysisConfig,
    input: &InputArgs,
    period: ReportPeriod,
    format: OutputFormat,
) -> Result<()> {
    let report = run_report(config, input)?;
    let period_report = report
        .period(period)
        .with_context(|| format!("No {} period in report", period))?;
    print_dips(period_report, format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_report_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let production = write(
            &dir,
            "production.csv",
            "sitetime,inv1 dci /5min\n\
             2024-05-02 11:00:00,100\n\
             2024-05-02 11:05:00,100\n\
             2024-05-02 11:10:00,20\n\
             2024-05-02 11:15:00,100\n",
        );
        let revenue = write(
            &dir,
            "may.csv",
            "m\nm\nm\nm\nm\nDate Time,Export kWh\n\
             2024-05-02 11:00:00,12\n\
             2024-05-02 11:05:00,12\n\
             2024-05-02 11:10:00,2\n\
             2024-05-02 11:15:00,12\n",
        );

        let input = InputArgs {
            production,
            revenue_january: None,
            revenue_may: Some(revenue),
        };
        let report = run_report(AnalysisConfig::default(), &input).unwrap();

        let may = report.period(ReportPeriod::May).unwrap();
        assert_eq!(may.output.dips.len(), 1);
        let reconciliation = may.reconciliation.as_ref().unwrap();
        assert_eq!(reconciliation.points.len(), 4);
        // 100 A at 1500 V over 5 minutes is 12.5 kWh
        assert!((reconciliation.points[0].net_kwh - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_missing_file_names_path() {
        let input = InputArgs {
            production: PathBuf::from("/nonexistent/production.csv"),
            revenue_january: None,
            revenue_may: None,
        };
        let err = run_report(AnalysisConfig::default(), &input).unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/production.csv"));
    }
}
