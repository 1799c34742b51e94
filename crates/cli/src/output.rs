//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use prodwatch_lib::{AnalysisReport, Dip, PeriodReport};
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

#[derive(Tabled)]
struct PeriodRow {
    #[tabled(rename = "Period")]
    period: String,
    #[tabled(rename = "Samples")]
    samples: usize,
    #[tabled(rename = "Anomalous")]
    anomalous: usize,
    #[tabled(rename = "Dips")]
    dips: usize,
    #[tabled(rename = "Longest")]
    longest: String,
    #[tabled(rename = "Energy Lost")]
    energy_lost: String,
    #[tabled(rename = "Net kWh")]
    net_kwh: String,
}

#[derive(Tabled)]
struct DipRow {
    #[tabled(rename = "Start")]
    start: String,
    #[tabled(rename = "End")]
    end: String,
    #[tabled(rename = "Duration")]
    duration: String,
    #[tabled(rename = "Samples")]
    samples: usize,
    #[tabled(rename = "Energy Lost")]
    energy_lost: String,
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

pub fn format_energy(value: f64) -> String {
    format!("{:.2}", value)
}

pub fn format_kwh(value: f64) -> String {
    format!("{:.2} kWh", value)
}

/// Minutes as `45m` or `2h 05m`
pub fn format_minutes(minutes: f64) -> String {
    let total = minutes.round() as i64;
    if total >= 60 {
        format!("{}h {:02}m", total / 60, total % 60)
    } else {
        format!("{}m", total)
    }
}

/// Red when anything was lost
pub fn color_energy(value: f64) -> String {
    let formatted = format_energy(value);
    if value > 0.0 {
        formatted.red().to_string()
    } else {
        formatted.green().to_string()
    }
}

/// Surplus green, deficit red
pub fn color_net(value: f64) -> String {
    let formatted = format_kwh(value);
    if value < 0.0 {
        formatted.red().to_string()
    } else {
        formatted.green().to_string()
    }
}

pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "healthy" | "ready" => status.green().to_string(),
        "degraded" => status.yellow().to_string(),
        "unhealthy" | "not ready" => status.red().to_string(),
        _ => status.to_string(),
    }
}

fn period_row(report: &PeriodReport) -> PeriodRow {
    let summary = &report.output.summary;
    PeriodRow {
        period: report.period.to_string(),
        samples: summary.sample_count,
        anomalous: summary.anomalous_samples,
        dips: summary.dip_count,
        longest: format_minutes(summary.longest_dip_minutes),
        energy_lost: color_energy(summary.total_energy_lost),
        net_kwh: report
            .reconciliation
            .as_ref()
            .map(|r| color_net(r.total_net_kwh))
            .unwrap_or_else(|| "-".dimmed().to_string()),
    }
}

fn dip_row(dip: &Dip) -> DipRow {
    DipRow {
        start: dip.start_time.format("%Y-%m-%d %H:%M").to_string(),
        end: dip.end_time.format("%H:%M").to_string(),
        duration: format_minutes(dip.duration_minutes),
        samples: dip.sample_count,
        energy_lost: format_energy(dip.energy_lost),
    }
}

pub fn print_report(report: &AnalysisReport, format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        return print_json(report);
    }

    println!("{}", "Production Report".bold());
    println!("{}", "=".repeat(50));
    println!(
        "Rows read:              {} ({} skipped)",
        report.stats.rows_read, report.stats.rows_skipped
    );
    println!("Channels:               {}", report.stats.channels.len());
    println!(
        "Generated:              {}",
        report
            .generated_at
            .format("%Y-%m-%d %H:%M:%S UTC")
            .to_string()
            .dimmed()
    );
    println!();

    let rows: Vec<PeriodRow> = report.periods.iter().map(period_row).collect();
    println!("{}", Table::new(rows).with(Style::rounded()));

    for period in &report.periods {
        let Some(reconciliation) = &period.reconciliation else {
            continue;
        };
        println!();
        println!("{} ({})", "Revenue Reconciliation".bold(), period.period);
        println!("{}", "-".repeat(50));
        println!(
            "Production:             {}",
            format_kwh(reconciliation.total_production_kwh)
        );
        println!(
            "Exported:               {}",
            format_kwh(reconciliation.total_exported_kwh)
        );
        println!(
            "Net:                    {}",
            color_net(reconciliation.total_net_kwh)
        );
        if reconciliation.length_mismatch {
            print_warning("Production and revenue exports differ in length; only the overlap was compared");
        }
    }

    if report.stats.rows_skipped > 0 {
        println!();
        print_warning(&format!(
            "{} rows dropped for unparseable timestamps",
            report.stats.rows_skipped
        ));
    }

    Ok(())
}

pub fn print_dips(report: &PeriodReport, format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        return print_json(&report.output.dips);
    }

    if report.output.dips.is_empty() {
        print_info(&format!("No dips detected in {}", report.period));
        return Ok(());
    }

    let rows: Vec<DipRow> = report.output.dips.iter().map(dip_row).collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
    println!(
        "{} {} dips, {} lost",
        "Total:".bold(),
        report.output.summary.dip_count,
        color_energy(report.output.summary.total_energy_lost)
    );
    Ok(())
}
