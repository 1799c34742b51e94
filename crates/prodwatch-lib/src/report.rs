//! Per-period production reports
//!
//! A production export is normalized once, split by reporting period, and
//! each period then runs the dip pipeline on its own. When a revenue meter
//! export is supplied for a period, it is reconciled against the sensor
//! production.

use crate::anomaly::{check_conservation, total_from_dips, total_from_samples};
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, AnalysisResult, ConfigError, InputError};
use crate::models::{NormalizeStats, RevenueRecord, Sample};
use crate::normalizer::{RawTable, SeriesNormalizer};
use crate::observability::StructuredLogger;
use crate::pipeline::{DipPipeline, PipelineOutput};
use crate::reconcile::{reconcile, EnergyConverter, Reconciliation};
use crate::revenue::parse_revenue;
use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportPeriod {
    January,
    May,
}

impl ReportPeriod {
    pub const ALL: [ReportPeriod; 2] = [ReportPeriod::January, ReportPeriod::May];

    pub fn month(&self) -> u32 {
        match self {
            ReportPeriod::January => 1,
            ReportPeriod::May => 5,
        }
    }

    /// Period a timestamp falls in, if any
    pub fn of(timestamp: &NaiveDateTime) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|period| period.month() == timestamp.month())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportPeriod::January => "january",
            ReportPeriod::May => "may",
        }
    }
}

impl std::fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReportPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "january" | "jan" => Ok(ReportPeriod::January),
            "may" => Ok(ReportPeriod::May),
            other => Err(format!("unknown report period '{}'", other)),
        }
    }
}

/// Raw tables for one analysis run
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub production: RawTable,
    pub revenue: BTreeMap<ReportPeriod, RawTable>,
}

impl ReportRequest {
    pub fn new(production: RawTable) -> Self {
        Self {
            production,
            revenue: BTreeMap::new(),
        }
    }

    pub fn with_revenue(mut self, period: ReportPeriod, table: RawTable) -> Self {
        self.revenue.insert(period, table);
        self
    }

    /// Read CSV text; revenue exports skip their metadata preamble
    pub fn from_csv<'a, I>(
        production: &str,
        revenue: I,
        revenue_skip_rows: usize,
    ) -> Result<Self, InputError>
    where
        I: IntoIterator<Item = (ReportPeriod, &'a str)>,
    {
        let mut request = Self::new(RawTable::from_csv_str(production, 0)?);
        for (period, content) in revenue {
            request = request.with_revenue(period, RawTable::from_csv_str(content, revenue_skip_rows)?);
        }
        Ok(request)
    }
}

/// One period's validated input, ready to run independently
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodInput {
    pub period: ReportPeriod,
    pub samples: Vec<Sample>,
    pub revenue: Option<Vec<RevenueRecord>>,
}

/// All validated inputs of a request
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedReport {
    pub stats: NormalizeStats,
    pub periods: Vec<PeriodInput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodReport {
    pub period: ReportPeriod,
    #[serde(flatten)]
    pub output: PipelineOutput,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconciliation: Option<Reconciliation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub generated_at: DateTime<Utc>,
    pub stats: NormalizeStats,
    pub periods: Vec<PeriodReport>,
}

impl AnalysisReport {
    pub fn period(&self, period: ReportPeriod) -> Option<&PeriodReport> {
        self.periods.iter().find(|report| report.period == period)
    }

    pub fn total_energy_lost(&self) -> f64 {
        self.periods
            .iter()
            .map(|report| report.output.summary.total_energy_lost)
            .sum()
    }
}

/// Validated configuration bound to a ready pipeline
#[derive(Debug, Clone)]
pub struct Analyzer {
    config: AnalysisConfig,
    pipeline: DipPipeline,
    normalizer: SeriesNormalizer,
    converter: EnergyConverter,
    logger: StructuredLogger,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let pipeline = DipPipeline::from_config(&config)?;
        let normalizer =
            SeriesNormalizer::new(config.channels.clone(), config.timestamp_column.clone());
        let converter = EnergyConverter::new(config.system_voltage, config.interval_hours())?;
        let logger = StructuredLogger::new(config.site_name.clone());

        Ok(Self {
            config,
            pipeline,
            normalizer,
            converter,
            logger,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &DipPipeline {
        &self.pipeline
    }

    /// Normalize and split the request; fails before any period runs
    pub fn prepare(&self, request: &ReportRequest) -> AnalysisResult<PreparedReport> {
        let series = self.normalizer.normalize(&request.production)?;
        self.logger.log_normalized(&series.stats);

        let mut by_period: BTreeMap<ReportPeriod, Vec<Sample>> = ReportPeriod::ALL
            .into_iter()
            .map(|period| (period, Vec::new()))
            .collect();
        for sample in series.samples {
            if let Some(period) = ReportPeriod::of(&sample.timestamp) {
                by_period.entry(period).or_default().push(sample);
            }
        }

        let mut revenue = BTreeMap::new();
        for (period, table) in &request.revenue {
            revenue.insert(*period, parse_revenue(table)?);
        }

        let periods = by_period
            .into_iter()
            .map(|(period, samples)| PeriodInput {
                period,
                samples,
                revenue: revenue.remove(&period),
            })
            .collect();

        Ok(PreparedReport {
            stats: series.stats,
            periods,
        })
    }

    /// Run one period; infallible once inputs are prepared
    pub fn analyze_period(&self, input: PeriodInput) -> PeriodReport {
        let period = input.period;
        let output = self.pipeline.run(input.samples);

        for dip in &output.dips {
            self.logger.log_dip(period.as_str(), dip);
        }
        if check_conservation(&output.samples, &output.dips).is_err() {
            self.logger.log_conservation_mismatch(
                period.as_str(),
                total_from_dips(&output.dips),
                total_from_samples(&output.samples),
            );
        }
        self.logger.log_period_analyzed(period.as_str(), &output.summary);

        let reconciliation = input
            .revenue
            .map(|records| reconcile(&output.samples, &records, &self.converter));

        PeriodReport {
            period,
            output,
            reconciliation,
        }
    }

    pub fn assemble(&self, stats: NormalizeStats, mut periods: Vec<PeriodReport>) -> AnalysisReport {
        periods.sort_by_key(|report| report.period);
        AnalysisReport {
            generated_at: Utc::now(),
            stats,
            periods,
        }
    }

    /// Full request, periods run sequentially
    pub fn analyze(&self, request: &ReportRequest) -> AnalysisResult<AnalysisReport> {
        let prepared = self.prepare(request)?;
        let periods = prepared
            .periods
            .into_iter()
            .map(|input| self.analyze_period(input))
            .collect();
        Ok(self.assemble(prepared.stats, periods))
    }
}
