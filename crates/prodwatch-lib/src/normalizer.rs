//! Series normalization
//!
//! Turns raw exported rows into a time-ordered [`Sample`] series:
//! - Production channels are resolved once per schema from a [`ChannelSelector`]
//! - Each row's production is the sum across those channels
//! - Rows whose timestamp does not parse are dropped and counted

use crate::error::{ConfigError, InputError};
use crate::models::{NormalizeStats, Sample};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::debug;

/// Timestamp layouts accepted by [`parse_timestamp`], tried in order
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Header plus records of one CSV export
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    headers: Vec<String>,
    records: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, records: Vec<Vec<String>>) -> Self {
        Self { headers, records }
    }

    /// Read a CSV export, discarding `skip_rows` metadata lines before the header
    pub fn from_reader<R: Read>(reader: R, skip_rows: usize) -> Result<Self, InputError> {
        let mut reader = BufReader::new(reader);
        let mut discarded = String::new();
        for _ in 0..skip_rows {
            discarded.clear();
            let read = reader
                .read_line(&mut discarded)
                .map_err(|e| InputError::Unreadable(e.to_string()))?;
            if read == 0 {
                return Err(InputError::EmptyInput);
            }
        }

        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
        let mut records = Vec::new();
        for result in csv_reader.records() {
            let record = result?;
            records.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, records })
    }

    pub fn from_csv_str(content: &str, skip_rows: usize) -> Result<Self, InputError> {
        Self::from_reader(content.as_bytes(), skip_rows)
    }

    pub fn from_path(path: impl AsRef<Path>, skip_rows: usize) -> Result<Self, InputError> {
        let file = std::fs::File::open(path.as_ref()).map_err(|e| {
            InputError::Unreadable(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_reader(file, skip_rows)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell by row and column index; short rows read as blank
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.records
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Which input columns carry production readings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChannelSelector {
    /// Columns whose name contains every marker
    Markers { all_of: Vec<String> },
    /// Exactly these columns (those present in the input are used)
    Columns { names: Vec<String> },
}

impl Default for ChannelSelector {
    fn default() -> Self {
        ChannelSelector::Markers {
            all_of: vec!["dci".to_string(), "/5min".to_string()],
        }
    }
}

impl ChannelSelector {
    pub fn markers<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ChannelSelector::Markers {
            all_of: markers.into_iter().map(Into::into).collect(),
        }
    }

    pub fn columns<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ChannelSelector::Columns {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let empty = match self {
            ChannelSelector::Markers { all_of } => all_of.is_empty(),
            ChannelSelector::Columns { names } => names.is_empty(),
        };
        if empty {
            Err(ConfigError::EmptyChannelSelector)
        } else {
            Ok(())
        }
    }

    pub fn matches(&self, column: &str) -> bool {
        match self {
            ChannelSelector::Markers { all_of } => {
                !all_of.is_empty() && all_of.iter().all(|m| column.contains(m.as_str()))
            }
            ChannelSelector::Columns { names } => names.iter().any(|n| n == column),
        }
    }

    /// Resolve matching columns to (index, name) pairs in header order
    pub fn resolve(&self, headers: &[String]) -> Vec<(usize, String)> {
        headers
            .iter()
            .enumerate()
            .filter(|(_, h)| self.matches(h))
            .map(|(i, h)| (i, h.clone()))
            .collect()
    }
}

/// Column layout resolved once per input schema
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSchema {
    pub timestamp_index: usize,
    pub channels: Vec<(usize, String)>,
}

/// Normalizer output
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSeries {
    pub samples: Vec<Sample>,
    pub stats: NormalizeStats,
}

/// Builds a sorted sample series from raw rows
#[derive(Debug, Clone)]
pub struct SeriesNormalizer {
    selector: ChannelSelector,
    timestamp_column: String,
}

impl SeriesNormalizer {
    pub fn new(selector: ChannelSelector, timestamp_column: impl Into<String>) -> Self {
        Self {
            selector,
            timestamp_column: timestamp_column.into(),
        }
    }

    pub fn timestamp_column(&self) -> &str {
        &self.timestamp_column
    }

    /// Resolve channel and timestamp columns for a header row
    pub fn resolve(&self, headers: &[String]) -> Result<ResolvedSchema, InputError> {
        let channels = self.selector.resolve(headers);
        if channels.is_empty() {
            return Err(InputError::NoProductionChannels);
        }

        let timestamp_index = headers
            .iter()
            .position(|h| *h == self.timestamp_column)
            .ok_or_else(|| InputError::MissingTimestampColumn(self.timestamp_column.clone()))?;

        Ok(ResolvedSchema {
            timestamp_index,
            channels,
        })
    }

    pub fn normalize(&self, table: &RawTable) -> Result<NormalizedSeries, InputError> {
        if table.is_empty() {
            return Err(InputError::EmptyInput);
        }

        let schema = self.resolve(table.headers())?;
        debug!(
            channels = schema.channels.len(),
            rows = table.len(),
            "Resolved production schema"
        );

        let mut samples = Vec::with_capacity(table.len());
        let mut rows_skipped = 0;

        for row in 0..table.len() {
            let raw_ts = table.cell(row, schema.timestamp_index);
            let Some(timestamp) = parse_timestamp(raw_ts) else {
                debug!(row, value = %raw_ts, "Dropping row with unparseable timestamp");
                rows_skipped += 1;
                continue;
            };

            let total: f64 = schema
                .channels
                .iter()
                .map(|(column, _)| parse_reading(table.cell(row, *column)))
                .sum();

            samples.push(Sample::new(timestamp, total.max(0.0)));
        }

        if samples.is_empty() {
            return Err(InputError::NoUsableRows(self.timestamp_column.clone()));
        }

        if rows_skipped > 0 {
            debug!(
                rows_skipped,
                rows_read = table.len(),
                "Dropped rows with invalid timestamps"
            );
        }

        // Stable: equal timestamps keep input order
        samples.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

        Ok(NormalizedSeries {
            samples,
            stats: NormalizeStats {
                rows_read: table.len(),
                rows_skipped,
                channels: schema.channels.into_iter().map(|(_, name)| name).collect(),
            },
        })
    }
}

/// Parse a timestamp cell; offsets are dropped in favour of the local wall-clock time
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    for format in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Some(ts);
        }
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.naive_local());
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Blank or non-numeric readings count as zero
fn parse_reading(value: &str) -> f64 {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PRODUCTION_CSV: &str = "\
sitetime,inv1 dci /5min,inv2 dci /5min,ambient temp
2024-01-15 10:05:00,40,60,21.5
2024-01-15 10:00:00,30,20,21.0
not a date,10,10,20.0
2024-01-15 10:10:00,,25,22.0
";

    fn normalizer() -> SeriesNormalizer {
        SeriesNormalizer::new(ChannelSelector::default(), "sitetime")
    }

    #[test]
    fn test_sums_matching_channels_and_sorts() {
        let table = RawTable::from_csv_str(PRODUCTION_CSV, 0).unwrap();
        let series = normalizer().normalize(&table).unwrap();

        let totals: Vec<f64> = series.samples.iter().map(|s| s.raw_production).collect();
        assert_eq!(totals, vec![50.0, 100.0, 25.0]);
        assert!(series
            .samples
            .windows(2)
            .all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(
            series.stats.channels,
            vec!["inv1 dci /5min".to_string(), "inv2 dci /5min".to_string()]
        );
    }

    #[test]
    fn test_invalid_timestamp_rows_are_dropped_not_fatal() {
        let table = RawTable::from_csv_str(PRODUCTION_CSV, 0).unwrap();
        let series = normalizer().normalize(&table).unwrap();

        assert_eq!(series.stats.rows_read, 4);
        assert_eq!(series.stats.rows_skipped, 1);
        assert_eq!(series.samples.len(), 3);
    }

    #[test]
    fn test_empty_input_is_input_error() {
        let table = RawTable::from_csv_str("sitetime,inv1 dci /5min\n", 0).unwrap();
        assert_eq!(
            normalizer().normalize(&table),
            Err(InputError::EmptyInput)
        );
    }

    #[test]
    fn test_non_matching_channels_is_input_error() {
        let table =
            RawTable::from_csv_str("sitetime,inverter power\n2024-01-15 10:00:00,5\n", 0).unwrap();
        let err = normalizer().normalize(&table).unwrap_err();

        assert_eq!(err, InputError::NoProductionChannels);
        assert!(err
            .to_string()
            .to_lowercase()
            .contains("no valid energy production columns"));
    }

    #[test]
    fn test_missing_timestamp_column_is_input_error() {
        let table = RawTable::from_csv_str("time,a dci /5min\n2024-01-15 10:00:00,5\n", 0).unwrap();
        assert_eq!(
            normalizer().normalize(&table),
            Err(InputError::MissingTimestampColumn("sitetime".to_string()))
        );
    }

    #[test]
    fn test_all_timestamps_invalid_is_input_error() {
        let table = RawTable::from_csv_str("sitetime,a dci /5min\nnope,5\nnever,6\n", 0).unwrap();
        assert_eq!(
            normalizer().normalize(&table),
            Err(InputError::NoUsableRows("sitetime".to_string()))
        );
    }

    #[test]
    fn test_explicit_column_selector() {
        let selector = ChannelSelector::columns(["inv2 dci /5min"]);
        let table = RawTable::from_csv_str(PRODUCTION_CSV, 0).unwrap();
        let series = SeriesNormalizer::new(selector, "sitetime")
            .normalize(&table)
            .unwrap();

        let totals: Vec<f64> = series.samples.iter().map(|s| s.raw_production).collect();
        assert_eq!(totals, vec![20.0, 60.0, 25.0]);
    }

    #[test]
    fn test_negative_total_clamped_to_zero() {
        let table =
            RawTable::from_csv_str("sitetime,a dci /5min\n2024-01-15 10:00:00,-3\n", 0).unwrap();
        let series = normalizer().normalize(&table).unwrap();
        assert_eq!(series.samples[0].raw_production, 0.0);
    }

    #[test]
    fn test_skip_rows_and_load_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "Meter: 1234\nSite: North\nUnits: kWh\nExported by portal\n\nsitetime,x dci /5min\n2024-05-01 11:00:00,7\n"
        )
        .unwrap();

        let table = RawTable::from_path(file.path(), 5).unwrap();
        assert_eq!(table.headers(), &["sitetime".to_string(), "x dci /5min".to_string()]);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 3)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap();

        assert_eq!(parse_timestamp("2024-05-03 12:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-03T12:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-03 12:30"), Some(expected));
        assert_eq!(parse_timestamp("03/05/2024 12:30"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-03T12:30:00+10:00"), Some(expected));
        assert_eq!(parse_timestamp("garbage"), None);
        assert_eq!(parse_timestamp(""), None);
    }
}
