//! Revenue meter exports
//!
//! Utility meter exports start with a few metadata lines, then a header with
//! a `Date Time` and an `Export kWh` column.

use crate::error::InputError;
use crate::models::RevenueRecord;
use crate::normalizer::{parse_timestamp, RawTable};
use tracing::debug;

pub const DATE_TIME_COLUMN: &str = "Date Time";
pub const EXPORT_COLUMN: &str = "Export kWh";

/// Parse revenue meter rows from an already-read table
pub fn parse_revenue(table: &RawTable) -> Result<Vec<RevenueRecord>, InputError> {
    let (time_idx, export_idx) = match (
        table.column_index(DATE_TIME_COLUMN),
        table.column_index(EXPORT_COLUMN),
    ) {
        (Some(time_idx), Some(export_idx)) => (time_idx, export_idx),
        (time_idx, export_idx) => {
            let missing = [(DATE_TIME_COLUMN, time_idx), (EXPORT_COLUMN, export_idx)]
                .into_iter()
                .filter(|(_, idx)| idx.is_none())
                .map(|(name, _)| name.to_string())
                .collect();
            return Err(InputError::MissingColumns(missing));
        }
    };
    if table.is_empty() {
        return Err(InputError::EmptyInput);
    }

    let records: Vec<RevenueRecord> = (0..table.len())
        .map(|row| {
            let label = table.cell(row, time_idx);
            RevenueRecord {
                time: parse_timestamp(label),
                time_label: label.to_string(),
                exported_kwh: table
                    .cell(row, export_idx)
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .unwrap_or(0.0),
            }
        })
        .collect();

    debug!(rows = records.len(), "Parsed revenue meter export");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REVENUE_CSV: &str = "\
Meter ID,NMI 4102
Site,Example Solar Farm
Interval,5 min
Units,kWh
Generated,2024-06-01
Date Time,Import kWh,Export kWh
2024-05-01 10:00:00,0,12.5
2024-05-01 10:05:00,0,n/a
2024-05-01 10:10:00,0,13.0
";

    #[test]
    fn test_parses_after_metadata_lines() {
        let table = RawTable::from_csv_str(REVENUE_CSV, 5).unwrap();
        let records = parse_revenue(&table).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].exported_kwh, 12.5);
        assert_eq!(records[1].exported_kwh, 0.0);
        assert!(records[2].time.is_some());
        assert_eq!(records[2].time_label, "2024-05-01 10:10:00");
    }

    #[test]
    fn test_missing_columns_listed() {
        let table = RawTable::from_csv_str("Time,Import kWh\n2024-05-01 10:00:00,1\n", 0).unwrap();
        assert_eq!(
            parse_revenue(&table),
            Err(InputError::MissingColumns(vec![
                "Date Time".to_string(),
                "Export kWh".to_string()
            ]))
        );
    }

    #[test]
    fn test_header_only_is_empty_input() {
        let table = RawTable::from_csv_str("Date Time,Export kWh\n", 0).unwrap();
        assert_eq!(parse_revenue(&table), Err(InputError::EmptyInput));
    }
}
