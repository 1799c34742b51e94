//! Production vs revenue reconciliation
//!
//! Converts sensor production to kWh and subtracts the energy the revenue
//! meter recorded as exported, position by position.

use crate::error::ConfigError;
use crate::models::{NetPoint, RevenueRecord, Sample};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Converts summed channel readings to energy per sample interval
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyConverter {
    system_voltage: f64,
    interval_hours: f64,
}

impl EnergyConverter {
    pub fn new(system_voltage: f64, interval_hours: f64) -> Result<Self, ConfigError> {
        if !(system_voltage.is_finite() && system_voltage > 0.0) {
            return Err(ConfigError::SystemVoltage(system_voltage));
        }
        if !(interval_hours.is_finite() && interval_hours > 0.0) {
            return Err(ConfigError::SamplingInterval(interval_hours * 60.0));
        }
        Ok(Self {
            system_voltage,
            interval_hours,
        })
    }

    /// kWh delivered over one interval at the given production reading
    pub fn to_kwh(&self, production: f64) -> f64 {
        production * self.system_voltage / 1000.0 * self.interval_hours
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub points: Vec<NetPoint>,
    pub total_production_kwh: f64,
    pub total_exported_kwh: f64,
    pub total_net_kwh: f64,
    /// Samples and meter rows did not line up one to one
    pub length_mismatch: bool,
}

/// Align samples and meter rows by position and compute the net difference
pub fn reconcile(
    samples: &[Sample],
    revenue: &[RevenueRecord],
    converter: &EnergyConverter,
) -> Reconciliation {
    let length_mismatch = samples.len() != revenue.len();
    if length_mismatch {
        warn!(
            production_rows = samples.len(),
            revenue_rows = revenue.len(),
            "Production and revenue exports differ in length, reconciling the overlap"
        );
    }

    let points: Vec<NetPoint> = samples
        .iter()
        .zip(revenue)
        .map(|(sample, meter)| {
            let production_kwh = converter.to_kwh(sample.raw_production);
            NetPoint {
                timestamp: sample.timestamp,
                production_kwh,
                exported_kwh: meter.exported_kwh,
                net_kwh: production_kwh - meter.exported_kwh,
            }
        })
        .collect();

    let total_production_kwh = points.iter().map(|p| p.production_kwh).sum();
    let total_exported_kwh = points.iter().map(|p| p.exported_kwh).sum();
    let total_net_kwh = points.iter().map(|p| p.net_kwh).sum();

    Reconciliation {
        points,
        total_production_kwh,
        total_exported_kwh,
        total_net_kwh,
        length_mismatch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn samples(values: &[f64]) -> Vec<Sample> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 3)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Sample::new(start + chrono::Duration::minutes(5 * i as i64), *v))
            .collect()
    }

    fn meter(values: &[f64]) -> Vec<RevenueRecord> {
        values
            .iter()
            .map(|v| RevenueRecord {
                time: None,
                time_label: String::new(),
                exported_kwh: *v,
            })
            .collect()
    }

    #[test]
    fn test_kwh_conversion() {
        let converter = EnergyConverter::new(1500.0, 5.0 / 60.0).unwrap();
        // 80 A at 1500 V for 5 minutes = 10 kWh
        assert!((converter.to_kwh(80.0) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_net_is_production_minus_export() {
        let converter = EnergyConverter::new(1500.0, 5.0 / 60.0).unwrap();
        let result = reconcile(&samples(&[80.0, 40.0]), &meter(&[9.0, 5.5]), &converter);

        assert_eq!(result.points.len(), 2);
        assert!((result.points[0].net_kwh - 1.0).abs() < 1e-12);
        assert!((result.points[1].net_kwh + 0.5).abs() < 1e-12);
        assert!((result.total_net_kwh - 0.5).abs() < 1e-12);
        assert!(!result.length_mismatch);
    }

    #[test]
    fn test_length_mismatch_uses_overlap() {
        let converter = EnergyConverter::new(1500.0, 5.0 / 60.0).unwrap();
        let result = reconcile(&samples(&[80.0, 80.0, 80.0]), &meter(&[1.0]), &converter);

        assert_eq!(result.points.len(), 1);
        assert!(result.length_mismatch);
    }

    #[test]
    fn test_rejects_bad_voltage() {
        assert_eq!(
            EnergyConverter::new(0.0, 0.1),
            Err(ConfigError::SystemVoltage(0.0))
        );
    }
}
