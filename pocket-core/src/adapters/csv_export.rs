//! CSV chart exporter
//!
//! Writes the balance series as `timestamp,delta,running_balance` rows so any
//! spreadsheet or plotting tool can draw the chart.

use csv::WriterBuilder;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::result::{Error, Result};
use crate::domain::{BalancePoint, UserId};
use crate::ports::{ChartArtifact, ChartExporter};

pub const CSV_MEDIA_TYPE: &str = "text/csv";

#[derive(Serialize)]
struct CsvRow {
    timestamp: String,
    delta: Decimal,
    running_balance: Decimal,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CsvChartExporter;

impl CsvChartExporter {
    pub fn new() -> Self {
        Self
    }
}

impl ChartExporter for CsvChartExporter {
    fn export(&self, _user: UserId, points: &[BalancePoint]) -> Result<ChartArtifact> {
        let mut writer = WriterBuilder::new().from_writer(Vec::new());

        // Header is written by the first serialize; an empty series still gets one
        if points.is_empty() {
            writer
                .write_record(["timestamp", "delta", "running_balance"])
                .map_err(csv_error)?;
        }
        for point in points {
            writer
                .serialize(CsvRow {
                    timestamp: point.timestamp.to_rfc3339(),
                    delta: point.delta,
                    running_balance: point.running_balance,
                })
                .map_err(csv_error)?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| Error::Other(format!("CSV export failed: {}", e)))?;

        Ok(ChartArtifact {
            media_type: CSV_MEDIA_TYPE.to_string(),
            bytes,
        })
    }
}

fn csv_error(err: csv::Error) -> Error {
    Error::Other(format!("CSV export failed: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_exports_series_rows() {
        let points = vec![
            BalancePoint {
                timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
                delta: Decimal::new(2000, 0),
                running_balance: Decimal::new(2000, 0),
            },
            BalancePoint {
                timestamp: Utc.with_ymd_and_hms(2024, 3, 2, 18, 30, 0).unwrap(),
                delta: Decimal::new(-5050, 1),
                running_balance: Decimal::new(14950, 1),
            },
        ];

        let artifact = CsvChartExporter::new().export(UserId(1), &points).unwrap();
        assert_eq!(artifact.media_type, "text/csv");

        let text = String::from_utf8(artifact.bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "timestamp,delta,running_balance");
        assert_eq!(lines[1], "2024-03-01T09:00:00+00:00,2000,2000");
        assert_eq!(lines[2], "2024-03-02T18:30:00+00:00,-505.0,1495.0");
    }

    #[test]
    fn test_empty_series_has_header_only() {
        let artifact = CsvChartExporter::new().export(UserId(1), &[]).unwrap();
        assert_eq!(
            String::from_utf8(artifact.bytes).unwrap(),
            "timestamp,delta,running_balance\n"
        );
    }
}
