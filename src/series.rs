/// Cumulative success/failure series over time.
use crate::record::{LogRecord, Status};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A record with the running counts up to and including it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub process: String,
    pub status: Status,
    pub success_count: u64,
    pub failure_count: u64,
}

/// KPI totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub successes: u64,
    pub failures: u64,
    pub runs: u64,
}

/// Sort records by timestamp (ties keep input order) and attach running
/// counts.
pub fn build_series(mut records: Vec<LogRecord>) -> Vec<SeriesPoint> {
    records.sort_by_key(|r| r.timestamp);

    let mut success_count = 0u64;
    let mut failure_count = 0u64;
    records
        .into_iter()
        .map(|r| {
            match r.status {
                Status::Success => success_count += 1,
                Status::Failure => failure_count += 1,
            }
            SeriesPoint {
                timestamp: r.timestamp,
                process: r.process,
                status: r.status,
                success_count,
                failure_count,
            }
        })
        .collect()
}

/// Totals as of the last point.
pub fn totals(series: &[SeriesPoint]) -> Totals {
    match series.last() {
        Some(last) => Totals {
            successes: last.success_count,
            failures: last.failure_count,
            runs: last.success_count + last.failure_count,
        },
        None => Totals::default(),
    }
}

/// Raw rows, newest first.
pub fn raw_table(series: &[SeriesPoint]) -> Vec<LogRecord> {
    series
        .iter()
        .rev()
        .map(|p| LogRecord {
            timestamp: p.timestamp,
            process: p.process.clone(),
            status: p.status,
        })
        .collect()
}
