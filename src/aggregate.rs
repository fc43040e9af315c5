/// Log aggregation: read `<log_dir>/<process>.json` files and turn each
/// line carrying a `timestamp` and an `exit_code` into a [`LogRecord`].
///
/// Logs are append-only and may be read mid-write, so any line that does
/// not parse is dropped and counted rather than reported.
use crate::record::{parse_timestamp, LogRecord, Status};
use serde::Serialize;
use serde_json::Value;
use std::io::BufRead;
use std::path::{Path, PathBuf};

/// Counters for lines the aggregator dropped. Blank lines are not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SkippedLines {
    /// Not valid UTF-8, not valid JSON, or not a JSON object.
    pub malformed: u64,
    /// No `timestamp` or no numeric `exit_code`.
    pub missing_fields: u64,
    /// `timestamp` present but not parseable.
    pub bad_timestamp: u64,
}

impl SkippedLines {
    pub fn total(&self) -> u64 {
        self.malformed + self.missing_fields + self.bad_timestamp
    }

    fn add(&mut self, other: SkippedLines) {
        self.malformed += other.malformed;
        self.missing_fields += other.missing_fields;
        self.bad_timestamp += other.bad_timestamp;
    }
}

/// Records from every requested process, in request order then line order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregate {
    pub records: Vec<LogRecord>,
    pub skipped: SkippedLines,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Skip {
    Blank,
    Malformed,
    MissingFields,
    BadTimestamp,
}

/// Path of the log file for `process`.
pub fn log_path(log_dir: &Path, process: &str) -> PathBuf {
    log_dir.join(format!("{process}.json"))
}

/// Aggregate the logs of `process_names` under `log_dir`.
///
/// A process without a log file contributes nothing. A log file that
/// exists but cannot be read is logged and also contributes nothing.
pub fn aggregate<S: AsRef<str>>(process_names: &[S], log_dir: &Path) -> Aggregate {
    let mut out = Aggregate::default();
    for name in process_names {
        let name = name.as_ref();
        let path = log_path(log_dir, name);
        if !path.is_file() {
            continue;
        }
        match read_process_log(&path, name) {
            Ok(agg) => {
                out.records.extend(agg.records);
                out.skipped.add(agg.skipped);
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    path = %path.display(),
                    "failed to read process log"
                );
            }
        }
    }
    out
}

/// Parse one process log file.
///
/// Only failing to open the file is an error. A read error partway
/// through is logged and the lines read so far are kept.
pub fn read_process_log(path: &Path, process: &str) -> std::io::Result<Aggregate> {
    let file = std::fs::File::open(path)?;
    Ok(parse_lines(std::io::BufReader::new(file), process, path))
}

fn parse_lines<R: BufRead>(reader: R, process: &str, path: &Path) -> Aggregate {
    let mut out = Aggregate::default();
    for chunk in reader.split(b'\n') {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    path = %path.display(),
                    records = out.records.len(),
                    "failed to read process log"
                );
                break;
            }
        };
        let line = match std::str::from_utf8(&chunk) {
            Ok(line) => line,
            Err(_) => {
                out.skipped.malformed += 1;
                continue;
            }
        };
        match parse_line(line, process) {
            Ok(record) => out.records.push(record),
            Err(Skip::Blank) => {}
            Err(Skip::Malformed) => out.skipped.malformed += 1,
            Err(Skip::MissingFields) => out.skipped.missing_fields += 1,
            Err(Skip::BadTimestamp) => out.skipped.bad_timestamp += 1,
        }
    }
    out
}

fn parse_line(line: &str, process: &str) -> Result<LogRecord, Skip> {
    let line = line.trim();
    if line.is_empty() {
        return Err(Skip::Blank);
    }
    let v: Value = serde_json::from_str(line).map_err(|_| Skip::Malformed)?;
    let obj = v.as_object().ok_or(Skip::Malformed)?;

    let status = obj
        .get("exit_code")
        .and_then(status_from_exit_code)
        .ok_or(Skip::MissingFields)?;
    let raw_ts = obj
        .get("timestamp")
        .and_then(|t| t.as_str())
        .ok_or(Skip::MissingFields)?;
    let timestamp = parse_timestamp(raw_ts).ok_or(Skip::BadTimestamp)?;

    Ok(LogRecord {
        timestamp,
        process: process.to_string(),
        status,
    })
}

fn status_from_exit_code(v: &Value) -> Option<Status> {
    if let Some(code) = v.as_i64() {
        return Some(Status::from_exit_code(code));
    }
    // u64 above i64::MAX, or a float such as 0.0
    if v.as_u64().is_some() {
        return Some(Status::Failure);
    }
    v.as_f64().map(|f| {
        if f == 0.0 {
            Status::Success
        } else {
            Status::Failure
        }
    })
}
