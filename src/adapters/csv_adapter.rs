//! CSV file bar feed adapter.

use crate::domain::error::OrbtraderError;
use crate::domain::ohlcv::Bar;
use crate::ports::data_port::DataPort;
use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const TIMESTAMP_COLUMNS: [&str; 4] = ["caldt", "date", "datetime", "timestamp"];

const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"];

/// Reads bars from one header-based CSV file.
pub struct CsvAdapter {
    path: PathBuf,
}

struct Columns {
    timestamp: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self, OrbtraderError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let require = |name: &str| {
            find(name).ok_or_else(|| OrbtraderError::Data {
                reason: format!("missing {name} column"),
            })
        };

        let timestamp = TIMESTAMP_COLUMNS
            .iter()
            .find_map(|name| find(name))
            .ok_or_else(|| OrbtraderError::Data {
                reason: "missing timestamp column (caldt, Date, datetime or timestamp)".into(),
            })?;

        Ok(Columns {
            timestamp,
            open: require("open")?,
            high: require("high")?,
            low: require("low")?,
            close: require("close")?,
            volume: find("volume"),
        })
    }
}

impl CsvAdapter {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn read_all(&self) -> Result<Vec<Bar>, OrbtraderError> {
        let content = fs::read_to_string(&self.path).map_err(|e| OrbtraderError::Data {
            reason: format!("failed to read {}: {}", self.path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| OrbtraderError::Data {
                reason: format!("CSV header error: {}", e),
            })?
            .clone();
        let columns = Columns::from_headers(&headers)?;

        let mut bars = Vec::new();
        for (row, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| OrbtraderError::Data {
                reason: format!("CSV parse error: {}", e),
            })?;
            bars.push(parse_record(&record, &columns, row + 2)?);
        }
        Ok(bars)
    }
}

fn field<'r>(
    record: &'r StringRecord,
    index: usize,
    name: &str,
    line: usize,
) -> Result<&'r str, OrbtraderError> {
    record
        .get(index)
        .map(str::trim)
        .ok_or_else(|| OrbtraderError::Data {
            reason: format!("line {line}: missing {name} value"),
        })
}

fn price(
    record: &StringRecord,
    index: usize,
    name: &str,
    line: usize,
) -> Result<f64, OrbtraderError> {
    let raw = field(record, index, name, line)?;
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => Ok(value),
        _ => Err(OrbtraderError::Data {
            reason: format!("line {line}: invalid {name} value '{raw}'"),
        }),
    }
}

fn parse_record(
    record: &StringRecord,
    columns: &Columns,
    line: usize,
) -> Result<Bar, OrbtraderError> {
    let raw_ts = field(record, columns.timestamp, "timestamp", line)?;
    let timestamp = parse_timestamp(raw_ts).ok_or_else(|| OrbtraderError::Data {
        reason: format!("line {line}: invalid timestamp '{raw_ts}'"),
    })?;

    // Volume is optional and sometimes written as a float.
    let volume = match columns.volume {
        Some(index) => {
            let raw = field(record, index, "volume", line)?;
            if raw.is_empty() {
                0
            } else {
                raw.parse::<i64>()
                    .or_else(|_| raw.parse::<f64>().map(|v| v as i64))
                    .map_err(|_| OrbtraderError::Data {
                        reason: format!("line {line}: invalid volume value '{raw}'"),
                    })?
            }
        }
        None => 0,
    };

    Ok(Bar {
        timestamp,
        open: price(record, columns.open, "open", line)?,
        high: price(record, columns.high, "high", line)?,
        low: price(record, columns.low, "low", line)?,
        close: price(record, columns.close, "close", line)?,
        volume,
    })
}

/// Accepts minute timestamps with or without seconds, ISO `T` separators and
/// plain dates (taken as midnight).
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<Bar>, OrbtraderError> {
        let mut bars: Vec<Bar> = self
            .read_all()?
            .into_iter()
            .filter(|b| {
                start.is_none_or(|s| b.date() >= s) && end.is_none_or(|e| b.date() <= e)
            })
            .collect();

        bars.sort_by_key(|b| b.timestamp);
        if let Some(dup) = bars.windows(2).find(|w| w[0].timestamp == w[1].timestamp) {
            return Err(OrbtraderError::FeedOrder {
                timestamp: dup[1].timestamp,
            });
        }
        if bars.is_empty() {
            return Err(OrbtraderError::NoData {
                source_name: self.source_name(),
            });
        }

        debug!(source = %self.source_name(), bars = bars.len(), "loaded bars");
        Ok(bars)
    }

    fn source_name(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}
