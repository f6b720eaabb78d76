//! Intraday OHLCV bar representation.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// One minute of trading for a single instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl Bar {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn time(&self) -> NaiveTime {
        self.timestamp.time()
    }

    /// high - low
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

/// Number of distinct calendar days covered by an ordered bar slice.
pub fn count_sessions(bars: &[Bar]) -> usize {
    let mut sessions = 0;
    let mut last: Option<NaiveDate> = None;
    for bar in bars {
        if last != Some(bar.date()) {
            sessions += 1;
            last = Some(bar.date());
        }
    }
    sessions
}
