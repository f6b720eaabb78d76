//! Early-close session calendar.

use chrono::NaiveDateTime;
use std::collections::BTreeSet;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Last minute bars of the half-day sessions in the bundled intraday history.
pub const DEFAULT_EARLY_CLOSES: [&str; 6] = [
    "2017-07-03 12:59:00",
    "2018-07-03 12:59:00",
    "2018-11-23 12:59:00",
    "2019-12-24 12:59:00",
    "2020-11-27 12:59:00",
    "2020-12-24 12:59:00",
];

/// Set of exact `(date, time)` instants at which positions are flattened.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EarlyCloseCalendar {
    closes: BTreeSet<NaiveDateTime>,
}

impl EarlyCloseCalendar {
    pub fn new<I: IntoIterator<Item = NaiveDateTime>>(closes: I) -> Self {
        EarlyCloseCalendar {
            closes: closes.into_iter().collect(),
        }
    }

    /// Parses a comma-separated list of `YYYY-MM-DD HH:MM:SS` entries.
    ///
    /// Returns the offending entry on failure.
    pub fn parse_list(list: &str) -> Result<Self, String> {
        let mut closes = BTreeSet::new();
        for entry in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let ts = NaiveDateTime::parse_from_str(entry, TIMESTAMP_FORMAT)
                .map_err(|_| entry.to_string())?;
            closes.insert(ts);
        }
        Ok(EarlyCloseCalendar { closes })
    }

    pub fn is_early_close(&self, timestamp: NaiveDateTime) -> bool {
        self.closes.contains(&timestamp)
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }
}

/// The built-in half-day list.
pub fn default_calendar() -> EarlyCloseCalendar {
    EarlyCloseCalendar::new(
        DEFAULT_EARLY_CLOSES
            .iter()
            .filter_map(|s| NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).ok()),
    )
}
