#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use orbtrader::domain::backtest::BacktestConfig;
pub use orbtrader::domain::ohlcv::Bar;
use orbtrader::domain::cost_model::{CostModel, SlippageModel};
use orbtrader::domain::error::OrbtraderError;
use orbtrader::domain::execution::ExecutionConfig;
use orbtrader::ports::data_port::DataPort;
use std::collections::BTreeMap;

pub struct MockDataPort {
    pub name: String,
    pub bars: Vec<Bar>,
    pub error: Option<String>,
}

impl MockDataPort {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            bars: Vec::new(),
            error: None,
        }
    }

    pub fn with_bars(mut self, bars: Vec<Bar>) -> Self {
        self.bars.extend(bars);
        self
    }

    pub fn with_error(mut self, reason: &str) -> Self {
        self.error = Some(reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<Bar>, OrbtraderError> {
        if let Some(reason) = &self.error {
            return Err(OrbtraderError::Data {
                reason: reason.clone(),
            });
        }
        let bars: Vec<Bar> = self
            .bars
            .iter()
            .filter(|b| start.is_none_or(|s| b.date() >= s) && end.is_none_or(|e| b.date() <= e))
            .cloned()
            .collect();
        if bars.is_empty() {
            return Err(OrbtraderError::NoData {
                source_name: self.name.clone(),
            });
        }
        Ok(bars)
    }

    fn source_name(&self) -> String {
        self.name.clone()
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at(day: NaiveDate, h: u32, m: u32) -> NaiveDateTime {
    day.and_hms_opt(h, m, 0).unwrap()
}

pub fn make_bar(timestamp: NaiveDateTime, open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar {
        timestamp,
        open,
        high,
        low,
        close,
        volume: 1_000,
    }
}

/// One regular session of minute bars, 09:30 through the last minute.
pub struct SessionBuilder {
    day: NaiveDate,
    bars: BTreeMap<NaiveTime, Bar>,
}

impl SessionBuilder {
    /// Flat bars at `price` from 09:30 to 15:59.
    pub fn new(day: NaiveDate, price: f64) -> Self {
        Self::until(day, price, 15, 59)
    }

    /// Flat bars at `price` from 09:30 to `h:m` (half-day sessions).
    pub fn until(day: NaiveDate, price: f64, h: u32, m: u32) -> Self {
        let last = NaiveTime::from_hms_opt(h, m, 0).unwrap();
        let mut bars = BTreeMap::new();
        let mut ts = at(day, 9, 30);
        while ts.time() <= last {
            bars.insert(ts.time(), make_bar(ts, price, price, price, price));
            ts += chrono::Duration::minutes(1);
        }
        Self { day, bars }
    }

    /// Replaces the bar at `h:m`.
    pub fn bar(mut self, h: u32, m: u32, open: f64, high: f64, low: f64, close: f64) -> Self {
        let ts = at(self.day, h, m);
        self.bars.insert(ts.time(), make_bar(ts, open, high, low, close));
        self
    }

    /// Makes every bar from `h:m` onward flat at `price`.
    pub fn flat_from(mut self, h: u32, m: u32, price: f64) -> Self {
        let from = NaiveTime::from_hms_opt(h, m, 0).unwrap();
        for (_, bar) in self.bars.range_mut(from..) {
            bar.open = price;
            bar.high = price;
            bar.low = price;
            bar.close = price;
        }
        self
    }

    /// Drops the bar at `h:m`.
    pub fn without(mut self, h: u32, m: u32) -> Self {
        self.bars.remove(&NaiveTime::from_hms_opt(h, m, 0).unwrap());
        self
    }

    pub fn build(self) -> Vec<Bar> {
        self.bars.into_values().collect()
    }
}

/// Opening range 99..101 on an open of 100, then a 09:35 close of `decision_close`.
pub fn breakout_session(day: NaiveDate, decision_close: f64) -> SessionBuilder {
    SessionBuilder::new(day, 100.0)
        .bar(9, 30, 100.0, 101.0, 99.0, 100.0)
        .bar(9, 35, 100.0, decision_close.max(100.0), decision_close.min(100.0), decision_close)
}

/// A long day: range 99..101, close 102 at 09:35, 09:36 opens 102.5, drifts
/// at 103 and closes 104 at 15:59.
pub fn long_day(day: NaiveDate) -> Vec<Bar> {
    breakout_session(day, 102.0)
        .flat_from(9, 36, 103.0)
        .bar(9, 36, 102.5, 103.0, 102.4, 103.0)
        .bar(15, 59, 103.0, 104.0, 103.0, 104.0)
        .build()
}

/// A short day stopped out at 101 on the 10:00 bar.
pub fn stopped_short_day(day: NaiveDate) -> Vec<Bar> {
    breakout_session(day, 98.0)
        .flat_from(9, 36, 98.5)
        .bar(9, 36, 98.0, 98.5, 97.9, 98.5)
        .bar(10, 0, 99.0, 101.5, 98.8, 100.0)
        .flat_from(10, 1, 100.0)
        .build()
}

pub fn frictionless_config() -> BacktestConfig {
    BacktestConfig {
        initial_capital: 25_000.0,
        execution: ExecutionConfig {
            cost_model: CostModel::new(0.0, SlippageModel::PerShareCents(0.0)),
            max_leverage: 4.0,
        },
        risk_free_rate: 0.0,
    }
}

pub fn bars_to_csv(bars: &[Bar]) -> String {
    let mut csv = String::from("caldt,open,high,low,close,volume\n");
    for b in bars {
        csv.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.timestamp.format("%Y-%m-%d %H:%M:%S"),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        ));
    }
    csv
}
