//! Opening-range tracking for a single trading day.

use chrono::{Duration, NaiveDate, NaiveTime};

use super::ohlcv::Bar;

const MINUTES_PER_DAY: i64 = 24 * 60;

/// High/low band of the first minutes of a session.
///
/// Bars strictly before [`OpeningRange::boundary`] widen the band; the bar at
/// the boundary itself is the decision bar and is never accumulated.
#[derive(Debug, Clone, PartialEq)]
pub struct OpeningRange {
    boundary: NaiveTime,
    day: Option<NaiveDate>,
    day_open: f64,
    range_high: Option<f64>,
    range_low: Option<f64>,
}

impl OpeningRange {
    /// A non-positive window puts the boundary on the market open.
    pub fn new(market_open: NaiveTime, open_range_minutes: i64) -> Self {
        let minutes = open_range_minutes.clamp(0, MINUTES_PER_DAY - 1);
        let (boundary, _) = market_open.overflowing_add_signed(Duration::minutes(minutes));
        OpeningRange {
            boundary,
            day: None,
            day_open: 0.0,
            range_high: None,
            range_low: None,
        }
    }

    pub fn boundary(&self) -> NaiveTime {
        self.boundary
    }

    pub fn day(&self) -> Option<NaiveDate> {
        self.day
    }

    pub fn day_open(&self) -> f64 {
        self.day_open
    }

    pub fn high(&self) -> Option<f64> {
        self.range_high
    }

    pub fn low(&self) -> Option<f64> {
        self.range_low
    }

    pub fn is_new_day(&self, date: NaiveDate) -> bool {
        self.day != Some(date)
    }

    pub fn on_new_day(&mut self, day: NaiveDate, open_price: f64) {
        self.day = Some(day);
        self.day_open = open_price;
        self.range_high = None;
        self.range_low = None;
    }

    pub fn accumulate(&mut self, bar: &Bar) {
        self.range_high = Some(self.range_high.map_or(bar.high, |h| h.max(bar.high)));
        self.range_low = Some(self.range_low.map_or(bar.low, |l| l.min(bar.low)));
    }

    /// `(high, low)` once at least one bar has been accumulated.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        match (self.range_high, self.range_low) {
            (Some(high), Some(low)) => Some((high, low)),
            _ => None,
        }
    }

    pub fn width(&self) -> Option<f64> {
        self.bounds().map(|(high, low)| high - low)
    }
}
