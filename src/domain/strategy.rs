//! Strategy parameters, order intents, and the decision-unit seam between a
//! strategy and the execution engine.

use chrono::{NaiveDateTime, NaiveTime};

use super::calendar::{EarlyCloseCalendar, default_calendar};
use super::cost_model::Side;
use super::error::OrbtraderError;
use super::ohlcv::Bar;

/// Immutable per-run parameters of the opening-range breakout.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyParameters {
    pub open_range_minutes: i64,
    pub risk_percent: f64,
    pub take_profit_multiple: f64,
    pub max_leverage: f64,
    pub market_open: NaiveTime,
    pub exit_time: NaiveTime,
    pub early_closes: EarlyCloseCalendar,
}

impl Default for StrategyParameters {
    fn default() -> Self {
        StrategyParameters {
            open_range_minutes: 5,
            risk_percent: 1.0,
            take_profit_multiple: 10.0,
            max_leverage: 4.0,
            market_open: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or(NaiveTime::MIN),
            exit_time: NaiveTime::from_hms_opt(15, 59, 0).unwrap_or(NaiveTime::MIN),
            early_closes: default_calendar(),
        }
    }
}

impl StrategyParameters {
    /// Rejects parameter sets that cannot drive a run.
    pub fn validate(&self) -> Result<(), OrbtraderError> {
        if self.open_range_minutes <= 0 {
            return Err(invalid("open_range_minutes", "must be a positive integer"));
        }
        if !is_positive(self.risk_percent) {
            return Err(invalid("risk_percent", "must be positive"));
        }
        if !is_positive(self.take_profit_multiple) {
            return Err(invalid("take_profit_multiple", "must be positive"));
        }
        if !is_positive(self.max_leverage) {
            return Err(invalid("max_leverage", "must be positive"));
        }
        if self.exit_time <= self.market_open {
            return Err(invalid("exit_time", "must be after market_open"));
        }
        Ok(())
    }

    pub fn is_exit_bar(&self, timestamp: NaiveDateTime) -> bool {
        timestamp.time() == self.exit_time || self.early_closes.is_early_close(timestamp)
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn invalid(key: &str, reason: &str) -> OrbtraderError {
    OrbtraderError::ConfigInvalid {
        section: "strategy".to_string(),
        key: key.to_string(),
        reason: format!("{key} {reason}"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn sign(self) -> i64 {
        match self {
            Direction::Long => 1,
            Direction::Short => -1,
        }
    }

    pub fn entry_side(self) -> Side {
        match self {
            Direction::Long => Side::Buy,
            Direction::Short => Side::Sell,
        }
    }

    pub fn exit_side(self) -> Side {
        match self {
            Direction::Long => Side::Sell,
            Direction::Short => Side::Buy,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Long => "long",
            Direction::Short => "short",
        }
    }
}

/// Bracketed market entry requested by a strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderIntent {
    pub direction: Direction,
    pub size: i64,
    pub entry_reference_price: f64,
    pub stop_loss_price: f64,
    pub take_profit_price: f64,
}

/// Close whatever position is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitIntent;

/// Everything a strategy asks for on one bar.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decision {
    pub entry: Option<OrderIntent>,
    pub exit: Option<ExitIntent>,
}

impl Decision {
    pub fn is_empty(&self) -> bool {
        self.entry.is_none() && self.exit.is_none()
    }
}

/// Account view handed to a strategy before each bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarContext {
    pub equity: f64,
    pub has_open_position: bool,
}

/// A bar-driven decision policy the execution engine can host.
pub trait DecisionUnit {
    fn name(&self) -> &str;

    /// Called once per bar, in timestamp order.
    fn process_bar(&mut self, bar: &Bar, ctx: &BarContext) -> Decision;
}
