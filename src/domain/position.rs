//! Open position and closed trade records.

use chrono::NaiveDateTime;

use super::ohlcv::Bar;
use super::strategy::Direction;

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    /// Strategy asked for a flat book (end of session or early close).
    Signal,
    EndOfData,
}

impl ExitReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::Signal => "signal",
            ExitReason::EndOfData => "end_of_data",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    /// Signed: positive long, negative short.
    pub quantity: i64,
    pub entry_price: f64,
    pub entry_time: NaiveDateTime,
    pub entry_cost: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.quantity > 0
    }

    pub fn is_short(&self) -> bool {
        self.quantity < 0
    }

    pub fn direction(&self) -> Direction {
        if self.is_short() {
            Direction::Short
        } else {
            Direction::Long
        }
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.quantity as f64 * (price - self.entry_price)
    }

    pub fn should_stop_loss(&self, price: f64) -> bool {
        if self.is_long() {
            price <= self.stop_loss
        } else {
            price >= self.stop_loss
        }
    }

    pub fn should_take_profit(&self, price: f64) -> bool {
        if self.is_long() {
            price >= self.take_profit
        } else {
            price <= self.take_profit
        }
    }

    /// Bracket exit triggered inside `bar`, if any, with its raw fill price.
    ///
    /// A bar that opens through a level fills at the open. When both levels
    /// fall inside the bar the stop wins.
    pub fn bracket_exit(&self, bar: &Bar) -> Option<(ExitReason, f64)> {
        let (adverse, favorable) = if self.is_long() {
            (bar.low, bar.high)
        } else {
            (bar.high, bar.low)
        };

        if self.should_stop_loss(bar.open) {
            return Some((ExitReason::StopLoss, bar.open));
        }
        if self.should_take_profit(bar.open) {
            return Some((ExitReason::TakeProfit, bar.open));
        }
        if self.should_stop_loss(adverse) {
            return Some((ExitReason::StopLoss, self.stop_loss));
        }
        if self.should_take_profit(favorable) {
            return Some((ExitReason::TakeProfit, self.take_profit));
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub quantity: i64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    pub costs: f64,
    pub pnl: f64,
    pub exit_reason: ExitReason,
}

impl ClosedTrade {
    pub fn direction(&self) -> Direction {
        if self.quantity < 0 {
            Direction::Short
        } else {
            Direction::Long
        }
    }

    /// Net P&L as a fraction of entry notional.
    pub fn return_fraction(&self) -> f64 {
        let notional = self.quantity.unsigned_abs() as f64 * self.entry_price;
        if notional > 0.0 { self.pnl / notional } else { 0.0 }
    }
}
