//! Account state and equity tracking.
//!
//! Cash is margin-style: it moves only by fees and realized P&L, never by
//! notional. Equity is cash plus the open position marked at a price.

use chrono::NaiveDateTime;

use super::position::{ClosedTrade, Position};

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_capital: f64,
    pub position: Option<Position>,
    pub closed_trades: Vec<ClosedTrade>,
    pub equity_curve: Vec<EquityPoint>,
    pub total_costs: f64,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            cash: initial_capital,
            initial_capital,
            position: None,
            closed_trades: Vec::new(),
            equity_curve: Vec::new(),
            total_costs: 0.0,
        }
    }

    pub fn has_position(&self) -> bool {
        self.position.is_some()
    }

    pub fn open_position(&mut self, position: Position) {
        self.position = Some(position);
    }

    pub fn take_position(&mut self) -> Option<Position> {
        self.position.take()
    }

    pub fn charge(&mut self, cost: f64) {
        self.cash -= cost;
        self.total_costs += cost;
    }

    pub fn record_trade(&mut self, trade: ClosedTrade) {
        self.closed_trades.push(trade);
    }

    pub fn record_equity(&mut self, timestamp: NaiveDateTime, equity: f64) {
        self.equity_curve.push(EquityPoint { timestamp, equity });
    }

    pub fn total_equity(&self, price: f64) -> f64 {
        self.cash
            + self
                .position
                .as_ref()
                .map_or(0.0, |pos| pos.unrealized_pnl(price))
    }

    pub fn final_equity(&self) -> f64 {
        self.equity_curve
            .last()
            .map_or(self.initial_capital, |p| p.equity)
    }

    /// Last equity point of each calendar day.
    pub fn daily_equity(&self) -> Vec<EquityPoint> {
        let mut daily: Vec<EquityPoint> = Vec::new();
        for point in &self.equity_curve {
            match daily.last_mut() {
                Some(last) if last.timestamp.date() == point.timestamp.date() => {
                    *last = point.clone();
                }
                _ => daily.push(point.clone()),
            }
        }
        daily
    }
}
