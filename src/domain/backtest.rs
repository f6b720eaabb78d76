//! Backtest engine and event loop.
//!
//! Per bar:
//! 1. Fill the pending entry at the bar's open
//! 2. Check the open position's stop and target against the bar
//! 3. Ask the decision unit for intents, with equity marked at the close
//! 4. Exit intents close at the bar's close and cancel any pending entry
//! 5. Entry intents become the pending order for the next bar
//! 6. Record equity at the close
//!
//! A position still open after the last bar is closed at the last close.

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use super::execution::{
    EntryResult, ExecutionConfig, check_brackets, enter_position, exit_position,
};
use super::ohlcv::Bar;
use super::portfolio::Portfolio;
use super::position::ExitReason;
use super::strategy::{BarContext, DecisionUnit, OrderIntent};

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub execution: ExecutionConfig,
    pub risk_free_rate: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_capital: 25_000.0,
            execution: ExecutionConfig::default(),
            risk_free_rate: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub strategy_name: String,
    pub portfolio: Portfolio,
    pub bars_processed: usize,
    pub orders_rejected: usize,
    pub orders_cancelled: usize,
}

impl BacktestResult {
    pub fn period(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let first = self.portfolio.equity_curve.first()?;
        let last = self.portfolio.equity_curve.last()?;
        Some((first.timestamp, last.timestamp))
    }
}

/// Runs `unit` over `bars`, which must be in timestamp order.
pub fn run_backtest<D: DecisionUnit + ?Sized>(
    bars: &[Bar],
    unit: &mut D,
    config: &BacktestConfig,
) -> BacktestResult {
    let execution = &config.execution;
    let mut portfolio = Portfolio::new(config.initial_capital);
    let mut pending: Option<OrderIntent> = None;
    let mut orders_rejected = 0;
    let mut orders_cancelled = 0;

    info!(
        strategy = unit.name(),
        bars = bars.len(),
        capital = config.initial_capital,
        "starting backtest"
    );

    for bar in bars {
        if let Some(intent) = pending.take() {
            match enter_position(&mut portfolio, &intent, bar.open, bar.timestamp, execution) {
                EntryResult::Entered {
                    quantity,
                    execution_price,
                    ..
                } => {
                    debug!(time = %bar.timestamp, quantity, price = execution_price, "entry filled");
                }
                EntryResult::MarginRejected {
                    notional,
                    buying_power,
                } => {
                    orders_rejected += 1;
                    warn!(
                        time = %bar.timestamp,
                        notional,
                        buying_power,
                        "entry rejected: insufficient margin"
                    );
                }
                EntryResult::PositionAlreadyOpen => {
                    orders_rejected += 1;
                    warn!(time = %bar.timestamp, "entry rejected: position already open");
                }
            }
        }

        if let Some(exit) = check_brackets(&mut portfolio, bar, execution) {
            debug!(
                time = %bar.timestamp,
                reason = exit.reason.as_str(),
                price = exit.exit_price,
                pnl = exit.pnl,
                "bracket exit"
            );
        }

        let ctx = BarContext {
            equity: portfolio.total_equity(bar.close),
            has_open_position: portfolio.has_position(),
        };
        let decision = unit.process_bar(bar, &ctx);

        if decision.exit.is_some() {
            if pending.take().is_some() || decision.entry.is_some() {
                orders_cancelled += 1;
                debug!(time = %bar.timestamp, "pending entry cancelled by exit");
            }
            if let Some(exit) =
                exit_position(&mut portfolio, bar.close, bar.timestamp, ExitReason::Signal, execution)
            {
                debug!(time = %bar.timestamp, pnl = exit.pnl, "forced exit");
            }
        } else if let Some(intent) = decision.entry {
            if portfolio.has_position() || pending.is_some() {
                orders_rejected += 1;
                warn!(time = %bar.timestamp, "entry ignored: position already open");
            } else {
                pending = Some(intent);
            }
        }

        portfolio.record_equity(bar.timestamp, portfolio.total_equity(bar.close));
    }

    if let Some(last) = bars.last() {
        if exit_position(&mut portfolio, last.close, last.timestamp, ExitReason::EndOfData, execution)
            .is_some()
        {
            let equity = portfolio.cash;
            if let Some(point) = portfolio.equity_curve.last_mut() {
                point.equity = equity;
            }
        }
    }
    if pending.is_some() {
        orders_cancelled += 1;
    }

    info!(
        trades = portfolio.closed_trades.len(),
        final_equity = portfolio.final_equity(),
        "backtest complete"
    );

    BacktestResult {
        strategy_name: unit.name().to_string(),
        portfolio,
        bars_processed: bars.len(),
        orders_rejected,
        orders_cancelled,
    }
}
