//! Trade execution and fill simulation.
//!
//! Implements entry with a margin check, exits with costs, and stop-loss /
//! take-profit trigger checking against a bar's range.

use chrono::NaiveDateTime;

use super::cost_model::CostModel;
use super::ohlcv::Bar;
use super::portfolio::Portfolio;
use super::position::{ClosedTrade, ExitReason, Position};
use super::strategy::OrderIntent;

/// Broker-side settings of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutionConfig {
    pub cost_model: CostModel,
    /// Buying power is equity times this; margin requirement is its inverse.
    pub max_leverage: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            cost_model: CostModel::default(),
            max_leverage: 4.0,
        }
    }
}

/// Result of an entry attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryResult {
    Entered {
        quantity: i64,
        execution_price: f64,
        cost: f64,
    },
    MarginRejected {
        notional: f64,
        buying_power: f64,
    },
    PositionAlreadyOpen,
}

/// Open a position for `intent` at `market_price`.
///
/// 1. Adjust the fill price for spread slippage
/// 2. Reject a non-finite price or a notional above equity * max_leverage
/// 3. Charge the fill cost
/// 4. Open the position with the intent's bracket
pub fn enter_position(
    portfolio: &mut Portfolio,
    intent: &OrderIntent,
    market_price: f64,
    time: NaiveDateTime,
    config: &ExecutionConfig,
) -> EntryResult {
    if portfolio.has_position() {
        return EntryResult::PositionAlreadyOpen;
    }

    let execution_price = config
        .cost_model
        .adjusted_fill_price(intent.direction.entry_side(), market_price);

    let notional = intent.size as f64 * execution_price;
    let buying_power = portfolio.total_equity(market_price) * config.max_leverage;
    if !execution_price.is_finite() || notional > buying_power {
        return EntryResult::MarginRejected {
            notional,
            buying_power,
        };
    }

    let quantity = intent.size * intent.direction.sign();
    let cost = config.cost_model.cost(quantity);
    portfolio.charge(cost);

    portfolio.open_position(Position {
        quantity,
        entry_price: execution_price,
        entry_time: time,
        entry_cost: cost,
        stop_loss: intent.stop_loss_price,
        take_profit: intent.take_profit_price,
    });

    EntryResult::Entered {
        quantity,
        execution_price,
        cost,
    }
}

/// Result of an exit.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitResult {
    pub quantity: i64,
    pub exit_price: f64,
    pub exit_cost: f64,
    pub pnl: f64,
    pub reason: ExitReason,
}

/// Close the open position at `market_price`.
///
/// Trade P&L is `quantity * (exit - entry)` less the entry and exit costs.
pub fn exit_position(
    portfolio: &mut Portfolio,
    market_price: f64,
    time: NaiveDateTime,
    reason: ExitReason,
    config: &ExecutionConfig,
) -> Option<ExitResult> {
    let position = portfolio.take_position()?;

    let exit_price = config
        .cost_model
        .adjusted_fill_price(position.direction().exit_side(), market_price);
    let exit_cost = config.cost_model.cost(position.quantity);

    let price_pnl = position.unrealized_pnl(exit_price);
    portfolio.cash += price_pnl;
    portfolio.charge(exit_cost);

    let pnl = price_pnl - position.entry_cost - exit_cost;

    portfolio.record_trade(ClosedTrade {
        quantity: position.quantity,
        entry_price: position.entry_price,
        exit_price,
        entry_time: position.entry_time,
        exit_time: time,
        costs: position.entry_cost + exit_cost,
        pnl,
        exit_reason: reason,
    });

    Some(ExitResult {
        quantity: position.quantity,
        exit_price,
        exit_cost,
        pnl,
        reason,
    })
}

/// Exit the open position if `bar` touches its stop or target.
pub fn check_brackets(
    portfolio: &mut Portfolio,
    bar: &Bar,
    config: &ExecutionConfig,
) -> Option<ExitResult> {
    let (reason, price) = portfolio.position.as_ref()?.bracket_exit(bar)?;
    exit_position(portfolio, price, bar.timestamp, reason, config)
}
