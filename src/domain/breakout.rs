//! Opening-range breakout decision state machine.
//!
//! Per bar:
//! 1. A new calendar date resets the opening range with the bar's open as the
//!    day's reference price.
//! 2. Bars strictly before the range boundary widen the range.
//! 3. The bar stamped exactly at the boundary is the single decision bar of the
//!    day: close above the day's open goes long, below goes short, with the stop
//!    on the far side of the range and the target `take_profit_multiple` range
//!    widths away from the close.
//! 4. Any bar at the exit time or on an early-close instant requests a flat book.
//!
//! A feed that skips the boundary minute produces no trade that day.

use chrono::Duration;
use tracing::debug;

use super::error::OrbtraderError;
use super::ohlcv::Bar;
use super::opening_range::OpeningRange;
use super::sizing::position_size;
use super::strategy::{
    BarContext, Decision, DecisionUnit, Direction, ExitIntent, OrderIntent, StrategyParameters,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakoutPhase {
    /// Inside the opening window, more range bars to come.
    AccumulatingRange,
    /// Range window complete; the next minute is the decision bar.
    AwaitingBreakoutDecision,
    PositionOpen,
    /// Done for the day: no trade taken, or the position was closed.
    Flat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BreakoutState {
    pub phase: BreakoutPhase,
    pub range: OpeningRange,
}

impl BreakoutState {
    pub fn new(params: &StrategyParameters) -> Self {
        BreakoutState {
            phase: BreakoutPhase::Flat,
            range: OpeningRange::new(params.market_open, params.open_range_minutes),
        }
    }

    fn decision_pending(&self) -> bool {
        matches!(
            self.phase,
            BreakoutPhase::AccumulatingRange | BreakoutPhase::AwaitingBreakoutDecision
        )
    }
}

/// Advances the machine by one bar. Never fails; degenerate input yields no intent.
pub fn step(
    state: BreakoutState,
    params: &StrategyParameters,
    bar: &Bar,
    ctx: &BarContext,
) -> (BreakoutState, Decision) {
    let mut state = state;
    let mut decision = Decision::default();
    let date = bar.date();
    let time = bar.time();

    if state.range.is_new_day(date) {
        state.range.on_new_day(date, bar.open);
        state.phase = BreakoutPhase::AccumulatingRange;
    }

    let boundary = state.range.boundary();
    if time < boundary {
        state.range.accumulate(bar);
        if state.decision_pending() {
            let (next_minute, _) = time.overflowing_add_signed(Duration::minutes(1));
            state.phase = if next_minute == boundary {
                BreakoutPhase::AwaitingBreakoutDecision
            } else {
                BreakoutPhase::AccumulatingRange
            };
        }
    } else if state.decision_pending() {
        if time == boundary {
            let (phase, entry) = decide(&state.range, params, bar, ctx);
            state.phase = phase;
            decision.entry = entry;
        } else {
            debug!(%date, "decision bar missing, skipping day");
            state.phase = if ctx.has_open_position {
                BreakoutPhase::PositionOpen
            } else {
                BreakoutPhase::Flat
            };
        }
    }

    let position_open = ctx.has_open_position || decision.entry.is_some();
    if position_open && params.is_exit_bar(bar.timestamp) {
        decision.exit = Some(ExitIntent);
        if state.phase == BreakoutPhase::PositionOpen {
            state.phase = BreakoutPhase::Flat;
        }
    } else if state.phase == BreakoutPhase::PositionOpen && !position_open {
        state.phase = BreakoutPhase::Flat;
    }

    (state, decision)
}

fn decide(
    range: &OpeningRange,
    params: &StrategyParameters,
    bar: &Bar,
    ctx: &BarContext,
) -> (BreakoutPhase, Option<OrderIntent>) {
    if ctx.has_open_position {
        return (BreakoutPhase::PositionOpen, None);
    }

    let Some((high, low)) = range.bounds() else {
        debug!(date = %bar.date(), "no opening range data");
        return (BreakoutPhase::Flat, None);
    };
    let width = high - low;
    if width == 0.0 {
        debug!(date = %bar.date(), "zero-width opening range");
        return (BreakoutPhase::Flat, None);
    }

    let close = bar.close;
    let day_open = range.day_open();
    let direction = if close > day_open {
        Direction::Long
    } else if close < day_open {
        Direction::Short
    } else {
        return (BreakoutPhase::Flat, None);
    };

    let (stop_loss_price, take_profit_price) = match direction {
        Direction::Long => (low, close + params.take_profit_multiple * width),
        Direction::Short => (high, close - params.take_profit_multiple * width),
    };

    let size = position_size(
        ctx.equity,
        close,
        stop_loss_price,
        params.risk_percent,
        params.max_leverage,
    );
    if size <= 0 {
        debug!(date = %bar.date(), equity = ctx.equity, "position size rounds to zero");
        return (BreakoutPhase::Flat, None);
    }

    (
        BreakoutPhase::PositionOpen,
        Some(OrderIntent {
            direction,
            size,
            entry_reference_price: close,
            stop_loss_price,
            take_profit_price,
        }),
    )
}

/// The breakout policy as a [`DecisionUnit`].
#[derive(Debug, Clone)]
pub struct OpeningRangeBreakout {
    params: StrategyParameters,
    state: Option<BreakoutState>,
}

impl OpeningRangeBreakout {
    pub fn new(params: StrategyParameters) -> Result<Self, OrbtraderError> {
        params.validate()?;
        let state = Some(BreakoutState::new(&params));
        Ok(OpeningRangeBreakout { params, state })
    }

    pub fn phase(&self) -> BreakoutPhase {
        self.state
            .as_ref()
            .map_or(BreakoutPhase::Flat, |state| state.phase)
    }

    pub fn range(&self) -> Option<&OpeningRange> {
        self.state.as_ref().map(|state| &state.range)
    }
}

impl DecisionUnit for OpeningRangeBreakout {
    fn name(&self) -> &str {
        "Opening Range Breakout"
    }

    fn process_bar(&mut self, bar: &Bar, ctx: &BarContext) -> Decision {
        let state = self
            .state
            .take()
            .unwrap_or_else(|| BreakoutState::new(&self.params));
        let (next, decision) = step(state, &self.params, bar, ctx);
        self.state = Some(next);
        decision
    }
}
