//! Performance metrics and statistics.

use super::ohlcv::Bar;
use super::portfolio::{EquityPoint, Portfolio};

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Summary statistics of a run. Percentages are in percent units.
#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub final_equity: f64,
    pub return_pct: f64,
    pub annualized_return_pct: f64,
    pub buy_and_hold_return_pct: Option<f64>,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    /// Magnitude of the worst peak-to-trough decline.
    pub max_drawdown_pct: f64,
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub win_rate_pct: f64,
    pub avg_trade_pct: f64,
    pub profit_factor: f64,
    pub total_costs: f64,
}

impl Metrics {
    pub fn compute(portfolio: &Portfolio, risk_free_rate: f64) -> Self {
        let initial_capital = portfolio.initial_capital;
        let final_equity = portfolio.final_equity();

        let total_return = if initial_capital > 0.0 {
            (final_equity - initial_capital) / initial_capital
        } else {
            0.0
        };

        let daily = portfolio.daily_equity();
        let years = daily.len() as f64 / TRADING_DAYS_PER_YEAR;
        let annualized_return = if years > 0.0 && total_return > -1.0 {
            (1.0 + total_return).powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
        let (sharpe_ratio, sortino_ratio) = compute_risk_adjusted(&daily, daily_rf);
        let max_drawdown = compute_max_drawdown(&portfolio.equity_curve);

        let trades = &portfolio.closed_trades;
        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;

        for trade in trades {
            if trade.pnl > 0.0 {
                trades_won += 1;
                total_wins += trade.pnl;
            } else if trade.pnl < 0.0 {
                trades_lost += 1;
                total_losses += trade.pnl.abs();
            }
        }

        let total_trades = trades.len();
        let win_rate = if total_trades > 0 {
            trades_won as f64 / total_trades as f64
        } else {
            0.0
        };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let returns: Vec<f64> = trades.iter().map(|t| t.return_fraction()).collect();

        Metrics {
            final_equity,
            return_pct: total_return * 100.0,
            annualized_return_pct: annualized_return * 100.0,
            buy_and_hold_return_pct: None,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown_pct: max_drawdown * 100.0,
            total_trades,
            trades_won,
            trades_lost,
            win_rate_pct: win_rate * 100.0,
            avg_trade_pct: geometric_mean(&returns) * 100.0,
            profit_factor,
            total_costs: portfolio.total_costs,
        }
    }

    pub fn with_buy_and_hold(mut self, return_pct: Option<f64>) -> Self {
        self.buy_and_hold_return_pct = return_pct;
        self
    }

    /// Labelled, formatted values in display order. Buy & hold is omitted when unknown.
    pub fn summary_rows(&self) -> Vec<(&'static str, String)> {
        let mut rows = vec![
            ("Equity Final [$]", format!("{:.2}", self.final_equity)),
            ("Return [%]", format!("{:.2}", self.return_pct)),
        ];
        if let Some(bh) = self.buy_and_hold_return_pct {
            rows.push(("Buy & Hold Return [%]", format!("{bh:.2}")));
        }
        rows.extend([
            ("Return (Ann.) [%]", format!("{:.2}", self.annualized_return_pct)),
            ("Sharpe Ratio", format!("{:.2}", self.sharpe_ratio)),
            ("Sortino Ratio", format!("{:.2}", self.sortino_ratio)),
            ("Max. Drawdown [%]", format!("{:.2}", -self.max_drawdown_pct)),
            ("Win Rate [%]", format!("{:.2}", self.win_rate_pct)),
            ("# Trades", self.total_trades.to_string()),
            ("Avg. Trade [%]", format!("{:.2}", self.avg_trade_pct)),
            ("Profit Factor", format!("{:.2}", self.profit_factor)),
            ("Costs Paid [$]", format!("{:.2}", self.total_costs)),
        ]);
        rows
    }
}

/// Percent change from first to last close, or `None` for fewer than two bars.
pub fn buy_and_hold_return_pct(bars: &[Bar]) -> Option<f64> {
    let (first, last) = (bars.first()?, bars.last()?);
    if bars.len() < 2 || first.close <= 0.0 {
        return None;
    }
    Some((last.close / first.close - 1.0) * 100.0)
}

/// Value of `initial_capital` held in the benchmark from its first close.
pub fn buy_and_hold_curve(bars: &[Bar], initial_capital: f64) -> Vec<EquityPoint> {
    let Some(first) = bars.first().filter(|b| b.close > 0.0) else {
        return Vec::new();
    };
    bars.iter()
        .map(|b| EquityPoint {
            timestamp: b.timestamp,
            equity: b.close / first.close * initial_capital,
        })
        .collect()
}

/// Percent below the running peak at each point (0 at a new high).
pub fn drawdown_series(equity_curve: &[EquityPoint]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    equity_curve
        .iter()
        .map(|point| {
            peak = peak.max(point.equity);
            if peak > 0.0 {
                (peak - point.equity) / peak * 100.0
            } else {
                0.0
            }
        })
        .collect()
}

fn compute_max_drawdown(equity_curve: &[EquityPoint]) -> f64 {
    drawdown_series(equity_curve)
        .into_iter()
        .fold(0.0_f64, f64::max)
        / 100.0
}

fn compute_risk_adjusted(equity_curve: &[EquityPoint], daily_rf: f64) -> (f64, f64) {
    if equity_curve.len() < 2 {
        return (0.0, 0.0);
    }

    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].equity;
            let curr = w[1].equity;
            if prev > 0.0 {
                (curr - prev) / prev
            } else {
                0.0
            }
        })
        .collect();

    let n = returns.len() as f64;
    let mean: f64 = returns.iter().sum::<f64>() / n;

    let variance: f64 = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    let excess_return = mean - daily_rf;

    let sharpe = if stddev > 0.0 {
        (excess_return / stddev) * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    let downside_variance: f64 = returns
        .iter()
        .filter(|&&r| r < daily_rf)
        .map(|&r| (r - daily_rf).powi(2))
        .sum::<f64>()
        / n;
    let downside_stddev = downside_variance.sqrt();

    let sortino = if downside_stddev > 0.0 {
        (excess_return / downside_stddev) * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    (sharpe, sortino)
}

/// Geometric mean of fractional returns; 0 if empty or any trade lost everything.
fn geometric_mean(returns: &[f64]) -> f64 {
    if returns.is_empty() || returns.iter().any(|&r| r <= -1.0) {
        return 0.0;
    }
    let log_sum: f64 = returns.iter().map(|r| r.ln_1p()).sum();
    (log_sum / returns.len() as f64).exp() - 1.0
}
