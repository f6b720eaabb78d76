//! Position sizing: fixed-fractional risk capped by leverage.
//!
//! ```text
//! risk_dollars      = equity * risk_percent / 100
//! shares_by_risk    = risk_dollars / |entry - stop|
//! shares_by_leverage = equity * max_leverage / entry
//! size              = floor(min(shares_by_risk, shares_by_leverage))
//! ```
//!
//! Example: equity $25,000, entry $100, stop $95, 1% risk, 4x leverage.
//! Risk allows 250 / 5 = 50 shares, leverage allows 1,000, so the size is 50.

/// Whole shares to trade. Zero means "no trade".
pub fn position_size(
    equity: f64,
    entry_price: f64,
    stop_price: f64,
    risk_percent: f64,
    max_leverage: f64,
) -> i64 {
    if equity <= 0.0 || entry_price <= 0.0 || max_leverage <= 0.0 {
        return 0;
    }

    let per_share_risk = (entry_price - stop_price).abs();
    if per_share_risk == 0.0 {
        return 0;
    }

    let risk_dollars = risk_percent / 100.0 * equity;
    let shares_by_risk = risk_dollars / per_share_risk;
    let shares_by_leverage = max_leverage * equity / entry_price;

    let shares = shares_by_risk.min(shares_by_leverage).floor();
    if shares.is_finite() && shares > 0.0 {
        shares as i64
    } else {
        0
    }
}
