//! Transaction cost model: per-share commission plus one of two slippage modes.
//!
//! Slippage is either a fixed number of cents per share charged as money, or a
//! fraction of price applied to the fill price itself. A run picks exactly one.

/// Side of a single fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

/// How slippage is charged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SlippageModel {
    /// Cents per share, charged as money on every fill.
    PerShareCents(f64),
    /// Fraction of price (0.0005 = 5 bps). Buys fill higher, sells fill lower.
    SpreadFraction(f64),
}

impl SlippageModel {
    pub fn from_bps(bps: f64) -> Self {
        SlippageModel::SpreadFraction(bps / 10_000.0)
    }

    pub fn name(&self) -> &'static str {
        match self {
            SlippageModel::PerShareCents(_) => "per_share",
            SlippageModel::SpreadFraction(_) => "spread",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModel {
    pub commission_per_share: f64,
    pub slippage: SlippageModel,
}

impl Default for CostModel {
    fn default() -> Self {
        CostModel {
            commission_per_share: 0.0005,
            slippage: SlippageModel::from_bps(5.0),
        }
    }
}

impl CostModel {
    pub fn new(commission_per_share: f64, slippage: SlippageModel) -> Self {
        CostModel {
            commission_per_share,
            slippage,
        }
    }

    /// |size| * per-share rate
    pub fn commission(&self, fill_size: i64) -> f64 {
        fill_size.unsigned_abs() as f64 * self.commission_per_share
    }

    /// Monetary slippage. Zero in spread mode, where slippage lives in the fill price.
    pub fn slippage_cost(&self, fill_size: i64) -> f64 {
        match self.slippage {
            SlippageModel::PerShareCents(cents) => fill_size.unsigned_abs() as f64 * cents / 100.0,
            SlippageModel::SpreadFraction(_) => 0.0,
        }
    }

    /// Total money charged for one fill. Size sign is ignored.
    pub fn cost(&self, fill_size: i64) -> f64 {
        self.commission(fill_size) + self.slippage_cost(fill_size)
    }

    /// Price actually paid or received for a fill at `price`.
    pub fn adjusted_fill_price(&self, side: Side, price: f64) -> f64 {
        match (self.slippage, side) {
            (SlippageModel::SpreadFraction(f), Side::Buy) => price * (1.0 + f),
            (SlippageModel::SpreadFraction(f), Side::Sell) => price * (1.0 - f),
            (SlippageModel::PerShareCents(_), _) => price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn per_share_cost_combines_commission_and_cents() {
        let model = CostModel::new(0.0005, SlippageModel::PerShareCents(1.0));
        assert_relative_eq!(model.cost(50), 0.525, epsilon = 1e-12);
    }

    #[test]
    fn cost_ignores_size_sign() {
        let model = CostModel::new(0.0005, SlippageModel::PerShareCents(1.0));
        assert_relative_eq!(model.cost(-50), model.cost(50));
    }

    #[test]
    fn zero_size_costs_nothing() {
        let model = CostModel::new(0.0005, SlippageModel::PerShareCents(1.0));
        assert_eq!(model.cost(0), 0.0);
    }

    #[test]
    fn spread_mode_charges_commission_only() {
        let model = CostModel::new(0.0005, SlippageModel::from_bps(5.0));
        assert_relative_eq!(model.cost(100), 0.05, epsilon = 1e-12);
        assert_eq!(model.slippage_cost(100), 0.0);
    }

    #[test]
    fn spread_mode_moves_fill_price_against_trader() {
        let model = CostModel::new(0.0, SlippageModel::from_bps(5.0));
        assert_relative_eq!(model.adjusted_fill_price(Side::Buy, 100.0), 100.05, epsilon = 1e-9);
        assert_relative_eq!(model.adjusted_fill_price(Side::Sell, 100.0), 99.95, epsilon = 1e-9);
    }

    #[test]
    fn per_share_mode_leaves_fill_price_untouched() {
        let model = CostModel::new(0.0005, SlippageModel::PerShareCents(1.0));
        assert_eq!(model.adjusted_fill_price(Side::Buy, 100.0), 100.0);
        assert_eq!(model.adjusted_fill_price(Side::Sell, 100.0), 100.0);
    }

    #[test]
    fn default_is_five_bps_spread() {
        let model = CostModel::default();
        assert_eq!(model.commission_per_share, 0.0005);
        assert_eq!(model.slippage.name(), "spread");
        assert_eq!(model.slippage, SlippageModel::SpreadFraction(0.0005));
    }
}
