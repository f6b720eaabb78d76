//! Report generation port trait.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::OrbtraderError;
use crate::domain::metrics::Metrics;
use crate::domain::portfolio::EquityPoint;
use crate::domain::strategy::StrategyParameters;

/// Everything a report needs about one finished run.
pub struct ReportContext<'a> {
    pub params: &'a StrategyParameters,
    pub result: &'a BacktestResult,
    pub metrics: &'a Metrics,
    /// Buy & hold equity of the benchmark, empty when none was loaded.
    pub benchmark: &'a [EquityPoint],
}

/// Port for writing backtest reports.
pub trait ReportPort {
    fn write(&self, ctx: &ReportContext<'_>, output_path: &str) -> Result<(), OrbtraderError>;
}
