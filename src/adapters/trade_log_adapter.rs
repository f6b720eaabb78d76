//! Trade log CSV writer implementing ReportPort.

use std::fs;
use std::path::Path;

use crate::domain::error::OrbtraderError;
use crate::domain::position::ClosedTrade;
use crate::ports::report_port::{ReportContext, ReportPort};

const HEADER: [&str; 11] = [
    "entry_time",
    "exit_time",
    "direction",
    "size",
    "entry_price",
    "exit_price",
    "costs",
    "pnl",
    "return_pct",
    "exit_reason",
    "duration_minutes",
];

pub struct TradeLogCsvAdapter;

impl TradeLogCsvAdapter {
    pub fn new() -> Self {
        Self
    }

    pub fn write_trades<W: std::io::Write>(
        &self,
        trades: &[ClosedTrade],
        writer: W,
    ) -> Result<(), OrbtraderError> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(HEADER).map_err(report_error)?;
        for trade in trades {
            wtr.write_record([
                trade.entry_time.to_string(),
                trade.exit_time.to_string(),
                trade.direction().as_str().to_string(),
                trade.quantity.abs().to_string(),
                format!("{:.4}", trade.entry_price),
                format!("{:.4}", trade.exit_price),
                format!("{:.4}", trade.costs),
                format!("{:.2}", trade.pnl),
                format!("{:.4}", trade.return_fraction() * 100.0),
                trade.exit_reason.as_str().to_string(),
                (trade.exit_time - trade.entry_time).num_minutes().to_string(),
            ])
            .map_err(report_error)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

impl Default for TradeLogCsvAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportPort for TradeLogCsvAdapter {
    fn write(&self, ctx: &ReportContext<'_>, output_path: &str) -> Result<(), OrbtraderError> {
        let path = Path::new(output_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = fs::File::create(path)?;
        self.write_trades(&ctx.result.portfolio.closed_trades, file)
    }
}

fn report_error(e: csv::Error) -> OrbtraderError {
    OrbtraderError::Report {
        reason: format!("failed to write trade log: {e}"),
    }
}
