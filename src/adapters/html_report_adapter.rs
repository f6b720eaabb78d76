//! HTML report adapter implementing ReportPort.
//!
//! Writes one self-contained page: run parameters, the statistics table,
//! inline SVG equity and drawdown charts, and the trade log.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::adapters::chart_svg::{drawdown_svg, equity_svg};
use crate::domain::error::OrbtraderError;
use crate::domain::position::ClosedTrade;
use crate::ports::report_port::{ReportContext, ReportPort};

const STYLE: &str = "body{font-family:sans-serif;margin:2em;color:#111}\
table{border-collapse:collapse;margin-bottom:1.5em}\
th,td{border:1px solid #ddd;padding:4px 10px;text-align:right}\
th{background:#f3f4f6}td.label{text-align:left}\
.win{color:#15803d}.loss{color:#b91c1c}";

pub struct HtmlReportAdapter;

impl HtmlReportAdapter {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, ctx: &ReportContext<'_>) -> String {
        let mut html = String::new();
        let title = format!("{} Backtest Report", escape(&ctx.result.strategy_name));

        let _ = write!(
            html,
            "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title>\
             <style>{STYLE}</style></head><body>\n<h1>{title}</h1>\n"
        );
        if let Some((start, end)) = ctx.result.period() {
            let _ = writeln!(html, "<p>Period: {start} to {end}</p>");
        }

        html.push_str(&parameters_table(ctx));
        html.push_str("<h2>Statistics</h2>\n<table>\n");
        for (label, value) in ctx.metrics.summary_rows() {
            let _ = writeln!(
                html,
                "<tr><td class=\"label\">{}</td><td>{}</td></tr>",
                escape(label),
                value
            );
        }
        html.push_str("</table>\n");

        let daily = ctx.result.portfolio.daily_equity();
        let _ = write!(
            html,
            "<h2>Equity Chart</h2>\n{}\n<h2>Drawdown Chart</h2>\n{}\n",
            equity_svg(&daily, ctx.benchmark),
            drawdown_svg(&ctx.result.portfolio.equity_curve)
        );

        html.push_str(&trade_log_table(&ctx.result.portfolio.closed_trades));
        html.push_str("</body></html>\n");
        html
    }
}

impl Default for HtmlReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportPort for HtmlReportAdapter {
    fn write(&self, ctx: &ReportContext<'_>, output_path: &str) -> Result<(), OrbtraderError> {
        let html = self.render(ctx);

        let path = Path::new(output_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, html)?;
        Ok(())
    }
}

fn parameters_table(ctx: &ReportContext<'_>) -> String {
    let params = ctx.params;
    let rows = [
        ("Opening Range", format!("{} min", params.open_range_minutes)),
        ("Risk per Trade", format!("{:.2}%", params.risk_percent)),
        ("Take Profit", format!("{}x range", params.take_profit_multiple)),
        ("Max Leverage", format!("{}x", params.max_leverage)),
        ("Market Open", params.market_open.format("%H:%M").to_string()),
        ("Exit Time", params.exit_time.format("%H:%M").to_string()),
        ("Early Closes", params.early_closes.len().to_string()),
        (
            "Initial Capital",
            format!("${:.2}", ctx.result.portfolio.initial_capital),
        ),
    ];

    let mut table = String::from("<h2>Parameters</h2>\n<table>\n");
    for (label, value) in rows {
        let _ = writeln!(
            table,
            "<tr><td class=\"label\">{label}</td><td>{value}</td></tr>"
        );
    }
    table.push_str("</table>\n");
    table
}

fn trade_log_table(trades: &[ClosedTrade]) -> String {
    let mut table = format!("<h2>Trade Log ({} trades)</h2>\n", trades.len());
    if trades.is_empty() {
        table.push_str("<p>No trades.</p>\n");
        return table;
    }

    table.push_str(
        "<table>\n<tr><th>Entry Time</th><th>Exit Time</th><th>Side</th><th>Size</th>\
         <th>Entry</th><th>Exit</th><th>Costs</th><th>P&amp;L</th><th>Return</th>\
         <th>Exit Reason</th></tr>\n",
    );
    for trade in trades {
        let class = if trade.pnl >= 0.0 { "win" } else { "loss" };
        let _ = writeln!(
            table,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{:.2}</td><td>{:.2}</td>\
             <td>{:.2}</td><td class=\"{}\">{:.2}</td><td class=\"{}\">{:.2}%</td><td>{}</td></tr>",
            trade.entry_time,
            trade.exit_time,
            trade.direction().as_str(),
            trade.quantity.abs(),
            trade.entry_price,
            trade.exit_price,
            trade.costs,
            class,
            trade.pnl,
            class,
            trade.return_fraction() * 100.0,
            trade.exit_reason.as_str()
        );
    }
    table.push_str("</table>\n");
    table
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
