//! Inline SVG charts for the HTML report.

use std::fmt::Write as _;

use chrono::NaiveDateTime;

use crate::domain::metrics::drawdown_series;
use crate::domain::portfolio::EquityPoint;

const CHART_WIDTH: f64 = 800.0;
const CHART_HEIGHT: f64 = 300.0;
const MARGIN_LEFT: f64 = 70.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_TOP: f64 = 30.0;
const MARGIN_BOTTOM: f64 = 40.0;

/// Longest series drawn as-is; longer ones are thinned evenly.
const MAX_POINTS: usize = 1_500;

pub const STRATEGY_COLOR: &str = "#2563eb";
pub const BENCHMARK_COLOR: &str = "#9ca3af";

/// Horizontal time axis shared by all series of a chart.
struct TimeAxis {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl TimeAxis {
    fn spanning<'a, I: IntoIterator<Item = &'a EquityPoint>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?.timestamp;
        let (start, end) = iter.fold((first, first), |(lo, hi), p| {
            (lo.min(p.timestamp), hi.max(p.timestamp))
        });
        Some(TimeAxis { start, end })
    }

    fn x(&self, ts: NaiveDateTime) -> f64 {
        let plot_width = CHART_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
        let span = (self.end - self.start).num_seconds();
        if span <= 0 {
            return MARGIN_LEFT;
        }
        MARGIN_LEFT + (ts - self.start).num_seconds() as f64 / span as f64 * plot_width
    }
}

/// Keeps at most `MAX_POINTS` points, always including the last.
pub fn thin(points: &[EquityPoint]) -> Vec<&EquityPoint> {
    if points.len() <= MAX_POINTS {
        return points.iter().collect();
    }
    let stride = points.len().div_ceil(MAX_POINTS);
    let mut thinned: Vec<&EquityPoint> = points.iter().step_by(stride).collect();
    if let Some(last) = points.last() {
        if thinned.last().map(|p| p.timestamp) != Some(last.timestamp) {
            thinned.push(last);
        }
    }
    thinned
}

fn open_svg(svg: &mut String, title: &str) {
    let _ = write!(
        svg,
        r##"<svg width="{w}" height="{h}" viewBox="0 0 {w} {h}" xmlns="http://www.w3.org/2000/svg">"##,
        w = CHART_WIDTH,
        h = CHART_HEIGHT
    );
    svg.push_str("\n  <rect width=\"100%\" height=\"100%\" fill=\"white\"/>\n");
    let _ = writeln!(
        svg,
        "  <text x=\"{}\" y=\"15\" text-anchor=\"end\" font-size=\"12\" fill=\"#666\">{}</text>",
        CHART_WIDTH, title
    );
    let _ = writeln!(
        svg,
        "  <line x1=\"{l}\" y1=\"{t}\" x2=\"{l}\" y2=\"{b}\" stroke=\"#ccc\" stroke-width=\"1\"/>",
        l = MARGIN_LEFT,
        t = MARGIN_TOP,
        b = CHART_HEIGHT - MARGIN_BOTTOM
    );
    let _ = writeln!(
        svg,
        "  <line x1=\"{l}\" y1=\"{b}\" x2=\"{r}\" y2=\"{b}\" stroke=\"#ccc\" stroke-width=\"1\"/>",
        l = MARGIN_LEFT,
        b = CHART_HEIGHT - MARGIN_BOTTOM,
        r = CHART_WIDTH - MARGIN_RIGHT
    );
}

fn y_label(svg: &mut String, y: f64, label: &str) {
    let _ = writeln!(
        svg,
        "  <text x=\"{}\" y=\"{:.1}\" text-anchor=\"end\" font-size=\"10\" fill=\"#666\">{}</text>",
        MARGIN_LEFT - 5.0,
        y,
        label
    );
}

fn x_labels(svg: &mut String, axis: &TimeAxis) {
    let mid = axis.start + (axis.end - axis.start) / 2;
    for ts in [axis.start, mid, axis.end] {
        let _ = writeln!(
            svg,
            "  <text x=\"{:.1}\" y=\"{}\" text-anchor=\"middle\" font-size=\"10\" fill=\"#666\">{}</text>",
            axis.x(ts),
            CHART_HEIGHT - 5.0,
            ts.date()
        );
    }
}

fn path_data<F: Fn(&EquityPoint) -> f64>(
    points: &[&EquityPoint],
    axis: &TimeAxis,
    y: F,
) -> String {
    let mut d = String::new();
    for (i, point) in points.iter().enumerate() {
        let cmd = if i == 0 { "M" } else { " L" };
        let _ = write!(d, "{} {:.1} {:.1}", cmd, axis.x(point.timestamp), y(*point));
    }
    d
}

/// Strategy equity with an optional buy & hold overlay on the same scale.
pub fn equity_svg(strategy: &[EquityPoint], benchmark: &[EquityPoint]) -> String {
    let strategy = thin(strategy);
    let benchmark = thin(benchmark);
    let Some(axis) = TimeAxis::spanning(strategy.iter().chain(benchmark.iter()).copied()) else {
        return String::new();
    };

    let (min_equity, max_equity) = strategy
        .iter()
        .chain(benchmark.iter())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p.equity), hi.max(p.equity))
        });
    let range = (max_equity - min_equity).max(1.0);
    let plot_height = CHART_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let y = |p: &EquityPoint| {
        MARGIN_TOP + plot_height - (p.equity - min_equity) / range * plot_height
    };

    let mut svg = String::new();
    open_svg(&mut svg, "Equity ($)");
    y_label(&mut svg, MARGIN_TOP + 5.0, &format!("${max_equity:.0}"));
    y_label(
        &mut svg,
        MARGIN_TOP + plot_height / 2.0,
        &format!("${:.0}", (max_equity + min_equity) / 2.0),
    );
    y_label(&mut svg, CHART_HEIGHT - MARGIN_BOTTOM - 5.0, &format!("${min_equity:.0}"));
    x_labels(&mut svg, &axis);

    if !benchmark.is_empty() {
        let _ = writeln!(
            svg,
            "  <path d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"1.5\" stroke-dasharray=\"4 3\"/>",
            path_data(&benchmark, &axis, y),
            BENCHMARK_COLOR
        );
    }
    if !strategy.is_empty() {
        let _ = writeln!(
            svg,
            "  <path d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"2\"/>",
            path_data(&strategy, &axis, y),
            STRATEGY_COLOR
        );
    }
    svg.push_str("</svg>");
    svg
}

/// Filled underwater chart of percent below the running peak.
pub fn drawdown_svg(equity_curve: &[EquityPoint]) -> String {
    if equity_curve.len() < 2 {
        return String::new();
    }
    let drawdowns: Vec<EquityPoint> = equity_curve
        .iter()
        .zip(drawdown_series(equity_curve))
        .map(|(p, dd)| EquityPoint {
            timestamp: p.timestamp,
            equity: dd,
        })
        .collect();
    let points = thin(&drawdowns);
    let Some(axis) = TimeAxis::spanning(points.iter().copied()) else {
        return String::new();
    };

    let max_dd = drawdowns.iter().map(|p| p.equity).fold(0.0, f64::max).max(0.01);
    let plot_height = CHART_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let y = |p: &EquityPoint| MARGIN_TOP + p.equity / max_dd * plot_height;

    let mut d = format!("M {:.1} {:.1}", axis.x(axis.start), MARGIN_TOP);
    for point in &points {
        let _ = write!(d, " L {:.1} {:.1}", axis.x(point.timestamp), y(*point));
    }
    let _ = write!(d, " L {:.1} {:.1} Z", axis.x(axis.end), MARGIN_TOP);

    let mut svg = String::new();
    open_svg(&mut svg, "Drawdown (%)");
    y_label(&mut svg, MARGIN_TOP + 5.0, "0%");
    y_label(&mut svg, MARGIN_TOP + plot_height / 2.0, &format!("-{:.1}%", max_dd / 2.0));
    y_label(&mut svg, CHART_HEIGHT - MARGIN_BOTTOM - 5.0, &format!("-{max_dd:.1}%"));
    x_labels(&mut svg, &axis);
    let _ = writeln!(
        svg,
        "  <path d=\"{d}\" fill=\"rgba(239,68,68,0.3)\" stroke=\"#dc2626\" stroke-width=\"1\"/>"
    );
    svg.push_str("</svg>");
    svg
}
