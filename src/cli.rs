//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{ArgAction, Parser, Subcommand};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::filter::LevelFilter;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::html_report_adapter::HtmlReportAdapter;
use crate::adapters::trade_log_adapter::TradeLogCsvAdapter;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, BacktestResult};
use crate::domain::breakout::OpeningRangeBreakout;
use crate::domain::calendar::default_calendar;
use crate::domain::config_validation::{
    get_date, get_early_closes, get_time, parse_date, validate_backtest_config,
    validate_strategy_config,
};
use crate::domain::cost_model::{CostModel, SlippageModel};
use crate::domain::error::OrbtraderError;
use crate::domain::execution::ExecutionConfig;
use crate::domain::metrics::{Metrics, buy_and_hold_curve, buy_and_hold_return_pct};
use crate::domain::ohlcv::{Bar, count_sessions};
use crate::domain::opening_range::OpeningRange;
use crate::domain::portfolio::EquityPoint;
use crate::domain::strategy::StrategyParameters;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::{ReportContext, ReportPort};

#[derive(Parser, Debug)]
#[command(name = "orbtrader", about = "Opening range breakout backtester")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Bar file(s); several files run in parallel
        #[arg(short, long)]
        data: Vec<PathBuf>,
        #[arg(long, value_parser = parse_date_arg)]
        start: Option<NaiveDate>,
        #[arg(long, value_parser = parse_date_arg)]
        end: Option<NaiveDate>,
        /// HTML report path
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Trade log CSV path
        #[arg(long)]
        trades: Option<PathBuf>,
    },
    /// Validate a configuration and print the resolved parameters
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the range covered by a bar file
    Info {
        #[arg(short, long)]
        data: PathBuf,
    },
}

fn parse_date_arg(value: &str) -> Result<NaiveDate, String> {
    parse_date(value).ok_or_else(|| format!("invalid date '{value}', expected YYYY-MM-DD"))
}

pub fn run(cli: Cli) -> ExitCode {
    init_logging(cli.verbose);

    let outcome = match cli.command {
        Command::Backtest {
            config,
            data,
            start,
            end,
            output,
            trades,
        } => run_backtest(
            &config,
            &RunOverrides {
                data_files: data,
                start,
                end,
                html_output: output,
                trades_output: trades,
            },
        ),
        Command::Validate { config } => run_validate(&config),
        Command::Info { data } => run_info(&data),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, OrbtraderError> {
    info!(path = %path.display(), "loading config");
    FileConfigAdapter::from_file(path)
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, OrbtraderError> {
    validate_backtest_config(config)?;

    let slippage = match config
        .get_string("backtest", "slippage_mode")
        .as_deref()
        .map(str::trim)
    {
        Some("per_share") => {
            SlippageModel::PerShareCents(config.get_double("backtest", "slippage_cents", 1.0))
        }
        _ => SlippageModel::from_bps(config.get_double("backtest", "slippage_bps", 5.0)),
    };

    let strategy_defaults = StrategyParameters::default();
    Ok(BacktestConfig {
        initial_capital: config.get_double("backtest", "initial_capital", 25_000.0),
        execution: ExecutionConfig {
            cost_model: CostModel::new(
                config.get_double("backtest", "commission_per_share", 0.0005),
                slippage,
            ),
            max_leverage: config.get_double(
                "strategy",
                "max_leverage",
                strategy_defaults.max_leverage,
            ),
        },
        risk_free_rate: config.get_double("backtest", "risk_free_rate", 0.0),
    })
}

pub fn build_strategy_params(
    config: &dyn ConfigPort,
) -> Result<StrategyParameters, OrbtraderError> {
    validate_strategy_config(config)?;

    let defaults = StrategyParameters::default();
    let params = StrategyParameters {
        open_range_minutes: config.get_double(
            "strategy",
            "open_range_minutes",
            defaults.open_range_minutes as f64,
        ) as i64,
        risk_percent: config.get_double("strategy", "risk_percent", defaults.risk_percent),
        take_profit_multiple: config.get_double(
            "strategy",
            "take_profit_multiple",
            defaults.take_profit_multiple,
        ),
        max_leverage: config.get_double("strategy", "max_leverage", defaults.max_leverage),
        market_open: get_time(config, "market_open", defaults.market_open)?,
        exit_time: get_time(config, "exit_time", defaults.exit_time)?,
        early_closes: get_early_closes(config)?.unwrap_or_else(default_calendar),
    };
    params.validate()?;
    Ok(params)
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub data_files: Vec<PathBuf>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub html_output: Option<PathBuf>,
    pub trades_output: Option<PathBuf>,
}

/// Inputs and outputs of a backtest invocation after merging config and flags.
#[derive(Debug, Clone, PartialEq)]
pub struct RunPlan {
    pub data_files: Vec<PathBuf>,
    pub benchmark_file: Option<PathBuf>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub html_output: PathBuf,
    pub trades_output: Option<PathBuf>,
}

pub fn resolve_plan(
    config: &dyn ConfigPort,
    overrides: &RunOverrides,
) -> Result<RunPlan, OrbtraderError> {
    let data_files = if overrides.data_files.is_empty() {
        let file = config
            .get_string("backtest", "data_file")
            .ok_or_else(|| OrbtraderError::ConfigMissing {
                section: "backtest".into(),
                key: "data_file".into(),
            })?;
        vec![PathBuf::from(file)]
    } else {
        overrides.data_files.clone()
    };
    if data_files.len() > 1 {
        check_distinct_sources(&data_files)?;
    }

    let start = match overrides.start {
        Some(d) => Some(d),
        None => get_date(config, "start_date")?,
    };
    let end = match overrides.end {
        Some(d) => Some(d),
        None => get_date(config, "end_date")?,
    };
    if let (Some(s), Some(e)) = (start, end) {
        if s > e {
            return Err(OrbtraderError::ConfigInvalid {
                section: "backtest".into(),
                key: "start_date".into(),
                reason: format!("start date {s} is after end date {e}"),
            });
        }
    }

    Ok(RunPlan {
        data_files,
        benchmark_file: config.get_string("backtest", "benchmark_file").map(PathBuf::from),
        start,
        end,
        html_output: overrides
            .html_output
            .clone()
            .or_else(|| config.get_string("report", "html_output").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("report.html")),
        trades_output: overrides
            .trades_output
            .clone()
            .or_else(|| config.get_string("report", "trades_output").map(PathBuf::from)),
    })
}

/// Per-feed outputs are named after the source, so two feeds sharing a file
/// stem would write the same report.
fn check_distinct_sources(data_files: &[PathBuf]) -> Result<(), OrbtraderError> {
    let mut seen: HashMap<String, &PathBuf> = HashMap::new();
    for file in data_files {
        let source = CsvAdapter::new(file).source_name();
        if let Some(previous) = seen.insert(source.clone(), file) {
            return Err(OrbtraderError::ConfigInvalid {
                section: "backtest".into(),
                key: "data_file".into(),
                reason: format!(
                    "{} and {} both produce outputs named '{source}'",
                    previous.display(),
                    file.display()
                ),
            });
        }
    }
    Ok(())
}

/// `report.html` becomes `report_qqq.html` for a feed named `qqq`.
pub fn output_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}_{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{suffix}"),
    };
    path.with_file_name(name)
}

/// Output of one completed run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub source: String,
    pub result: BacktestResult,
    pub metrics: Metrics,
    pub benchmark_curve: Vec<EquityPoint>,
}

/// Loads bars, runs the breakout and computes statistics.
///
/// `benchmark` is an already filtered buy & hold series; `None` omits it.
pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    benchmark: Option<&[Bar]>,
    params: &StrategyParameters,
    bt_config: &BacktestConfig,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<RunOutcome, OrbtraderError> {
    let source = data_port.source_name();
    let bars = data_port.fetch_bars(start, end)?;
    info!(
        source = %source,
        bars = bars.len(),
        sessions = count_sessions(&bars),
        "running backtest"
    );

    let mut strategy = OpeningRangeBreakout::new(params.clone())?;
    let result = backtest_engine::run_backtest(&bars, &mut strategy, bt_config);

    let bh_return = benchmark.and_then(buy_and_hold_return_pct);
    let benchmark_curve = benchmark
        .map(|b| buy_and_hold_curve(b, bt_config.initial_capital))
        .unwrap_or_default();
    let metrics = Metrics::compute(&result.portfolio, bt_config.risk_free_rate)
        .with_buy_and_hold(bh_return);

    Ok(RunOutcome {
        source,
        result,
        metrics,
        benchmark_curve,
    })
}

pub fn write_reports(
    outcome: &RunOutcome,
    params: &StrategyParameters,
    html_output: &Path,
    trades_output: Option<&Path>,
) -> Result<(), OrbtraderError> {
    let ctx = ReportContext {
        params,
        result: &outcome.result,
        metrics: &outcome.metrics,
        benchmark: &outcome.benchmark_curve,
    };

    HtmlReportAdapter::new().write(&ctx, &html_output.to_string_lossy())?;
    info!(path = %html_output.display(), "report written");

    if let Some(path) = trades_output {
        TradeLogCsvAdapter::new().write(&ctx, &path.to_string_lossy())?;
        info!(path = %path.display(), "trade log written");
    }
    Ok(())
}

pub fn print_summary(outcome: &RunOutcome) {
    println!("\n=== {} [{}] ===", outcome.result.strategy_name, outcome.source);
    if let Some((start, end)) = outcome.result.period() {
        println!("{:<24}{}", "Start", start);
        println!("{:<24}{}", "End", end);
    }
    for (label, value) in outcome.metrics.summary_rows() {
        println!("{label:<24}{value}");
    }
    if outcome.result.orders_rejected > 0 {
        println!("{:<24}{}", "Orders Rejected", outcome.result.orders_rejected);
    }
}

fn load_benchmark(plan: &RunPlan) -> Option<Vec<Bar>> {
    let path = plan.benchmark_file.as_ref()?;
    match CsvAdapter::new(path).fetch_bars(plan.start, plan.end) {
        Ok(bars) => Some(bars),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "benchmark unavailable, omitting buy & hold");
            None
        }
    }
}

fn run_backtest(config_path: &Path, overrides: &RunOverrides) -> Result<(), OrbtraderError> {
    let config = load_config(config_path)?;
    let bt_config = build_backtest_config(&config)?;
    let params = build_strategy_params(&config)?;
    let plan = resolve_plan(&config, overrides)?;
    let benchmark = load_benchmark(&plan);

    let multiple = plan.data_files.len() > 1;
    let outcomes: Vec<Result<RunOutcome, OrbtraderError>> = plan
        .data_files
        .par_iter()
        .map(|file| {
            let data_port = CsvAdapter::new(file);
            let outcome = run_backtest_pipeline(
                &data_port,
                benchmark.as_deref(),
                &params,
                &bt_config,
                plan.start,
                plan.end,
            )?;

            let (html, trades) = if multiple {
                (
                    output_with_suffix(&plan.html_output, &outcome.source),
                    plan.trades_output
                        .as_deref()
                        .map(|p| output_with_suffix(p, &outcome.source)),
                )
            } else {
                (plan.html_output.clone(), plan.trades_output.clone())
            };
            write_reports(&outcome, &params, &html, trades.as_deref())?;
            Ok(outcome)
        })
        .collect();

    let mut first_error = None;
    for (file, outcome) in plan.data_files.iter().zip(outcomes) {
        match outcome {
            Ok(outcome) => print_summary(&outcome),
            Err(e) => {
                eprintln!("error: {}: {e}", file.display());
                first_error.get_or_insert(e);
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn run_validate(config_path: &Path) -> Result<(), OrbtraderError> {
    let config = load_config(config_path)?;
    let bt_config = build_backtest_config(&config)?;
    let params = build_strategy_params(&config)?;
    let plan = resolve_plan(&config, &RunOverrides::default());

    let boundary = OpeningRange::new(params.market_open, params.open_range_minutes).boundary();
    let cost_model = bt_config.execution.cost_model;

    println!("Configuration is valid.\n");
    match &plan {
        Ok(plan) => {
            for file in &plan.data_files {
                println!("{:<24}{}", "Data File", file.display());
            }
            let range = |d: Option<NaiveDate>| d.map_or("-".to_string(), |d| d.to_string());
            println!("{:<24}{} to {}", "Period", range(plan.start), range(plan.end));
        }
        Err(e) => println!("{:<24}none ({e})", "Data File"),
    }
    println!("{:<24}{:.2}", "Initial Capital", bt_config.initial_capital);
    println!("{:<24}{}", "Market Open", params.market_open.format("%H:%M"));
    println!("{:<24}{}", "Decision Bar", boundary.format("%H:%M"));
    println!("{:<24}{}", "Exit Time", params.exit_time.format("%H:%M"));
    println!("{:<24}{}", "Early Closes", params.early_closes.len());
    println!("{:<24}{}%", "Risk per Trade", params.risk_percent);
    println!("{:<24}{}x", "Take Profit", params.take_profit_multiple);
    println!("{:<24}{}x", "Max Leverage", params.max_leverage);
    println!("{:<24}{}", "Commission / Share", cost_model.commission_per_share);
    println!("{:<24}{}", "Slippage Mode", cost_model.slippage.name());
    Ok(())
}

fn run_info(data_path: &Path) -> Result<(), OrbtraderError> {
    let adapter = CsvAdapter::new(data_path);
    let bars = adapter.fetch_bars(None, None)?;
    let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
        return Err(OrbtraderError::NoData {
            source_name: adapter.source_name(),
        });
    };
    println!(
        "{}: {} bars, {} trading days, {} to {}",
        adapter.source_name(),
        bars.len(),
        count_sessions(&bars),
        first.timestamp,
        last.timestamp
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_backtest_flags() {
        let cli = Cli::try_parse_from([
            "orbtrader",
            "-vv",
            "backtest",
            "-c",
            "orb.ini",
            "--data",
            "a.csv",
            "--data",
            "b.csv",
            "--start",
            "2020-01-02",
            "-o",
            "out.html",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Backtest {
                config,
                data,
                start,
                end,
                output,
                trades,
            } => {
                assert_eq!(config, PathBuf::from("orb.ini"));
                assert_eq!(data.len(), 2);
                assert_eq!(start, NaiveDate::from_ymd_opt(2020, 1, 2));
                assert_eq!(end, None);
                assert_eq!(output, Some(PathBuf::from("out.html")));
                assert_eq!(trades, None);
            }
            other => panic!("expected backtest, got {other:?}"),
        }
    }

    #[test]
    fn cli_rejects_bad_date() {
        let result = Cli::try_parse_from([
            "orbtrader",
            "backtest",
            "-c",
            "orb.ini",
            "--start",
            "02/01/2020",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_parses_info_and_validate() {
        let cli = Cli::try_parse_from(["orbtrader", "info", "--data", "qqq.csv"]).unwrap();
        assert!(matches!(cli.command, Command::Info { .. }));
        let cli = Cli::try_parse_from(["orbtrader", "validate", "-c", "orb.ini"]).unwrap();
        assert!(matches!(cli.command, Command::Validate { .. }));
    }

    #[test]
    fn output_suffix_keeps_extension() {
        assert_eq!(
            output_with_suffix(Path::new("out/report.html"), "qqq"),
            PathBuf::from("out/report_qqq.html")
        );
        assert_eq!(
            output_with_suffix(Path::new("trades"), "spy"),
            PathBuf::from("trades_spy")
        );
    }
}
