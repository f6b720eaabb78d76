//! Orchestration tests for the backtest command: config loading, run
//! planning, and the pipeline from bar file to written reports.

mod common;

use approx::assert_relative_eq;
use chrono::NaiveTime;
use common::*;
use orbtrader::adapters::csv_adapter::CsvAdapter;
use orbtrader::adapters::file_config_adapter::FileConfigAdapter;
use orbtrader::cli::{self, RunOverrides};
use orbtrader::domain::cost_model::SlippageModel;
use orbtrader::domain::error::OrbtraderError;
use orbtrader::domain::strategy::StrategyParameters;
use std::io::Write;
use std::path::{Path, PathBuf};

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn config_from(content: &str) -> FileConfigAdapter {
    FileConfigAdapter::from_string(content).unwrap()
}

const VALID_INI: &str = r#"
[backtest]
data_file = data/qqq_intraday.csv
benchmark_file = data/qqq_daily.csv
start_date = 2024-01-01
end_date = 2024-06-30
initial_capital = 50000
commission_per_share = 0.0035
slippage_mode = spread
slippage_bps = 2
risk_free_rate = 0.04

[strategy]
open_range_minutes = 15
risk_percent = 0.5
take_profit_multiple = 3
max_leverage = 2
market_open = 09:30
exit_time = 15:55
early_close = 2024-07-03 12:59:00, 2024-11-29 12:59:00

[report]
html_output = out/report.html
trades_output = out/trades.csv
"#;

mod config_loading {
    use super::*;

    #[test]
    fn loads_ini_from_disk() {
        let file = write_temp_ini(VALID_INI);
        let config = cli::load_config(file.path()).unwrap();
        let bt = cli::build_backtest_config(&config).unwrap();
        assert_relative_eq!(bt.initial_capital, 50_000.0);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = cli::load_config(Path::new("/nonexistent/orbtrader.ini")).unwrap_err();
        assert!(matches!(err, OrbtraderError::ConfigParse { .. }));
        assert_eq!(err.exit_status(), 2);
    }

    #[test]
    fn backtest_config_from_valid_ini() {
        let bt = cli::build_backtest_config(&config_from(VALID_INI)).unwrap();
        assert_relative_eq!(bt.execution.cost_model.commission_per_share, 0.0035);
        assert_eq!(bt.execution.cost_model.slippage, SlippageModel::SpreadFraction(0.0002));
        assert_relative_eq!(bt.execution.max_leverage, 2.0);
        assert_relative_eq!(bt.risk_free_rate, 0.04);
    }

    #[test]
    fn backtest_config_defaults() {
        let bt = cli::build_backtest_config(&config_from("[backtest]\n")).unwrap();
        assert_relative_eq!(bt.initial_capital, 25_000.0);
        assert_relative_eq!(bt.execution.cost_model.commission_per_share, 0.0005);
        assert_eq!(bt.execution.cost_model.slippage, SlippageModel::from_bps(5.0));
        assert_relative_eq!(bt.execution.max_leverage, 4.0);
        assert_relative_eq!(bt.risk_free_rate, 0.0);
    }

    #[test]
    fn per_share_slippage_mode() {
        let config = config_from("[backtest]\nslippage_mode = per_share\nslippage_cents = 0.5\n");
        let bt = cli::build_backtest_config(&config).unwrap();
        assert_eq!(bt.execution.cost_model.slippage, SlippageModel::PerShareCents(0.5));
    }

    #[test]
    fn unknown_slippage_mode_is_rejected() {
        let config = config_from("[backtest]\nslippage_mode = vwap\n");
        let err = cli::build_backtest_config(&config).unwrap_err();
        assert!(matches!(
            err,
            OrbtraderError::ConfigInvalid { ref key, .. } if key == "slippage_mode"
        ));
        assert_eq!(err.exit_status(), 2);
    }

    #[test]
    fn strategy_params_from_valid_ini() {
        let params = cli::build_strategy_params(&config_from(VALID_INI)).unwrap();
        assert_eq!(params.open_range_minutes, 15);
        assert_relative_eq!(params.risk_percent, 0.5);
        assert_relative_eq!(params.take_profit_multiple, 3.0);
        assert_relative_eq!(params.max_leverage, 2.0);
        assert_eq!(params.exit_time, NaiveTime::from_hms_opt(15, 55, 0).unwrap());
        assert_eq!(params.early_closes.len(), 2);
        assert!(params.early_closes.is_early_close(at(date(2024, 7, 3), 12, 59)));
    }

    #[test]
    fn strategy_params_default_to_builtin_calendar() {
        let params = cli::build_strategy_params(&config_from("[strategy]\n")).unwrap();
        assert_eq!(params, StrategyParameters::default());
    }

    #[test]
    fn fractional_range_minutes_rejected() {
        let config = config_from("[strategy]\nopen_range_minutes = 2.5\n");
        let err = cli::build_strategy_params(&config).unwrap_err();
        assert!(matches!(
            err,
            OrbtraderError::ConfigInvalid { ref key, .. } if key == "open_range_minutes"
        ));
    }

    #[test]
    fn exit_before_open_rejected() {
        let config = config_from("[strategy]\nexit_time = 09:00\n");
        let err = cli::build_strategy_params(&config).unwrap_err();
        assert!(matches!(
            err,
            OrbtraderError::ConfigInvalid { ref key, .. } if key == "exit_time"
        ));
    }

    #[test]
    fn malformed_early_close_rejected() {
        let config = config_from("[strategy]\nearly_close = 2024-07-03\n");
        let err = cli::build_strategy_params(&config).unwrap_err();
        assert_eq!(err.exit_status(), 2);
    }
}

mod run_planning {
    use super::*;

    #[test]
    fn plan_from_config() {
        let plan = cli::resolve_plan(&config_from(VALID_INI), &RunOverrides::default()).unwrap();
        assert_eq!(plan.data_files, vec![PathBuf::from("data/qqq_intraday.csv")]);
        assert_eq!(plan.benchmark_file, Some(PathBuf::from("data/qqq_daily.csv")));
        assert_eq!(plan.start, Some(date(2024, 1, 1)));
        assert_eq!(plan.end, Some(date(2024, 6, 30)));
        assert_eq!(plan.html_output, PathBuf::from("out/report.html"));
        assert_eq!(plan.trades_output, Some(PathBuf::from("out/trades.csv")));
    }

    #[test]
    fn overrides_take_precedence() {
        let overrides = RunOverrides {
            data_files: vec![PathBuf::from("a.csv"), PathBuf::from("b.csv")],
            start: Some(date(2024, 3, 1)),
            end: None,
            html_output: Some(PathBuf::from("cli.html")),
            trades_output: None,
        };
        let plan = cli::resolve_plan(&config_from(VALID_INI), &overrides).unwrap();
        assert_eq!(plan.data_files.len(), 2);
        assert_eq!(plan.start, Some(date(2024, 3, 1)));
        assert_eq!(plan.end, Some(date(2024, 6, 30)));
        assert_eq!(plan.html_output, PathBuf::from("cli.html"));
        assert_eq!(plan.trades_output, Some(PathBuf::from("out/trades.csv")));
    }

    #[test]
    fn html_output_defaults_to_report_html() {
        let config = config_from("[backtest]\ndata_file = bars.csv\n");
        let plan = cli::resolve_plan(&config, &RunOverrides::default()).unwrap();
        assert_eq!(plan.html_output, PathBuf::from("report.html"));
        assert_eq!(plan.trades_output, None);
        assert_eq!(plan.benchmark_file, None);
    }

    #[test]
    fn missing_data_file() {
        let err = cli::resolve_plan(&config_from("[backtest]\n"), &RunOverrides::default())
            .unwrap_err();
        assert!(matches!(
            err,
            OrbtraderError::ConfigMissing { ref section, ref key }
                if section == "backtest" && key == "data_file"
        ));
    }

    #[test]
    fn override_start_after_config_end() {
        let overrides = RunOverrides {
            start: Some(date(2024, 12, 1)),
            ..RunOverrides::default()
        };
        let err = cli::resolve_plan(&config_from(VALID_INI), &overrides).unwrap_err();
        assert_eq!(err.exit_status(), 2);
    }

    #[test]
    fn feeds_with_same_stem_are_rejected() {
        let overrides = RunOverrides {
            data_files: vec![
                PathBuf::from("data/2020/qqq.csv"),
                PathBuf::from("data/2021/qqq.csv"),
            ],
            ..RunOverrides::default()
        };
        let err = cli::resolve_plan(&config_from(VALID_INI), &overrides).unwrap_err();
        assert!(matches!(
            err,
            OrbtraderError::ConfigInvalid { ref key, ref reason, .. }
                if key == "data_file" && reason.contains("'qqq'")
        ));
        assert_eq!(err.exit_status(), 2);
    }

    #[test]
    fn feeds_with_distinct_stems_are_accepted() {
        let overrides = RunOverrides {
            data_files: vec![PathBuf::from("data/qqq.csv"), PathBuf::from("data/qqq/spy.csv")],
            ..RunOverrides::default()
        };
        let plan = cli::resolve_plan(&config_from(VALID_INI), &overrides).unwrap();
        assert_eq!(plan.data_files.len(), 2);
    }

    #[test]
    fn per_feed_output_names() {
        assert_eq!(
            cli::output_with_suffix(Path::new("out/report.html"), "spy"),
            PathBuf::from("out/report_spy.html")
        );
        assert_eq!(
            cli::output_with_suffix(Path::new("trades"), "spy"),
            PathBuf::from("trades_spy")
        );
    }
}

mod pipeline {
    use super::*;
    use std::fs;

    fn two_day_bars() -> Vec<Bar> {
        let mut bars = long_day(date(2024, 1, 2));
        bars.extend(stopped_short_day(date(2024, 1, 3)));
        bars
    }

    #[test]
    fn mock_port_runs_strategy() {
        let port = MockDataPort::new("mock").with_bars(two_day_bars());
        let outcome = cli::run_backtest_pipeline(
            &port,
            None,
            &StrategyParameters::default(),
            &frictionless_config(),
            None,
            None,
        )
        .unwrap();

        assert_eq!(outcome.source, "mock");
        assert_eq!(outcome.result.portfolio.closed_trades.len(), 2);
        assert_eq!(outcome.metrics.total_trades, 2);
        assert_eq!(outcome.metrics.buy_and_hold_return_pct, None);
        assert!(outcome.benchmark_curve.is_empty());
    }

    #[test]
    fn date_filter_limits_sessions() {
        let port = MockDataPort::new("mock").with_bars(two_day_bars());
        let outcome = cli::run_backtest_pipeline(
            &port,
            None,
            &StrategyParameters::default(),
            &frictionless_config(),
            Some(date(2024, 1, 3)),
            None,
        )
        .unwrap();

        let trades = &outcome.result.portfolio.closed_trades;
        assert_eq!(trades.len(), 1);
        assert_relative_eq!(trades[0].pnl, -249.0, epsilon = 1e-9);
    }

    #[test]
    fn benchmark_adds_buy_and_hold() {
        let port = MockDataPort::new("mock").with_bars(two_day_bars());
        let benchmark = vec![
            make_bar(at(date(2024, 1, 2), 16, 0), 400.0, 401.0, 399.0, 400.0),
            make_bar(at(date(2024, 1, 3), 16, 0), 400.0, 411.0, 399.0, 410.0),
        ];
        let outcome = cli::run_backtest_pipeline(
            &port,
            Some(&benchmark),
            &StrategyParameters::default(),
            &frictionless_config(),
            None,
            None,
        )
        .unwrap();

        assert_relative_eq!(outcome.metrics.buy_and_hold_return_pct.unwrap(), 2.5, epsilon = 1e-9);
        assert_eq!(outcome.benchmark_curve.len(), 2);
    }

    #[test]
    fn empty_range_is_no_data() {
        let port = MockDataPort::new("mock").with_bars(two_day_bars());
        let err = cli::run_backtest_pipeline(
            &port,
            None,
            &StrategyParameters::default(),
            &frictionless_config(),
            Some(date(2025, 1, 1)),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, OrbtraderError::NoData { ref source_name } if source_name == "mock"));
        assert_eq!(err.exit_status(), 5);
    }

    #[test]
    fn data_error_propagates() {
        let port = MockDataPort::new("mock").with_error("connection reset");
        let err = cli::run_backtest_pipeline(
            &port,
            None,
            &StrategyParameters::default(),
            &frictionless_config(),
            None,
            None,
        )
        .unwrap_err();
        assert_eq!(err.exit_status(), 5);
    }

    #[test]
    fn csv_file_to_reports() {
        let dir = tempfile::tempdir().unwrap();
        let data_path = dir.path().join("qqq.csv");
        fs::write(&data_path, bars_to_csv(&two_day_bars())).unwrap();

        let params = StrategyParameters::default();
        let outcome = cli::run_backtest_pipeline(
            &CsvAdapter::new(&data_path),
            None,
            &params,
            &frictionless_config(),
            None,
            None,
        )
        .unwrap();
        assert_eq!(outcome.source, "qqq");
        assert_eq!(outcome.result.bars_processed, 780);

        let html = dir.path().join("reports/report.html");
        let trades = dir.path().join("reports/trades.csv");
        cli::write_reports(&outcome, &params, &html, Some(&trades)).unwrap();

        let page = fs::read_to_string(&html).unwrap();
        assert!(page.contains("Opening Range Breakout Backtest Report"));
        assert!(page.contains("Trade Log (2 trades)"));

        let log = fs::read_to_string(&trades).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains(",long,83,"));
        assert!(lines[1].ends_with(",signal,383"));
        assert!(lines[2].contains(",short,83,"));
        assert!(lines[2].contains(",stop_loss,"));
    }

    #[test]
    fn trade_log_is_optional() {
        let dir = tempfile::tempdir().unwrap();
        let port = MockDataPort::new("mock").with_bars(long_day(date(2024, 1, 2)));
        let params = StrategyParameters::default();
        let outcome = cli::run_backtest_pipeline(
            &port,
            None,
            &params,
            &frictionless_config(),
            None,
            None,
        )
        .unwrap();

        let html = dir.path().join("report.html");
        cli::write_reports(&outcome, &params, &html, None).unwrap();
        assert!(html.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
