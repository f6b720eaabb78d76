//! Configuration validation.
//!
//! Validates all config fields before a backtest runs. The typed readers here
//! are shared with the CLI builders so a value that validates also parses.

use crate::domain::calendar::EarlyCloseCalendar;
use crate::domain::error::OrbtraderError;
use crate::domain::strategy::StrategyParameters;
use crate::ports::config_port::ConfigPort;
use chrono::{NaiveDate, NaiveTime};

pub const SLIPPAGE_MODES: [&str; 2] = ["spread", "per_share"];

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), OrbtraderError> {
    validate_initial_capital(config)?;
    validate_commission(config)?;
    validate_slippage(config)?;
    validate_risk_free_rate(config)?;
    validate_dates(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), OrbtraderError> {
    for key in [
        "open_range_minutes",
        "risk_percent",
        "take_profit_multiple",
        "max_leverage",
    ] {
        let value = get_number(config, "strategy", key, 1.0)?;
        if value <= 0.0 {
            return Err(invalid("strategy", key, format!("{key} must be positive")));
        }
    }
    if get_number(config, "strategy", "open_range_minutes", 1.0)?.fract() != 0.0 {
        return Err(invalid(
            "strategy",
            "open_range_minutes",
            "open_range_minutes must be a whole number of minutes".to_string(),
        ));
    }

    let defaults = StrategyParameters::default();
    let market_open = get_time(config, "market_open", defaults.market_open)?;
    let exit_time = get_time(config, "exit_time", defaults.exit_time)?;
    if exit_time <= market_open {
        return Err(invalid(
            "strategy",
            "exit_time",
            "exit_time must be after market_open".to_string(),
        ));
    }

    get_early_closes(config)?;
    Ok(())
}

/// Numeric value of `key`, `default` when absent, an error when not a number.
pub fn get_number(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, OrbtraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(invalid(section, key, format!("'{raw}' is not a number"))),
        },
    }
}

/// `[strategy]` time of day in `HH:MM` (seconds optional).
pub fn get_time(
    config: &dyn ConfigPort,
    key: &str,
    default: NaiveTime,
) -> Result<NaiveTime, OrbtraderError> {
    match config.get_string("strategy", key) {
        None => Ok(default),
        Some(raw) => parse_time(raw.trim()).ok_or_else(|| {
            invalid(
                "strategy",
                key,
                format!("invalid {key} '{raw}', expected HH:MM"),
            )
        }),
    }
}

/// `[backtest]` date in `YYYY-MM-DD`, `None` when absent.
pub fn get_date(config: &dyn ConfigPort, key: &str) -> Result<Option<NaiveDate>, OrbtraderError> {
    match config.get_string("backtest", key) {
        None => Ok(None),
        Some(raw) => parse_date(raw.trim()).map(Some).ok_or_else(|| {
            invalid(
                "backtest",
                key,
                format!("invalid {key} format, expected YYYY-MM-DD"),
            )
        }),
    }
}

/// The configured early-close list, or `None` when the key is absent.
pub fn get_early_closes(
    config: &dyn ConfigPort,
) -> Result<Option<EarlyCloseCalendar>, OrbtraderError> {
    match config.get_string("strategy", "early_close") {
        None => Ok(None),
        Some(raw) => EarlyCloseCalendar::parse_list(&raw).map(Some).map_err(|entry| {
            invalid(
                "strategy",
                "early_close",
                format!("invalid timestamp '{entry}', expected YYYY-MM-DD HH:MM:SS"),
            )
        }),
    }
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

pub fn parse_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

fn invalid(section: &str, key: &str, reason: String) -> OrbtraderError {
    OrbtraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason,
    }
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), OrbtraderError> {
    let value = get_number(config, "backtest", "initial_capital", 25_000.0)?;
    if value <= 0.0 {
        return Err(invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive".to_string(),
        ));
    }
    Ok(())
}

fn validate_commission(config: &dyn ConfigPort) -> Result<(), OrbtraderError> {
    let value = get_number(config, "backtest", "commission_per_share", 0.0)?;
    if value < 0.0 {
        return Err(invalid(
            "backtest",
            "commission_per_share",
            "commission_per_share must be non-negative".to_string(),
        ));
    }
    Ok(())
}

fn validate_slippage(config: &dyn ConfigPort) -> Result<(), OrbtraderError> {
    if let Some(mode) = config.get_string("backtest", "slippage_mode") {
        if !SLIPPAGE_MODES.contains(&mode.trim()) {
            return Err(invalid(
                "backtest",
                "slippage_mode",
                format!("unknown slippage_mode '{mode}', expected spread or per_share"),
            ));
        }
    }
    for key in ["slippage_bps", "slippage_cents"] {
        if get_number(config, "backtest", key, 0.0)? < 0.0 {
            return Err(invalid("backtest", key, format!("{key} must be non-negative")));
        }
    }
    Ok(())
}

fn validate_risk_free_rate(config: &dyn ConfigPort) -> Result<(), OrbtraderError> {
    let value = get_number(config, "backtest", "risk_free_rate", 0.0)?;
    if !(0.0..1.0).contains(&value) {
        return Err(invalid(
            "backtest",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1".to_string(),
        ));
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), OrbtraderError> {
    let start_date = get_date(config, "start_date")?;
    let end_date = get_date(config, "end_date")?;

    if let (Some(start), Some(end)) = (start_date, end_date) {
        if start > end {
            return Err(invalid(
                "backtest",
                "start_date",
                "start_date must not be after end_date".to_string(),
            ));
        }
    }
    Ok(())
}
