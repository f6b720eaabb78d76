//! Core domain types and logic.

pub mod ohlcv;
pub mod calendar;
pub mod opening_range;
pub mod cost_model;
pub mod sizing;
pub mod strategy;
pub mod breakout;
pub mod position;
pub mod portfolio;
pub mod execution;
pub mod backtest;
pub mod metrics;
pub mod config_validation;
pub mod error;
