//! Core domain types and logic.

pub mod ohlcv;
pub mod timeframe;
pub mod resample;
pub mod position;
pub mod ledger;
pub mod execution;
pub mod indicator;
pub mod strategy;
pub mod metrics;
pub mod backtest;
pub mod universe;
pub mod runner;
pub mod config_validation;
pub mod error;
