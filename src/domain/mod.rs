//! Core domain types and logic.
//!
//! Nothing in here performs I/O; data and configuration arrive through
//! [`crate::ports`].

pub mod value;
pub mod handle;
pub mod lookback;
pub mod table;
pub mod operation;
pub mod sequence;
pub mod engine;
pub mod ohlcv;
pub mod market_data;
pub mod indicator;
pub mod alarm;
pub mod fragment;
pub mod strategies;
pub mod metrics;
pub mod universe;
pub mod config_validation;
pub mod error;
