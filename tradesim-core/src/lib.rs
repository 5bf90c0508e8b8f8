//! tradesim core: domain types, validation, the position state machine and the driver.
//!
//! This crate contains the heart of the simulator:
//! - Domain types (bars, ensemble signals, positions, trades)
//! - Strategy configuration with fail-fast validation
//! - Validated bar series and the ATR indicator
//! - Risk sizing, stop ratchet and the per-bar position state machine
//! - Account ledger with the drawdown kill-switch
//! - Backtest driver and report
//!
//! The core performs no I/O. Loading, export and sweeps live in `tradesim-runner`.

pub mod config;
pub mod data;
pub mod domain;
pub mod engine;
pub mod fingerprint;
pub mod indicators;
pub mod position_management;

pub use config::{ConfigError, StrategyConfig};
pub use data::{BarSeries, DataError};
pub use domain::{Bar, EnsembleSignal, ExitReason, Side, SignalDirection, TradeRecord};
pub use engine::{run_backtest, run_on_bars, BacktestReport, RunError};
