//! tradesim runner: run configuration, data loading, metrics, exports and sweeps.
//!
//! This crate builds on `tradesim-core` to provide:
//! - TOML run files with a blake3 run id
//! - CSV bar loading with ATR fill-in, plus a seeded synthetic source
//! - Single-run orchestration with performance metrics
//! - JSON / CSV artifacts and text summaries
//! - Parameter sweeps, serial or on the rayon pool, with cancellation

pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod runner;
pub mod sweep;
pub mod synthetic;

pub use config::{ConfigError, DataConfig, OutputConfig, RunConfig, RunId, SweepGrid, SyntheticConfig};
pub use data_loader::{load_csv, LoadError, LoadOptions, LoadedData};
pub use metrics::PerformanceMetrics;
pub use runner::{load_data, run_from_config, run_with_data, BacktestResult, RunError, SCHEMA_VERSION};
pub use sweep::{run_sweep, SweepEntry, SweepResults};
