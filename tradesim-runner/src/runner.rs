//! Backtest runner: data loading, engine invocation and metric computation.
//!
//! A `BacktestResult` is the persisted unit of work: the strategy that ran, the
//! fingerprint of its inputs, the engine's report and the derived metrics.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use tradesim_core::fingerprint::RunFingerprint;
use tradesim_core::{BacktestReport, StrategyConfig};

use crate::config::{ConfigError, DataConfig, RunConfig, RunId};
use crate::data_loader::{load_csv, LoadError, LoadOptions, LoadedData};
use crate::metrics::PerformanceMetrics;
use crate::synthetic;

/// Schema version for persisted results. Bump when the layout changes.
pub const SCHEMA_VERSION: u32 = 1;

/// Errors from the runner layer.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("data error: {0}")]
    Load(#[from] LoadError),

    #[error("backtest failed: {0}")]
    Engine(#[from] tradesim_core::RunError),
}

/// Complete result of a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub schema_version: u32,
    /// BLAKE3 of the config hash and dataset hash together.
    pub run_id: RunId,
    pub fingerprint: RunFingerprint,
    pub config: StrategyConfig,
    pub metrics: PerformanceMetrics,
    pub report: BacktestReport,
    /// True when the bars came from the synthetic generator.
    pub synthetic: bool,
    pub source: Option<PathBuf>,
}

impl BacktestResult {
    pub fn final_capital(&self) -> f64 {
        self.report.final_capital
    }
}

/// Load the bar series a data section describes.
pub fn load_data(data: &DataConfig) -> Result<LoadedData, LoadError> {
    match data {
        DataConfig::Csv { path, atr_period } => {
            let opts = LoadOptions {
                atr_period: *atr_period,
                ..LoadOptions::default()
            };
            load_csv(path, &opts)
        }
        DataConfig::Synthetic(cfg) => synthetic::generate(cfg),
    }
}

/// Run one strategy over already-loaded data.
pub fn run_with_data(
    strategy: &StrategyConfig,
    data: &LoadedData,
) -> Result<BacktestResult, RunError> {
    let report = tradesim_core::run_backtest(&data.series, strategy)?;
    let metrics = PerformanceMetrics::compute(&report);
    let fingerprint =
        RunFingerprint::with_dataset_hash(strategy, &data.series, data.dataset_hash.clone());

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id: fingerprint.run_hash(),
        fingerprint,
        config: strategy.clone(),
        metrics,
        report,
        synthetic: data.synthetic,
        source: data.source.clone(),
    })
}

/// Load data and run the config's strategy once.
pub fn run_from_config(config: &RunConfig) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let data = load_data(&config.data)?;
    let result = run_with_data(&config.strategy, &data)?;
    info!(
        run_id = %&result.run_id[..12],
        trades = result.report.trades.len(),
        final_capital = result.report.final_capital,
        halted = result.report.halted,
        "run complete"
    );
    Ok(result)
}
