//! Backtest driver: validates, replays the series once in order, and reports.

use thiserror::Error;
use tracing::{debug, info};

use crate::config::{ConfigError, StrategyConfig};
use crate::data::{BarSeries, DataError};
use crate::domain::Bar;
use crate::engine::report::BacktestReport;
use crate::engine::state::{RunContext, StepStatus};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RunError {
    #[error("invalid strategy config: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid bar data: {0}")]
    Data(#[from] DataError),
}

/// Run a backtest over a validated series.
///
/// This is the main entry point for the engine. It:
/// 1. Validates the config (nothing is replayed on failure)
/// 2. Feeds every bar, in timestamp order, to the position state machine
/// 3. Stops early once the account is halted and flat
/// 4. Closes any open position at the last processed bar's close
pub fn run_backtest(series: &BarSeries, config: &StrategyConfig) -> Result<BacktestReport, RunError> {
    let mut ctx = RunContext::new(config)?;
    info!(
        bars = series.len(),
        initial_capital = config.initial_capital,
        compounding = config.compounding,
        pyramiding = config.enable_pyramiding,
        "backtest starting"
    );

    let mut last: Option<(usize, &Bar)> = None;
    for (index, bar) in series.iter().enumerate() {
        last = Some((index, bar));
        if ctx.step(index, bar) == StepStatus::Halted {
            debug!(bar_index = index, "account halted and flat, stopping replay");
            break;
        }
    }

    Ok(ctx.finish(last))
}

/// Validate raw bars into a series, then run.
pub fn run_on_bars(bars: Vec<Bar>, config: &StrategyConfig) -> Result<BacktestReport, RunError> {
    config.validate()?;
    let series = BarSeries::new(bars)?;
    run_backtest(&series, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EnsembleSignal, ExitReason};
    use chrono::{Duration, NaiveDate};

    fn bars(closes: &[f64]) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                Bar::new(start + Duration::days(i as i64), c, c + 0.5, c - 0.5, c).with_atr(1.0)
            })
            .collect()
    }

    #[test]
    fn empty_series_reports_initial_capital() {
        let report = run_on_bars(Vec::new(), &StrategyConfig::default()).unwrap();
        assert_eq!(report.final_capital, 1000.0);
        assert_eq!(report.bars_processed, 0);
        assert!(report.trades.is_empty());
    }

    #[test]
    fn invalid_config_fails_before_data() {
        let config = StrategyConfig {
            trailing_stop_mult: -1.0,
            ..Default::default()
        };
        let err = run_on_bars(bars(&[100.0]), &config).unwrap_err();
        assert!(matches!(err, RunError::Config(_)));
    }

    #[test]
    fn bad_bars_are_a_data_error() {
        let mut data = bars(&[100.0, 101.0]);
        data.swap(0, 1);
        let err = run_on_bars(data, &StrategyConfig::default()).unwrap_err();
        assert!(matches!(err, RunError::Data(DataError::NonMonotonicTimestamp { .. })));
    }

    #[test]
    fn open_position_closed_at_end() {
        let mut data = bars(&[100.0, 100.2, 100.4]);
        data[0].signal = EnsembleSignal::long(3.0);
        let report = run_on_bars(data, &StrategyConfig::default()).unwrap();
        assert_eq!(report.trades.len(), 1);
        assert_eq!(report.trades[0].exit_reason, ExitReason::EndOfData);
        assert_eq!(report.trades[0].exit_bar, 2);
        assert_eq!(report.exits(ExitReason::EndOfData), 1);
    }
}
