//! Parameter sweeps over a `SweepGrid`.
//!
//! Every grid point is an independent run sharing one immutable `LoadedData`.
//! Runs execute one by one or on the rayon pool. A shared `AtomicBool` stops
//! the sweep between runs: a run already in progress always completes.

use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use tracing::{info, warn};

use tradesim_core::StrategyConfig;

use crate::config::{ConfigError, SweepGrid};
use crate::data_loader::LoadedData;
use crate::runner::{run_with_data, BacktestResult, RunError};

/// One finished grid point.
#[derive(Debug, Clone)]
pub struct SweepEntry {
    /// Position of this point in the expanded grid.
    pub index: usize,
    pub result: BacktestResult,
}

/// Finished runs ranked by final capital, best first.
#[derive(Debug, Clone, Default)]
pub struct SweepResults {
    entries: Vec<SweepEntry>,
    total: usize,
    cancelled: bool,
}

impl SweepResults {
    fn new(mut entries: Vec<SweepEntry>, total: usize, cancelled: bool) -> Self {
        // Stable sort: equal capital keeps grid order.
        entries.sort_by(|a, b| {
            b.result
                .final_capital()
                .total_cmp(&a.result.final_capital())
        });
        Self {
            entries,
            total,
            cancelled,
        }
    }

    pub fn ranked(&self) -> &[SweepEntry] {
        &self.entries
    }

    pub fn best(&self) -> Option<&SweepEntry> {
        self.entries.first()
    }

    pub fn top_n(&self, n: usize) -> &[SweepEntry] {
        &self.entries[..n.min(self.entries.len())]
    }

    /// Number of runs that completed.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Size of the expanded grid.
    pub fn total(&self) -> usize {
        self.total
    }

    /// True when the cancel flag stopped the sweep before every point ran.
    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }
}

/// Runs every grid point over `data`.
///
/// All expanded configs are validated before the first run starts.
pub fn run_sweep(
    base: &StrategyConfig,
    grid: &SweepGrid,
    data: &LoadedData,
    cancel: &AtomicBool,
) -> Result<SweepResults, RunError> {
    if grid.is_empty() {
        return Err(ConfigError::EmptySweep.into());
    }
    let configs = grid.expand(base);
    for config in &configs {
        config.validate().map_err(ConfigError::from)?;
    }
    let total = configs.len();
    info!(points = total, parallel = grid.parallel, "starting sweep");

    let run_point = |(index, config): (usize, &StrategyConfig)| {
        if cancel.load(Ordering::Relaxed) {
            return None;
        }
        Some(run_with_data(config, data).map(|result| SweepEntry { index, result }))
    };

    let outcomes: Vec<Option<Result<SweepEntry, RunError>>> = if grid.parallel {
        configs.par_iter().enumerate().map(run_point).collect()
    } else {
        configs.iter().enumerate().map(run_point).collect()
    };

    let mut entries = Vec::with_capacity(total);
    for outcome in outcomes.into_iter().flatten() {
        entries.push(outcome?);
    }
    let cancelled = entries.len() < total;
    if cancelled {
        warn!(completed = entries.len(), total, "sweep cancelled");
    }
    Ok(SweepResults::new(entries, total, cancelled))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyntheticConfig;
    use crate::synthetic;

    fn data() -> LoadedData {
        synthetic::generate(&SyntheticConfig {
            bars: 250,
            seed: 11,
            signal_rate: 0.2,
            ..Default::default()
        })
        .unwrap()
    }

    fn grid(parallel: bool) -> SweepGrid {
        SweepGrid {
            risk_per_trade: vec![0.005, 0.01, 0.02],
            trailing_stop_mult: vec![1.0, 2.0],
            parallel,
            ..Default::default()
        }
    }

    #[test]
    fn runs_every_point_and_ranks() {
        let data = data();
        let results = run_sweep(
            &StrategyConfig::default(),
            &grid(false),
            &data,
            &AtomicBool::new(false),
        )
        .unwrap();
        assert_eq!(results.len(), 6);
        assert_eq!(results.total(), 6);
        assert!(!results.was_cancelled());
        for pair in results.ranked().windows(2) {
            assert!(pair[0].result.final_capital() >= pair[1].result.final_capital());
        }
        assert_eq!(results.top_n(2).len(), 2);
        assert_eq!(results.top_n(100).len(), 6);
    }

    #[test]
    fn parallel_matches_serial() {
        let data = data();
        let base = StrategyConfig::default();
        let serial = run_sweep(&base, &grid(false), &data, &AtomicBool::new(false)).unwrap();
        let parallel = run_sweep(&base, &grid(true), &data, &AtomicBool::new(false)).unwrap();
        let key = |r: &SweepResults| -> Vec<(usize, String)> {
            r.ranked()
                .iter()
                .map(|e| (e.index, e.result.run_id.clone()))
                .collect()
        };
        assert_eq!(key(&serial), key(&parallel));
    }

    #[test]
    fn cancelled_before_start_runs_nothing() {
        let data = data();
        let results = run_sweep(
            &StrategyConfig::default(),
            &grid(true),
            &data,
            &AtomicBool::new(true),
        )
        .unwrap();
        assert!(results.is_empty());
        assert!(results.was_cancelled());
        assert!(results.best().is_none());
    }

    #[test]
    fn invalid_grid_point_rejected_up_front() {
        let bad = SweepGrid {
            risk_per_trade: vec![0.01, 0.0],
            ..Default::default()
        };
        let err = run_sweep(
            &StrategyConfig::default(),
            &bad,
            &data(),
            &AtomicBool::new(false),
        )
        .unwrap_err();
        assert!(matches!(err, RunError::Config(ConfigError::Strategy(_))));
    }

    #[test]
    fn empty_grid_rejected() {
        let err = run_sweep(
            &StrategyConfig::default(),
            &SweepGrid::default(),
            &data(),
            &AtomicBool::new(false),
        )
        .unwrap_err();
        assert!(matches!(err, RunError::Config(ConfigError::EmptySweep)));
    }
}
