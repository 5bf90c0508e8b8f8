//! Per-run context: owns the state machine, the ledger and the run counters.

use std::collections::BTreeMap;

use tracing::info;

use crate::config::{ConfigError, StrategyConfig};
use crate::domain::{Bar, Position};
use crate::engine::ledger::{AccountSnapshot, Ledger};
use crate::engine::report::{count_exits, BacktestReport};
use crate::position_management::{PositionMachine, SkipReason, StepReport};

/// Outcome of one driver step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Continue,
    /// The account is halted and no position remains; later bars cannot change anything.
    Halted,
}

/// Everything mutable about one run. Nothing here is shared between runs.
#[derive(Debug, Clone)]
pub struct RunContext {
    machine: PositionMachine,
    ledger: Ledger,
    capital_curve: Vec<f64>,
    bars_processed: usize,
    entries: usize,
    layers_added: usize,
    skipped: BTreeMap<SkipReason, usize>,
    skipped_layers: BTreeMap<SkipReason, usize>,
}

impl RunContext {
    pub fn new(config: &StrategyConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            machine: PositionMachine::new(config),
            ledger: Ledger::from_config(config),
            capital_curve: Vec::new(),
            bars_processed: 0,
            entries: 0,
            layers_added: 0,
            skipped: BTreeMap::new(),
            skipped_layers: BTreeMap::new(),
        })
    }

    /// Feed one bar to the state machine and record the resulting capital.
    pub fn step(&mut self, bar_index: usize, bar: &Bar) -> StepStatus {
        let report = self.machine.on_bar(bar_index, bar, &mut self.ledger);
        self.record(&report);
        self.bars_processed += 1;
        self.capital_curve.push(self.ledger.capital());

        if self.ledger.is_halted() && self.machine.is_flat() {
            StepStatus::Halted
        } else {
            StepStatus::Continue
        }
    }

    fn record(&mut self, report: &StepReport) {
        if report.entered.is_some() {
            self.entries += 1;
        }
        if report.layer_added {
            self.layers_added += 1;
        }
        if let Some(reason) = report.skipped {
            *self.skipped.entry(reason).or_insert(0) += 1;
        }
        if let Some(reason) = report.skipped_layer {
            *self.skipped_layers.entry(reason).or_insert(0) += 1;
        }
    }

    pub fn position(&self) -> Option<&Position> {
        self.machine.position()
    }

    pub fn snapshot(&self) -> AccountSnapshot {
        self.ledger.snapshot()
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn bars_processed(&self) -> usize {
        self.bars_processed
    }

    /// Close any open position at `last` and build the report.
    pub fn finish(mut self, last: Option<(usize, &Bar)>) -> BacktestReport {
        if let Some((index, bar)) = last {
            if self.machine.close_at_end(index, bar, &mut self.ledger) > 0 {
                if let Some(tail) = self.capital_curve.last_mut() {
                    *tail = self.ledger.capital();
                }
            }
        }

        let initial_capital = self.ledger.initial_capital();
        let max_drawdown = self.ledger.worst_drawdown();
        let (account, trades) = self.ledger.into_parts();

        let report = BacktestReport {
            initial_capital,
            final_capital: account.capital,
            peak_capital: account.peak_capital,
            max_drawdown,
            halted: account.halted,
            halted_at_bar: account.halted_at,
            exit_counts: count_exits(&trades),
            trades,
            capital_curve: self.capital_curve,
            bars_processed: self.bars_processed,
            entries: self.entries,
            layers_added: self.layers_added,
            skipped_entries: self.skipped,
            skipped_layers: self.skipped_layers,
        };
        info!(
            bars = report.bars_processed,
            trades = report.trades.len(),
            entries = report.entries,
            skipped = report.total_skipped(),
            final_capital = report.final_capital,
            max_drawdown = report.max_drawdown,
            halted = report.halted,
            "backtest finished"
        );
        report
    }
}
