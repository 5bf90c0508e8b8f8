//! Backtest report: the complete, serializable outcome of one run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{ExitReason, TradeRecord};
use crate::position_management::SkipReason;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub initial_capital: f64,
    pub final_capital: f64,
    pub peak_capital: f64,
    /// Largest realized drawdown from peak, as a fraction.
    pub max_drawdown: f64,
    pub halted: bool,
    pub halted_at_bar: Option<usize>,
    /// Realized trades in the order they were applied.
    pub trades: Vec<TradeRecord>,
    /// Trade count per exit reason. Every reason is present, zero-filled.
    pub exit_counts: BTreeMap<ExitReason, usize>,
    /// Realized capital after each processed bar.
    pub capital_curve: Vec<f64>,
    pub bars_processed: usize,
    /// Flat -> Open transitions.
    pub entries: usize,
    pub layers_added: usize,
    /// Actionable signals not acted on, by reason.
    pub skipped_entries: BTreeMap<SkipReason, usize>,
    /// Qualifying pyramid adds that were refused, by reason.
    #[serde(default)]
    pub skipped_layers: BTreeMap<SkipReason, usize>,
}

impl BacktestReport {
    pub fn net_pnl(&self) -> f64 {
        self.final_capital - self.initial_capital
    }

    pub fn total_return(&self) -> f64 {
        if self.initial_capital > 0.0 {
            self.net_pnl() / self.initial_capital
        } else {
            0.0
        }
    }

    pub fn trade_count(&self) -> usize {
        self.trades.len()
    }

    pub fn exits(&self, reason: ExitReason) -> usize {
        self.exit_counts.get(&reason).copied().unwrap_or(0)
    }

    pub fn skipped(&self, reason: SkipReason) -> usize {
        self.skipped_entries.get(&reason).copied().unwrap_or(0)
    }

    pub fn total_skipped(&self) -> usize {
        self.skipped_entries.values().sum()
    }

    pub fn total_fees(&self) -> f64 {
        self.trades.iter().map(|t| t.fees).sum()
    }

    pub fn total_slippage(&self) -> f64 {
        self.trades.iter().map(|t| t.slippage).sum()
    }
}

/// Zero-filled count of trades per exit reason.
pub fn count_exits(trades: &[TradeRecord]) -> BTreeMap<ExitReason, usize> {
    let mut counts: BTreeMap<ExitReason, usize> =
        ExitReason::ALL.iter().map(|&r| (r, 0)).collect();
    for trade in trades {
        *counts.entry(trade.exit_reason).or_insert(0) += 1;
    }
    counts
}
