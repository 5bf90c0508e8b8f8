//! Performance metrics: pure functions that compute strategy statistics.
//!
//! Every metric is a pure function: capital curve and/or trade list in, scalar out.
//! The capital curve is realized capital per bar, so open-position swings are
//! not visible to the drawdown and ratio metrics.

use serde::{Deserialize, Serialize};
use tradesim_core::domain::TradeRecord;
use tradesim_core::BacktestReport;

/// Aggregate performance metrics for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    /// Largest realized drawdown, as a negative fraction.
    pub max_drawdown: f64,
    pub sharpe: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    /// Mean net PnL per trade.
    pub expectancy: f64,
    pub trade_count: usize,
    /// Share of processed bars with a position open.
    pub exposure: f64,
    pub avg_bars_held: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub total_fees: f64,
    pub total_slippage: f64,
}

impl PerformanceMetrics {
    pub fn compute(report: &BacktestReport) -> Self {
        let trades = &report.trades;
        let mut curve = Vec::with_capacity(report.capital_curve.len() + 1);
        curve.push(report.initial_capital);
        curve.extend_from_slice(&report.capital_curve);

        Self {
            total_return: total_return(&curve),
            max_drawdown: max_drawdown(&curve),
            sharpe: sharpe_ratio(&curve, 0.0),
            win_rate: win_rate(trades),
            profit_factor: profit_factor(trades),
            avg_win: avg_win(trades),
            avg_loss: avg_loss(trades),
            expectancy: expectancy(trades),
            trade_count: trades.len(),
            exposure: exposure(trades, report.bars_processed),
            avg_bars_held: avg_bars_held(trades),
            max_consecutive_wins: max_consecutive(trades, true),
            max_consecutive_losses: max_consecutive(trades, false),
            total_fees: report.total_fees(),
            total_slippage: report.total_slippage(),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(curve: &[f64]) -> f64 {
    match (curve.first(), curve.last()) {
        (Some(&initial), Some(&last)) if initial > 0.0 => (last - initial) / initial,
        _ => 0.0,
    }
}

/// Maximum drawdown as a negative fraction (e.g., -0.15 = 15% drawdown).
///
/// Returns 0.0 if the curve is constant or monotonically increasing.
pub fn max_drawdown(curve: &[f64]) -> f64 {
    let Some(&first) = curve.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &value in curve {
        peak = peak.max(value);
        if peak > 0.0 {
            max_dd = max_dd.min((value - peak) / peak);
        }
    }
    max_dd
}

/// Annualized Sharpe ratio from per-bar returns, assuming 252 bars per year.
///
/// Returns 0.0 if variance is zero or fewer than 2 returns.
pub fn sharpe_ratio(curve: &[f64], risk_free_rate: f64) -> f64 {
    let returns = bar_returns(curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let per_bar_rf = risk_free_rate / 252.0;
    let excess: Vec<f64> = returns.iter().map(|r| r - per_bar_rf).collect();
    let std = std_dev(&excess);
    if std < 1e-15 {
        return 0.0;
    }
    (mean_f64(&excess) / std) * 252.0_f64.sqrt()
}

/// Win rate: fraction of trades with positive net PnL.
pub fn win_rate(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64
}

/// Profit factor: gross profits / gross losses.
///
/// Capped at 100.0 for edge cases (all winners, zero losses).
pub fn profit_factor(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let gross_profit: f64 = trades
        .iter()
        .filter(|t| t.net_pnl > 0.0)
        .map(|t| t.net_pnl)
        .sum();
    let gross_loss: f64 = trades
        .iter()
        .filter(|t| t.net_pnl < 0.0)
        .map(|t| t.net_pnl.abs())
        .sum();

    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { 100.0 } else { 0.0 };
    }
    (gross_profit / gross_loss).min(100.0)
}

pub fn avg_win(trades: &[TradeRecord]) -> f64 {
    let wins: Vec<f64> = trades
        .iter()
        .filter(|t| t.is_winner())
        .map(|t| t.net_pnl)
        .collect();
    mean_f64(&wins)
}

/// Mean losing trade, as a negative number.
pub fn avg_loss(trades: &[TradeRecord]) -> f64 {
    let losses: Vec<f64> = trades
        .iter()
        .filter(|t| t.net_pnl < 0.0)
        .map(|t| t.net_pnl)
        .collect();
    mean_f64(&losses)
}

pub fn expectancy(trades: &[TradeRecord]) -> f64 {
    let pnl: Vec<f64> = trades.iter().map(|t| t.net_pnl).collect();
    mean_f64(&pnl)
}

/// Share of bars covered by at least one trade's holding period.
///
/// Partial exits share their entry bar with the final exit, so holding
/// periods are merged before counting.
pub fn exposure(trades: &[TradeRecord], bars_processed: usize) -> f64 {
    if bars_processed == 0 || trades.is_empty() {
        return 0.0;
    }
    let mut spans: Vec<(usize, usize)> = trades.iter().map(|t| (t.entry_bar, t.exit_bar)).collect();
    spans.sort_unstable();

    let mut covered = 0;
    let mut current: Option<(usize, usize)> = None;
    for (start, end) in spans {
        current = match current {
            Some((s, e)) if start <= e => Some((s, e.max(end))),
            Some((s, e)) => {
                covered += e - s + 1;
                Some((start, end))
            }
            None => Some((start, end)),
        };
    }
    if let Some((s, e)) = current {
        covered += e - s + 1;
    }
    (covered as f64 / bars_processed as f64).min(1.0)
}

pub fn avg_bars_held(trades: &[TradeRecord]) -> f64 {
    let held: Vec<f64> = trades.iter().map(|t| t.bars_held() as f64).collect();
    mean_f64(&held)
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Per-bar returns of a capital curve.
pub fn bar_returns(curve: &[f64]) -> Vec<f64> {
    curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

fn max_consecutive(trades: &[TradeRecord], winners: bool) -> usize {
    let mut max_streak = 0;
    let mut current = 0;

    for trade in trades {
        if trade.is_winner() == winners {
            current += 1;
            max_streak = max_streak.max(current);
        } else {
            current = 0;
        }
    }
    max_streak
}
