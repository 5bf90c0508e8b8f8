//! Integration tests for the backtest driver.
//!
//! Tests:
//! 1. Single long signal held to the end of data
//! 2. Gap through the stop exits at the stop price (long and short), stop before targets
//! 3. Drawdown halt stops new entries for the rest of the run
//! 4. Fixed-risk vs compounding sizing
//! 5. Reversal with same-bar re-entry, pyramiding, anomaly gating
//! 6. Forced close at the next open when halted with a position open
//! 7. Cost breakdown on every trade

use chrono::{Duration, NaiveDate, NaiveDateTime};
use tradesim_core::domain::{Bar, EnsembleSignal, ExitReason, Side};
use tradesim_core::engine::{RunContext, StepStatus};
use tradesim_core::position_management::SkipReason;
use tradesim_core::{run_backtest, run_on_bars, BarSeries, StrategyConfig};

const EPS: f64 = 1e-9;

fn ts(i: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 3, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::days(i as i64)
}

/// Bar with ATR 2.0 and no signal.
fn bar(i: usize, open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar::new(ts(i), open, high, low, close).with_atr(2.0)
}

/// Bar whose open equals its close with a +/-0.5 range.
fn quiet(i: usize, close: f64) -> Bar {
    bar(i, close, close + 0.5, close - 0.5, close)
}

/// Frictionless, no pyramiding, partial target out of reach.
fn base_config() -> StrategyConfig {
    StrategyConfig {
        initial_capital: 1000.0,
        risk_per_trade: 0.01,
        trailing_stop_mult: 1.5,
        partial_profit_mult: 10.0,
        enable_pyramiding: false,
        ensemble_threshold: 2.0,
        compounding: false,
        fixed_risk_amount: 100.0,
        ..Default::default()
    }
    .frictionless()
}

// ── 1. End of data ───────────────────────────────────────────────────

#[test]
fn single_long_held_to_end_of_data() {
    let mut bars: Vec<Bar> = [100.0, 100.5, 101.0, 100.8, 101.2]
        .iter()
        .enumerate()
        .map(|(i, &c)| quiet(i, c))
        .collect();
    bars[0].signal = EnsembleSignal::long(3.0);

    let report = run_on_bars(bars, &base_config()).unwrap();
    assert_eq!(report.trades.len(), 1);
    let trade = &report.trades[0];
    assert_eq!(trade.exit_reason, ExitReason::EndOfData);
    assert_eq!(trade.entry_bar, 0);
    assert_eq!(trade.exit_bar, 4);
    assert_eq!(trade.exit_price, 101.2);
    // qty = 0.01 * 100 / (1.5 * 2) = 1/3
    assert!((trade.net_pnl - 1.2 / 3.0).abs() < EPS);
    assert!((report.final_capital - (1000.0 + 1.2 / 3.0)).abs() < EPS);
    assert_eq!(report.exits(ExitReason::EndOfData), 1);
    assert_eq!(report.bars_processed, 5);
    assert_eq!(report.capital_curve.len(), 5);
}

// ── 2. Gap through stop ──────────────────────────────────────────────

#[test]
fn long_gap_through_stop_exits_at_stop() {
    let bars = vec![
        quiet(0, 100.0).with_signal(EnsembleSignal::long(3.0)),
        bar(1, 90.0, 91.0, 88.0, 90.0),
        quiet(2, 90.0),
    ];
    let report = run_on_bars(bars, &base_config()).unwrap();
    assert_eq!(report.trades.len(), 1);
    let trade = &report.trades[0];
    assert_eq!(trade.exit_reason, ExitReason::StopOut);
    assert_eq!(trade.exit_price, 97.0);
    assert_eq!(trade.exit_bar, 1);
    assert!((trade.net_pnl + 1.0).abs() < EPS);
}

#[test]
fn short_gap_through_stop_exits_at_stop() {
    let bars = vec![
        quiet(0, 100.0).with_signal(EnsembleSignal::short(3.0)),
        bar(1, 110.0, 112.0, 109.0, 111.0),
    ];
    let report = run_on_bars(bars, &base_config()).unwrap();
    let trade = &report.trades[0];
    assert_eq!(trade.side, Side::Short);
    assert_eq!(trade.exit_reason, ExitReason::StopOut);
    assert_eq!(trade.exit_price, 103.0);
}

// ── 3. Drawdown halt ─────────────────────────────────────────────────

fn losing_bars() -> Vec<Bar> {
    vec![
        quiet(0, 100.0).with_signal(EnsembleSignal::long(3.0)),
        bar(1, 96.0, 96.5, 95.0, 96.0),
        bar(2, 96.0, 100.5, 95.5, 100.0).with_signal(EnsembleSignal::long(3.0)),
        bar(3, 96.0, 96.5, 95.0, 96.0),
        quiet(4, 100.0).with_signal(EnsembleSignal::long(3.0)),
        quiet(5, 100.0).with_signal(EnsembleSignal::long(3.0)),
    ]
}

fn halting_config() -> StrategyConfig {
    // Each stop-out loses 100 (1% of 10_000) on 1000 of capital.
    StrategyConfig {
        fixed_risk_amount: 10_000.0,
        max_drawdown: 0.15,
        ..base_config()
    }
}

#[test]
fn drawdown_halts_and_stops_replay() {
    let report = run_on_bars(losing_bars(), &halting_config()).unwrap();
    assert!(report.halted);
    assert_eq!(report.halted_at_bar, Some(3));
    assert_eq!(report.trades.len(), 2);
    assert_eq!(report.entries, 2);
    assert_eq!(report.bars_processed, 4);
    assert!(report.max_drawdown >= 0.15);
    assert!((report.final_capital - 800.0).abs() < 1e-6);
}

#[test]
fn no_entries_after_halt() {
    let config = halting_config();
    let mut ctx = RunContext::new(&config).unwrap();
    let bars = losing_bars();
    let mut statuses = Vec::new();
    for (i, bar) in bars.iter().enumerate() {
        statuses.push(ctx.step(i, bar));
    }
    assert_eq!(statuses[3], StepStatus::Halted);
    assert_eq!(statuses[5], StepStatus::Halted);
    assert!(ctx.position().is_none());
    assert!(ctx.snapshot().halted);

    let report = ctx.finish(bars.last().map(|b| (bars.len() - 1, b)));
    assert_eq!(report.entries, 2);
    assert_eq!(report.skipped(SkipReason::Halted), 2);
}

#[test]
fn stop_takes_precedence_over_targets_on_same_bar() {
    let config = StrategyConfig {
        full_target_mult: Some(2.0),
        partial_profit_mult: 1.0,
        ..base_config()
    };
    let bars = vec![
        quiet(0, 100.0).with_signal(EnsembleSignal::long(3.0)),
        // Range pierces the 97 stop while the close clears both targets.
        bar(1, 100.0, 105.5, 96.0, 105.0),
    ];
    let report = run_on_bars(bars, &config).unwrap();
    let exits: Vec<(ExitReason, f64)> = report
        .trades
        .iter()
        .map(|t| (t.exit_reason, t.exit_price))
        .collect();
    assert_eq!(exits, vec![(ExitReason::StopOut, 97.0)]);
    assert_eq!(report.exits(ExitReason::PartialProfit), 0);
    assert_eq!(report.exits(ExitReason::FullTarget), 0);
}

// ── 4. Sizing mode ───────────────────────────────────────────────────

#[test]
fn fixed_risk_sizes_from_fixed_amount() {
    let bars = vec![
        quiet(0, 100.0).with_signal(EnsembleSignal::long(3.0)),
        quiet(1, 100.0),
    ];
    let fixed = StrategyConfig {
        initial_capital: 50_000.0,
        ..base_config()
    };
    let report = run_on_bars(bars.clone(), &fixed).unwrap();
    assert!((report.trades[0].quantity - 1.0 / 3.0).abs() < EPS);

    let compounding = StrategyConfig {
        compounding: true,
        ..fixed
    };
    let report = run_on_bars(bars, &compounding).unwrap();
    // 0.01 * 50_000 / 3
    assert!((report.trades[0].quantity - 500.0 / 3.0).abs() < 1e-6);
}

// ── 5. Reversal, pyramiding, anomaly ─────────────────────────────────

#[test]
fn reversal_reenters_on_same_bar() {
    let bars = vec![
        quiet(0, 100.0).with_signal(EnsembleSignal::long(3.0)),
        quiet(1, 99.0).with_signal(EnsembleSignal::short(3.0)),
        quiet(2, 98.0),
    ];
    let report = run_on_bars(bars, &base_config()).unwrap();
    assert_eq!(report.entries, 2);
    assert_eq!(report.trades.len(), 2);
    assert_eq!(report.trades[0].exit_reason, ExitReason::SignalReversal);
    assert_eq!(report.trades[0].side, Side::Long);
    assert_eq!(report.trades[1].side, Side::Short);
    assert_eq!(report.trades[1].entry_bar, 1);
    assert_eq!(report.trades[1].exit_reason, ExitReason::EndOfData);
}

#[test]
fn pyramiding_adds_layers_up_to_cap() {
    let config = StrategyConfig {
        enable_pyramiding: true,
        pyramid_increment: 1.0,
        pyramid_max_layers: 3,
        ..base_config()
    };
    let bars: Vec<Bar> = [100.0, 102.0, 104.0, 106.0, 108.0]
        .iter()
        .enumerate()
        .map(|(i, &c)| quiet(i, c).with_signal(EnsembleSignal::long(3.0)))
        .collect();
    let report = run_on_bars(bars, &config).unwrap();
    assert_eq!(report.entries, 1);
    assert_eq!(report.layers_added, 2);
    assert_eq!(report.trades.len(), 1);
    let trade = &report.trades[0];
    assert_eq!(trade.layers, 3);
    assert!((trade.quantity - 1.0).abs() < EPS);
    assert!((trade.avg_entry_price - 102.0).abs() < EPS);
    // (8 + 6 + 4) / 3
    assert!((trade.net_pnl - 6.0).abs() < EPS);
}

#[test]
fn anomalous_bar_blocks_entry() {
    let bars = vec![
        quiet(0, 100.0)
            .with_signal(EnsembleSignal::long(5.0))
            .with_anomaly(true),
        quiet(1, 101.0),
    ];
    let report = run_on_bars(bars, &base_config()).unwrap();
    assert_eq!(report.entries, 0);
    assert!(report.trades.is_empty());
    assert_eq!(report.skipped(SkipReason::Anomaly), 1);
    assert_eq!(report.final_capital, 1000.0);
}

// ── 6. Halt while open ───────────────────────────────────────────────

#[test]
fn halt_with_open_position_closes_at_next_open() {
    // A 20% fee turns the partial exit into a large loss that trips the halt
    // while half the position is still open.
    let config = StrategyConfig {
        fixed_risk_amount: 10_000.0,
        partial_profit_mult: 1.0,
        partial_profit_fraction: 0.5,
        fee_pct: 20.0,
        ..base_config()
    };
    let bars = vec![
        quiet(0, 100.0).with_signal(EnsembleSignal::long(3.0)),
        quiet(1, 102.0),
        bar(2, 101.5, 102.5, 101.0, 102.0),
        quiet(3, 102.0).with_signal(EnsembleSignal::long(3.0)),
    ];
    let series = BarSeries::new(bars).unwrap();
    let report = run_backtest(&series, &config).unwrap();
    assert_eq!(report.halted_at_bar, Some(1));
    assert_eq!(report.trades.len(), 2);
    assert_eq!(report.trades[0].exit_reason, ExitReason::PartialProfit);
    let forced = &report.trades[1];
    assert_eq!(forced.exit_reason, ExitReason::DrawdownHalt);
    assert_eq!(forced.exit_bar, 2);
    assert_eq!(forced.exit_price, 101.5);
    assert_eq!(report.entries, 1);
    assert_eq!(report.bars_processed, 3);
}

// ── 7. Costs ─────────────────────────────────────────────────────────

#[test]
fn every_trade_breaks_out_costs() {
    let config = StrategyConfig {
        fee_pct: 0.1,
        slippage_pct: 0.05,
        partial_profit_mult: 1.0,
        ..base_config()
    };
    let bars = vec![
        quiet(0, 100.0).with_signal(EnsembleSignal::long(3.0)),
        quiet(1, 102.5),
        quiet(2, 103.0),
    ];
    let report = run_on_bars(bars, &config).unwrap();
    assert_eq!(report.trades.len(), 2);
    for trade in &report.trades {
        assert!(trade.fees > 0.0);
        assert!(trade.slippage > 0.0);
        assert!((trade.net_pnl - (trade.gross_pnl - trade.slippage - trade.fees)).abs() < EPS);
    }
    let net: f64 = report.trades.iter().map(|t| t.net_pnl).sum();
    assert!((report.final_capital - (1000.0 + net)).abs() < EPS);
}
