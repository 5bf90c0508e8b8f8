//! Reporting and export: JSON, CSV and plain-text artifacts.
//!
//! - **JSON**: full round-trip serialization with schema versioning
//! - **CSV**: trade tape and realized capital curve for external tools
//! - **Text**: the summary the CLI prints after a run
//!
//! Unknown schema versions are rejected on load.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tradesim_core::domain::{ExitReason, TradeRecord};

use crate::runner::{BacktestResult, SCHEMA_VERSION};
use crate::sweep::SweepResults;

pub const REPORT_FILE: &str = "report.json";
pub const TRADES_FILE: &str = "trades.csv";
pub const CAPITAL_FILE: &str = "capital.csv";

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export the trade tape, one row per realized exit.
pub fn export_trades_csv(trades: &[TradeRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "side",
        "entry_bar",
        "entry_time",
        "avg_entry_price",
        "exit_bar",
        "exit_time",
        "exit_price",
        "exit_reason",
        "quantity",
        "layers",
        "gross_pnl",
        "slippage",
        "fees",
        "net_pnl",
        "bars_held",
    ])?;

    for t in trades {
        wtr.write_record([
            t.side.to_string(),
            t.entry_bar.to_string(),
            t.entry_time.to_string(),
            format!("{:.6}", t.avg_entry_price),
            t.exit_bar.to_string(),
            t.exit_time.to_string(),
            format!("{:.6}", t.exit_price),
            t.exit_reason.to_string(),
            format!("{:.6}", t.quantity),
            t.layers.to_string(),
            format!("{:.4}", t.gross_pnl),
            format!("{:.4}", t.slippage),
            format!("{:.4}", t.fees),
            format!("{:.4}", t.net_pnl),
            t.bars_held().to_string(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export the realized capital curve with bar_index and capital columns.
pub fn export_capital_csv(capital_curve: &[f64]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["bar_index", "capital"])?;
    for (i, capital) in capital_curve.iter().enumerate() {
        wtr.write_record([i.to_string(), format!("{:.4}", capital)])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Write `report.json`, `trades.csv` and `capital.csv` into `output_dir`.
///
/// The directory is created if needed. Existing files are overwritten, so
/// re-running the same config into the same directory is idempotent.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir: {}", output_dir.display()))?;

    let json = export_json(result)?;
    write_file(&output_dir.join(REPORT_FILE), &json)?;

    let trades_csv = export_trades_csv(&result.report.trades)?;
    write_file(&output_dir.join(TRADES_FILE), &trades_csv)?;

    let capital_csv = export_capital_csv(&result.report.capital_curve)?;
    write_file(&output_dir.join(CAPITAL_FILE), &capital_csv)?;

    Ok(output_dir.to_path_buf())
}

/// Load a `BacktestResult` from a directory written by `save_artifacts`.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let path = dir.join(REPORT_FILE);
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

// ─── Text reports ───────────────────────────────────────────────────

/// Human-readable summary of a single run.
pub fn generate_report(result: &BacktestResult) -> String {
    let r = &result.report;
    let m = &result.metrics;
    let mut out = String::with_capacity(1024);

    let _ = writeln!(out, "Backtest {}", &result.run_id[..12.min(result.run_id.len())]);
    let _ = writeln!(
        out,
        "  data        {} bars ({}){}",
        result.fingerprint.bars,
        result.fingerprint.dataset_hash.short(),
        if result.synthetic { " SYNTHETIC" } else { "" }
    );
    if let (Some(first), Some(last)) = (result.fingerprint.first_bar, result.fingerprint.last_bar)
    {
        let _ = writeln!(out, "  period      {first} to {last}");
    }
    let _ = writeln!(
        out,
        "  capital     {:.2} -> {:.2} ({:+.2}%)",
        r.initial_capital,
        r.final_capital,
        m.total_return * 100.0
    );
    let _ = writeln!(out, "  peak        {:.2}", r.peak_capital);
    let _ = writeln!(out, "  max dd      {:.2}%", r.max_drawdown * 100.0);
    match r.halted_at_bar {
        Some(bar) => {
            let _ = writeln!(out, "  halted      at bar {bar}");
        }
        None => {
            let _ = writeln!(out, "  halted      no");
        }
    }
    let _ = writeln!(
        out,
        "  trades      {} (entries {}, layers added {}, skipped {})",
        m.trade_count,
        r.entries,
        r.layers_added,
        r.total_skipped()
    );
    let _ = writeln!(
        out,
        "  win rate    {:.1}%  profit factor {:.2}  expectancy {:.2}",
        m.win_rate * 100.0,
        m.profit_factor,
        m.expectancy
    );
    let _ = writeln!(
        out,
        "  exposure    {:.1}%  avg bars held {:.1}",
        m.exposure * 100.0,
        m.avg_bars_held
    );
    let _ = writeln!(
        out,
        "  costs       fees {:.2}  slippage {:.2}",
        m.total_fees, m.total_slippage
    );

    out.push_str("  exits      ");
    for reason in ExitReason::ALL {
        let _ = write!(out, " {}={}", reason, r.exits(reason));
    }
    out.push('\n');

    if !r.skipped_entries.is_empty() {
        out.push_str("  skipped    ");
        for (reason, count) in &r.skipped_entries {
            let _ = write!(out, " {reason:?}={count}");
        }
        out.push('\n');
    }
    if !r.skipped_layers.is_empty() {
        out.push_str("  layers held");
        for (reason, count) in &r.skipped_layers {
            let _ = write!(out, " {reason:?}={count}");
        }
        out.push('\n');
    }
    out
}

/// Leaderboard table for a sweep, best first.
pub fn generate_sweep_report(results: &SweepResults, top: usize) -> String {
    let mut out = String::with_capacity(256 + 96 * top);
    let _ = writeln!(
        out,
        "Sweep: {} of {} runs{}",
        results.len(),
        results.total(),
        if results.was_cancelled() { " (cancelled)" } else { "" }
    );
    let _ = writeln!(
        out,
        "{:>4} {:>5} {:>8} {:>6} {:>6} {:>5} {:>12} {:>8} {:>7} {:>7}",
        "rank", "point", "risk", "trail", "layers", "comp", "final", "return", "max dd", "trades"
    );
    for (rank, entry) in results.top_n(top).iter().enumerate() {
        let c = &entry.result.config;
        let m = &entry.result.metrics;
        let _ = writeln!(
            out,
            "{:>4} {:>5} {:>8.4} {:>6.2} {:>6} {:>5} {:>12.2} {:>7.2}% {:>6.2}% {:>7}",
            rank + 1,
            entry.index,
            c.risk_per_trade,
            c.trailing_stop_mult,
            c.pyramid_max_layers,
            if c.compounding { "yes" } else { "no" },
            entry.result.final_capital(),
            m.total_return * 100.0,
            entry.result.report.max_drawdown * 100.0,
            m.trade_count,
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DataConfig, RunConfig, SyntheticConfig};
    use crate::runner::run_from_config;

    fn sample_result() -> BacktestResult {
        run_from_config(&RunConfig {
            data: DataConfig::Synthetic(SyntheticConfig {
                bars: 300,
                seed: 3,
                signal_rate: 0.2,
                ..Default::default()
            }),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn json_round_trip() {
        let result = sample_result();
        let json = export_json(&result).unwrap();
        let back = import_json(&json).unwrap();
        assert_eq!(back.run_id, result.run_id);
        assert_eq!(back.fingerprint, result.fingerprint);
        assert_eq!(back.report.trades.len(), result.report.trades.len());
        assert_eq!(back.report.exit_counts, result.report.exit_counts);
        assert_eq!(back.report.skipped_entries, result.report.skipped_entries);
        assert!((back.report.final_capital - result.report.final_capital).abs() < 1e-9);
    }

    #[test]
    fn future_schema_rejected() {
        let mut result = sample_result();
        result.schema_version = SCHEMA_VERSION + 1;
        let json = export_json(&result).unwrap();
        let err = import_json(&json).unwrap_err();
        assert!(err.to_string().contains("unsupported schema version"));
    }

    #[test]
    fn trades_csv_has_row_per_trade() {
        let result = sample_result();
        let csv = export_trades_csv(&result.report.trades).unwrap();
        let mut lines = csv.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("side,entry_bar"));
        assert!(header.ends_with("net_pnl,bars_held"));
        assert_eq!(lines.count(), result.report.trades.len());
    }

    #[test]
    fn capital_csv_has_row_per_bar() {
        let csv = export_capital_csv(&[1000.0, 1001.5, 999.25]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "bar_index,capital");
        assert_eq!(lines[2], "1,1001.5000");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn report_mentions_key_figures() {
        let result = sample_result();
        let text = generate_report(&result);
        assert!(text.contains("SYNTHETIC"));
        assert!(text.contains("end_of_data="));
        assert!(text.contains(&format!("{:.2}", result.report.final_capital)));
    }
}
