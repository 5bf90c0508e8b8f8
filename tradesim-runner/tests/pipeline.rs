//! End-to-end runner tests: TOML config, CSV bars, run, artifacts, sweep.

use std::fs;
use std::path::Path;
use std::sync::atomic::AtomicBool;

use tradesim_core::domain::ExitReason;
use tradesim_runner::export::{load_artifacts, save_artifacts, CAPITAL_FILE, REPORT_FILE, TRADES_FILE};
use tradesim_runner::{
    load_data, run_from_config, run_sweep, ConfigError, DataConfig, LoadError, RunConfig,
    RunError,
};

const BARS_CSV: &str = "\
date,open,high,low,close,volume,atr,signal,confidence,anomaly
2024-01-02,100.0,100.5,99.5,100.0,1000,2.0,long,3,false
2024-01-03,100.5,101.0,100.0,100.5,1000,2.0,flat,0,false
2024-01-04,101.0,101.5,100.5,101.0,1000,2.0,flat,0,false
2024-01-05,100.8,101.3,100.3,100.8,1000,2.0,flat,0,false
2024-01-08,101.2,101.7,100.7,101.2,1000,2.0,flat,0,false
";

const RUN_TOML: &str = r#"
[strategy]
initial_capital = 1000.0
risk_per_trade = 0.01
compounding = false
fixed_risk_amount = 100.0

[data]
type = "csv"
path = "bars.csv"
"#;

fn write_fixture(dir: &Path) -> std::path::PathBuf {
    fs::write(dir.join("bars.csv"), BARS_CSV).unwrap();
    let config_path = dir.join("run.toml");
    fs::write(&config_path, RUN_TOML).unwrap();
    config_path
}

#[test]
fn csv_run_from_toml() {
    let dir = tempfile::tempdir().unwrap();
    let config = RunConfig::load(&write_fixture(dir.path())).unwrap();

    let result = run_from_config(&config).unwrap();
    assert!(!result.synthetic);
    assert_eq!(result.fingerprint.bars, 5);
    assert_eq!(result.report.trades.len(), 1);
    assert_eq!(result.report.trades[0].exit_reason, ExitReason::EndOfData);
    assert_eq!(result.report.entries, 1);
    assert!(!result.report.halted);
    // 0.01 * 100 / (1.5 * 2.0) = 1/3 share; costs make net slightly below gross.
    let trade = &result.report.trades[0];
    assert!((trade.quantity - 1.0 / 3.0).abs() < 1e-9);
    assert!(trade.net_pnl < trade.gross_pnl);
    assert!((result.report.final_capital - (1000.0 + trade.net_pnl)).abs() < 1e-9);
}

#[test]
fn artifacts_written_and_reloaded() {
    let dir = tempfile::tempdir().unwrap();
    let config = RunConfig::load(&write_fixture(dir.path())).unwrap();
    let result = run_from_config(&config).unwrap();

    let out = dir.path().join("out");
    save_artifacts(&result, &out).unwrap();
    assert!(out.join(REPORT_FILE).exists());
    assert!(out.join(TRADES_FILE).exists());
    assert!(out.join(CAPITAL_FILE).exists());

    let trades = fs::read_to_string(out.join(TRADES_FILE)).unwrap();
    assert_eq!(trades.lines().count(), 2);
    assert!(trades.contains("end_of_data"));
    let capital = fs::read_to_string(out.join(CAPITAL_FILE)).unwrap();
    assert_eq!(capital.lines().count(), 6);

    let back = load_artifacts(&out).unwrap();
    assert_eq!(back.run_id, result.run_id);
    assert_eq!(back.report.trades.len(), 1);

    // Writing twice overwrites rather than duplicating.
    save_artifacts(&result, &out).unwrap();
    assert_eq!(fs::read_dir(&out).unwrap().count(), 3);
}

#[test]
fn unsorted_csv_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let swapped = "\
date,open,high,low,close,atr
2024-01-03,100,101,99,100,2
2024-01-02,100,101,99,100,2
";
    let path = dir.path().join("bad.csv");
    fs::write(&path, swapped).unwrap();
    let data = DataConfig::Csv {
        path,
        atr_period: 14,
    };
    let err = load_data(&data).unwrap_err();
    assert!(matches!(err, LoadError::Data(_)));
}

#[test]
fn sweep_over_csv_data() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = RunConfig::load(&write_fixture(dir.path())).unwrap();
    config.sweep = Some(tradesim_runner::SweepGrid {
        risk_per_trade: vec![0.01, 0.02],
        compounding: vec![false, true],
        parallel: true,
        ..Default::default()
    });
    config.validate().unwrap();

    let data = load_data(&config.data).unwrap();
    let grid = config.sweep.as_ref().unwrap();
    let results = run_sweep(&config.strategy, grid, &data, &AtomicBool::new(false)).unwrap();
    assert_eq!(results.len(), 4);
    // Every point sees the same winning trade, so larger size ranks first.
    let best = results.best().unwrap();
    assert!(best.result.final_capital() >= results.ranked()[3].result.final_capital());
    assert!(results
        .ranked()
        .iter()
        .all(|e| e.result.fingerprint.dataset_hash == data.dataset_hash));
}

#[test]
fn bad_toml_reports_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.toml");
    fs::write(&path, "[strategy]\nrisk_per_trade = \"lots\"\n").unwrap();
    let err = RunConfig::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));

    let missing = RunConfig::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(missing, ConfigError::Io { .. }));
    let wrapped: RunError = missing.into();
    assert!(wrapped.to_string().starts_with("config error"));
}
