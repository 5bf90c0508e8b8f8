//! tradesim CLI: run, sweep and config scaffolding commands.
//!
//! Commands:
//! - `run` executes one backtest from a TOML config (or synthetic defaults)
//! - `sweep` runs the config's parameter grid and prints a leaderboard
//! - `init-config` writes a starter TOML file

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use tradesim_runner::export::{generate_report, generate_sweep_report, save_artifacts};
use tradesim_runner::{
    load_data, run_from_config, run_sweep, DataConfig, RunConfig, SweepGrid, SyntheticConfig,
};

#[derive(Parser)]
#[command(
    name = "tradesim",
    about = "tradesim: replay ensemble signals through a risk-managed position state machine"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a single backtest.
    Run {
        /// Path to a TOML run config. Synthetic defaults when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Read bars from this CSV instead of the config's data section.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Directory for report.json, trades.csv and capital.csv (overrides the config).
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Print the full result as JSON instead of the text summary.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Run every point of the config's sweep grid.
    Sweep {
        /// Path to a TOML run config with a [sweep] section.
        #[arg(long)]
        config: PathBuf,

        /// Number of leaderboard rows to print.
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Force one-by-one execution even if the grid asks for parallel.
        #[arg(long, default_value_t = false)]
        serial: bool,
    },
    /// Write a starter config with every field at its default.
    InitConfig {
        /// Destination file.
        #[arg(long, default_value = "tradesim.toml")]
        output: PathBuf,

        /// Overwrite an existing file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            csv,
            output_dir,
            json,
        } => run_cmd(config.as_deref(), csv, output_dir, json),
        Commands::Sweep {
            config,
            top,
            serial,
        } => sweep_cmd(&config, top, serial),
        Commands::InitConfig { output, force } => init_config_cmd(&output, force),
    }
}

fn load_config(path: Option<&Path>) -> Result<RunConfig> {
    match path {
        Some(path) => RunConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(RunConfig::default()),
    }
}

fn run_cmd(
    config_path: Option<&Path>,
    csv: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(path) = csv {
        let atr_period = match &config.data {
            DataConfig::Csv { atr_period, .. } => *atr_period,
            DataConfig::Synthetic(s) => s.atr_period,
        };
        config.data = DataConfig::Csv { path, atr_period };
    }
    if output_dir.is_some() {
        config.output.dir = output_dir;
    }
    let config_id = config.run_id();
    info!(config_id = %&config_id[..12], "starting run");

    let result = run_from_config(&config)?;

    if json {
        println!("{}", tradesim_runner::export::export_json(&result)?);
    } else {
        print!("{}", generate_report(&result));
    }

    if let Some(dir) = &config.output.dir {
        let dir = save_artifacts(&result, dir)?;
        info!(dir = %dir.display(), "artifacts saved");
    }
    Ok(())
}

fn sweep_cmd(config_path: &Path, top: usize, serial: bool) -> Result<()> {
    let config = load_config(Some(config_path))?;
    let Some(mut grid) = config.sweep.clone() else {
        bail!("{} has no [sweep] section", config_path.display());
    };
    if serial {
        grid.parallel = false;
    }

    let data = load_data(&config.data)?;
    let cancel = AtomicBool::new(false);
    let results = run_sweep(&config.strategy, &grid, &data, &cancel)?;
    print!("{}", generate_sweep_report(&results, top));

    if let (Some(dir), Some(best)) = (&config.output.dir, results.best()) {
        let dir = save_artifacts(&best.result, dir)?;
        info!(dir = %dir.display(), point = best.index, "best run saved");
    }
    Ok(())
}

fn init_config_cmd(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", output.display());
    }
    let config = RunConfig {
        data: DataConfig::Synthetic(SyntheticConfig::default()),
        sweep: Some(SweepGrid {
            risk_per_trade: vec![0.005, 0.01, 0.02],
            trailing_stop_mult: vec![1.0, 1.5, 2.0],
            parallel: true,
            ..Default::default()
        }),
        ..Default::default()
    };
    let text = config.to_toml_string()?;
    std::fs::write(output, text)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("Wrote {}", output.display());
    Ok(())
}
