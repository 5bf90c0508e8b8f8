//! Seeded synthetic bars for offline runs and tests.
//!
//! A random walk with bounded daily returns. Signals follow five-bar momentum
//! with a random vote count, and a small share of bars is flagged anomalous.
//! The same config always produces the same bars.

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tradesim_core::domain::{Bar, EnsembleSignal};
use tradesim_core::indicators::annotate_atr;
use tradesim_core::BarSeries;

use crate::config::SyntheticConfig;
use crate::data_loader::{LoadError, LoadedData};

const MOMENTUM_LOOKBACK: usize = 5;

/// Generate and validate a synthetic series.
pub fn generate(config: &SyntheticConfig) -> Result<LoadedData, LoadError> {
    check(config)?;
    let mut bars = synthetic_bars(config);
    annotate_atr(&mut bars, config.atr_period);
    let series = BarSeries::new(bars)?;
    Ok(LoadedData::from_series(series, true, None))
}

fn check(config: &SyntheticConfig) -> Result<(), LoadError> {
    let problem = if config.bars == 0 {
        Some("bars must be > 0")
    } else if !(config.start_price > 0.0 && config.start_price.is_finite()) {
        Some("start_price must be > 0")
    } else if !(config.volatility > 0.0 && config.volatility <= 0.3) {
        Some("volatility must be in (0, 0.3]")
    } else if !(config.drift.abs() < 0.1) {
        Some("drift must be in (-0.1, 0.1)")
    } else if !(0.0..=1.0).contains(&config.signal_rate) {
        Some("signal_rate must be in [0, 1]")
    } else if !(0.0..=1.0).contains(&config.anomaly_rate) {
        Some("anomaly_rate must be in [0, 1]")
    } else if config.atr_period == 0 {
        Some("atr_period must be > 0")
    } else {
        None
    };
    match problem {
        Some(msg) => Err(LoadError::Synthetic(msg.to_string())),
        None => Ok(()),
    }
}

/// Raw bars with ATR left unset.
pub fn synthetic_bars(config: &SyntheticConfig) -> Vec<Bar> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let start = NaiveDate::from_ymd_opt(2020, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default();
    // Uniform on [-a, a] has standard deviation a / sqrt(3).
    let half_width = config.volatility * 3.0_f64.sqrt();

    let mut bars: Vec<Bar> = Vec::with_capacity(config.bars);
    let mut price = config.start_price;
    for i in 0..config.bars {
        let daily_return = config.drift + rng.gen_range(-half_width..half_width);
        let open = price;
        let close = price * (1.0 + daily_return);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..config.volatility / 2.0));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..config.volatility / 2.0));
        let volume = rng.gen_range(500_000.0..5_000_000.0_f64).round();

        let signal = if i >= MOMENTUM_LOOKBACK && rng.gen_bool(config.signal_rate) {
            let votes = rng.gen_range(1..=4) as f64;
            if close >= bars[i - MOMENTUM_LOOKBACK].close {
                EnsembleSignal::long(votes)
            } else {
                EnsembleSignal::short(votes)
            }
        } else {
            EnsembleSignal::flat()
        };
        let anomaly = rng.gen_bool(config.anomaly_rate);

        bars.push(
            Bar::new(start + Duration::days(i as i64), open, high, low, close)
                .with_volume(volume)
                .with_signal(signal)
                .with_anomaly(anomaly),
        );
        price = close;
    }
    bars
}
