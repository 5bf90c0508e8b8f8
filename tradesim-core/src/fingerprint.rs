//! Run fingerprinting: deterministic identity for configs, datasets and runs.
//!
//! - `ConfigHash`: BLAKE3 of the canonical JSON of a `StrategyConfig`.
//! - `DatasetHash`: BLAKE3 over every field the engine reads from each bar.
//! - `RunFingerprint`: both hashes plus the dataset span, enough to tell
//!   whether two reports came from identical inputs.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::config::StrategyConfig;
use crate::data::BarSeries;
use crate::domain::SignalDirection;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigHash(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetHash(pub String);

impl ConfigHash {
    pub fn of(config: &StrategyConfig) -> Self {
        // Field order is fixed by the struct, so the JSON is canonical.
        let json = serde_json::to_string(config).expect("StrategyConfig must serialize");
        Self(blake3::hash(json.as_bytes()).to_hex().to_string())
    }

    /// First 12 hex characters, for file names and log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl DatasetHash {
    pub fn of(series: &BarSeries) -> Self {
        let mut hasher = blake3::Hasher::new();
        for bar in series {
            hasher.update(&bar.timestamp.and_utc().timestamp_micros().to_le_bytes());
            for value in [bar.open, bar.high, bar.low, bar.close, bar.volume, bar.atr] {
                hasher.update(&value.to_bits().to_le_bytes());
            }
            let direction: u8 = match bar.signal.direction {
                SignalDirection::Long => 1,
                SignalDirection::Short => 2,
                SignalDirection::Flat => 0,
            };
            hasher.update(&[direction, u8::from(bar.anomaly)]);
            hasher.update(&bar.signal.confidence.to_bits().to_le_bytes());
            for (name, value) in &bar.indicators {
                hasher.update(name.as_bytes());
                hasher.update(&value.to_bits().to_le_bytes());
            }
        }
        Self(hasher.finalize().to_hex().to_string())
    }

    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for ConfigHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for DatasetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFingerprint {
    pub config_hash: ConfigHash,
    pub dataset_hash: DatasetHash,
    pub bars: usize,
    pub first_bar: Option<NaiveDateTime>,
    pub last_bar: Option<NaiveDateTime>,
}

impl RunFingerprint {
    pub fn new(config: &StrategyConfig, series: &BarSeries) -> Self {
        Self::with_dataset_hash(config, series, DatasetHash::of(series))
    }

    /// Build from a dataset hash computed once at load time.
    pub fn with_dataset_hash(
        config: &StrategyConfig,
        series: &BarSeries,
        dataset_hash: DatasetHash,
    ) -> Self {
        Self {
            config_hash: ConfigHash::of(config),
            dataset_hash,
            bars: series.len(),
            first_bar: series.first().map(|b| b.timestamp),
            last_bar: series.last().map(|b| b.timestamp),
        }
    }

    /// Combined BLAKE3 of both hashes.
    pub fn run_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.config_hash.0.as_bytes());
        hasher.update(b":");
        hasher.update(self.dataset_hash.0.as_bytes());
        hasher.finalize().to_hex().to_string()
    }
}
