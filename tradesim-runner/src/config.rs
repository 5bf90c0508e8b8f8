//! Serializable run configuration, loaded from TOML.
//!
//! ```toml
//! [strategy]
//! initial_capital = 1000.0
//! risk_per_trade = 0.01
//!
//! [data]
//! type = "csv"
//! path = "bars.csv"
//!
//! [output]
//! dir = "out"
//!
//! [sweep]
//! risk_per_trade = [0.005, 0.01, 0.02]
//! trailing_stop_mult = [1.0, 1.5, 2.0]
//! ```
//!
//! Every section is optional. Missing strategy fields take their defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tradesim_core::StrategyConfig;

/// Unique identifier for a run configuration (content-addressable hash).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("cannot render TOML: {0}")]
    Render(#[from] toml::ser::Error),
    #[error(transparent)]
    Strategy(#[from] tradesim_core::ConfigError),
    #[error("sweep grid is empty: every axis needs at least one value")]
    EmptySweep,
    #[error("invalid data section: {0}")]
    Data(&'static str),
}

/// Everything needed to reproduce a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    pub strategy: StrategyConfig,
    pub data: DataConfig,
    pub output: OutputConfig,
    pub sweep: Option<SweepGrid>,
}

impl RunConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file. Relative data paths resolve against its directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        if let (DataConfig::Csv { path: csv, .. }, Some(base)) = (&mut config.data, path.parent()) {
            if csv.is_relative() {
                *csv = base.join(&*csv);
            }
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.strategy.validate()?;
        let atr_period = match &self.data {
            DataConfig::Csv { atr_period, .. } => *atr_period,
            DataConfig::Synthetic(s) => s.atr_period,
        };
        if atr_period == 0 {
            return Err(ConfigError::Data("atr_period must be > 0"));
        }
        if let Some(grid) = &self.sweep {
            if grid.is_empty() {
                return Err(ConfigError::EmptySweep);
            }
        }
        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Computes a deterministic hash ID for this configuration.
    ///
    /// Two runs with identical configs have the same RunId.
    pub fn run_id(&self) -> RunId {
        let json = serde_json::to_string(self).expect("RunConfig serialization failed");
        let hash = blake3::hash(json.as_bytes());
        format!("{}", hash.to_hex())
    }
}

/// Where bars come from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DataConfig {
    /// A CSV file with OHLC columns plus optional volume, atr, signal, confidence and anomaly.
    Csv {
        path: PathBuf,
        /// Period used to fill a missing ATR column.
        #[serde(default = "default_atr_period")]
        atr_period: usize,
    },
    /// Seeded random walk with sparse signals, for offline runs.
    Synthetic(SyntheticConfig),
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig::Synthetic(SyntheticConfig::default())
    }
}

fn default_atr_period() -> usize {
    14
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyntheticConfig {
    pub bars: usize,
    pub seed: u64,
    pub start_price: f64,
    /// Standard deviation of daily returns.
    pub volatility: f64,
    /// Mean daily return.
    pub drift: f64,
    /// Probability that a bar carries a non-flat signal.
    pub signal_rate: f64,
    /// Probability that a bar is flagged anomalous.
    pub anomaly_rate: f64,
    pub atr_period: usize,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            bars: 500,
            seed: 42,
            start_price: 100.0,
            volatility: 0.02,
            drift: 0.0003,
            signal_rate: 0.1,
            anomaly_rate: 0.02,
            atr_period: 14,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for `trades.csv` and `report.json`. Nothing is written when unset.
    pub dir: Option<PathBuf>,
}

/// Parameter grid for a sweep. Empty axes keep the base strategy's value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SweepGrid {
    pub risk_per_trade: Vec<f64>,
    pub trailing_stop_mult: Vec<f64>,
    pub pyramid_max_layers: Vec<usize>,
    pub compounding: Vec<bool>,
    /// Run with rayon when true, one by one otherwise.
    pub parallel: bool,
}

impl SweepGrid {
    pub fn is_empty(&self) -> bool {
        self.risk_per_trade.is_empty()
            && self.trailing_stop_mult.is_empty()
            && self.pyramid_max_layers.is_empty()
            && self.compounding.is_empty()
    }

    /// Cartesian product of the axes applied over `base`, in a fixed order.
    pub fn expand(&self, base: &StrategyConfig) -> Vec<StrategyConfig> {
        fn axis<T: Copy>(values: &[T], fallback: T) -> Vec<T> {
            if values.is_empty() {
                vec![fallback]
            } else {
                values.to_vec()
            }
        }

        let risks = axis(&self.risk_per_trade, base.risk_per_trade);
        let trails = axis(&self.trailing_stop_mult, base.trailing_stop_mult);
        let layers = axis(&self.pyramid_max_layers, base.pyramid_max_layers);
        let modes = axis(&self.compounding, base.compounding);

        let mut configs = Vec::with_capacity(risks.len() * trails.len() * layers.len() * modes.len());
        for &risk in &risks {
            for &trail in &trails {
                for &max_layers in &layers {
                    for &compounding in &modes {
                        configs.push(StrategyConfig {
                            risk_per_trade: risk,
                            trailing_stop_mult: trail,
                            pyramid_max_layers: max_layers,
                            compounding,
                            ..base.clone()
                        });
                    }
                }
            }
        }
        configs
    }
}
