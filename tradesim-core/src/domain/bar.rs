//! Bar: the fundamental market data unit.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::signal::EnsembleSignal;
use crate::data::DataError;

/// OHLCV bar annotated with indicators, the ensemble signal and the anomaly gate.
///
/// `atr` may be NaN while the upstream indicator is still warming up. A bar with
/// an unusable ATR can be replayed, it just cannot size an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub atr: f64,
    /// Additional precomputed indicators, keyed by name (e.g. "rsi_14").
    #[serde(default)]
    pub indicators: BTreeMap<String, f64>,
    #[serde(default)]
    pub signal: EnsembleSignal,
    /// True when the anomaly detector flagged this bar: no new entries.
    #[serde(default)]
    pub anomaly: bool,
}

impl Bar {
    /// A bar with no volume, no ATR, a flat signal and no anomaly.
    pub fn new(timestamp: NaiveDateTime, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume: 0.0,
            atr: f64::NAN,
            indicators: BTreeMap::new(),
            signal: EnsembleSignal::flat(),
            anomaly: false,
        }
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_atr(mut self, atr: f64) -> Self {
        self.atr = atr;
        self
    }

    pub fn with_signal(mut self, signal: EnsembleSignal) -> Self {
        self.signal = signal;
        self
    }

    pub fn with_anomaly(mut self, anomaly: bool) -> Self {
        self.anomaly = anomaly;
        self
    }

    pub fn with_indicator(mut self, name: impl Into<String>, value: f64) -> Self {
        self.indicators.insert(name.into(), value);
        self
    }

    /// Look up an extra indicator by name.
    pub fn indicator(&self, name: &str) -> Option<f64> {
        self.indicators.get(name).copied()
    }

    /// High minus low.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// True when the ATR can be used to size a position.
    pub fn has_volatility(&self) -> bool {
        self.atr.is_finite() && self.atr > 0.0
    }

    /// Check the bar's own fields. `index` is only used for error context.
    pub fn validate(&self, index: usize) -> Result<(), DataError> {
        let timestamp = self.timestamp;
        let prices = [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ];
        for (field, value) in prices {
            if !value.is_finite() {
                return Err(DataError::NonFinite {
                    index,
                    timestamp,
                    field,
                });
            }
            if value <= 0.0 {
                return Err(DataError::NonPositivePrice {
                    index,
                    timestamp,
                    field,
                    value,
                });
            }
        }

        if self.high < self.open.max(self.close) || self.low > self.open.min(self.close) {
            return Err(DataError::InconsistentOhlc {
                index,
                timestamp,
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }

        if !self.volume.is_finite() {
            return Err(DataError::NonFinite {
                index,
                timestamp,
                field: "volume",
            });
        }
        if self.volume < 0.0 {
            return Err(DataError::NegativeVolume {
                index,
                timestamp,
                volume: self.volume,
            });
        }

        // NaN is the warmup marker; infinities are not.
        if self.atr.is_infinite() {
            return Err(DataError::NonFinite {
                index,
                timestamp,
                field: "atr",
            });
        }
        if self.atr < 0.0 {
            return Err(DataError::NegativeAtr {
                index,
                timestamp,
                atr: self.atr,
            });
        }

        if !self.signal.confidence.is_finite() {
            return Err(DataError::NonFinite {
                index,
                timestamp,
                field: "signal.confidence",
            });
        }

        Ok(())
    }
}
