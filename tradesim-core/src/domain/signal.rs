//! Ensemble signal: the classifier vote attached to every bar.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::position::Side;

/// Direction the ensemble voted for on a bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalDirection {
    Long,
    Short,
    Flat,
}

impl SignalDirection {
    /// Position side this direction maps to. `Flat` has none.
    pub fn side(self) -> Option<Side> {
        match self {
            SignalDirection::Long => Some(Side::Long),
            SignalDirection::Short => Some(Side::Short),
            SignalDirection::Flat => None,
        }
    }
}

impl fmt::Display for SignalDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignalDirection::Long => "long",
            SignalDirection::Short => "short",
            SignalDirection::Flat => "flat",
        };
        f.write_str(s)
    }
}

/// Resolved ensemble output for one bar: a direction plus the confidence behind it.
///
/// `confidence` is whatever the upstream ensemble reports (vote count or score).
/// It is compared against `StrategyConfig::ensemble_threshold` as-is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnsembleSignal {
    pub direction: SignalDirection,
    pub confidence: f64,
}

impl EnsembleSignal {
    pub fn new(direction: SignalDirection, confidence: f64) -> Self {
        Self {
            direction,
            confidence,
        }
    }

    pub fn flat() -> Self {
        Self::new(SignalDirection::Flat, 0.0)
    }

    pub fn long(confidence: f64) -> Self {
        Self::new(SignalDirection::Long, confidence)
    }

    pub fn short(confidence: f64) -> Self {
        Self::new(SignalDirection::Short, confidence)
    }

    /// The side to act on, if the signal is directional and clears `threshold`.
    pub fn actionable(&self, threshold: f64) -> Option<Side> {
        if self.confidence >= threshold {
            self.direction.side()
        } else {
            None
        }
    }
}

impl Default for EnsembleSignal {
    fn default() -> Self {
        Self::flat()
    }
}
