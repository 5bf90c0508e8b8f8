//! Risk sizing: quantity from a risk budget and an ATR stop distance.
//!
//! ```text
//! risk_budget   = risk_per_trade * (capital if compounding else fixed_risk_amount)
//! stop_distance = trailing_stop_mult * ATR
//! quantity      = risk_budget / stop_distance
//! ```
//!
//! Pyramid layers are sized with the same formula, independently of what is
//! already open.

use serde::{Deserialize, Serialize};

use crate::config::StrategyConfig;

/// Why a bar with an actionable signal did not open (or add to) a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The anomaly detector flagged the bar.
    Anomaly,
    /// The account hit its drawdown limit.
    Halted,
    /// ATR missing, zero or non-finite: no safe stop distance.
    InvalidVolatility,
    /// The risk budget is zero or negative (compounding off a depleted account).
    NoRiskBudget,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sizing {
    pub quantity: f64,
    pub stop_distance: f64,
    pub risk_budget: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskSizer {
    risk_per_trade: f64,
    stop_mult: f64,
    compounding: bool,
    fixed_risk_amount: f64,
}

impl RiskSizer {
    pub fn from_config(config: &StrategyConfig) -> Self {
        Self {
            risk_per_trade: config.risk_per_trade,
            stop_mult: config.trailing_stop_mult,
            compounding: config.compounding,
            fixed_risk_amount: config.fixed_risk_amount,
        }
    }

    /// Money put at risk on one entry given the current capital.
    pub fn risk_budget(&self, capital: f64) -> f64 {
        let base = if self.compounding {
            capital
        } else {
            self.fixed_risk_amount
        };
        self.risk_per_trade * base
    }

    pub fn size(&self, capital: f64, atr: f64) -> Result<Sizing, SkipReason> {
        if !atr.is_finite() || atr <= 0.0 {
            return Err(SkipReason::InvalidVolatility);
        }
        let stop_distance = self.stop_mult * atr;
        let risk_budget = self.risk_budget(capital);
        if !risk_budget.is_finite() || risk_budget <= 0.0 {
            return Err(SkipReason::NoRiskBudget);
        }
        let quantity = risk_budget / stop_distance;
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(SkipReason::InvalidVolatility);
        }
        Ok(Sizing {
            quantity,
            stop_distance,
            risk_budget,
        })
    }
}
