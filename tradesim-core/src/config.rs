//! Strategy configuration: the immutable parameter bundle for one run.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Invalid strategy parameter. Raised before any bar is processed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be {expected}, got {value}")]
    OutOfRange {
        field: &'static str,
        expected: &'static str,
        value: f64,
    },
    #[error("pyramid_max_layers must be >= 1, got {0}")]
    NoLayers(usize),
}

/// Risk, exit, pyramiding and friction parameters.
///
/// Every ATR multiple (`trailing_stop_mult`, `partial_profit_mult`,
/// `pyramid_increment`, `full_target_mult`) is measured in the ATR captured at
/// the position's first entry. `fee_pct` and `slippage_pct` are percentages:
/// 0.1 means 0.1 % of notional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub initial_capital: f64,
    /// Fraction of the risk base put at risk per entry.
    pub risk_per_trade: f64,
    pub trailing_stop_mult: f64,
    pub partial_profit_mult: f64,
    /// Fraction of the open size closed at the partial target.
    pub partial_profit_fraction: f64,
    /// Drawdown from peak capital that halts the run.
    pub max_drawdown: f64,
    pub enable_pyramiding: bool,
    pub pyramid_increment: f64,
    pub pyramid_max_layers: usize,
    /// Minimum ensemble confidence (votes or score) to act on a signal.
    pub ensemble_threshold: f64,
    pub fee_pct: f64,
    pub slippage_pct: f64,
    /// Size off current capital when true, off `fixed_risk_amount` otherwise.
    pub compounding: bool,
    pub fixed_risk_amount: f64,
    /// Optional take-profit on the whole remainder.
    pub full_target_mult: Option<f64>,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            initial_capital: 1000.0,
            risk_per_trade: 0.01,
            trailing_stop_mult: 1.5,
            partial_profit_mult: 1.0,
            partial_profit_fraction: 0.5,
            max_drawdown: 0.2,
            enable_pyramiding: true,
            pyramid_increment: 1.0,
            pyramid_max_layers: 2,
            ensemble_threshold: 2.0,
            fee_pct: 0.1,
            slippage_pct: 0.05,
            compounding: false,
            fixed_risk_amount: 100.0,
            full_target_mult: None,
        }
    }
}

impl StrategyConfig {
    /// Reject out-of-range parameters. The driver calls this before replaying.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check(
            "initial_capital",
            self.initial_capital,
            self.initial_capital.is_finite() && self.initial_capital > 0.0,
            "> 0",
        )?;
        check(
            "risk_per_trade",
            self.risk_per_trade,
            self.risk_per_trade > 0.0 && self.risk_per_trade <= 1.0,
            "in (0, 1]",
        )?;
        check_positive("trailing_stop_mult", self.trailing_stop_mult)?;
        check_positive("partial_profit_mult", self.partial_profit_mult)?;
        check(
            "partial_profit_fraction",
            self.partial_profit_fraction,
            self.partial_profit_fraction > 0.0 && self.partial_profit_fraction <= 1.0,
            "in (0, 1]",
        )?;
        check(
            "max_drawdown",
            self.max_drawdown,
            self.max_drawdown > 0.0 && self.max_drawdown <= 1.0,
            "in (0, 1]",
        )?;
        check_positive("pyramid_increment", self.pyramid_increment)?;
        if self.pyramid_max_layers < 1 {
            return Err(ConfigError::NoLayers(self.pyramid_max_layers));
        }
        check(
            "ensemble_threshold",
            self.ensemble_threshold,
            self.ensemble_threshold.is_finite() && self.ensemble_threshold >= 0.0,
            ">= 0",
        )?;
        check(
            "fee_pct",
            self.fee_pct,
            self.fee_pct >= 0.0 && self.fee_pct < 100.0,
            "in [0, 100)",
        )?;
        check(
            "slippage_pct",
            self.slippage_pct,
            self.slippage_pct >= 0.0 && self.slippage_pct < 100.0,
            "in [0, 100)",
        )?;
        if !self.compounding {
            check_positive("fixed_risk_amount", self.fixed_risk_amount)?;
        }
        if let Some(mult) = self.full_target_mult {
            check_positive("full_target_mult", mult)?;
        }
        Ok(())
    }

    pub fn fee_rate(&self) -> f64 {
        self.fee_pct / 100.0
    }

    pub fn slippage_rate(&self) -> f64 {
        self.slippage_pct / 100.0
    }

    /// A config with no fees and no slippage, otherwise unchanged.
    pub fn frictionless(mut self) -> Self {
        self.fee_pct = 0.0;
        self.slippage_pct = 0.0;
        self
    }
}

fn check(
    field: &'static str,
    value: f64,
    ok: bool,
    expected: &'static str,
) -> Result<(), ConfigError> {
    // NaN fails every comparison above, so `ok` is already false for it.
    if ok {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            expected,
            value,
        })
    }
}

fn check_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    check(field, value, value.is_finite() && value > 0.0, "> 0")
}
