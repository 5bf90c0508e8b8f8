//! Cost model: slippage and fees per fill.
//!
//! Slippage is directional: the side opening a long pays more, the side closing
//! it receives less (mirrored for shorts). Fees are a percentage of the slipped
//! notional on every fill. Entry costs are realized together with the quantity
//! they belong to, so a partial exit carries its share of the entry fill's cost.

use crate::config::StrategyConfig;
use crate::domain::Side;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModel {
    /// Fraction of price, e.g. 0.0005 for 0.05 %.
    pub slippage_rate: f64,
    /// Fraction of notional, e.g. 0.001 for 0.1 %.
    pub fee_rate: f64,
}

/// Realized breakdown for one closed slice of a position.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RoundTrip {
    /// PnL at reference prices.
    pub gross: f64,
    /// Slippage paid on entry and exit, in money.
    pub slippage: f64,
    /// Fees paid on entry and exit, in money.
    pub fees: f64,
    pub net: f64,
}

impl RoundTrip {
    pub fn accumulate(&mut self, other: RoundTrip) {
        self.gross += other.gross;
        self.slippage += other.slippage;
        self.fees += other.fees;
        self.net += other.net;
    }
}

impl CostModel {
    pub fn new(slippage_rate: f64, fee_rate: f64) -> Self {
        Self {
            slippage_rate,
            fee_rate,
        }
    }

    pub fn from_config(config: &StrategyConfig) -> Self {
        Self::new(config.slippage_rate(), config.fee_rate())
    }

    pub fn frictionless() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Effective price when opening `side` at reference `price`.
    pub fn entry_fill(&self, side: Side, price: f64) -> f64 {
        price * (1.0 + side.sign() * self.slippage_rate)
    }

    /// Effective price when closing `side` at reference `price`.
    pub fn exit_fill(&self, side: Side, price: f64) -> f64 {
        price * (1.0 - side.sign() * self.slippage_rate)
    }

    pub fn fee(&self, notional: f64) -> f64 {
        notional.abs() * self.fee_rate
    }

    /// Costs for closing `quantity` that was entered at `entry_price` and exits at `exit_price`.
    pub fn round_trip(
        &self,
        side: Side,
        entry_price: f64,
        exit_price: f64,
        quantity: f64,
    ) -> RoundTrip {
        let entry_fill = self.entry_fill(side, entry_price);
        let exit_fill = self.exit_fill(side, exit_price);

        let gross = side.favorable_move(entry_price, exit_price) * quantity;
        let slippage =
            ((entry_fill - entry_price) + (exit_price - exit_fill)) * side.sign() * quantity;
        let fees = self.fee(entry_fill * quantity) + self.fee(exit_fill * quantity);
        let net = side.favorable_move(entry_fill, exit_fill) * quantity - fees;

        RoundTrip {
            gross,
            slippage,
            fees,
            net,
        }
    }
}
