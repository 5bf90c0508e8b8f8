//! Position: the single open position and its pyramid layers.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::position_management::ratchet::StopRatchet;

/// Direction of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1 for longs, -1 for shorts.
    pub fn sign(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }

    pub fn opposite(self) -> Side {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }

    /// Price move from `from` to `to`, positive when it favors this side.
    pub fn favorable_move(self, from: f64, to: f64) -> f64 {
        (to - from) * self.sign()
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => f.write_str("long"),
            Side::Short => f.write_str("short"),
        }
    }
}

/// One pyramid layer: a single entry fill and the quantity still open from it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub entry_bar: usize,
    pub entry_price: f64,
    pub quantity: f64,
}

/// The open position. Owned by the position state machine for its whole lifetime.
///
/// Prices are reference prices (before slippage). Fill costs are computed
/// when quantity is closed, see `engine::cost_model`.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub side: Side,
    pub layers: Vec<Layer>,
    pub stop: StopRatchet,
    /// Close at the last trailing-stop placement (entry price until the first trail).
    pub trail_anchor: f64,
    pub partial_taken: bool,
    pub opened_bar: usize,
    pub opened_at: NaiveDateTime,
    /// ATR captured at the first entry; every ATR multiple is measured in it.
    pub unit: f64,
    opened_quantity: f64,
    closed_quantity: f64,
}

impl Position {
    pub fn open(
        side: Side,
        bar_index: usize,
        timestamp: NaiveDateTime,
        entry_price: f64,
        quantity: f64,
        unit: f64,
        stop_price: f64,
    ) -> Self {
        Self {
            side,
            layers: vec![Layer {
                entry_bar: bar_index,
                entry_price,
                quantity,
            }],
            stop: StopRatchet::new(side, stop_price),
            trail_anchor: entry_price,
            partial_taken: false,
            opened_bar: bar_index,
            opened_at: timestamp,
            unit,
            opened_quantity: quantity,
            closed_quantity: 0.0,
        }
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Quantity still open across all layers.
    pub fn quantity(&self) -> f64 {
        self.layers.iter().map(|l| l.quantity).sum()
    }

    pub fn is_closed(&self) -> bool {
        self.quantity() <= 0.0
    }

    /// Quantity-weighted average reference entry price of what is still open.
    pub fn avg_entry_price(&self) -> f64 {
        weighted_entry(&self.layers)
    }

    pub fn last_entry_price(&self) -> f64 {
        self.layers
            .last()
            .map(|l| l.entry_price)
            .unwrap_or(f64::NAN)
    }

    pub fn stop_price(&self) -> f64 {
        self.stop.level()
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.layers
            .iter()
            .map(|l| self.side.favorable_move(l.entry_price, price) * l.quantity)
            .sum()
    }

    /// Total quantity ever added (all layers, before any exit).
    pub fn opened_quantity(&self) -> f64 {
        self.opened_quantity
    }

    pub fn closed_quantity(&self) -> f64 {
        self.closed_quantity
    }

    /// Share of the opened quantity already closed.
    pub fn closed_fraction(&self) -> f64 {
        if self.opened_quantity > 0.0 {
            self.closed_quantity / self.opened_quantity
        } else {
            0.0
        }
    }

    /// Share of the opened quantity still held.
    pub fn remaining_fraction(&self) -> f64 {
        if self.opened_quantity > 0.0 {
            self.quantity() / self.opened_quantity
        } else {
            0.0
        }
    }

    pub fn add_layer(&mut self, bar_index: usize, entry_price: f64, quantity: f64) {
        self.layers.push(Layer {
            entry_bar: bar_index,
            entry_price,
            quantity,
        });
        self.opened_quantity += quantity;
    }

    /// Take `fraction` of every layer off the position, pro rata.
    ///
    /// Returns the removed slices (same entry prices, removed quantities).
    /// A fraction of 1.0 or more empties the position.
    pub fn reduce(&mut self, fraction: f64) -> Vec<Layer> {
        if fraction >= 1.0 {
            return self.close_all();
        }
        let fraction = fraction.max(0.0);
        let mut removed = Vec::with_capacity(self.layers.len());
        for layer in &mut self.layers {
            let qty = layer.quantity * fraction;
            layer.quantity -= qty;
            self.closed_quantity += qty;
            removed.push(Layer {
                entry_bar: layer.entry_bar,
                entry_price: layer.entry_price,
                quantity: qty,
            });
        }
        removed
    }

    /// Empty the position and return every layer that was still open.
    pub fn close_all(&mut self) -> Vec<Layer> {
        let removed: Vec<Layer> = self.layers.iter().copied().collect();
        for layer in &mut self.layers {
            self.closed_quantity += layer.quantity;
            layer.quantity = 0.0;
        }
        removed
    }
}

/// Quantity-weighted average entry over a set of layers (NaN when empty).
pub fn weighted_entry(layers: &[Layer]) -> f64 {
    let qty: f64 = layers.iter().map(|l| l.quantity).sum();
    if qty <= 0.0 {
        return f64::NAN;
    }
    layers
        .iter()
        .map(|l| l.entry_price * l.quantity)
        .sum::<f64>()
        / qty
}
