//! Stop ratchet: stops may tighten, never loosen.
//!
//! Long positions: the stop can only rise. Short positions: it can only fall.
//! A proposal in the loosening direction is ignored, which keeps a later ATR
//! expansion or a pyramid add from widening the risk already locked in.

use crate::domain::{Bar, Side};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopRatchet {
    side: Side,
    level: f64,
    /// Set once the stop has moved off its initial placement.
    armed: bool,
}

impl StopRatchet {
    pub fn new(side: Side, initial_level: f64) -> Self {
        Self {
            side,
            level: initial_level,
            armed: false,
        }
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Offer a new stop level. Returns true if the stop moved.
    pub fn tighten(&mut self, proposed: f64) -> bool {
        if !proposed.is_finite() {
            return false;
        }
        let tighter = match self.side {
            Side::Long => proposed > self.level,
            Side::Short => proposed < self.level,
        };
        if tighter {
            self.level = proposed;
            self.armed = true;
        }
        tighter
    }

    /// Whether the bar's range reached the stop.
    pub fn is_hit(&self, bar: &Bar) -> bool {
        match self.side {
            Side::Long => bar.low <= self.level,
            Side::Short => bar.high >= self.level,
        }
    }
}
