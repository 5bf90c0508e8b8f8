//! Indicator helpers for sources that do not ship precomputed values.
//!
//! The engine itself only reads `Bar::atr`; these functions let a loader fill it
//! in before the series is validated.

pub mod atr;

pub use atr::{annotate_atr, atr, true_range, wilder_smooth};
