//! Domain types for tradesim

pub mod bar;
pub mod position;
pub mod signal;
pub mod trade;

pub use bar::Bar;
pub use position::{Layer, Position, Side};
pub use signal::{EnsembleSignal, SignalDirection};
pub use trade::{ExitReason, TradeRecord};
