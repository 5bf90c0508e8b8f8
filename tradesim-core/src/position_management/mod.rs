//! Position management: sizing, the stop ratchet, and the per-bar state machine.
//!
//! **Key invariants:**
//! 1. At most one position is open, with 1..=`pyramid_max_layers` layers
//! 2. **Ratchet**: stops may tighten, never loosen (even if ATR expands)
//! 3. Every exit becomes a trade record applied to the ledger immediately
pub mod machine;
pub mod ratchet;
pub mod sizing;

pub use machine::{PositionMachine, StepReport};
pub use ratchet::StopRatchet;
pub use sizing::{RiskSizer, SkipReason, Sizing};
