//! Backtesting engine: cost model, account ledger, per-run state and the driver.
//!
//! The driver consumes a validated `BarSeries` and runs one loop over it:
//!
//! 1. Advance the position state machine by one bar. Its gates read the
//!    ledger's halt flag and capital as they stand at that moment.
//! 2. Apply every realized trade to the ledger immediately
//! 3. Record the realized capital for the bar
//! 4. Stop once the account is halted and flat
//!
//! Any position still open after the last bar is closed at its close.

pub mod cost_model;
pub mod driver;
pub mod ledger;
pub mod report;
pub mod state;

pub use cost_model::{CostModel, RoundTrip};
pub use driver::{run_backtest, run_on_bars, RunError};
pub use ledger::{AccountSnapshot, AccountState, Ledger, LedgerUpdate};
pub use report::BacktestReport;
pub use state::{RunContext, StepStatus};
