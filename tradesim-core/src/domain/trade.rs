//! TradeRecord: a realized exit, full or partial.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::position::Side;

/// Why quantity left the position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopOut,
    PartialProfit,
    FullTarget,
    SignalReversal,
    DrawdownHalt,
    EndOfData,
}

impl ExitReason {
    pub const ALL: [ExitReason; 6] = [
        ExitReason::StopOut,
        ExitReason::PartialProfit,
        ExitReason::FullTarget,
        ExitReason::SignalReversal,
        ExitReason::DrawdownHalt,
        ExitReason::EndOfData,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ExitReason::StopOut => "stop_out",
            ExitReason::PartialProfit => "partial_profit",
            ExitReason::FullTarget => "full_target",
            ExitReason::SignalReversal => "signal_reversal",
            ExitReason::DrawdownHalt => "drawdown_halt",
            ExitReason::EndOfData => "end_of_data",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One realized exit. Never mutated once appended to the ledger.
///
/// `avg_entry_price` and `exit_price` are reference prices. Slippage and fees
/// are broken out so that `net_pnl = gross_pnl - slippage - fees`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub side: Side,

    // ── Entry ──
    pub entry_bar: usize,
    pub entry_time: NaiveDateTime,
    pub avg_entry_price: f64,

    // ── Exit ──
    pub exit_bar: usize,
    pub exit_time: NaiveDateTime,
    pub exit_price: f64,
    pub exit_reason: ExitReason,

    // ── Size ──
    pub quantity: f64,
    /// Pyramid layers the closed quantity came from.
    pub layers: usize,

    // ── PnL ──
    pub gross_pnl: f64,
    pub slippage: f64,
    pub fees: f64,
    pub net_pnl: f64,
}

impl TradeRecord {
    /// Net return on the entry notional.
    pub fn return_pct(&self) -> f64 {
        let notional = self.avg_entry_price * self.quantity;
        if notional == 0.0 {
            return 0.0;
        }
        self.net_pnl / notional
    }

    pub fn is_winner(&self) -> bool {
        self.net_pnl > 0.0
    }

    pub fn bars_held(&self) -> usize {
        self.exit_bar.saturating_sub(self.entry_bar)
    }
}
