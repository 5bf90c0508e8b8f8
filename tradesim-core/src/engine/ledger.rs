//! Account ledger: capital, peak, drawdown kill-switch and the trade list.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::StrategyConfig;
use crate::domain::TradeRecord;

/// Running account state. Owned by the ledger for the whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountState {
    pub capital: f64,
    pub peak_capital: f64,
    /// Terminal for the run once set.
    pub halted: bool,
    /// Bar index of the trade that tripped the halt.
    pub halted_at: Option<usize>,
}

/// Read-only view handed to the state machine before each decision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub capital: f64,
    pub peak_capital: f64,
    pub drawdown: f64,
    pub halted: bool,
}

/// Effect of one applied trade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedgerUpdate {
    pub capital: f64,
    pub drawdown: f64,
    /// True only for the trade that tripped the kill-switch.
    pub newly_halted: bool,
}

#[derive(Debug, Clone)]
pub struct Ledger {
    initial_capital: f64,
    max_drawdown: f64,
    state: AccountState,
    worst_drawdown: f64,
    trades: Vec<TradeRecord>,
}

impl Ledger {
    pub fn new(initial_capital: f64, max_drawdown: f64) -> Self {
        Self {
            initial_capital,
            max_drawdown,
            state: AccountState {
                capital: initial_capital,
                peak_capital: initial_capital,
                halted: false,
                halted_at: None,
            },
            worst_drawdown: 0.0,
            trades: Vec::new(),
        }
    }

    pub fn from_config(config: &StrategyConfig) -> Self {
        Self::new(config.initial_capital, config.max_drawdown)
    }

    /// Book a realized trade: append it, move capital, re-evaluate drawdown.
    pub fn apply_trade(&mut self, trade: TradeRecord) -> LedgerUpdate {
        let state = &mut self.state;
        state.capital += trade.net_pnl;
        state.peak_capital = state.peak_capital.max(state.capital);

        let drawdown = drawdown(state.peak_capital, state.capital);
        self.worst_drawdown = self.worst_drawdown.max(drawdown);

        let breached = drawdown >= self.max_drawdown || state.capital <= 0.0;
        let newly_halted = breached && !state.halted;
        if newly_halted {
            state.halted = true;
            state.halted_at = Some(trade.exit_bar);
            warn!(
                bar_index = trade.exit_bar,
                timestamp = %trade.exit_time,
                capital = state.capital,
                peak = state.peak_capital,
                drawdown,
                limit = self.max_drawdown,
                "drawdown limit reached, halting new entries"
            );
        }

        let update = LedgerUpdate {
            capital: state.capital,
            drawdown,
            newly_halted,
        };
        self.trades.push(trade);
        update
    }

    pub fn snapshot(&self) -> AccountSnapshot {
        AccountSnapshot {
            capital: self.state.capital,
            peak_capital: self.state.peak_capital,
            drawdown: drawdown(self.state.peak_capital, self.state.capital),
            halted: self.state.halted,
        }
    }

    pub fn state(&self) -> &AccountState {
        &self.state
    }

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    pub fn capital(&self) -> f64 {
        self.state.capital
    }

    pub fn is_halted(&self) -> bool {
        self.state.halted
    }

    /// Largest drawdown seen after any trade.
    pub fn worst_drawdown(&self) -> f64 {
        self.worst_drawdown
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    pub fn into_parts(self) -> (AccountState, Vec<TradeRecord>) {
        (self.state, self.trades)
    }
}

fn drawdown(peak: f64, capital: f64) -> f64 {
    if peak > 0.0 {
        ((peak - capital) / peak).max(0.0)
    } else {
        0.0
    }
}
