//! Position state machine: Flat -> Open (1..N layers) -> Flat.
//!
//! Each bar is evaluated in a fixed order while a position is open:
//!
//! 1. account halted: close everything at the bar's open
//! 2. stop hit: close everything at the stop price
//! 3. opposite signal: close at the close, then try one fresh entry
//! 4. full target (when configured): close the remainder at the close
//! 5. partial target: close a fraction, once per position
//! 6. pyramiding: add a layer and ratchet the stop to the blended entry
//! 7. trailing: ratchet the stop behind the close
//!
//! Every exit is priced, turned into a [`TradeRecord`] and applied to the
//! ledger before the next rule looks at the account.

use tracing::{debug, trace};

use crate::config::StrategyConfig;
use crate::domain::position::weighted_entry;
use crate::domain::{Bar, ExitReason, Layer, Position, Side, TradeRecord};
use crate::engine::cost_model::{CostModel, RoundTrip};
use crate::engine::ledger::Ledger;
use crate::position_management::sizing::{RiskSizer, SkipReason};

/// What happened on one bar.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepReport {
    pub trades_closed: usize,
    /// Side of a fresh Flat -> Open transition on this bar.
    pub entered: Option<Side>,
    pub layer_added: bool,
    /// Set when an actionable signal was not acted on.
    pub skipped: Option<SkipReason>,
    /// Set when a qualifying pyramid add was refused.
    pub skipped_layer: Option<SkipReason>,
}

enum Advance {
    Holding(Position),
    Closed { reenter: bool },
}

#[derive(Debug, Clone)]
pub struct PositionMachine {
    config: StrategyConfig,
    costs: CostModel,
    sizer: RiskSizer,
    position: Option<Position>,
}

impl PositionMachine {
    /// The config is expected to be validated already.
    pub fn new(config: &StrategyConfig) -> Self {
        Self {
            config: config.clone(),
            costs: CostModel::from_config(config),
            sizer: RiskSizer::from_config(config),
            position: None,
        }
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn is_flat(&self) -> bool {
        self.position.is_none()
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Advance the machine by one bar. Realized trades go straight to `ledger`.
    pub fn on_bar(&mut self, bar_index: usize, bar: &Bar, ledger: &mut Ledger) -> StepReport {
        let mut report = StepReport::default();
        match self.position.take() {
            Some(position) => match self.advance(position, bar_index, bar, ledger, &mut report) {
                Advance::Holding(position) => {
                    debug_assert!(position.layer_count() <= self.config.pyramid_max_layers);
                    self.position = Some(position);
                }
                Advance::Closed { reenter: true } => {
                    self.try_enter(bar_index, bar, ledger, &mut report);
                }
                Advance::Closed { reenter: false } => {}
            },
            None => self.try_enter(bar_index, bar, ledger, &mut report),
        }
        report
    }

    /// Close whatever is still open at `bar`'s close. Returns the number of trades written.
    pub fn close_at_end(&mut self, bar_index: usize, bar: &Bar, ledger: &mut Ledger) -> usize {
        let Some(mut position) = self.position.take() else {
            return 0;
        };
        let slices = position.close_all();
        let mut report = StepReport::default();
        self.realize(
            &position,
            &slices,
            bar_index,
            bar,
            bar.close,
            ExitReason::EndOfData,
            ledger,
            &mut report,
        );
        report.trades_closed
    }

    fn advance(
        &self,
        mut position: Position,
        bar_index: usize,
        bar: &Bar,
        ledger: &mut Ledger,
        report: &mut StepReport,
    ) -> Advance {
        let side = position.side;
        let unit = position.unit;
        let threshold = self.config.ensemble_threshold;
        let signal = bar.signal.actionable(threshold);

        if ledger.is_halted() {
            let slices = position.close_all();
            self.realize(
                &position,
                &slices,
                bar_index,
                bar,
                bar.open,
                ExitReason::DrawdownHalt,
                ledger,
                report,
            );
            return Advance::Closed { reenter: false };
        }

        if position.stop.is_hit(bar) {
            let stop = position.stop_price();
            let slices = position.close_all();
            self.realize(
                &position,
                &slices,
                bar_index,
                bar,
                stop,
                ExitReason::StopOut,
                ledger,
                report,
            );
            return Advance::Closed { reenter: false };
        }

        if signal == Some(side.opposite()) {
            let slices = position.close_all();
            self.realize(
                &position,
                &slices,
                bar_index,
                bar,
                bar.close,
                ExitReason::SignalReversal,
                ledger,
                report,
            );
            return Advance::Closed { reenter: true };
        }

        let gain = side.favorable_move(position.avg_entry_price(), bar.close);

        if let Some(mult) = self.config.full_target_mult {
            if gain >= mult * unit {
                let slices = position.close_all();
                self.realize(
                    &position,
                    &slices,
                    bar_index,
                    bar,
                    bar.close,
                    ExitReason::FullTarget,
                    ledger,
                    report,
                );
                return Advance::Closed { reenter: false };
            }
        }

        if !position.partial_taken && gain >= self.config.partial_profit_mult * unit {
            let slices = position.reduce(self.config.partial_profit_fraction);
            position.partial_taken = true;
            self.realize(
                &position,
                &slices,
                bar_index,
                bar,
                bar.close,
                ExitReason::PartialProfit,
                ledger,
                report,
            );
            if position.is_closed() {
                return Advance::Closed { reenter: false };
            }
        }

        if self.config.enable_pyramiding
            && position.layer_count() < self.config.pyramid_max_layers
            && signal == Some(side)
            && side.favorable_move(position.last_entry_price(), bar.close)
                >= self.config.pyramid_increment * unit
        {
            self.try_add_layer(&mut position, bar_index, bar, ledger, report);
        }

        let trail = self.config.trailing_stop_mult * unit;
        if side.favorable_move(position.trail_anchor, bar.close) >= trail {
            let proposed = bar.close - side.sign() * trail;
            if position.stop.tighten(proposed) {
                trace!(bar_index, stop = proposed, "trailing stop raised");
            }
            position.trail_anchor = bar.close;
        }

        Advance::Holding(position)
    }

    fn try_add_layer(
        &self,
        position: &mut Position,
        bar_index: usize,
        bar: &Bar,
        ledger: &Ledger,
        report: &mut StepReport,
    ) {
        if ledger.is_halted() {
            report.skipped_layer = Some(SkipReason::Halted);
            return;
        }
        if bar.anomaly {
            report.skipped_layer = Some(SkipReason::Anomaly);
            return;
        }
        match self.sizer.size(ledger.capital(), bar.atr) {
            Ok(sizing) => {
                position.add_layer(bar_index, bar.close, sizing.quantity);
                let side = position.side;
                let blended_stop = position.avg_entry_price()
                    - side.sign() * self.config.trailing_stop_mult * position.unit;
                position.stop.tighten(blended_stop);
                report.layer_added = true;
                debug!(
                    bar_index,
                    %side,
                    layers = position.layer_count(),
                    price = bar.close,
                    quantity = sizing.quantity,
                    stop = position.stop_price(),
                    "pyramid layer added"
                );
            }
            Err(reason) => {
                debug!(bar_index, ?reason, "pyramid add skipped");
                report.skipped_layer = Some(reason);
            }
        }
    }

    fn try_enter(&mut self, bar_index: usize, bar: &Bar, ledger: &Ledger, report: &mut StepReport) {
        let Some(side) = bar.signal.actionable(self.config.ensemble_threshold) else {
            return;
        };
        let skip = if ledger.is_halted() {
            Err(SkipReason::Halted)
        } else if bar.anomaly {
            Err(SkipReason::Anomaly)
        } else {
            self.sizer.size(ledger.capital(), bar.atr)
        };
        match skip {
            Ok(sizing) => {
                let stop = bar.close - side.sign() * sizing.stop_distance;
                self.position = Some(Position::open(
                    side,
                    bar_index,
                    bar.timestamp,
                    bar.close,
                    sizing.quantity,
                    bar.atr,
                    stop,
                ));
                report.entered = Some(side);
                debug!(
                    bar_index,
                    timestamp = %bar.timestamp,
                    %side,
                    price = bar.close,
                    quantity = sizing.quantity,
                    stop,
                    "position opened"
                );
            }
            Err(reason) => {
                debug!(
                    bar_index,
                    timestamp = %bar.timestamp,
                    %side,
                    ?reason,
                    atr = bar.atr,
                    "entry skipped"
                );
                report.skipped = Some(reason);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn realize(
        &self,
        position: &Position,
        slices: &[Layer],
        bar_index: usize,
        bar: &Bar,
        exit_price: f64,
        reason: ExitReason,
        ledger: &mut Ledger,
        report: &mut StepReport,
    ) {
        let side = position.side;
        let mut total = RoundTrip::default();
        let mut quantity = 0.0;
        let mut layers = 0;
        for slice in slices.iter().filter(|s| s.quantity > 0.0) {
            total.accumulate(
                self.costs
                    .round_trip(side, slice.entry_price, exit_price, slice.quantity),
            );
            quantity += slice.quantity;
            layers += 1;
        }
        if layers == 0 {
            return;
        }

        let trade = TradeRecord {
            side,
            entry_bar: position.opened_bar,
            entry_time: position.opened_at,
            avg_entry_price: weighted_entry(slices),
            exit_bar: bar_index,
            exit_time: bar.timestamp,
            exit_price,
            exit_reason: reason,
            quantity,
            layers,
            gross_pnl: total.gross,
            slippage: total.slippage,
            fees: total.fees,
            net_pnl: total.net,
        };
        debug!(
            bar_index,
            %side,
            %reason,
            exit_price,
            quantity,
            net_pnl = trade.net_pnl,
            "trade closed"
        );
        ledger.apply_trade(trade);
        report.trades_closed += 1;
    }
}
