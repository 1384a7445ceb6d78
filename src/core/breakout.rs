use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::core::range::OpeningRange;
use crate::models::{BreakoutKind, Candle, Direction};

/// Take-profit distance as a multiple of risk.
pub const REWARD_MULTIPLE: f64 = 2.0;

/// One side of the detector: tracks whether price has closed beyond its
/// boundary and the most adverse price seen since.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SideState {
    pub armed: bool,
    /// Running max high while armed short, running min low while armed long.
    pub extreme_price: f64,
}

#[derive(Debug, Clone, Default)]
pub struct BreakoutState {
    pub short_side: SideState,
    pub long_side: SideState,
    /// Open time of the last closed bar this state was evaluated on.
    /// Feeding the same bar twice is a no-op.
    pub last_evaluated: Option<DateTime<Utc>>,
}

/// Detector state for every watched symbol, owned by the scan loop and
/// passed in by reference so it can be inspected and reset in tests.
#[derive(Debug, Default)]
pub struct BreakoutBook {
    states: HashMap<String, BreakoutState>,
}

impl BreakoutBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state_mut(&mut self, symbol: &str) -> &mut BreakoutState {
        self.states.entry(symbol.to_string()).or_default()
    }

    pub fn state(&self, symbol: &str) -> Option<&BreakoutState> {
        self.states.get(symbol)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalCandidate {
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

/// What one closed bar did to one symbol's detector.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectorEvent {
    /// Price closed beyond a boundary; that side is now tracking for
    /// re-entry. Informational.
    Armed { kind: BreakoutKind, price: f64 },
    /// Price closed back inside the range; a candidate trade fired.
    Fired(SignalCandidate),
}

/// Run both sides of the breakout state machine against the most recently
/// closed bar. Returns at most one event per side.
///
/// A re-entry bar disarms its side whether or not a candidate fires: a
/// candidate whose risk would be zero or negative is silently discarded.
pub fn evaluate(
    state: &mut BreakoutState,
    bar: &Candle,
    range: &OpeningRange,
) -> Vec<DetectorEvent> {
    if state.last_evaluated == Some(bar.timestamp) {
        return Vec::new();
    }
    state.last_evaluated = Some(bar.timestamp);

    let mut events = Vec::new();

    // Short side: arm above the upper bound, fire on a close back inside.
    if !state.short_side.armed {
        if bar.close > range.upper_bound {
            state.short_side.armed = true;
            state.short_side.extreme_price = bar.high;
            events.push(DetectorEvent::Armed {
                kind: BreakoutKind::BreakoutUp,
                price: bar.close,
            });
        }
    } else {
        state.short_side.extreme_price = state.short_side.extreme_price.max(bar.high);
        if bar.close < range.upper_bound {
            let entry = bar.close;
            let stop = state.short_side.extreme_price;
            let risk = stop - entry;
            if risk > 0.0 {
                events.push(DetectorEvent::Fired(SignalCandidate {
                    direction: Direction::Short,
                    entry_price: entry,
                    stop_loss: stop,
                    take_profit: entry - REWARD_MULTIPLE * risk,
                }));
            }
            state.short_side.armed = false;
        }
    }

    // Long side: arm below the lower bound, fire on a close back inside.
    if !state.long_side.armed {
        if bar.close < range.lower_bound {
            state.long_side.armed = true;
            state.long_side.extreme_price = bar.low;
            events.push(DetectorEvent::Armed {
                kind: BreakoutKind::BreakdownDown,
                price: bar.close,
            });
        }
    } else {
        state.long_side.extreme_price = state.long_side.extreme_price.min(bar.low);
        if bar.close > range.lower_bound {
            let entry = bar.close;
            let stop = state.long_side.extreme_price;
            let risk = entry - stop;
            if risk > 0.0 {
                events.push(DetectorEvent::Fired(SignalCandidate {
                    direction: Direction::Long,
                    entry_price: entry,
                    stop_loss: stop,
                    take_profit: entry + REWARD_MULTIPLE * risk,
                }));
            }
            state.long_side.armed = false;
        }
    }

    events
}
