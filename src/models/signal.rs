use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Direction, SignalStatus};

/// One hypothetical trade, as persisted in the shared `signals` table.
///
/// The engine creates rows with `status = Active` and later performs the
/// single terminal transition; the notifier only ever flips the two
/// `*_notified` flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: i64,
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub status: SignalStatus,
    pub notified: bool,
    pub closure_notified: bool,
    pub exit_price: Option<f64>,
    pub pnl_percent: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Signal {
    /// Absolute distance between entry and stop. Always positive for any
    /// signal the detector is allowed to emit.
    pub fn risk(&self) -> f64 {
        (self.stop_loss - self.entry_price).abs()
    }
}

/// A signal about to be inserted. The store assigns the id and sets
/// `status = active`, `notified = false`, `closure_notified = false`.
#[derive(Debug, Clone)]
pub struct NewSignal {
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub created_at: DateTime<Utc>,
}

/// The terminal transition of a signal, applied by the store as one
/// conditional update guarded on `status = active`.
#[derive(Debug, Clone, PartialEq)]
pub struct Closure {
    pub status: SignalStatus,
    pub exit_price: Option<f64>,
    pub pnl_percent: Option<f64>,
    pub closed_at: DateTime<Utc>,
}

impl Closure {
    /// Forced closure at session end. No price is sampled on this path,
    /// so exit price and pnl stay unset.
    pub fn timeout(closed_at: DateTime<Utc>) -> Self {
        Self {
            status: SignalStatus::ClosedByTimeout,
            exit_price: None,
            pnl_percent: None,
            closed_at,
        }
    }
}
