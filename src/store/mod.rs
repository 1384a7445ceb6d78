pub mod sqlite;

pub use sqlite::SqliteSignalStore;

use chrono::{DateTime, Utc};

use crate::models::{BreakoutKind, Closure, NewSignal, Signal, SignalStatus};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store-level single-active guard rejected an insert.
    #[error("an active signal already exists for {0}")]
    ActiveSignalExists(String),
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The narrow contract the engine and notifier hold against the shared
/// `signals` table. The engine creates rows and performs terminal
/// transitions; the notifier reads and flips only the two notification
/// flags.
pub trait SignalStore: Send {
    fn signals_by_status(&self, status: SignalStatus) -> Result<Vec<Signal>, StoreError>;

    fn active_signal_for_symbol(&self, symbol: &str) -> Result<Option<Signal>, StoreError>;

    /// Insert a new row with `status = active` and both notification
    /// flags false. Returns the assigned id, or
    /// [`StoreError::ActiveSignalExists`] when the symbol already has an
    /// active row.
    fn insert_signal(&self, signal: &NewSignal) -> Result<i64, StoreError>;

    /// Apply the terminal transition as one conditional update guarded on
    /// `status = active`. Returns false when the row was already terminal
    /// (the update touched nothing).
    fn close_signal(&self, id: i64, closure: &Closure) -> Result<bool, StoreError>;

    /// Signals whose creation has not been announced yet.
    fn unnotified_signals(&self) -> Result<Vec<Signal>, StoreError>;

    /// Stop/target resolutions whose closure has not been announced yet.
    fn unnotified_closures(&self) -> Result<Vec<Signal>, StoreError>;

    fn mark_notified(&self, id: i64) -> Result<(), StoreError>;

    fn mark_closure_notified(&self, id: i64) -> Result<(), StoreError>;

    /// Record a boundary-break alert. Informational; never read back by
    /// the engine.
    fn record_alert(
        &self,
        symbol: &str,
        kind: BreakoutKind,
        price: f64,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscriber {
    pub chat_id: i64,
    pub username: Option<String>,
}

/// Subscriber records belong to the chat-bot collaborator; this side only
/// ever lists the active ones to fan notifications out.
pub trait SubscriberStore: Send {
    fn active_subscribers(&self) -> Result<Vec<Subscriber>, StoreError>;
}
