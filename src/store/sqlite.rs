use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::models::{BreakoutKind, Closure, Direction, NewSignal, Signal, SignalStatus};
use crate::store::{SignalStore, StoreError, Subscriber, SubscriberStore};

const SIGNAL_COLUMNS: &str = "id, symbol, direction, entry_price, stop_loss, take_profit, \
     status, notified, closure_notified, exit_price, pnl_percent, created_at, closed_at";

/// SQLite-backed store shared with the notifier and the subscription bot.
/// WAL mode so independent task connections can interleave. Clones share
/// the underlying connection.
#[derive(Clone)]
pub struct SqliteSignalStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSignalStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS signals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                direction TEXT NOT NULL,
                entry_price REAL NOT NULL,
                stop_loss REAL NOT NULL,
                take_profit REAL NOT NULL,
                status TEXT NOT NULL DEFAULT 'active',
                notified INTEGER NOT NULL DEFAULT 0,
                closure_notified INTEGER NOT NULL DEFAULT 0,
                exit_price REAL,
                pnl_percent REAL,
                created_at TEXT NOT NULL,
                closed_at TEXT
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_signals_status ON signals(status)",
            [],
        )?;
        // Store-level single-active-per-symbol guard
        conn.execute(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_signals_active_symbol
             ON signals(symbol) WHERE status = 'active'",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS alerts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                kind TEXT NOT NULL,
                price REAL NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS subscribers (
                telegram_chat_id INTEGER PRIMARY KEY,
                username TEXT,
                is_active INTEGER NOT NULL DEFAULT 1
            )",
            [],
        )?;

        debug!("Signal store schema created/verified");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Bootstrap/admin helper matching the subscription bot's upsert:
    /// re-subscribing an existing chat re-activates it in place.
    pub fn upsert_subscriber(
        &self,
        chat_id: i64,
        username: Option<&str>,
        is_active: bool,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO subscribers (telegram_chat_id, username, is_active)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(telegram_chat_id)
             DO UPDATE SET username = excluded.username, is_active = excluded.is_active",
            params![chat_id, username, is_active as i64],
        )?;
        Ok(())
    }

    fn select_signals(&self, where_clause: &str) -> Result<Vec<Signal>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let query = format!(
            "SELECT {} FROM signals WHERE {} ORDER BY id",
            SIGNAL_COLUMNS, where_clause
        );
        let mut stmt = conn.prepare(&query)?;
        let signals = stmt
            .query_map([], row_to_signal)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(signals)
    }

    #[cfg(test)]
    fn alert_count(&self) -> usize {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM alerts", [], |row| row.get::<_, i64>(0))
            .unwrap_or(0) as usize
    }
}

fn bad_column(idx: usize, value: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        format!("unrecognized value: {}", value).into(),
    )
}

fn parse_ts(idx: usize, s: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| bad_column(idx, s))
}

fn row_to_signal(row: &Row<'_>) -> rusqlite::Result<Signal> {
    let direction_s: String = row.get(2)?;
    let direction =
        Direction::from_str_loose(&direction_s).ok_or_else(|| bad_column(2, direction_s))?;
    let status_s: String = row.get(6)?;
    let status =
        SignalStatus::from_str_loose(&status_s).ok_or_else(|| bad_column(6, status_s))?;
    let created_at = parse_ts(11, row.get::<_, String>(11)?)?;
    let closed_at = match row.get::<_, Option<String>>(12)? {
        Some(s) => Some(parse_ts(12, s)?),
        None => None,
    };

    Ok(Signal {
        id: row.get(0)?,
        symbol: row.get(1)?,
        direction,
        entry_price: row.get(3)?,
        stop_loss: row.get(4)?,
        take_profit: row.get(5)?,
        status,
        notified: row.get::<_, i64>(7)? != 0,
        closure_notified: row.get::<_, i64>(8)? != 0,
        exit_price: row.get(9)?,
        pnl_percent: row.get(10)?,
        created_at,
        closed_at,
    })
}

impl SignalStore for SqliteSignalStore {
    fn signals_by_status(&self, status: SignalStatus) -> Result<Vec<Signal>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let query = format!(
            "SELECT {} FROM signals WHERE status = ?1 ORDER BY id",
            SIGNAL_COLUMNS
        );
        let mut stmt = conn.prepare(&query)?;
        let signals = stmt
            .query_map(params![status.as_str()], row_to_signal)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(signals)
    }

    fn active_signal_for_symbol(&self, symbol: &str) -> Result<Option<Signal>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let query = format!(
            "SELECT {} FROM signals WHERE symbol = ?1 AND status = 'active'",
            SIGNAL_COLUMNS
        );
        let mut stmt = conn.prepare(&query)?;
        match stmt.query_row(params![symbol], row_to_signal) {
            Ok(sig) => Ok(Some(sig)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn insert_signal(&self, signal: &NewSignal) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap();
        let result = conn.execute(
            "INSERT INTO signals
             (symbol, direction, entry_price, stop_loss, take_profit,
              status, notified, closure_notified, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'active', 0, 0, ?6)",
            params![
                signal.symbol,
                signal.direction.as_str(),
                signal.entry_price,
                signal.stop_loss,
                signal.take_profit,
                signal.created_at.to_rfc3339(),
            ],
        );
        match result {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::ActiveSignalExists(signal.symbol.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn close_signal(&self, id: i64, closure: &Closure) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute(
            "UPDATE signals
             SET status = ?2, exit_price = ?3, pnl_percent = ?4, closed_at = ?5
             WHERE id = ?1 AND status = 'active'",
            params![
                id,
                closure.status.as_str(),
                closure.exit_price,
                closure.pnl_percent,
                closure.closed_at.to_rfc3339(),
            ],
        )?;
        Ok(affected > 0)
    }

    fn unnotified_signals(&self) -> Result<Vec<Signal>, StoreError> {
        self.select_signals("notified = 0")
    }

    fn unnotified_closures(&self) -> Result<Vec<Signal>, StoreError> {
        self.select_signals(
            "status IN ('target_hit', 'stop_hit') AND closure_notified = 0",
        )
    }

    fn mark_notified(&self, id: i64) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE signals SET notified = 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    fn mark_closure_notified(&self, id: i64) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE signals SET closure_notified = 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    fn record_alert(
        &self,
        symbol: &str,
        kind: BreakoutKind,
        price: f64,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO alerts (symbol, kind, price, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![symbol, kind.as_str(), price, at.to_rfc3339()],
        )?;
        Ok(())
    }
}

impl SubscriberStore for SqliteSignalStore {
    fn active_subscribers(&self) -> Result<Vec<Subscriber>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT telegram_chat_id, username FROM subscribers WHERE is_active = 1",
        )?;
        let subs = stmt
            .query_map([], |row| {
                Ok(Subscriber {
                    chat_id: row.get(0)?,
                    username: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(subs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Direction;
    use crate::test_helpers::new_signal;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn store() -> SqliteSignalStore {
        SqliteSignalStore::open_in_memory().unwrap()
    }

    #[test]
    fn insert_and_load_round_trip() {
        let store = store();
        let id = store
            .insert_signal(&new_signal("BTCUSDT", Direction::Short, 99.0, 103.0, 91.0))
            .unwrap();

        let active = store.signals_by_status(SignalStatus::Active).unwrap();
        assert_eq!(active.len(), 1);
        let sig = &active[0];
        assert_eq!(sig.id, id);
        assert_eq!(sig.symbol, "BTCUSDT");
        assert_eq!(sig.direction, Direction::Short);
        assert!((sig.entry_price - 99.0).abs() < 1e-9);
        assert!((sig.risk() - 4.0).abs() < 1e-9);
        assert!(!sig.notified);
        assert!(!sig.closure_notified);
        assert!(sig.exit_price.is_none());
        assert!(sig.closed_at.is_none());
    }

    #[test]
    fn second_active_signal_for_symbol_rejected() {
        let store = store();
        store
            .insert_signal(&new_signal("BTCUSDT", Direction::Short, 99.0, 103.0, 91.0))
            .unwrap();
        let err = store
            .insert_signal(&new_signal("BTCUSDT", Direction::Long, 91.0, 87.0, 99.0))
            .unwrap_err();
        assert!(matches!(err, StoreError::ActiveSignalExists(s) if s == "BTCUSDT"));

        // A different symbol is fine
        store
            .insert_signal(&new_signal("ETHUSDT", Direction::Long, 91.0, 87.0, 99.0))
            .unwrap();
    }

    #[test]
    fn closed_symbol_can_open_again() {
        let store = store();
        let id = store
            .insert_signal(&new_signal("BTCUSDT", Direction::Short, 99.0, 103.0, 91.0))
            .unwrap();
        let closure = Closure {
            status: SignalStatus::TargetHit,
            exit_price: Some(91.0),
            pnl_percent: Some(8.08),
            closed_at: ts("2024-01-15T16:00:00Z"),
        };
        assert!(store.close_signal(id, &closure).unwrap());
        store
            .insert_signal(&new_signal("BTCUSDT", Direction::Long, 91.0, 87.0, 99.0))
            .unwrap();
    }

    #[test]
    fn close_is_conditional_on_active() {
        let store = store();
        let id = store
            .insert_signal(&new_signal("BTCUSDT", Direction::Long, 100.0, 98.0, 104.0))
            .unwrap();

        let first = Closure {
            status: SignalStatus::StopHit,
            exit_price: Some(97.9),
            pnl_percent: Some(-2.1),
            closed_at: ts("2024-01-15T16:00:00Z"),
        };
        assert!(store.close_signal(id, &first).unwrap());

        // A second transition must not touch the row
        let second = Closure {
            status: SignalStatus::TargetHit,
            exit_price: Some(104.5),
            pnl_percent: Some(4.5),
            closed_at: ts("2024-01-15T17:00:00Z"),
        };
        assert!(!store.close_signal(id, &second).unwrap());

        let all = store.signals_by_status(SignalStatus::StopHit).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].exit_price, Some(97.9));
        assert_eq!(all[0].closed_at, Some(ts("2024-01-15T16:00:00Z")));
    }

    #[test]
    fn timeout_closure_leaves_exit_fields_null() {
        let store = store();
        let id = store
            .insert_signal(&new_signal("BTCUSDT", Direction::Long, 100.0, 98.0, 104.0))
            .unwrap();
        assert!(store
            .close_signal(id, &Closure::timeout(ts("2024-01-15T22:05:00Z")))
            .unwrap());

        let closed = store
            .signals_by_status(SignalStatus::ClosedByTimeout)
            .unwrap();
        assert_eq!(closed.len(), 1);
        assert!(closed[0].exit_price.is_none());
        assert!(closed[0].pnl_percent.is_none());
        assert_eq!(closed[0].closed_at, Some(ts("2024-01-15T22:05:00Z")));
    }

    #[test]
    fn active_signal_for_symbol_filters() {
        let store = store();
        store
            .insert_signal(&new_signal("BTCUSDT", Direction::Short, 99.0, 103.0, 91.0))
            .unwrap();

        assert!(store.active_signal_for_symbol("BTCUSDT").unwrap().is_some());
        assert!(store.active_signal_for_symbol("ETHUSDT").unwrap().is_none());
    }

    #[test]
    fn notification_queues_and_flags() {
        let store = store();
        let a = store
            .insert_signal(&new_signal("BTCUSDT", Direction::Short, 99.0, 103.0, 91.0))
            .unwrap();
        let b = store
            .insert_signal(&new_signal("ETHUSDT", Direction::Long, 91.0, 87.0, 99.0))
            .unwrap();

        assert_eq!(store.unnotified_signals().unwrap().len(), 2);
        store.mark_notified(a).unwrap();
        let pending = store.unnotified_signals().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, b);

        // Stop/target closures queue for closure notification;
        // timeout closures do not.
        let stop = Closure {
            status: SignalStatus::StopHit,
            exit_price: Some(103.0),
            pnl_percent: Some(-4.04),
            closed_at: ts("2024-01-15T16:00:00Z"),
        };
        store.close_signal(a, &stop).unwrap();
        store
            .close_signal(b, &Closure::timeout(ts("2024-01-15T22:05:00Z")))
            .unwrap();

        let closures = store.unnotified_closures().unwrap();
        assert_eq!(closures.len(), 1);
        assert_eq!(closures[0].id, a);

        store.mark_closure_notified(a).unwrap();
        assert!(store.unnotified_closures().unwrap().is_empty());
    }

    #[test]
    fn subscriber_upsert_and_listing() {
        let store = store();
        store.upsert_subscriber(111, Some("alice"), true).unwrap();
        store.upsert_subscriber(222, None, true).unwrap();
        store.upsert_subscriber(333, Some("carol"), false).unwrap();

        let subs = store.active_subscribers().unwrap();
        assert_eq!(subs.len(), 2);

        // Unsubscribe is an in-place flip
        store.upsert_subscriber(111, Some("alice"), false).unwrap();
        assert_eq!(store.active_subscribers().unwrap().len(), 1);

        // Re-subscribing re-activates
        store.upsert_subscriber(333, Some("carol"), true).unwrap();
        let subs = store.active_subscribers().unwrap();
        assert_eq!(subs.len(), 2);
        assert!(subs.iter().any(|s| s.chat_id == 333));
    }

    #[test]
    fn alerts_are_recorded() {
        let store = store();
        store
            .record_alert(
                "BTCUSDT",
                BreakoutKind::BreakoutUp,
                101.5,
                ts("2024-01-15T14:35:00Z"),
            )
            .unwrap();
        store
            .record_alert(
                "BTCUSDT",
                BreakoutKind::BreakdownDown,
                89.0,
                ts("2024-01-15T15:40:00Z"),
            )
            .unwrap();
        assert_eq!(store.alert_count(), 2);
    }
}
