use chrono::{DateTime, Duration, Utc};

use crate::models::{Candle, CandleSeries, Direction, NewSignal, Signal, SignalStatus};

/// Create candles from (open, high, low, close) tuples with
/// auto-incrementing 5m timestamps.
pub fn make_candles(data: &[(f64, f64, f64, f64)]) -> CandleSeries {
    let base = DateTime::parse_from_rfc3339("2024-01-15T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc);

    let candles: Vec<Candle> = data
        .iter()
        .enumerate()
        .map(|(i, &(o, h, l, c))| Candle {
            timestamp: base + Duration::minutes(5 * i as i64),
            open: o,
            high: h,
            low: l,
            close: c,
            volume: 100.0,
        })
        .collect();

    CandleSeries::new(candles)
}

/// An active signal row as the engine would have created it.
pub fn active_signal(
    symbol: &str,
    direction: Direction,
    entry: f64,
    stop: f64,
    target: f64,
) -> Signal {
    Signal {
        id: 1,
        symbol: symbol.to_string(),
        direction,
        entry_price: entry,
        stop_loss: stop,
        take_profit: target,
        status: SignalStatus::Active,
        notified: false,
        closure_notified: false,
        exit_price: None,
        pnl_percent: None,
        created_at: DateTime::parse_from_rfc3339("2024-01-15T14:30:00Z")
            .unwrap()
            .with_timezone(&Utc),
        closed_at: None,
    }
}

/// Insert payload for store tests.
pub fn new_signal(
    symbol: &str,
    direction: Direction,
    entry: f64,
    stop: f64,
    target: f64,
) -> NewSignal {
    NewSignal {
        symbol: symbol.to_string(),
        direction,
        entry_price: entry,
        stop_loss: stop,
        take_profit: target,
        created_at: DateTime::parse_from_rfc3339("2024-01-15T14:30:00Z")
            .unwrap()
            .with_timezone(&Utc),
    }
}
