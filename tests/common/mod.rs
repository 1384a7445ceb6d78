use chrono::{DateTime, Duration, Utc};
use orb_signal_bot::models::{Candle, CandleSeries};

/// Create candles from (open, high, low, close) tuples with
/// auto-incrementing 5m timestamps starting at `base` (RFC 3339).
pub fn make_candles_at(base: &str, data: &[(f64, f64, f64, f64)]) -> CandleSeries {
    let base = DateTime::parse_from_rfc3339(base)
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

/// A single 4h anchor candle opening at `start` (RFC 3339).
pub fn anchor_candle(start: &str, high: f64, low: f64) -> CandleSeries {
    let timestamp = DateTime::parse_from_rfc3339(start)
        .unwrap()
        .with_timezone(&Utc);
    CandleSeries::new(vec![Candle {
        timestamp,
        open: (high + low) / 2.0,
        high,
        low,
        close: (high + low) / 2.0,
        volume: 1000.0,
    }])
}
