use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use tracing::{debug, warn};

use crate::exchange::MarketData;
use crate::models::Timeframe;

/// Breakout boundaries for one session day: the high and low of the 4h
/// candle opening at 00:00 in the reference timezone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpeningRange {
    pub upper_bound: f64,
    pub lower_bound: f64,
}

/// Fetch the session anchor candle for `at`'s calendar day and derive the
/// opening range from it.
///
/// The returned candle's own start, converted back to the reference
/// timezone, must land on the same date as `at` with hour zero; anything
/// else (exchange gap, off-grid data) is treated as unavailable rather
/// than silently using a misaligned candle. Data-source errors are logged
/// and also surface as `None`.
pub async fn opening_range(
    market: &mut dyn MarketData,
    symbol: &str,
    at: DateTime<Tz>,
) -> Option<OpeningRange> {
    let tz = at.timezone();
    let session_open = tz
        .with_ymd_and_hms(at.year(), at.month(), at.day(), 0, 0, 0)
        .earliest()?;

    let candles = match market
        .fetch_candles(
            symbol,
            Timeframe::H4,
            Some(session_open.with_timezone(&Utc)),
            1,
        )
        .await
    {
        Ok(c) => c,
        Err(e) => {
            warn!("[{}] opening range unavailable: {}", symbol, e);
            return None;
        }
    };

    let candle = candles.first()?;
    let start_local = candle.timestamp.with_timezone(&tz);
    if start_local.date_naive() != at.date_naive() || start_local.hour() != 0 {
        debug!(
            "[{}] anchor candle misaligned (starts {}), skipping",
            symbol, start_local
        );
        return None;
    }

    Some(OpeningRange {
        upper_bound: candle.high,
        lower_bound: candle.low,
    })
}
