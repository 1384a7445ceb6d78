pub mod binance;

pub use binance::BinanceClient;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{CandleSeries, Timeframe};

#[async_trait]
pub trait MarketData: Send + Sync {
    /// Fetch up to `limit` candles of `tf`, oldest-first, optionally
    /// starting at `since`.
    async fn fetch_candles(
        &mut self,
        symbol: &str,
        tf: Timeframe,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<CandleSeries>;

    /// Latest traded price for the symbol.
    async fn latest_price(&mut self, symbol: &str) -> Result<f64>;
}
