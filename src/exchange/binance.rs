use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::exchange::MarketData;
use crate::models::{Candle, CandleSeries, Timeframe};

const BASE_URL: &str = "https://api.binance.com";
const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(250);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct TickerResponse {
    price: String,
}

/// Public Binance REST market-data client. No authentication: the kline
/// and ticker endpoints are open.
pub struct BinanceClient {
    client: Client,
    last_request: Option<Instant>,
    cache: HashMap<String, (Instant, CandleSeries)>,
    cache_ttl: Duration,
}

impl BinanceClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            last_request: None,
            cache: HashMap::new(),
            cache_ttl: Duration::from_secs(5),
        }
    }

    async fn rate_limit(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < MIN_REQUEST_INTERVAL {
                tokio::time::sleep(MIN_REQUEST_INTERVAL - elapsed).await;
            }
        }
        self.last_request = Some(Instant::now());
    }

    pub async fn fetch_candles(
        &mut self,
        symbol: &str,
        tf: Timeframe,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<CandleSeries> {
        let cache_key = format!(
            "{}_{}_{}_{}",
            symbol,
            tf,
            since.map(|t| t.timestamp_millis()).unwrap_or(-1),
            limit
        );
        if let Some((cached_at, series)) = self.cache.get(&cache_key) {
            if cached_at.elapsed() < self.cache_ttl {
                return Ok(series.clone());
            }
        }

        self.rate_limit().await;

        let mut query: Vec<(&str, String)> = vec![
            ("symbol", symbol.to_string()),
            ("interval", tf.as_str().to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(start) = since {
            query.push(("startTime", start.timestamp_millis().to_string()));
        }

        let resp = self
            .client
            .get(format!("{}/api/v3/klines", BASE_URL))
            .query(&query)
            .send()
            .await
            .context("Failed to fetch klines")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Binance API error {}: {}", status, body);
        }

        // Kline rows are heterogenous arrays:
        // [openTime, open, high, low, close, volume, closeTime, ...]
        let rows: Vec<Vec<serde_json::Value>> =
            resp.json().await.context("Failed to parse kline response")?;

        let parse_price = |row: &[serde_json::Value], idx: usize| -> Option<f64> {
            row.get(idx)?.as_str()?.parse().ok()
        };

        let mut candles: Vec<Candle> = rows
            .iter()
            .filter_map(|row| {
                let ts = row.first()?.as_i64()?;
                let timestamp = DateTime::from_timestamp_millis(ts)?;
                Some(Candle {
                    timestamp,
                    open: parse_price(row, 1)?,
                    high: parse_price(row, 2)?,
                    low: parse_price(row, 3)?,
                    close: parse_price(row, 4)?,
                    volume: parse_price(row, 5)?,
                })
            })
            .collect();

        candles.sort_by_key(|c| c.timestamp);

        let series = CandleSeries::new(candles);
        self.cache
            .insert(cache_key, (Instant::now(), series.clone()));

        Ok(series)
    }

    pub async fn latest_price(&mut self, symbol: &str) -> Result<f64> {
        self.rate_limit().await;

        let resp = self
            .client
            .get(format!("{}/api/v3/ticker/price", BASE_URL))
            .query(&[("symbol", symbol)])
            .send()
            .await
            .context("Failed to fetch ticker")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Binance ticker error {}: {}", status, body);
        }

        let data: TickerResponse = resp.json().await.context("Failed to parse ticker")?;
        data.price
            .parse::<f64>()
            .with_context(|| format!("Bad price in ticker response: {}", data.price))
    }
}

impl Default for BinanceClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketData for BinanceClient {
    async fn fetch_candles(
        &mut self,
        symbol: &str,
        tf: Timeframe,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<CandleSeries> {
        self.fetch_candles(symbol, tf, since, limit).await
    }

    async fn latest_price(&mut self, symbol: &str) -> Result<f64> {
        self.latest_price(symbol).await
    }
}
