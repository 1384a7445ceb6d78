use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::core::breakout::{self, BreakoutBook, DetectorEvent, SignalCandidate};
use crate::core::monitor;
use crate::core::range;
use crate::core::session::TradingWindow;
use crate::exchange::MarketData;
use crate::models::{Closure, NewSignal, Signal, SignalStatus, Timeframe};
use crate::store::{SignalStore, StoreError};

/// The scan loop: resolves open signals, then hunts for new breakouts on
/// every symbol without one. Sole writer of signal status in the shared
/// store.
pub struct SignalEngine {
    config: Config,
    market: Box<dyn MarketData>,
    store: Box<dyn SignalStore>,
    window: TradingWindow,
    book: BreakoutBook,
    /// When set, used instead of Utc::now() (tests)
    pub sim_time: Option<DateTime<Utc>>,
}

impl SignalEngine {
    pub fn new(config: Config, market: Box<dyn MarketData>, store: Box<dyn SignalStore>) -> Self {
        info!("{}", "=".repeat(60));
        info!("Opening-range fade bot starting up");
        info!("Symbols: {}", config.symbols.join(", "));
        info!(
            "Trading window: {:02}:00-{:02}:00 {}",
            config.window_start_hour, config.window_end_hour, config.timezone
        );
        info!("Scan interval: {}s", config.scan_interval_secs);
        info!("{}", "=".repeat(60));

        Self {
            window: TradingWindow::from_config(&config),
            book: BreakoutBook::new(),
            config,
            market,
            store,
            sim_time: None,
        }
    }

    pub fn book(&self) -> &BreakoutBook {
        &self.book
    }

    fn now(&self) -> DateTime<Utc> {
        self.sim_time.unwrap_or_else(Utc::now)
    }

    fn local_now(&self) -> DateTime<Tz> {
        self.now().with_timezone(&self.config.timezone)
    }

    pub async fn run(&mut self) -> Result<()> {
        info!("Engine is now running. Press Ctrl+C to stop.");
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutting down...");
                    return Ok(());
                }
                _ = self.tick() => {}
            }
        }
    }

    async fn tick(&mut self) {
        match self.run_cycle().await {
            Ok(()) => {
                tokio::time::sleep(Duration::from_secs(self.config.scan_interval_secs)).await;
            }
            Err(e) => {
                error!("Scan cycle failed: {:#}", e);
                tokio::time::sleep(Duration::from_secs(self.config.error_backoff_secs)).await;
            }
        }
    }

    /// One full pass: resolve every open signal, then scan the symbols
    /// that had none at cycle start. A symbol whose signal closed during
    /// this pass is picked up again next cycle.
    pub async fn run_cycle(&mut self) -> Result<()> {
        let local_now = self.local_now();
        let in_window = self.window.contains(local_now);

        let active = self
            .store
            .signals_by_status(SignalStatus::Active)
            .context("loading active signals")?;
        let busy: HashSet<&str> = active.iter().map(|s| s.symbol.as_str()).collect();

        for signal in &active {
            self.resolve_position(signal, in_window).await;
        }

        if in_window {
            let idle: Vec<String> = self
                .config
                .symbols
                .iter()
                .filter(|s| !busy.contains(s.as_str()))
                .cloned()
                .collect();
            for symbol in idle {
                self.scan_symbol(&symbol, local_now).await;
            }
        }

        Ok(())
    }

    /// Forced closure outside the trading window wins over stop/target;
    /// inside it, the latest price decides. A price-fetch failure skips
    /// this symbol for the cycle.
    async fn resolve_position(&mut self, signal: &Signal, in_window: bool) {
        if !in_window {
            info!(
                "[{}] Trading window over, force-closing signal #{}",
                signal.symbol, signal.id
            );
            match self.store.close_signal(signal.id, &Closure::timeout(self.now())) {
                Ok(true) => {}
                Ok(false) => debug!("[{}] signal #{} already terminal", signal.symbol, signal.id),
                Err(e) => error!(
                    "[{}] could not close signal #{}: {}",
                    signal.symbol, signal.id, e
                ),
            }
            return;
        }

        let price = match self.market.latest_price(&signal.symbol).await {
            Ok(p) => p,
            Err(e) => {
                warn!("[{}] price check failed: {}", signal.symbol, e);
                return;
            }
        };

        if let Some(closure) = monitor::evaluate(signal, price, self.now()) {
            match self.store.close_signal(signal.id, &closure) {
                Ok(true) => info!(
                    "[{}] POSITION CLOSED #{}: {} @ {:.4} ({:+.2}%)",
                    signal.symbol,
                    signal.id,
                    closure.status,
                    price,
                    closure.pnl_percent.unwrap_or(0.0)
                ),
                Ok(false) => debug!("[{}] signal #{} already terminal", signal.symbol, signal.id),
                Err(e) => error!(
                    "[{}] could not close signal #{}: {}",
                    signal.symbol, signal.id, e
                ),
            }
        }
    }

    /// Breakout scan for one idle symbol: opening range, latest closed
    /// 5m bar, detector, then persist whatever fired.
    async fn scan_symbol(&mut self, symbol: &str, local_now: DateTime<Tz>) {
        let range = match range::opening_range(self.market.as_mut(), symbol, local_now).await {
            Some(r) => r,
            None => return,
        };

        let series = match self
            .market
            .fetch_candles(symbol, Timeframe::M5, None, self.config.candle_lookback)
            .await
        {
            Ok(s) => s,
            Err(e) => {
                warn!("[{}] candle fetch failed: {}", symbol, e);
                return;
            }
        };
        let bar = match series.last_closed() {
            Some(b) => b.clone(),
            None => return,
        };

        for event in breakout::evaluate(self.book.state_mut(symbol), &bar, &range) {
            match event {
                DetectorEvent::Armed { kind, price } => {
                    info!("[{}] {} at {:.4}", symbol, kind, price);
                    if let Err(e) = self.store.record_alert(symbol, kind, price, self.now()) {
                        warn!("[{}] could not record alert: {}", symbol, e);
                    }
                }
                DetectorEvent::Fired(candidate) => self.open_signal(symbol, candidate),
            }
        }
    }

    fn open_signal(&mut self, symbol: &str, candidate: SignalCandidate) {
        match self.store.active_signal_for_symbol(symbol) {
            Ok(Some(existing)) => {
                warn!(
                    "[{}] signal #{} still active, dropping candidate",
                    symbol, existing.id
                );
                return;
            }
            Ok(None) => {}
            Err(e) => {
                error!("[{}] active-signal lookup failed: {}", symbol, e);
                return;
            }
        }

        let new_signal = NewSignal {
            symbol: symbol.to_string(),
            direction: candidate.direction,
            entry_price: candidate.entry_price,
            stop_loss: candidate.stop_loss,
            take_profit: candidate.take_profit,
            created_at: self.now(),
        };

        match self.store.insert_signal(&new_signal) {
            Ok(id) => {
                info!("{}", "=".repeat(60));
                info!("NEW SIGNAL #{} — {} {}", id, symbol, new_signal.direction);
                info!("  Entry: {:.4}", new_signal.entry_price);
                info!("  Stop Loss: {:.4}", new_signal.stop_loss);
                info!("  Take Profit: {:.4}", new_signal.take_profit);
                info!("{}", "=".repeat(60));
            }
            Err(StoreError::ActiveSignalExists(_)) => {
                warn!("[{}] store refused a second active signal", symbol);
            }
            Err(e) => error!("[{}] could not insert signal: {}", symbol, e),
        }
    }
}
