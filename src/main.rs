use anyhow::Result;
use tracing_subscriber::{fmt, EnvFilter};

use orb_signal_bot::config::Config;
use orb_signal_bot::engine::SignalEngine;
use orb_signal_bot::exchange::BinanceClient;
use orb_signal_bot::notify::Notifier;
use orb_signal_bot::store::SqliteSignalStore;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .init();

    // Each long-running task owns its store connection; they coordinate
    // only through the shared table.
    let engine_store = SqliteSignalStore::open(&cfg.db_path)?;
    let notifier_store = SqliteSignalStore::open(&cfg.db_path)?;

    let notifier = Notifier::new(notifier_store, &cfg);
    tokio::spawn(notifier.run());

    let market = Box::new(BinanceClient::new());
    let mut engine = SignalEngine::new(cfg, market, Box::new(engine_store));
    engine.run().await
}
