use anyhow::{bail, Context, Result};
use chrono_tz::Tz;

#[derive(Debug, Clone)]
pub struct Config {
    // Market
    pub symbols: Vec<String>,
    pub candle_lookback: usize,

    // Session
    pub timezone: Tz,
    pub window_start_hour: u32,
    pub window_end_hour: u32,

    // Loop pacing
    pub scan_interval_secs: u64,
    pub notify_interval_secs: u64,
    pub error_backoff_secs: u64,

    // Store
    pub db_path: String,

    // Telegram
    pub telegram_token: String,

    // Logging
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let env = |key: &str, default: &str| -> String {
            std::env::var(key).unwrap_or_else(|_| default.to_string())
        };

        let symbols: Vec<String> = env("SYMBOLS", "BTCUSDT,ETHUSDT")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if symbols.is_empty() {
            bail!("SYMBOLS is empty — nothing to watch");
        }

        let tz_name = env("REFERENCE_TZ", "America/New_York");
        let timezone: Tz = tz_name
            .parse()
            .ok()
            .with_context(|| format!("Unknown REFERENCE_TZ: {}", tz_name))?;

        let telegram_token = env("TELEGRAM_BOT_TOKEN", "");
        if telegram_token.is_empty() || telegram_token.contains("YOUR") {
            bail!("TELEGRAM_BOT_TOKEN is missing or still a placeholder");
        }

        Ok(Config {
            symbols,
            candle_lookback: env("CANDLE_LOOKBACK", "10").parse().unwrap_or(10),
            timezone,
            window_start_hour: env("WINDOW_START_HOUR", "4").parse().unwrap_or(4),
            window_end_hour: env("WINDOW_END_HOUR", "17").parse().unwrap_or(17),
            scan_interval_secs: env("SCAN_INTERVAL", "60").parse().unwrap_or(60),
            notify_interval_secs: env("NOTIFY_INTERVAL", "20").parse().unwrap_or(20),
            error_backoff_secs: env("ERROR_BACKOFF", "60").parse().unwrap_or(60),
            db_path: env("DB_PATH", "data/signals.db"),
            telegram_token,
            log_level: env("LOG_LEVEL", "INFO"),
        })
    }
}
