pub mod telegram;

pub use telegram::TelegramSender;

use anyhow::Result;
use std::time::Duration;
use tracing::{error, info};

use crate::config::Config;
use crate::models::{Signal, SignalStatus};
use crate::store::{SignalStore, SubscriberStore};

pub fn format_new_signal(sig: &Signal) -> String {
    format!(
        "🚨 *NEW SIGNAL* 🚨\n\n*{}* - *{}*\n\n\
         Entry: `{:.4}`\nStop Loss: `{:.4}`\nTake Profit: `{:.4}`",
        sig.symbol, sig.direction, sig.entry_price, sig.stop_loss, sig.take_profit
    )
}

pub fn format_closure(sig: &Signal) -> String {
    let (icon, outcome) = match sig.status {
        SignalStatus::TargetHit => ("✅", "TARGET HIT"),
        _ => ("❌", "STOPPED OUT"),
    };
    format!(
        "{icon} *POSITION CLOSED* {icon}\n\n*{}* - *{}*\n\nResult: *{}*",
        sig.symbol, sig.direction, outcome
    )
}

/// Polls the shared table and fans new-signal / closure announcements out
/// to every active subscriber. Owns its store handle; writes nothing but
/// the two notification flags.
pub struct Notifier<S> {
    store: S,
    sender: TelegramSender,
    interval: Duration,
}

impl<S: SignalStore + SubscriberStore> Notifier<S> {
    pub fn new(store: S, cfg: &Config) -> Self {
        Self {
            store,
            sender: TelegramSender::new(&cfg.telegram_token),
            interval: Duration::from_secs(cfg.notify_interval_secs),
        }
    }

    pub async fn run(mut self) {
        info!("Notifier running (every {:?})", self.interval);
        loop {
            if let Err(e) = self.pass().await {
                error!("Notifier pass failed: {:#}", e);
            }
            tokio::time::sleep(self.interval).await;
        }
    }

    /// One delivery pass. Per-send failures are logged and skipped; the
    /// signal's flag advances regardless.
    pub async fn pass(&mut self) -> Result<()> {
        let subscribers = self.store.active_subscribers()?;
        if subscribers.is_empty() {
            return Ok(());
        }

        for sig in self.store.unnotified_signals()? {
            let text = format_new_signal(&sig);
            for sub in &subscribers {
                if let Err(e) = self.sender.send_message(sub.chat_id, &text).await {
                    error!("Could not message chat {}: {}", sub.chat_id, e);
                }
            }
            self.store.mark_notified(sig.id)?;
            info!("[{}] new-signal notification done (#{})", sig.symbol, sig.id);
        }

        for sig in self.store.unnotified_closures()? {
            let text = format_closure(&sig);
            for sub in &subscribers {
                if let Err(e) = self.sender.send_message(sub.chat_id, &text).await {
                    error!("Could not message chat {}: {}", sub.chat_id, e);
                }
            }
            self.store.mark_closure_notified(sig.id)?;
            info!("[{}] closure notification done (#{})", sig.symbol, sig.id);
        }

        Ok(())
    }
}
