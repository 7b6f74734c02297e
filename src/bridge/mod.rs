//! Bridge orchestration.
//!
//! Owns the two listener tasks and the periodic store cleanup, all under
//! one shared shutdown signal. Cancellation is cooperative: listeners
//! stop dequeuing new events; in-flight sends finish.

pub mod commands;
pub mod listener;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::platform::{MaxClient, TelegramClient};
use crate::store::Store;

pub use commands::HelpLinks;
pub use listener::Listener;

/// How often expired correlations and pending keys are purged.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// The bridge: both platform clients, the store, and lifecycle.
pub struct Bridge {
    telegram: Arc<TelegramClient>,
    max: Arc<MaxClient>,
    store: Arc<Store>,
    help: HelpLinks,
    shutdown: watch::Receiver<bool>,
}

impl Bridge {
    pub fn new(
        telegram: Arc<TelegramClient>,
        max: Arc<MaxClient>,
        store: Arc<Store>,
        help: HelpLinks,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            telegram,
            max,
            store,
            help,
            shutdown,
        }
    }

    /// Run both listeners and the cleanup ticker until shutdown.
    pub async fn run(self) {
        let tg_to_max = Listener::new(
            self.telegram.clone(),
            self.max.clone(),
            self.store.clone(),
            self.help.clone(),
            self.shutdown.clone(),
        );
        let max_to_tg = Listener::new(
            self.max,
            self.telegram,
            self.store.clone(),
            self.help,
            self.shutdown.clone(),
        );

        let cleanup = tokio::spawn(cleanup_task(self.store, self.shutdown));
        let tg_task = tokio::spawn(tg_to_max.run());
        let max_task = tokio::spawn(max_to_tg.run());

        let _ = tokio::join!(tg_task, max_task, cleanup);
        info!("bridge stopped");
    }
}

/// Periodic retention GC under the shutdown signal.
async fn cleanup_task(store: Arc<Store>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(CLEANUP_INTERVAL);
    // The first tick fires immediately; skip it
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                debug!("running store cleanup");
                store.clean_old_messages();
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    info!("cleanup task stopped");
}
