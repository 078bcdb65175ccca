// Periodic liveness sweep: silent clients are flipped to disconnected and zeroed

use std::sync::Arc;

use tokio::time::{Duration, MissedTickBehavior, interval};

use super::ClientRegistry;
use super::store::ClientStore;

pub struct SweepConfig {
    pub interval: Duration,
    pub stale_timeout: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            stale_timeout: Duration::from_secs(30),
        }
    }
}

/// Spawns the sweep loop. Records are persisted after each sweep. Stops when `shutdown_rx` fires.
pub fn spawn(
    registry: Arc<ClientRegistry>,
    store: Arc<ClientStore>,
    config: SweepConfig,
    mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    let timeout = chrono::Duration::from_std(config.stale_timeout)
        .unwrap_or_else(|_| chrono::Duration::seconds(30));
    tokio::spawn(async move {
        let mut tick = interval(config.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // first tick fires immediately; nothing can be stale at startup
        tick.tick().await;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let flipped = registry.sweep_stale(chrono::Utc::now(), timeout).await;
                    for id in &flipped {
                        tracing::info!(client_id = %id, "client timed out; marked disconnected");
                    }
                    if let Err(e) = store.persist(&registry).await {
                        tracing::warn!(error = %e, operation = "save_clients", "persisting after sweep failed");
                    }
                }
                _ = &mut shutdown_rx => {
                    tracing::debug!("sweep shutting down");
                    break;
                }
            }
        }
    })
}
