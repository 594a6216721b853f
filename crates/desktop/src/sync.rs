//! Host reachability probing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Notify, mpsc};
use tokio::time::MissedTickBehavior;

use crate::config::SyncConfig;
use crate::offline::ConnectivityEvent;
use crate::remote::RemoteError;

/// Point-in-time reachability query.
#[async_trait]
pub trait ConnectivitySource: Send + Sync {
    async fn is_reachable(&self) -> bool;
}

/// Checks connectivity by hitting the health endpoint.
#[derive(Debug, Clone)]
pub struct HttpHealthProbe {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl HttpHealthProbe {
    pub fn new(config: &SyncConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        Ok(Self {
            client,
            url: config.health_url(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl ConnectivitySource for HttpHealthProbe {
    async fn is_reachable(&self) -> bool {
        match self
            .client
            .get(&self.url)
            .header("apikey", &self.api_key)
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(err) => {
                tracing::debug!(error = %err, url = %self.url, "health probe failed");
                false
            }
        }
    }
}

/// Poll `source` every `interval` and emit an event whenever reachability
/// differs from the last known value (starting from `initial`).
///
/// Returns when `shutdown` fires or the receiving side is dropped.
pub async fn watch_connectivity<S>(
    source: &S,
    initial: bool,
    interval: Duration,
    tx: mpsc::Sender<ConnectivityEvent>,
    shutdown: Arc<Notify>,
) where
    S: ConnectivitySource + ?Sized,
{
    let mut last = initial;
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately; `initial` already covers it.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                tracing::debug!("connectivity watcher received shutdown signal");
                break;
            }
            _ = ticker.tick() => {
                let reachable = source.is_reachable().await;
                if reachable == last {
                    continue;
                }
                last = reachable;

                if tx.send(ConnectivityEvent::from(reachable)).await.is_err() {
                    tracing::debug!("connectivity receiver dropped");
                    break;
                }
            }
        }
    }
}
