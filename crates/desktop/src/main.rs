//! Headless sync service entry point.

use std::sync::Arc;

use anyhow::Context;
use disasterconnect_desktop::storage::default_db_path;
use disasterconnect_desktop::{
    BusSink, ConnectivitySource, HttpHealthProbe, MutationQueue, OfflineClient, RestRemoteStore,
    SqliteKeyValueStore, SyncConfig, watch_connectivity,
};
use disasterconnect_events::{ClientEvent, EventBus, InMemoryEventBus, Severity};
use disasterconnect_observability::LogFormat;
use tokio::sync::{Notify, mpsc};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let format = std::env::var("DISASTERCONNECT_LOG_FORMAT")
        .ok()
        .and_then(|v| v.parse::<LogFormat>().ok())
        .unwrap_or_default();
    disasterconnect_observability::init_with(format);

    let config = SyncConfig::from_env().context("invalid configuration")?;

    let db_path = match &config.database_path {
        Some(path) => path.clone(),
        None => default_db_path().context("resolving database path")?,
    };
    let store = SqliteKeyValueStore::open(&db_path)
        .await
        .with_context(|| format!("opening offline store at {}", db_path.display()))?;
    tracing::info!(path = %db_path.display(), "offline store opened");

    let queue = Arc::new(
        MutationQueue::load(Arc::new(store.clone()))
            .await
            .context("loading offline queue")?,
    );

    let bus = Arc::new(InMemoryEventBus::<ClientEvent>::new());
    let sink = Arc::new(BusSink::new(bus.clone()));
    let remote = Arc::new(RestRemoteStore::new(&config).context("building REST client")?);

    let client = OfflineClient::new(queue, remote, sink.clone(), sink, config.max_retries).await;

    // Surface notifications in the log until a UI subscribes.
    let notifications = bus.subscribe();
    std::thread::spawn(move || {
        while let Ok(event) = notifications.recv() {
            match event {
                ClientEvent::Notification(n) => match n.severity {
                    Severity::Success => tracing::info!(message = %n.message, "notification"),
                    Severity::Warning => tracing::warn!(message = %n.message, "notification"),
                    Severity::Error => tracing::error!(message = %n.message, "notification"),
                },
                ClientEvent::InvalidateAll => tracing::debug!("cache invalidated"),
            }
        }
    });

    let probe = HttpHealthProbe::new(&config).context("building health probe")?;
    let initially_online = probe.is_reachable().await;

    let monitor = client.monitor();
    monitor.activate(initially_online);

    let (tx, rx) = mpsc::channel(16);
    let monitor_task = tokio::spawn(monitor.run(rx));

    let watcher_shutdown = Arc::new(Notify::new());
    let watcher_task = tokio::spawn({
        let shutdown = watcher_shutdown.clone();
        let interval = config.probe_interval;
        async move { watch_connectivity(&probe, initially_online, interval, tx, shutdown).await }
    });

    let worker = client.worker(config.retry_interval);
    let worker_shutdown = worker.shutdown_handle();
    let worker_task = worker.start();

    tracing::info!(
        api_url = %config.api_url,
        pending = client.pending().await.len(),
        "sync service running; press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    tracing::info!("shutting down");

    watcher_shutdown.notify_one();
    worker_shutdown.notify_one();

    // The watcher owns the event sender, so the monitor ends once it does.
    watcher_task.await.context("connectivity watcher panicked")?;
    monitor_task.await.context("connectivity monitor panicked")?;
    worker_task.await.context("sync worker panicked")?;

    store.close().await;
    Ok(())
}
