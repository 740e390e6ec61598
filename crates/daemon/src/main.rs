mod factory;

use std::future::Future;

use herald_aggregator::{AggregationService, StoreEvent};
use herald_common::config::AppConfig;
use herald_common::sources;

use crate::factory::BuiltinProviderFactory;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "herald_daemon=info,herald_aggregator=info".into()),
        )
        .json()
        .init();

    tracing::info!("Herald daemon starting...");

    // Load configuration
    let config = AppConfig::from_env()?;
    let service = AggregationService::shared_with(config.clone());

    // Register providers from the persisted source list
    match &config.sources_path {
        Some(path) => {
            let descriptors = sources::load_sources(path)?;
            service
                .load_sources(&descriptors, &BuiltinProviderFactory)
                .await?;
        }
        None => tracing::warn!("HERALD_SOURCES_PATH not set, no providers registered"),
    }

    // Initial refresh so consumers start with data
    let summary = service.fetch_from_providers().await;
    tracing::info!(
        inserted = summary.inserted,
        failed = summary.failed,
        "Initial fetch complete"
    );

    // Run until Ctrl+C, logging store changes as they happen
    watch(&service, tokio::signal::ctrl_c()).await;

    AggregationService::reset_shared().await;
    tracing::info!("Herald daemon stopped.");
    Ok(())
}

/// Log store events until `shutdown` resolves or the event channel closes.
async fn watch<F: Future>(service: &AggregationService, shutdown: F) {
    let mut events = service.subscribe();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(StoreEvent::Added(id)) => {
                    if let Some(n) = service.get_notification(&id) {
                        tracing::info!(
                            id = %n.id,
                            source = %n.source,
                            priority = %n.priority,
                            category = %n.category,
                            title = %n.title,
                            unread = service.get_unread_count(),
                            "New notification"
                        );
                    }
                }
                Ok(other) => tracing::debug!(event = ?other, "Store changed"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event listener lagged behind");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            _ = &mut shutdown => {
                tracing::info!("Received shutdown signal, stopping gracefully...");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use herald_common::types::Notification;
    use tokio::sync::oneshot;

    use super::*;

    #[tokio::test]
    async fn test_watch_stops_on_signal_sent_between_events() {
        let service = Arc::new(AggregationService::new(AppConfig::default()));
        let (signal, shutdown) = oneshot::channel::<()>();

        let watcher = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { watch(&service, shutdown).await })
        };
        tokio::task::yield_now().await;

        for i in 0..20 {
            service.add_notification(Notification::new(format!("n{i}"), "t", "m"));
        }
        signal.send(()).unwrap();
        for i in 20..40 {
            service.add_notification(Notification::new(format!("n{i}"), "t", "m"));
        }

        tokio::time::timeout(Duration::from_secs(1), watcher)
            .await
            .expect("watch should return after the shutdown signal")
            .unwrap();
    }

    #[tokio::test]
    async fn test_watch_stops_on_signal_already_sent() {
        let service = AggregationService::new(AppConfig::default());
        let (signal, shutdown) = oneshot::channel::<()>();
        signal.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(1), watch(&service, shutdown))
            .await
            .unwrap();
    }
}
