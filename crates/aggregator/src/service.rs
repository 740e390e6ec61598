//! Aggregation service, the single entry point for consumers.
//!
//! Composes the provider registry, the notification store and the poll
//! scheduler. A process normally uses the shared instance from
//! [`AggregationService::shared`]; tests and embedders can build independent
//! instances with [`AggregationService::new`].
//!
//! Lifecycle: `Uninitialized → Running → Stopped`. The service starts running
//! on the first provider registration, store write or fetch. `stop()` is
//! terminal: a stopped service refuses new providers, fetches and direct
//! submissions, but its notifications stay readable. A fresh instance is
//! needed to start again (see [`AggregationService::reset_shared`]).

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;

use herald_common::config::AppConfig;
use herald_common::error::AppError;
use herald_common::sources::SourceDescriptor;
use herald_common::types::Notification;
use herald_providers::NotificationProvider;

use crate::factory::ProviderFactory;
use crate::registry::{ProviderEntry, ProviderRegistry};
use crate::scheduler::{FetchSummary, PollOutcome, PollScheduler};
use crate::store::{ListOrder, NotificationStore, StoreEvent};

/// Lifecycle state of an [`AggregationService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Uninitialized,
    Running,
    Stopped,
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceState::Uninitialized => write!(f, "uninitialized"),
            ServiceState::Running => write!(f, "running"),
            ServiceState::Stopped => write!(f, "stopped"),
        }
    }
}

static SHARED: Mutex<Option<Arc<AggregationService>>> = Mutex::new(None);

fn shared_slot() -> MutexGuard<'static, Option<Arc<AggregationService>>> {
    SHARED.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Process-wide notification aggregator.
pub struct AggregationService {
    store: Arc<NotificationStore>,
    registry: Arc<ProviderRegistry>,
    scheduler: PollScheduler,
    state: Mutex<ServiceState>,
}

impl AggregationService {
    pub fn new(config: AppConfig) -> Self {
        let store = Arc::new(NotificationStore::with_event_capacity(config.event_capacity));
        let registry = Arc::new(ProviderRegistry::new());
        let scheduler = PollScheduler::new(Arc::clone(&store), Arc::clone(&registry), config);

        Self {
            store,
            registry,
            scheduler,
            state: Mutex::new(ServiceState::Uninitialized),
        }
    }

    /// The shared instance, created with default configuration on first use.
    pub fn shared() -> Arc<Self> {
        Self::shared_with(AppConfig::default())
    }

    /// The shared instance, created with `config` if it does not exist yet.
    ///
    /// `config` is ignored when an instance already exists.
    pub fn shared_with(config: AppConfig) -> Arc<Self> {
        let mut slot = shared_slot();
        let service = slot.get_or_insert_with(|| {
            tracing::debug!("Creating shared aggregation service");
            Arc::new(Self::new(config))
        });
        Arc::clone(service)
    }

    /// Stop and discard the shared instance. The next `shared()` builds a new one.
    pub async fn reset_shared() {
        let previous = shared_slot().take();
        if let Some(service) = previous {
            service.stop().await;
        }
    }

    pub fn state(&self) -> ServiceState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == ServiceState::Stopped
    }

    /// Move `Uninitialized` to `Running`. Returns `false` once stopped.
    fn activate(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match *state {
            ServiceState::Uninitialized => {
                *state = ServiceState::Running;
                tracing::info!("Aggregation service running");
                true
            }
            ServiceState::Running => true,
            ServiceState::Stopped => false,
        }
    }

    // ------------------------------------------------------------------
    // Providers
    // ------------------------------------------------------------------

    /// Register a provider and start polling it if enabled.
    pub async fn register_provider(
        &self,
        provider: Arc<dyn NotificationProvider>,
    ) -> Result<(), AppError> {
        self.register_with(None, provider, None, None).await
    }

    /// Register a provider that must report `expected_id`.
    pub async fn register_provider_as(
        &self,
        expected_id: &str,
        provider: Arc<dyn NotificationProvider>,
    ) -> Result<(), AppError> {
        self.register_with(Some(expected_id), provider, None, None)
            .await
    }

    async fn register_with(
        &self,
        expected_id: Option<&str>,
        provider: Arc<dyn NotificationProvider>,
        enabled: Option<bool>,
        poll_interval: Option<Duration>,
    ) -> Result<(), AppError> {
        if self.is_stopped() {
            return Err(AppError::Stopped);
        }

        let id = provider.id().to_string();
        match expected_id {
            Some(expected) => self.registry.register_as(expected, provider).await?,
            None => self.registry.register(provider).await?,
        }

        // A rejected registration leaves the state untouched. stop() may also
        // have run while initialize() was awaited.
        if !self.activate() {
            self.registry.unregister(&id).await;
            return Err(AppError::Stopped);
        }

        if let Some(enabled) = enabled {
            self.registry.set_enabled(&id, enabled);
        }
        if let Some(interval) = poll_interval {
            self.registry.set_poll_interval(&id, interval);
        }

        self.scheduler.schedule(&id);
        Ok(())
    }

    /// Stop polling a provider, shut it down and forget it.
    pub async fn unregister_provider(&self, id: &str) -> bool {
        // Registry first: a concurrent schedule() re-checks it after
        // inserting its timer.
        let removed = self.registry.unregister(id).await;
        self.scheduler.unschedule(id);
        removed
    }

    pub fn get_provider(&self, id: &str) -> Option<ProviderEntry> {
        self.registry.get(id)
    }

    pub fn providers(&self) -> Vec<ProviderEntry> {
        self.registry.list()
    }

    pub fn is_provider_scheduled(&self, id: &str) -> bool {
        self.scheduler.is_scheduled(id)
    }

    /// Enable or disable polling for a provider without unregistering it.
    ///
    /// Re-enabling starts from a fresh interval.
    pub fn set_provider_enabled(&self, id: &str, enabled: bool) -> bool {
        if !self.registry.set_enabled(id, enabled) {
            return false;
        }
        if enabled {
            self.scheduler.schedule(id);
        } else {
            self.scheduler.unschedule(id);
        }
        true
    }

    /// Change a provider's poll interval. Only its own timer is restarted.
    pub fn set_provider_poll_interval(&self, id: &str, interval: Duration) -> bool {
        if !self.registry.set_poll_interval(id, interval) {
            return false;
        }
        self.scheduler.reschedule(id);
        true
    }

    /// Build and register a provider for every descriptor `factory` understands.
    ///
    /// Descriptor `enabled` and `poll_interval_ms` override the provider's own
    /// defaults. Descriptors that fail to build or register are logged and
    /// skipped. Returns how many providers were registered.
    pub async fn load_sources(
        &self,
        sources: &[SourceDescriptor],
        factory: &dyn ProviderFactory,
    ) -> Result<usize, AppError> {
        if self.is_stopped() {
            return Err(AppError::Stopped);
        }

        let mut registered = 0;
        for source in sources {
            let provider = match factory.build(source) {
                Ok(provider) => provider,
                Err(e) => {
                    tracing::warn!(
                        source_id = %source.id,
                        kind = %source.kind,
                        error = %e,
                        "Skipping source that could not be built"
                    );
                    continue;
                }
            };

            let interval = source.poll_interval_ms.map(Duration::from_millis);
            match self
                .register_with(Some(&source.id), provider, Some(source.enabled), interval)
                .await
            {
                Ok(()) => registered += 1,
                Err(AppError::Stopped) => return Err(AppError::Stopped),
                Err(e) => {
                    tracing::warn!(source_id = %source.id, error = %e, "Skipping source");
                }
            }
        }

        tracing::info!(registered, total = sources.len(), "Sources loaded");
        Ok(registered)
    }

    // ------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------

    /// Submit a notification directly. Returns `true` if it was new.
    pub fn add_notification(&self, notification: Notification) -> bool {
        if !self.activate() {
            tracing::warn!(id = %notification.id, "Ignoring notification submitted after stop");
            return false;
        }
        self.store.add(notification)
    }

    pub fn get_notifications(&self, unread_only: bool) -> Vec<Notification> {
        self.store.list(unread_only)
    }

    pub fn get_notifications_sorted(&self, unread_only: bool, order: ListOrder) -> Vec<Notification> {
        self.store.list_sorted(unread_only, order)
    }

    pub fn get_notification(&self, id: &str) -> Option<Notification> {
        self.store.get(id)
    }

    pub fn mark_as_read(&self, id: &str) -> bool {
        self.store.mark_read(id)
    }

    pub fn mark_all_as_read(&self) -> usize {
        self.store.mark_all_read()
    }

    pub fn remove_notification(&self, id: &str) -> bool {
        self.store.remove(id)
    }

    pub fn update_metadata(&self, id: &str, metadata: BTreeMap<String, String>) -> bool {
        self.store.update_metadata(id, metadata)
    }

    pub fn clear_notifications(&self) -> usize {
        self.store.clear()
    }

    pub fn get_total_count(&self) -> usize {
        self.store.total_count()
    }

    pub fn get_unread_count(&self) -> usize {
        self.store.unread_count()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.store.subscribe()
    }

    // ------------------------------------------------------------------
    // Fetching & lifecycle
    // ------------------------------------------------------------------

    /// Poll every enabled provider once and wait for all of them.
    ///
    /// Returns an empty summary once the service is stopped.
    pub async fn fetch_from_providers(&self) -> FetchSummary {
        self.activate();
        self.scheduler.fetch_all().await
    }

    /// Poll one provider immediately. `None` if unknown or stopped.
    pub async fn fetch_from_provider(&self, id: &str) -> Option<PollOutcome> {
        self.activate();
        self.scheduler.fetch_one(id).await
    }

    /// Cancel every poll timer and shut down every provider.
    ///
    /// Idempotent; calling it on a never-started or stopped service is a no-op
    /// beyond the state change.
    pub async fn stop(&self) {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state == ServiceState::Stopped {
                tracing::debug!("Aggregation service already stopped");
                return;
            }
            *state = ServiceState::Stopped;
        }

        self.scheduler.shutdown();
        let providers = self.registry.shutdown_all().await;

        tracing::info!(
            providers,
            notifications = self.store.total_count(),
            "Aggregation service stopped"
        );
    }
}
