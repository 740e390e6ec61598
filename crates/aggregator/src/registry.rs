//! Provider registry.
//!
//! Keeps the registered providers keyed by id, together with the
//! aggregator-side overrides (enabled flag, poll interval) and a running
//! status record per provider. Provider hooks (`initialize`, `shutdown`) are
//! always called with the registry lock released.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use herald_common::error::AppError;
use herald_providers::NotificationProvider;

/// Outcome history of a provider's poll cycles.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProviderStatus {
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    /// Notifications from this provider that the store accepted.
    pub total_inserted: u64,
}

/// A registered provider plus its aggregator-side settings.
#[derive(Clone)]
pub struct ProviderEntry {
    pub provider: Arc<dyn NotificationProvider>,
    /// Overrides `provider.is_enabled()` when set.
    pub enabled_override: Option<bool>,
    /// Overrides `provider.poll_interval_ms()` when set.
    pub poll_interval_override: Option<Duration>,
    pub status: ProviderStatus,
}

impl ProviderEntry {
    fn new(provider: Arc<dyn NotificationProvider>) -> Self {
        Self {
            provider,
            enabled_override: None,
            poll_interval_override: None,
            status: ProviderStatus::default(),
        }
    }

    pub fn id(&self) -> &str {
        self.provider.id()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled_override
            .unwrap_or_else(|| self.provider.is_enabled())
    }

    /// Requested poll interval in milliseconds, before clamping.
    pub fn requested_interval_ms(&self) -> u64 {
        self.poll_interval_override
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_else(|| self.provider.poll_interval_ms())
    }
}

impl std::fmt::Debug for ProviderEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderEntry")
            .field("id", &self.provider.id())
            .field("name", &self.provider.name())
            .field("enabled_override", &self.enabled_override)
            .field("poll_interval_override", &self.poll_interval_override)
            .field("status", &self.status)
            .finish()
    }
}

/// Registry of active providers.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, ProviderEntry>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, ProviderEntry>> {
        self.providers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, ProviderEntry>> {
        self.providers.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Initialize and register a provider.
    ///
    /// An existing provider with the same id is replaced and shut down.
    /// Nothing changes if the id is empty or `initialize()` fails.
    pub async fn register(&self, provider: Arc<dyn NotificationProvider>) -> Result<(), AppError> {
        let id = provider.id().to_string();
        if id.trim().is_empty() {
            return Err(AppError::Registration(
                "Provider id must not be empty".to_string(),
            ));
        }

        if let Err(e) = provider.initialize().await {
            tracing::warn!(provider_id = %id, error = %e, "Provider failed to initialize");
            return Err(AppError::Initialization {
                provider: id,
                reason: e.to_string(),
            });
        }

        let replaced = self.write().insert(id.clone(), ProviderEntry::new(provider));

        if let Some(old) = replaced {
            tracing::info!(provider_id = %id, "Replacing previously registered provider");
            old.provider.shutdown().await;
        }

        tracing::info!(provider_id = %id, "Provider registered");
        Ok(())
    }

    /// Register a provider only if it reports the id the caller expects.
    pub async fn register_as(
        &self,
        expected_id: &str,
        provider: Arc<dyn NotificationProvider>,
    ) -> Result<(), AppError> {
        if provider.id() != expected_id {
            return Err(AppError::Registration(format!(
                "Provider reports id '{}' but was registered as '{}'",
                provider.id(),
                expected_id
            )));
        }
        self.register(provider).await
    }

    /// Remove a provider and run its shutdown hook. Returns `true` if it existed.
    pub async fn unregister(&self, id: &str) -> bool {
        let removed = self.write().remove(id);
        match removed {
            Some(entry) => {
                entry.provider.shutdown().await;
                tracing::info!(provider_id = %id, "Provider unregistered");
                true
            }
            None => false,
        }
    }

    /// Remove every provider, running each shutdown hook.
    pub async fn shutdown_all(&self) -> usize {
        let drained: Vec<ProviderEntry> = self.write().drain().map(|(_, entry)| entry).collect();
        let count = drained.len();
        for entry in drained {
            entry.provider.shutdown().await;
            tracing::debug!(provider_id = %entry.id(), "Provider shut down");
        }
        count
    }

    pub fn get(&self, id: &str) -> Option<ProviderEntry> {
        self.read().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().contains_key(id)
    }

    /// Whether `id` is still registered to this exact provider instance.
    pub fn holds(&self, id: &str, provider: &Arc<dyn NotificationProvider>) -> bool {
        self.read()
            .get(id)
            .is_some_and(|entry| Arc::ptr_eq(&entry.provider, provider))
    }

    /// Snapshot of all entries, sorted by id.
    pub fn list(&self) -> Vec<ProviderEntry> {
        let mut entries: Vec<ProviderEntry> = self.read().values().cloned().collect();
        entries.sort_by(|a, b| a.id().cmp(b.id()));
        entries
    }

    /// Snapshot of the entries that should currently be polled.
    pub fn enabled(&self) -> Vec<ProviderEntry> {
        self.list().into_iter().filter(|e| e.is_enabled()).collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Override the enabled flag. Returns `false` if the provider is unknown.
    pub fn set_enabled(&self, id: &str, enabled: bool) -> bool {
        let provider = {
            let mut providers = self.write();
            let Some(entry) = providers.get_mut(id) else {
                return false;
            };
            entry.enabled_override = Some(enabled);
            Arc::clone(&entry.provider)
        };
        provider.set_enabled(enabled);
        true
    }

    /// Override the poll interval. Returns `false` if the provider is unknown.
    pub fn set_poll_interval(&self, id: &str, interval: Duration) -> bool {
        let provider = {
            let mut providers = self.write();
            let Some(entry) = providers.get_mut(id) else {
                return false;
            };
            entry.poll_interval_override = Some(interval);
            Arc::clone(&entry.provider)
        };
        provider.set_poll_interval_ms(u64::try_from(interval.as_millis()).unwrap_or(u64::MAX));
        true
    }

    pub fn record_success(&self, id: &str, inserted: usize) {
        if let Some(entry) = self.write().get_mut(id) {
            let now = Utc::now();
            entry.status.last_attempt_at = Some(now);
            entry.status.last_success_at = Some(now);
            entry.status.last_error = None;
            entry.status.consecutive_failures = 0;
            entry.status.total_inserted += inserted as u64;
        }
    }

    pub fn record_failure(&self, id: &str, error: &str) {
        if let Some(entry) = self.write().get_mut(id) {
            entry.status.last_attempt_at = Some(Utc::now());
            entry.status.last_error = Some(error.to_string());
            entry.status.consecutive_failures += 1;
        }
    }
}
