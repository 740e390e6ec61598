//! In-memory provider.
//!
//! Hands out notifications pushed into it by the host application (or a
//! test). Useful for integrations that already receive events through some
//! other channel and only need to feed them into the aggregator.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use herald_common::types::Notification;

use crate::{NotificationProvider, ProviderError, ProviderSettings};

/// Provider backed by an in-memory queue.
pub struct StaticProvider {
    id: String,
    name: String,
    description: String,
    settings: ProviderSettings,
    pending: Mutex<Vec<Notification>>,
    /// Keep items after a fetch instead of draining them.
    repeating: bool,
    /// Artificial latency added to every fetch.
    delay: Option<Duration>,
    fetch_error: Mutex<Option<String>>,
    init_error: Option<String>,
    fetch_count: AtomicUsize,
    shut_down: AtomicBool,
}

impl StaticProvider {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            settings: ProviderSettings::default(),
            pending: Mutex::new(Vec::new()),
            repeating: false,
            delay: None,
            fetch_error: Mutex::new(None),
            init_error: None,
            fetch_count: AtomicUsize::new(0),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_notifications(self, notifications: Vec<Notification>) -> Self {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(notifications);
        self
    }

    pub fn with_poll_interval_ms(self, interval_ms: u64) -> Self {
        self.settings.set_poll_interval_ms(interval_ms);
        self
    }

    pub fn with_enabled(self, enabled: bool) -> Self {
        self.settings.set_enabled(enabled);
        self
    }

    pub fn repeating(mut self) -> Self {
        self.repeating = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make `initialize()` fail with the given reason.
    pub fn failing_initialize(mut self, reason: impl Into<String>) -> Self {
        self.init_error = Some(reason.into());
        self
    }

    /// Queue a notification for the next fetch.
    pub fn push(&self, notification: Notification) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
    }

    /// Make every fetch fail until `clear_failure` is called.
    pub fn fail_with(&self, reason: impl Into<String>) {
        *self.fetch_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(reason.into());
    }

    pub fn clear_failure(&self) {
        *self.fetch_error.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Number of fetch calls so far, successful or not.
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationProvider for StaticProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn is_enabled(&self) -> bool {
        self.settings.is_enabled()
    }

    fn set_enabled(&self, enabled: bool) {
        self.settings.set_enabled(enabled);
    }

    fn poll_interval_ms(&self) -> u64 {
        self.settings.poll_interval_ms()
    }

    fn set_poll_interval_ms(&self, interval_ms: u64) {
        self.settings.set_poll_interval_ms(interval_ms);
    }

    async fn fetch_notifications(&self) -> Result<Vec<Notification>, ProviderError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(reason) = self
            .fetch_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Err(ProviderError::Fetch(reason));
        }

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let batch = if self.repeating {
            pending.clone()
        } else {
            std::mem::take(&mut *pending)
        };

        tracing::debug!(provider_id = %self.id, count = batch.len(), "Static provider fetched");
        Ok(batch)
    }

    async fn initialize(&self) -> Result<(), ProviderError> {
        match &self.init_error {
            Some(reason) => Err(ProviderError::Initialization(reason.clone())),
            None => Ok(()),
        }
    }

    async fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_drains_queue() {
        let provider = StaticProvider::new("static", "Static")
            .with_notifications(vec![Notification::new("a", "A", "first")]);
        provider.push(Notification::new("b", "B", "second"));

        let first = provider.fetch_notifications().await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].id, "a");

        let second = provider.fetch_notifications().await.unwrap();
        assert!(second.is_empty());
        assert_eq!(provider.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_repeating_keeps_items() {
        let provider = StaticProvider::new("static", "Static")
            .with_notifications(vec![Notification::new("a", "A", "first")])
            .repeating();

        assert_eq!(provider.fetch_notifications().await.unwrap().len(), 1);
        assert_eq!(provider.fetch_notifications().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_is_all_or_nothing() {
        let provider = StaticProvider::new("static", "Static")
            .with_notifications(vec![Notification::new("a", "A", "first")]);
        provider.fail_with("upstream unavailable");

        let err = provider.fetch_notifications().await.unwrap_err();
        assert!(matches!(err, ProviderError::Fetch(_)));

        provider.clear_failure();
        let batch = provider.fetch_notifications().await.unwrap();
        assert_eq!(batch.len(), 1);
    }

    #[tokio::test]
    async fn test_initialize_failure_and_shutdown() {
        let provider = StaticProvider::new("static", "Static").failing_initialize("no token");
        assert!(provider.initialize().await.is_err());

        assert!(!provider.is_shut_down());
        provider.shutdown().await;
        assert!(provider.is_shut_down());
    }
}
