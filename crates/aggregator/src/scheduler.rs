//! Poll scheduler: one cancellable timer task per enabled provider.
//!
//! Each provider polls on its own `tokio::time::interval`, so a slow or
//! failing provider never delays another. Every task owns a child of the
//! scheduler's shutdown token; cancelling the root stops every timer at once,
//! while cancelling a child only stops that provider.
//!
//! Fetches run with no store or registry lock held. Results that come back
//! after shutdown, or after the provider was unregistered or replaced, are
//! dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use herald_common::config::AppConfig;
use herald_providers::{NotificationProvider, ProviderError};

use crate::registry::ProviderRegistry;
use crate::store::NotificationStore;

/// Start offset used when `now + period` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Result of a single provider poll.
#[derive(Debug)]
pub enum PollOutcome {
    /// Fetch succeeded; `inserted` of `fetched` notifications were new.
    Completed { fetched: usize, inserted: usize },
    Failed(ProviderError),
    /// Fetch finished after shutdown, or the provider is no longer the one
    /// registered under its id; results dropped.
    Discarded,
}

/// Totals of one on-demand fetch cycle across all enabled providers.
#[derive(Debug, Clone, Serialize)]
pub struct FetchSummary {
    pub cycle_id: Uuid,
    pub polled: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub inserted: usize,
}

impl FetchSummary {
    fn new() -> Self {
        Self {
            cycle_id: Uuid::new_v4(),
            polled: 0,
            succeeded: 0,
            failed: 0,
            inserted: 0,
        }
    }
}

/// Everything a poll needs, cheap to clone into spawned tasks.
#[derive(Clone)]
struct PollContext {
    store: Arc<NotificationStore>,
    registry: Arc<ProviderRegistry>,
    fetch_timeout: Duration,
    shutdown: CancellationToken,
}

impl PollContext {
    fn is_current(&self, id: &str, provider: &Arc<dyn NotificationProvider>) -> bool {
        !self.shutdown.is_cancelled() && self.registry.holds(id, provider)
    }

    /// Run one fetch against a provider and feed the results to the store.
    async fn poll(&self, provider: Arc<dyn NotificationProvider>) -> PollOutcome {
        let id = provider.id().to_string();

        let result = tokio::time::timeout(self.fetch_timeout, provider.fetch_notifications())
            .await
            .unwrap_or_else(|_| Err(ProviderError::Timeout(self.fetch_timeout)));

        if !self.is_current(&id, &provider) {
            tracing::debug!(provider_id = %id, "Discarding fetch results from inactive provider");
            return PollOutcome::Discarded;
        }

        match result {
            Ok(batch) => {
                let fetched = batch.len();
                let inserted = batch
                    .into_iter()
                    .map(|mut notification| {
                        if notification.source.is_empty() {
                            notification.source = provider.name().to_string();
                        }
                        self.store.add(notification)
                    })
                    .filter(|inserted| *inserted)
                    .count();

                self.registry.record_success(&id, inserted);
                if inserted > 0 {
                    tracing::info!(provider_id = %id, fetched, inserted, "Fetched new notifications");
                } else {
                    tracing::debug!(provider_id = %id, fetched, "No new notifications");
                }
                PollOutcome::Completed { fetched, inserted }
            }
            Err(e) => {
                tracing::warn!(provider_id = %id, error = %e, "Provider fetch failed");
                self.registry.record_failure(&id, &e.to_string());
                PollOutcome::Failed(e)
            }
        }
    }

    /// Timer loop for one provider. The first poll happens one full period
    /// after the loop starts. The loop ends on cancellation or once the
    /// registry stops holding `provider`.
    async fn run_schedule(
        self,
        provider: Arc<dyn NotificationProvider>,
        period: Duration,
        token: CancellationToken,
    ) {
        let id = provider.id().to_string();
        let now = Instant::now();
        let start = now.checked_add(period).unwrap_or(now + FAR_FUTURE);
        let mut ticker = tokio::time::interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    if !self.is_current(&id, &provider) {
                        break;
                    }
                    if let PollOutcome::Discarded = self.poll(Arc::clone(&provider)).await {
                        break;
                    }
                }
            }
        }

        tracing::debug!(provider_id = %provider.id(), "Poll schedule stopped");
    }
}

struct PollTask {
    generation: u64,
    token: CancellationToken,
    handle: JoinHandle<()>,
    period: Duration,
}

/// Drives background and on-demand fetch cycles.
pub struct PollScheduler {
    ctx: PollContext,
    config: AppConfig,
    tasks: Mutex<HashMap<String, PollTask>>,
    /// Runtime seen on the last call made from inside Tokio, so timers can be
    /// (re)started from plain threads too.
    runtime: Mutex<Option<Handle>>,
    next_generation: AtomicU64,
}

impl PollScheduler {
    pub fn new(
        store: Arc<NotificationStore>,
        registry: Arc<ProviderRegistry>,
        config: AppConfig,
    ) -> Self {
        Self {
            ctx: PollContext {
                store,
                registry,
                fetch_timeout: config.fetch_timeout(),
                shutdown: CancellationToken::new(),
            },
            config,
            tasks: Mutex::new(HashMap::new()),
            runtime: Mutex::new(None),
            next_generation: AtomicU64::new(0),
        }
    }

    fn runtime(&self) -> Option<Handle> {
        let mut remembered = self.runtime.lock().unwrap_or_else(PoisonError::into_inner);
        if let Ok(current) = Handle::try_current() {
            *remembered = Some(current);
        }
        remembered.clone()
    }

    fn tasks(&self) -> MutexGuard<'_, HashMap<String, PollTask>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_shut_down(&self) -> bool {
        self.ctx.shutdown.is_cancelled()
    }

    /// (Re)start the timer for a provider from a fresh interval.
    ///
    /// Disabled or unknown providers end up with no timer. Returns whether a
    /// timer is running afterwards.
    pub fn schedule(&self, id: &str) -> bool {
        self.unschedule(id);

        if self.is_shut_down() {
            return false;
        }
        let Some(entry) = self.ctx.registry.get(id) else {
            return false;
        };
        if !entry.is_enabled() {
            tracing::debug!(provider_id = %id, "Provider disabled, not scheduling");
            return false;
        }

        let Some(runtime) = self.runtime() else {
            tracing::warn!(provider_id = %id, "No Tokio runtime available, polling not scheduled");
            return false;
        };

        let period = self
            .config
            .effective_poll_interval(Some(entry.requested_interval_ms()));
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let token = self.ctx.shutdown.child_token();
        let handle = runtime.spawn(self.ctx.clone().run_schedule(
            Arc::clone(&entry.provider),
            period,
            token.clone(),
        ));

        let previous = self.tasks().insert(
            id.to_string(),
            PollTask {
                generation,
                token: token.clone(),
                handle,
                period,
            },
        );
        if let Some(previous) = previous {
            previous.token.cancel();
        }

        // The provider may have been unregistered or replaced, or the
        // scheduler shut down, after the entry was read above.
        if !self.ctx.is_current(id, &entry.provider) {
            token.cancel();
            let mut tasks = self.tasks();
            if tasks.get(id).is_some_and(|task| task.generation == generation) {
                tasks.remove(id);
            }
            tracing::debug!(provider_id = %id, "Provider left the registry while scheduling");
            return false;
        }

        tracing::info!(
            provider_id = %id,
            poll_interval_ms = period.as_millis() as u64,
            "Provider polling scheduled"
        );
        true
    }

    /// Stop a provider's timer. Returns `true` if one was running.
    pub fn unschedule(&self, id: &str) -> bool {
        let task = self.tasks().remove(id);
        match task {
            Some(task) => {
                task.token.cancel();
                // The task exits at its next select; an in-flight fetch is
                // left to finish.
                drop(task.handle);
                true
            }
            None => false,
        }
    }

    /// Restart a running timer so a new interval takes effect. Providers
    /// without a timer stay unscheduled.
    pub fn reschedule(&self, id: &str) -> bool {
        if !self.is_scheduled(id) {
            return false;
        }
        self.schedule(id)
    }

    pub fn is_scheduled(&self, id: &str) -> bool {
        self.tasks().contains_key(id)
    }

    /// Interval a provider's timer currently runs at.
    pub fn scheduled_period(&self, id: &str) -> Option<Duration> {
        self.tasks().get(id).map(|task| task.period)
    }

    pub fn scheduled_count(&self) -> usize {
        self.tasks().len()
    }

    /// Poll every enabled provider once, concurrently, and wait for all of them.
    ///
    /// Each fetch is bounded by the configured timeout, so this returns within
    /// roughly one timeout even if a provider hangs.
    pub async fn fetch_all(&self) -> FetchSummary {
        let mut summary = FetchSummary::new();
        if self.is_shut_down() {
            return summary;
        }

        let mut set = JoinSet::new();
        for entry in self.ctx.registry.enabled() {
            let ctx = self.ctx.clone();
            set.spawn(async move { ctx.poll(entry.provider).await });
            summary.polled += 1;
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(PollOutcome::Completed { inserted, .. }) => {
                    summary.succeeded += 1;
                    summary.inserted += inserted;
                }
                Ok(PollOutcome::Failed(_)) | Ok(PollOutcome::Discarded) => summary.failed += 1,
                Err(e) => {
                    tracing::error!(error = %e, "Provider fetch task panicked");
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(
            cycle_id = %summary.cycle_id,
            polled = summary.polled,
            succeeded = summary.succeeded,
            failed = summary.failed,
            inserted = summary.inserted,
            "Fetch cycle complete"
        );
        summary
    }

    /// Poll a single provider immediately, outside its schedule.
    pub async fn fetch_one(&self, id: &str) -> Option<PollOutcome> {
        if self.is_shut_down() {
            return None;
        }
        let entry = self.ctx.registry.get(id)?;
        Some(self.ctx.poll(entry.provider).await)
    }

    /// Cancel every timer. Safe to call repeatedly.
    pub fn shutdown(&self) {
        self.ctx.shutdown.cancel();
        let drained: Vec<(String, PollTask)> = self.tasks().drain().collect();
        for (id, task) in drained {
            task.token.cancel();
            tracing::debug!(provider_id = %id, "Poll timer cancelled");
        }
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.ctx.shutdown.cancel();
    }
}
