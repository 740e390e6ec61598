//! In-memory notification store.
//!
//! Holds every notification currently known to the aggregator, keyed by
//! identity. The first submission of an identity wins; later submissions with
//! the same identity are ignored. Iteration follows insertion order.
//!
//! All state sits behind one `RwLock` and every check-and-insert happens in a
//! single critical section, so concurrent providers submitting the same
//! identity can never produce two entries.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use tokio::sync::broadcast;

use herald_common::config::DEFAULT_EVENT_CAPACITY;
use herald_common::types::Notification;

/// Change notifications emitted by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Added(String),
    Read(String),
    Removed(String),
    Cleared,
}

/// Ordering for notification listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListOrder {
    /// Order in which the store accepted them.
    #[default]
    Inserted,
    NewestFirst,
    OldestFirst,
}

struct Entry {
    seq: u64,
    notification: Notification,
}

#[derive(Default)]
struct StoreState {
    entries: HashMap<String, Entry>,
    /// Insertion sequence → identity.
    order: BTreeMap<u64, String>,
    next_seq: u64,
    unread: usize,
}

/// Thread-safe, deduplicating notification store.
pub struct NotificationStore {
    state: RwLock<StoreState>,
    events: broadcast::Sender<StoreEvent>,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::with_event_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_event_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            state: RwLock::new(StoreState::default()),
            events,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: StoreEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    /// Insert a notification unless its identity is already stored.
    ///
    /// Stamps `received_at`, and `created_at` when the provider left it empty.
    /// Returns `true` if the notification was inserted. Empty identities are
    /// rejected.
    pub fn add(&self, mut notification: Notification) -> bool {
        if notification.id.is_empty() {
            tracing::warn!(title = %notification.title, "Rejected notification with empty id");
            return false;
        }

        let id = {
            let mut state = self.write();
            if state.entries.contains_key(&notification.id) {
                return false;
            }

            let now = Utc::now();
            notification.received_at = Some(now);
            notification.created_at.get_or_insert(now);

            let seq = state.next_seq;
            state.next_seq += 1;
            if !notification.read {
                state.unread += 1;
            }

            let id = notification.id.clone();
            state.order.insert(seq, id.clone());
            state.entries.insert(id.clone(), Entry { seq, notification });
            id
        };

        self.emit(StoreEvent::Added(id));
        true
    }

    /// Delete a notification. Returns `true` if it existed.
    pub fn remove(&self, id: &str) -> bool {
        {
            let mut state = self.write();
            let Some(entry) = state.entries.remove(id) else {
                return false;
            };
            state.order.remove(&entry.seq);
            if !entry.notification.read {
                state.unread -= 1;
            }
        }

        self.emit(StoreEvent::Removed(id.to_string()));
        true
    }

    /// Mark a notification as read. Returns `true` if the flag changed.
    pub fn mark_read(&self, id: &str) -> bool {
        {
            let mut state = self.write();
            let Some(entry) = state.entries.get_mut(id) else {
                return false;
            };
            if entry.notification.read {
                return false;
            }
            entry.notification.read = true;
            state.unread -= 1;
        }

        self.emit(StoreEvent::Read(id.to_string()));
        true
    }

    /// Mark every notification as read. Returns how many changed.
    pub fn mark_all_read(&self) -> usize {
        let changed: Vec<String> = {
            let mut state = self.write();
            let changed: Vec<String> = state
                .entries
                .values_mut()
                .filter(|entry| !entry.notification.read)
                .map(|entry| {
                    entry.notification.read = true;
                    entry.notification.id.clone()
                })
                .collect();
            state.unread = 0;
            changed
        };

        let count = changed.len();
        for id in changed {
            self.emit(StoreEvent::Read(id));
        }
        count
    }

    /// Merge metadata into an existing notification.
    ///
    /// This is the only content change the store allows after insertion.
    pub fn update_metadata(&self, id: &str, metadata: BTreeMap<String, String>) -> bool {
        let mut state = self.write();
        match state.entries.get_mut(id) {
            Some(entry) => {
                entry.notification.metadata.extend(metadata);
                true
            }
            None => false,
        }
    }

    /// Drop every notification. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let removed = {
            let mut state = self.write();
            let removed = state.entries.len();
            state.entries.clear();
            state.order.clear();
            state.unread = 0;
            removed
        };

        if removed > 0 {
            self.emit(StoreEvent::Cleared);
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<Notification> {
        self.read()
            .entries
            .get(id)
            .map(|entry| entry.notification.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().entries.contains_key(id)
    }

    /// List notifications in insertion order, optionally unread only.
    pub fn list(&self, unread_only: bool) -> Vec<Notification> {
        let state = self.read();
        state
            .order
            .values()
            .filter_map(|id| state.entries.get(id))
            .map(|entry| &entry.notification)
            .filter(|n| !unread_only || !n.read)
            .cloned()
            .collect()
    }

    /// List notifications in the requested order.
    ///
    /// Timestamp orders are stable, so ties keep insertion order.
    pub fn list_sorted(&self, unread_only: bool, order: ListOrder) -> Vec<Notification> {
        let mut notifications = self.list(unread_only);
        match order {
            ListOrder::Inserted => {}
            ListOrder::OldestFirst => notifications.sort_by_key(|n| n.timestamp()),
            ListOrder::NewestFirst => {
                notifications.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()))
            }
        }
        notifications
    }

    pub fn total_count(&self) -> usize {
        self.read().entries.len()
    }

    pub fn unread_count(&self) -> usize {
        self.read().unread
    }

    /// Subscribe to store changes.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new()
    }
}
