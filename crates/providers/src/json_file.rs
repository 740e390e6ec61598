//! Provider that reads notifications from a local JSON file.
//!
//! The file holds a JSON array of notifications. It is re-read on every poll,
//! so the aggregator's identity dedup decides what is new. A missing file
//! means "nothing yet" rather than an error.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use herald_common::types::Notification;

use crate::{NotificationProvider, ProviderError, ProviderSettings};

pub struct JsonFileProvider {
    id: String,
    name: String,
    path: PathBuf,
    settings: ProviderSettings,
}

impl JsonFileProvider {
    pub fn new(id: impl Into<String>, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            path: path.into(),
            settings: ProviderSettings::default(),
        }
    }

    pub fn with_settings(mut self, enabled: bool, poll_interval_ms: u64) -> Self {
        self.settings = ProviderSettings::new(enabled, poll_interval_ms);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl NotificationProvider for JsonFileProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Notifications read from a local JSON file"
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
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "Notification file not present yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        let mut notifications: Vec<Notification> = serde_json::from_str(&raw)?;
        for notification in &mut notifications {
            if notification.source.is_empty() {
                notification.source = self.name.clone();
            }
            if notification.source_id.is_empty() {
                notification.source_id = notification.id.clone();
            }
        }

        Ok(notifications)
    }

    async fn initialize(&self) -> Result<(), ProviderError> {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) if meta.is_dir() => Err(ProviderError::Initialization(format!(
                "{} is a directory",
                self.path.display()
            ))),
            _ => Ok(()),
        }
    }
}
