pub mod json_file;
pub mod settings;
pub mod static_source;

use std::time::Duration;

use async_trait::async_trait;
use herald_common::types::Notification;
use thiserror::Error;

pub use json_file::JsonFileProvider;
pub use settings::ProviderSettings;
pub use static_source::StaticProvider;

/// Failures a provider can report to the aggregator.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Capability every notification source must implement.
///
/// The aggregator only ever holds `Arc<dyn NotificationProvider>`; how a
/// provider fetches (HTTP, RSS, local files) is its own business.
#[async_trait]
pub trait NotificationProvider: Send + Sync {
    /// Stable, unique identifier (e.g., "gh-releases").
    fn id(&self) -> &str;

    /// Human-readable name (e.g., "GitHub Releases").
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Whether the provider wants to be polled by default.
    fn is_enabled(&self) -> bool;

    fn set_enabled(&self, enabled: bool);

    /// Declared poll interval in milliseconds.
    fn poll_interval_ms(&self) -> u64;

    fn set_poll_interval_ms(&self, interval_ms: u64);

    /// Fetch new notifications. An empty vec means nothing new.
    ///
    /// A failure is all-or-nothing: no partial results are kept.
    async fn fetch_notifications(&self) -> Result<Vec<Notification>, ProviderError>;

    /// Prepare the provider before its first fetch. Failing aborts registration.
    async fn initialize(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Release resources. Must not fail; errors are logged by the provider.
    async fn shutdown(&self) {}
}
