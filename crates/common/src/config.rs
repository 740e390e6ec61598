use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Default poll interval when neither the registration nor the provider sets one (5 min).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 300_000;

/// Lower bound applied to every poll interval.
pub const DEFAULT_MIN_POLL_INTERVAL_MS: u64 = 1_000;

/// Upper bound on a single fetch call.
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 30_000;

/// Buffer size of the store's change broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Global aggregator configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// JSON file holding the source descriptors to register at startup
    pub sources_path: Option<PathBuf>,

    /// Fallback poll interval in milliseconds
    pub default_poll_interval_ms: u64,

    /// Shortest poll interval any provider may run at, in milliseconds
    pub min_poll_interval_ms: u64,

    /// Timeout for one provider fetch, in milliseconds
    pub fetch_timeout_ms: u64,

    /// Capacity of the notification change channel
    pub event_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sources_path: None,
            default_poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            min_poll_interval_ms: DEFAULT_MIN_POLL_INTERVAL_MS,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let config = Self {
            sources_path: lookup("HERALD_SOURCES_PATH").map(PathBuf::from),
            default_poll_interval_ms: lookup("HERALD_DEFAULT_POLL_INTERVAL_MS")
                .unwrap_or_else(|| DEFAULT_POLL_INTERVAL_MS.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("HERALD_DEFAULT_POLL_INTERVAL_MS must be a valid u64"))?,
            min_poll_interval_ms: lookup("HERALD_MIN_POLL_INTERVAL_MS")
                .unwrap_or_else(|| DEFAULT_MIN_POLL_INTERVAL_MS.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("HERALD_MIN_POLL_INTERVAL_MS must be a valid u64"))?,
            fetch_timeout_ms: lookup("HERALD_FETCH_TIMEOUT_MS")
                .unwrap_or_else(|| DEFAULT_FETCH_TIMEOUT_MS.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("HERALD_FETCH_TIMEOUT_MS must be a valid u64"))?,
            event_capacity: lookup("HERALD_EVENT_CAPACITY")
                .unwrap_or_else(|| DEFAULT_EVENT_CAPACITY.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("HERALD_EVENT_CAPACITY must be a valid usize"))?,
        };

        if config.fetch_timeout_ms == 0 {
            anyhow::bail!("HERALD_FETCH_TIMEOUT_MS must be greater than zero");
        }
        if config.event_capacity == 0 {
            anyhow::bail!("HERALD_EVENT_CAPACITY must be greater than zero");
        }

        Ok(config)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Resolve the interval a provider actually polls at.
    ///
    /// `requested_ms` of zero means "not set" and falls back to the default.
    /// The result is never below `min_poll_interval_ms` and never zero.
    pub fn effective_poll_interval(&self, requested_ms: Option<u64>) -> Duration {
        let ms = requested_ms
            .filter(|ms| *ms > 0)
            .unwrap_or(self.default_poll_interval_ms)
            .max(self.min_poll_interval_ms)
            .max(1);
        Duration::from_millis(ms)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();
        assert!(config.sources_path.is_none());
        assert_eq!(config.default_poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(config.min_poll_interval_ms, DEFAULT_MIN_POLL_INTERVAL_MS);
        assert_eq!(config.fetch_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_overrides_from_lookup() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("HERALD_SOURCES_PATH", "/etc/herald/sources.json"),
            ("HERALD_DEFAULT_POLL_INTERVAL_MS", "60000"),
            ("HERALD_FETCH_TIMEOUT_MS", "500"),
        ]))
        .unwrap();
        assert_eq!(
            config.sources_path,
            Some(PathBuf::from("/etc/herald/sources.json"))
        );
        assert_eq!(config.default_poll_interval_ms, 60_000);
        assert_eq!(config.fetch_timeout_ms, 500);
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let result = AppConfig::from_lookup(lookup_from(&[(
            "HERALD_MIN_POLL_INTERVAL_MS",
            "soon",
        )]));
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let result = AppConfig::from_lookup(lookup_from(&[("HERALD_FETCH_TIMEOUT_MS", "0")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_effective_poll_interval() {
        let config = AppConfig {
            default_poll_interval_ms: 60_000,
            min_poll_interval_ms: 1_000,
            ..AppConfig::default()
        };
        assert_eq!(config.effective_poll_interval(None), Duration::from_secs(60));
        assert_eq!(config.effective_poll_interval(Some(0)), Duration::from_secs(60));
        assert_eq!(config.effective_poll_interval(Some(10)), Duration::from_secs(1));
        assert_eq!(
            config.effective_poll_interval(Some(5_000)),
            Duration::from_secs(5)
        );
    }
}
