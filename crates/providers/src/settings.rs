use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Enabled flag and poll interval shared between a provider and the aggregator.
///
/// Providers embed this to satisfy the `set_*` half of the contract without
/// taking `&mut self`.
#[derive(Debug)]
pub struct ProviderSettings {
    enabled: AtomicBool,
    poll_interval_ms: AtomicU64,
}

impl ProviderSettings {
    pub fn new(enabled: bool, poll_interval_ms: u64) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            poll_interval_ms: AtomicU64::new(poll_interval_ms),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn poll_interval_ms(&self) -> u64 {
        self.poll_interval_ms.load(Ordering::Relaxed)
    }

    pub fn set_poll_interval_ms(&self, interval_ms: u64) {
        self.poll_interval_ms.store(interval_ms, Ordering::Relaxed);
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self::new(true, herald_common::config::DEFAULT_POLL_INTERVAL_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_round_trip_through_setters() {
        let settings = ProviderSettings::new(true, 1_000);
        settings.set_enabled(false);
        settings.set_poll_interval_ms(2_500);
        assert!(!settings.is_enabled());
        assert_eq!(settings.poll_interval_ms(), 2_500);
    }

    #[test]
    fn test_default_uses_global_interval() {
        let settings = ProviderSettings::default();
        assert!(settings.is_enabled());
        assert_eq!(
            settings.poll_interval_ms(),
            herald_common::config::DEFAULT_POLL_INTERVAL_MS
        );
    }
}
