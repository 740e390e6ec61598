use std::sync::Arc;

use herald_aggregator::ProviderFactory;
use herald_common::error::AppError;
use herald_common::sources::{SourceDescriptor, SourceKind};
use herald_providers::{JsonFileProvider, NotificationProvider};

/// Builds the providers that ship with the daemon.
///
/// Only `custom` sources with a `path` field are handled here (they become
/// `JsonFileProvider`s). Feed and release-tracker kinds need plugins that
/// are loaded elsewhere.
pub struct BuiltinProviderFactory;

impl ProviderFactory for BuiltinProviderFactory {
    fn build(&self, source: &SourceDescriptor) -> Result<Arc<dyn NotificationProvider>, AppError> {
        match source.kind {
            SourceKind::Custom => {
                let path = source.field_str("path").ok_or_else(|| {
                    AppError::Config(format!("Custom source '{}' has no 'path' field", source.id))
                })?;
                let provider = JsonFileProvider::new(source.id.clone(), source.name.clone(), path)
                    .with_settings(
                        source.enabled,
                        source
                            .poll_interval_ms
                            .unwrap_or(herald_common::config::DEFAULT_POLL_INTERVAL_MS),
                    );
                Ok(Arc::new(provider))
            }
            kind => Err(AppError::Config(format!(
                "No built-in provider for source kind '{}'",
                kind
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(kind: SourceKind, fields: serde_json::Value) -> SourceDescriptor {
        SourceDescriptor {
            id: "src".to_string(),
            name: "Source".to_string(),
            kind,
            enabled: true,
            poll_interval_ms: Some(30_000),
            color: None,
            fields: fields.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_custom_source_with_path_builds_file_provider() {
        let provider = BuiltinProviderFactory
            .build(&source(
                SourceKind::Custom,
                serde_json::json!({"path": "/tmp/herald-inbox.json"}),
            ))
            .unwrap();
        assert_eq!(provider.id(), "src");
        assert_eq!(provider.poll_interval_ms(), 30_000);
    }

    #[test]
    fn test_custom_source_without_path_is_rejected() {
        let result = BuiltinProviderFactory.build(&source(SourceKind::Custom, serde_json::json!({})));
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_feed_kind_is_not_built_in() {
        let result = BuiltinProviderFactory.build(&source(
            SourceKind::Feed,
            serde_json::json!({"url": "https://example.com/feed.xml"}),
        ));
        assert!(result.is_err());
    }
}
