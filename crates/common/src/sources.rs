//! Persisted source descriptors.
//!
//! A source descriptor says which provider to build and how to schedule it.
//! The aggregator never interprets the kind-specific `fields`; they are handed
//! to whichever factory knows the descriptor's kind.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Kinds of notification sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Feed,
    ReleaseTracker,
    Custom,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Feed => write!(f, "feed"),
            SourceKind::ReleaseTracker => write!(f, "release_tracker"),
            SourceKind::Custom => write!(f, "custom"),
        }
    }
}

/// One configured notification source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub id: String,
    pub name: String,
    pub kind: SourceKind,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Poll interval in milliseconds; `None` keeps the provider's own default.
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
    /// Display color (e.g., "#3b82f6")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Kind-specific settings (feed URL, repository, file path, ...)
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

fn default_enabled() -> bool {
    true
}

impl SourceDescriptor {
    /// Look up a kind-specific string field.
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(|v| v.as_str())
    }
}

/// Read source descriptors from a JSON file.
///
/// Descriptors with an empty or duplicated `id` are rejected as a whole file,
/// since registering them would silently replace each other.
pub fn load_sources(path: &Path) -> Result<Vec<SourceDescriptor>, AppError> {
    let raw = std::fs::read_to_string(path)?;
    let sources: Vec<SourceDescriptor> = serde_json::from_str(&raw)?;

    let mut seen = std::collections::HashSet::new();
    for source in &sources {
        if source.id.trim().is_empty() {
            return Err(AppError::Config(format!(
                "Source '{}' in {} has an empty id",
                source.name,
                path.display()
            )));
        }
        if !seen.insert(source.id.as_str()) {
            return Err(AppError::Config(format!(
                "Duplicate source id '{}' in {}",
                source.id,
                path.display()
            )));
        }
    }

    tracing::info!(
        path = %path.display(),
        count = sources.len(),
        "Loaded source descriptors"
    );
    Ok(sources)
}

/// Write source descriptors to a JSON file, replacing its contents.
pub fn save_sources(path: &Path, sources: &[SourceDescriptor]) -> Result<(), AppError> {
    let json = serde_json::to_string_pretty(sources)?;
    std::fs::write(path, json)?;
    tracing::debug!(path = %path.display(), count = sources.len(), "Saved source descriptors");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("herald-{}-{}.json", name, uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_parse_descriptor_with_kind_fields() {
        let source: SourceDescriptor = serde_json::from_value(serde_json::json!({
            "id": "gh-releases",
            "name": "GitHub Releases",
            "kind": "release_tracker",
            "poll_interval_ms": 600000,
            "color": "#24292e",
            "repository": "owner/project"
        }))
        .unwrap();

        assert_eq!(source.kind, SourceKind::ReleaseTracker);
        assert!(source.enabled);
        assert_eq!(source.poll_interval_ms, Some(600_000));
        assert_eq!(source.field_str("repository"), Some("owner/project"));
        assert!(source.field_str("id").is_none());
    }

    #[test]
    fn test_save_then_load_preserves_descriptors() {
        let path = temp_path("sources");
        let mut fields = serde_json::Map::new();
        fields.insert("path".to_string(), serde_json::json!("/tmp/inbox.json"));
        let sources = vec![SourceDescriptor {
            id: "inbox".to_string(),
            name: "Inbox".to_string(),
            kind: SourceKind::Custom,
            enabled: false,
            poll_interval_ms: None,
            color: None,
            fields,
        }];

        save_sources(&path, &sources).unwrap();
        let loaded = load_sources(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, sources);
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let path = temp_path("dupes");
        std::fs::write(
            &path,
            r#"[{"id":"a","name":"A","kind":"feed"},{"id":"a","name":"B","kind":"custom"}]"#,
        )
        .unwrap();

        let result = load_sources(&path);
        std::fs::remove_file(&path).ok();

        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = load_sources(&temp_path("missing"));
        assert!(matches!(result, Err(AppError::Io(_))));
    }
}
