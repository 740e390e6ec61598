use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Notification priority levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Info => write!(f, "info"),
            Priority::Warning => write!(f, "warning"),
            Priority::Error => write!(f, "error"),
        }
    }
}

/// What kind of event a notification describes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Release,
    Announcement,
    Plugin,
    #[default]
    Other,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Release => write!(f, "release"),
            Category::Announcement => write!(f, "announcement"),
            Category::Plugin => write!(f, "plugin"),
            Category::Other => write!(f, "other"),
        }
    }
}

/// A single notification collected from a provider.
///
/// `id` is the only deduplication key: two notifications with the same `id`
/// are the same logical notification, whatever their other fields say.
///
/// Everything except `read` and `metadata` is fixed once the store has
/// accepted the notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
    /// Free-text origin label (e.g., "GitHub Releases")
    #[serde(default)]
    pub source: String,
    /// Identifier used by the originating provider; not globally unique.
    #[serde(default)]
    pub source_id: String,
    #[serde(default)]
    pub link: Option<String>,
    /// Set by the provider. Filled with the receipt time when absent.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Set by the store on insertion.
    #[serde(default)]
    pub received_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub category: Category,
    /// Provider-specific key/value pairs, opaque to the aggregator.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub version: Option<String>,
}

impl Notification {
    /// Create an unread `Info`/`Other` notification with no timestamps.
    pub fn new(id: impl Into<String>, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            message: message.into(),
            source: String::new(),
            source_id: String::new(),
            link: None,
            created_at: None,
            received_at: None,
            read: false,
            priority: Priority::default(),
            category: Category::default(),
            metadata: BTreeMap::new(),
            version: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>, source_id: impl Into<String>) -> Self {
        self.source = source.into();
        self.source_id = source_id.into();
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Creation time, falling back to receipt time.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.created_at.or(self.received_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_notification_defaults() {
        let n = Notification::new("n1", "Title", "Body");
        assert!(!n.read);
        assert_eq!(n.priority, Priority::Info);
        assert_eq!(n.category, Category::Other);
        assert!(n.created_at.is_none());
        assert!(n.received_at.is_none());
        assert!(n.metadata.is_empty());
    }

    #[test]
    fn test_deserialize_minimal_json() {
        let n: Notification = serde_json::from_value(serde_json::json!({
            "id": "rel-1.2.0",
            "title": "v1.2.0 released",
            "message": "Bug fixes",
            "priority": "warning",
            "category": "release",
            "version": "1.2.0"
        }))
        .unwrap();

        assert_eq!(n.id, "rel-1.2.0");
        assert_eq!(n.priority, Priority::Warning);
        assert_eq!(n.category, Category::Release);
        assert_eq!(n.version.as_deref(), Some("1.2.0"));
        assert!(n.link.is_none());
        assert!(!n.read);
    }

    #[test]
    fn test_timestamp_falls_back_to_receipt() {
        let received = Utc::now();
        let mut n = Notification::new("n1", "t", "m");
        assert!(n.timestamp().is_none());

        n.received_at = Some(received);
        assert_eq!(n.timestamp(), Some(received));

        let created = received - chrono::Duration::hours(1);
        let n = n.with_created_at(created);
        assert_eq!(n.timestamp(), Some(created));
    }

    #[test]
    fn test_display_matches_serde() {
        assert_eq!(Priority::Error.to_string(), "error");
        assert_eq!(Category::Announcement.to_string(), "announcement");
        assert_eq!(
            serde_json::to_value(Category::Plugin).unwrap(),
            serde_json::json!("plugin")
        );
    }
}
