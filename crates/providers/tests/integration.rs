//! Integration tests for the built-in providers.

use std::path::PathBuf;

use herald_common::types::{Category, Notification};
use herald_providers::{JsonFileProvider, NotificationProvider, ProviderError};

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("herald-provider-{}-{}.json", name, uuid::Uuid::new_v4()))
}

#[tokio::test]
async fn test_json_file_provider_reads_and_fills_source() {
    let path = temp_path("inbox");
    let items = vec![
        Notification::new("plugin-update", "Plugin update", "A new version is available")
            .with_category(Category::Plugin),
        Notification::new("maint", "Maintenance", "Sunday 02:00 UTC").with_source("Ops", "m-7"),
    ];
    std::fs::write(&path, serde_json::to_string(&items).unwrap()).unwrap();

    let provider = JsonFileProvider::new("inbox", "Local Inbox", &path);
    provider.initialize().await.unwrap();
    let fetched = provider.fetch_notifications().await.unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(fetched.len(), 2);
    assert_eq!(fetched[0].source, "Local Inbox");
    assert_eq!(fetched[0].source_id, "plugin-update");
    assert_eq!(fetched[0].category, Category::Plugin);
    assert_eq!(fetched[1].source, "Ops");
    assert_eq!(fetched[1].source_id, "m-7");
}

#[tokio::test]
async fn test_json_file_provider_missing_file_is_empty() {
    let provider = JsonFileProvider::new("inbox", "Local Inbox", temp_path("absent"));
    provider.initialize().await.unwrap();
    assert!(provider.fetch_notifications().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_json_file_provider_rejects_malformed_json() {
    let path = temp_path("broken");
    std::fs::write(&path, "[{\"id\": ").unwrap();

    let provider = JsonFileProvider::new("inbox", "Local Inbox", &path);
    let result = provider.fetch_notifications().await;
    std::fs::remove_file(&path).ok();

    assert!(matches!(result, Err(ProviderError::Json(_))));
}

#[tokio::test]
async fn test_json_file_provider_directory_fails_initialize() {
    let provider = JsonFileProvider::new("inbox", "Local Inbox", std::env::temp_dir());
    let result = provider.initialize().await;
    assert!(matches!(result, Err(ProviderError::Initialization(_))));
}

#[tokio::test]
async fn test_json_file_provider_settings_are_mutable() {
    let provider = JsonFileProvider::new("inbox", "Local Inbox", temp_path("settings"))
        .with_settings(false, 10_000);
    assert!(!provider.is_enabled());
    provider.set_enabled(true);
    provider.set_poll_interval_ms(20_000);
    assert!(provider.is_enabled());
    assert_eq!(provider.poll_interval_ms(), 20_000);
}
