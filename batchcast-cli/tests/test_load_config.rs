use batchcast::config::OrderMode;
use batchcast_cli::load_config::load_config;
use serial_test::serial;
use std::env;
use std::fs::write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

fn config_file(yaml: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), yaml).unwrap();
    file
}

/// A full config maps every section onto the engine config and picks up the webhook from env.
#[test]
#[serial]
fn test_load_config_full_file_with_env_webhook() {
    let file = config_file(
        r#"
paths:
  pending_dir: ./tmp/media
  archive_dir: ./tmp/archive
batch:
  images_per_batch: 5
  videos_per_batch: 2
  max_upload_size_mb: 8
  archive_retention_days: 10
  selection_order: name
  image_extensions: [PNG, .jpg]
schedule:
  enabled: false
  hour: 6
  minute: 30
delivery:
  timeout_secs: 15
"#,
    );
    env::set_var("BATCHCAST_WEBHOOK_URL", "https://hooks.example/abc");

    let config = load_config(file.path()).expect("Config should load");

    assert_eq!(config.batch.pending_dir, PathBuf::from("./tmp/media"));
    assert_eq!(config.batch.archive_dir, PathBuf::from("./tmp/archive"));
    assert_eq!(config.batch.history_file, PathBuf::from("upload_history.json"));
    assert_eq!(config.batch.images_per_batch, 5);
    assert_eq!(config.batch.videos_per_batch, 2);
    assert_eq!(config.batch.max_upload_bytes(), 8 * 1024 * 1024);
    assert_eq!(config.batch.archive_retention_days, 10);
    assert_eq!(config.batch.selection_order, OrderMode::Name);
    assert!(config.batch.extensions.images.contains(".png"));
    assert!(!config.batch.extensions.images.contains(".gif"));
    assert!(config.batch.extensions.videos.contains(".mp4"));
    assert_eq!(config.batch.delivery_timeout, Duration::from_secs(15));
    let schedule = config.schedule.expect("schedule section");
    assert!(!schedule.enabled);
    assert_eq!(schedule.time_label(), "06:30");
    assert_eq!(config.webhook_url.as_deref(), Some("https://hooks.example/abc"));

    env::remove_var("BATCHCAST_WEBHOOK_URL");
}

/// An empty file is valid and yields the engine defaults.
#[test]
#[serial]
fn test_load_config_empty_file_uses_defaults() {
    let file = config_file("");
    env::remove_var("BATCHCAST_WEBHOOK_URL");

    let config = load_config(file.path()).expect("Empty config should load");

    assert_eq!(config.batch.images_per_batch, 3);
    assert_eq!(config.batch.videos_per_batch, 7);
    assert_eq!(config.batch.max_upload_size_mb, 25);
    assert_eq!(config.batch.archive_retention_days, 3);
    assert_eq!(config.batch.selection_order, OrderMode::Random);
    assert_eq!(config.batch.delivery_timeout, Duration::from_secs(120));
    assert!(config.schedule.is_none());
    assert!(config.webhook_url.is_none());
}

/// Unknown order modes fall back to random instead of failing the load.
#[test]
#[serial]
fn test_load_config_unknown_order_falls_back_to_random() {
    let file = config_file("batch:\n  selection_order: shuffled\n");

    let config = load_config(file.path()).expect("Config should load");

    assert_eq!(config.batch.selection_order, OrderMode::Random);
}

#[test]
#[serial]
fn test_load_config_rejects_invalid_schedule() {
    let file = config_file("schedule:\n  enabled: true\n  hour: 30\n  minute: 0\n");

    let err = load_config(file.path()).unwrap_err();

    assert!(err.to_string().contains("Invalid schedule"));
}

#[test]
#[serial]
fn test_load_config_errors_on_malformed_yaml() {
    let file = config_file("batch: [unterminated\n");

    assert!(load_config(file.path()).is_err());
}

#[test]
#[serial]
fn test_load_config_errors_on_missing_file() {
    let err = load_config("/definitely/not/here/batchcast.yaml").unwrap_err();

    assert!(err.to_string().contains("Failed to read config file"));
}
