/// `load_config` module: reads the static YAML config and injects the webhook secret from the environment.
///
/// This is the only place YAML is parsed. Every section is optional and falls back to the
/// engine's defaults, so an empty file is a valid config.
///
/// # Accepted schema
///
/// ```yaml
/// paths:
///   pending_dir: ./media
///   archive_dir: ./archive
///   history_file: ./upload_history.json
///   ratings_file: ./media_ratings.json
///   schedule_file: ./schedule_config.json
/// batch:
///   images_per_batch: 3
///   videos_per_batch: 7
///   max_upload_size_mb: 25
///   archive_retention_days: 3
///   selection_order: random   # random | name | none
///   image_extensions: [.jpg, .png]
///   video_extensions: [.mp4]
/// schedule:          # seeds the schedule file when it does not exist yet
///   enabled: true
///   hour: 12
///   minute: 0
/// delivery:
///   timeout_secs: 120
/// ```
///
/// The webhook URL is never read from YAML; it comes from `BATCHCAST_WEBHOOK_URL`.
use anyhow::Result;
use batchcast::config::{BatchConfig, MediaExtensions, OrderMode};
use batchcast::schedule::ScheduleState;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

pub const WEBHOOK_URL_ENV: &str = "BATCHCAST_WEBHOOK_URL";

#[derive(Debug)]
pub struct CliConfig {
    pub batch: BatchConfig,
    /// Initial schedule, applied only when no schedule file exists.
    pub schedule: Option<ScheduleState>,
    pub webhook_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PathsSection {
    pub pending_dir: Option<PathBuf>,
    pub archive_dir: Option<PathBuf>,
    pub history_file: Option<PathBuf>,
    pub ratings_file: Option<PathBuf>,
    pub schedule_file: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BatchSection {
    pub images_per_batch: Option<usize>,
    pub videos_per_batch: Option<usize>,
    pub max_upload_size_mb: Option<u64>,
    pub archive_retention_days: Option<u64>,
    pub selection_order: Option<String>,
    pub image_extensions: Option<Vec<String>>,
    pub video_extensions: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeliverySection {
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    paths: PathsSection,
    #[serde(default)]
    batch: BatchSection,
    schedule: Option<ScheduleState>,
    #[serde(default)]
    delivery: DeliverySection,
}

/// Loads a static YAML config file (no secrets) and injects the webhook URL from the environment.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!("Failed to read config file {:?}: {}", path_ref, e));
        }
    };

    let raw: RawConfig = if config_content.trim().is_empty() {
        RawConfig::default()
    } else {
        match serde_yaml::from_str(&config_content) {
            Ok(conf) => {
                info!(config_path = ?path_ref, "Parsed config YAML successfully");
                conf
            }
            Err(e) => {
                error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
                return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
            }
        }
    };

    if let Some(schedule) = &raw.schedule {
        schedule
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid schedule section: {e}"))?;
    }

    let batch = into_batch_config(raw.paths, raw.batch, raw.delivery);
    batch.trace_loaded();

    let webhook_url = match std::env::var(WEBHOOK_URL_ENV) {
        Ok(url) if !url.trim().is_empty() => Some(url),
        _ => {
            warn!(env = WEBHOOK_URL_ENV, "Webhook URL not set; delivery commands will refuse to run");
            None
        }
    };

    Ok(CliConfig {
        batch,
        schedule: raw.schedule,
        webhook_url,
    })
}

fn into_batch_config(paths: PathsSection, batch: BatchSection, delivery: DeliverySection) -> BatchConfig {
    let defaults = BatchConfig::default();
    let extensions = MediaExtensions {
        images: batch
            .image_extensions
            .map(normalise_extensions)
            .unwrap_or(defaults.extensions.images.clone()),
        videos: batch
            .video_extensions
            .map(normalise_extensions)
            .unwrap_or(defaults.extensions.videos.clone()),
    };

    BatchConfig {
        pending_dir: paths.pending_dir.unwrap_or(defaults.pending_dir),
        archive_dir: paths.archive_dir.unwrap_or(defaults.archive_dir),
        history_file: paths.history_file.unwrap_or(defaults.history_file),
        ratings_file: paths.ratings_file.unwrap_or(defaults.ratings_file),
        schedule_file: paths.schedule_file.unwrap_or(defaults.schedule_file),
        images_per_batch: batch.images_per_batch.unwrap_or(defaults.images_per_batch),
        videos_per_batch: batch.videos_per_batch.unwrap_or(defaults.videos_per_batch),
        max_upload_size_mb: batch.max_upload_size_mb.unwrap_or(defaults.max_upload_size_mb),
        archive_retention_days: batch
            .archive_retention_days
            .unwrap_or(defaults.archive_retention_days),
        selection_order: batch
            .selection_order
            .as_deref()
            .map(OrderMode::from)
            .unwrap_or(defaults.selection_order),
        extensions,
        delivery_timeout: delivery
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.delivery_timeout),
    }
}

/// Lowercase and ensure a leading dot, so `PNG` and `.png` mean the same thing.
fn normalise_extensions(raw: Vec<String>) -> BTreeSet<String> {
    raw.into_iter()
        .map(|ext| {
            let ext = ext.trim().to_ascii_lowercase();
            if ext.starts_with('.') {
                ext
            } else {
                format!(".{ext}")
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_are_normalised() {
        let set = normalise_extensions(vec!["PNG".into(), ".Jpg".into(), " webp ".into()]);
        assert_eq!(
            set.into_iter().collect::<Vec<_>>(),
            vec![".jpg".to_string(), ".png".to_string(), ".webp".to_string()]
        );
    }
}
