use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// How each pool is ordered before the nominal selection walks it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderMode {
    /// Uniform shuffle, reseeded on every call.
    #[default]
    Random,
    /// Lexicographic by filename.
    Name,
    /// Keep the order the catalog listed the files in.
    None,
}

impl std::fmt::Display for OrderMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderMode::Random => "random",
            OrderMode::Name => "name",
            OrderMode::None => "none",
        };
        f.write_str(s)
    }
}

impl From<&str> for OrderMode {
    fn from(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "random" => OrderMode::Random,
            "name" => OrderMode::Name,
            "none" => OrderMode::None,
            other => {
                tracing::warn!(order = other, "Unknown selection order, defaulting to random");
                OrderMode::Random
            }
        }
    }
}

/// The two fixed extension sets files are classified against (lowercase, with leading dot).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaExtensions {
    #[serde(default = "default_image_extensions")]
    pub images: BTreeSet<String>,
    #[serde(default = "default_video_extensions")]
    pub videos: BTreeSet<String>,
}

impl Default for MediaExtensions {
    fn default() -> Self {
        Self {
            images: default_image_extensions(),
            videos: default_video_extensions(),
        }
    }
}

fn default_image_extensions() -> BTreeSet<String> {
    [".jpg", ".jpeg", ".png", ".gif", ".webp"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_video_extensions() -> BTreeSet<String> {
    [".mp4", ".mov", ".avi", ".mkv", ".webm"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Everything the engine needs to know to run a cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    pub pending_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub history_file: PathBuf,
    pub ratings_file: PathBuf,
    pub schedule_file: PathBuf,
    pub images_per_batch: usize,
    pub videos_per_batch: usize,
    pub max_upload_size_mb: u64,
    pub archive_retention_days: u64,
    pub selection_order: OrderMode,
    pub extensions: MediaExtensions,
    pub delivery_timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            pending_dir: PathBuf::from("media"),
            archive_dir: PathBuf::from("archive"),
            history_file: PathBuf::from("upload_history.json"),
            ratings_file: PathBuf::from("media_ratings.json"),
            schedule_file: PathBuf::from("schedule_config.json"),
            images_per_batch: 3,
            videos_per_batch: 7,
            max_upload_size_mb: 25,
            archive_retention_days: 3,
            selection_order: OrderMode::Random,
            extensions: MediaExtensions::default(),
            delivery_timeout: Duration::from_secs(120),
        }
    }
}

impl BatchConfig {
    /// Convenience for tests and embedders: defaults rooted under `dir`.
    pub fn rooted_at(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            pending_dir: dir.join("media"),
            archive_dir: dir.join("archive"),
            history_file: dir.join("upload_history.json"),
            ratings_file: dir.join("media_ratings.json"),
            schedule_file: dir.join("schedule_config.json"),
            ..Self::default()
        }
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_size_mb * BYTES_PER_MB
    }

    pub fn archive_retention(&self) -> Duration {
        Duration::from_secs(self.archive_retention_days * 24 * 60 * 60)
    }

    pub fn trace_loaded(&self) {
        info!(
            pending_dir = %self.pending_dir.display(),
            archive_dir = %self.archive_dir.display(),
            images_per_batch = self.images_per_batch,
            videos_per_batch = self.videos_per_batch,
            max_upload_size_mb = self.max_upload_size_mb,
            order = %self.selection_order,
            "Loaded BatchConfig"
        );
        debug!(?self, "BatchConfig loaded (full debug)");
    }
}
