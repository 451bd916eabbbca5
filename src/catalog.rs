//! Filesystem view of the pending pool and the archive.
//!
//! The catalog is derived from the two directories every time it is asked; nothing is
//! cached between calls. A filename lives in exactly one of the two locations.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, error, info, warn};

use crate::config::MediaExtensions;
use crate::error::{BatchError, BatchResult, FileFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Pending,
    Archived,
}

/// A media file as seen by one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub filename: String,
    pub kind: MediaKind,
    pub size_bytes: u64,
    pub location: Location,
    pub path: PathBuf,
}

/// Result of a scan of the pending pool, split by kind.
#[derive(Debug, Clone, Default)]
pub struct PendingPools {
    pub images: Vec<MediaFile>,
    pub videos: Vec<MediaFile>,
}

impl PendingPools {
    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.videos.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExpireReport {
    pub removed: Vec<String>,
    pub failed: Vec<FileFailure>,
}

#[derive(Debug, Clone)]
pub struct FileCatalog {
    pending_dir: PathBuf,
    archive_dir: PathBuf,
    extensions: MediaExtensions,
}

impl FileCatalog {
    pub fn new(
        pending_dir: impl Into<PathBuf>,
        archive_dir: impl Into<PathBuf>,
        extensions: MediaExtensions,
    ) -> Self {
        Self {
            pending_dir: pending_dir.into(),
            archive_dir: archive_dir.into(),
            extensions,
        }
    }

    pub fn pending_dir(&self) -> &Path {
        &self.pending_dir
    }

    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    /// Create both locations if they are missing.
    pub fn ensure_dirs(&self) -> BatchResult<()> {
        for dir in [&self.pending_dir, &self.archive_dir] {
            fs::create_dir_all(dir).map_err(|e| BatchError::storage(dir, e))?;
        }
        Ok(())
    }

    /// Classify a filename by its (case-insensitive) extension.
    pub fn classify(&self, filename: &str) -> Option<MediaKind> {
        let ext = Path::new(filename)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_ascii_lowercase()))?;
        if self.extensions.images.contains(&ext) {
            Some(MediaKind::Image)
        } else if self.extensions.videos.contains(&ext) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }

    /// List the pending pool, excluding anything already delivered.
    ///
    /// A missing or unreadable pending directory yields empty pools.
    pub fn scan(&self, exclude_delivered: &HashSet<String>) -> PendingPools {
        let mut pools = PendingPools::default();
        let entries = match fs::read_dir(&self.pending_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %self.pending_dir.display(), error = ?e, "[CATALOG] Pending folder unreadable, treating as empty");
                return pools;
            }
        };

        for entry in entries.flatten() {
            // Names are ledger keys and archive paths; a lossy name would not round-trip.
            let filename = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    warn!(file = ?raw, "[CATALOG] Skipping file with a non UTF-8 name");
                    continue;
                }
            };
            if exclude_delivered.contains(&filename) {
                continue;
            }
            let Some(kind) = self.classify(&filename) else {
                continue;
            };
            let meta = match fs::metadata(entry.path()) {
                Ok(m) if m.is_file() => m,
                Ok(_) => continue,
                Err(e) => {
                    warn!(file = %filename, error = ?e, "[CATALOG] Could not stat pending file, skipping");
                    continue;
                }
            };
            let file = MediaFile {
                filename,
                kind,
                size_bytes: meta.len(),
                location: Location::Pending,
                path: entry.path(),
            };
            match kind {
                MediaKind::Image => pools.images.push(file),
                MediaKind::Video => pools.videos.push(file),
            }
        }

        debug!(
            images = pools.images.len(),
            videos = pools.videos.len(),
            "[CATALOG] Scanned pending pool"
        );
        pools
    }

    fn archive_entries(&self) -> Vec<fs::DirEntry> {
        match fs::read_dir(&self.archive_dir) {
            Ok(entries) => entries.flatten().collect(),
            Err(e) => {
                warn!(dir = %self.archive_dir.display(), error = ?e, "[CATALOG] Archive folder unreadable");
                Vec::new()
            }
        }
    }

    pub fn archived_count(&self) -> usize {
        self.archive_entries().len()
    }

    pub fn is_archived(&self, filename: &str) -> bool {
        self.archive_dir.join(filename).is_file()
    }

    pub fn is_pending(&self, filename: &str) -> bool {
        self.pending_dir.join(filename).is_file()
    }

    /// Size of an archived file, if it is still there.
    pub fn archived_size(&self, filename: &str) -> Option<u64> {
        fs::metadata(self.archive_dir.join(filename))
            .ok()
            .filter(|m| m.is_file())
            .map(|m| m.len())
    }

    /// Delete archive entries last modified more than `retention` ago.
    pub fn expire_archive(&self, retention: Duration) -> ExpireReport {
        let cutoff = SystemTime::now()
            .checked_sub(retention)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        self.remove_archive_entries(|modified| modified < cutoff)
    }

    /// Delete every archive entry regardless of age.
    pub fn purge_archive(&self) -> ExpireReport {
        self.remove_archive_entries(|_| true)
    }

    fn remove_archive_entries(&self, should_remove: impl Fn(SystemTime) -> bool) -> ExpireReport {
        let mut report = ExpireReport::default();
        for entry in self.archive_entries() {
            let filename = entry.file_name().to_string_lossy().into_owned();
            let modified = match entry.metadata().and_then(|m| {
                if m.is_file() {
                    m.modified()
                } else {
                    Err(io::Error::new(io::ErrorKind::Other, "not a regular file"))
                }
            }) {
                Ok(t) => t,
                Err(_) => continue,
            };
            if !should_remove(modified) {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => report.removed.push(filename),
                Err(e) => {
                    error!(file = %filename, error = ?e, "[CATALOG] Failed to delete archive entry");
                    report.failed.push(FileFailure::new(filename, e));
                }
            }
        }
        if !report.removed.is_empty() {
            info!(removed = report.removed.len(), failed = report.failed.len(), "[CATALOG] Removed archive entries");
        }
        report
    }

    /// Move a pending file into the archive.
    pub fn archive(&self, filename: &str) -> io::Result<()> {
        move_file(&self.pending_dir.join(filename), &self.archive_dir.join(filename))
    }

    /// Move an archived file back into the pending pool.
    pub fn restore(&self, filename: &str) -> io::Result<()> {
        move_file(&self.archive_dir.join(filename), &self.pending_dir.join(filename))
    }
}

/// Rename, falling back to copy + remove when the two paths are on different filesystems.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if !from.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} does not exist", from.display()),
        ));
    }
    if to.exists() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", to.display()),
        ));
    }
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!(from = %from.display(), to = %to.display(), error = ?e, "rename failed, copying instead");
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
    }
}
