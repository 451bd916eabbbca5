//! Sidecar metadata stored next to media files.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::contract::{Sidecar, SidecarSource};

/// Reads `<media filename>.json`, e.g. `cat.png.json`, with optional `caption` and `tags`.
#[derive(Debug, Clone, Default)]
pub struct JsonSidecar;

#[derive(Deserialize)]
struct SidecarFile {
    #[serde(default)]
    caption: Option<String>,
    #[serde(default)]
    tags: BTreeSet<String>,
}

impl JsonSidecar {
    pub fn sidecar_path(media: &Path) -> PathBuf {
        let mut name = media.file_name().unwrap_or_default().to_os_string();
        name.push(".json");
        media.with_file_name(name)
    }
}

impl SidecarSource for JsonSidecar {
    fn read(&self, path: &Path) -> Option<Sidecar> {
        let sidecar_path = Self::sidecar_path(path);
        let content = fs::read_to_string(&sidecar_path).ok()?;
        match serde_json::from_str::<SidecarFile>(&content) {
            Ok(file) => Some(Sidecar {
                caption: file.caption.filter(|c| !c.trim().is_empty()),
                tags: file.tags,
            }),
            Err(e) => {
                warn!(path = %sidecar_path.display(), error = %e, "Ignoring unreadable sidecar");
                None
            }
        }
    }
}

/// No captions or tags for anything.
#[derive(Debug, Clone, Default)]
pub struct NoSidecar;

impl SidecarSource for NoSidecar {
    fn read(&self, _path: &Path) -> Option<Sidecar> {
        None
    }
}
