//! Whole-file JSON persistence with a single-writer lock.
//!
//! Every ledger is read in full, mutated in memory and rewritten in full. Writes go
//! to a temporary sibling file that is then renamed over the target, so readers never
//! observe a half-written ledger.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::error::StoreError;

#[derive(Debug)]
pub struct JsonStore<T> {
    path: PathBuf,
    lock: Mutex<()>,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T> JsonStore<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current value. An absent file is the default value.
    pub async fn load(&self) -> Result<T, StoreError> {
        let _guard = self.lock.lock().await;
        read_json(&self.path)
    }

    /// Read, mutate and rewrite under the writer lock. Returns whatever `f` returns.
    pub async fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R, StoreError> {
        let _guard = self.lock.lock().await;
        let mut value = read_json(&self.path)?;
        let out = f(&mut value);
        write_json(&self.path, &value)?;
        Ok(out)
    }

    /// Replace the stored value outright.
    pub async fn save(&self, value: &T) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        write_json(&self.path, value)
    }
}

fn read_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T, StoreError> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Ledger absent, using default");
            return Ok(T::default());
        }
        Err(source) => {
            return Err(StoreError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    if content.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(&content).map_err(|source| {
        error!(path = %path.display(), error = %source, "Ledger is malformed");
        StoreError::Malformed {
            path: path.to_path_buf(),
            source,
        }
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let write_err = |source: io::Error| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(write_err)?;

    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| write_err(io::Error::new(io::ErrorKind::InvalidData, e)))?;
    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(write_err)?;
    tmp.write_all(&json).map_err(write_err)?;
    tmp.flush().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    #[tokio::test]
    async fn absent_file_loads_default_and_update_persists() {
        let tmp = tempdir().unwrap();
        let store: JsonStore<BTreeMap<String, u32>> = JsonStore::new(tmp.path().join("x.json"));

        assert!(store.load().await.unwrap().is_empty());

        let n = store
            .update(|m| {
                m.insert("a".into(), 1);
                m.len()
            })
            .await
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(store.load().await.unwrap().get("a"), Some(&1));
    }

    #[tokio::test]
    async fn malformed_file_is_an_error_and_is_left_alone() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("x.json");
        fs::write(&path, "{not json").unwrap();
        let store: JsonStore<BTreeMap<String, u32>> = JsonStore::new(&path);

        assert!(matches!(store.load().await, Err(StoreError::Malformed { .. })));
        assert!(store.update(|m| m.clear()).await.is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "{not json");
    }
}
