//! File Store Module
//!
//! Durable store persisted as a single JSON object of `key -> text`.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::error::{CacheError, Result};
use crate::store::{KvStore, SharedStore};

// == File Store ==
/// Keeps every slot in one JSON file.
///
/// The whole map is held in memory; each mutation rewrites the file by
/// writing a sibling temp file and renaming it over the original.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    items: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    // == Open ==
    /// Opens the store at `path`. A missing file starts empty and is created
    /// on the first write.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let items = read_items(&path)?;
        debug!("Opened file store at {} with {} keys", path.display(), items.len());

        Ok(Self {
            path,
            items: RwLock::new(items),
        })
    }

    /// Opens the store and wraps it for sharing between entries.
    pub fn open_shared(path: impl AsRef<Path>) -> Result<SharedStore> {
        Ok(Arc::new(Self::open(path)?))
    }

    // == Path ==
    pub fn path(&self) -> &Path {
        &self.path
    }

    // == Reload ==
    /// Re-reads the backing file, picking up changes made by other writers.
    pub fn reload(&self) -> Result<()> {
        let fresh = read_items(&self.path)?;
        let mut items = self.items.write().map_err(|_| poisoned())?;
        *items = fresh;
        Ok(())
    }

    fn persist(&self, items: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = temp_path(&self.path);
        fs::write(&tmp, serde_json::to_vec_pretty(items)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Sibling path the store is staged at before the rename: `<file name>.tmp`.
fn temp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

fn read_items(path: &Path) -> Result<BTreeMap<String, String>> {
    match fs::read(path) {
        Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(err) => Err(err.into()),
    }
}

fn poisoned() -> CacheError {
    CacheError::Store("file store lock poisoned".to_string())
}

impl KvStore for FileStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let items = self.items.read().map_err(|_| poisoned())?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self.items.write().map_err(|_| poisoned())?;
        items.insert(key.to_string(), value.to_string());
        self.persist(&items)
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let mut items = self.items.write().map_err(|_| poisoned())?;
        if items.remove(key).is_some() {
            self.persist(&items)?;
        }
        Ok(())
    }
}
