use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::error::Result;

type Entries = BTreeMap<String, Vec<String>>;

/// Process-local key → list-of-strings store persisted as a JSON file.
///
/// Every write rewrites the file; the data is small and rebuilt at startup.
#[derive(Debug)]
pub struct LocalCache {
    path: PathBuf,
    entries: Mutex<Entries>,
}

impl LocalCache {
    /// Open the cache at `path`, loading what a previous run left there.
    ///
    /// A file that doesn't parse as a cache is logged and treated as empty;
    /// it gets overwritten on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!("Discarding unreadable cache {}: {}", path.display(), e);
                Entries::new()
            })
        } else {
            Entries::new()
        };
        debug!("Opened cache {} with {} keys", path.display(), entries.len());
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &str) -> Option<Vec<String>> {
        self.lock().get(key).cloned()
    }

    pub fn entries(&self) -> BTreeMap<String, Vec<String>> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn set(&self, key: impl Into<String>, values: Vec<String>) -> Result<()> {
        let mut entries = self.lock();
        entries.insert(key.into(), values);
        self.persist(&entries)
    }

    /// Append `value` under `key` unless it is already there.
    ///
    /// Returns whether the value was added.
    pub fn push_unique(&self, key: &str, value: &str) -> Result<bool> {
        let mut entries = self.lock();
        let values = entries.entry(key.to_string()).or_default();
        if values.iter().any(|v| v == value) {
            return Ok(false);
        }
        values.push(value.to_string());
        self.persist(&entries)?;
        Ok(true)
    }

    /// Swap the whole content for `replacement`.
    pub fn replace_all(&self, replacement: BTreeMap<String, Vec<String>>) -> Result<()> {
        let mut entries = self.lock();
        *entries = replacement;
        self.persist(&entries)
    }

    pub fn clear(&self) -> Result<()> {
        info!("Clearing cache {}", self.path.display());
        self.replace_all(Entries::new())
    }

    fn persist(&self, entries: &Entries) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
