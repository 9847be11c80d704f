//! JSON-file backed hash cache.
//!
//! File layout, shared with other subsystems that keep their own sections:
//!
//! ```json
//! {"hashes": {"checkpoint/model.safetensors": {"mtime": 1700000000.0, "sha256": "..."}}}
//! ```

use super::traits::{HashCache, HashEntry};
use crate::checkpoint::hashing::compute_sha256;
use crate::metadata::{atomic_read_json, atomic_write_json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::UNIX_EPOCH;
use tracing::{debug, info, warn};

/// On-disk layout. Entries stay raw JSON so one malformed entry reads as a
/// miss instead of failing the whole file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    hashes: BTreeMap<String, Value>,
    /// Sections owned by other subsystems, preserved on write.
    #[serde(flatten)]
    other: BTreeMap<String, Value>,
}

/// Hash cache persisted to a JSON file with atomic writes.
///
/// Interior mutability lets a single cache be shared by reference while
/// records compute hashes through it.
#[derive(Debug)]
pub struct JsonHashCache {
    /// Backing file; `None` when in memory or when the file could not be
    /// parsed and must not be overwritten.
    path: Option<PathBuf>,
    hashing_enabled: bool,
    data: Mutex<CacheFile>,
}

impl JsonHashCache {
    /// Open the cache stored at `path`.
    ///
    /// A missing file starts an empty cache. A file that is not a JSON object
    /// is logged and left untouched: new hashes are then kept in memory only.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (data, path) = match atomic_read_json::<CacheFile>(&path) {
            Ok(data) => (data.unwrap_or_default(), Some(path)),
            Err(e) => {
                warn!(
                    "Failed to read hash cache {}, new hashes will not be saved: {}",
                    path.display(),
                    e
                );
                (CacheFile::default(), None)
            }
        };
        debug!("Loaded {} cached hashes", data.hashes.len());

        Self {
            path,
            hashing_enabled: true,
            data: Mutex::new(data),
        }
    }

    /// Cache that lives only in memory.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            hashing_enabled: true,
            data: Mutex::new(CacheFile::default()),
        }
    }

    /// Enable or disable computing new hashes. Cached reads are unaffected.
    pub fn with_hashing(mut self, enabled: bool) -> Self {
        self.hashing_enabled = enabled;
        self
    }

    /// Number of well-formed cached hashes.
    pub fn len(&self) -> usize {
        self.lock()
            .hashes
            .values()
            .filter(|value| parse_entry(value).is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entry for `title`, regardless of freshness. Malformed entries read as
    /// absent.
    pub fn entry(&self, title: &str) -> Option<HashEntry> {
        self.lock().hashes.get(title).and_then(parse_entry)
    }

    fn lock(&self) -> MutexGuard<'_, CacheFile> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, data: &CacheFile) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = atomic_write_json(path, data) {
            warn!("Failed to save hash cache {}: {}", path.display(), e);
        }
    }
}

fn parse_entry(value: &Value) -> Option<HashEntry> {
    serde_json::from_value(value.clone()).ok()
}

impl HashCache for JsonHashCache {
    fn cached_sha256(&self, filename: &Path, title: &str) -> Option<String> {
        let entry = self.entry(title)?;
        let ondisk_mtime = file_mtime(filename)?;
        if ondisk_mtime > entry.mtime {
            return None;
        }
        Some(entry.sha256)
    }

    fn sha256(&self, filename: &Path, title: &str) -> Option<String> {
        if let Some(sha256) = self.cached_sha256(filename, title) {
            return Some(sha256);
        }

        if !self.hashing_enabled {
            return None;
        }

        let mtime = file_mtime(filename)?;

        info!("Calculating sha256 for {}", filename.display());
        let sha256 = match compute_sha256(filename) {
            Ok(sha256) => sha256,
            Err(e) => {
                warn!("Failed to hash {}: {}", filename.display(), e);
                return None;
            }
        };
        info!("{}: {}", title, sha256);

        let mut data = self.lock();
        let entry = HashEntry {
            mtime,
            sha256: sha256.clone(),
        };
        match serde_json::to_value(entry) {
            Ok(value) => {
                data.hashes.insert(title.to_string(), value);
            }
            Err(e) => warn!("Failed to encode hash entry for {}: {}", title, e),
        }
        self.persist(&data);

        Some(sha256)
    }
}

fn file_mtime(path: &Path) -> Option<f64> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(modified.duration_since(UNIX_EPOCH).ok()?.as_secs_f64())
}
