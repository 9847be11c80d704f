//! Identity record for a single checkpoint file.

use super::hashing::model_hash;
use super::loader::{CheckpointLoader, LocalCheckpointLoader};
use super::safetensors::read_metadata;
use crate::cache::HashCache;
use crate::config::{CheckpointPaths, FormatConfig, PathsConfig};
use crate::error::Result;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{error, warn};

/// Number of leading sha256 hex chars used as the short hash.
pub const SHORTHASH_LEN: usize = 10;

/// Every identifier a checkpoint is known by, plus its embedded metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckpointInfo {
    /// Path of the file on disk.
    pub filename: PathBuf,
    /// Path relative to the checkpoint root, `/`-separated.
    pub name: String,
    /// File stem.
    pub name_for_extra: String,
    /// `name` flattened with `_` and without extension.
    pub model_name: String,
    /// Legacy 8-char weak hash, `"NOFILE"` for a missing file.
    pub hash: String,
    /// Full content hash, once known.
    pub sha256: Option<String>,
    /// First ten chars of `sha256`.
    pub shorthash: Option<String>,
    /// Canonical display and lookup key.
    pub title: String,
    /// Aliases in registration order; only ever grows.
    pub ids: Vec<String>,
    /// `__metadata__` of a safetensors header.
    pub metadata: Map<String, Value>,
}

impl CheckpointInfo {
    /// Build the record for a file on the local filesystem.
    pub fn new(
        filename: impl Into<PathBuf>,
        paths: &CheckpointPaths,
        cache: &dyn HashCache,
    ) -> Result<Self> {
        let filename = filename.into();
        let loader = LocalCheckpointLoader::new(&filename, paths);
        Self::with_loader(filename, &loader, cache)
    }

    /// Build the record using names supplied by `loader`.
    ///
    /// Only reads the cached strong hash; see
    /// [`CheckpointRegistry::calculate_shorthash`](super::CheckpointRegistry::calculate_shorthash)
    /// to compute it.
    pub fn with_loader(
        filename: impl Into<PathBuf>,
        loader: &dyn CheckpointLoader,
        cache: &dyn HashCache,
    ) -> Result<Self> {
        let filename = filename.into();

        let name = loader.name();
        let name_for_extra = loader.name_for_extra();
        let model_name = loader.model_name();
        let hash = model_hash(&filename)?;

        let sha256 = cache.cached_sha256(&filename, &cache_key(&name));
        let shorthash = sha256.as_deref().map(shorten);

        let title = make_title(&name, shorthash.as_deref());

        let mut ids = vec![
            hash.clone(),
            model_name.clone(),
            title.clone(),
            name.clone(),
            format!("{} [{}]", name, hash),
        ];
        if let (Some(shorthash), Some(sha256)) = (&shorthash, &sha256) {
            ids.extend(shorthash_ids(&name, shorthash, sha256));
        }

        let metadata = if is_safetensors(&filename) {
            read_metadata(&filename).unwrap_or_else(|e| {
                if e.is_format_error() {
                    error!(
                        "Error reading checkpoint metadata: {}: {}",
                        filename.display(),
                        e
                    );
                } else {
                    warn!(
                        "Could not open checkpoint for metadata: {}: {}",
                        filename.display(),
                        e
                    );
                }
                Map::new()
            })
        } else {
            Map::new()
        };

        Ok(Self {
            filename,
            name,
            name_for_extra,
            model_name,
            hash,
            sha256,
            shorthash,
            title,
            ids,
            metadata,
        })
    }

    /// Key of this checkpoint in the hash cache.
    pub fn cache_key(&self) -> String {
        cache_key(&self.name)
    }

    /// Record a freshly computed strong hash.
    ///
    /// Sets `sha256`, `shorthash` and `title`, and appends the shorthash
    /// aliases unless the shorthash is already among `ids`. Returns the
    /// shorthash.
    pub(crate) fn apply_sha256(&mut self, sha256: String) -> String {
        let shorthash = shorten(&sha256);
        if !self.ids.contains(&shorthash) {
            let extra = shorthash_ids(&self.name, &shorthash, &sha256);
            self.ids.extend(extra);
        }
        self.title = make_title(&self.name, Some(&shorthash));
        self.sha256 = Some(sha256);
        self.shorthash = Some(shorthash.clone());
        shorthash
    }
}

fn cache_key(name: &str) -> String {
    format!("{}/{}", PathsConfig::CHECKPOINT_CACHE_PREFIX, name)
}

fn shorten(sha256: &str) -> String {
    sha256.chars().take(SHORTHASH_LEN).collect()
}

fn make_title(name: &str, shorthash: Option<&str>) -> String {
    match shorthash {
        Some(shorthash) => format!("{} [{}]", name, shorthash),
        None => name.to_string(),
    }
}

fn shorthash_ids(name: &str, shorthash: &str, sha256: &str) -> [String; 3] {
    [
        shorthash.to_string(),
        sha256.to_string(),
        format!("{} [{}]", name, shorthash),
    ]
}

fn is_safetensors(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(FormatConfig::SAFETENSORS_EXTENSION))
}
