//! Hash cache trait and types.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// A cached strong hash together with the file mtime it was computed for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashEntry {
    /// File modification time in seconds since the Unix epoch.
    pub mtime: f64,
    /// SHA256 as lowercase hex.
    pub sha256: String,
}

/// Source of strong content hashes.
///
/// Both operations report absence with `None` rather than an error: a miss,
/// a stale entry, a missing file or a failed computation all mean the
/// checkpoint simply has no strong hash yet.
pub trait HashCache {
    /// Return the cached hash for `title` if it is still valid for `filename`.
    ///
    /// Never computes a hash.
    fn cached_sha256(&self, filename: &Path, title: &str) -> Option<String>;

    /// Return the hash for `title`, computing and storing it on a miss.
    fn sha256(&self, filename: &Path, title: &str) -> Option<String>;
}
