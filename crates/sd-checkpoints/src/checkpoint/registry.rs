//! Registry of discovered checkpoints.
//!
//! Records live in an arena owned by the registry and are referenced by
//! [`CheckpointId`]. Two tables point into it: one keyed by title, one keyed
//! by every alias a record has ever had. Titles move when a strong hash gets
//! computed; aliases are only ever added.

use super::info::CheckpointInfo;
use crate::cache::HashCache;
use crate::config::{CheckpointPaths, FormatConfig};
use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Trailing ` [checksum]` on a lookup string.
static TRAILING_CHECKSUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\[[^\]]+\]\s*$").expect("valid checksum regex"));

/// Handle to a record stored in a [`CheckpointRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CheckpointId(usize);

/// Title and alias lookup over every known checkpoint.
#[derive(Debug, Default)]
pub struct CheckpointRegistry {
    records: Vec<CheckpointInfo>,
    titles: HashMap<String, CheckpointId>,
    aliases: HashMap<String, CheckpointId>,
}

impl CheckpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a record and register it.
    pub fn insert(&mut self, info: CheckpointInfo) -> CheckpointId {
        let id = CheckpointId(self.records.len());
        self.records.push(info);
        self.register(id);
        id
    }

    /// Point the record's title and every alias at it.
    ///
    /// Overwrites entries that currently point at other records. Calling it
    /// again without changes to the record is a no-op.
    pub fn register(&mut self, id: CheckpointId) {
        let Some(info) = self.records.get(id.0) else {
            return;
        };
        self.titles.insert(info.title.clone(), id);
        for alias in &info.ids {
            self.aliases.insert(alias.clone(), id);
        }
    }

    /// Compute the strong hash of a record and re-key it under its new title.
    ///
    /// Returns the shorthash, or `None` (leaving the record untouched) if
    /// the file could not be hashed.
    pub fn calculate_shorthash(
        &mut self,
        id: CheckpointId,
        cache: &dyn HashCache,
    ) -> Option<String> {
        let info = self.records.get(id.0)?;
        let sha256 = cache.sha256(&info.filename, &info.cache_key())?;

        let old_title = info.title.clone();
        if self.titles.get(&old_title) == Some(&id) {
            self.titles.remove(&old_title);
        }

        let info = &mut self.records[id.0];
        let shorthash = info.apply_sha256(sha256);
        debug!("Re-registered {} as {}", old_title, info.title);

        self.register(id);
        Some(shorthash)
    }

    pub fn get(&self, id: CheckpointId) -> Option<&CheckpointInfo> {
        self.records.get(id.0)
    }

    /// Record currently registered under `title`.
    pub fn by_title(&self, title: &str) -> Option<&CheckpointInfo> {
        self.titles.get(title).and_then(|id| self.get(*id))
    }

    /// Record currently registered under `alias`.
    pub fn by_alias(&self, alias: &str) -> Option<&CheckpointInfo> {
        self.id_by_alias(alias).and_then(|id| self.get(id))
    }

    pub fn id_by_alias(&self, alias: &str) -> Option<CheckpointId> {
        self.aliases.get(alias).copied()
    }

    /// Number of registered titles.
    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    /// Registered titles with their records, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (CheckpointId, &CheckpointInfo)> + '_ {
        self.titles
            .values()
            .filter_map(|id| self.get(*id).map(|info| (*id, info)))
    }

    /// Registered titles in natural, case-insensitive order.
    pub fn checkpoint_tiles(&self) -> Vec<String> {
        let mut titles: Vec<String> = self.titles.keys().cloned().collect();
        titles.sort_by(|a, b| natural_cmp(a, b));
        titles
    }

    /// Resolve a user-supplied reference to a checkpoint.
    ///
    /// Tries an exact alias, then the shortest title containing `search`,
    /// then the same with a trailing `[checksum]` removed from `search`.
    pub fn closest_match(&self, search: &str) -> Option<CheckpointId> {
        if search.is_empty() {
            return None;
        }

        if let Some(id) = self.id_by_alias(search) {
            return Some(id);
        }

        if let Some(id) = self.shortest_title_containing(search) {
            return Some(id);
        }

        let without_checksum = TRAILING_CHECKSUM.replace(search, "");
        self.shortest_title_containing(&without_checksum)
    }

    /// Ties go to the earliest registered record.
    fn shortest_title_containing(&self, needle: &str) -> Option<CheckpointId> {
        self.titles
            .iter()
            .filter(|(title, _)| title.contains(needle))
            .map(|(title, id)| (title.len(), *id))
            .min()
            .map(|(_, id)| id)
    }

    /// Drop every record and both tables.
    pub fn clear(&mut self) {
        self.records.clear();
        self.titles.clear();
        self.aliases.clear();
    }

    /// Rebuild the registry from the checkpoint directories on disk.
    ///
    /// Walks the checkpoint root and, if configured, the override directory
    /// for `.ckpt` and `.safetensors` files, skipping VAEs. Records that fail
    /// to build are logged and skipped. Returns the number of registered
    /// titles.
    pub fn rescan(&mut self, paths: &CheckpointPaths, cache: &dyn HashCache) -> usize {
        self.clear();

        let mut roots = vec![paths.model_path()];
        if let Some(ckpt_dir) = paths.ckpt_dir() {
            if ckpt_dir.is_dir() && !roots.contains(&ckpt_dir) {
                roots.push(ckpt_dir);
            }
        }

        for filename in discover_checkpoints(&roots) {
            match CheckpointInfo::new(&filename, paths, cache) {
                Ok(info) => {
                    self.insert(info);
                }
                Err(e) => warn!("Skipping checkpoint {}: {}", filename.display(), e),
            }
        }

        info!("Registered {} checkpoints", self.len());
        self.len()
    }
}

/// Checkpoint files under `roots`, sorted and deduplicated.
fn discover_checkpoints(roots: &[&Path]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = roots
        .iter()
        .flat_map(|root| {
            WalkDir::new(root)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_checkpoint_file(path))
        .collect();
    files.sort();
    files.dedup();
    files
}

fn is_checkpoint_file(path: &Path) -> bool {
    let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_lowercase()) else {
        return false;
    };
    FormatConfig::CHECKPOINT_EXTENSIONS
        .iter()
        .any(|ext| name.ends_with(ext))
        && !FormatConfig::EXCLUDED_SUFFIXES
            .iter()
            .any(|suffix| name.ends_with(suffix))
}

/// Compare strings case-insensitively, ordering digit runs by numeric value.
fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (mut a_chars, mut b_chars) = (a.chars().peekable(), b.chars().peekable());
    loop {
        match (a_chars.peek().copied(), b_chars.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let x_run = take_digits(&mut a_chars);
                let y_run = take_digits(&mut b_chars);
                let ord = compare_digit_runs(&x_run, &y_run);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                let ord = x.to_lowercase().cmp(y.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                a_chars.next();
                b_chars.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = chars.next_if(|c| c.is_ascii_digit()) {
        run.push(c);
    }
    run
}

fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
