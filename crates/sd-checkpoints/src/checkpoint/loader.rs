//! Name derivation for checkpoint files.
//!
//! Every name is derived twice: once with the current path-based rules and
//! once with the legacy string rules older installs were built on. When the
//! two disagree a warning is logged and the legacy name wins, so existing
//! aliases and cache keys keep resolving.

use crate::config::CheckpointPaths;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Source of the name variants that identify a checkpoint.
///
/// The local filesystem is the only built-in strategy; other sources
/// (remote or virtual paths) implement the same three operations.
pub trait CheckpointLoader {
    /// Path relative to the checkpoint root, with `/` separators.
    fn name(&self) -> String;

    /// File stem, used when referencing the checkpoint from prompts.
    fn name_for_extra(&self) -> String;

    /// Filesystem-safe identifier: `name()` with separators replaced by `_`
    /// and the extension removed.
    fn model_name(&self) -> String {
        let flat = self.name().replace(['/', '\\'], "_");
        split_extension(&flat).0.to_string()
    }
}

/// Loader for checkpoints stored on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalCheckpointLoader {
    path: PathBuf,
    paths: CheckpointPaths,
}

impl LocalCheckpointLoader {
    pub fn new(path: impl Into<PathBuf>, paths: &CheckpointPaths) -> Self {
        Self {
            path: path.into(),
            paths: paths.clone(),
        }
    }

    /// Component-wise path relative to the checkpoint root.
    fn relative_name(&self) -> Option<String> {
        self.path
            .strip_prefix(self.paths.model_path())
            .ok()
            .map(|rel| normalize_separators(&rel.to_string_lossy()))
    }

    /// String derivation: override dir, then checkpoint root, then the bare
    /// file name. The matched root is removed wherever it occurs in the path,
    /// not only as a prefix.
    fn legacy_name(&self) -> String {
        let abspath = std::path::absolute(&self.path).unwrap_or_else(|_| self.path.clone());
        let abspath = abspath.to_string_lossy();
        let model_path = self.paths.model_path().to_string_lossy();

        let name = match self.paths.ckpt_dir().map(|dir| dir.to_string_lossy()) {
            Some(ckpt_dir) if abspath.starts_with(&*ckpt_dir) => abspath.replace(&*ckpt_dir, ""),
            _ if abspath.starts_with(&*model_path) => abspath.replace(&*model_path, ""),
            _ => file_name(&self.path),
        };

        let name = name.strip_prefix(['/', '\\']).unwrap_or(name.as_str());
        normalize_separators(name)
    }

    fn legacy_name_for_extra(&self) -> String {
        split_extension(&file_name(&self.path)).0.to_string()
    }
}

impl CheckpointLoader for LocalCheckpointLoader {
    fn name(&self) -> String {
        let legacy = self.legacy_name();
        match self.relative_name() {
            Some(name) if name == legacy => name,
            Some(name) => prefer_legacy(legacy, &name),
            None => prefer_legacy(legacy, &self.path.to_string_lossy()),
        }
    }

    fn name_for_extra(&self) -> String {
        let legacy = self.legacy_name_for_extra();
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        if stem == legacy {
            stem
        } else {
            prefer_legacy(legacy, &stem)
        }
    }
}

fn prefer_legacy(legacy: String, derived: &str) -> String {
    warn!(
        "{} != {}! This only means that new behavior isn't compatible with the old one. \
         Currently we will use old-style name.",
        legacy, derived
    );
    legacy
}

fn normalize_separators(name: &str) -> String {
    name.replace('\\', "/")
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Split off the last extension. A dot that only leads the final component
/// (like `.hidden`) does not start an extension.
pub(crate) fn split_extension(name: &str) -> (&str, &str) {
    let base_start = name.rfind(['/', '\\']).map(|i| i + 1).unwrap_or(0);
    let base = &name[base_start..];
    let leading_dots = base.len() - base.trim_start_matches('.').len();
    match base.rfind('.') {
        Some(dot) if dot >= leading_dots => name.split_at(base_start + dot),
        _ => (name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tracing_test::traced_test;

    fn paths_in(root: &Path, ckpt_dir: Option<PathBuf>) -> CheckpointPaths {
        CheckpointPaths::new(root, ckpt_dir)
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("model.safetensors"), ("model", ".safetensors"));
        assert_eq!(split_extension("a.b.ckpt"), ("a.b", ".ckpt"));
        assert_eq!(split_extension("noext"), ("noext", ""));
        assert_eq!(split_extension(".hidden"), (".hidden", ""));
        assert_eq!(split_extension("dir.v1/model"), ("dir.v1/model", ""));
    }

    #[test]
    fn test_name_relative_to_model_root() {
        let temp_dir = TempDir::new().unwrap();
        let paths = paths_in(temp_dir.path(), None);
        let file = paths.model_path().join("sdxl").join("base.safetensors");

        let loader = LocalCheckpointLoader::new(&file, &paths);
        assert_eq!(loader.name(), "sdxl/base.safetensors");
        assert_eq!(loader.name_for_extra(), "base");
        assert_eq!(loader.model_name(), "sdxl_base");
    }

    #[test]
    fn test_name_outside_roots_is_file_name() {
        let temp_dir = TempDir::new().unwrap();
        let paths = paths_in(&temp_dir.path().join("models"), None);
        let file = temp_dir.path().join("elsewhere").join("v1-5.ckpt");

        let loader = LocalCheckpointLoader::new(&file, &paths);
        assert_eq!(loader.name(), "v1-5.ckpt");
        assert_eq!(loader.model_name(), "v1-5");
    }

    #[test]
    fn test_name_under_override_dir_prefers_legacy() {
        let temp_dir = TempDir::new().unwrap();
        let ckpt_dir = temp_dir.path().join("extra");
        let paths = paths_in(&temp_dir.path().join("models"), Some(ckpt_dir.clone()));
        let file = ckpt_dir.join("anime").join("model.ckpt");

        let loader = LocalCheckpointLoader::new(&file, &paths);
        assert_eq!(loader.name(), "anime/model.ckpt");
        assert_eq!(loader.model_name(), "anime_model");
    }

    #[test]
    fn test_override_dir_with_unrelated_path_degrades() {
        let temp_dir = TempDir::new().unwrap();
        let paths = paths_in(
            &temp_dir.path().join("models"),
            Some(temp_dir.path().join("extra")),
        );
        let loader = LocalCheckpointLoader::new("relative/only.safetensors", &paths);
        assert_eq!(loader.name(), "only.safetensors");
        assert_eq!(loader.name_for_extra(), "only");
    }

    #[test]
    fn test_root_repeated_in_path_is_removed_everywhere() {
        let temp_dir = TempDir::new().unwrap();
        let ckpt_dir = temp_dir.path().join("extra");
        let paths = paths_in(&temp_dir.path().join("models"), Some(ckpt_dir.clone()));
        let file = PathBuf::from(format!(
            "{}{}/a.ckpt",
            ckpt_dir.display(),
            ckpt_dir.display()
        ));

        let loader = LocalCheckpointLoader::new(&file, &paths);
        assert_eq!(loader.name(), "a.ckpt");
    }

    #[test]
    #[traced_test]
    fn test_unrelated_path_logs_compatibility_warning() {
        let temp_dir = TempDir::new().unwrap();
        let paths = paths_in(
            &temp_dir.path().join("models"),
            Some(temp_dir.path().join("extra")),
        );
        let loader = LocalCheckpointLoader::new("relative/only.safetensors", &paths);
        assert_eq!(loader.name(), "only.safetensors");
        assert!(logs_contain("only.safetensors !="));
        assert!(logs_contain("old-style name"));
    }

    #[test]
    #[traced_test]
    fn test_override_dir_file_logs_compatibility_warning() {
        let temp_dir = TempDir::new().unwrap();
        let ckpt_dir = temp_dir.path().join("extra");
        let paths = paths_in(&temp_dir.path().join("models"), Some(ckpt_dir.clone()));
        let loader = LocalCheckpointLoader::new(ckpt_dir.join("model.ckpt"), &paths);
        assert_eq!(loader.name(), "model.ckpt");
        assert!(logs_contain("model.ckpt !="));
        assert!(logs_contain("old-style name"));
    }

    #[test]
    #[traced_test]
    fn test_model_root_file_logs_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let paths = paths_in(temp_dir.path(), None);
        let loader = LocalCheckpointLoader::new(paths.model_path().join("sub/m.ckpt"), &paths);
        assert_eq!(loader.name(), "sub/m.ckpt");
        assert_eq!(loader.name_for_extra(), "m");
        assert!(!logs_contain("old-style name"));
    }

    #[test]
    fn test_name_for_extra_multiple_dots() {
        let temp_dir = TempDir::new().unwrap();
        let paths = paths_in(temp_dir.path(), None);
        let file = paths.model_path().join("v2.1.768.safetensors");

        let loader = LocalCheckpointLoader::new(&file, &paths);
        assert_eq!(loader.name_for_extra(), "v2.1.768");
        assert_eq!(loader.model_name(), "v2.1.768");
    }

    struct FixedLoader;

    impl CheckpointLoader for FixedLoader {
        fn name(&self) -> String {
            "remote\\sub/model.v2.ckpt".to_string()
        }

        fn name_for_extra(&self) -> String {
            "model.v2".to_string()
        }
    }

    #[test]
    fn test_default_model_name_flattens_both_separators() {
        assert_eq!(FixedLoader.model_name(), "remote_sub_model.v2");
    }
}
