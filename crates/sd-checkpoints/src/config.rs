//! Centralized configuration for checkpoint discovery.
//!
//! Constants describing the on-disk layout live on unit structs, the way the
//! rest of the application groups its tunables. Runtime paths come from
//! [`CheckpointConfig`], which the host application or the CLI fills in.

use crate::error::{CheckpointError, Result};
use crate::metadata::atomic_read_json;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory and file name conventions.
pub struct PathsConfig;

impl PathsConfig {
    /// Subdirectory of the models path that holds checkpoints.
    pub const MODEL_DIR_NAME: &'static str = "Stable-diffusion";
    /// Default file name of the persistent hash cache.
    pub const HASH_CACHE_FILENAME: &'static str = "cache.json";
    /// Prefix for strong-hash cache keys of checkpoints.
    pub const CHECKPOINT_CACHE_PREFIX: &'static str = "checkpoint";
}

/// Checkpoint file format conventions.
pub struct FormatConfig;

impl FormatConfig {
    /// Extensions (lowercase, with dot) recognized as checkpoints.
    pub const CHECKPOINT_EXTENSIONS: &'static [&'static str] = &[".ckpt", ".safetensors"];
    /// Suffixes (lowercase) of VAE files that share a checkpoint extension.
    pub const EXCLUDED_SUFFIXES: &'static [&'static str] = &[".vae.ckpt", ".vae.safetensors"];
    /// Extension of the single-file container with a JSON header.
    pub const SAFETENSORS_EXTENSION: &'static str = "safetensors";
    /// Upper bound accepted for a safetensors JSON header (100 MB).
    pub const MAX_HEADER_BYTES: u64 = 100_000_000;
}

/// Byte window used by the legacy weak hash.
pub struct WeakHashConfig;

impl WeakHashConfig {
    pub const OFFSET: u64 = 0x100000;
    pub const LENGTH: u64 = 0x10000;
    pub const HEX_LEN: usize = 8;
    /// Returned instead of a hash when the file does not exist.
    pub const MISSING_FILE: &'static str = "NOFILE";
}

/// Resolved directories consulted when naming and discovering checkpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointPaths {
    model_path: PathBuf,
    ckpt_dir: Option<PathBuf>,
}

impl CheckpointPaths {
    /// Build from the application's models directory.
    ///
    /// The checkpoint root is `<models_path>/Stable-diffusion`, made absolute.
    /// `ckpt_dir` is an optional override directory and is kept as given.
    pub fn new(models_path: impl AsRef<Path>, ckpt_dir: Option<PathBuf>) -> Self {
        let model_path = absolute(&models_path.as_ref().join(PathsConfig::MODEL_DIR_NAME));
        Self {
            model_path,
            ckpt_dir,
        }
    }

    /// Absolute checkpoint root directory.
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Override directory, if configured.
    pub fn ckpt_dir(&self) -> Option<&Path> {
        self.ckpt_dir.as_deref()
    }
}

/// Runtime configuration, typically deserialized from a JSON file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// Directory containing the `Stable-diffusion` checkpoint folder.
    pub models_path: PathBuf,
    /// Extra directory whose checkpoints are named relative to itself.
    pub ckpt_dir: Option<PathBuf>,
    /// Location of the hash cache; defaults to `cache.json` in the working directory.
    pub hash_cache_path: Option<PathBuf>,
    /// Never compute strong hashes, only read cached ones.
    pub no_hashing: bool,
}

impl CheckpointConfig {
    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        atomic_read_json(path)?.ok_or_else(|| CheckpointError::Config {
            message: format!("config file {} does not exist", path.display()),
        })
    }

    /// Resolved paths for this configuration.
    pub fn paths(&self) -> CheckpointPaths {
        CheckpointPaths::new(&self.models_path, self.ckpt_dir.clone())
    }

    /// Hash cache file, falling back to the default file name.
    pub fn hash_cache_path(&self) -> PathBuf {
        self.hash_cache_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(PathsConfig::HASH_CACHE_FILENAME))
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_model_path_appends_model_dir() {
        let temp_dir = TempDir::new().unwrap();
        let paths = CheckpointPaths::new(temp_dir.path(), None);
        assert_eq!(
            paths.model_path(),
            temp_dir.path().join("Stable-diffusion")
        );
        assert!(paths.ckpt_dir().is_none());
    }

    #[test]
    fn test_relative_models_path_is_made_absolute() {
        let paths = CheckpointPaths::new("models", None);
        assert!(paths.model_path().is_absolute());
        assert!(paths.model_path().ends_with("models/Stable-diffusion"));
    }

    #[test]
    fn test_config_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"models_path": "/data/models", "ckpt_dir": "/extra", "no_hashing": true}"#,
        )
        .unwrap();

        let config = CheckpointConfig::load(&path).unwrap();
        assert_eq!(config.models_path, PathBuf::from("/data/models"));
        assert_eq!(config.ckpt_dir, Some(PathBuf::from("/extra")));
        assert!(config.no_hashing);
        assert_eq!(config.hash_cache_path(), PathBuf::from("cache.json"));
        assert_eq!(
            config.paths().model_path(),
            Path::new("/data/models/Stable-diffusion")
        );
    }

    #[test]
    fn test_config_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = CheckpointConfig::load(&temp_dir.path().join("missing.json"));
        assert!(matches!(result, Err(CheckpointError::Config { .. })));
    }
}
