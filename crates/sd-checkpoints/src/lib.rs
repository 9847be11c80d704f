//! Identification and registration of Stable Diffusion checkpoint files.
//!
//! Each checkpoint gets a [`CheckpointInfo`] carrying every name and hash it
//! can be referred to by: the path-derived names, the legacy weak hash, and
//! the full SHA256 once it has been computed. A [`CheckpointRegistry`] maps
//! titles and aliases back to records.
//!
//! # Example
//!
//! ```rust,no_run
//! use sd_checkpoints::{CheckpointPaths, CheckpointRegistry, JsonHashCache};
//!
//! let paths = CheckpointPaths::new("/data/models", None);
//! let cache = JsonHashCache::open("cache.json");
//!
//! let mut registry = CheckpointRegistry::new();
//! registry.rescan(&paths, &cache);
//!
//! if let Some(id) = registry.closest_match("v1-5-pruned") {
//!     let shorthash = registry.calculate_shorthash(id, &cache);
//!     println!("{:?}", shorthash);
//! }
//! ```

pub mod cache;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod metadata;

pub use cache::{HashCache, HashEntry, JsonHashCache};
pub use checkpoint::{
    CheckpointId, CheckpointInfo, CheckpointLoader, CheckpointRegistry, LocalCheckpointLoader,
};
pub use config::{CheckpointConfig, CheckpointPaths};
pub use error::{CheckpointError, Result};
