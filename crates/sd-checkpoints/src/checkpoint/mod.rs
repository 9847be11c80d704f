//! Checkpoint identity: naming, hashing, metadata extraction and registry.

pub mod hashing;
mod info;
mod loader;
pub mod safetensors;
mod registry;

pub use info::{CheckpointInfo, SHORTHASH_LEN};
pub use loader::{CheckpointLoader, LocalCheckpointLoader};
pub use registry::{CheckpointId, CheckpointRegistry};
