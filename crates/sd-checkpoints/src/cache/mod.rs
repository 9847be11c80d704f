//! Strong-hash cache consulted when identifying checkpoints.
//!
//! Full-content SHA256 of a multi-gigabyte checkpoint takes seconds, so
//! results are persisted keyed by a title such as `checkpoint/<name>` and
//! invalidated when the file's modification time moves past the cached one.

mod json;
mod traits;

pub use json::JsonHashCache;
pub use traits::{HashCache, HashEntry};
