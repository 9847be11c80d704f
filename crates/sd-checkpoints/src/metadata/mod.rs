//! JSON persistence helpers shared by the hash cache and configuration loading.

mod atomic;

pub use atomic::{atomic_read_json, atomic_write_json};
