//! Hash computation for checkpoint files.
//!
//! Two schemes coexist:
//! - the legacy weak hash, SHA256 over a fixed 64KB window truncated to
//!   8 hex chars (cheap, collision-prone, kept for old aliases)
//! - the full-content SHA256 used for reliable identity

use crate::config::WeakHashConfig;
use crate::error::{CheckpointError, Result};
use sha2::{Digest, Sha256};
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

/// Chunk size for streaming reads (8MB).
const CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Compute the legacy weak hash of a checkpoint.
///
/// Hashes at most `0x10000` bytes starting at offset `0x100000`. Files shorter
/// than the offset hash an empty window. A missing file yields `"NOFILE"`;
/// any other I/O failure is returned as an error.
pub fn model_hash(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let mut file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Ok(WeakHashConfig::MISSING_FILE.to_string())
        }
        Err(e) => return Err(CheckpointError::io_with_path(e, path)),
    };

    file.seek(SeekFrom::Start(WeakHashConfig::OFFSET))
        .map_err(|e| CheckpointError::io_with_path(e, path))?;

    let mut window = Vec::with_capacity(WeakHashConfig::LENGTH as usize);
    file.take(WeakHashConfig::LENGTH)
        .read_to_end(&mut window)
        .map_err(|e| CheckpointError::io_with_path(e, path))?;

    let digest = hex::encode(Sha256::digest(&window));
    Ok(digest[..WeakHashConfig::HEX_LEN].to_string())
}

/// Compute the SHA256 of the whole file as lowercase hex.
pub fn compute_sha256(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let mut file = std::fs::File::open(path).map_err(|e| CheckpointError::io_with_path(e, path))?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| CheckpointError::io_with_path(e, path))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}
