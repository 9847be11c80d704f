//! Embedded metadata extraction from safetensors files.
//!
//! Layout:
//! - 0-7: JSON header length `L` (u64, little-endian)
//! - 8..8+L: JSON header, whose `__metadata__` object holds string values
//!
//! Training tools commonly store nested JSON documents as strings inside
//! `__metadata__`; those are expanded when they parse.

use crate::config::FormatConfig;
use crate::error::{CheckpointError, Result};
use serde_json::{Map, Value};
use std::io::Read;
use std::path::Path;

/// Metadata key inside the safetensors JSON header.
const METADATA_KEY: &str = "__metadata__";

/// Initial buffer size for the JSON header; the claimed length is untrusted.
const HEADER_READ_CAPACITY: u64 = 64 * 1024;

/// Accepted first two bytes of the JSON header.
const JSON_STARTS: [&[u8; 2]; 2] = [b"{\"", b"{'"];

/// Read the `__metadata__` object of a safetensors file.
///
/// Returns an empty map when the header has no metadata.
pub fn read_metadata(path: impl AsRef<Path>) -> Result<Map<String, Value>> {
    let path = path.as_ref();
    let mut file = std::fs::File::open(path).map_err(|e| CheckpointError::io_with_path(e, path))?;
    read_metadata_from(&mut file, path)
}

/// Parse safetensors metadata from any reader positioned at the start of the file.
pub fn read_metadata_from<R: Read>(reader: &mut R, path: &Path) -> Result<Map<String, Value>> {
    let mut size_buf = [0u8; 8];
    reader
        .read_exact(&mut size_buf)
        .map_err(|e| CheckpointError::io_with_path(e, path))?;
    let header_size = u64::from_le_bytes(size_buf);

    let mut json_start = [0u8; 2];
    reader
        .read_exact(&mut json_start)
        .map_err(|e| CheckpointError::io_with_path(e, path))?;

    if header_size <= 2 || !JSON_STARTS.contains(&&json_start) {
        return Err(CheckpointError::NotSafetensors(path.to_path_buf()));
    }
    if header_size > FormatConfig::MAX_HEADER_BYTES {
        return Err(CheckpointError::HeaderTooLarge {
            path: path.to_path_buf(),
            size: header_size,
        });
    }

    let mut header_buf = Vec::with_capacity(header_size.min(HEADER_READ_CAPACITY) as usize);
    header_buf.extend_from_slice(&json_start);
    reader
        .take(header_size - 2)
        .read_to_end(&mut header_buf)
        .map_err(|e| CheckpointError::io_with_path(e, path))?;

    let header: Value = serde_json::from_slice(&header_buf)?;

    let metadata = match header.get(METADATA_KEY) {
        None => return Ok(Map::new()),
        Some(Value::Object(metadata)) => metadata,
        Some(_) => {
            return Err(CheckpointError::Json {
                message: format!("{} in {} is not an object", METADATA_KEY, path.display()),
                source: None,
            })
        }
    };

    Ok(metadata
        .iter()
        .map(|(key, value)| (key.clone(), expand_embedded_json(value)))
        .collect())
}

/// Parse string values that look like JSON objects, keeping the raw string
/// when they don't parse.
fn expand_embedded_json(value: &Value) -> Value {
    match value {
        Value::String(s) if s.starts_with('{') => {
            serde_json::from_str(s).unwrap_or_else(|_| value.clone())
        }
        _ => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;

    fn container(header: &str) -> Vec<u8> {
        let mut bytes = (header.len() as u64).to_le_bytes().to_vec();
        bytes.extend_from_slice(header.as_bytes());
        bytes.extend_from_slice(&[0u8; 16]);
        bytes
    }

    fn parse(bytes: Vec<u8>) -> Result<Map<String, Value>> {
        read_metadata_from(&mut Cursor::new(bytes), Path::new("test.safetensors"))
    }

    #[test]
    fn test_plain_metadata() {
        let metadata = parse(container(r#"{"__metadata__": {"format": "pt"}}"#)).unwrap();
        assert_eq!(Value::Object(metadata), json!({"format": "pt"}));
    }

    #[test]
    fn test_missing_metadata_is_empty() {
        let header = r#"{"weight": {"dtype": "F16", "shape": [1], "data_offsets": [0, 2]}}"#;
        assert!(parse(container(header)).unwrap().is_empty());
    }

    #[test]
    fn test_embedded_json_is_expanded() {
        let header = json!({
            "__metadata__": {
                "ss_tag_frequency": "{\"cat\": 3}",
                "broken": "{not json",
                "name": "plain"
            }
        })
        .to_string();

        let metadata = parse(container(&header)).unwrap();
        assert_eq!(metadata["ss_tag_frequency"], json!({"cat": 3}));
        assert_eq!(metadata["broken"], json!("{not json"));
        assert_eq!(metadata["name"], json!("plain"));
    }

    #[test]
    fn test_rejects_bad_opening() {
        let result = parse(container(r#"["__metadata__"]"#));
        assert!(matches!(result, Err(CheckpointError::NotSafetensors(_))));
    }

    #[test]
    fn test_rejects_tiny_length() {
        let mut bytes = 2u64.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"{\"");
        assert!(matches!(parse(bytes), Err(CheckpointError::NotSafetensors(_))));
    }

    #[test]
    fn test_rejects_huge_length() {
        let mut bytes = u64::MAX.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"{\"a\": 1}");
        assert!(matches!(
            parse(bytes),
            Err(CheckpointError::HeaderTooLarge { .. })
        ));
    }

    #[test]
    fn test_metadata_not_object_is_error() {
        let result = parse(container(r#"{"__metadata__": "nope"}"#));
        assert!(matches!(result, Err(CheckpointError::Json { .. })));
    }

    #[test]
    fn test_truncated_header_is_json_error() {
        let mut bytes = 64u64.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"{\"__metadata__\": {");
        assert!(matches!(parse(bytes), Err(CheckpointError::Json { .. })));
    }

    #[test]
    fn test_large_claimed_length_on_short_file() {
        let mut bytes = FormatConfig::MAX_HEADER_BYTES.to_le_bytes().to_vec();
        bytes.extend_from_slice(br#"{"__metadata__": {"a": "b"}}"#);
        let metadata = parse(bytes).unwrap();
        assert_eq!(Value::Object(metadata), json!({"a": "b"}));
    }
}
