//! Output formatting for registry listings.

use anyhow::Result;
use sd_checkpoints::{CheckpointInfo, CheckpointRegistry};
use serde::Serialize;

/// Summary line of a listed checkpoint.
#[derive(Debug, Serialize, PartialEq)]
pub struct ListedCheckpoint<'a> {
    pub title: &'a str,
    pub model_name: &'a str,
    pub hash: &'a str,
    pub sha256: Option<&'a str>,
    pub filename: String,
}

impl<'a> From<&'a CheckpointInfo> for ListedCheckpoint<'a> {
    fn from(info: &'a CheckpointInfo) -> Self {
        Self {
            title: &info.title,
            model_name: &info.model_name,
            hash: &info.hash,
            sha256: info.sha256.as_deref(),
            filename: info.filename.display().to_string(),
        }
    }
}

/// Registered checkpoints in title order.
pub fn listing(registry: &CheckpointRegistry) -> Vec<ListedCheckpoint<'_>> {
    registry
        .checkpoint_tiles()
        .iter()
        .filter_map(|title| registry.by_title(title))
        .map(ListedCheckpoint::from)
        .collect()
}

pub fn print_list(registry: &CheckpointRegistry, json: bool) -> Result<()> {
    let entries = listing(registry);
    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for entry in &entries {
            println!("{}\t{}", entry.title, entry.filename);
        }
    }
    Ok(())
}

pub fn print_record(info: &CheckpointInfo, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(info)?);
        return Ok(());
    }

    println!("title:      {}", info.title);
    println!("filename:   {}", info.filename.display());
    println!("model name: {}", info.model_name);
    println!("hash:       {}", info.hash);
    if let Some(sha256) = &info.sha256 {
        println!("sha256:     {}", sha256);
    }
    println!("aliases:    {}", info.ids.join(", "));
    if !info.metadata.is_empty() {
        println!("metadata:   {}", serde_json::to_string(&info.metadata)?);
    }
    Ok(())
}
