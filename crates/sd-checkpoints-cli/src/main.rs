//! Command-line driver for the checkpoint registry.
//!
//! Scans the configured checkpoint directories, optionally computes strong
//! hashes, and prints the registry or resolves a lookup string.

mod report;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sd_checkpoints::{CheckpointConfig, CheckpointRegistry, JsonHashCache};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "sd-checkpoints")]
#[command(about = "Identify and look up Stable Diffusion checkpoints")]
struct Args {
    /// JSON configuration file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory containing the Stable-diffusion checkpoint folder
    #[arg(long)]
    models_path: Option<PathBuf>,

    /// Extra checkpoint directory, names are relative to it
    #[arg(long)]
    ckpt_dir: Option<PathBuf>,

    /// Hash cache file
    #[arg(long)]
    hash_cache: Option<PathBuf>,

    /// Only use cached strong hashes, never compute new ones
    #[arg(long)]
    no_hashing: bool,

    /// Compute the strong hash of every checkpoint after scanning
    #[arg(long)]
    calculate_hashes: bool,

    /// Print JSON instead of plain text
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// List registered checkpoints (default)
    List,
    /// Resolve a title, alias or partial name to a checkpoint
    Find {
        search: String,
        /// Compute the strong hash of the match if it has none yet
        #[arg(long)]
        hash: bool,
    },
}

impl Args {
    fn resolve_config(&self) -> Result<CheckpointConfig> {
        let mut config = match &self.config {
            Some(path) => CheckpointConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => CheckpointConfig::default(),
        };

        if let Some(models_path) = &self.models_path {
            config.models_path = models_path.clone();
        }
        if let Some(ckpt_dir) = &self.ckpt_dir {
            config.ckpt_dir = Some(ckpt_dir.clone());
        }
        if let Some(hash_cache) = &self.hash_cache {
            config.hash_cache_path = Some(hash_cache.clone());
        }
        config.no_hashing |= self.no_hashing;

        if config.models_path.as_os_str().is_empty() {
            bail!("no models path given, pass --models-path or a config file");
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout stays machine-readable
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let config = args.resolve_config()?;
    let paths = config.paths();
    info!("Checkpoint root: {}", paths.model_path().display());

    let cache = JsonHashCache::open(config.hash_cache_path()).with_hashing(!config.no_hashing);

    let mut registry = CheckpointRegistry::new();
    registry.rescan(&paths, &cache);

    if args.calculate_hashes {
        let ids: Vec<_> = registry
            .iter()
            .filter(|(_, info)| info.sha256.is_none())
            .map(|(id, _)| id)
            .collect();
        for id in ids {
            registry.calculate_shorthash(id, &cache);
        }
    }

    match args.command.unwrap_or(Command::List) {
        Command::List => report::print_list(&registry, args.json)?,
        Command::Find { search, hash } => {
            let Some(id) = registry.closest_match(&search) else {
                bail!("no checkpoint matches {:?}", search);
            };
            if hash {
                registry.calculate_shorthash(id, &cache);
            }
            if let Some(info) = registry.get(id) {
                report::print_record(info, args.json)?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::try_parse_from([
            "sd-checkpoints",
            "--models-path",
            "/data/models",
            "--no-hashing",
            "find",
            "v1-5",
        ])
        .unwrap();

        let config = args.resolve_config().unwrap();
        assert_eq!(config.models_path, PathBuf::from("/data/models"));
        assert!(config.no_hashing);
        assert_eq!(
            args.command,
            Some(Command::Find {
                search: "v1-5".to_string(),
                hash: false
            })
        );
    }

    #[test]
    fn test_models_path_required() {
        let args = Args::try_parse_from(["sd-checkpoints"]).unwrap();
        assert!(args.resolve_config().is_err());
    }
}
