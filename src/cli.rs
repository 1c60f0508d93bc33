//! CLI argument definitions.
//!
//! This module contains the top-level CLI structure and shared types.
//! Individual command definitions are in the `commands` module.

use clap::Parser;
use std::path::PathBuf;

use crate::commands::Command;
use crate::config::{ConfigFile, DEFAULT_CACHE_PATH};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the recorded-results cache file
    ///
    /// If not specified, uses the cache path from .sql_replay.json, then
    /// ./sql_replay.cache.json
    #[arg(long, global = true)]
    pub cache: Option<PathBuf>,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value_t = OutputFormat::Table, global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// Resolve the cache file path: explicit flag, then config file, then default.
pub fn resolve_cache_path(explicit_path: Option<PathBuf>) -> PathBuf {
    if let Some(path) = explicit_path {
        return path;
    }

    if let Ok(config) = ConfigFile::load() {
        return config.cache.path;
    }

    PathBuf::from(DEFAULT_CACHE_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_explicit_cache_path_wins() {
        let path = PathBuf::from("/tmp/explicit.json");
        assert_eq!(resolve_cache_path(Some(path.clone())), path);
    }

    #[rstest]
    fn test_format_is_global() {
        let args = Args::try_parse_from(["sql_replay", "inspect", "--format", "json"]).unwrap();
        assert_eq!(args.format, OutputFormat::Json);
    }

    #[rstest]
    fn test_cache_is_global() {
        let args = Args::try_parse_from(["sql_replay", "inspect", "--cache", "rec.json"]).unwrap();
        assert_eq!(args.cache, Some(PathBuf::from("rec.json")));
    }
}
