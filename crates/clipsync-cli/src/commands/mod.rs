//! Command handlers

pub mod config;
pub mod export;
pub mod status;
pub mod sync;

use anyhow::{Context, Result};

use clipsync_core::{merge_clippings, parse_clippings, Clipping, Config};

/// Read, parse, and merge the configured clippings file
pub fn load_clippings(config: &Config) -> Result<Vec<Clipping>> {
    let raw = std::fs::read_to_string(&config.clippings_file)
        .with_context(|| format!("Failed to read clippings file {:?}", config.clippings_file))?;

    let records = parse_clippings(&raw).context("Failed to parse clippings file")?;
    tracing::debug!(records = records.len(), "parsed clippings");

    merge_clippings(records).context("Failed to merge clippings")
}
