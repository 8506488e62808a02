//! Config command handlers

use anyhow::{bail, Context, Result};

use clipsync_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(output: &Output) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "clippings_file": config.clippings_file,
                    "notes_dir": config.notes_dir,
                    "data_dir": config.data_dir,
                    "api_url": config.api_url,
                    "api_key_set": config.api_key.is_some(),
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.clippings_file.display());
        }
        OutputFormat::Human => {
            println!("Configuration:");
            println!("  clippings_file: {}", config.clippings_file.display());
            println!("  notes_dir:      {}", config.notes_dir.display());
            println!("  data_dir:       {}", config.data_dir.display());
            println!(
                "  api_url:        {}",
                config.api_url.as_deref().unwrap_or("(not set)")
            );
            println!(
                "  api_key:        {}",
                if config.api_key.is_some() {
                    "(set)"
                } else {
                    "(not set)"
                }
            );
            println!();
            println!("Config file: {}", Config::config_file_path().display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(key: String, value: String, output: &Output) -> Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;

    match key.as_str() {
        "clippings_file" => {
            config.clippings_file = value.clone().into();
        }
        "notes_dir" => {
            config.notes_dir = value.clone().into();
        }
        "data_dir" => {
            config.data_dir = value.clone().into();
        }
        "api_url" => {
            config.api_url = if value.is_empty() || value == "none" {
                None
            } else {
                Some(value.clone())
            };
        }
        "api_key" => {
            config.api_key = if value.is_empty() || value == "none" {
                None
            } else {
                Some(value.clone())
            };
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: clippings_file, notes_dir, data_dir, api_url, api_key",
                key
            );
        }
    }

    config.save().context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}
