//! clipsync CLI
//!
//! Command-line interface for clipsync - e-reader clippings parsing,
//! merging, export, and reference-manager sync.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use clipsync_core::Config;

mod commands;
mod output;
mod prompt;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "clipsync")]
#[command(about = "Turn e-reader clippings into notes and sync them with your reference manager")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Clippings file to read (overrides config)
    #[arg(short, long, global = true)]
    file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export parsed and merged clippings
    Export {
        #[command(subcommand)]
        command: ExportCommands,
    },
    /// Sync book notes with the reference service
    Sync,
    /// Show clippings and decision-cache status
    Status,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum ExportCommands {
    /// Write all records as one JSON document
    Json {
        /// Group records by book title instead of a flat list
        #[arg(long)]
        by_book: bool,
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write one Markdown file per book
    #[command(alias = "md")]
    Markdown {
        /// Output directory (defaults to notes_dir from config)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Also write the by-book JSON document to this file
        #[arg(long)]
        json_out: Option<PathBuf>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (clippings_file, notes_dir, data_dir, api_url, api_key)
        key: String,
        /// Configuration value
        value: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    // Config commands manage the file themselves and don't need a loaded config
    if let Commands::Config { command } = &cli.command {
        return match command.clone() {
            Some(ConfigCommands::Set { key, value }) => commands::config::set(key, value, &output),
            Some(ConfigCommands::Show) | None => commands::config::show(&output),
        };
    }

    let mut config = Config::load()?;
    if let Some(file) = cli.file {
        config.clippings_file = file;
    }

    match cli.command {
        Commands::Export { command } => match command {
            ExportCommands::Json { by_book, output: out } => {
                commands::export::json(&config, by_book, out, &output)
            }
            ExportCommands::Markdown {
                output_dir,
                json_out,
            } => commands::export::markdown(&config, output_dir, json_out, &output),
        },
        Commands::Sync => commands::sync::sync(&config, &output),
        Commands::Status => commands::status::show(&config, &output),
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}
