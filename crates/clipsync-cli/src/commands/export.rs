//! Export command handlers

use std::path::PathBuf;

use anyhow::{Context, Result};

use clipsync_core::storage::atomic_write;
use clipsync_core::{export, group_by_title, Config};

use crate::output::Output;

/// Write all records as one JSON document
pub fn json(
    config: &Config,
    by_book: bool,
    output_file: Option<PathBuf>,
    output: &Output,
) -> Result<()> {
    let records = super::load_clippings(config)?;

    let body = if by_book {
        export::json_by_book(&group_by_title(records))?
    } else {
        export::json_flat(&records)?
    };

    match output_file {
        Some(path) => {
            atomic_write(&path, body.as_bytes())
                .with_context(|| format!("Failed to write {:?}", path))?;
            output.success(&format!("Wrote {}", path.display()));
        }
        None => println!("{}", body),
    }

    Ok(())
}

/// Write one Markdown file per book
pub fn markdown(
    config: &Config,
    output_dir: Option<PathBuf>,
    json_out: Option<PathBuf>,
    output: &Output,
) -> Result<()> {
    let records = super::load_clippings(config)?;
    let books = group_by_title(records);
    let dir = output_dir.unwrap_or_else(|| config.notes_dir.clone());

    if let Some(path) = &json_out {
        atomic_write(path, export::json_by_book(&books)?.as_bytes())
            .with_context(|| format!("Failed to write {:?}", path))?;
    }

    for (title, records) in &books {
        output.message(&format!("  saving {} notes from \"{}\"", records.len(), title));
    }

    let written = export::write_markdown_tree(&dir, &books)?;
    output.success(&format!(
        "Wrote {} book file(s) to {}",
        written.len(),
        dir.display()
    ));

    Ok(())
}
