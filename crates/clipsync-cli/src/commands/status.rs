//! Status command handler

use anyhow::Result;

use clipsync_core::sync::SyncCache;
use clipsync_core::{group_by_title, ClipKind, Config};

use crate::output::{Output, OutputFormat};

/// Show clippings and decision-cache status
pub fn show(config: &Config, output: &Output) -> Result<()> {
    let records = super::load_clippings(config)?;

    let highlights = records
        .iter()
        .filter(|c| c.kind == ClipKind::Highlight)
        .count();
    let notes = records.iter().filter(|c| c.kind == ClipKind::Note).count();
    let merged = records
        .iter()
        .filter(|c| c.kind == ClipKind::MergedNote)
        .count();

    let books = group_by_title(records);

    config.ensure_data_dir()?;
    let mut cache = SyncCache::with_path(config.cache_path());
    let cache_ok = cache.validate();
    let stats = cache.stats();

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "clippings_file": config.clippings_file,
                    "books": books.len(),
                    "records": {
                        "highlights": highlights,
                        "notes": notes,
                        "merged": merged,
                    },
                    "cache": {
                        "path": config.cache_path(),
                        "ok": cache_ok,
                        "bound": stats.bound,
                        "ignored": stats.ignored,
                        "deferred": stats.deferred,
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", books.len());
        }
        OutputFormat::Human => {
            println!("clipsync Status");
            println!("===============");
            println!();
            println!("Clippings:");
            println!("  File:       {}", config.clippings_file.display());
            println!("  Books:      {}", books.len());
            println!("  Highlights: {}", highlights);
            println!("  Notes:      {}", notes);
            println!("  Merged:     {}", merged);
            println!();
            println!("Decision cache:");
            println!("  Location: {}", config.cache_path().display());
            println!("  State:    {}", if cache_ok { "ok" } else { "missing or unreadable" });
            println!("  Bound:    {}", stats.bound);
            println!("  Ignored:  {}", stats.ignored);
            println!("  Deferred: {}", stats.deferred);
            println!();
            output.print_books(&books);
        }
    }

    Ok(())
}
