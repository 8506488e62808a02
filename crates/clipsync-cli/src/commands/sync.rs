//! Sync command handler

use anyhow::{bail, Result};

use clipsync_core::sync::{HttpReferenceService, Outcome, Resolver, SyncCache, UploadOutcome};
use clipsync_core::{group_by_title, Config};

use crate::output::Output;
use crate::prompt::CliDecisionProvider;

/// Sync every book's notes with the reference service
pub fn sync(config: &Config, output: &Output) -> Result<()> {
    let (Some(api_url), Some(api_key)) = (&config.api_url, &config.api_key) else {
        bail!(
            "Reference service is not configured. Set it with:\n  \
             clipsync config set api_url https://your-service/users/<id>\n  \
             clipsync config set api_key <key>"
        );
    };

    let records = super::load_clippings(config)?;
    let books = group_by_title(records);

    config.ensure_data_dir()?;
    let mut cache = SyncCache::with_path(config.cache_path());
    if !cache.validate() {
        output.message("Starting with an empty decision cache.");
    }

    let service = HttpReferenceService::new(api_url.as_str(), api_key.as_str())?;
    let mut decisions = CliDecisionProvider::new();
    let mut resolver = Resolver::new(
        &mut cache,
        &service,
        &mut decisions,
        config.notes_dir.clone(),
    );

    for (title, group) in &books {
        match resolver.resolve_group(group)? {
            Outcome::Ignored => {}
            Outcome::Postponed => output.message(&format!("Postponed \"{}\"", title)),
            Outcome::Bound { key, upload } => match upload.outcome {
                UploadOutcome::Success => {
                    output.success(&format!("Pushed \"{}\" to {}", title, key))
                }
                UploadOutcome::Unchanged => {
                    output.message(&format!("\"{}\" already up to date on {}", title, key))
                }
                UploadOutcome::Failure => {
                    output.message(&format!("Service rejected notes for \"{}\"", title))
                }
            },
            Outcome::Skipped { reason } => {
                output.message(&format!("Skipped \"{}\": {}", title, reason))
            }
        }
    }

    Ok(())
}
