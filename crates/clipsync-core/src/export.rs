//! JSON and Markdown exporters
//!
//! Renders merged clippings either as a JSON document (flat list or by-book
//! mapping) or as a directory of Markdown files, one per book, sorted
//! chronologically.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::models::{self, ClipKind, Clipping, ModelError};
use crate::storage::atomic_write;

/// Serialize clippings as a flat JSON array
pub fn json_flat(clippings: &[Clipping]) -> Result<String> {
    serde_json::to_string_pretty(clippings).context("Failed to serialize clippings")
}

/// Serialize clippings as a title-to-records JSON mapping
pub fn json_by_book(groups: &BTreeMap<String, Vec<Clipping>>) -> Result<String> {
    serde_json::to_string_pretty(groups).context("Failed to serialize clippings by book")
}

/// Render one book's clippings as a Markdown document
///
/// Header is the title and author; entries follow in chronological order.
/// All clippings must share the same title/author pair.
pub fn render_markdown(group: &[Clipping]) -> Result<String, ModelError> {
    let (title, author) = models::title_author(group)?;

    let mut sorted: Vec<&Clipping> = group.iter().collect();
    sorted.sort_by_key(|c| c.date_unix);

    let entries: Vec<String> = sorted.iter().map(|c| render_entry(c)).collect();

    Ok(format!(
        "# {title}\n\n\n**by {author}**\n\n\n{}",
        entries.join("\n\n")
    ))
}

/// Render a single clipping as a Markdown list entry
///
/// Highlight text becomes a blockquote; a bare note has no highlight to
/// quote, so a placeholder stands in. Note text is fenced.
fn render_entry(item: &Clipping) -> String {
    let kind_text = match item.kind {
        ClipKind::Highlight => "Highlight",
        ClipKind::Note | ClipKind::MergedNote => "Note",
    };

    let mut lines = vec![format!(
        "- {kind_text} at location **{}** made on *{}*",
        item.location, item.date
    )];

    match &item.text_highlight {
        Some(text) => lines.push(format!("   > {}", text.trim().replace('\n', "\n   > "))),
        None => lines.push("   (unknown highlighted text)".to_string()),
    }

    if let Some(note) = &item.text_note {
        lines.push("  ```".to_string());
        lines.push(format!("  {}", note.trim().replace('\n', "\n   ")));
        lines.push("  ```".to_string());
    }

    lines.join("\n")
}

/// Derive a filesystem- and attachment-safe name for a book
///
/// Title whitespace collapses to `-` runs, anything outside
/// alphanumeric/`_`/`-` becomes `.`; author tokens are joined with `-`.
/// No extension is appended.
pub fn book_filename(title: &str, author: &str) -> String {
    let title = title
        .trim()
        .replace('\r', "")
        .replace('\t', "--")
        .replace('\n', "---")
        .replace(' ', "-");
    let title: String = title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '.'
            }
        })
        .collect();

    let author = author
        .trim()
        .replace('\r', "")
        .replace('\t', "")
        .replace('\n', "")
        .replace(',', " ");
    let author = author.split_whitespace().collect::<Vec<_>>().join("-");

    format!("{}_{}", title, author)
}

/// Write one Markdown file per book into `out_dir`
///
/// Returns the paths written, in title order.
pub fn write_markdown_tree(
    out_dir: &Path,
    groups: &BTreeMap<String, Vec<Clipping>>,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(groups.len());

    for (title, group) in groups {
        let (_, author) = models::title_author(group)
            .with_context(|| format!("Inconsistent group for '{}'", title))?;
        let path = out_dir.join(format!("{}.md", book_filename(title, &author)));
        let body = render_markdown(group)
            .with_context(|| format!("Failed to render notes for '{}'", title))?;

        atomic_write(&path, body.as_bytes())
            .with_context(|| format!("Failed to write notes for '{}'", title))?;
        written.push(path);
    }

    Ok(written)
}
