//! Clippings file grammar parser
//!
//! Splits a raw clippings export on the `==========` item delimiter and
//! decodes each item into a [`Clipping`]. An item is exactly three non-blank
//! lines:
//!
//! ```text
//! <artifact>How We Learn (Stanislas Dehaene)
//! - Your Highlight on Location 3824-3826 | Added on Thursday, December 2, 2021 10:05:32 PM
//!
//! The new idea is that during sleep, our brain works in the opposite direction...
//! ```
//!
//! The first three bytes of the title line are an opaque encoding artifact
//! and are dropped without being decoded.
//!
//! Error policy: the first malformed item aborts the whole file. The error
//! carries the item's position and a snippet of its raw text, and a
//! malformed item never produces defaulted fields.

use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::warn;

use crate::models::{ClipKind, Clipping};

/// Separator between items in the export file
pub const ITEM_DELIMITER: &str = "==========";

/// Prefix of the metadata line; the kind tag follows it
const KIND_MARKER: &str = "- Your ";

/// Prefix of the date clause inside the metadata line
const DATE_MARKER: &str = "Added on ";

/// Splits the metadata line into location and date clauses
const META_SPLIT: char = '|';

/// Date format used by the export, e.g. "Thursday, December 2, 2021 10:05:32 PM"
const DATE_FORMAT: &str = "%A, %B %d, %Y %I:%M:%S %p";

/// Length of the encoding artifact at the start of every title line
const TITLE_ARTIFACT_LEN: usize = 3;

/// Errors raised while decoding a clippings export
///
/// Every variant carries the 1-based item position within the file.
#[derive(Error, Debug)]
pub enum ParseError {
    /// Wrong number of non-blank lines in an item
    #[error("item {index}: expected 3 non-blank lines (title, metadata, body), found {found}:\n{snippet}")]
    Structure {
        index: usize,
        found: usize,
        snippet: String,
    },

    /// Metadata line does not start with the `- Your ` marker
    #[error("item {index}: metadata line must start with '{KIND_MARKER}', got '{line}'")]
    BadMarker { index: usize, line: String },

    /// Kind tag is neither `Highlight` nor `Note`
    #[error("item {index}: unknown clipping kind '{kind}' in:\n{snippet}")]
    UnknownKind {
        index: usize,
        kind: String,
        snippet: String,
    },

    /// Metadata line has no `|` between location and date clauses
    #[error("item {index}: metadata line has no '{META_SPLIT}' separator: '{line}'")]
    MissingMetaSplit { index: usize, line: String },

    /// Date clause does not contain the `Added on ` marker
    #[error("item {index}: no '{DATE_MARKER}' marker in date clause '{clause}'")]
    MissingDateMarker { index: usize, clause: String },

    /// Date text does not match the export's date format
    #[error("item {index}: could not parse date '{text}': {source}")]
    BadDate {
        index: usize,
        text: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Parse a whole clippings export into records
///
/// Blank fragments between delimiters are discarded. Aborts on the first
/// malformed item.
pub fn parse_clippings(raw: &str) -> Result<Vec<Clipping>, ParseError> {
    raw.split(ITEM_DELIMITER)
        .filter(|fragment| !fragment.trim().is_empty())
        .enumerate()
        .map(|(i, fragment)| parse_item(i + 1, fragment))
        .collect()
}

/// Parse a single item fragment
fn parse_item(index: usize, raw: &str) -> Result<Clipping, ParseError> {
    let lines: Vec<&str> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let &[line_title, line_meta, line_body] = lines.as_slice() else {
        return Err(ParseError::Structure {
            index,
            found: lines.len(),
            snippet: snippet(raw),
        });
    };

    let (title, author) = split_title_author(line_title);

    let rest = line_meta
        .strip_prefix(KIND_MARKER)
        .ok_or_else(|| ParseError::BadMarker {
            index,
            line: line_meta.to_string(),
        })?;

    let kind = match rest.split_whitespace().next().unwrap_or_default() {
        "Highlight" => ClipKind::Highlight,
        "Note" => ClipKind::Note,
        other => {
            return Err(ParseError::UnknownKind {
                index,
                kind: other.to_string(),
                snippet: snippet(raw),
            })
        }
    };

    let (location_clause, date_clause) =
        line_meta
            .split_once(META_SPLIT)
            .ok_or_else(|| ParseError::MissingMetaSplit {
                index,
                line: line_meta.to_string(),
            })?;

    // "on Location 3824-3826" / "on Page 12" - the range is the last token
    let location = location_clause
        .split_whitespace()
        .last()
        .unwrap_or_default()
        .to_string();

    let date = date_clause
        .trim()
        .strip_prefix(DATE_MARKER)
        .ok_or_else(|| ParseError::MissingDateMarker {
            index,
            clause: date_clause.trim().to_string(),
        })?
        .trim()
        .to_string();

    let date_unix = NaiveDateTime::parse_from_str(&date, DATE_FORMAT)
        .map_err(|source| ParseError::BadDate {
            index,
            text: date.clone(),
            source,
        })?
        .and_utc()
        .timestamp();

    Ok(match kind {
        ClipKind::Highlight => Clipping::highlight(title, author, location, date, date_unix, line_body),
        _ => Clipping::note(title, author, location, date, date_unix, line_body),
    })
}

/// Extract title and author from the first line of an item
///
/// The leading encoding artifact is dropped byte-wise before any pattern
/// matching. Two formats are recognized, in this order:
///
/// 1. Parenthetical (epub exports): `Title (Author)` - everything before the
///    last `(` is the title, the trailing parenthetical is the author.
/// 2. Hyphen-segmented (managed libraries): `author - year - title`, with
///    underscores standing in for spaces. Only used when the line has
///    exactly two `-` and no `(`.
///
/// Anything else falls back to the whole line as title with an empty author;
/// the anomaly is logged but does not fail the parse.
fn split_title_author(line: &str) -> (String, String) {
    let stripped = line.as_bytes().get(TITLE_ARTIFACT_LEN..).unwrap_or_default();
    let line = String::from_utf8_lossy(stripped);

    if let Some(paren) = line.rfind('(') {
        let title = line[..paren].trim().to_string();
        let author = line[paren..]
            .trim_matches(&[' ', '\t', '\n', '(', ')'][..])
            .trim()
            .to_string();
        return (title, author);
    }

    if line.matches('-').count() == 2 {
        let mut segments = line.splitn(3, '-');
        let author = segments.next().unwrap_or_default();
        let _year = segments.next();
        let title = segments.next().unwrap_or_default();
        return (
            title.replace('_', " ").trim().to_string(),
            author.replace('_', " ").trim().to_string(),
        );
    }

    warn!(line = %line, "title line matches no known format, using whole line as title");
    (line.trim().to_string(), String::new())
}

/// First few lines of a fragment, for error context
fn snippet(raw: &str) -> String {
    const MAX_LEN: usize = 200;
    let trimmed = raw.trim();
    if trimmed.len() <= MAX_LEN {
        trimmed.to_string()
    } else {
        let mut end = MAX_LEN;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &trimmed[..end])
    }
}
