//! Data models for clipsync
//!
//! Defines the core data structures: the `Clipping` record, its kind
//! discriminant, and helpers for grouping clippings by book.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The kind of a clipping record
///
/// `MergedNote` is only ever produced by the merge engine
/// ([`crate::merge::merge_clippings`]), never by the parser.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ClipKind {
    /// A highlighted passage
    Highlight,
    /// A freestanding note
    Note,
    /// A highlight and its accompanying note, combined
    MergedNote,
}

/// Errors from model-level validation
#[derive(Error, Debug)]
pub enum ModelError {
    /// The location string has no parseable end offset
    #[error("location '{location}' has no parseable end offset")]
    BadLocation { location: String },

    /// A book group mixes more than one title or author
    #[error("all clippings in a group must share the same {field}: expected '{expected}', found '{found}'")]
    MixedGroup {
        field: &'static str,
        expected: String,
        found: String,
    },

    /// A book group with no clippings has no identity
    #[error("cannot take title/author of an empty group")]
    EmptyGroup,
}

/// A single annotation exported by the e-reader
///
/// Immutable value type. Exactly one of `text_highlight`/`text_note` is set
/// for `Highlight`/`Note` respectively; both are set only for `MergedNote`.
/// The constructors enforce this, so prefer them over struct literals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Clipping {
    /// Book title
    pub title: String,
    /// Book author(s), possibly empty when the export line had none
    pub author: String,
    /// Location range as exported, e.g. "3824-3826"
    pub location: String,
    /// Record kind
    pub kind: ClipKind,
    /// Original human-readable date text, preserved for display
    pub date: String,
    /// Seconds since epoch, parsed from `date`
    pub date_unix: i64,
    /// Highlighted passage (Highlight and MergedNote)
    pub text_highlight: Option<String>,
    /// Note text (Note and MergedNote)
    pub text_note: Option<String>,
}

impl Clipping {
    /// Create a highlight record
    pub fn highlight(
        title: impl Into<String>,
        author: impl Into<String>,
        location: impl Into<String>,
        date: impl Into<String>,
        date_unix: i64,
        text: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            location: location.into(),
            kind: ClipKind::Highlight,
            date: date.into(),
            date_unix,
            text_highlight: Some(text.into()),
            text_note: None,
        }
    }

    /// Create a note record
    pub fn note(
        title: impl Into<String>,
        author: impl Into<String>,
        location: impl Into<String>,
        date: impl Into<String>,
        date_unix: i64,
        text: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            location: location.into(),
            kind: ClipKind::Note,
            date: date.into(),
            date_unix,
            text_highlight: None,
            text_note: Some(text.into()),
        }
    }

    /// Combine a highlight and a note into a merged record
    ///
    /// All identity, location, and date fields come from the highlight.
    pub fn merged(highlight: &Clipping, note: &Clipping) -> Self {
        Self {
            title: highlight.title.clone(),
            author: highlight.author.clone(),
            location: highlight.location.clone(),
            kind: ClipKind::MergedNote,
            date: highlight.date.clone(),
            date_unix: highlight.date_unix,
            text_highlight: highlight.text_highlight.clone(),
            text_note: note.text_note.clone(),
        }
    }

    /// End offset of the location range: the integer after the last `-`
    ///
    /// A location without a `-` is treated as a bare end offset.
    pub fn location_end(&self) -> Result<i64, ModelError> {
        self.location
            .rsplit('-')
            .next()
            .and_then(|s| s.trim().parse().ok())
            .ok_or_else(|| ModelError::BadLocation {
                location: self.location.clone(),
            })
    }
}

/// Group clippings by book title
///
/// The inner order of each group is the input (parse) order. The outer map
/// is ordered by title.
pub fn group_by_title(clippings: Vec<Clipping>) -> BTreeMap<String, Vec<Clipping>> {
    let mut groups: BTreeMap<String, Vec<Clipping>> = BTreeMap::new();
    for item in clippings {
        groups.entry(item.title.clone()).or_default().push(item);
    }
    groups
}

/// Get the title and author shared by all clippings in a group
///
/// Returns [`ModelError::MixedGroup`] if any clipping disagrees, which means
/// the group was assembled incorrectly upstream.
pub fn title_author(group: &[Clipping]) -> Result<(String, String), ModelError> {
    let first = group.first().ok_or(ModelError::EmptyGroup)?;

    for item in group {
        if item.title != first.title {
            return Err(ModelError::MixedGroup {
                field: "title",
                expected: first.title.clone(),
                found: item.title.clone(),
            });
        }
        if item.author != first.author {
            return Err(ModelError::MixedGroup {
                field: "author",
                expected: first.author.clone(),
                found: item.author.clone(),
            });
        }
    }

    Ok((first.title.clone(), first.author.clone()))
}
