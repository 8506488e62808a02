//! Note/highlight correlation and merging
//!
//! A note made right after a highlight belongs to it: the e-reader exports
//! them as two separate items with the same location end offset and nearly
//! the same timestamp. The merge engine folds each such note into its
//! highlight, producing a single [`ClipKind::MergedNote`] record.
//!
//! Matching is first-fit over highlights in parse order, not best-fit. On
//! ambiguous input (two highlights ending at the same offset within the time
//! window) the earlier highlight wins; switching to best-fit would change
//! output on such inputs and is deliberately avoided. Unmatched notes are
//! retained as standalone records, never dropped.

use thiserror::Error;

use crate::models::{ClipKind, Clipping, ModelError};

/// Maximum distance, in seconds, between a highlight's and a note's
/// timestamps for them to be considered companions.
pub const MERGE_TOLERANCE_SECS: i64 = 10;

/// Errors from the merge engine
#[derive(Error, Debug)]
pub enum MergeError {
    /// Merge input must be parser output; merged records cannot appear in it
    #[error("merge input may only contain highlights and notes, found a merged record for '{title}' at {location}")]
    MergedInput { title: String, location: String },

    /// A record's location could not be interpreted for matching
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Fold notes into their companion highlights
///
/// The output starts with every highlight in input order. Each note, in
/// input order, replaces the first still-unmerged highlight with a matching
/// location end offset and a timestamp within [`MERGE_TOLERANCE_SECS`];
/// notes with no match are appended unchanged. A highlight that has already
/// absorbed a note is no longer a merge target, so a second note aimed at it
/// falls through to the no-match branch and is retained.
pub fn merge_clippings(items: Vec<Clipping>) -> Result<Vec<Clipping>, MergeError> {
    if let Some(merged) = items.iter().find(|c| c.kind == ClipKind::MergedNote) {
        return Err(MergeError::MergedInput {
            title: merged.title.clone(),
            location: merged.location.clone(),
        });
    }

    let (mut output, notes): (Vec<Clipping>, Vec<Clipping>) = items
        .into_iter()
        .partition(|c| c.kind == ClipKind::Highlight);

    for note in notes {
        match find_target(&output, &note)? {
            Some(idx) => output[idx] = Clipping::merged(&output[idx], &note),
            None => output.push(note),
        }
    }

    Ok(output)
}

/// Index of the first highlight the note can merge into, if any
fn find_target(output: &[Clipping], note: &Clipping) -> Result<Option<usize>, MergeError> {
    let note_end = note.location_end()?;

    for (idx, candidate) in output.iter().enumerate() {
        if candidate.kind != ClipKind::Highlight {
            continue;
        }
        if candidate.location_end()? == note_end
            && (candidate.date_unix - note.date_unix).abs() <= MERGE_TOLERANCE_SECS
        {
            return Ok(Some(idx));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn highlight(location: &str, date_unix: i64, text: &str) -> Clipping {
        Clipping::highlight("Book", "Author", location, "date", date_unix, text)
    }

    fn note(location: &str, date_unix: i64, text: &str) -> Clipping {
        Clipping::note("Book", "Author", location, "date", date_unix, text)
    }

    #[test]
    fn test_merge_within_tolerance() {
        let merged = merge_clippings(vec![
            highlight("100-105", 1000, "passage"),
            note("105", 1005, "remark"),
        ])
        .unwrap();

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].kind, ClipKind::MergedNote);
        assert_eq!(merged[0].text_highlight.as_deref(), Some("passage"));
        assert_eq!(merged[0].text_note.as_deref(), Some("remark"));
        assert_eq!(merged[0].location, "100-105");
    }

    #[test]
    fn test_tolerance_boundary_is_inclusive() {
        let merged = merge_clippings(vec![
            highlight("100-105", 1000, "passage"),
            note("105", 1000 + MERGE_TOLERANCE_SECS, "remark"),
        ])
        .unwrap();

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].kind, ClipKind::MergedNote);
    }

    #[test]
    fn test_note_outside_tolerance_is_retained() {
        let merged = merge_clippings(vec![
            highlight("100-105", 1000, "passage"),
            note("105", 1020, "too late"),
        ])
        .unwrap();

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].kind, ClipKind::Highlight);
        assert_eq!(merged[1].kind, ClipKind::Note);
        assert_eq!(merged[1].text_note.as_deref(), Some("too late"));
    }

    #[test]
    fn test_note_with_different_location_is_retained() {
        let merged = merge_clippings(vec![
            highlight("100-105", 1000, "passage"),
            note("200", 1000, "elsewhere"),
        ])
        .unwrap();

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[1].kind, ClipKind::Note);
    }

    #[test]
    fn test_second_note_on_same_highlight_stays_standalone() {
        let merged = merge_clippings(vec![
            highlight("100-105", 1000, "passage"),
            note("105", 1002, "first"),
            note("105", 1004, "second"),
        ])
        .unwrap();

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].kind, ClipKind::MergedNote);
        assert_eq!(merged[0].text_note.as_deref(), Some("first"));
        assert_eq!(merged[1].kind, ClipKind::Note);
        assert_eq!(merged[1].text_note.as_deref(), Some("second"));
    }

    #[test]
    fn test_first_fit_prefers_earlier_highlight() {
        // two highlights end at the same offset within the window; the one
        // that was parsed first absorbs the note
        let merged = merge_clippings(vec![
            highlight("90-105", 1000, "earlier"),
            highlight("100-105", 1001, "later"),
            note("105", 1003, "remark"),
        ])
        .unwrap();

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].kind, ClipKind::MergedNote);
        assert_eq!(merged[0].text_highlight.as_deref(), Some("earlier"));
        assert_eq!(merged[1].kind, ClipKind::Highlight);
    }

    #[test]
    fn test_highlights_only_pass_through_unchanged() {
        let input = vec![
            highlight("1-2", 10, "a"),
            highlight("3-4", 20, "b"),
        ];
        let merged = merge_clippings(input.clone()).unwrap();
        assert_eq!(merged, input);
    }

    #[test]
    fn test_merged_input_is_precondition_error() {
        let hl = highlight("1-2", 10, "a");
        let nt = note("2", 12, "b");
        let already_merged = Clipping::merged(&hl, &nt);

        assert!(matches!(
            merge_clippings(vec![hl, already_merged]),
            Err(MergeError::MergedInput { .. })
        ));
    }

    #[test]
    fn test_highlight_order_preserved() {
        let merged = merge_clippings(vec![
            highlight("1-2", 10, "a"),
            note("9", 10, "loose"),
            highlight("3-4", 20, "b"),
        ])
        .unwrap();

        // highlights first in parse order, unmatched note appended
        assert_eq!(merged[0].text_highlight.as_deref(), Some("a"));
        assert_eq!(merged[1].text_highlight.as_deref(), Some("b"));
        assert_eq!(merged[2].text_note.as_deref(), Some("loose"));
    }

    #[test]
    fn test_parse_then_merge_end_to_end() {
        let raw = "\u{feff}Book Title (Author Name)\n\
                   - Your Highlight on Location 100-105 | Added on Monday, January 1, 2024 10:00:00 AM\n\
                   \n\
                   Some highlighted text\n\
                   ==========\n\
                   \u{feff}Book Title (Author Name)\n\
                   - Your Note on Location 105 | Added on Monday, January 1, 2024 10:00:05 AM\n\
                   \n\
                   companion remark\n\
                   ==========\n\
                   \u{feff}Book Title (Author Name)\n\
                   - Your Note on Location 105 | Added on Monday, January 1, 2024 10:00:20 AM\n\
                   \n\
                   straggler remark\n\
                   ==========\n";

        let parsed = crate::parser::parse_clippings(raw).unwrap();
        let merged = merge_clippings(parsed).unwrap();

        // the 5s note merged, the 20s note stayed standalone
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].kind, ClipKind::MergedNote);
        assert_eq!(merged[0].text_highlight.as_deref(), Some("Some highlighted text"));
        assert_eq!(merged[0].text_note.as_deref(), Some("companion remark"));
        assert_eq!(merged[1].kind, ClipKind::Note);
        assert_eq!(merged[1].text_note.as_deref(), Some("straggler remark"));
    }

    #[test]
    fn test_bad_location_is_error_not_default() {
        let result = merge_clippings(vec![
            highlight("100-105", 1000, "passage"),
            note("chapter-three", 1000, "remark"),
        ]);

        assert!(matches!(
            result,
            Err(MergeError::Model(ModelError::BadLocation { .. }))
        ));
    }
}
