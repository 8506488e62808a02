//! Interactive resolution of book groups against the reference service
//!
//! For every book group the resolver consults the decision cache:
//!
//! - `Ignored` books are skipped silently.
//! - `Bound` books are not asked about again; their current merged notes
//!   are re-rendered and pushed on every run (at-least-once, idempotent by
//!   attachment title).
//! - Undecided or `Deferred` books are put to the decision provider:
//!   ignore, postpone, or search the service for candidates and bind one.
//!
//! Anything unexpected from the user resolves to `Deferred` with a
//! warning - the safe, retryable default. Transport failures are reported
//! and skip the book for the run without touching the cache.

use std::path::PathBuf;

use anyhow::Result;
use tracing::warn;

use crate::export;
use crate::models::{self, Clipping};
use crate::storage::atomic_write;
use crate::sync::cache::{Disposition, SyncCache, SyncKey};
use crate::sync::remote::{normalize_query, Candidate, ReferenceService, UploadResult};

/// Sources of user decisions
///
/// Injected so the state machine can be driven by the CLI prompt, a
/// scripted test double, or future automation. Providers return the raw
/// token; all interpretation happens in the resolver.
pub trait DecisionProvider {
    /// First-level prompt: what to do with an undecided book
    fn choose_action(&mut self, key: &SyncKey) -> Result<String>;

    /// Second-level prompt: a candidate key, or a re-issued `!`-prefixed
    /// action
    fn choose_candidate(&mut self, key: &SyncKey, candidates: &[Candidate]) -> Result<String>;
}

/// How a book group ended up this run
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Identity is ignored; nothing was done
    Ignored,
    /// Decision postponed to a future run
    Postponed,
    /// Notes rendered and pushed under the bound key
    Bound { key: String, upload: UploadResult },
    /// Transport failed; skipped for this run only, cache untouched
    Skipped { reason: String },
}

/// Drives the per-book resolution state machine
pub struct Resolver<'a> {
    cache: &'a mut SyncCache,
    service: &'a dyn ReferenceService,
    decisions: &'a mut dyn DecisionProvider,
    notes_dir: PathBuf,
}

impl<'a> Resolver<'a> {
    pub fn new(
        cache: &'a mut SyncCache,
        service: &'a dyn ReferenceService,
        decisions: &'a mut dyn DecisionProvider,
        notes_dir: PathBuf,
    ) -> Self {
        Self {
            cache,
            service,
            decisions,
            notes_dir,
        }
    }

    /// Resolve one book group
    ///
    /// The group must share a single title/author pair; a mixed group is a
    /// hard error, as is a cache write failure.
    pub fn resolve_group(&mut self, group: &[Clipping]) -> Result<Outcome> {
        let (title, author) = models::title_author(group)?;
        let key = SyncKey::new(title, author);

        match self.cache.get(&key) {
            Some(Disposition::Ignored) => Ok(Outcome::Ignored),
            Some(Disposition::Bound(remote_key)) => self.push_notes(&key, &remote_key, group),
            None | Some(Disposition::Deferred) => self.decide(&key, group),
        }
    }

    /// Ask the provider what to do with an undecided book
    fn decide(&mut self, key: &SyncKey, group: &[Clipping]) -> Result<Outcome> {
        let action = self.decisions.choose_action(key)?;

        match action.trim() {
            "i" | "ignore" => {
                self.cache.set(key, Disposition::Ignored)?;
                Ok(Outcome::Ignored)
            }
            "p" | "postpone" => {
                self.cache.set(key, Disposition::Deferred)?;
                Ok(Outcome::Postponed)
            }
            "a" | "add" => self.bind(key, group),
            other => {
                warn!(key = %key, action = other, "unrecognized action, postponing");
                self.cache.set(key, Disposition::Deferred)?;
                Ok(Outcome::Postponed)
            }
        }
    }

    /// Search for candidates and let the provider pick one
    fn bind(&mut self, key: &SyncKey, group: &[Clipping]) -> Result<Outcome> {
        let candidates = match self.service.search(&normalize_query(&key.title)) {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(key = %key, error = %e, "candidate search failed, skipping for this run");
                return Ok(Outcome::Skipped {
                    reason: e.to_string(),
                });
            }
        };

        let answer = self.decisions.choose_candidate(key, &candidates)?;
        let answer = answer.trim();

        if let Some(command) = answer.strip_prefix('!') {
            return match command {
                "i" | "ignore" => {
                    self.cache.set(key, Disposition::Ignored)?;
                    Ok(Outcome::Ignored)
                }
                "p" | "postpone" => {
                    self.cache.set(key, Disposition::Deferred)?;
                    Ok(Outcome::Postponed)
                }
                "a" | "add" => {
                    warn!(key = %key, "every candidate has already been shown, postponing");
                    self.cache.set(key, Disposition::Deferred)?;
                    Ok(Outcome::Postponed)
                }
                other => {
                    warn!(key = %key, command = other, "unrecognized command, postponing");
                    self.cache.set(key, Disposition::Deferred)?;
                    Ok(Outcome::Postponed)
                }
            };
        }

        if candidates.iter().any(|c| c.key == answer) {
            self.cache.set(key, Disposition::Bound(answer.to_string()))?;
            self.push_notes(key, answer, group)
        } else {
            warn!(key = %key, answer, "not one of the presented candidate keys, postponing");
            self.cache.set(key, Disposition::Deferred)?;
            Ok(Outcome::Postponed)
        }
    }

    /// Render the group to Markdown and push it under its bound key
    ///
    /// The rendered file also serves as the local notes export. An upload
    /// failure leaves the binding in place; the next run retries.
    fn push_notes(&mut self, key: &SyncKey, remote_key: &str, group: &[Clipping]) -> Result<Outcome> {
        let body = export::render_markdown(group)?;
        let filename = format!("{}.md", export::book_filename(&key.title, &key.author));
        let path = self.notes_dir.join(filename);
        atomic_write(&path, body.as_bytes())?;

        match self.service.upload(&path, remote_key) {
            Ok(upload) => Ok(Outcome::Bound {
                key: remote_key.to_string(),
                upload,
            }),
            Err(e) => {
                warn!(key = %key, error = %e, "upload failed, skipping for this run");
                Ok(Outcome::Skipped {
                    reason: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::path::{Path, PathBuf};

    use tempfile::TempDir;

    use crate::sync::remote::{TransportError, UploadOutcome};

    /// Scripted stand-in for the interactive prompt
    #[derive(Default)]
    struct Scripted {
        actions: VecDeque<&'static str>,
        picks: VecDeque<&'static str>,
        presented: Vec<Vec<Candidate>>,
    }

    impl Scripted {
        fn with_action(action: &'static str) -> Self {
            Self {
                actions: VecDeque::from([action]),
                ..Default::default()
            }
        }

        fn with_pick(pick: &'static str) -> Self {
            Self {
                actions: VecDeque::from(["add"]),
                picks: VecDeque::from([pick]),
                ..Default::default()
            }
        }
    }

    impl DecisionProvider for Scripted {
        fn choose_action(&mut self, _key: &SyncKey) -> Result<String> {
            Ok(self.actions.pop_front().expect("unexpected action prompt").to_string())
        }

        fn choose_candidate(
            &mut self,
            _key: &SyncKey,
            candidates: &[Candidate],
        ) -> Result<String> {
            self.presented.push(candidates.to_vec());
            Ok(self.picks.pop_front().expect("unexpected candidate prompt").to_string())
        }
    }

    /// In-memory reference service that records calls
    #[derive(Default)]
    struct FakeService {
        candidates: Vec<Candidate>,
        fail_search: bool,
        fail_upload: bool,
        searches: RefCell<Vec<String>>,
        uploads: RefCell<Vec<(PathBuf, String)>>,
    }

    impl FakeService {
        fn with_candidates(candidates: Vec<Candidate>) -> Self {
            Self {
                candidates,
                ..Default::default()
            }
        }

        fn offline() -> Self {
            Self {
                fail_search: true,
                fail_upload: true,
                ..Default::default()
            }
        }
    }

    impl ReferenceService for FakeService {
        fn search(&self, query: &str) -> Result<Vec<Candidate>, TransportError> {
            if self.fail_search {
                return Err(TransportError::Status {
                    status: 503,
                    context: "search",
                });
            }
            self.searches.borrow_mut().push(query.to_string());
            Ok(self.candidates.clone())
        }

        fn upload(&self, path: &Path, parent_key: &str) -> Result<UploadResult, TransportError> {
            if self.fail_upload {
                return Err(TransportError::Status {
                    status: 503,
                    context: "attachment listing",
                });
            }
            self.uploads
                .borrow_mut()
                .push((path.to_path_buf(), parent_key.to_string()));
            Ok(UploadResult {
                attachment_key: Some("NEW1".into()),
                outcome: UploadOutcome::Success,
            })
        }
    }

    fn group() -> Vec<Clipping> {
        vec![Clipping::highlight(
            "Book Title",
            "Author Name",
            "100-105",
            "Monday, January 1, 2024 10:00:00 AM",
            1704103200,
            "a passage",
        )]
    }

    fn key() -> SyncKey {
        SyncKey::new("Book Title", "Author Name")
    }

    fn candidate(k: &str) -> Candidate {
        Candidate {
            key: k.into(),
            title: "Book Title".into(),
            author: "Author Name".into(),
        }
    }

    struct Fixture {
        cache: SyncCache,
        service: FakeService,
        decisions: Scripted,
        notes_dir: TempDir,
    }

    impl Fixture {
        fn new(service: FakeService, decisions: Scripted) -> Self {
            Self {
                cache: SyncCache::in_memory(),
                service,
                decisions,
                notes_dir: TempDir::new().unwrap(),
            }
        }

        fn resolve(&mut self) -> Outcome {
            let mut resolver = Resolver::new(
                &mut self.cache,
                &self.service,
                &mut self.decisions,
                self.notes_dir.path().to_path_buf(),
            );
            resolver.resolve_group(&group()).unwrap()
        }
    }

    #[test]
    fn test_ignore_action() {
        let mut fx = Fixture::new(FakeService::default(), Scripted::with_action("i"));
        assert_eq!(fx.resolve(), Outcome::Ignored);
        assert_eq!(fx.cache.get(&key()), Some(Disposition::Ignored));
    }

    #[test]
    fn test_postpone_action() {
        let mut fx = Fixture::new(FakeService::default(), Scripted::with_action("postpone"));
        assert_eq!(fx.resolve(), Outcome::Postponed);
        assert_eq!(fx.cache.get(&key()), Some(Disposition::Deferred));
    }

    #[test]
    fn test_unrecognized_action_defaults_to_postpone() {
        let mut fx = Fixture::new(FakeService::default(), Scripted::with_action("wat"));
        assert_eq!(fx.resolve(), Outcome::Postponed);
        assert_eq!(fx.cache.get(&key()), Some(Disposition::Deferred));
    }

    #[test]
    fn test_add_binds_and_uploads() {
        let service = FakeService::with_candidates(vec![candidate("K1"), candidate("K2")]);
        let mut fx = Fixture::new(service, Scripted::with_pick("K2"));

        let outcome = fx.resolve();
        assert_eq!(fx.cache.get(&key()), Some(Disposition::Bound("K2".into())));

        match outcome {
            Outcome::Bound { key, upload } => {
                assert_eq!(key, "K2");
                assert_eq!(upload.outcome, UploadOutcome::Success);
                assert_eq!(upload.attachment_key.as_deref(), Some("NEW1"));
            }
            other => panic!("expected Bound, got {other:?}"),
        }

        // both candidates were shown before the pick
        assert_eq!(fx.decisions.presented, vec![vec![candidate("K1"), candidate("K2")]]);

        // the rendered notes file was written and passed to the upload
        let uploads = fx.service.uploads.borrow();
        assert_eq!(uploads.len(), 1);
        let (path, parent) = &uploads[0];
        assert_eq!(parent, "K2");
        assert!(path.ends_with("Book-Title_Author-Name.md"));
        let rendered = std::fs::read_to_string(path).unwrap();
        assert!(rendered.contains("# Book Title"));
    }

    #[test]
    fn test_add_searches_with_normalized_title() {
        let service = FakeService::with_candidates(vec![candidate("K1")]);
        let mut fx = Fixture::new(service, Scripted::with_pick("K1"));
        fx.resolve();

        assert_eq!(*fx.service.searches.borrow(), vec!["book title".to_string()]);
    }

    #[test]
    fn test_add_with_invalid_key_postpones() {
        let service = FakeService::with_candidates(vec![candidate("K1")]);
        let mut fx = Fixture::new(service, Scripted::with_pick("NOT-SHOWN"));

        assert_eq!(fx.resolve(), Outcome::Postponed);
        assert_eq!(fx.cache.get(&key()), Some(Disposition::Deferred));
        assert!(fx.service.uploads.borrow().is_empty());
    }

    #[test]
    fn test_add_then_bang_ignore() {
        let service = FakeService::with_candidates(vec![candidate("K1")]);
        let mut fx = Fixture::new(service, Scripted::with_pick("!ignore"));

        assert_eq!(fx.resolve(), Outcome::Ignored);
        assert_eq!(fx.cache.get(&key()), Some(Disposition::Ignored));
    }

    #[test]
    fn test_add_then_bang_postpone() {
        let service = FakeService::with_candidates(vec![candidate("K1")]);
        let mut fx = Fixture::new(service, Scripted::with_pick("!p"));

        assert_eq!(fx.resolve(), Outcome::Postponed);
        assert_eq!(fx.cache.get(&key()), Some(Disposition::Deferred));
    }

    #[test]
    fn test_add_reissued_with_no_new_candidates_postpones() {
        let service = FakeService::with_candidates(vec![candidate("K1")]);
        let mut fx = Fixture::new(service, Scripted::with_pick("!add"));

        assert_eq!(fx.resolve(), Outcome::Postponed);
        assert_eq!(fx.cache.get(&key()), Some(Disposition::Deferred));
    }

    #[test]
    fn test_unknown_bang_command_postpones() {
        let service = FakeService::with_candidates(vec![candidate("K1")]);
        let mut fx = Fixture::new(service, Scripted::with_pick("!frobnicate"));

        assert_eq!(fx.resolve(), Outcome::Postponed);
        assert_eq!(fx.cache.get(&key()), Some(Disposition::Deferred));
    }

    #[test]
    fn test_search_failure_skips_without_cache_write() {
        let mut fx = Fixture::new(FakeService::offline(), Scripted::with_action("add"));

        assert!(matches!(fx.resolve(), Outcome::Skipped { .. }));
        assert_eq!(fx.cache.get(&key()), None);
    }

    #[test]
    fn test_ignored_book_is_not_prompted() {
        // a provider with no scripted answers panics on any prompt
        let mut fx = Fixture::new(FakeService::default(), Scripted::default());
        fx.cache.set(&key(), Disposition::Ignored).unwrap();

        assert_eq!(fx.resolve(), Outcome::Ignored);
        assert!(fx.service.uploads.borrow().is_empty());
    }

    #[test]
    fn test_bound_book_pushes_without_prompting() {
        let mut fx = Fixture::new(FakeService::default(), Scripted::default());
        fx.cache.set(&key(), Disposition::Bound("K9".into())).unwrap();

        match fx.resolve() {
            Outcome::Bound { key, .. } => assert_eq!(key, "K9"),
            other => panic!("expected Bound, got {other:?}"),
        }

        let uploads = fx.service.uploads.borrow();
        assert_eq!(uploads[0].1, "K9");
    }

    #[test]
    fn test_deferred_book_is_asked_again() {
        let mut fx = Fixture::new(FakeService::default(), Scripted::with_action("i"));
        fx.cache.set(&key(), Disposition::Deferred).unwrap();

        assert_eq!(fx.resolve(), Outcome::Ignored);
        assert_eq!(fx.cache.get(&key()), Some(Disposition::Ignored));
    }

    #[test]
    fn test_upload_failure_keeps_binding() {
        let service = FakeService {
            fail_upload: true,
            ..Default::default()
        };
        let mut fx = Fixture::new(service, Scripted::default());
        fx.cache.set(&key(), Disposition::Bound("K9".into())).unwrap();

        assert!(matches!(fx.resolve(), Outcome::Skipped { .. }));
        // the binding survives; next run retries
        assert_eq!(fx.cache.get(&key()), Some(Disposition::Bound("K9".into())));
    }

    #[test]
    fn test_mixed_group_is_hard_error() {
        let mut fx = Fixture::new(FakeService::default(), Scripted::default());
        let mixed = vec![
            Clipping::highlight("A", "x", "1-2", "d", 10, "h"),
            Clipping::highlight("B", "x", "1-2", "d", 20, "h"),
        ];

        let mut resolver = Resolver::new(
            &mut fx.cache,
            &fx.service,
            &mut fx.decisions,
            fx.notes_dir.path().to_path_buf(),
        );
        assert!(resolver.resolve_group(&mixed).is_err());
    }
}
