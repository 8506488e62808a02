//! Reference service client
//!
//! HTTP access to the external reference manager: title search for
//! candidate items, and upload of rendered note files as attachments.
//! The service is abstracted behind [`ReferenceService`] so the resolution
//! state machine can be driven against a test double.

use std::path::Path;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

/// Placeholder shown for candidate fields the service response did not carry
pub const MISSING_FIELD: &str = "(unknown)";

/// Request timeout in seconds
const REQUEST_TIMEOUT: u64 = 10;

/// A search result the user can bind a book to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// The service's item key
    pub key: String,
    pub title: String,
    pub author: String,
}

impl std::fmt::Display for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} : {} | {}", self.key, self.title, self.author)
    }
}

/// How an upload ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// A new attachment was created
    Success,
    /// The service rejected the request
    Failure,
    /// An identical attachment was already present; nothing sent
    Unchanged,
}

/// Result of pushing a note file to the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    /// Key of the newly created attachment, if one was created
    pub attachment_key: Option<String>,
    pub outcome: UploadOutcome,
}

/// Errors talking to the reference service
///
/// Transport errors never change cache state; the affected identity is
/// simply skipped for the current run.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request to reference service failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("reference service returned status {status} during {context}")]
    Status { status: u16, context: &'static str },

    #[error("could not read attachment file {path:?}: {source}")]
    Attachment {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The external search/upload capability
pub trait ReferenceService {
    /// Search the service for items matching a normalized query
    fn search(&self, query: &str) -> Result<Vec<Candidate>, TransportError>;

    /// Upload a note file as an attachment of the item `parent_key`
    ///
    /// An existing attachment with the same derived title (the file name)
    /// must be deleted first so re-uploads replace instead of duplicate;
    /// an existing attachment with identical content short-circuits to
    /// [`UploadOutcome::Unchanged`].
    fn upload(&self, path: &Path, parent_key: &str) -> Result<UploadResult, TransportError>;
}

/// Reduce a title to the service's search vocabulary
///
/// Lowercases, turns separators into spaces, strips everything that is not
/// a letter or space, and collapses whitespace runs.
pub fn normalize_query(s: &str) -> String {
    let mapped: String = s
        .to_lowercase()
        .chars()
        .map(|c| match c {
            '-' | '_' => ' ',
            c if c.is_whitespace() => ' ',
            c => c,
        })
        .filter(|c| c.is_ascii_lowercase() || *c == ' ')
        .collect();

    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract a candidate from one item of a search response
///
/// Responses are heterogeneous: the summary metadata block is preferred,
/// with the item's own data block as fallback. Fields absent from both
/// render as [`MISSING_FIELD`]; a partial response never fails the listing.
fn candidate_from_item(item: &Value) -> Candidate {
    let key = item
        .get("key")
        .and_then(Value::as_str)
        .unwrap_or(MISSING_FIELD)
        .to_string();

    let title = item
        .pointer("/meta/title")
        .or_else(|| item.pointer("/data/title"))
        .and_then(Value::as_str)
        .unwrap_or(MISSING_FIELD)
        .to_string();

    let author = item
        .pointer("/meta/creators")
        .and_then(creators_to_author)
        .unwrap_or_else(|| MISSING_FIELD.to_string());

    Candidate { key, title, author }
}

/// Join the names of all creators with the author role
fn creators_to_author(creators: &Value) -> Option<String> {
    let names: Vec<String> = creators
        .as_array()?
        .iter()
        .filter(|c| c.get("creatorType").and_then(Value::as_str) == Some("author"))
        .map(|c| {
            let first = c.get("firstName").and_then(Value::as_str).unwrap_or("");
            let last = c.get("lastName").and_then(Value::as_str).unwrap_or("");
            format!("{first} {last}").trim().to_string()
        })
        .filter(|name| !name.is_empty())
        .collect();

    if names.is_empty() {
        None
    } else {
        Some(names.join(" "))
    }
}

/// Blocking HTTP implementation of [`ReferenceService`]
pub struct HttpReferenceService {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
}

impl HttpReferenceService {
    /// Create a client for the given API base URL and key
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn items_url(&self) -> String {
        format!("{}/items", self.base_url)
    }

    fn children_url(&self, parent_key: &str) -> String {
        format!("{}/items/{}/children", self.base_url, parent_key)
    }

    fn item_url(&self, key: &str) -> String {
        format!("{}/items/{}", self.base_url, key)
    }
}

impl ReferenceService for HttpReferenceService {
    fn search(&self, query: &str) -> Result<Vec<Candidate>, TransportError> {
        let response = self
            .client
            .get(self.items_url())
            .query(&[("q", query)])
            .bearer_auth(&self.api_key)
            .send()?;

        if !response.status().is_success() {
            return Err(TransportError::Status {
                status: response.status().as_u16(),
                context: "search",
            });
        }

        let items: Vec<Value> = response.json()?;

        // the service may return an item once per matching facet
        let mut seen = std::collections::HashSet::new();
        Ok(items
            .iter()
            .map(candidate_from_item)
            .filter(|c| seen.insert(c.key.clone()))
            .collect())
    }

    fn upload(&self, path: &Path, parent_key: &str) -> Result<UploadResult, TransportError> {
        let body =
            std::fs::read_to_string(path).map_err(|source| TransportError::Attachment {
                path: path.to_path_buf(),
                source,
            })?;
        let title = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        // replace-not-duplicate: look for an attachment with the same title
        let response = self
            .client
            .get(self.children_url(parent_key))
            .bearer_auth(&self.api_key)
            .send()?;

        if !response.status().is_success() {
            return Err(TransportError::Status {
                status: response.status().as_u16(),
                context: "attachment listing",
            });
        }

        let children: Vec<Value> = response.json()?;
        let existing = children.iter().find(|c| {
            c.pointer("/data/title").and_then(Value::as_str) == Some(title.as_str())
        });

        if let Some(existing) = existing {
            if existing.pointer("/data/note").and_then(Value::as_str) == Some(body.as_str()) {
                return Ok(UploadResult {
                    attachment_key: None,
                    outcome: UploadOutcome::Unchanged,
                });
            }

            if let Some(key) = existing.get("key").and_then(Value::as_str) {
                let deleted = self
                    .client
                    .delete(self.item_url(key))
                    .bearer_auth(&self.api_key)
                    .send()?;
                if !deleted.status().is_success() {
                    return Ok(UploadResult {
                        attachment_key: None,
                        outcome: UploadOutcome::Failure,
                    });
                }
            }
        }

        let created = self
            .client
            .post(self.children_url(parent_key))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "title": title, "note": body }))
            .send()?;

        if !created.status().is_success() {
            return Ok(UploadResult {
                attachment_key: None,
                outcome: UploadOutcome::Failure,
            });
        }

        let created: Value = created.json()?;
        Ok(UploadResult {
            attachment_key: created
                .get("key")
                .and_then(Value::as_str)
                .map(str::to_string),
            outcome: UploadOutcome::Success,
        })
    }
}
