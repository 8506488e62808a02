//! Reference-service synchronization
//!
//! Batch, human-supervised syncing of book notes:
//!
//! 1. The decision cache remembers what the user chose for each book
//!    identity (ignore, postpone, or bind to a service key).
//! 2. The resolver walks every book group, prompting only for undecided
//!    books and re-pushing notes for bound ones.
//! 3. The reference service client does the actual search and upload.

mod cache;
mod remote;
mod resolver;

pub use cache::{CacheError, CacheStats, Disposition, SyncCache, SyncKey};
pub use remote::{
    normalize_query, Candidate, HttpReferenceService, ReferenceService, TransportError,
    UploadOutcome, UploadResult, MISSING_FIELD,
};
pub use resolver::{DecisionProvider, Outcome, Resolver};
