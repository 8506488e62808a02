//! clipsync Core Library
//!
//! This crate provides the core functionality for clipsync, a tool that
//! turns an e-reader's plain-text clippings export into structured records
//! and keeps a reference manager up to date with them.
//!
//! # Pipeline
//!
//! ```text
//! raw export -> parser -> records -> merge engine -> by-book groups
//!                                         |
//!                  exporters (JSON, Markdown) and the sync resolver
//! ```
//!
//! # Quick Start
//!
//! ```text
//! let raw = std::fs::read_to_string(&config.clippings_file)?;
//! let records = merge_clippings(parse_clippings(&raw)?)?;
//! let books = group_by_title(records);
//! ```
//!
//! # Modules
//!
//! - `models`: the `Clipping` record and book grouping
//! - `parser`: the clippings-file grammar
//! - `merge`: note/highlight correlation
//! - `export`: JSON and Markdown rendering
//! - `sync`: decision cache, reference service client, and resolver
//! - `config`: application configuration

pub mod config;
pub mod export;
pub mod merge;
pub mod models;
pub mod parser;
pub mod storage;
pub mod sync;

pub use config::Config;
pub use merge::{merge_clippings, MergeError, MERGE_TOLERANCE_SECS};
pub use models::{group_by_title, title_author, ClipKind, Clipping, ModelError};
pub use parser::{parse_clippings, ParseError};
pub use sync::{
    Candidate, Disposition, HttpReferenceService, Outcome, ReferenceService, Resolver, SyncCache,
    SyncKey,
};
