//! An embedded document database whose durable state is a git working tree
//! of JSON files, with secondary indices materialized in SQLite.
//!
//! The working tree is the source of truth; the SQLite store (`idx.db`,
//! gitignored) is a derived cache rebuilt incrementally from git history.
//! Three pieces make that work: the path encoder (`path_encoder`) places
//! documents deterministically by type and signature, the index
//! maintenance engine (`index::engine`) replays git diffs into SQL rows,
//! and the commit scope (`scope`) batches writes into a single commit with
//! filesystem+index rollback on failure.
//!
//! ```no_run
//! use shadb::{Database, Options, IndexBuilder};
//!
//! let mut db = Database::open("./repo", Options::default())?;
//! db.add_index(IndexBuilder::attribute("by_id", "id").unique().build()?)?;
//!
//! let mut doc = serde_json::Map::new();
//! doc.insert("id".to_string(), serde_json::json!("alice"));
//! let path = db.store_raw(doc)?;
//! assert!(db.contains(&path));
//! # Ok::<(), shadb::Error>(())
//! ```

mod codec;
mod db;
mod document;
mod error;
mod git;
mod index;
mod path_encoder;
mod scope;
mod store;

pub use codec::{Record, TypeRegistry, DISCRIMINATOR_FIELD};
pub use db::{Database, Options};
pub use document::{normalize_key, Document, Projected};
pub use error::{Error, Result};
pub use git::{DiffEntry, DiffStatus, GitRepo, LogEntry, StatusEntry};
pub use index::{rewrite_fts_query, Docs, IndexBuilder, IndexDescriptor, IndexView, Paths, Projection};
pub use path_encoder::document_path;
pub use scope::CommitScope;
