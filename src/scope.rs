//! The commit scope (spec §4.G): a transactional bracket that batches
//! writes into one git commit, or rolls back the filesystem and the index
//! on failure.
//!
//! Ported as a closure-scoped API rather than Python's
//! `__enter__`/`__exit__` context manager, following this corpus's own
//! `rusqlite::Connection::transaction` idiom (`Database::transaction(&mut
//! self, f: impl FnOnce(&mut CommitScope) -> Result<T>) -> Result<T>`).
//! `CommitScope` exposes no nested `transaction` method, so "nested scopes
//! are not supported" (spec §4.G) is enforced by the API shape rather than
//! a runtime check.

use log::{info, warn};

use crate::codec::{self, Record};
use crate::db::Database;
use crate::document::Document;
use crate::error::Result;
use crate::store;

pub struct CommitScope<'a> {
    db: &'a mut Database,
    pending: Vec<String>,
}

impl<'a> CommitScope<'a> {
    pub(crate) fn new(db: &'a mut Database) -> Self {
        CommitScope {
            db,
            pending: Vec::new(),
        }
    }

    /// Stores a typed record (spec §4.F `store`).
    pub fn store<T: Record>(&mut self, record: &T) -> Result<String> {
        let (doc, _tag) = codec::encode_typed(record)?;
        self.store_document(doc)
    }

    /// Stores a bare document (spec §4.F `store`, untyped path).
    pub fn store_raw(&mut self, doc: Document) -> Result<String> {
        self.store_document(doc)
    }

    fn store_document(&mut self, mut doc: Document) -> Result<String> {
        store::auto_assign(&mut doc, self.db.auto_descriptor());

        let unique = self.db.unique_descriptors();
        let unique_only: Vec<_> = unique.into_iter().filter(|d| d.unique).collect();
        let (signature, unique_index_name) = store::resolve_signature(&doc, &unique_only);

        let tag = doc
            .get(codec::DISCRIMINATOR_FIELD)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| codec::untyped_tag(&doc, self.db.type_key()));

        let path = crate::path_encoder::document_path(&tag, &signature, unique_index_name.as_deref());

        let is_new = store::write_document(self.db.repo_root(), &path, &doc)?;
        if is_new {
            self.db.git().add(&[path.clone()])?;
        }

        self.pending.push(path.clone());
        self.db.update_all_indices(&[path.clone()])?;

        Ok(path)
    }

    /// Success path (spec §4.G): commit everything staged this scope.
    pub(crate) fn finish_commit(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        self.db.git().commit(&self.pending, "shadb commit")?;
        info!("commit scope: committed {} file(s)", self.pending.len());
        Ok(())
    }

    /// Failure path (spec §4.G): reset the pending paths, unlink anything
    /// that was newly staged, and re-run the index update with `pending`
    /// as hints so the previously flushed rows are removed.
    pub(crate) fn finish_abort(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let status = self.db.status()?;
        let to_delete: Vec<String> = status
            .iter()
            .filter(|entry| entry.index_status == 'A')
            .map(|entry| entry.path.clone())
            .collect();

        self.db.git().reset(&self.pending)?;
        for path in &to_delete {
            store::remove_document_if_present(self.db.repo_root(), path)?;
        }
        self.db.update_all_indices(&self.pending)?;
        warn!("commit scope aborted, rolled back {} file(s)", self.pending.len());
        Ok(())
    }
}
