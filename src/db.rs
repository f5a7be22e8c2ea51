//! The database facade (spec §4.H): repository init, type/index
//! registration, and the public store/load/query surface.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::info;
use rusqlite::Connection;

use crate::codec::{self, Record, TypeRegistry};
use crate::document::Document;
use crate::error::{Error, Result};
use crate::git::{GitRepo, LogEntry, StatusEntry};
use crate::index::{self, Docs, IndexDescriptor, IndexView, Paths};
use crate::scope::CommitScope;
use crate::store;

/// Builder-style configuration for `Database::open`, mirroring this
/// corpus's `Options`/`GitRepository::open`-style constructors. Ported
/// from `shadb.py`'s constructor kwargs (`id_key`, `type_key`, `init`).
#[derive(Debug, Clone)]
pub struct Options {
    /// Name of the id-carrying attribute. Stored for parity with the
    /// original constructor; the maintenance engine and codec do not
    /// depend on it (the original never reads it back either).
    pub id_key: String,
    /// Attribute consulted for an untyped document's type tag (spec §3).
    pub type_key: String,
    /// Whether `Database::open` may `git init` a missing repository.
    pub allow_init: bool,
    pub busy_timeout: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            id_key: "id".to_string(),
            type_key: "type".to_string(),
            allow_init: true,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl Options {
    pub fn id_key(mut self, id_key: impl Into<String>) -> Self {
        self.id_key = id_key.into();
        self
    }

    pub fn type_key(mut self, type_key: impl Into<String>) -> Self {
        self.type_key = type_key.into();
        self
    }

    pub fn allow_init(mut self, allow_init: bool) -> Self {
        self.allow_init = allow_init;
        self
    }

    pub fn busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }
}

pub(crate) struct RegisteredIndex {
    pub descriptor: IndexDescriptor,
    pub table: String,
}

/// The embedded document database (spec §1): a git working tree of JSON
/// documents plus a derived SQLite index store.
pub struct Database {
    repo_root: PathBuf,
    git: GitRepo,
    conn: Connection,
    registry: TypeRegistry,
    indices: BTreeMap<String, RegisteredIndex>,
    auto_index_name: Option<String>,
    options: Options,
}

impl Database {
    /// Opens (or, with `options.allow_init`, initializes) the database at
    /// `repo_path` (spec §4.H).
    pub fn open(repo_path: impl AsRef<Path>, options: Options) -> Result<Self> {
        let repo_root = repo_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&repo_root)?;
        let git = GitRepo::at(&repo_root);

        if !git.is_repo() {
            if !options.allow_init {
                return Err(Error::RepoNotInitialized {
                    path: repo_root.display().to_string(),
                });
            }
            git.init()?;
            git.write_gitignore("idx.db\n")?;
            git.add(&[".gitignore"])?;
            git.commit(&[".gitignore"], "added .gitignore")?;
            info!("initialized repository at {}", repo_root.display());
        }

        let sqlite_path = repo_root.join("idx.db");
        let conn = Connection::open(sqlite_path)?;
        conn.busy_timeout(options.busy_timeout)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS indexed_state (name TEXT NOT NULL PRIMARY KEY, last_hash TEXT NOT NULL)",
            [],
        )?;

        Ok(Database {
            repo_root,
            git,
            conn,
            registry: TypeRegistry::new(),
            indices: BTreeMap::new(),
            auto_index_name: None,
            options,
        })
    }

    /// Registers a typed record's discriminator so `load_raw` will accept
    /// it (spec §4.H: "Register user classes by name (for the codec)").
    pub fn register_type<T: Record>(&mut self) {
        self.registry.register(T::TYPE_TAG);
    }

    /// Registers a named index: validates, creates its table, and runs an
    /// initial catch-up (spec §4.H).
    pub fn add_index(&mut self, descriptor: IndexDescriptor) -> Result<()> {
        if self.indices.contains_key(&descriptor.name) {
            return Err(Error::NameConflict {
                name: descriptor.name,
            });
        }
        if descriptor.auto && self.auto_index_name.is_some() {
            return Err(Error::InvalidDescriptor {
                name: descriptor.name,
                reason: "only one auto-enabled index may be registered".to_string(),
            });
        }

        let table = index::ensure_table(&self.conn, &descriptor)?;
        if descriptor.auto {
            self.auto_index_name = Some(descriptor.name.clone());
        }
        let name = descriptor.name.clone();
        self.indices.insert(
            name.clone(),
            RegisteredIndex {
                descriptor,
                table,
            },
        );
        self.update_index(&name, &[])?;
        Ok(())
    }

    fn update_index(&mut self, name: &str, also_fns: &[String]) -> Result<()> {
        let registered = self
            .indices
            .get(name)
            .expect("update_index called with an unregistered index name");
        let table = registered.table.clone();
        let descriptor = registered.descriptor.clone();
        let repo_root = self.repo_root.clone();
        let registry = self.registry.clone();
        index::update(
            &mut self.conn,
            &self.git,
            &table,
            &descriptor,
            also_fns,
            |path| match store::read_document(&repo_root, path) {
                Ok(Some(doc)) => codec::decode_dynamic(&registry, doc).map(Some),
                Ok(None) => Ok(None),
                Err(e) => Err(e),
            },
            |path| store::document_exists(&repo_root, path),
        )
    }

    pub(crate) fn update_all_indices(&mut self, also_fns: &[String]) -> Result<()> {
        let names: Vec<String> = self.indices.keys().cloned().collect();
        for name in names {
            self.update_index(&name, also_fns)?;
        }
        Ok(())
    }

    /// A read-only view over a registered index's query surface (spec §4.E).
    pub fn index(&self, name: &str) -> Result<IndexView<'_>> {
        let registered = self
            .indices
            .get(name)
            .ok_or_else(|| Error::key_not_found(format!("no such index: {name}")))?;
        Ok(IndexView::new(
            &self.conn,
            registered.table.clone(),
            registered.descriptor.unique,
            registered.descriptor.fts,
        ))
    }

    /// Typed decode of a stored document at `path` (spec §4.B typed tier).
    pub fn load<T: Record>(&self, path: &str) -> Result<T> {
        let doc = store::read_document(&self.repo_root, path)?
            .ok_or_else(|| Error::load_missing(path))?;
        codec::decode_typed(doc)
    }

    /// Raw/dynamic decode of a stored document at `path` (spec §4.B
    /// dynamic tier): the discriminator, if present, must be registered.
    pub fn load_raw(&self, path: &str) -> Result<Document> {
        let doc = store::read_document(&self.repo_root, path)?
            .ok_or_else(|| Error::load_missing(path))?;
        codec::decode_dynamic(&self.registry, doc)
    }

    /// The document-materializing query surface (spec §4.E), typed tier.
    pub fn doc<T: Record>(&self, index_name: &str, key: &str) -> Result<Docs<T>> {
        let paths = self.index(index_name)?.get(key)?;
        index::materialize(paths, |path| self.load(path))
    }

    /// The document-materializing query surface, raw/dynamic tier.
    pub fn raw_doc(&self, index_name: &str, key: &str) -> Result<Docs<Document>> {
        let paths = self.index(index_name)?.get(key)?;
        index::materialize(paths, |path| self.load_raw(path))
    }

    /// `Database::store` is sugar for a one-shot commit scope wrapping a
    /// single `store` call (spec §4.G: "If `store` is invoked outside any
    /// scope, an implicit one-shot scope wraps that single call.").
    pub fn store<T: Record>(&mut self, record: &T) -> Result<String> {
        self.transaction(|scope| scope.store(record))
    }

    pub fn store_raw(&mut self, doc: Document) -> Result<String> {
        self.transaction(|scope| scope.store_raw(doc))
    }

    /// `delete(fn…)` (spec §4.F): `git rm -f`, then either commit
    /// immediately or trigger an index update with the removed paths as
    /// hints.
    pub fn delete<S: AsRef<str>>(&mut self, paths: &[S], commit: bool) -> Result<()> {
        let owned: Vec<String> = paths.iter().map(|p| p.as_ref().to_string()).collect();
        if owned.is_empty() {
            return Ok(());
        }
        self.git.rm_f(&owned)?;
        if commit {
            self.git.commit(&owned, "shadb delete")?;
            // A two-point `diff last_hash..HEAD` can collapse an add+delete of
            // the same path into no entry at all when both commits land
            // between catch-up cycles (the file is absent from both trees).
            // Pass the removed paths as hints so they're classified `D` (gone
            // on disk) regardless of what the diff itself reports.
            self.update_all_indices(&owned)?;
            info!("deleted and committed {} file(s)", owned.len());
        } else {
            self.update_all_indices(&owned)?;
            info!("deleted {} file(s) (uncommitted)", owned.len());
        }
        Ok(())
    }

    /// The transactional commit envelope (spec §4.G).
    pub fn transaction<T>(&mut self, f: impl FnOnce(&mut CommitScope) -> Result<T>) -> Result<T> {
        let mut scope = CommitScope::new(self);
        match f(&mut scope) {
            Ok(value) => {
                scope.finish_commit()?;
                Ok(value)
            }
            Err(e) => {
                scope.finish_abort()?;
                Err(e)
            }
        }
    }

    /// `__contains__` (spec §9 ambient): true iff the file exists on disk.
    pub fn contains(&self, path: &str) -> bool {
        store::document_exists(&self.repo_root, path)
    }

    /// `status()` (spec §9 ambient): `git status --porcelain`, parsed.
    pub fn status(&self) -> Result<Vec<StatusEntry>> {
        self.git.status_porcelain()
    }

    /// `log(paths)` (spec §9 ambient): `git log -- <paths>`, parsed.
    pub fn log<S: AsRef<str>>(&self, paths: &[S]) -> Result<Vec<LogEntry>> {
        self.git.log(paths)
    }

    pub(crate) fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub(crate) fn git(&self) -> &GitRepo {
        &self.git
    }

    pub(crate) fn type_key(&self) -> &str {
        &self.options.type_key
    }

    pub(crate) fn unique_descriptors(&self) -> Vec<&IndexDescriptor> {
        self.indices.values().map(|r| &r.descriptor).collect()
    }

    pub(crate) fn auto_descriptor(&self) -> Option<&IndexDescriptor> {
        let name = self.auto_index_name.as_ref()?;
        self.indices.get(name).map(|r| &r.descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexBuilder;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Patient {
        id: String,
        name: String,
    }

    impl Record for Patient {
        const TYPE_TAG: &'static str = "Patient";
    }

    fn open_db() -> (TempDir, Database) {
        let dir = TempDir::new().unwrap();
        let db = Database::open(dir.path(), Options::default()).unwrap();
        (dir, db)
    }

    #[test]
    fn open_initializes_git_repo_with_gitignore() {
        let (dir, _db) = open_db();
        assert!(dir.path().join(".git").is_dir());
        assert!(dir.path().join(".gitignore").is_file());
    }

    #[test]
    fn open_without_init_on_missing_repo_fails() {
        let dir = TempDir::new().unwrap();
        let err = Database::open(dir.path(), Options::default().allow_init(false)).unwrap_err();
        assert!(matches!(err, Error::RepoNotInitialized { .. }));
    }

    #[test]
    fn scenario_1_unique_index_round_trip() {
        let (_dir, mut db) = open_db();
        db.add_index(IndexBuilder::attribute("by_id", "id").unique().build().unwrap())
            .unwrap();

        let mut doc = Document::new();
        doc.insert("id".to_string(), json!("y"));
        doc.insert("data".to_string(), json!("z"));
        let path = db.store_raw(doc).unwrap();
        assert_eq!(path, "obj/y/obj-by_id-y.json");

        let loaded = db.load_raw(&path).unwrap();
        assert_eq!(loaded.get("data").unwrap(), &json!("z"));

        let found = db.index("by_id").unwrap().get("y").unwrap();
        assert_eq!(found, Paths::One(path));
    }

    #[test]
    fn scenario_2_non_unique_count_by_key() {
        let (_dir, mut db) = open_db();
        db.add_index(
            IndexBuilder::attribute("by_type", "resourceType")
                .build()
                .unwrap(),
        )
        .unwrap();

        for _ in 0..2 {
            let mut doc = Document::new();
            doc.insert("resourceType".to_string(), json!("X"));
            db.store_raw(doc).unwrap();
        }

        let counts = db.index("by_type").unwrap().count_by_key(None).unwrap();
        assert_eq!(counts.get("X"), Some(&2));
    }

    #[test]
    fn typed_round_trip() {
        let (_dir, mut db) = open_db();
        db.register_type::<Patient>();
        let patient = Patient {
            id: "1".to_string(),
            name: "Alice".to_string(),
        };
        let path = db.store(&patient).unwrap();
        let loaded: Patient = db.load(&path).unwrap();
        assert_eq!(loaded, patient);
    }

    #[test]
    fn delete_removes_file_and_index_entry() {
        let (_dir, mut db) = open_db();
        db.add_index(IndexBuilder::attribute("by_id", "id").unique().build().unwrap())
            .unwrap();
        let mut doc = Document::new();
        doc.insert("id".to_string(), json!("y"));
        let path = db.store_raw(doc).unwrap();
        assert!(db.contains(&path));

        db.delete(&[path.clone()], false).unwrap();
        assert!(!db.contains(&path));
        assert!(db.index("by_id").unwrap().get("y").is_err());
    }
}
