use thiserror::Error;

/// Errors surfaced by every fallible public operation in this crate.
///
/// Grounded on `storage/errors.rs`'s `StorageError`/`GitError` split in the
/// teacher repo, collapsed into one enum here since this crate has a single
/// storage layer rather than two.
#[derive(Error, Debug)]
pub enum Error {
    #[error("git repository not initialized at {path} (pass init=true to create one)")]
    RepoNotInitialized { path: String },

    #[error("git command failed: git {args} ({message})")]
    Git { args: String, message: String },

    #[error("index '{name}' is already registered")]
    NameConflict { name: String },

    #[error("illegal index name '{name}': must be a non-empty identifier not starting with '_'")]
    IllegalIndexName { name: String },

    #[error("invalid index descriptor for '{name}': {reason}")]
    InvalidDescriptor { name: String, reason: String },

    #[error("key not found: {key}")]
    KeyNotFound { key: String },

    #[error("unknown type tag '{tag}': no constructor registered for it")]
    UnknownTypeTag { tag: String },

    #[error("document missing at {path}")]
    LoadMissing { path: String },

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn git(args: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Git {
            args: args.into(),
            message: message.into(),
        }
    }

    pub fn key_not_found(key: impl Into<String>) -> Self {
        Error::KeyNotFound { key: key.into() }
    }

    pub fn unknown_type_tag(tag: impl Into<String>) -> Self {
        Error::UnknownTypeTag { tag: tag.into() }
    }

    pub fn load_missing(path: impl Into<String>) -> Self {
        Error::LoadMissing { path: path.into() }
    }
}
