//! Index descriptors (spec §3 "Index descriptor", §4.C/§4.D).

use std::sync::Arc;

use crate::document::{Document, Projected};
use crate::error::{Error, Result};

/// How a document maps to its index key(s).
///
/// The source treats projections as arbitrary first-class values and hashes
/// their textual representation for versioning (spec §9). This port accepts
/// either a bare attribute name (versioned structurally, by the name
/// itself) or a function carrying its own caller-supplied version tag —
/// hashing an arbitrary closure's source is not something Rust can do.
#[derive(Clone)]
pub enum Projection {
    Attribute(String),
    Function {
        version_tag: String,
        f: Arc<dyn Fn(&Document) -> Projected + Send + Sync>,
    },
}

/// `(name, projection, unique?, index-null?, fts?, auto?)` from spec §3.
#[derive(Clone)]
pub struct IndexDescriptor {
    pub name: String,
    pub projection: Projection,
    pub unique: bool,
    pub index_null: bool,
    pub fts: bool,
    pub auto: bool,
}

impl IndexDescriptor {
    pub fn project(&self, doc: &Document) -> Projected {
        match &self.projection {
            Projection::Attribute(attr) => Projected::from_option(doc.get(attr).cloned()),
            Projection::Function { f, .. } => f(doc),
        }
    }

    /// The string hashed (by the table manager) to version this index's
    /// SQL table name (spec §3: "version = hash of the projection source").
    pub fn version_source(&self) -> &str {
        match &self.projection {
            Projection::Attribute(attr) => attr,
            Projection::Function { version_tag, .. } => version_tag,
        }
    }
}

/// Builds and validates an `IndexDescriptor` (spec §4.H: `add_index`
/// validates name and descriptor shape before constructing the table).
pub struct IndexBuilder {
    name: String,
    projection: Projection,
    unique: bool,
    index_null: bool,
    fts: bool,
    auto: bool,
}

impl IndexBuilder {
    pub fn attribute(name: impl Into<String>, attr: impl Into<String>) -> Self {
        IndexBuilder {
            name: name.into(),
            projection: Projection::Attribute(attr.into()),
            unique: false,
            index_null: false,
            fts: false,
            auto: false,
        }
    }

    pub fn function(
        name: impl Into<String>,
        version_tag: impl Into<String>,
        f: impl Fn(&Document) -> Projected + Send + Sync + 'static,
    ) -> Self {
        IndexBuilder {
            name: name.into(),
            projection: Projection::Function {
                version_tag: version_tag.into(),
                f: Arc::new(f),
            },
            unique: false,
            index_null: false,
            fts: false,
            auto: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn index_null(mut self) -> Self {
        self.index_null = true;
        self
    }

    pub fn fts(mut self) -> Self {
        self.fts = true;
        self
    }

    pub fn auto(mut self) -> Self {
        self.auto = true;
        self
    }

    /// Validates per spec §4.H/§7: illegal names, `unique && fts`, and
    /// `auto` on a function projection are all rejected here.
    pub fn build(self) -> Result<IndexDescriptor> {
        if self.name.is_empty() || self.name.starts_with('_') || !is_identifier(&self.name) {
            return Err(Error::IllegalIndexName { name: self.name });
        }
        if self.unique && self.fts {
            return Err(Error::InvalidDescriptor {
                name: self.name,
                reason: "unique and fts are mutually exclusive".to_string(),
            });
        }
        if self.auto && !matches!(self.projection, Projection::Attribute(_)) {
            return Err(Error::InvalidDescriptor {
                name: self.name,
                reason: "auto requires an attribute projection".to_string(),
            });
        }
        Ok(IndexDescriptor {
            name: self.name,
            projection: self.projection,
            unique: self.unique,
            index_null: self.index_null,
            fts: self.fts,
            auto: self.auto,
        })
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
