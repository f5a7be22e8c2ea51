//! The value codec (spec §4.B): encode typed records and untyped maps to
//! JSON, and decode them back.
//!
//! Rust cannot reconstruct an arbitrary concrete type from a discriminator
//! string at runtime the way the Python original's `classes[name](**o)` can
//! — so decode is split into a typed tier (the caller names `T` at the call
//! site) and a dynamic tier (a registry of known tags, used by callers and
//! by the index engine that only ever need the raw JSON back). See
//! SPEC_FULL.md §4.B.

use std::collections::HashSet;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::document::Document;
use crate::error::{Error, Result};

/// The single discriminator field injected into encoded typed records.
///
/// spec §3 permits a single discriminator field in place of the source's
/// `__dataclass__`/`__namedtuple__` pair; this port always uses this name.
pub const DISCRIMINATOR_FIELD: &str = "__dataclass__";

/// The literal type tag used for untyped documents with no `type` field.
pub const UNTYPED_TAG: &str = "obj";

/// A typed record that can be stored and reloaded through its own
/// discriminator tag.
///
/// Replaces the original's runtime `dataclasses.is_dataclass`/namedtuple
/// reflection: implementors name their own tag, and serde handles the
/// field-by-field conversion spec §4.B describes.
pub trait Record: Serialize + DeserializeOwned {
    /// Stable discriminator string, derived from the record's type name in
    /// the original (`o.__class__.__name__`); here it's just declared.
    const TYPE_TAG: &'static str;
}

/// Registered type tags, supplied at open time (spec §4.H: "Register user
/// classes by name (for the codec)"). Used by the dynamic decode tier to
/// detect an unregistered discriminator (`Error::UnknownTypeTag`).
#[derive(Debug, Default, Clone)]
pub struct TypeRegistry {
    known: HashSet<String>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tag: &'static str) {
        self.known.insert(tag.to_string());
    }

    pub fn is_registered(&self, tag: &str) -> bool {
        self.known.contains(tag)
    }
}

/// Encode a typed record: serialize to a JSON object and inject the
/// discriminator field (spec §4.B).
pub fn encode_typed<T: Record>(record: &T) -> Result<(Document, String)> {
    let value = serde_json::to_value(record)?;
    let mut doc = match value {
        Value::Object(map) => map,
        _ => {
            // Records are structs/tuple-structs with named or positional
            // fields; serde always produces an object for those when
            // derived normally. A record that serializes to something else
            // is a caller error we cannot recover from sensibly.
            Document::new()
        }
    };
    doc.insert(
        DISCRIMINATOR_FIELD.to_string(),
        Value::String(T::TYPE_TAG.to_string()),
    );
    Ok((doc, T::TYPE_TAG.to_string()))
}

/// Determine the type tag of an untyped document: its own type-key field
/// (`type` unless the database was opened with a different `type_key`), or
/// the literal `"obj"` (spec §3).
pub fn untyped_tag(doc: &Document, type_key: &str) -> String {
    doc.get(type_key)
        .and_then(Value::as_str)
        .unwrap_or(UNTYPED_TAG)
        .to_string()
}

/// Typed decode: the caller names `T`; the discriminator must be present
/// and match `T::TYPE_TAG`, or this is fatal (spec §4.B: "unknown
/// discriminator is fatal").
pub fn decode_typed<T: Record>(mut doc: Document) -> Result<T> {
    let tag = doc
        .remove(DISCRIMINATOR_FIELD)
        .and_then(|v| v.as_str().map(str::to_string));
    match tag {
        Some(tag) if tag == T::TYPE_TAG => {
            Ok(serde_json::from_value(Value::Object(doc))?)
        }
        Some(other) => Err(Error::unknown_type_tag(other)),
        None => Err(Error::unknown_type_tag("<none>")),
    }
}

/// Dynamic decode used by the index engine and by untyped callers: if a
/// discriminator is present, it must be registered (else
/// `Error::UnknownTypeTag`) and is stripped before returning; otherwise the
/// document is returned unchanged.
pub fn decode_dynamic(registry: &TypeRegistry, mut doc: Document) -> Result<Document> {
    if let Some(tag) = doc.get(DISCRIMINATOR_FIELD).and_then(Value::as_str) {
        if !registry.is_registered(tag) {
            return Err(Error::unknown_type_tag(tag));
        }
        doc.remove(DISCRIMINATOR_FIELD);
    }
    Ok(doc)
}
