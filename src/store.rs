//! Store/delete primitives (spec §4.F): filesystem writes, auto-assignment,
//! and signature resolution. The commit-scope machinery (`scope.rs`) and
//! the facade (`db.rs`) compose these into the full `store`/`delete`
//! algorithms.

use std::fs;
use std::path::Path;

use serde_json::Value;
use uuid::Uuid;

use crate::document::{normalize_key, Document, Projected};
use crate::error::Result;
use crate::index::{IndexDescriptor, Projection};

/// Mutates `doc` in place, synthesizing a value for the auto-assigned
/// index's attribute when it is absent or empty (spec §3: "when the
/// document lacks that attribute, one is synthesized and written back into
/// the document before storage"). At most one auto index may exist (spec
/// §9's open question is resolved by forbidding more than one at
/// registration), so this takes a single optional descriptor rather than a
/// list.
pub fn auto_assign(doc: &mut Document, auto_descriptor: Option<&IndexDescriptor>) {
    let Some(descriptor) = auto_descriptor else {
        return;
    };
    let Projection::Attribute(attr) = &descriptor.projection else {
        return;
    };
    let is_empty = match doc.get(attr) {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        _ => false,
    };
    if is_empty {
        doc.insert(attr.clone(), Value::String(new_uuid()));
    }
}

fn new_uuid() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Resolves a document's signature: the first non-empty projection across
/// the registered unique indices (in registration order), or a random
/// 128-bit identifier (spec §3, §4.F step 3). Returns the signature and,
/// when a unique index supplied it, that index's name (used to build the
/// `<type>-<uidx>-<sig>.json` file name per §3).
pub fn resolve_signature(doc: &Document, unique_descriptors: &[&IndexDescriptor]) -> (String, Option<String>) {
    for descriptor in unique_descriptors {
        let candidate = match descriptor.project(doc) {
            Projected::Null => None,
            Projected::One(v) => {
                let key = normalize_key(&v);
                (!key.is_empty()).then_some(key)
            }
            Projected::Many(values) => values.first().map(normalize_key).filter(|k| !k.is_empty()),
        };
        if let Some(sig) = candidate {
            return (sig, Some(descriptor.name.clone()));
        }
    }
    (new_uuid(), None)
}

/// Writes `doc` as pretty-printed, 2-space-indented JSON at
/// `<repo_root>/<relative_path>` (spec §4.F step 4, §6: "keys sorted" is
/// free since `Document` is a `BTreeMap`-backed map). Returns whether the
/// file did not already exist, which callers use to decide whether `git
/// add` is needed (spec §4.F step 5: "iff new").
pub fn write_document(repo_root: &Path, relative_path: &str, doc: &Document) -> Result<bool> {
    let full_path = repo_root.join(relative_path);
    let is_new = !full_path.is_file();
    if let Some(parent) = full_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(&Value::Object(doc.clone()))?;
    fs::write(&full_path, json)?;
    Ok(is_new)
}

pub fn read_document(repo_root: &Path, relative_path: &str) -> Result<Option<Document>> {
    match fs::read(repo_root.join(relative_path)) {
        Ok(bytes) => {
            let value: Value = serde_json::from_slice(&bytes)?;
            match value {
                Value::Object(map) => Ok(Some(map)),
                _ => Ok(Some(Document::new())),
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn document_exists(repo_root: &Path, relative_path: &str) -> bool {
    repo_root.join(relative_path).is_file()
}

/// Unlinks a file from disk if present; used by the commit-scope abort
/// path (spec §4.G: "unlink `to_delete` from disk") where the file was
/// already removed from the index but may or may not still be present.
pub fn remove_document_if_present(repo_root: &Path, relative_path: &str) -> Result<()> {
    let full = repo_root.join(relative_path);
    if full.is_file() {
        fs::remove_file(full)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexBuilder;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn auto_assign_fills_missing_attribute() {
        let descriptor = IndexBuilder::attribute("by_id", "id").unique().auto().build().unwrap();
        let mut doc = Document::new();
        auto_assign(&mut doc, Some(&descriptor));
        let id = doc.get("id").unwrap().as_str().unwrap();
        assert_eq!(id.len(), 32);
    }

    #[test]
    fn auto_assign_leaves_present_attribute() {
        let descriptor = IndexBuilder::attribute("by_id", "id").unique().auto().build().unwrap();
        let mut doc = Document::new();
        doc.insert("id".to_string(), json!("alice"));
        auto_assign(&mut doc, Some(&descriptor));
        assert_eq!(doc.get("id").unwrap(), &json!("alice"));
    }

    #[test]
    fn resolve_signature_uses_first_unique_index_with_a_value() {
        let by_id = IndexBuilder::attribute("by_id", "id").unique().build().unwrap();
        let mut doc = Document::new();
        doc.insert("id".to_string(), json!("y"));
        let (sig, name) = resolve_signature(&doc, &[&by_id]);
        assert_eq!(sig, "y");
        assert_eq!(name, Some("by_id".to_string()));
    }

    #[test]
    fn resolve_signature_falls_back_to_random_id() {
        let by_id = IndexBuilder::attribute("by_id", "id").unique().build().unwrap();
        let doc = Document::new();
        let (sig, name) = resolve_signature(&doc, &[&by_id]);
        assert_eq!(sig.len(), 32);
        assert_eq!(name, None);
    }

    #[test]
    fn write_document_reports_new_vs_existing() {
        let dir = TempDir::new().unwrap();
        let mut doc = Document::new();
        doc.insert("id".to_string(), json!("y"));
        let is_new = write_document(dir.path(), "obj/y/obj-y.json", &doc).unwrap();
        assert!(is_new);
        let is_new_again = write_document(dir.path(), "obj/y/obj-y.json", &doc).unwrap();
        assert!(!is_new_again);
    }

    #[test]
    fn round_trips_through_read_document() {
        let dir = TempDir::new().unwrap();
        let mut doc = Document::new();
        doc.insert("id".to_string(), json!("y"));
        write_document(dir.path(), "obj/y/obj-y.json", &doc).unwrap();
        let loaded = read_document(dir.path(), "obj/y/obj-y.json").unwrap().unwrap();
        assert_eq!(loaded, doc);
        assert!(read_document(dir.path(), "nope.json").unwrap().is_none());
    }
}
