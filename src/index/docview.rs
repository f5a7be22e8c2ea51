//! The document-materializing query surface (spec §4.E: "A parallel
//! document-materializing surface wraps each index and replaces every
//! returned path with `load(path)`.").
//!
//! Generic over the loader so it works for both the typed (`Record`) and
//! raw (`Document`) decode tiers described in §4.B.

use crate::error::Result;
use crate::index::query::Paths;

/// The materialized counterpart of `Paths`: documents in place of paths.
#[derive(Debug, Clone)]
pub enum Docs<T> {
    One(T),
    Many(Vec<T>),
}

pub fn materialize<T>(paths: Paths, mut load: impl FnMut(&str) -> Result<T>) -> Result<Docs<T>> {
    match paths {
        Paths::One(path) => Ok(Docs::One(load(&path)?)),
        Paths::Many(paths) => {
            let mut docs = Vec::with_capacity(paths.len());
            for path in paths {
                docs.push(load(&path)?);
            }
            Ok(Docs::Many(docs))
        }
    }
}

pub fn materialize_items<T>(
    items: Vec<(String, Paths)>,
    mut load: impl FnMut(&str) -> Result<T>,
) -> Result<Vec<(String, Docs<T>)>> {
    items
        .into_iter()
        .map(|(key, paths)| Ok((key, materialize(paths, &mut load)?)))
        .collect()
}
