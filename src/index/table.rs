//! Index table manager (spec §4.C): per-index SQLite schema, versioned by
//! the projection.

use rusqlite::Connection;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::index::descriptor::IndexDescriptor;

/// A stable, fixed-width version hash of the projection source. `shadb.py`
/// uses MD5; MD5 itself is out of scope (it's not a wire-format
/// guarantee — table names are internal), so this port truncates a
/// SHA-256 digest to the same 16 hex characters MD5 would produce.
pub fn version_hash(descriptor: &IndexDescriptor) -> String {
    let digest = Sha256::digest(descriptor.version_source().as_bytes());
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

pub fn table_name(descriptor: &IndexDescriptor) -> String {
    format!("idx_{}__V{}", descriptor.name, version_hash(descriptor))
}

/// Creates the table (and its secondary indices) for `descriptor` if it
/// doesn't already exist, and returns its name.
///
/// A changed projection changes the version hash, so this always lands on
/// a fresh table; the previous table is simply abandoned (spec §4.C).
pub fn ensure_table(conn: &Connection, descriptor: &IndexDescriptor) -> Result<String> {
    let table = table_name(descriptor);
    if descriptor.fts {
        conn.execute(
            &format!(r#"CREATE VIRTUAL TABLE IF NOT EXISTS "{table}" USING fts5(fn, key)"#),
            [],
        )?;
    } else {
        let not_null = if descriptor.index_null { "" } else { "NOT NULL" };
        let primary_key = if descriptor.unique { "PRIMARY KEY" } else { "" };
        conn.execute(
            &format!(
                r#"CREATE TABLE IF NOT EXISTS "{table}" (key TEXT {not_null} {primary_key}, fn TEXT NOT NULL)"#
            ),
            [],
        )?;
        if !descriptor.unique {
            conn.execute(
                &format!(r#"CREATE INDEX IF NOT EXISTS "{table}_idx" ON "{table}" (key)"#),
                [],
            )?;
        }
        conn.execute(
            &format!(r#"CREATE INDEX IF NOT EXISTS "{table}_fn_idx" ON "{table}" (fn)"#),
            [],
        )?;
    }
    Ok(table)
}
