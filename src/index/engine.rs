//! The index maintenance engine (spec §4.D) — the core of this crate.
//!
//! An incremental catch-up loop: diff the git history since the index's
//! `last_hash` against HEAD, fold in pending (staged-but-uncommitted)
//! paths, and replay each change as a row insert/delete/rename inside one
//! SQLite transaction.

use log::{debug, warn};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::git::{DiffEntry, DiffStatus, GitRepo};
use crate::index::descriptor::IndexDescriptor;

/// Runs one catch-up cycle for a single index table.
///
/// `load_raw` resolves a repo-relative path to its decoded document;
/// `Ok(None)` means the file is missing on disk (logged and skipped, per
/// spec §4.D's tie-break — a later rescan converges), while `Err` propagates
/// (an unknown discriminator is fatal, per §4.B). `file_exists` backs the
/// `also_fns` hint classification (spec §4.D step 4).
pub fn update<L, E>(
    conn: &mut Connection,
    git: &GitRepo,
    table: &str,
    descriptor: &IndexDescriptor,
    also_fns: &[String],
    mut load_raw: L,
    mut file_exists: E,
) -> Result<()>
where
    L: FnMut(&str) -> Result<Option<crate::document::Document>>,
    E: FnMut(&str) -> bool,
{
    let tx = conn.transaction()?;

    let last_hash: Option<String> = tx
        .query_row(
            "SELECT last_hash FROM indexed_state WHERE name = ?1",
            params![table],
            |row| row.get(0),
        )
        .optional()?;
    let last_hash = match last_hash {
        Some(hash) => hash,
        None => git.empty_tree_hash()?,
    };
    let current_hash = git.rev_parse_head()?;

    let mut changes = git.diff_name_status(&last_hash, &current_hash)?;
    for fn_path in also_fns {
        let status = if file_exists(fn_path) {
            DiffStatus::Modified
        } else {
            DiffStatus::Deleted
        };
        changes.push(DiffEntry {
            status,
            path: fn_path.clone(),
            new_path: None,
        });
    }

    let mut applied = 0usize;
    for change in &changes {
        if !change.path.ends_with(".json") {
            continue;
        }

        if let DiffStatus::Renamed(100) = change.status {
            let new_path = change.new_path.as_deref().unwrap_or(&change.path);
            tx.execute(
                &format!(r#"UPDATE "{table}" SET fn = ?1 WHERE fn = ?2"#),
                params![new_path, change.path],
            )?;
            applied += 1;
            continue;
        }

        let clears_old_rows = matches!(change.status, DiffStatus::Deleted)
            || matches!(change.status, DiffStatus::Modified)
            || matches!(change.status, DiffStatus::Renamed(score) if score != 100);
        if clears_old_rows {
            tx.execute(
                &format!(r#"DELETE FROM "{table}" WHERE fn = ?1"#),
                params![change.path],
            )?;
        }

        let reemits_rows = matches!(
            change.status,
            DiffStatus::Added | DiffStatus::Copied | DiffStatus::Modified
        ) || matches!(change.status, DiffStatus::Renamed(score) if score != 100);
        if !reemits_rows {
            continue;
        }

        let load_path = match change.status {
            DiffStatus::Renamed(_) => change.new_path.clone().unwrap_or_else(|| change.path.clone()),
            _ => change.path.clone(),
        };

        match load_raw(&load_path)? {
            None => {
                warn!("index {table}: file referenced by diff is missing, skipping: {load_path}");
                continue;
            }
            Some(doc) => {
                let keys = descriptor
                    .project(&doc)
                    .into_keys_with_null_policy(descriptor.index_null);
                for key in keys {
                    if descriptor.fts {
                        tx.execute(
                            &format!(r#"INSERT INTO "{table}" (fn, key) VALUES (?1, ?2)"#),
                            params![load_path, key],
                        )?;
                    } else if descriptor.unique {
                        tx.execute(
                            &format!(r#"INSERT OR REPLACE INTO "{table}" (key, fn) VALUES (?1, ?2)"#),
                            params![key, load_path],
                        )?;
                    } else {
                        tx.execute(
                            &format!(r#"INSERT INTO "{table}" (key, fn) VALUES (?1, ?2)"#),
                            params![key, load_path],
                        )?;
                    }
                }
                applied += 1;
            }
        }
    }

    tx.execute(
        "INSERT OR REPLACE INTO indexed_state (name, last_hash) VALUES (?1, ?2)",
        params![table, current_hash],
    )?;
    debug!("index {table}: applied {applied} change(s), now at {current_hash}");

    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::index::descriptor::IndexBuilder;
    use crate::index::table::ensure_table;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn init_repo() -> (TempDir, GitRepo) {
        let dir = TempDir::new().unwrap();
        let repo = GitRepo::at(dir.path());
        repo.init().unwrap();
        repo.run(["config", "user.name", "Test"]).unwrap();
        repo.run(["config", "user.email", "test@example.com"])
            .unwrap();
        (dir, repo)
    }

    fn write_and_commit(dir: &TempDir, repo: &GitRepo, relative: &str, doc: &Document) {
        let full = dir.path().join(relative);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(&full, serde_json::to_string_pretty(doc).unwrap()).unwrap();
        repo.add(&[relative]).unwrap();
        repo.commit(&[relative], "add").unwrap();
    }

    fn load_from_disk(dir: &TempDir, path: &str) -> Result<Option<Document>> {
        match fs::read(dir.path().join(path)) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    #[test]
    fn catch_up_indexes_committed_file() {
        let (dir, repo) = init_repo();
        let mut doc = Document::new();
        doc.insert("id".to_string(), json!("alice"));
        write_and_commit(&dir, &repo, "obj/a/obj-alice.json", &doc);

        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE indexed_state (name TEXT NOT NULL PRIMARY KEY, last_hash TEXT NOT NULL)",
            [],
        )
        .unwrap();
        let descriptor = IndexBuilder::attribute("by_id", "id").unique().build().unwrap();
        let table = ensure_table(&conn, &descriptor).unwrap();

        update(
            &mut conn,
            &repo,
            &table,
            &descriptor,
            &[],
            |p| load_from_disk(&dir, p),
            |p| dir.path().join(p).is_file(),
        )
        .unwrap();

        let fn_: String = conn
            .query_row(&format!(r#"SELECT fn FROM "{table}" WHERE key = 'alice'"#), [], |r| r.get(0))
            .unwrap();
        assert_eq!(fn_, "obj/a/obj-alice.json");
    }

    #[test]
    fn also_fns_hint_indexes_uncommitted_file() {
        let (dir, repo) = init_repo();
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE indexed_state (name TEXT NOT NULL PRIMARY KEY, last_hash TEXT NOT NULL)",
            [],
        )
        .unwrap();
        let descriptor = IndexBuilder::attribute("by_id", "id").unique().build().unwrap();
        let table = ensure_table(&conn, &descriptor).unwrap();

        let mut doc = Document::new();
        doc.insert("id".to_string(), json!("bob"));
        let full = dir.path().join("obj/b/obj-bob.json");
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(&full, serde_json::to_string_pretty(&doc).unwrap()).unwrap();
        repo.add(&["obj/b/obj-bob.json"]).unwrap();

        update(
            &mut conn,
            &repo,
            &table,
            &descriptor,
            &["obj/b/obj-bob.json".to_string()],
            |p| load_from_disk(&dir, p),
            |p| dir.path().join(p).is_file(),
        )
        .unwrap();

        let count: i64 = conn
            .query_row(&format!(r#"SELECT count(*) FROM "{table}" WHERE key = 'bob'"#), [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn modify_clears_stale_unique_row_before_reinserting() {
        let (dir, repo) = init_repo();
        let mut doc = Document::new();
        doc.insert("id".to_string(), json!("carol"));
        doc.insert("rev".to_string(), json!(1));
        write_and_commit(&dir, &repo, "obj/c/obj-carol.json", &doc);

        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE indexed_state (name TEXT NOT NULL PRIMARY KEY, last_hash TEXT NOT NULL)",
            [],
        )
        .unwrap();
        let descriptor = IndexBuilder::attribute("by_rev", "rev").build().unwrap();
        let table = ensure_table(&conn, &descriptor).unwrap();
        update(
            &mut conn,
            &repo,
            &table,
            &descriptor,
            &[],
            |p| load_from_disk(&dir, p),
            |p| dir.path().join(p).is_file(),
        )
        .unwrap();

        doc.insert("rev".to_string(), json!(2));
        write_and_commit(&dir, &repo, "obj/c/obj-carol.json", &doc);
        update(
            &mut conn,
            &repo,
            &table,
            &descriptor,
            &[],
            |p| load_from_disk(&dir, p),
            |p| dir.path().join(p).is_file(),
        )
        .unwrap();

        let count: i64 = conn
            .query_row(&format!(r#"SELECT count(*) FROM "{table}" WHERE fn = 'obj/c/obj-carol.json'"#), [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(count, 1, "stale row from revision 1 must be cleared");
        let key: String = conn
            .query_row(&format!(r#"SELECT key FROM "{table}" WHERE fn = 'obj/c/obj-carol.json'"#), [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(key, "2");
    }
}
