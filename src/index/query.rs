//! Query surface (spec §4.E): exact/LIKE/FTS lookups, iteration, counts.

use std::collections::BTreeMap;

use rusqlite::{params, Connection};

use crate::error::{Error, Result};

/// The result shape of a key lookup: a unique index answers with at most
/// one path, a non-unique index with a (possibly empty) list (spec §4.E).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Paths {
    One(String),
    Many(Vec<String>),
}

impl Paths {
    pub fn is_empty(&self) -> bool {
        match self {
            Paths::One(_) => false,
            Paths::Many(v) => v.is_empty(),
        }
    }

    pub fn into_vec(self) -> Vec<String> {
        match self {
            Paths::One(p) => vec![p],
            Paths::Many(v) => v,
        }
    }
}

/// A read-only view over one index's SQL table.
pub struct IndexView<'a> {
    conn: &'a Connection,
    table: String,
    unique: bool,
    fts: bool,
}

impl<'a> IndexView<'a> {
    pub fn new(conn: &'a Connection, table: impl Into<String>, unique: bool, fts: bool) -> Self {
        IndexView {
            conn,
            table: table.into(),
            unique,
            fts,
        }
    }

    /// `get(key) / [key]` (spec §4.E): `=` unless `key` contains `%` (then
    /// `LIKE`), or `MATCH` with the FTS rewriter applied if this is an FTS
    /// index. Unique raises `KeyNotFound` on a miss; non-unique returns an
    /// empty list.
    pub fn get(&self, key: &str) -> Result<Paths> {
        let (comparator, bound_key) = if self.fts {
            ("MATCH", rewrite_fts_query(key))
        } else if key.contains('%') {
            ("LIKE", key.to_string())
        } else {
            ("=", key.to_string())
        };
        let limit = if self.unique { " LIMIT 1" } else { "" };
        let sql = format!(
            r#"SELECT fn FROM "{}" WHERE key {comparator} ?1{limit}"#,
            self.table
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![bound_key])?;
        if self.unique {
            match rows.next()? {
                Some(row) => Ok(Paths::One(row.get(0)?)),
                None => Err(Error::key_not_found(key)),
            }
        } else {
            let mut paths = Vec::new();
            while let Some(row) = rows.next()? {
                paths.push(row.get(0)?);
            }
            Ok(Paths::Many(paths))
        }
    }

    /// `get(key, default)`: swallows `KeyNotFound` into `default`.
    pub fn get_or(&self, key: &str, default: Paths) -> Result<Paths> {
        match self.get(key) {
            Err(Error::KeyNotFound { .. }) => Ok(default),
            other => other,
        }
    }

    /// `in` / `contains`: truthy iff `get(key)` is truthy (spec §4.E).
    pub fn contains(&self, key: &str) -> Result<bool> {
        match self.get(key) {
            Ok(paths) => Ok(!paths.is_empty()),
            Err(Error::KeyNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn keys(&self, like: Option<&str>) -> Result<Vec<String>> {
        let sql = match like {
            Some(_) => format!(r#"SELECT DISTINCT key FROM "{}" WHERE key LIKE ?1"#, self.table),
            None => format!(r#"SELECT DISTINCT key FROM "{}""#, self.table),
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let mapped = |row: &rusqlite::Row| row.get(0);
        let rows: Vec<String> = match like {
            Some(pattern) => stmt
                .query_map(params![pattern], mapped)?
                .collect::<rusqlite::Result<_>>()?,
            None => stmt.query_map([], mapped)?.collect::<rusqlite::Result<_>>()?,
        };
        Ok(rows)
    }

    /// `items(like?)`: unique yields `(key, fn)` pairs; non-unique groups
    /// consecutive same-keys (the table is read in `ORDER BY key`) into
    /// `(key, [fn, ...])` (spec §4.E).
    pub fn items(&self, like: Option<&str>) -> Result<Vec<(String, Paths)>> {
        let sql = match like {
            Some(_) => format!(
                r#"SELECT DISTINCT key, fn FROM "{}" WHERE key LIKE ?1 ORDER BY key"#,
                self.table
            ),
            None => format!(r#"SELECT DISTINCT key, fn FROM "{}" ORDER BY key"#, self.table),
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = match like {
            Some(pattern) => stmt.query(params![pattern])?,
            None => stmt.query([])?,
        };

        let mut out: Vec<(String, Paths)> = Vec::new();
        if self.unique {
            while let Some(row) = rows.next()? {
                out.push((row.get(0)?, Paths::One(row.get(1)?)));
            }
        } else {
            let mut current_key: Option<String> = None;
            let mut current_fns: Vec<String> = Vec::new();
            while let Some(row) = rows.next()? {
                let key: String = row.get(0)?;
                let fn_: String = row.get(1)?;
                if current_key.as_deref() != Some(key.as_str()) {
                    if let Some(prev) = current_key.take() {
                        out.push((prev, Paths::Many(std::mem::take(&mut current_fns))));
                    }
                    current_key = Some(key);
                }
                current_fns.push(fn_);
            }
            if let Some(prev) = current_key.take() {
                out.push((prev, Paths::Many(current_fns)));
            }
        }
        Ok(out)
    }

    pub fn values(&self, like: Option<&str>) -> Result<Vec<Paths>> {
        Ok(self.items(like)?.into_iter().map(|(_, v)| v).collect())
    }

    pub fn count_by_key(&self, like: Option<&str>) -> Result<BTreeMap<String, i64>> {
        let sql = match like {
            Some(_) => format!(
                r#"SELECT key, COUNT(DISTINCT fn) FROM "{}" WHERE key LIKE ?1 GROUP BY key"#,
                self.table
            ),
            None => format!(
                r#"SELECT key, COUNT(DISTINCT fn) FROM "{}" GROUP BY key"#,
                self.table
            ),
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let mapped = |row: &rusqlite::Row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?));
        let rows: Vec<(String, i64)> = match like {
            Some(pattern) => stmt
                .query_map(params![pattern], mapped)?
                .collect::<rusqlite::Result<_>>()?,
            None => stmt.query_map([], mapped)?.collect::<rusqlite::Result<_>>()?,
        };
        Ok(rows.into_iter().collect())
    }

    pub fn all(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(&format!(r#"SELECT fn FROM "{}""#, self.table))?;
        let rows = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
    }
}

/// FTS query rewriter (spec §4.E): tokenize respecting double-quoted
/// substrings, upper-case bare `and`/`or`/`not` tokens into FTS5 operators,
/// and quote any token containing `-` or `/` so it reads as a phrase rather
/// than being misparsed as an operator.
pub fn rewrite_fts_query(input: &str) -> String {
    tokenize_respecting_quotes(input)
        .into_iter()
        .map(|token| {
            let lower = token.to_lowercase();
            if lower == "and" || lower == "or" || lower == "not" {
                token.to_uppercase()
            } else if token.contains('-') || token.contains('/') {
                format!("\"{}\"", token.trim_matches('"'))
            } else {
                token
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn tokenize_respecting_quotes(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() || c == ',' {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            chars.next();
        } else if c == '"' {
            current.push(c);
            chars.next();
            while let Some(&next) = chars.peek() {
                current.push(next);
                chars.next();
                if next == '\\' {
                    if let Some(&escaped) = chars.peek() {
                        current.push(escaped);
                        chars.next();
                    }
                    continue;
                }
                if next == '"' {
                    break;
                }
            }
        } else {
            current.push(c);
            chars.next();
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}
