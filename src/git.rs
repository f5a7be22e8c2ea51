//! Thin wrapper over the `git` executable, invoked as a subprocess.
//!
//! The maintenance engine treats git as a black-box CLI exposing exactly the
//! commands listed below (spec §6) — never an embedded git implementation —
//! so that the documented command surface is the literal contract between
//! this crate and the VCS.

use std::path::{Path, PathBuf};
use std::process::Command;

use log::debug;

use crate::error::{Error, Result};

/// One line of `git diff --name-status` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffStatus {
    Added,
    Modified,
    Deleted,
    Copied,
    /// A rename with the git-reported similarity score, e.g. `R100`, `R87`.
    Renamed(u8),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEntry {
    pub status: DiffStatus,
    pub path: String,
    /// Present for copies and renames: the path the entry was copied/renamed to.
    pub new_path: Option<String>,
}

/// One line of `git status --porcelain` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub index_status: char,
    pub worktree_status: char,
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub commit: String,
    pub author_name: String,
    pub author_email: String,
    pub date: String,
}

/// A repository directory, talked to exclusively through `git -C <repo> ...`.
#[derive(Debug, Clone)]
pub struct GitRepo {
    path: PathBuf,
}

impl GitRepo {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        GitRepo { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `git -C <repo> <args...>`, returning trimmed stdout on success.
    pub fn run<I, S>(&self, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|s| s.as_ref().to_string()).collect();
        debug!("git -C {} {}", self.path.display(), args.join(" "));
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.path)
            .args(&args)
            .output()
            .map_err(|e| Error::git(args.join(" "), e.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(Error::git(args.join(" "), stderr));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    }

    /// True iff `git status` succeeds (i.e. `path` is inside a git working tree).
    pub fn is_repo(&self) -> bool {
        self.run(["status"]).is_ok()
    }

    pub fn init(&self) -> Result<()> {
        self.run(["init"]).map(|_| ())
    }

    pub fn add<S: AsRef<str>>(&self, paths: &[S]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args = vec!["add".to_string()];
        args.extend(paths.iter().map(|p| p.as_ref().to_string()));
        self.run(args).map(|_| ())
    }

    pub fn rm_f<S: AsRef<str>>(&self, paths: &[S]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args = vec!["rm".to_string(), "-f".to_string()];
        args.extend(paths.iter().map(|p| p.as_ref().to_string()));
        self.run(args).map(|_| ())
    }

    pub fn commit<S: AsRef<str>>(&self, paths: &[S], message: &str) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args = vec!["commit".to_string(), "-m".to_string(), message.to_string()];
        args.extend(paths.iter().map(|p| p.as_ref().to_string()));
        self.run(args).map(|_| ())
    }

    pub fn reset<S: AsRef<str>>(&self, paths: &[S]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args = vec!["reset".to_string()];
        args.extend(paths.iter().map(|p| p.as_ref().to_string()));
        self.run(args).map(|_| ())
    }

    pub fn rev_parse_head(&self) -> Result<String> {
        self.run(["rev-parse", "HEAD"])
    }

    pub fn empty_tree_hash(&self) -> Result<String> {
        self.run(["hash-object", "-t", "tree", "/dev/null"])
    }

    pub fn status_porcelain(&self) -> Result<Vec<StatusEntry>> {
        let out = self.run(["status", "--porcelain"])?;
        Ok(out
            .lines()
            .filter(|l| !l.is_empty())
            .map(|line| {
                let mut chars = line.chars();
                let index_status = chars.next().unwrap_or(' ');
                let worktree_status = chars.next().unwrap_or(' ');
                let path = line[2..].trim_start().to_string();
                StatusEntry {
                    index_status,
                    worktree_status,
                    path,
                }
            })
            .collect())
    }

    /// `git diff --name-status <from> <to>`, parsed per spec §6's status codes.
    pub fn diff_name_status(&self, from: &str, to: &str) -> Result<Vec<DiffEntry>> {
        let out = self.run(["diff", "--name-status", from, to])?;
        let mut entries = Vec::new();
        for line in out.lines().filter(|l| !l.is_empty()) {
            let mut fields = line.split('\t');
            let code = match fields.next() {
                Some(c) => c,
                None => continue,
            };
            let status = if code == "A" {
                DiffStatus::Added
            } else if code == "M" {
                DiffStatus::Modified
            } else if code == "D" {
                DiffStatus::Deleted
            } else if code == "C" || code.starts_with('C') {
                DiffStatus::Copied
            } else if let Some(score) = code.strip_prefix('R') {
                DiffStatus::Renamed(score.parse().unwrap_or(0))
            } else {
                continue;
            };
            match status {
                DiffStatus::Copied | DiffStatus::Renamed(_) => {
                    let path = fields.next().unwrap_or("").to_string();
                    let new_path = fields.next().map(|s| s.to_string());
                    entries.push(DiffEntry {
                        status,
                        path,
                        new_path,
                    });
                }
                _ => {
                    let path = fields.next().unwrap_or("").to_string();
                    entries.push(DiffEntry {
                        status,
                        path,
                        new_path: None,
                    });
                }
            }
        }
        Ok(entries)
    }

    /// `git log -- <paths>`, parsed into `(commit, author, date)` triples.
    ///
    /// Carried over from `shadb.py`'s `SHADB.log` (spec.md's distillation
    /// dropped it); read-only, no index interaction.
    pub fn log<S: AsRef<str>>(&self, paths: &[S]) -> Result<Vec<LogEntry>> {
        let mut args = vec!["log".to_string()];
        if !paths.is_empty() {
            args.push("--".to_string());
            args.extend(paths.iter().map(|p| p.as_ref().to_string()));
        }
        let out = self.run(args)?;
        let mut entries = Vec::new();
        let mut current: Option<LogEntry> = None;
        for line in out.lines() {
            if let Some(rest) = line.strip_prefix("commit ") {
                if let Some(entry) = current.take() {
                    entries.push(entry);
                }
                current = Some(LogEntry {
                    commit: rest.trim().to_string(),
                    author_name: String::new(),
                    author_email: String::new(),
                    date: String::new(),
                });
            } else if let Some(rest) = line.strip_prefix("Author:") {
                if let Some(entry) = current.as_mut() {
                    let rest = rest.trim();
                    if let Some(idx) = rest.rfind('<') {
                        entry.author_name = rest[..idx].trim().to_string();
                        entry.author_email = rest[idx + 1..].trim_end_matches('>').to_string();
                    } else {
                        entry.author_name = rest.to_string();
                    }
                }
            } else if let Some(rest) = line.strip_prefix("Date:") {
                if let Some(entry) = current.as_mut() {
                    entry.date = rest.trim().to_string();
                }
            }
        }
        if let Some(entry) = current.take() {
            entries.push(entry);
        }
        Ok(entries)
    }

    pub fn write_gitignore(&self, contents: &str) -> Result<()> {
        std::fs::write(self.path.join(".gitignore"), contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    #[test]
    fn detects_non_repo() {
        let dir = TempDir::new().unwrap();
        let repo = GitRepo::at(dir.path());
        assert!(!repo.is_repo());
    }

    #[test]
    fn init_and_commit_roundtrip() {
        let (dir, repo) = init_repo();
        assert!(repo.is_repo());
        std::fs::write(dir.path().join("a.json"), "{}").unwrap();
        repo.add(&["a.json"]).unwrap();
        repo.commit(&["a.json"], "add a").unwrap();
        let head = repo.rev_parse_head().unwrap();
        assert_eq!(head.len(), 40);
    }

    #[test]
    fn diff_name_status_parses_added_and_modified() {
        let (dir, repo) = init_repo();
        let empty = repo.empty_tree_hash().unwrap();
        std::fs::write(dir.path().join("a.json"), "{}").unwrap();
        repo.add(&["a.json"]).unwrap();
        repo.commit(&["a.json"], "add a").unwrap();
        let head = repo.rev_parse_head().unwrap();
        let diffs = repo.diff_name_status(&empty, &head).unwrap();
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].status, DiffStatus::Added);
        assert_eq!(diffs[0].path, "a.json");
    }

    #[test]
    fn status_porcelain_reports_staged_additions() {
        let (dir, repo) = init_repo();
        std::fs::write(dir.path().join("a.json"), "{}").unwrap();
        repo.add(&["a.json"]).unwrap();
        let entries = repo.status_porcelain().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].index_status, 'A');
        assert_eq!(entries[0].path, "a.json");
    }
}
