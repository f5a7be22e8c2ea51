//! Runnable demonstration of the library: opens (or initializes) a
//! repository at the given path, registers a couple of indices, stores a
//! few documents inside a commit scope, and prints back what the indices
//! see. Exercises the public API end to end; not part of the crate's
//! external interface (mirrors this corpus's `main.rs` logging setup).

use std::env;
use std::process::ExitCode;

use env_logger::Env;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shadb::{Database, IndexBuilder, Options, Record};

#[derive(Debug, Serialize, Deserialize)]
struct Patient {
    id: String,
    name: String,
}

impl Record for Patient {
    const TYPE_TAG: &'static str = "Patient";
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let repo_path = match env::args().nth(1) {
        Some(path) => path,
        None => {
            eprintln!("usage: shadb-demo <repo-path>");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = run(&repo_path) {
        eprintln!("error: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run(repo_path: &str) -> shadb::Result<()> {
    let mut db = Database::open(repo_path, Options::default())?;
    db.register_type::<Patient>();

    db.add_index(IndexBuilder::attribute("by_id", "id").unique().build()?)?;
    db.add_index(IndexBuilder::attribute("by_type", "resourceType").build()?)?;
    db.add_index(
        IndexBuilder::function("by_text", "v1", |doc| {
            shadb::Projected::from_option(
                serde_json::to_string(doc).ok().map(serde_json::Value::String),
            )
        })
        .fts()
        .build()?,
    )?;

    let patient = Patient {
        id: "alice".to_string(),
        name: "Alice Anderson".to_string(),
    };
    let patient_path = db.store(&patient)?;
    println!("stored typed record at {patient_path}");

    db.transaction(|scope| {
        let mut doc = serde_json::Map::new();
        doc.insert("resourceType".to_string(), json!("Observation"));
        doc.insert("note".to_string(), json!("follow up 2010-10-01"));
        scope.store_raw(doc)?;

        let mut doc = serde_json::Map::new();
        doc.insert("resourceType".to_string(), json!("Observation"));
        doc.insert("note".to_string(), json!("routine checkup"));
        scope.store_raw(doc)?;
        Ok(())
    })?;

    let counts = db.index("by_type")?.count_by_key(None)?;
    println!("Observation count: {:?}", counts.get("Observation"));

    let by_id = db.index("by_id")?.get("alice")?;
    println!("by_id[alice] = {by_id:?}");

    let matches = db.index("by_text")?.get("2010-10-01")?;
    println!("by_text matches for 2010-10-01: {matches:?}");

    println!("working tree status: {:?}", db.status()?);
    Ok(())
}
