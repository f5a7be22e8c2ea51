//! The index subsystem (spec §4.C, §4.D, §4.E): table management, the
//! incremental maintenance engine, and the query surfaces built on top.

mod descriptor;
mod docview;
mod engine;
mod query;
mod table;

pub use descriptor::{IndexBuilder, IndexDescriptor, Projection};
pub use docview::{materialize, materialize_items, Docs};
pub use engine::update;
pub use query::{rewrite_fts_query, IndexView, Paths};
pub use table::{ensure_table, table_name, version_hash};
