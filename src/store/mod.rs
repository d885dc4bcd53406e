pub mod schema;
mod sqlite;

pub use schema::quote_ident;
pub use sqlite::SqliteStore;

use std::sync::Arc;

use crate::error::Result;
use crate::model::{Model, Record};
use crate::types::{PropMap, Value};

/// Store defines the persistence surface for host records.
pub trait Store: Send + Sync {
    /// Creates the host table and the index table of every table-backed
    /// group currently declared. Safe to run again after new roles are
    /// included.
    fn install(&self, model: &Model) -> Result<()>;

    /// Validates and writes the record, then maintains its indices.
    /// Returns false without writing when validation fails.
    fn save(&self, record: &mut Record) -> Result<bool>;

    /// Deletes the row and every index entry of the record.
    fn destroy(&self, record: &mut Record) -> Result<bool>;

    fn find(&self, model: &Arc<Model>, id: i64) -> Result<Option<Record>>;

    /// Recomputes every index group of a persisted record.
    fn rebuild_index(&self, record: &mut Record) -> Result<()>;

    /// Entries stored for the record in one table-backed group.
    fn index_entries(&self, record: &Record, group: &str) -> Result<PropMap>;

    /// Ids of the owners holding `key = value` in a table-backed group.
    fn find_by_index(&self, model: &Model, group: &str, key: &str, value: &Value)
    -> Result<Vec<i64>>;
}
