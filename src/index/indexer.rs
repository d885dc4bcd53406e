use rusqlite::Connection;

use crate::error::Result;
use crate::model::Record;
use crate::types::PropMap;

/// Stores a group's entries somewhere other than the default index tables,
/// such as a legacy table with one column per key.
pub trait Indexer: Send + Sync {
    /// Group name reported by `index_groups`.
    fn name(&self) -> &str;

    /// Called on every save with the group's current entries.
    fn set_property_index(&self, conn: &Connection, owner: &Record, indices: &PropMap) -> Result<()>;

    /// Called when `owner` is destroyed.
    fn delete_property_index(&self, conn: &Connection, owner: &Record) -> Result<()>;
}
