//! Secondary index maintenance.
//!
//! Indexed properties are projected into per-group tables named
//! `<prefix>_<group>_<host table>` with rows `(owner keys..., key, value)`.
//! A group starting with `.` stores its value in the owner's own column
//! instead, and a custom [`Indexer`] can take a group over entirely.

mod diff;
mod engine;
mod indexer;
mod scope;

use std::fmt;
use std::sync::Arc;

pub use diff::IndexDiff;
pub(crate) use engine::{destroy, maintain, stored_indices};
pub use indexer::Indexer;
pub use scope::{IndexScope, ScopeValue};

use crate::model::Record;
use crate::types::PropMap;

/// Computes index entries from a record.
pub type IndexFn = Arc<dyn Fn(&Record) -> PropMap + Send + Sync>;

/// Where the entries of an index group are stored.
#[derive(Clone)]
pub enum IndexTarget {
    Table(String),
    /// Owner column receiving the first non-blank entry.
    Field(String),
    Custom(Arc<dyn Indexer>),
}

impl IndexTarget {
    /// Group key used in [`crate::schema::Schema::index_groups`].
    pub fn key(&self) -> String {
        match self {
            IndexTarget::Table(group) => group.clone(),
            IndexTarget::Field(field) => format!(".{field}"),
            IndexTarget::Custom(indexer) => indexer.name().to_string(),
        }
    }
}

impl From<&str> for IndexTarget {
    fn from(group: &str) -> Self {
        match group.strip_prefix('.') {
            Some(field) => IndexTarget::Field(field.to_string()),
            None => IndexTarget::Table(group.to_string()),
        }
    }
}

impl From<String> for IndexTarget {
    fn from(group: String) -> Self {
        IndexTarget::from(group.as_str())
    }
}

impl From<Arc<dyn Indexer>> for IndexTarget {
    fn from(indexer: Arc<dyn Indexer>) -> Self {
        IndexTarget::Custom(indexer)
    }
}

impl fmt::Debug for IndexTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexTarget::Table(group) => write!(f, "Table({group})"),
            IndexTarget::Field(field) => write!(f, "Field({field})"),
            IndexTarget::Custom(indexer) => write!(f, "Custom({})", indexer.name()),
        }
    }
}

/// One contribution to an index group: a column value, the output of a
/// transform gated on a column, or an ungated group transform.
#[derive(Clone)]
pub struct IndexDefinition {
    pub target: IndexTarget,
    pub column: Option<String>,
    pub transform: Option<IndexFn>,
}

impl fmt::Debug for IndexDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexDefinition")
            .field("target", &self.target)
            .field("column", &self.column)
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct IndexGroup {
    pub target: IndexTarget,
    pub definitions: Vec<IndexDefinition>,
}

impl IndexGroup {
    pub fn new(target: IndexTarget) -> Self {
        Self {
            target,
            definitions: Vec::new(),
        }
    }

    /// Entries the group should hold for `record` right now.
    pub fn current_indices(&self, record: &Record) -> PropMap {
        let mut indices = PropMap::new();
        for definition in &self.definitions {
            match (&definition.column, &definition.transform) {
                (Some(column), transform) => {
                    let Some(value) = record.prop(column).filter(|v| !v.is_blank()) else {
                        continue;
                    };
                    match transform {
                        Some(transform) => indices.extend(transform(record)),
                        None => {
                            indices.insert(column.clone(), value.clone());
                        }
                    }
                }
                (None, Some(transform)) => indices.extend(transform(record)),
                (None, None) => {}
            }
        }
        indices
    }
}
