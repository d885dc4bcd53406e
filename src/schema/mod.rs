//! Property definitions and their composition into schemas.

mod cast;
mod column;
mod composition;
mod role;

pub use column::{Column, ColumnOptions, ColumnType, DefaultFactory, DefaultValue};
pub use composition::Schema;
pub use role::{IntoNames, Role};
