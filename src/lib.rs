//! # Propbag
//!
//! Schema-flexible property bags stored in one column of a relational row.
//!
//! Host types declare typed properties directly or compose them from
//! reusable [`schema::Role`]s. Values assigned to a [`model::Record`] are
//! cast and validated against the composed [`schema::Schema`], encoded with
//! a [`codec::Codec`] into the properties column, and selected properties
//! are projected into per-group index tables that follow the record's
//! lifecycle.
//!
//! ```rust,ignore
//! use propbag::model::Model;
//! use propbag::schema::{ColumnOptions, Role};
//! use propbag::store::{SqliteStore, Store};
//!
//! let employee = Model::builder("Employee")
//!     .attributes(["first_name", "last_name"])
//!     .build();
//! employee.property().integer("age", ColumnOptions::new().indexed())?;
//!
//! let poet = Role::new("Poet");
//! poet.string("poem", ColumnOptions::new())?;
//! employee.include_role(&poet)?;
//!
//! let store = SqliteStore::open_in_memory()?;
//! store.install(&employee)?;
//!
//! let mut record = employee.new_record();
//! record.set_attribute("first_name", "Eric")?;
//! record.set("poem", "Gnossienne")?;
//! store.save(&mut record)?;
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod index;
pub mod model;
pub mod properties;
pub mod schema;
pub mod store;
pub mod types;
pub mod validation;

#[doc(hidden)]
pub use paste as __paste;
