use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use tracing::debug;

use super::column::{Column, ColumnOptions, ColumnType};
use super::composition::Schema;
use crate::codec::Validators;
use crate::error::{Error, Result};
use crate::index::{IndexDefinition, IndexTarget};
use crate::model::Record;
use crate::properties::Properties;
use crate::types::{ClassRef, PropMap};

/// One or more property names accepted by the declaration methods.
pub trait IntoNames {
    fn into_names(self) -> Vec<String>;
}

impl IntoNames for &str {
    fn into_names(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl IntoNames for String {
    fn into_names(self) -> Vec<String> {
        vec![self]
    }
}

impl<const N: usize> IntoNames for [&str; N] {
    fn into_names(self) -> Vec<String> {
        self.iter().map(|s| s.to_string()).collect()
    }
}

impl IntoNames for &[&str] {
    fn into_names(self) -> Vec<String> {
        self.iter().map(|s| s.to_string()).collect()
    }
}

impl IntoNames for Vec<String> {
    fn into_names(self) -> Vec<String> {
        self
    }
}

/// A named, reusable bundle of property definitions.
pub struct Role {
    name: String,
    state: RwLock<RoleState>,
}

#[derive(Default)]
struct RoleState {
    columns: Vec<Arc<Column>>,
    group_indices: Vec<IndexDefinition>,
    included_in: Vec<Weak<Schema>>,
}

macro_rules! typed_declarations {
    ($($method:ident => $ty:ident),* $(,)?) => {
        $(
            #[doc = concat!("Declares `", stringify!($method), "` properties.")]
            pub fn $method<N: IntoNames>(&self, names: N, options: ColumnOptions) -> Result<()> {
                self.declare(names, ColumnType::$ty, options)
            }
        )*
    };
}

impl Role {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            state: RwLock::new(RoleState::default()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> RwLockReadGuard<'_, RoleState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, RoleState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    typed_declarations! {
        string => String,
        text => Text,
        integer => Integer,
        float => Float,
        decimal => Decimal,
        datetime => DateTime,
        timestamp => Timestamp,
        time => Time,
        date => Date,
        binary => Binary,
        boolean => Boolean,
    }

    fn declare<N: IntoNames>(&self, names: N, ty: ColumnType, options: ColumnOptions) -> Result<()> {
        for name in names.into_names() {
            self.add_column(Column::new(name, ty.clone(), options.clone(), &self.name))?;
        }
        Ok(())
    }

    /// Declares a property holding instances of a custom class. The class
    /// must be accepted by every codec in `validators`.
    pub fn serialize(
        &self,
        name: impl Into<String>,
        class: ClassRef,
        options: ColumnOptions,
        validators: &Validators,
    ) -> Result<()> {
        validators.check(class.as_ref())?;
        self.add_column(Column::new(name, ColumnType::Custom(class), options, &self.name))
    }

    /// Declares a group index. `transform` receives the record and returns the
    /// key/value entries to store in `target`.
    ///
    /// ```ignore
    /// role.index("text", |r| {
    ///     PropMap::from([
    ///         ("high".to_string(), format!("age:{} name:{}", r.value("age"), r.value("name")).into()),
    ///         (format!("name_{}", r.value("lang")), r.value("name")),
    ///     ])
    /// });
    /// ```
    pub fn index<T, F>(&self, target: T, transform: F)
    where
        T: Into<IndexTarget>,
        F: Fn(&Record) -> PropMap + Send + Sync + 'static,
    {
        self.write().group_indices.push(IndexDefinition {
            target: target.into(),
            column: None,
            transform: Some(Arc::new(transform)),
        });
    }

    /// Adds a column, checking it against every schema the role is already
    /// part of.
    pub fn add_column(&self, column: Column) -> Result<()> {
        let including: Vec<Arc<Schema>> = {
            let state = self.read();
            if state.columns.iter().any(|c| c.name() == column.name()) {
                return Err(Error::RedefinedProperty(format!(
                    "property '{}' is already defined in {}",
                    column.name(),
                    self.name
                )));
            }
            state.included_in.iter().filter_map(Weak::upgrade).collect()
        };

        for schema in &including {
            schema.check_column_addition(self, &column)?;
        }

        debug!(role = %self.name, property = %column.name(), "declared property");
        self.write().columns.push(Arc::new(column));
        Ok(())
    }

    pub(crate) fn register_inclusion(&self, schema: Weak<Schema>) {
        let mut state = self.write();
        state.included_in.retain(|s| s.strong_count() > 0);
        state.included_in.push(schema);
    }

    pub fn columns(&self) -> Vec<Arc<Column>> {
        self.read().columns.clone()
    }

    pub fn column(&self, name: &str) -> Option<Arc<Column>> {
        self.read().columns.iter().find(|c| c.name() == name).cloned()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.read().columns.iter().map(|c| c.name().to_string()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.read().columns.iter().any(|c| c.name() == name)
    }

    /// Names that get generated accessors.
    pub fn accessor_names(&self) -> Vec<String> {
        self.read()
            .columns
            .iter()
            .filter(|c| c.should_create_accessors())
            .map(|c| c.name().to_string())
            .collect()
    }

    /// Per-column indices followed by group indices.
    pub fn defined_indices(&self) -> Vec<IndexDefinition> {
        let state = self.read();
        state
            .columns
            .iter()
            .filter_map(|c| {
                c.index().map(|group| IndexDefinition {
                    target: IndexTarget::from(group),
                    column: Some(c.name().to_string()),
                    transform: c.index_fn().cloned(),
                })
            })
            .chain(state.group_indices.iter().cloned())
            .collect()
    }

    /// True when any of the role's properties is set in `properties`.
    pub fn used_in(&self, properties: &Properties) -> bool {
        self.read().columns.iter().any(|c| properties.contains_key(c.name()))
    }

    /// The role's property names set in `properties`.
    pub fn used_keys_in(&self, properties: &Properties) -> Vec<String> {
        self.read()
            .columns
            .iter()
            .filter(|c| properties.contains_key(c.name()))
            .map(|c| c.name().to_string())
            .collect()
    }
}

impl fmt::Debug for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Role({}: {})", self.name, self.column_names().join(", "))
    }
}
