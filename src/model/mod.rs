//! Host types and their records.

mod accessors;
mod record;

pub use record::Record;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::codec::{Codec, Validators};
use crate::config::Settings;
use crate::error::Result;
use crate::index::IndexScope;
use crate::schema::{ColumnOptions, Role, Schema};
use crate::types::{ClassRef, PropMap, Value};

/// Native method of a host type, usable as a property default.
pub type OwnerMethod = Arc<dyn Fn(&Record) -> Value + Send + Sync>;

/// Computes the reader or writer scope of an index group.
pub type ScopeFn = Arc<dyn Fn(&Record, &str) -> IndexScope + Send + Sync>;

/// Runs inside the save transaction, before the row is written. An error
/// aborts the save.
pub type SaveHook = Arc<dyn Fn(&Record) -> Result<()> + Send + Sync>;

/// A host type: a table with native columns plus a properties column
/// governed by a composed [`Schema`].
pub struct Model {
    name: String,
    table: String,
    foreign_key: String,
    attributes: Vec<String>,
    methods: BTreeMap<String, OwnerMethod>,
    role: Arc<Role>,
    schema: Arc<Schema>,
    codec: Arc<dyn Codec>,
    validators: Validators,
    parent: Option<Arc<Model>>,
    index_reader: Option<ScopeFn>,
    index_writer: Option<ScopeFn>,
    index_columns: Vec<String>,
    before_save: Option<SaveHook>,
    decode_fallback: Option<PropMap>,
    settings: Settings,
}

impl Model {
    pub fn builder(name: impl Into<String>) -> ModelBuilder {
        ModelBuilder::new(name.into())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Owner column of the index tables.
    pub fn foreign_key(&self) -> &str {
        &self.foreign_key
    }

    pub fn parent(&self) -> Option<&Arc<Model>> {
        self.parent.as_ref()
    }

    /// Native columns, inherited ones first.
    pub fn attributes(&self) -> Vec<String> {
        let mut attributes = self
            .parent
            .as_ref()
            .map(|p| p.attributes())
            .unwrap_or_default();
        for attribute in &self.attributes {
            if !attributes.contains(attribute) {
                attributes.push(attribute.clone());
            }
        }
        attributes
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a == name)
            || self.parent.as_ref().is_some_and(|p| p.has_attribute(name))
    }

    pub fn method(&self, name: &str) -> Option<&OwnerMethod> {
        self.methods
            .get(name)
            .or_else(|| self.parent.as_ref().and_then(|p| p.method(name)))
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Role holding the properties declared directly on this type.
    ///
    /// ```ignore
    /// developer.property().string("language", ColumnOptions::new())?;
    /// ```
    pub fn property(&self) -> &Arc<Role> {
        &self.role
    }

    pub fn codec(&self) -> &Arc<dyn Codec> {
        &self.codec
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn before_save(&self) -> Option<&SaveHook> {
        self.before_save.as_ref()
    }

    pub fn decode_fallback(&self) -> Option<&PropMap> {
        self.decode_fallback.as_ref()
    }

    pub fn include_role(&self, role: &Arc<Role>) -> Result<()> {
        self.schema.include_role(role)
    }

    /// Includes every role composed by another type.
    pub fn include_model(&self, other: &Model) -> Result<()> {
        self.schema.include_schema(&other.schema)
    }

    pub fn has_role(&self, role: &Arc<Role>) -> bool {
        self.schema.has_role(role)
    }

    /// Declares a custom-class property on this type.
    pub fn serialize(
        &self,
        name: impl Into<String>,
        class: ClassRef,
        options: ColumnOptions,
    ) -> Result<()> {
        self.role.serialize(name, class, options, &self.validators)
    }

    pub fn index_table_name(&self, group: &str) -> String {
        format!("{}_{}_{}", self.settings.index_prefix, group, self.table)
    }

    /// Owner columns of the index tables created by `install`.
    pub fn index_columns(&self) -> &[String] {
        &self.index_columns
    }

    pub fn index_reader(&self, record: &Record, group: &str) -> IndexScope {
        match &self.index_reader {
            Some(reader) => reader(record, group),
            None => IndexScope::new().equals(&self.foreign_key, record.id()),
        }
    }

    pub fn index_writer(&self, record: &Record, group: &str) -> IndexScope {
        match &self.index_writer {
            Some(writer) => writer(record, group),
            None => self.index_reader(record, group),
        }
    }

    pub fn new_record(self: &Arc<Self>) -> Record {
        Record::new(self)
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

pub struct ModelBuilder {
    name: String,
    table: Option<String>,
    foreign_key: Option<String>,
    attributes: Vec<String>,
    methods: BTreeMap<String, OwnerMethod>,
    parent: Option<Arc<Model>>,
    codec: Option<Arc<dyn Codec>>,
    index_reader: Option<ScopeFn>,
    index_writer: Option<ScopeFn>,
    index_columns: Option<Vec<String>>,
    before_save: Option<SaveHook>,
    decode_fallback: Option<PropMap>,
    settings: Option<Settings>,
}

impl ModelBuilder {
    fn new(name: String) -> Self {
        Self {
            name,
            table: None,
            foreign_key: None,
            attributes: Vec::new(),
            methods: BTreeMap::new(),
            parent: None,
            codec: None,
            index_reader: None,
            index_writer: None,
            index_columns: None,
            before_save: None,
            decode_fallback: None,
            settings: None,
        }
    }

    /// Host table. Defaults to the pluralized lowercase name, or the
    /// parent's table for subtypes.
    #[must_use]
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Defaults to the singular table name followed by `_id`.
    #[must_use]
    pub fn foreign_key(mut self, foreign_key: impl Into<String>) -> Self {
        self.foreign_key = Some(foreign_key.into());
        self
    }

    #[must_use]
    pub fn attribute(mut self, name: impl Into<String>) -> Self {
        self.attributes.push(name.into());
        self
    }

    #[must_use]
    pub fn attributes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes.extend(names.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn method<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&Record) -> Value + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Arc::new(method));
        self
    }

    /// Makes this type a subtype of `parent`, sharing its table and seeing
    /// its properties.
    #[must_use]
    pub fn parent(mut self, parent: &Arc<Model>) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    #[must_use]
    pub fn codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = Some(codec);
        self
    }

    #[must_use]
    pub fn index_reader<F>(mut self, reader: F) -> Self
    where
        F: Fn(&Record, &str) -> IndexScope + Send + Sync + 'static,
    {
        self.index_reader = Some(Arc::new(reader));
        self
    }

    #[must_use]
    pub fn index_writer<F>(mut self, writer: F) -> Self
    where
        F: Fn(&Record, &str) -> IndexScope + Send + Sync + 'static,
    {
        self.index_writer = Some(Arc::new(writer));
        self
    }

    /// Owner columns of the index tables. Defaults to the foreign key.
    #[must_use]
    pub fn index_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.index_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn before_save<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Record) -> Result<()> + Send + Sync + 'static,
    {
        self.before_save = Some(Arc::new(hook));
        self
    }

    /// Properties used when the stored column cannot be decoded.
    #[must_use]
    pub fn on_decode_error(mut self, fallback: PropMap) -> Self {
        self.decode_fallback = Some(fallback);
        self
    }

    #[must_use]
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn build(self) -> Arc<Model> {
        let parent = self.parent;
        let settings = self
            .settings
            .or_else(|| parent.as_ref().map(|p| p.settings.clone()))
            .unwrap_or_default();
        let table = self
            .table
            .or_else(|| parent.as_ref().map(|p| p.table.clone()))
            .unwrap_or_else(|| pluralize(&self.name.to_lowercase()));
        let foreign_key = self
            .foreign_key
            .or_else(|| parent.as_ref().map(|p| p.foreign_key.clone()))
            .unwrap_or_else(|| format!("{}_id", singularize(&table)));
        let codec = self
            .codec
            .or_else(|| parent.as_ref().map(|p| p.codec.clone()))
            .unwrap_or_else(|| settings.codec());
        let index_reader = self
            .index_reader
            .or_else(|| parent.as_ref().and_then(|p| p.index_reader.clone()));
        let index_writer = self
            .index_writer
            .or_else(|| parent.as_ref().and_then(|p| p.index_writer.clone()));
        let index_columns = self
            .index_columns
            .or_else(|| parent.as_ref().map(|p| p.index_columns.clone()))
            .unwrap_or_else(|| vec![foreign_key.clone()]);
        let before_save = self
            .before_save
            .or_else(|| parent.as_ref().and_then(|p| p.before_save.clone()));
        let decode_fallback = self
            .decode_fallback
            .or_else(|| parent.as_ref().and_then(|p| p.decode_fallback.clone()));

        let methods: BTreeSet<String> = self
            .attributes
            .iter()
            .cloned()
            .chain(self.methods.keys().cloned())
            .chain(["id".to_string(), settings.properties_column.clone()])
            .collect();
        let schema = Schema::for_class(
            self.name.clone(),
            parent.as_ref().map(|p| p.schema.clone()),
            methods,
        );
        let role = match schema.own_role() {
            Some(role) => role.clone(),
            None => Role::new(self.name.clone()),
        };

        Arc::new(Model {
            name: self.name,
            table,
            foreign_key,
            attributes: self.attributes,
            methods: self.methods,
            role,
            schema,
            validators: Validators::new().with(codec.clone()),
            codec,
            parent,
            index_reader,
            index_writer,
            index_columns,
            before_save,
            decode_fallback,
            settings,
        })
    }
}

fn pluralize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix('y') {
        format!("{stem}ies")
    } else if word.ends_with('s') {
        format!("{word}es")
    } else {
        format!("{word}s")
    }
}

fn singularize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        format!("{stem}y")
    } else if let Some(stem) = word.strip_suffix("sses") {
        format!("{stem}ss")
    } else if let Some(stem) = word.strip_suffix('s') {
        stem.to_string()
    } else {
        word.to_string()
    }
}
