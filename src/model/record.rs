use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::warn;

use super::Model;
use crate::error::{Error, Result};
use crate::properties::{Assignment, Changes, Properties};
use crate::schema::{Role, Schema};
use crate::types::{PropMap, Value};
use crate::validation::Errors;

/// One row of a host type.
#[derive(Clone)]
pub struct Record {
    model: Arc<Model>,
    id: Option<i64>,
    attributes: PropMap,
    raw_properties: Option<String>,
    properties: OnceCell<Properties>,
    schema: Option<Arc<Schema>>,
    errors: Errors,
}

impl Record {
    pub fn new(model: &Arc<Model>) -> Self {
        Self {
            model: model.clone(),
            id: None,
            attributes: PropMap::new(),
            raw_properties: None,
            properties: OnceCell::from(Properties::new()),
            schema: None,
            errors: Errors::new(),
        }
    }

    /// A stored row. Properties are decoded on first access.
    pub(crate) fn from_row(
        model: &Arc<Model>,
        id: i64,
        attributes: PropMap,
        raw_properties: Option<String>,
    ) -> Self {
        Self {
            model: model.clone(),
            id: Some(id),
            attributes,
            raw_properties,
            properties: OnceCell::new(),
            schema: None,
            errors: Errors::new(),
        }
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: Option<i64>) {
        self.id = id;
    }

    pub fn is_new_record(&self) -> bool {
        self.id.is_none()
    }

    pub fn errors(&self) -> &Errors {
        &self.errors
    }

    pub fn errors_mut(&mut self) -> &mut Errors {
        &mut self.errors
    }

    /// Instance schema if roles were added to this record, else the type's.
    pub fn schema(&self) -> &Arc<Schema> {
        self.schema.as_ref().unwrap_or_else(|| self.model.schema())
    }

    // Native attributes

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> &PropMap {
        &self.attributes
    }

    pub fn set_attribute(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        if !self.model.has_attribute(name) {
            return Err(Error::NoSuchProperty(format!(
                "{} has no attribute '{}'",
                self.model.name(),
                name
            )));
        }
        self.attributes.insert(name.to_string(), value.into());
        Ok(())
    }

    /// Sets a stored column without checking it against the declared
    /// attributes. Used for columns written by field indices.
    pub(crate) fn store_attribute(&mut self, name: String, value: Value) {
        self.attributes.insert(name, value);
    }

    /// Attribute or property value, `Null` when neither is set.
    pub fn value(&self, name: &str) -> Value {
        self.attribute(name)
            .or_else(|| self.prop(name))
            .cloned()
            .unwrap_or_default()
    }

    /// Result of a native method, if the type defines one named `name`.
    pub fn call_method(&self, name: &str) -> Option<Value> {
        self.model.method(name).map(|method| method(self))
    }

    /// Splits `attrs` between native columns and properties. Names that are
    /// not native attributes go to the properties, where validation flags
    /// the undeclared ones.
    pub fn assign(&mut self, attrs: PropMap) -> Result<()> {
        for (name, value) in attrs {
            if self.model.has_attribute(&name) {
                self.attributes.insert(name, value);
            } else {
                self.set_prop(&name, value)?;
            }
        }
        Ok(())
    }

    // Properties

    pub fn properties(&self) -> Result<&Properties> {
        if let Some(properties) = self.properties.get() {
            return Ok(properties);
        }
        let decoded = self.decode_properties()?;
        Ok(self.properties.get_or_init(|| decoded))
    }

    pub fn properties_mut(&mut self) -> Result<&mut Properties> {
        if self.properties.get().is_none() {
            let decoded = self.decode_properties()?;
            let _ = self.properties.set(decoded);
        }
        self.properties
            .get_mut()
            .ok_or_else(|| Error::Decoding("properties not loaded".to_string()))
    }

    fn decode_properties(&self) -> Result<Properties> {
        let Some(raw) = self.raw_properties.as_deref() else {
            return Ok(Properties::new());
        };
        match self.model.codec().decode(raw) {
            Ok(map) => Ok(Properties::loaded(map)),
            Err(e) => match self.model.decode_fallback() {
                Some(fallback) => {
                    warn!(
                        model = %self.model.name(),
                        id = ?self.id,
                        "could not decode properties, using fallback: {e}"
                    );
                    Ok(Properties::loaded(fallback.clone()))
                }
                None => Err(e),
            },
        }
    }

    /// Stored value of a property. `None` when unset or undecodable.
    pub fn prop(&self, key: &str) -> Option<&Value> {
        self.properties().ok()?.get(key)
    }

    /// Assigns one property, casting it through its column. A blank value
    /// reverts to the default or removes the key.
    pub fn set_prop(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        let column = self.schema().column(key);
        let assignment = self.properties()?.prepare(column.as_deref(), key, value.into());
        let default = match (&assignment, &column) {
            (Assignment::RevertToDefault, Some(column)) => column.default_for(self),
            _ => None,
        };
        self.properties_mut()?.apply(key, assignment, default);
        Ok(())
    }

    /// Merges a map into the properties. Fails with a type error for
    /// anything else.
    pub fn set_properties(&mut self, attrs: impl Into<Value>) -> Result<()> {
        let Value::Map(attrs) = attrs.into() else {
            return Err(Error::Type("properties must be assigned a map".to_string()));
        };
        for (key, value) in attrs {
            self.set_prop(&key, value)?;
        }
        Ok(())
    }

    /// Drops in-memory edits and decodes the stored column again.
    pub fn reload_properties(&mut self) -> Result<()> {
        self.properties = OnceCell::new();
        self.properties().map(|_| ())
    }

    pub fn raw_properties(&self) -> Option<&str> {
        self.raw_properties.as_deref()
    }

    /// Encodes dirty properties into the stored column. Returns whether the
    /// column must be written. Empty properties are stored as `NULL`.
    pub fn dump_properties(&mut self) -> Result<bool> {
        let Some(properties) = self.properties.get() else {
            return Ok(false);
        };
        if !properties.changed() {
            return Ok(false);
        }
        self.raw_properties = if properties.is_empty() {
            None
        } else {
            Some(self.model.codec().encode(properties.as_map())?)
        };
        Ok(true)
    }

    pub(crate) fn properties_persisted(&mut self) {
        if let Some(properties) = self.properties.get_mut() {
            properties.clear_changes();
        }
    }

    pub fn changes(&self) -> Result<Changes> {
        Ok(self.properties()?.changes())
    }

    /// Runs property validation, replacing the record's errors. Returns
    /// false when undeclared properties were found; see [`Record::is_valid`]
    /// for the persistence check.
    pub fn validate(&mut self) -> Result<bool> {
        let columns = self.schema().columns();
        let defaults: BTreeMap<String, Value> = columns
            .iter()
            .filter_map(|c| c.default_for(self).map(|v| (c.name().to_string(), v)))
            .collect();
        let mut errors = Errors::new();
        let declared = self.properties_mut()?.validate(&columns, &defaults, &mut errors);
        self.errors = errors;
        Ok(declared)
    }

    /// Validates and reports whether the record can be saved.
    pub fn is_valid(&mut self) -> Result<bool> {
        self.validate()?;
        Ok(self.errors.is_empty())
    }

    // Dispatch

    /// Reads a declared property by name. Accessors of the type are tried
    /// first, then those added to this instance.
    pub fn get(&self, name: &str) -> Result<Value> {
        self.resolve(name)?;
        Ok(self.prop(name).cloned().unwrap_or_default())
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.resolve(name)?;
        self.set_prop(name, value)
    }

    /// True when the property is set to a non-blank value.
    pub fn has(&self, name: &str) -> Result<bool> {
        self.resolve(name)?;
        Ok(self.prop(name).is_some_and(|v| !v.is_blank()))
    }

    fn resolve(&self, name: &str) -> Result<()> {
        if self.model.schema().accessor_names().contains(name) {
            return Ok(());
        }
        match &self.schema {
            Some(schema) if schema.accessor_names().contains(name) => Ok(()),
            _ => Err(Error::NoSuchProperty(format!(
                "{} has no property '{}'",
                self.model.name(),
                name
            ))),
        }
    }

    // Roles

    fn instance_schema(&mut self) -> Arc<Schema> {
        self.schema
            .get_or_insert_with(|| Schema::for_instance(self.model.schema()))
            .clone()
    }

    /// Adds a role to this record only.
    pub fn include_role(&mut self, role: &Arc<Role>) -> Result<()> {
        self.instance_schema().include_role(role)
    }

    /// Adds every role of another schema to this record only.
    pub fn include_schema(&mut self, schema: &Arc<Schema>) -> Result<()> {
        self.instance_schema().include_schema(schema)
    }

    pub fn include_model(&mut self, model: &Model) -> Result<()> {
        self.include_schema(model.schema())
    }

    pub fn has_role(&self, role: &Arc<Role>) -> bool {
        self.schema().has_role(role)
    }

    /// Roles with at least one property set on this record.
    pub fn used_roles(&self) -> Result<Vec<Arc<Role>>> {
        let properties = self.properties()?;
        Ok(self
            .schema()
            .roles()
            .into_iter()
            .filter(|role| role.used_in(properties))
            .collect())
    }

    pub fn used_keys_in(&self, role: &Role) -> Result<Vec<String>> {
        Ok(role.used_keys_in(self.properties()?))
    }
}

impl std::fmt::Debug for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("model", &self.model.name())
            .field("id", &self.id)
            .field("attributes", &self.attributes)
            .field("properties", &self.properties.get())
            .finish_non_exhaustive()
    }
}
