//! Typed key/value bag stored in a record's properties column.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::schema::Column;
use crate::types::{NativeKind, PropMap, Value};
use crate::validation::Errors;

pub const NOT_DECLARED: &str = "property not declared";

/// Outcome of casting an assignment against its column.
#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    Store(Value),
    /// Blank value: fall back to the column default, or remove the key.
    RevertToDefault,
}

/// Per-key `(old, new)` pair. `Null` marks an absent side.
pub type Changes = BTreeMap<String, (Value, Value)>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    values: PropMap,
    baseline: PropMap,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Properties decoded from storage. The loaded values are the baseline
    /// for dirty tracking and legacy tolerance.
    pub fn loaded(values: PropMap) -> Self {
        Self {
            baseline: values.clone(),
            values,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_map(&self) -> &PropMap {
        &self.values
    }

    /// Stores a value without casting.
    pub fn insert_raw(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Casts `value` for `column`. Undeclared keys are stored as given and
    /// left for validation to judge.
    pub fn prepare(&self, column: Option<&Column>, key: &str, value: Value) -> Assignment {
        let Some(column) = column else {
            return Assignment::Store(value);
        };
        if value.is_blank() {
            return Assignment::RevertToDefault;
        }

        let merge_target = column
            .class()
            .is_some_and(|class| class.native() == Some(NativeKind::Map));
        if let (true, Value::Map(incoming), Some(caster)) = (merge_target, &value, column.caster()) {
            let current = match self.values.get(key) {
                Some(Value::Map(map)) => map.clone(),
                _ => PropMap::new(),
            };
            if let Some(merged) = caster.merge_map(current, incoming) {
                return if merged.is_empty() {
                    Assignment::RevertToDefault
                } else {
                    Assignment::Store(Value::Map(merged))
                };
            }
        }

        match column.type_cast(&value) {
            Value::Null => Assignment::RevertToDefault,
            cast => Assignment::Store(cast),
        }
    }

    pub fn apply(&mut self, key: &str, assignment: Assignment, default: Option<Value>) {
        match (assignment, default) {
            (Assignment::Store(value), _) | (Assignment::RevertToDefault, Some(value)) => {
                self.values.insert(key.to_string(), value);
            }
            (Assignment::RevertToDefault, None) => {
                self.values.remove(key);
            }
        }
    }

    /// Assigns through `column` using defaults that need no owner.
    pub fn set(&mut self, column: Option<&Column>, key: &str, value: impl Into<Value>) {
        let assignment = self.prepare(column, key, value.into());
        let default = match assignment {
            Assignment::RevertToDefault => column.and_then(Column::static_default),
            Assignment::Store(_) => None,
        };
        self.apply(key, assignment, default);
    }

    /// Assigns every pair of a map, casting each value through its column.
    pub fn merge<F>(&mut self, attributes: Value, column_for: F) -> Result<()>
    where
        F: Fn(&str) -> Option<Arc<Column>>,
    {
        let Value::Map(attributes) = attributes else {
            return Err(Error::Type(format!(
                "can't convert {} into Map",
                attributes.type_name()
            )));
        };
        for (key, value) in attributes {
            let column = column_for(&key);
            self.set(column.as_deref(), &key, value);
        }
        Ok(())
    }

    /// Checks keys against `columns` and backfills defaults.
    ///
    /// Undeclared keys are tolerated when unchanged since load, dropped when
    /// blank, and reported as [`NOT_DECLARED`] otherwise. Declared values are
    /// checked by their column. Returns false when an undeclared key was
    /// reported.
    pub fn validate(
        &mut self,
        columns: &[Arc<Column>],
        defaults: &BTreeMap<String, Value>,
        errors: &mut Errors,
    ) -> bool {
        let mut no_errors = true;

        let undeclared: Vec<String> = self
            .values
            .keys()
            .filter(|key| !columns.iter().any(|c| c.name() == key.as_str()))
            .cloned()
            .collect();
        for key in undeclared {
            let value = &self.values[&key];
            if self.baseline.get(&key) == Some(value) {
                continue;
            }
            if value.is_blank() {
                self.values.remove(&key);
            } else {
                errors.add(&key, NOT_DECLARED);
                no_errors = false;
            }
        }

        for column in columns {
            let name = column.name();
            match self.values.get(name) {
                None => {
                    if let Some(default) = defaults.get(name) {
                        self.values.insert(name.to_string(), default.clone());
                    }
                }
                Some(value) if value.is_blank() => match defaults.get(name) {
                    Some(default) => {
                        self.values.insert(name.to_string(), default.clone());
                    }
                    None => {
                        self.values.remove(name);
                    }
                },
                Some(value) => column.validate(value, errors),
            }
        }

        no_errors
    }

    pub fn changed(&self) -> bool {
        self.values != self.baseline
    }

    /// Makes the current values the new baseline.
    pub fn clear_changes(&mut self) {
        self.baseline = self.values.clone();
    }

    pub fn changes(&self) -> Changes {
        let mut changes = Changes::new();
        for (key, value) in &self.values {
            match self.baseline.get(key) {
                Some(old) if old == value => {}
                old => {
                    changes.insert(key.clone(), (old.cloned().unwrap_or_default(), value.clone()));
                }
            }
        }
        for (key, old) in &self.baseline {
            if !self.values.contains_key(key) {
                changes.insert(key.clone(), (old.clone(), Value::Null));
            }
        }
        changes
    }

    /// Value at load time.
    pub fn was(&self, key: &str) -> Option<&Value> {
        self.baseline.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnOptions, ColumnType};
    use crate::types::{MapMerge, Object, ObjectClass};

    fn column(name: &str, ty: ColumnType, options: ColumnOptions) -> Arc<Column> {
        Arc::new(Column::new(name, ty, options, "Test"))
    }

    fn defaults(columns: &[Arc<Column>]) -> BTreeMap<String, Value> {
        columns
            .iter()
            .filter_map(|c| c.static_default().map(|v| (c.name().to_string(), v)))
            .collect()
    }

    #[test]
    fn test_set_casts_declared_values() {
        let age = column("age", ColumnType::Integer, ColumnOptions::new());
        let mut props = Properties::new();
        props.set(Some(&age), "age", "34");
        assert_eq!(props.get("age"), Some(&Value::Integer(34)));
    }

    #[test]
    fn test_blank_reverts_to_default_or_removes() {
        let first = column("first_name", ColumnType::String, ColumnOptions::new().default("John"));
        let last = column("last_name", ColumnType::String, ColumnOptions::new());
        let mut props = Properties::new();
        props.set(Some(&first), "first_name", "Eric");
        props.set(Some(&last), "last_name", "Dent");

        props.set(Some(&first), "first_name", "");
        props.set(Some(&last), "last_name", "");
        assert_eq!(props.get("first_name"), Some(&Value::from("John")));
        assert!(!props.contains_key("last_name"));
    }

    #[test]
    fn test_undeclared_values_are_stored_as_given() {
        let mut props = Properties::new();
        props.set(None, "mood", " ");
        assert_eq!(props.get("mood"), Some(&Value::from(" ")));
    }

    #[test]
    fn test_merge_requires_map() {
        let mut props = Properties::new();
        let err = props.merge("this a string".into(), |_| None).unwrap_err();
        assert!(matches!(err, Error::Type(_)));

        let attrs = PropMap::from([
            ("b".to_string(), Value::from("bravo")),
            ("c".to_string(), Value::from("charlie")),
        ]);
        props.merge(Value::Map(attrs), |_| None).unwrap();
        assert_eq!(props.keys().collect::<Vec<_>>(), vec!["b", "c"]);
    }

    #[test]
    fn test_map_column_merges_incrementally() {
        let class = ObjectClass::native("Hash", NativeKind::Map)
            .with_caster(MapMerge)
            .into_ref();
        let tags = column("tags", ColumnType::Custom(class), ColumnOptions::new());
        let mut props = Properties::new();
        props.set(
            Some(&tags),
            "tags",
            PropMap::from([("a".to_string(), Value::from("alpha"))]),
        );
        props.set(
            Some(&tags),
            "tags",
            PropMap::from([("b".to_string(), Value::from("bravo"))]),
        );
        let Some(Value::Map(map)) = props.get("tags") else {
            panic!("expected a map");
        };
        assert_eq!(map.len(), 2);

        props.set(
            Some(&tags),
            "tags",
            PropMap::from([
                ("a".to_string(), Value::from("")),
                ("b".to_string(), Value::Null),
            ]),
        );
        assert!(!props.contains_key("tags"));
    }

    #[test]
    fn test_validate_flags_new_undeclared_keys() {
        let columns = vec![column("name", ColumnType::String, ColumnOptions::new())];
        let mut props = Properties::new();
        props.insert_raw("name", "Pavlov".into());
        props.insert_raw("bark", "loud".into());
        props.insert_raw("blank", "".into());

        let mut errors = Errors::new();
        assert!(!props.validate(&columns, &defaults(&columns), &mut errors));
        assert_eq!(errors.first("bark"), Some(NOT_DECLARED));
        assert!(!props.contains_key("blank"));
    }

    #[test]
    fn test_validate_tolerates_legacy_values() {
        let columns = vec![column("name", ColumnType::String, ColumnOptions::new())];
        let mut props = Properties::loaded(PropMap::from([
            ("name".to_string(), Value::from("Pavlov")),
            ("legacy".to_string(), Value::from("old")),
        ]));

        let mut errors = Errors::new();
        assert!(props.validate(&columns, &defaults(&columns), &mut errors));
        assert!(errors.is_empty());

        props.insert_raw("legacy", "changed".into());
        assert!(!props.validate(&columns, &defaults(&columns), &mut errors));
        assert_eq!(errors.first("legacy"), Some(NOT_DECLARED));
    }

    #[test]
    fn test_validate_backfills_defaults_and_checks_classes() {
        let columns = vec![
            column("age", ColumnType::Integer, ColumnOptions::new().default(18)),
            column(
                "dog",
                ColumnType::Custom(ObjectClass::object("Dog").into_ref()),
                ColumnOptions::new(),
            ),
        ];
        let mut props = Properties::new();
        props.insert_raw("dog", "Pavlov".into());

        let mut errors = Errors::new();
        assert!(props.validate(&columns, &defaults(&columns), &mut errors));
        assert_eq!(props.get("age"), Some(&Value::Integer(18)));
        assert_eq!(errors.first("dog"), Some("cannot cast String to Dog"));

        errors.clear();
        props.insert_raw("dog", Object::new("Dog").into());
        props.validate(&columns, &defaults(&columns), &mut errors);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_dirty_tracking() {
        let mut props = Properties::loaded(PropMap::from([
            ("a".to_string(), Value::from("alpha")),
            ("b".to_string(), Value::from("bravo")),
        ]));
        assert!(!props.changed());

        props.insert_raw("a", "apple".into());
        props.remove("b");
        props.insert_raw("c", "charlie".into());
        assert!(props.changed());

        let changes = props.changes();
        assert_eq!(changes["a"], (Value::from("alpha"), Value::from("apple")));
        assert_eq!(changes["b"], (Value::from("bravo"), Value::Null));
        assert_eq!(changes["c"], (Value::Null, Value::from("charlie")));
        assert_eq!(props.was("a"), Some(&Value::from("alpha")));

        props.clear_changes();
        assert!(!props.changed());
        assert!(props.changes().is_empty());
    }
}
