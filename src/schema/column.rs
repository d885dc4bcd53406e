use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use super::cast;
use crate::index::IndexFn;
use crate::model::Record;
use crate::types::{Caster, ClassRef, PropMap, Value};
use crate::validation::Errors;

/// Names matching this pattern get generated accessors.
static SAFE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_]+$").expect("accessor name pattern"));

#[derive(Clone)]
pub enum ColumnType {
    String,
    Text,
    Integer,
    Float,
    Decimal,
    DateTime,
    Timestamp,
    Time,
    Date,
    Binary,
    Boolean,
    /// A `serialize`d property holding instances of a custom class.
    Custom(ClassRef),
}

impl ColumnType {
    /// Type name, also the default index group of an indexed column.
    pub fn name(&self) -> &str {
        match self {
            ColumnType::String => "string",
            ColumnType::Text => "text",
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Decimal => "decimal",
            ColumnType::DateTime => "datetime",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Time => "time",
            ColumnType::Date => "date",
            ColumnType::Binary => "binary",
            ColumnType::Boolean => "boolean",
            ColumnType::Custom(class) => class.name(),
        }
    }

    pub fn class(&self) -> Option<&ClassRef> {
        match self {
            ColumnType::Custom(class) => Some(class),
            _ => None,
        }
    }
}

impl fmt::Debug for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub type DefaultFactory = Arc<dyn Fn() -> Value + Send + Sync>;

#[derive(Clone)]
pub enum DefaultValue {
    Literal(Value),
    Factory(DefaultFactory),
    /// Name of an owner method computing the default.
    Method(String),
}

#[derive(Clone, Default)]
enum IndexOption {
    #[default]
    None,
    Flag,
    Group(String),
    Transform(IndexFn),
}

/// Options recognized by the typed declaration methods.
///
/// ```ignore
/// role.integer("age", ColumnOptions::new().default(18).indexed())?;
/// role.string("name", ColumnOptions::new().index("special"))?;
/// ```
#[derive(Clone, Default)]
pub struct ColumnOptions {
    default: Option<DefaultValue>,
    index: IndexOption,
    index_group: Option<String>,
    caster: Option<Arc<dyn Caster>>,
}

impl ColumnOptions {
    pub fn new() -> Self {
        <Self as Default>::default()
    }

    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Literal(value.into()));
        self
    }

    #[must_use]
    pub fn default_with<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Factory(Arc::new(factory)));
        self
    }

    #[must_use]
    pub fn default_method(mut self, method: impl Into<String>) -> Self {
        self.default = Some(DefaultValue::Method(method.into()));
        self
    }

    /// Index the column in the group named after its type.
    #[must_use]
    pub fn indexed(mut self) -> Self {
        self.index = IndexOption::Flag;
        self
    }

    /// Index the column in an explicit group. A group starting with `.`
    /// writes into the owner's own column of that name.
    #[must_use]
    pub fn index(mut self, group: impl Into<String>) -> Self {
        self.index = IndexOption::Group(group.into());
        self
    }

    /// Index the entries returned by `transform` whenever the column is not blank.
    #[must_use]
    pub fn index_with<F>(mut self, transform: F) -> Self
    where
        F: Fn(&Record) -> PropMap + Send + Sync + 'static,
    {
        self.index = IndexOption::Transform(Arc::new(transform));
        self
    }

    /// Group used by `indexed` and `index_with` instead of the type name.
    #[must_use]
    pub fn index_group(mut self, group: impl Into<String>) -> Self {
        self.index_group = Some(group.into());
        self
    }

    #[must_use]
    pub fn caster(mut self, caster: impl Caster + 'static) -> Self {
        self.caster = Some(Arc::new(caster));
        self
    }
}

/// A typed property definition.
pub struct Column {
    name: String,
    ty: ColumnType,
    default: Option<DefaultValue>,
    index: Option<String>,
    index_fn: Option<IndexFn>,
    caster: Option<Arc<dyn Caster>>,
    role: String,
}

impl Column {
    pub fn new(
        name: impl Into<String>,
        ty: ColumnType,
        options: ColumnOptions,
        role: impl Into<String>,
    ) -> Self {
        let ColumnOptions {
            default,
            index,
            index_group,
            caster,
        } = options;

        let (index, index_fn) = match index {
            IndexOption::None => (None, None),
            IndexOption::Flag => (
                Some(index_group.unwrap_or_else(|| ty.name().to_string())),
                None,
            ),
            IndexOption::Group(group) => (Some(group), None),
            IndexOption::Transform(transform) => (
                Some(index_group.unwrap_or_else(|| ty.name().to_string())),
                Some(transform),
            ),
        };

        let mut column = Self {
            name: name.into(),
            ty,
            default: None,
            index,
            index_fn,
            caster,
            role: role.into(),
        };
        column.default = default.map(|default| match default {
            DefaultValue::Literal(value) => DefaultValue::Literal(column.type_cast(&value)),
            other => other,
        });
        column
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> &ColumnType {
        &self.ty
    }

    pub fn class(&self) -> Option<&ClassRef> {
        self.ty.class()
    }

    /// Name of the role that declared the column.
    pub fn role_name(&self) -> &str {
        &self.role
    }

    pub fn default(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }

    pub fn caster(&self) -> Option<&dyn Caster> {
        self.caster
            .as_deref()
            .or_else(|| self.class().and_then(|class| class.caster()))
    }

    pub fn type_cast(&self, value: &Value) -> Value {
        match &self.ty {
            ColumnType::String => {
                let text = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                if text.trim().is_empty() {
                    Value::Null
                } else {
                    Value::String(text)
                }
            }
            ColumnType::Custom(_) => self
                .caster()
                .and_then(|caster| caster.cast(value))
                .unwrap_or_else(|| value.clone()),
            ty => cast::cast(ty, value),
        }
    }

    /// Default for `owner`. Blank defaults count as no default.
    pub fn default_for(&self, owner: &Record) -> Option<Value> {
        let value = match self.default.as_ref()? {
            DefaultValue::Method(method) => owner.call_method(method)?,
            other => Self::eval_default(other)?,
        };
        (!value.is_blank()).then_some(value)
    }

    /// Default computable without an owner. Method defaults yield `None`.
    pub fn static_default(&self) -> Option<Value> {
        let value = Self::eval_default(self.default.as_ref()?)?;
        (!value.is_blank()).then_some(value)
    }

    fn eval_default(default: &DefaultValue) -> Option<Value> {
        match default {
            DefaultValue::Literal(value) => Some(value.clone()),
            DefaultValue::Factory(factory) => Some(factory()),
            DefaultValue::Method(_) => None,
        }
    }

    pub fn validate(&self, value: &Value, errors: &mut Errors) {
        let Some(class) = self.class() else {
            return;
        };
        if !class.is_instance(value) {
            errors.add(
                &self.name,
                format!("cannot cast {} to {}", value.type_name(), class.name()),
            );
        }
    }

    pub fn should_create_accessors(&self) -> bool {
        SAFE_NAME.is_match(&self.name)
    }

    pub fn is_indexed(&self) -> bool {
        self.index.is_some()
    }

    /// Index group name, if indexed.
    pub fn index(&self) -> Option<&str> {
        self.index.as_deref()
    }

    pub fn index_fn(&self) -> Option<&IndexFn> {
        self.index_fn.as_ref()
    }
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("name", &self.name)
            .field("type", &self.ty)
            .field("index", &self.index)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MapMerge, NativeKind, Object, ObjectClass};

    fn column(name: &str, ty: ColumnType, options: ColumnOptions) -> Column {
        Column::new(name, ty, options, "Test")
    }

    #[test]
    fn test_without_index() {
        let c = column("name", ColumnType::String, ColumnOptions::new());
        assert_eq!(c.index(), None);
        assert!(!c.is_indexed());
    }

    #[test]
    fn test_indexed_uses_type_name() {
        let c = column("foo", ColumnType::String, ColumnOptions::new().indexed());
        assert_eq!(c.index(), Some("string"));

        let c = column(
            "foo",
            ColumnType::String,
            ColumnOptions::new().indexed().index_group("integer"),
        );
        assert_eq!(c.index(), Some("integer"));
    }

    #[test]
    fn test_index_with_explicit_group() {
        let c = column("foo", ColumnType::String, ColumnOptions::new().index("special"));
        assert_eq!(c.index(), Some("special"));
        assert!(c.index_fn().is_none());
    }

    #[test]
    fn test_index_with_transform() {
        let c = column(
            "foo",
            ColumnType::String,
            ColumnOptions::new().index_with(|_| PropMap::new()),
        );
        assert_eq!(c.index(), Some("string"));
        assert!(c.index_fn().is_some());

        let c = column(
            "foo",
            ColumnType::String,
            ColumnOptions::new()
                .index_with(|_| PropMap::new())
                .index_group("ml_string"),
        );
        assert_eq!(c.index(), Some("ml_string"));
    }

    #[test]
    fn test_string_cast_blanks_to_null() {
        let c = column("name", ColumnType::String, ColumnOptions::new());
        assert_eq!(c.type_cast(&"  ".into()), Value::Null);
        assert_eq!(c.type_cast(&Value::Integer(12)), Value::from("12"));
    }

    #[test]
    fn test_literal_default_is_cast() {
        let c = column("age", ColumnType::Integer, ColumnOptions::new().default("18"));
        assert_eq!(c.static_default(), Some(Value::Integer(18)));
    }

    #[test]
    fn test_factory_default() {
        let c = column(
            "poem",
            ColumnType::String,
            ColumnOptions::new().default_with(|| "I am your muse".into()),
        );
        assert_eq!(c.static_default(), Some(Value::from("I am your muse")));

        let c = column("poem", ColumnType::String, ColumnOptions::new().default_method("muse"));
        assert_eq!(c.static_default(), None);
    }

    #[test]
    fn test_accessor_safe_names() {
        let ok = column("first_name", ColumnType::String, ColumnOptions::new());
        let bad = column("first-name", ColumnType::String, ColumnOptions::new());
        let digits = column("name2", ColumnType::String, ColumnOptions::new());
        assert!(ok.should_create_accessors());
        assert!(!bad.should_create_accessors());
        assert!(!digits.should_create_accessors());
    }

    #[test]
    fn test_custom_class_validation() {
        let c = column(
            "dog",
            ColumnType::Custom(ObjectClass::object("Dog").into_ref()),
            ColumnOptions::new(),
        );
        let mut errors = Errors::new();
        c.validate(&Object::new("Dog").into(), &mut errors);
        assert!(errors.is_empty());

        c.validate(&"Pavlov".into(), &mut errors);
        assert_eq!(errors.first("dog"), Some("cannot cast String to Dog"));
    }

    #[test]
    fn test_custom_class_caster_wins() {
        let hash = ObjectClass::native("Hash", NativeKind::Map)
            .with_caster(MapMerge)
            .into_ref();
        let c = column("tags", ColumnType::Custom(hash), ColumnOptions::new());
        let value = Value::Map(PropMap::from([
            ("a".to_string(), Value::from("x")),
            ("b".to_string(), Value::from("")),
        ]));
        let Value::Map(cast) = c.type_cast(&value) else {
            panic!("expected a map");
        };
        assert_eq!(cast.len(), 1);
        assert_eq!(c.type_cast(&"raw".into()), Value::from("raw"));
    }
}
