use std::fmt;
use std::sync::Arc;

use super::value::{PropMap, Value};

/// Built-in shape a custom property class is backed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeKind {
    Map,
    List,
    String,
}

/// Converts incoming values for a custom-class column.
pub trait Caster: Send + Sync {
    /// Returns `Some` to take over the cast, `None` to keep the value as is.
    fn cast(&self, value: &Value) -> Option<Value>;

    /// Merges a map-shaped assignment into the current stored map instead of
    /// replacing it. Casters that do not support incremental merges return `None`.
    fn merge_map(&self, _current: PropMap, _incoming: &PropMap) -> Option<PropMap> {
        None
    }
}

/// Type of a `serialize`d property.
pub trait PropertyClass: Send + Sync {
    fn name(&self) -> &str;

    /// Built-in shape, if the class is a plain map/list/string.
    fn native(&self) -> Option<NativeKind>;

    fn is_instance(&self, value: &Value) -> bool;

    fn caster(&self) -> Option<&dyn Caster> {
        None
    }

    /// Whether the class provides a symmetric encode/decode pair.
    fn encodable(&self) -> bool;
}

pub type ClassRef = Arc<dyn PropertyClass>;

impl fmt::Debug for dyn PropertyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PropertyClass({})", self.name())
    }
}

/// General purpose [`PropertyClass`].
pub struct ObjectClass {
    name: String,
    native: Option<NativeKind>,
    encodable: bool,
    caster: Option<Box<dyn Caster>>,
}

impl ObjectClass {
    /// A class whose instances are [`Value::Object`]s tagged with `name`.
    pub fn object(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            native: None,
            encodable: true,
            caster: None,
        }
    }

    /// A class backed by a built-in shape.
    pub fn native(name: impl Into<String>, kind: NativeKind) -> Self {
        Self {
            name: name.into(),
            native: Some(kind),
            encodable: true,
            caster: None,
        }
    }

    /// A class with no encode/decode pair. Codecs refuse it.
    pub fn opaque(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            native: None,
            encodable: false,
            caster: None,
        }
    }

    #[must_use]
    pub fn with_caster(mut self, caster: impl Caster + 'static) -> Self {
        self.caster = Some(Box::new(caster));
        self
    }

    pub fn into_ref(self) -> ClassRef {
        Arc::new(self)
    }
}

impl PropertyClass for ObjectClass {
    fn name(&self) -> &str {
        &self.name
    }

    fn native(&self) -> Option<NativeKind> {
        self.native
    }

    fn is_instance(&self, value: &Value) -> bool {
        match (self.native, value) {
            (Some(NativeKind::Map), Value::Map(_)) => true,
            (Some(NativeKind::List), Value::List(_)) => true,
            (Some(NativeKind::String), Value::String(_)) => true,
            (None, Value::Object(obj)) => obj.class == self.name,
            _ => false,
        }
    }

    fn caster(&self) -> Option<&dyn Caster> {
        self.caster.as_deref()
    }

    fn encodable(&self) -> bool {
        self.encodable
    }
}

/// Merges map assignments key by key. A blank incoming value removes the key.
pub struct MapMerge;

impl Caster for MapMerge {
    fn cast(&self, value: &Value) -> Option<Value> {
        match value {
            Value::Map(map) => {
                let map: PropMap = map
                    .iter()
                    .filter(|(_, v)| !v.is_blank())
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                Some(Value::Map(map))
            }
            _ => None,
        }
    }

    fn merge_map(&self, mut current: PropMap, incoming: &PropMap) -> Option<PropMap> {
        for (key, value) in incoming {
            if value.is_blank() {
                current.remove(key);
            } else {
                current.insert(key.clone(), value.clone());
            }
        }
        Some(current)
    }
}
