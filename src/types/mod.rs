mod class;
mod value;

pub use class::{Caster, ClassRef, MapMerge, NativeKind, ObjectClass, PropertyClass};
pub use value::{FromValue, JSON_CLASS, Object, PropMap, TIME_FORMAT, Value};
