//! Encoding of a property map into the stored properties column.

mod json;
mod yaml;

use std::sync::Arc;

pub use json::JsonCodec;
pub use yaml::YamlCodec;

use crate::config::CodecKind;
use crate::error::{Error, Result};
use crate::types::{PropMap, PropertyClass, Value};

pub trait Codec: Send + Sync {
    fn name(&self) -> &'static str;

    fn encode(&self, properties: &PropMap) -> Result<String>;

    /// Fails with [`Error::Decoding`] on malformed input or non-map content.
    fn decode(&self, data: &str) -> Result<PropMap>;

    /// Checked when a custom class column is declared.
    fn validate_class(&self, class: &dyn PropertyClass) -> Result<()> {
        if class.native().is_some() || class.encodable() {
            Ok(())
        } else {
            Err(Error::InvalidClass(format!(
                "{} cannot be serialized with {}: missing encode/decode pair",
                class.name(),
                self.name()
            )))
        }
    }
}

pub fn for_kind(kind: CodecKind) -> Arc<dyn Codec> {
    match kind {
        CodecKind::Json => Arc::new(JsonCodec),
        CodecKind::Yaml => Arc::new(YamlCodec),
    }
}

/// Class checks run by `serialize` declarations, one per codec in use.
#[derive(Clone)]
pub struct Validators {
    codecs: Vec<Arc<dyn Codec>>,
}

impl Validators {
    pub fn new() -> Self {
        Self { codecs: Vec::new() }
    }

    #[must_use]
    pub fn with(mut self, codec: Arc<dyn Codec>) -> Self {
        if !self.codecs.iter().any(|c| c.name() == codec.name()) {
            self.codecs.push(codec);
        }
        self
    }

    pub fn check(&self, class: &dyn PropertyClass) -> Result<()> {
        for codec in &self.codecs {
            codec.validate_class(class)?;
        }
        Ok(())
    }
}

impl Default for Validators {
    fn default() -> Self {
        Self::new().with(Arc::new(JsonCodec))
    }
}

fn map_from_json(value: serde_json::Value, codec: &str) -> Result<PropMap> {
    match Value::from_json(value) {
        Value::Map(map) => Ok(map),
        // rows written by older versions wrap the map in a class tag
        Value::Object(obj) if obj.class == "Properties" => Ok(obj.fields),
        Value::Null => Ok(PropMap::new()),
        other => Err(Error::Decoding(format!(
            "{codec}: expected a map, found {}",
            other.type_name()
        ))),
    }
}
