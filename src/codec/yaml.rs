use super::{Codec, map_from_json};
use crate::error::{Error, Result};
use crate::types::{PropMap, Value};

/// Alternate codec. Uses the same tagging as [`super::JsonCodec`].
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlCodec;

impl Codec for YamlCodec {
    fn name(&self) -> &'static str {
        "yaml"
    }

    fn encode(&self, properties: &PropMap) -> Result<String> {
        let json = Value::Map(properties.clone()).to_json();
        Ok(serde_yaml::to_string(&json)?)
    }

    fn decode(&self, data: &str) -> Result<PropMap> {
        let json: serde_json::Value =
            serde_yaml::from_str(data).map_err(|e| Error::Decoding(format!("yaml: {e}")))?;
        map_from_json(json, self.name())
    }
}
