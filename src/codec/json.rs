use super::{Codec, map_from_json};
use crate::error::{Error, Result};
use crate::types::{PropMap, Value};

/// Canonical codec. Non-native values are stored as `json_class` tagged objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode(&self, properties: &PropMap) -> Result<String> {
        let json = Value::Map(properties.clone()).to_json();
        Ok(serde_json::to_string(&json)?)
    }

    fn decode(&self, data: &str) -> Result<PropMap> {
        let json: serde_json::Value =
            serde_json::from_str(data).map_err(|e| Error::Decoding(format!("json: {e}")))?;
        map_from_json(json, self.name())
    }
}
