use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::codec::{self, Codec};
use crate::error::{Error, Result};

/// Serialization format used for the properties column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    #[default]
    Json,
    Yaml,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Index tables are named `<index_prefix>_<group>_<host table>`.
    pub index_prefix: String,
    /// Name of the text column holding the encoded properties.
    pub properties_column: String,
    pub codec: CodecKind,
    /// Run index writes after the record's own transaction commits.
    /// When false they run inside that transaction.
    pub defer_index_writes: bool,
}

impl Settings {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    #[must_use]
    pub fn codec(&self) -> Arc<dyn Codec> {
        codec::for_kind(self.codec)
    }

    fn validate(&self) -> Result<()> {
        let is_identifier = |s: &str| {
            !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        };
        if !is_identifier(&self.index_prefix) {
            return Err(Error::Config(format!(
                "index_prefix must be a plain identifier, got '{}'",
                self.index_prefix
            )));
        }
        if !is_identifier(&self.properties_column) {
            return Err(Error::Config(format!(
                "properties_column must be a plain identifier, got '{}'",
                self.properties_column
            )));
        }
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            index_prefix: "i".to_string(),
            properties_column: "properties".to_string(),
            codec: CodecKind::Json,
            defer_index_writes: true,
        }
    }
}
