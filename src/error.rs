use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// A property name is declared twice in the same role or schema.
    #[error("redefined property: {0}")]
    RedefinedProperty(String),

    /// A role property would hide a native method of the host type.
    #[error("redefined method: {0}")]
    RedefinedMethod(String),

    #[error("decoding error: {0}")]
    Decoding(String),

    /// A custom class cannot round-trip through the configured codecs.
    #[error("invalid property class: {0}")]
    InvalidClass(String),

    #[error("type error: {0}")]
    Type(String),

    #[error("no such property: {0}")]
    NoSuchProperty(String),

    #[error("not found")]
    NotFound,

    #[error("record is not persisted")]
    NotPersisted,
}

pub type Result<T> = std::result::Result<T, Error>;
