#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unknown verb: {0}")]
    UnknownVerb(String),

    #[error("Invalid rule name: {0:?}")]
    InvalidRuleName(String),

    #[error("Wildcard rule is not allowed for signature actions")]
    WildcardSignature,

    #[error("Path is not absolute: {0:?}")]
    PathNotAbsolute(String),

    #[error("No actions configured for {0:?}")]
    NoActions(String),

    #[error("Failed to serialize TOML: {0}")]
    SerializeTOML(#[from] toml_edit::ser::Error),

    #[error("Failed to deserialize TOML: {0}")]
    DeserializeTOML(#[from] toml_edit::de::Error),

    #[error("Failed to parse TOML document: {0}")]
    ParseTOML(#[from] toml_edit::TomlError),

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),
}
