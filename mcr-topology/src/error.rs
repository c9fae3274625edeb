//! Error types for topology compilation

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TopologyError {
    #[error("No endpoint for upstream {name}: set `endpoint` or at least one prefix")]
    MissingEndpoint { name: String },
    #[error("No prefixes for upstream {name}")]
    MissingPrefixes { name: String },
    #[error("Unknown upstream: {name}")]
    UnknownUpstream { name: String },
    #[error("Registry already registered: {name}")]
    DuplicateRegistry { name: String },
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),
    #[error("Failed to render documentation: {0}")]
    DocumentationRender(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_yaml_ng::Error> for TopologyError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        TopologyError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for TopologyError {
    fn from(err: serde_json::Error) -> Self {
        TopologyError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TopologyError>;
