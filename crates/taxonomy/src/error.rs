use thiserror::Error;

/// Result type for taxonomy operations
pub type Result<T> = std::result::Result<T, TaxonomyError>;

/// Errors that can occur while loading or classifying a taxonomy
#[derive(Error, Debug)]
pub enum TaxonomyError {
    /// The taxonomy document does not have the expected shape
    #[error("Malformed taxonomy at '{path}': {reason}")]
    Malformed { path: String, reason: String },

    /// A requested sub-tree does not exist
    #[error("Taxonomy node not found: {0}")]
    NodeNotFound(String),

    /// Invalid classifier configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON error occurred
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// TOML configuration could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl TaxonomyError {
    /// Create a malformed-structure error
    pub fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
