use thiserror::Error;

/// Top-level error type for the Pilot system.
///
/// Subsystem crates define their own error types and wrap this one with
/// `#[from]` so that `?` works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PilotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Telephony error: {0}")]
    Telephony(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("No tenant bound to this store")]
    TenantUnbound,
}

impl From<toml::de::Error> for PilotError {
    fn from(err: toml::de::Error) -> Self {
        PilotError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for PilotError {
    fn from(err: toml::ser::Error) -> Self {
        PilotError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for PilotError {
    fn from(err: serde_json::Error) -> Self {
        PilotError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Pilot operations.
pub type Result<T> = std::result::Result<T, PilotError>;
