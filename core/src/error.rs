//! Error types for Ephemera

use thiserror::Error;

/// Main error type for Ephemera
#[derive(Error, Debug)]
pub enum EphemeraError {
    // ============ Credential Errors ============
    #[error("Missing API key")]
    MissingCredential,

    #[error("Invalid API key")]
    InvalidCredential,

    #[error("{0}")]
    InsufficientPermission(String),

    // ============ Slot Errors ============
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    MalformedInput(String),

    #[error("{0}")]
    InternalFailure(String),

    // ============ Configuration Errors ============
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl EphemeraError {
    pub const MASTER_KEY_REQUIRED: &'static str = "Insufficient permissions. Master key required.";
    pub const READ_ONLY_WRITE: &'static str = "Read-only API key cannot modify data";

    pub fn master_key_required() -> Self {
        EphemeraError::InsufficientPermission(Self::MASTER_KEY_REQUIRED.into())
    }

    pub fn read_only_write() -> Self {
        EphemeraError::InsufficientPermission(Self::READ_ONLY_WRITE.into())
    }

    /// HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            EphemeraError::MalformedInput(_) => 400,
            EphemeraError::MissingCredential | EphemeraError::InvalidCredential => 401,
            EphemeraError::InsufficientPermission(_) => 403,
            EphemeraError::NotFound(_) => 404,
            EphemeraError::InternalFailure(_) | EphemeraError::ConfigError(_) => 500,
        }
    }
}

impl From<serde_json::Error> for EphemeraError {
    fn from(err: serde_json::Error) -> Self {
        EphemeraError::ConfigError(err.to_string())
    }
}
