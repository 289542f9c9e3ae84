use thiserror::Error;

/// Main error type for storage adapter operations
///
/// Backend diagnostic text is carried verbatim so operators can correlate
/// adapter failures with the MGM logs.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Malformed `uid:gid` identity string. Caller error, never retried.
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("Path not found: {0}")]
    NotFound(String),

    /// Open/read/write/stat/close failure with the backend's message.
    #[error("I/O error: {0}")]
    Io(String),

    /// Non-zero return code from a proc command.
    #[error("Admin command failed (rc={code}): {message}")]
    AdminCommand { code: String, message: String },

    /// Endpoint unreachable or unresolvable. Fatal for the call.
    #[error("Connection error: {0}")]
    Connection(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

/// Result type alias for storage adapter operations
pub type Result<T> = std::result::Result<T, StorageError>;
