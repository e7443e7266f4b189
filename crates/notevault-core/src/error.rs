//! Error types for notevault core operations.
//!
//! Errors are descriptive at the core level; the CLI layer maps them to
//! user-facing messages and exit codes.

use thiserror::Error;

/// Result type alias for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;

/// Core error type for vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The platform secret store could not be opened, read or written.
    ///
    /// Fatal for the whole vault: without key material nothing can be decrypted.
    #[error("Secret store unavailable: {0}")]
    SecretStoreUnavailable(String),

    /// Attachment, blob, note or other resource is missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Ciphertext failed authentication (tampered, truncated or corrupted)
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Backup/restore password below the minimum length
    #[error("Password must be at least {min} characters")]
    WeakPassword { min: usize },

    /// Backup archive is malformed, undecryptable, or missing its notes entry
    #[error("Corrupt archive: {0}")]
    CorruptArchive(String),

    /// Record store key does not match the encrypted store on disk
    #[error("Incorrect key for record store")]
    IncorrectPassphrase,

    /// Encryption or decryption error
    #[error("Encryption error: {0}")]
    Crypto(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Invalid caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Storage backend error (generic)
    #[error("Storage error: {0}")]
    Storage(String),

    /// SQLite-specific storage error
    #[error("SQLite error: {source}")]
    Sqlite {
        #[from]
        source: rusqlite::Error,
    },

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

impl VaultError {
    /// Whether the caller can treat this error as "already gone".
    pub fn is_not_found(&self) -> bool {
        matches!(self, VaultError::NotFound(_))
    }
}
