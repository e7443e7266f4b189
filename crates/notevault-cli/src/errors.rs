//! CLI error types for structured error handling.
//!
//! This module provides typed errors that map to specific exit codes,
//! enabling consistent error handling across the CLI.

use std::fmt;

use notevault_core::VaultError;

use crate::constants::exit_codes;

/// CLI-specific errors with associated exit codes.
#[derive(Debug)]
pub enum CliError {
    /// Resource not found (config, vault, note, attachment, backup file)
    NotFound { message: String, hint: String },

    /// Authentication failed (wrong PIN, vault keys that do not match)
    AuthFailed {
        message: String,
        hint: Option<String>,
    },

    /// Invalid user input
    InvalidInput(String),

    /// Stored data failed an integrity check
    IntegrityFailed(String),

    /// Backup archive is damaged or the password is wrong
    CorruptArchive(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::NotFound { message, hint } => {
                write!(f, "{}\n{}", message, hint)
            }
            CliError::AuthFailed { message, hint } => {
                if let Some(h) = hint {
                    write!(f, "{}\n{}", message, h)
                } else {
                    write!(f, "{}", message)
                }
            }
            CliError::InvalidInput(message) => write!(f, "{}", message),
            CliError::IntegrityFailed(message) => write!(f, "{}", message),
            CliError::CorruptArchive(message) => write!(
                f,
                "{}\nHint: Check the password. A damaged archive cannot be restored.",
                message
            ),
        }
    }
}

impl std::error::Error for CliError {}

impl CliError {
    /// Create a NotFound error with message and hint.
    pub fn not_found(message: impl Into<String>, hint: impl Into<String>) -> Self {
        CliError::NotFound {
            message: message.into(),
            hint: hint.into(),
        }
    }

    /// Create an AuthFailed error with message and optional hint.
    pub fn auth_failed(message: impl Into<String>) -> Self {
        CliError::AuthFailed {
            message: message.into(),
            hint: None,
        }
    }

    /// Create an AuthFailed error with message and hint.
    pub fn auth_failed_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        CliError::AuthFailed {
            message: message.into(),
            hint: Some(hint.into()),
        }
    }

    /// Create an InvalidInput error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        CliError::InvalidInput(message.into())
    }

    /// Map a core error onto an exit-code category, if it has one.
    pub fn from_vault(err: &VaultError) -> Option<Self> {
        let mapped = match err {
            VaultError::NotFound(what) => {
                CliError::not_found(format!("Not found: {}", what), "Hint: Check the id or path.")
            }
            VaultError::WeakPassword { .. }
            | VaultError::Validation(_)
            | VaultError::InvalidInput(_) => CliError::invalid_input(err.to_string()),
            VaultError::IncorrectPassphrase => CliError::auth_failed_with_hint(
                "The vault keys in the secret store do not open this vault.",
                "Hint: The vault was created with a different secret store or its keys were removed.",
            ),
            VaultError::SecretStoreUnavailable(_) => CliError::auth_failed_with_hint(
                err.to_string(),
                "Hint: Unlock your keychain, or set [secrets] backend = \"keyfile\" in the config.",
            ),
            VaultError::Integrity(_) => CliError::IntegrityFailed(err.to_string()),
            VaultError::CorruptArchive(_) => CliError::CorruptArchive(err.to_string()),
            _ => return None,
        };
        Some(mapped)
    }

    /// Get the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::NotFound { .. } => exit_codes::NOT_FOUND,
            CliError::AuthFailed { .. } => exit_codes::AUTH_FAILED,
            CliError::InvalidInput(_) => exit_codes::INVALID_INPUT,
            CliError::IntegrityFailed(_) => exit_codes::INTEGRITY_FAILED,
            CliError::CorruptArchive(_) => exit_codes::CORRUPT_ARCHIVE,
        }
    }

    /// Print error message to stderr and exit with appropriate code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);
        std::process::exit(self.exit_code())
    }
}

/// Print `err` and exit with the code its category maps to.
pub fn exit_with(err: anyhow::Error) -> ! {
    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        cli_err.exit();
    }
    if let Some(mapped) = err.downcast_ref::<VaultError>().and_then(CliError::from_vault) {
        mapped.exit();
    }
    eprintln!("Error: {:#}", err);
    std::process::exit(exit_codes::FAILURE)
}
