//! Constants used throughout the CLI.

/// Exit codes for the CLI.
///
/// These follow common Unix conventions:
/// - 0: Success
/// - 1: General error (used by anyhow for unhandled errors)
/// - 2: Misuse of shell command (reserved by shells, and clap usage errors)
/// - 3+: Application-specific errors
pub mod exit_codes {
    /// General failure.
    pub const FAILURE: i32 = 1;

    /// Resource not found (config, vault, note, attachment, backup file).
    pub const NOT_FOUND: i32 = 3;

    /// Invalid user input or arguments, including weak backup passwords.
    pub const INVALID_INPUT: i32 = 4;

    /// Authentication failed (wrong PIN, keys that do not open the vault).
    pub const AUTH_FAILED: i32 = 5;

    /// Integrity check failed.
    pub const INTEGRITY_FAILED: i32 = 6;

    /// Backup archive could not be decrypted or parsed.
    pub const CORRUPT_ARCHIVE: i32 = 7;
}

/// Environment variable holding the backup/restore password.
pub const BACKUP_PASSWORD_ENV: &str = "NOTEVAULT_BACKUP_PASSWORD";

/// Environment variable holding the attachment PIN.
pub const PIN_ENV: &str = "NOTEVAULT_PIN";

/// Environment variable holding a new PIN for `pin set`.
pub const NEW_PIN_ENV: &str = "NOTEVAULT_NEW_PIN";

/// File in the vault directory caching the last PIN grant.
pub const GRANT_FILE: &str = ".pin-grant";

/// Environment variable with the tracing filter.
pub const LOG_ENV: &str = "NOTEVAULT_LOG";
