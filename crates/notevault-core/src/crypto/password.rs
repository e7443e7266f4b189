//! Backup password validation.

use crate::error::{Result, VaultError};

/// Minimum backup password length in characters.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Validate a backup/restore password.
///
/// Runs before any store is touched, so a short password never costs a
/// snapshot or a key derivation.
///
/// # Examples
///
/// ```
/// use notevault_core::crypto::validate_backup_password;
///
/// assert!(validate_backup_password("secret1").is_ok());
/// assert!(validate_backup_password("short").is_err());
/// ```
pub fn validate_backup_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(VaultError::WeakPassword {
            min: MIN_PASSWORD_LENGTH,
        });
    }
    Ok(())
}
