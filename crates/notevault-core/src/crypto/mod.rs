//! Cryptographic primitives for notevault.
//!
//! - **Key material**: random 256-bit keys, zeroized on drop
//! - **Backup cipher**: PBKDF2-HMAC-SHA256 + AES-256-CBC for portable archives
//! - **Password rules** for backup archives
//!
//! ## Threat Model
//!
//! We defend against:
//! - Theft of the vault directory without the device secret store
//! - Offline access to an exported archive without its password
//! - Tampering with or truncation of stored attachments
//!
//! We do NOT defend against:
//! - Compromised OS / keylogger
//! - An attacker with access to the unlocked secret store
//! - Brute force of weak backup passwords (the archive KDF is fixed for
//!   compatibility)

pub mod backup_cipher;
pub mod key;
pub mod password;

pub use backup_cipher::{
    decrypt_backup, derive_backup_key, encrypt_backup, IV_LEN, PBKDF2_ITERATIONS, SALT_LEN,
};
pub use key::{random_bytes, KeyMaterial, KEY_LENGTH};
pub use password::{validate_backup_password, MIN_PASSWORD_LENGTH};
