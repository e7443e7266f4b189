//! 256-bit key material.
//!
//! Key bytes live in a zeroize-on-drop wrapper and never show up in `Debug`
//! output.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use secrecy::SecretString;
use zeroize::{ZeroizeOnDrop, Zeroizing};

use crate::error::{Result, VaultError};

/// Length of every symmetric key in bytes (256 bits).
pub const KEY_LENGTH: usize = 32;

/// A 256-bit symmetric key.
#[derive(Clone, ZeroizeOnDrop)]
pub struct KeyMaterial {
    key: [u8; KEY_LENGTH],
}

impl KeyMaterial {
    pub(crate) fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self { key: bytes }
    }

    /// Build key material from a stored secret, rejecting the wrong length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let key: [u8; KEY_LENGTH] = bytes.try_into().map_err(|_| {
            VaultError::Crypto(format!(
                "Key must be {} bytes (got {})",
                KEY_LENGTH,
                bytes.len()
            ))
        })?;
        Ok(Self::from_bytes(key))
    }

    /// Generate fresh key material from the OS random source.
    pub fn generate() -> Result<Self> {
        Ok(Self::from_bytes(random_bytes::<KEY_LENGTH>()?))
    }

    /// Get a reference to the raw key bytes.
    ///
    /// Avoid storing or logging this value.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }

    /// Encode the key as a passphrase string for age's scrypt recipient.
    pub fn to_passphrase(&self) -> SecretString {
        let encoded = Zeroizing::new(STANDARD.encode(self.key));
        SecretString::from(encoded.to_string())
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Fill an array with OS randomness.
pub fn random_bytes<const N: usize>() -> Result<[u8; N]> {
    let mut bytes = [0u8; N];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| VaultError::Crypto(format!("Failed to generate random bytes: {}", e)))?;
    Ok(bytes)
}
