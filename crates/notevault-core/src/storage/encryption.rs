//! Age encryption/decryption of the serialized record store.
//!
//! The passphrase is the base64 encoding of a random 256-bit key, not
//! something a person typed, so scrypt runs with a low work factor: the
//! entropy is in the key, and the store is re-encrypted on every commit.

use std::io::{Read, Write};
use std::iter;

use age::secrecy::SecretString;
use zeroize::Zeroizing;

use crate::error::{Result, VaultError};

/// scrypt log2(N) used when sealing the store.
pub const SCRYPT_WORK_FACTOR: u8 = 10;

/// Encrypt data under a key-derived passphrase.
///
/// # Examples
///
/// ```
/// use notevault_core::storage::encryption::encrypt;
/// use notevault_core::crypto::KeyMaterial;
///
/// let key = KeyMaterial::generate().unwrap();
/// let encrypted = encrypt(b"secret data", key.to_passphrase()).unwrap();
/// assert_ne!(encrypted.as_slice(), b"secret data");
/// ```
pub fn encrypt(data: &[u8], passphrase: SecretString) -> Result<Vec<u8>> {
    let mut recipient = age::scrypt::Recipient::new(passphrase);
    recipient.set_work_factor(SCRYPT_WORK_FACTOR);
    let encryptor = age::Encryptor::with_recipients(iter::once(&recipient as &dyn age::Recipient))
        .map_err(|e| VaultError::Crypto(format!("Failed to create encryptor: {}", e)))?;

    let mut encrypted = Vec::new();
    let mut writer = encryptor
        .wrap_output(&mut encrypted)
        .map_err(|e| VaultError::Crypto(format!("Failed to create encryptor: {}", e)))?;

    writer
        .write_all(data)
        .map_err(|e| VaultError::Crypto(format!("Encryption write failed: {}", e)))?;

    writer
        .finish()
        .map_err(|e| VaultError::Crypto(format!("Encryption finish failed: {}", e)))?;

    Ok(encrypted)
}

/// Decrypt data produced by [`encrypt`].
///
/// # Errors
///
/// Returns `VaultError::IncorrectPassphrase` if the key does not match, and
/// `VaultError::Crypto` if the data is corrupted.
pub fn decrypt(encrypted_data: &[u8], passphrase: SecretString) -> Result<Zeroizing<Vec<u8>>> {
    let decryptor = age::Decryptor::new(encrypted_data)
        .map_err(|e| VaultError::Crypto(format!("Failed to create decryptor: {}", e)))?;

    let identity = age::scrypt::Identity::new(passphrase);
    let mut reader = decryptor
        .decrypt(iter::once(&identity as &dyn age::Identity))
        .map_err(|e| match e {
            age::DecryptError::NoMatchingKeys
            | age::DecryptError::DecryptionFailed
            | age::DecryptError::KeyDecryptionFailed => VaultError::IncorrectPassphrase,
            _ => VaultError::Crypto(format!("Decryption failed: {}", e)),
        })?;

    let mut decrypted = Zeroizing::new(Vec::new());
    reader
        .read_to_end(&mut decrypted)
        .map_err(|e| VaultError::Crypto(format!("Failed to read decrypted data: {}", e)))?;

    Ok(decrypted)
}
