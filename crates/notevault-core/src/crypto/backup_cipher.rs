//! Password-based encryption of backup archives.
//!
//! Wire format:
//!
//! ```text
//! salt[16] || iv[16] || AES-256-CBC-PKCS7(key, iv, container)
//! key = PBKDF2-HMAC-SHA256(password, salt, 10_000 iterations, 32 bytes)
//! ```
//!
//! CBC has no authentication tag. Tampering is caught by the padding check
//! or, after decryption, by the container's own checksums.

use std::io::Read;

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::crypto::key::{random_bytes, KEY_LENGTH};
use crate::error::{Result, VaultError};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Salt length in bytes.
pub const SALT_LEN: usize = 16;

/// IV length in bytes (one AES block).
pub const IV_LEN: usize = 16;

/// PBKDF2 iteration count. Fixed by the archive format.
pub const PBKDF2_ITERATIONS: u32 = 10_000;

/// Derive the archive key from a password and salt.
pub fn derive_backup_key(password: &str, salt: &[u8]) -> Zeroizing<[u8; KEY_LENGTH]> {
    let mut key = Zeroizing::new([0u8; KEY_LENGTH]);
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, key.as_mut());
    key
}

/// Encrypt a serialized container under `password`.
///
/// Returns the complete archive bytes (`salt || iv || ciphertext`). The caller
/// is expected to have validated the password already.
pub fn encrypt_backup(password: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
    let salt = random_bytes::<SALT_LEN>()?;
    let iv = random_bytes::<IV_LEN>()?;
    let key = derive_backup_key(password, &salt);

    let cipher = Aes256CbcEnc::new_from_slices(key.as_ref(), &iv)
        .map_err(|e| VaultError::Crypto(format!("Cipher init failed: {}", e)))?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut out = Vec::with_capacity(SALT_LEN + IV_LEN + ciphertext.len());
    out.extend_from_slice(&salt);
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Read and decrypt an archive from `source`.
///
/// A short header, a body that is not a whole number of blocks, or a padding
/// failure (wrong password or corrupted bytes) are all `CorruptArchive`.
pub fn decrypt_backup<R: Read>(mut source: R, password: &str) -> Result<Zeroizing<Vec<u8>>> {
    let mut salt = [0u8; SALT_LEN];
    let mut iv = [0u8; IV_LEN];
    source
        .read_exact(&mut salt)
        .map_err(|_| VaultError::CorruptArchive("Archive too short: missing salt".to_string()))?;
    source
        .read_exact(&mut iv)
        .map_err(|_| VaultError::CorruptArchive("Archive too short: missing IV".to_string()))?;

    let mut body = Vec::new();
    source.read_to_end(&mut body)?;
    if body.is_empty() {
        return Err(VaultError::CorruptArchive(
            "Archive has no encrypted body".to_string(),
        ));
    }

    let key = derive_backup_key(password, &salt);
    let cipher = Aes256CbcDec::new_from_slices(key.as_ref(), &iv)
        .map_err(|e| VaultError::Crypto(format!("Cipher init failed: {}", e)))?;
    let plaintext = cipher.decrypt_padded_vec_mut::<Pkcs7>(&body).map_err(|_| {
        VaultError::CorruptArchive(
            "Decryption failed: wrong password or damaged archive".to_string(),
        )
    })?;
    Ok(Zeroizing::new(plaintext))
}
