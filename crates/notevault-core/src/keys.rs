//! Key material provider and the secret stores behind it.
//!
//! Long-lived keys are generated lazily, persisted exactly once in a
//! [`SecretStore`] and never exported. Losing the secret store makes the
//! vault unreadable; that is the point.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::crypto::{KeyMaterial, KEY_LENGTH};
use crate::error::{Result, VaultError};
use crate::fs::{set_owner_only, write_atomic};

/// Service name used for OS keychain entries.
pub const KEYCHAIN_SERVICE: &str = "notevault";

/// Which long-lived key is being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyPurpose {
    /// Key protecting the structured record store.
    RecordStore,
    /// Master key from which per-blob keys are derived.
    Blobs,
}

impl KeyPurpose {
    /// Secret store entry name for this key.
    pub fn secret_name(self) -> &'static str {
        match self {
            KeyPurpose::RecordStore => "record-store-key",
            KeyPurpose::Blobs => "blob-master-key",
        }
    }
}

/// Platform secret store seam.
///
/// Every failure to reach the backing store is reported as
/// [`VaultError::SecretStoreUnavailable`].
pub trait SecretStore: Send + Sync {
    /// Read a secret, `None` when it was never stored.
    fn get(&self, name: &str) -> Result<Option<Zeroizing<Vec<u8>>>>;

    /// Store a secret, replacing any previous value.
    fn set(&self, name: &str, value: &[u8]) -> Result<()>;

    /// Store a secret only if none exists yet. Returns `false` when a value
    /// was already present (and leaves it untouched).
    fn insert_new(&self, name: &str, value: &[u8]) -> Result<bool> {
        if self.get(name)?.is_some() {
            return Ok(false);
        }
        self.set(name, value)?;
        Ok(true)
    }

    /// Remove a secret. Removing a missing secret is not an error.
    fn delete(&self, name: &str) -> Result<()>;
}

fn unavailable(action: &str, err: impl std::fmt::Display) -> VaultError {
    VaultError::SecretStoreUnavailable(format!("{}: {}", action, err))
}

fn validate_secret_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(VaultError::InvalidInput(format!(
            "Invalid secret name: {:?}",
            name
        )))
    }
}

/// Secrets held in memory. Used by tests and embedders that manage keys
/// themselves.
#[derive(Default)]
pub struct MemorySecretStore {
    entries: Mutex<HashMap<String, Zeroizing<Vec<u8>>>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Zeroizing<Vec<u8>>>>> {
        self.entries
            .lock()
            .map_err(|_| unavailable("Memory store", "lock poisoned"))
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self, name: &str) -> Result<Option<Zeroizing<Vec<u8>>>> {
        Ok(self.lock()?.get(name).cloned())
    }

    fn set(&self, name: &str, value: &[u8]) -> Result<()> {
        self.lock()?
            .insert(name.to_string(), Zeroizing::new(value.to_vec()));
        Ok(())
    }

    fn insert_new(&self, name: &str, value: &[u8]) -> Result<bool> {
        let mut entries = self.lock()?;
        if entries.contains_key(name) {
            return Ok(false);
        }
        entries.insert(name.to_string(), Zeroizing::new(value.to_vec()));
        Ok(true)
    }

    fn delete(&self, name: &str) -> Result<()> {
        self.lock()?.remove(name);
        Ok(())
    }
}

/// Secrets stored as owner-only files in a device-local directory.
pub struct KeyfileSecretStore {
    dir: PathBuf,
}

impl KeyfileSecretStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        validate_secret_name(name)?;
        Ok(self.dir.join(name))
    }

    fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| unavailable(&format!("Create {}", self.dir.display()), e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.dir, fs::Permissions::from_mode(0o700))
                .map_err(|e| unavailable("Restrict keyfile directory", e))?;
        }
        Ok(())
    }
}

impl SecretStore for KeyfileSecretStore {
    fn get(&self, name: &str) -> Result<Option<Zeroizing<Vec<u8>>>> {
        let path = self.path_for(name)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(Zeroizing::new(bytes))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(unavailable(&format!("Read {}", path.display()), e)),
        }
    }

    fn set(&self, name: &str, value: &[u8]) -> Result<()> {
        let path = self.path_for(name)?;
        self.ensure_dir()?;
        write_atomic(&path, value).map_err(|e| unavailable("Write keyfile", e))?;
        set_owner_only(&path).map_err(|e| unavailable("Restrict keyfile", e))
    }

    fn insert_new(&self, name: &str, value: &[u8]) -> Result<bool> {
        let path = self.path_for(name)?;
        self.ensure_dir()?;
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(unavailable(&format!("Create {}", path.display()), e)),
        };
        set_owner_only(&path).map_err(|e| unavailable("Restrict keyfile", e))?;
        if let Err(e) = file.write_all(value).and_then(|_| file.sync_all()) {
            let _ = fs::remove_file(&path);
            return Err(unavailable("Write keyfile", e));
        }
        Ok(true)
    }

    fn delete(&self, name: &str) -> Result<()> {
        let path = self.path_for(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(unavailable(&format!("Delete {}", path.display()), e)),
        }
    }
}

/// Secrets stored in the OS keychain, base64-encoded.
///
/// Accounts are namespaced per vault as `<vault-hash>/<name>` so several
/// vaults can share one keychain.
pub struct KeychainSecretStore {
    namespace: String,
}

impl KeychainSecretStore {
    /// Keychain store scoped to the vault at `vault_dir`.
    pub fn for_vault(vault_dir: &Path) -> Self {
        Self {
            namespace: vault_namespace(vault_dir),
        }
    }

    fn account(&self, name: &str) -> Result<String> {
        validate_secret_name(name)?;
        Ok(format!("{}/{}", self.namespace, name))
    }

    fn entry(&self, name: &str) -> Result<keyring::Entry> {
        let account = self.account(name)?;
        keyring::Entry::new(KEYCHAIN_SERVICE, &account)
            .map_err(|e| unavailable("Keychain entry failed", e))
    }
}

impl SecretStore for KeychainSecretStore {
    fn get(&self, name: &str) -> Result<Option<Zeroizing<Vec<u8>>>> {
        let entry = self.entry(name)?;
        match entry.get_password() {
            Ok(value) => {
                let value = Zeroizing::new(value);
                let bytes = STANDARD
                    .decode(value.as_bytes())
                    .map_err(|e| unavailable("Keychain value is not base64", e))?;
                Ok(Some(Zeroizing::new(bytes)))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(unavailable("Keychain read failed", err)),
        }
    }

    fn set(&self, name: &str, value: &[u8]) -> Result<()> {
        let entry = self.entry(name)?;
        let encoded = Zeroizing::new(STANDARD.encode(value));
        entry
            .set_password(&encoded)
            .map_err(|e| unavailable("Keychain write failed", e))
    }

    fn delete(&self, name: &str) -> Result<()> {
        let entry = self.entry(name)?;
        match entry.delete_password() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(unavailable("Keychain delete failed", err)),
        }
    }
}

/// Stable short identifier for a vault directory.
pub fn vault_namespace(vault_dir: &Path) -> String {
    let canonical = vault_dir
        .canonicalize()
        .unwrap_or_else(|_| vault_dir.to_path_buf());
    let hash = blake3::hash(canonical.to_string_lossy().as_bytes());
    hash.to_hex()[..16].to_string()
}

/// Produces and persists the vault's long-lived keys.
#[derive(Clone)]
pub struct KeyMaterialProvider {
    store: Arc<dyn SecretStore>,
}

impl KeyMaterialProvider {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }

    /// The underlying secret store.
    pub fn secret_store(&self) -> Arc<dyn SecretStore> {
        Arc::clone(&self.store)
    }

    /// Return the key for `purpose`, generating and persisting it on first use.
    ///
    /// A stored value of the wrong length is reported as an unavailable
    /// secret store rather than silently replaced: replacing it would orphan
    /// everything encrypted under the old key.
    pub fn get_or_create_key(&self, purpose: KeyPurpose) -> Result<KeyMaterial> {
        let name = purpose.secret_name();
        if let Some(existing) = self.store.get(name)? {
            return Self::decode(purpose, &existing);
        }

        let fresh = KeyMaterial::generate()?;
        if self.store.insert_new(name, fresh.as_bytes())? {
            info!(?purpose, "Generated new key material");
            return Ok(fresh);
        }

        // Lost a race with another writer: use whatever won.
        debug!(?purpose, "Key created concurrently, re-reading");
        let existing = self.store.get(name)?.ok_or_else(|| {
            VaultError::SecretStoreUnavailable(format!("Key {} vanished after create", name))
        })?;
        Self::decode(purpose, &existing)
    }

    fn decode(purpose: KeyPurpose, bytes: &[u8]) -> Result<KeyMaterial> {
        if bytes.len() != KEY_LENGTH {
            return Err(VaultError::SecretStoreUnavailable(format!(
                "Stored {} has {} bytes, expected {}",
                purpose.secret_name(),
                bytes.len(),
                KEY_LENGTH
            )));
        }
        KeyMaterial::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_get_or_create_is_stable() {
        let provider = KeyMaterialProvider::new(Arc::new(MemorySecretStore::new()));
        let first = provider.get_or_create_key(KeyPurpose::RecordStore).unwrap();
        let second = provider.get_or_create_key(KeyPurpose::RecordStore).unwrap();
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn test_purposes_get_distinct_keys() {
        let provider = KeyMaterialProvider::new(Arc::new(MemorySecretStore::new()));
        let records = provider.get_or_create_key(KeyPurpose::RecordStore).unwrap();
        let blobs = provider.get_or_create_key(KeyPurpose::Blobs).unwrap();
        assert_ne!(records.as_bytes(), blobs.as_bytes());
    }

    #[test]
    fn test_wrong_length_is_unavailable() {
        let store = Arc::new(MemorySecretStore::new());
        store.set("blob-master-key", &[1u8; 12]).unwrap();
        let provider = KeyMaterialProvider::new(store);
        assert!(matches!(
            provider.get_or_create_key(KeyPurpose::Blobs),
            Err(VaultError::SecretStoreUnavailable(_))
        ));
    }

    #[test]
    fn test_keyfile_store_persists_across_instances() {
        let dir = tempdir().unwrap();
        let key_dir = dir.path().join("keys");

        let first = KeyMaterialProvider::new(Arc::new(KeyfileSecretStore::new(&key_dir)))
            .get_or_create_key(KeyPurpose::Blobs)
            .unwrap();
        let second = KeyMaterialProvider::new(Arc::new(KeyfileSecretStore::new(&key_dir)))
            .get_or_create_key(KeyPurpose::Blobs)
            .unwrap();
        assert_eq!(first.as_bytes(), second.as_bytes());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(key_dir.join("blob-master-key"))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_keyfile_insert_new_keeps_existing() {
        let dir = tempdir().unwrap();
        let store = KeyfileSecretStore::new(dir.path());
        assert!(store.insert_new("pin", b"one").unwrap());
        assert!(!store.insert_new("pin", b"two").unwrap());
        assert_eq!(store.get("pin").unwrap().unwrap().as_slice(), b"one");
    }

    #[test]
    fn test_keyfile_set_overwrites_and_delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = KeyfileSecretStore::new(dir.path());
        store.set("archive-pin-hash", b"a").unwrap();
        store.set("archive-pin-hash", b"b").unwrap();
        assert_eq!(
            store.get("archive-pin-hash").unwrap().unwrap().as_slice(),
            b"b"
        );
        store.delete("archive-pin-hash").unwrap();
        store.delete("archive-pin-hash").unwrap();
        assert!(store.get("archive-pin-hash").unwrap().is_none());
    }

    #[test]
    fn test_unreadable_keyfile_dir_is_unavailable() {
        let dir = tempdir().unwrap();
        // A regular file where the directory should be
        let blocker = dir.path().join("keys");
        fs::write(&blocker, b"not a dir").unwrap();
        let provider = KeyMaterialProvider::new(Arc::new(KeyfileSecretStore::new(&blocker)));
        assert!(matches!(
            provider.get_or_create_key(KeyPurpose::RecordStore),
            Err(VaultError::SecretStoreUnavailable(_))
        ));
    }

    #[test]
    fn test_secret_names_are_restricted() {
        let store = MemorySecretStore::new();
        let keyfiles = KeyfileSecretStore::new("/nonexistent");
        assert!(keyfiles.get("../escape").is_err());
        assert!(store.get("anything").unwrap().is_none());
    }

    #[test]
    fn test_vault_namespace_is_stable_and_short() {
        let dir = tempdir().unwrap();
        let a = vault_namespace(dir.path());
        let b = vault_namespace(dir.path());
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert_ne!(a, vault_namespace(&dir.path().join("other")));
    }
}
