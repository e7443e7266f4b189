//! Secondary PIN gate in front of the attachment views.
//!
//! The PIN is kept as an Argon2id PHC string in the secret store. This only
//! decides whether a front end shows attachments; it adds no protection to
//! the stored data, which stays encrypted under the vault keys either way.
//!
//! A passed gate yields an [`AccessGrant`]. Front ends that run one process
//! per command can seal the grant into a token and present it again until
//! it expires. Tokens are tagged with a keyed BLAKE3 hash under a key that
//! is replaced whenever the PIN changes.

use std::sync::Arc;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::crypto::random_bytes;
use crate::error::{Result, VaultError};
use crate::keys::SecretStore;

/// Secret store entry holding the PIN hash.
pub const PIN_SECRET_NAME: &str = "archive-pin-hash";

/// Secret store entry holding the key that tags sealed grants.
pub const GRANT_KEY_NAME: &str = "archive-pin-grant-key";

const GRANT_TOKEN_VERSION: &str = "v1";

/// Argon2id cost for PIN hashes: 19 MiB, 2 passes, 1 lane.
const PIN_MEMORY_KB: u32 = 19 * 1024;
const PIN_ITERATIONS: u32 = 2;
const PIN_PARALLELISM: u32 = 1;

/// Proof that the gate was passed, valid until `expires_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccessGrant {
    pub granted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AccessGrant {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.granted_at && now < self.expires_at
    }

    fn tag_input(&self) -> String {
        format!(
            "notevault-grant:{}:{}:{}",
            GRANT_TOKEN_VERSION,
            self.granted_at.timestamp_millis(),
            self.expires_at.timestamp_millis()
        )
    }
}

pub struct AccessGate {
    store: Arc<dyn SecretStore>,
}

fn hasher() -> Result<Argon2<'static>> {
    let params = Params::new(PIN_MEMORY_KB, PIN_ITERATIONS, PIN_PARALLELISM, None)
        .map_err(|e| VaultError::Crypto(format!("Failed to create Argon2 params: {}", e)))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

impl AccessGate {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }

    /// Set or replace the PIN.
    pub fn set_pin(&self, pin: &str) -> Result<()> {
        if pin.trim().is_empty() {
            return Err(VaultError::InvalidInput("PIN cannot be blank".to_string()));
        }
        let salt = SaltString::encode_b64(&random_bytes::<16>()?)
            .map_err(|e| VaultError::Crypto(format!("Salt encoding failed: {}", e)))?;
        let phc = hasher()?
            .hash_password(pin.as_bytes(), &salt)
            .map_err(|e| VaultError::Crypto(format!("PIN hashing failed: {}", e)))?
            .to_string();
        self.store.set(PIN_SECRET_NAME, phc.as_bytes())?;
        // Grants sealed under the old PIN stop opening
        self.store.delete(GRANT_KEY_NAME)?;
        debug!("PIN set");
        Ok(())
    }

    /// Disable the gate.
    pub fn remove_pin(&self) -> Result<()> {
        self.store.delete(GRANT_KEY_NAME)?;
        self.store.delete(PIN_SECRET_NAME)
    }

    pub fn is_enabled(&self) -> Result<bool> {
        Ok(self.store.get(PIN_SECRET_NAME)?.is_some())
    }

    /// Check a PIN. A disabled gate accepts any input; an empty PIN never
    /// unlocks an enabled gate.
    pub fn verify(&self, pin: &str) -> Result<bool> {
        let Some(stored) = self.store.get(PIN_SECRET_NAME)? else {
            return Ok(true);
        };
        if pin.is_empty() {
            return Ok(false);
        }
        let phc = std::str::from_utf8(&stored)
            .map_err(|_| VaultError::Integrity("Stored PIN hash is not UTF-8".to_string()))?;
        let parsed = PasswordHash::new(phc)
            .map_err(|e| VaultError::Integrity(format!("Stored PIN hash is invalid: {}", e)))?;
        // Cost parameters come from the PHC string itself
        let ok = Argon2::default()
            .verify_password(pin.as_bytes(), &parsed)
            .is_ok();
        if !ok {
            warn!("PIN rejected");
        }
        Ok(ok)
    }

    /// Verify `pin` and hand out a grant lasting `ttl` from `now`.
    pub fn unlock(
        &self,
        pin: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<Option<AccessGrant>> {
        if !self.verify(pin)? {
            return Ok(None);
        }
        Ok(Some(AccessGrant {
            granted_at: now,
            expires_at: now + ttl,
        }))
    }

    /// Encode a grant as a token that [`AccessGate::open_grant`] accepts
    /// until the grant expires or the PIN changes.
    pub fn seal_grant(&self, grant: &AccessGrant) -> Result<String> {
        let key = self.grant_key()?;
        let tag = blake3::keyed_hash(&key, grant.tag_input().as_bytes());
        Ok(format!(
            "{}.{}.{}.{}",
            GRANT_TOKEN_VERSION,
            grant.granted_at.timestamp_millis(),
            grant.expires_at.timestamp_millis(),
            tag.to_hex()
        ))
    }

    /// Return the grant in `token` if it is genuine and valid at `now`.
    /// Malformed, forged, and expired tokens all yield `None`.
    pub fn open_grant(&self, token: &str, now: DateTime<Utc>) -> Result<Option<AccessGrant>> {
        let Some(grant_key) = self.store.get(GRANT_KEY_NAME)? else {
            return Ok(None);
        };
        let Ok(key) = <[u8; 32]>::try_from(grant_key.as_slice()) else {
            return Err(VaultError::Integrity(
                "Stored grant key has the wrong length".to_string(),
            ));
        };
        let key = Zeroizing::new(key);

        let mut parts = token.trim().split('.');
        let (Some(version), Some(granted), Some(expires), Some(tag), None) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return Ok(None);
        };
        if version != GRANT_TOKEN_VERSION {
            return Ok(None);
        }
        let (Some(granted_at), Some(expires_at)) = (parse_millis(granted), parse_millis(expires))
        else {
            return Ok(None);
        };
        let Ok(tag) = blake3::Hash::from_hex(tag) else {
            return Ok(None);
        };

        let grant = AccessGrant {
            granted_at,
            expires_at,
        };
        // Hash equality is constant time
        if blake3::keyed_hash(&key, grant.tag_input().as_bytes()) != tag {
            warn!("Rejected a grant token with a bad tag");
            return Ok(None);
        }
        Ok(grant.is_valid_at(now).then_some(grant))
    }

    fn grant_key(&self) -> Result<Zeroizing<[u8; 32]>> {
        if self.store.get(GRANT_KEY_NAME)?.is_none() {
            let fresh = Zeroizing::new(random_bytes::<32>()?);
            self.store.insert_new(GRANT_KEY_NAME, fresh.as_slice())?;
        }
        let stored = self
            .store
            .get(GRANT_KEY_NAME)?
            .ok_or_else(|| VaultError::Integrity("Grant key vanished after creation".to_string()))?;
        <[u8; 32]>::try_from(stored.as_slice())
            .map(Zeroizing::new)
            .map_err(|_| VaultError::Integrity("Stored grant key has the wrong length".to_string()))
    }
}

fn parse_millis(value: &str) -> Option<DateTime<Utc>> {
    value
        .parse::<i64>()
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
}
