//! # notevault core
//!
//! Encrypted storage and backup engine for notevault, a personal notes and
//! attachments vault.
//!
//! ## Architecture
//!
//! - **keys**: key material provider over a platform secret store
//! - **blobs**: per-attachment envelope encryption on disk
//! - **storage**: encrypted SQLite record store for notes and file metadata
//! - **repository**: the single entry point coordinating blobs and records
//! - **archive**: zip container codec used by backups
//! - **backup** / **restore**: password-protected export and import
//! - **jobs**: backup and restore wrapped as user-facing outcomes
//! - **gate**: secondary PIN gate for attachment views
//! - **vault**: opens a vault directory and wires the above together

pub mod archive;
pub mod backup;
pub mod blobs;
pub mod crypto;
pub mod error;
pub mod fs;
pub mod gate;
pub mod jobs;
pub mod keys;
pub mod mime;
pub mod repository;
pub mod restore;
pub mod storage;
pub mod vault;

pub use backup::{BackupEngine, BackupReport};
pub use error::{Result, VaultError};
pub use gate::{AccessGate, AccessGrant};
pub use jobs::JobOutcome;
pub use keys::{KeyMaterialProvider, KeyPurpose, SecretStore};
pub use repository::VaultRepository;
pub use restore::{RestoreEngine, RestoreReport};
pub use storage::RecordStore;
pub use vault::Vault;

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
