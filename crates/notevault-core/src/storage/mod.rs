//! Structured record storage for notevault.
//!
//! This module defines the `RecordStore` trait and the types for notes and
//! attachment metadata.
//!
//! ## Security
//!
//! Record stores are responsible for:
//! - Encryption at rest (no plaintext modes)
//! - Atomic writes to prevent corruption
//! - Keeping memory and disk consistent when a write fails

pub mod age_sqlite;
pub mod encryption;
pub mod traits;
pub mod types;

// Re-export public types
pub use age_sqlite::AgeSqliteStore;
pub use traits::RecordStore;
pub use types::{
    now_millis, FileMetadata, FileStats, NewFileMetadata, NewNote, Note, NoteDraft,
    StoreMetadata,
};
