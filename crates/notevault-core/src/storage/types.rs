//! Core data types for the record store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current epoch time in milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Metadata for a record store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreMetadata {
    /// Format version (e.g., "1")
    pub format_version: String,

    /// Random identifier assigned when the store was created
    pub vault_id: Uuid,

    /// When this store was created
    pub created_at: DateTime<Utc>,

    /// Last committed mutation
    pub last_modified: DateTime<Utc>,
}

/// A stored note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Store-assigned surrogate id
    pub id: i64,

    /// Non-empty title
    pub title: String,

    /// Body text, may be empty
    pub content: String,

    /// Epoch milliseconds of the last write
    pub last_modified: i64,
}

/// Caller input for saving a note: create when `id` is `None`, update
/// otherwise.
#[derive(Debug, Clone, Default)]
pub struct NoteDraft {
    pub id: Option<i64>,
    pub title: String,
    pub content: String,
}

impl NoteDraft {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            content: content.into(),
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }
}

/// A note to insert with a caller-chosen timestamp (used by restore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNote {
    pub title: String,
    pub content: String,
    pub last_modified: i64,
}

/// Metadata row for one encrypted attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Store-assigned surrogate id
    pub id: i64,

    /// Generated blob identifier (UUID)
    pub file_id: String,

    /// Name the attachment was uploaded under
    pub original_file_name: String,

    pub mime_type: String,

    /// Plaintext length in bytes
    pub file_size: u64,

    /// Epoch milliseconds
    pub upload_date: i64,
}

/// Builder for inserting attachment metadata.
#[derive(Debug, Clone)]
pub struct NewFileMetadata {
    pub file_id: String,
    pub original_file_name: String,
    pub mime_type: String,
    pub file_size: u64,
    pub upload_date: i64,
}

/// Aggregate attachment statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStats {
    pub count: u64,
    pub total_size: u64,
}

impl FileMetadata {
    /// Display category derived from the MIME type.
    pub fn kind(&self) -> crate::mime::FileKind {
        crate::mime::FileKind::from_mime(&self.mime_type)
    }
}
