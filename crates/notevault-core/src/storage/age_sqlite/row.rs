//! Row types for database queries.

use rusqlite::Row;

use crate::blobs::validate_file_id;
use crate::error::{Result, VaultError};
use crate::storage::types::{FileMetadata, Note};

pub const NOTE_COLUMNS: &str = "id, title, content, last_modified";
pub const FILE_COLUMNS: &str =
    "id, file_id, original_file_name, mime_type, file_size, upload_date";

/// Raw row data from the notes table.
#[derive(Debug)]
pub struct NoteRow {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub last_modified: i64,
}

impl NoteRow {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            content: row.get(2)?,
            last_modified: row.get(3)?,
        })
    }
}

impl From<NoteRow> for Note {
    fn from(row: NoteRow) -> Self {
        Note {
            id: row.id,
            title: row.title,
            content: row.content,
            last_modified: row.last_modified,
        }
    }
}

/// Raw row data from the secure_files table, before validation.
#[derive(Debug)]
pub struct FileRow {
    pub id: i64,
    pub file_id: String,
    pub original_file_name: String,
    pub mime_type: String,
    pub file_size: i64,
    pub upload_date: i64,
}

impl FileRow {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            file_id: row.get(1)?,
            original_file_name: row.get(2)?,
            mime_type: row.get(3)?,
            file_size: row.get(4)?,
            upload_date: row.get(5)?,
        })
    }
}

impl TryFrom<FileRow> for FileMetadata {
    type Error = VaultError;

    fn try_from(row: FileRow) -> Result<Self> {
        validate_file_id(&row.file_id)
            .map_err(|_| VaultError::Storage(format!("Invalid file_id in row {}", row.id)))?;
        let file_size = u64::try_from(row.file_size).map_err(|_| {
            VaultError::Storage(format!("Negative file_size in row {}", row.id))
        })?;

        Ok(FileMetadata {
            id: row.id,
            file_id: row.file_id,
            original_file_name: row.original_file_name,
            mime_type: row.mime_type,
            file_size,
            upload_date: row.upload_date,
        })
    }
}
