//! JSON output formatting for notes and attachments.

use notevault_core::storage::{FileMetadata, Note};

/// Convert a note to JSON for output.
pub fn note_json(note: &Note) -> serde_json::Value {
    serde_json::json!({
        "id": note.id,
        "title": note.title,
        "content": note.content,
        "last_modified": note.last_modified,
    })
}

pub fn notes_json(notes: &[Note]) -> Vec<serde_json::Value> {
    notes.iter().map(note_json).collect()
}

/// Convert attachment metadata to JSON for output.
pub fn file_json(file: &FileMetadata) -> serde_json::Value {
    serde_json::json!({
        "id": file.id,
        "file_id": file.file_id,
        "name": file.original_file_name,
        "mime_type": file.mime_type,
        "kind": file.kind().as_str(),
        "size": file.file_size,
        "uploaded": file.upload_date,
    })
}

pub fn files_json(files: &[FileMetadata]) -> Vec<serde_json::Value> {
    files.iter().map(file_json).collect()
}

/// Print a value as pretty JSON on stdout.
pub fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_json_includes_kind() {
        let file = FileMetadata {
            id: 1,
            file_id: "abc".to_string(),
            original_file_name: "photo.png".to_string(),
            mime_type: "image/png".to_string(),
            file_size: 10,
            upload_date: 5,
        };
        let value = file_json(&file);
        assert_eq!(value["name"], "photo.png");
        assert_eq!(value["size"], 10);
        assert_eq!(value["kind"], file.kind().as_str());
    }
}
