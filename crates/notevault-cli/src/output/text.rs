//! Text and table output formatting for notes and attachments.

use notevault_core::storage::{FileMetadata, Note};

use crate::ui::format::{format_bytes, format_millis, single_line, truncate};
use crate::ui::render::{header, kv, simple_table};
use crate::ui::UiContext;

const TITLE_WIDTH: usize = 40;
const PREVIEW_WIDTH: usize = 50;

/// Print one note with its full content.
pub fn print_note(ctx: &UiContext, note: &Note) {
    println!("{}", header(ctx, &note.title));
    println!("{}", kv(ctx, "id", &note.id.to_string()));
    println!("{}", kv(ctx, "modified", &format_millis(note.last_modified)));
    if !note.content.is_empty() {
        println!();
        println!("{}", note.content);
    }
}

pub fn print_note_list(ctx: &UiContext, notes: &[Note]) {
    let rows: Vec<Vec<String>> = notes
        .iter()
        .map(|note| {
            vec![
                note.id.to_string(),
                format_millis(note.last_modified),
                truncate(&single_line(&note.title), TITLE_WIDTH),
                truncate(&single_line(&note.content), PREVIEW_WIDTH),
            ]
        })
        .collect();
    println!(
        "{}",
        simple_table(ctx, &["ID", "MODIFIED", "TITLE", "PREVIEW"], &rows)
    );
}

pub fn print_file_list(ctx: &UiContext, files: &[FileMetadata]) {
    let rows: Vec<Vec<String>> = files
        .iter()
        .map(|file| {
            vec![
                file.file_id.clone(),
                format_millis(file.upload_date),
                format_bytes(file.file_size),
                file.kind().as_str().to_string(),
                truncate(&file.original_file_name, TITLE_WIDTH),
            ]
        })
        .collect();
    println!(
        "{}",
        simple_table(ctx, &["FILE ID", "UPLOADED", "SIZE", "KIND", "NAME"], &rows)
    );
}
