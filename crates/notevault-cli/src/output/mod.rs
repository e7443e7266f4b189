//! Output formatting helpers for the CLI.
//!
//! This module provides formatting utilities for displaying notes and
//! attachments as JSON, tables or plain text.

mod json;
mod text;

// Re-export public API
pub use json::{file_json, files_json, note_json, notes_json, print_json};
pub use text::{print_file_list, print_note, print_note_list};
