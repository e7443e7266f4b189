//! Command handlers, one module per command group.

mod archive;
mod files;
mod init;
mod maintenance;
mod misc;
mod notes;
mod pin;

pub use archive::{handle_backup, handle_restore};
pub use files::handle_file;
pub use init::handle_init;
pub use maintenance::{handle_check, handle_repair};
pub use misc::handle_completions;
pub use notes::handle_note;
pub use pin::handle_pin;
