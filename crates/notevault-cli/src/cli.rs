use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use notevault_core::VERSION;

use crate::config::SecretsBackend;

/// notevault - encrypted notes and attachments with password-protected backups
#[derive(Parser)]
#[command(name = "notevault")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the vault directory
    #[arg(long, global = true, env = "NOTEVAULT_PATH")]
    pub vault: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

/// Arguments for the `init` command
#[derive(Args)]
pub struct InitArgs {
    /// Directory where the vault will be created
    #[arg(value_name = "PATH")]
    pub path: Option<String>,

    /// Where the vault keys are kept
    #[arg(long, value_enum)]
    pub secrets: Option<SecretsBackend>,

    /// Keyfile directory (keyfile backend only)
    #[arg(long)]
    pub keyfile_dir: Option<String>,

    /// Disable interactive prompts
    #[arg(long)]
    pub no_input: bool,
}

#[derive(Subcommand)]
pub enum NoteCommand {
    /// Create a note
    Add(NoteAddArgs),
    /// Change the title or content of a note
    Edit(NoteEditArgs),
    /// Show one note
    Show(NoteIdArgs),
    /// List notes, newest first
    List(ListArgs),
    /// Delete a note
    Delete(NoteIdArgs),
}

/// Arguments for `note add`
#[derive(Args)]
pub struct NoteAddArgs {
    /// Note title
    #[arg(value_name = "TITLE")]
    pub title: String,

    /// Note content (overrides stdin)
    #[arg(long)]
    pub body: Option<String>,

    /// Do not read content from stdin
    #[arg(long)]
    pub no_input: bool,
}

/// Arguments for `note edit`
#[derive(Args)]
pub struct NoteEditArgs {
    /// Note id
    #[arg(value_name = "ID")]
    pub id: i64,

    /// New title
    #[arg(long)]
    pub title: Option<String>,

    /// New content
    #[arg(long)]
    pub body: Option<String>,
}

#[derive(Args)]
pub struct NoteIdArgs {
    /// Note id
    #[arg(value_name = "ID")]
    pub id: i64,
}

#[derive(Args)]
pub struct ListArgs {
    /// Limit number of results
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Subcommand)]
pub enum FileCommand {
    /// Encrypt a file into the vault
    Add(FileAddArgs),
    /// Decrypt an attachment to a file or stdout
    Get(FileGetArgs),
    /// List attachments, newest first
    List(ListArgs),
    /// Delete an attachment
    Delete(FileIdArgs),
    /// Show attachment count and total size
    Stats,
}

/// Arguments for `file add`
#[derive(Args)]
pub struct FileAddArgs {
    /// File to import
    #[arg(value_name = "PATH")]
    pub path: String,

    /// Name to record instead of the file's own name
    #[arg(long)]
    pub name: Option<String>,

    /// MIME type (guessed from the name when omitted)
    #[arg(long)]
    pub mime: Option<String>,
}

/// Arguments for `file get`
#[derive(Args)]
pub struct FileGetArgs {
    /// Attachment id
    #[arg(value_name = "FILE_ID")]
    pub file_id: String,

    /// Output path (stdout when omitted)
    #[arg(short, long)]
    pub output: Option<String>,
}

#[derive(Args)]
pub struct FileIdArgs {
    /// Attachment id
    #[arg(value_name = "FILE_ID")]
    pub file_id: String,
}

#[derive(Subcommand)]
pub enum PinCommand {
    /// Set or change the attachment PIN
    Set,
    /// Remove the attachment PIN
    Clear,
    /// Check a PIN without doing anything else
    Verify,
}

/// Arguments for the `backup` command
#[derive(Args)]
pub struct BackupArgs {
    /// Destination path
    #[arg(value_name = "DEST")]
    pub destination: String,

    /// Disable interactive prompts
    #[arg(long)]
    pub no_input: bool,
}

/// Arguments for the `restore` command
#[derive(Args)]
pub struct RestoreArgs {
    /// Backup archive to import
    #[arg(value_name = "SRC")]
    pub source: String,

    /// Disable interactive prompts
    #[arg(long)]
    pub no_input: bool,
}

/// Arguments for the `completions` command
#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_name = "SHELL")]
    pub shell: Shell,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new encrypted vault
    Init(InitArgs),

    /// Work with notes
    #[command(subcommand)]
    Note(NoteCommand),

    /// Work with attachments
    #[command(subcommand)]
    File(FileCommand),

    /// Export notes and attachments to a password-protected archive
    Backup(BackupArgs),

    /// Import a password-protected archive into the vault
    Restore(RestoreArgs),

    /// Manage the attachment PIN
    #[command(subcommand)]
    Pin(PinCommand),

    /// Check vault integrity without changing anything
    Check,

    /// Remove unreferenced attachment blobs
    Repair,

    /// Generate shell completions
    Completions(CompletionsArgs),
}
