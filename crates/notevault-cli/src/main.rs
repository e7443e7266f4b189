//! notevault CLI - encrypted notes and attachments with password-protected backups
//!
//! This is the command-line interface for notevault. It provides a
//! user-friendly interface to the core library functionality.

mod app;
mod cli;
mod commands;
mod config;
mod constants;
mod errors;
mod helpers;
mod output;
mod ui;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use app::AppContext;
use cli::{Cli, Commands};
use constants::LOG_ENV;

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| filter.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(&cli) {
        errors::exit_with(err);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let ctx = AppContext::new(cli);

    let Some(command) = &cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    match command {
        Commands::Init(args) => commands::handle_init(&ctx, args),
        Commands::Note(command) => commands::handle_note(&ctx, command),
        Commands::File(command) => commands::handle_file(&ctx, command),
        Commands::Backup(args) => commands::handle_backup(&ctx, args),
        Commands::Restore(args) => commands::handle_restore(&ctx, args),
        Commands::Pin(command) => commands::handle_pin(&ctx, command),
        Commands::Check => commands::handle_check(&ctx),
        Commands::Repair => commands::handle_repair(&ctx),
        Commands::Completions(args) => commands::handle_completions(args),
    }
}
