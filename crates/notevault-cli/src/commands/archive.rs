use std::path::Path;

use notevault_core::crypto::validate_backup_password;
use notevault_core::JobOutcome;

use crate::app::AppContext;
use crate::cli::{BackupArgs, RestoreArgs};
use crate::helpers::prompt_backup_password;
use crate::output::print_json;
use crate::ui::render::{badge, kv};
use crate::ui::{Badge, Spinner};

fn print_outcome(ctx: &AppContext<'_>, outcome: &JobOutcome) -> anyhow::Result<()> {
    if ctx.ui().mode.is_json() {
        return print_json(outcome);
    }
    if ctx.quiet() {
        return Ok(());
    }
    let kind = if outcome.files_failed > 0 {
        Badge::Warn
    } else {
        Badge::Ok
    };
    println!("{}", badge(ctx.ui(), kind, &outcome.message));
    println!("  {}", kv(ctx.ui(), "notes", &outcome.notes.to_string()));
    println!("  {}", kv(ctx.ui(), "attachments", &outcome.files.to_string()));
    if outcome.files_failed > 0 {
        println!(
            "  {}",
            kv(ctx.ui(), "failed", &outcome.files_failed.to_string())
        );
    }
    Ok(())
}

pub fn handle_backup(ctx: &AppContext<'_>, args: &BackupArgs) -> anyhow::Result<()> {
    let interactive = !args.no_input && ctx.ui().is_interactive();
    let password = prompt_backup_password(interactive, true)?;
    validate_backup_password(&password)?;

    let vault = ctx.open_vault()?;
    let spinner = Spinner::start(ctx.ui(), "Writing backup");
    let result = vault.backup(Path::new(&args.destination), &password);
    spinner.finish();

    let report = result?;
    print_outcome(ctx, &JobOutcome::from(&report))
}

pub fn handle_restore(ctx: &AppContext<'_>, args: &RestoreArgs) -> anyhow::Result<()> {
    let interactive = !args.no_input && ctx.ui().is_interactive();
    let password = prompt_backup_password(interactive, false)?;
    validate_backup_password(&password)?;

    let vault = ctx.open_vault()?;
    let spinner = Spinner::start(ctx.ui(), "Importing backup");
    let result = vault.restore(Path::new(&args.source), &password);
    spinner.finish();

    let report = result?;
    print_outcome(ctx, &JobOutcome::from(&report))
}
