use notevault_core::storage::NoteDraft;

use crate::app::AppContext;
use crate::cli::{ListArgs, NoteAddArgs, NoteCommand, NoteEditArgs, NoteIdArgs};
use crate::errors::CliError;
use crate::helpers::read_body;
use crate::output::{note_json, notes_json, print_json, print_note, print_note_list};
use crate::ui::render::{badge, hint};
use crate::ui::Badge;

fn note_not_found(id: i64) -> CliError {
    CliError::not_found(
        format!("Note {} not found", id),
        "Hint: Run `notevault note list` to see note ids.",
    )
}

pub fn handle_note(ctx: &AppContext<'_>, command: &NoteCommand) -> anyhow::Result<()> {
    match command {
        NoteCommand::Add(args) => handle_add(ctx, args),
        NoteCommand::Edit(args) => handle_edit(ctx, args),
        NoteCommand::Show(args) => handle_show(ctx, args),
        NoteCommand::List(args) => handle_list(ctx, args),
        NoteCommand::Delete(args) => handle_delete(ctx, args),
    }
}

fn handle_add(ctx: &AppContext<'_>, args: &NoteAddArgs) -> anyhow::Result<()> {
    let body = read_body(args.body.clone(), args.no_input)?;
    let vault = ctx.open_vault()?;
    let note = vault
        .repository()
        .save_note(&NoteDraft::new(args.title.clone(), body))?;

    if ctx.ui().mode.is_json() {
        return print_json(&note_json(&note));
    }
    if ctx.quiet() {
        println!("{}", note.id);
    } else {
        println!(
            "{}",
            badge(ctx.ui(), Badge::Ok, &format!("Created note {}", note.id))
        );
    }
    Ok(())
}

fn handle_edit(ctx: &AppContext<'_>, args: &NoteEditArgs) -> anyhow::Result<()> {
    if args.title.is_none() && args.body.is_none() {
        return Err(CliError::invalid_input("Nothing to change: pass --title or --body").into());
    }
    let vault = ctx.open_vault()?;
    let repo = vault.repository();
    let existing = repo.get_note(args.id)?.ok_or_else(|| note_not_found(args.id))?;

    let draft = NoteDraft::new(
        args.title.clone().unwrap_or(existing.title),
        args.body.clone().unwrap_or(existing.content),
    )
    .with_id(args.id);
    let note = repo.save_note(&draft)?;

    if ctx.ui().mode.is_json() {
        return print_json(&note_json(&note));
    }
    if !ctx.quiet() {
        println!(
            "{}",
            badge(ctx.ui(), Badge::Ok, &format!("Updated note {}", note.id))
        );
    }
    Ok(())
}

fn handle_show(ctx: &AppContext<'_>, args: &NoteIdArgs) -> anyhow::Result<()> {
    let vault = ctx.open_vault()?;
    let note = vault
        .repository()
        .get_note(args.id)?
        .ok_or_else(|| note_not_found(args.id))?;

    if ctx.ui().mode.is_json() {
        return print_json(&note_json(&note));
    }
    print_note(ctx.ui(), &note);
    Ok(())
}

fn handle_list(ctx: &AppContext<'_>, args: &ListArgs) -> anyhow::Result<()> {
    let vault = ctx.open_vault()?;
    let mut notes = vault.repository().list_notes()?;
    if let Some(limit) = args.limit {
        notes.truncate(limit);
    }

    if ctx.ui().mode.is_json() {
        return print_json(&notes_json(&notes));
    }
    if notes.is_empty() {
        if !ctx.quiet() {
            println!("No notes yet.");
            println!("{}", hint(ctx.ui(), "Add one with `notevault note add TITLE`."));
        }
        return Ok(());
    }
    print_note_list(ctx.ui(), &notes);
    Ok(())
}

fn handle_delete(ctx: &AppContext<'_>, args: &NoteIdArgs) -> anyhow::Result<()> {
    let vault = ctx.open_vault()?;
    if !vault.repository().delete_note(args.id)? {
        return Err(note_not_found(args.id).into());
    }
    if !ctx.quiet() && !ctx.ui().mode.is_json() {
        println!(
            "{}",
            badge(ctx.ui(), Badge::Ok, &format!("Deleted note {}", args.id))
        );
    }
    Ok(())
}
