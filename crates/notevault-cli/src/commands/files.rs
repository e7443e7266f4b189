use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::Path;

use notevault_core::blobs::read_error;
use notevault_core::fs::{commit_temp, create_temp_for};
use notevault_core::storage::FileMetadata;
use notevault_core::Vault;

use crate::app::AppContext;
use crate::cli::{FileAddArgs, FileCommand, FileGetArgs, FileIdArgs, ListArgs};
use crate::errors::CliError;
use crate::helpers::require_gate;
use crate::output::{file_json, files_json, print_file_list, print_json};
use crate::ui::format::format_bytes;
use crate::ui::render::{badge, hint, kv, receipt};
use crate::ui::Badge;

fn file_not_found(file_id: &str) -> CliError {
    CliError::not_found(
        format!("Attachment {} not found", file_id),
        "Hint: Run `notevault file list` to see attachment ids.",
    )
}

fn find_file(vault: &Vault, file_id: &str) -> anyhow::Result<FileMetadata> {
    Ok(vault
        .repository()
        .get_file(file_id)?
        .ok_or_else(|| file_not_found(file_id))?)
}

pub fn handle_file(ctx: &AppContext<'_>, command: &FileCommand) -> anyhow::Result<()> {
    match command {
        FileCommand::Add(args) => handle_add(ctx, args),
        FileCommand::Get(args) => handle_get(ctx, args),
        FileCommand::List(args) => handle_list(ctx, args),
        FileCommand::Delete(args) => handle_delete(ctx, args),
        FileCommand::Stats => handle_stats(ctx),
    }
}

fn handle_add(ctx: &AppContext<'_>, args: &FileAddArgs) -> anyhow::Result<()> {
    let path = Path::new(&args.path);
    let source = File::open(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            anyhow::Error::new(CliError::not_found(
                format!("File not found: {}", path.display()),
                "Hint: Check the path.",
            ))
        } else {
            anyhow::anyhow!("Failed to open {}: {}", path.display(), e)
        }
    })?;
    let name = match &args.name {
        Some(name) => name.clone(),
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| CliError::invalid_input("Cannot derive a name; pass --name"))?,
    };

    let vault = ctx.open_vault()?;
    require_gate(ctx, &vault)?;
    let metadata = vault.repository().upload_file(
        BufReader::new(source),
        &name,
        args.mime.as_deref().unwrap_or(""),
    )?;

    if ctx.ui().mode.is_json() {
        return print_json(&file_json(&metadata));
    }
    if ctx.quiet() {
        println!("{}", metadata.file_id);
    } else {
        println!(
            "{}",
            receipt(
                ctx.ui(),
                &format!("Stored {}", metadata.original_file_name),
                &[
                    ("file id", metadata.file_id.clone()),
                    ("size", format_bytes(metadata.file_size)),
                    ("type", metadata.mime_type.clone()),
                ],
            )
        );
    }
    Ok(())
}

fn handle_get(ctx: &AppContext<'_>, args: &FileGetArgs) -> anyhow::Result<()> {
    let vault = ctx.open_vault()?;
    require_gate(ctx, &vault)?;
    let metadata = find_file(&vault, &args.file_id)?;
    let mut reader = vault.repository().load_file(&metadata.file_id)?;

    let Some(output) = args.output.as_deref() else {
        let mut stdout = io::stdout().lock();
        io::copy(&mut reader, &mut stdout).map_err(read_error)?;
        stdout.flush()?;
        return Ok(());
    };

    let destination = Path::new(output);
    let (temp_path, mut file) = create_temp_for(destination)?;
    if let Err(e) = io::copy(&mut reader, &mut file) {
        drop(file);
        let _ = std::fs::remove_file(&temp_path);
        return Err(read_error(e).into());
    }
    commit_temp(&temp_path, file, destination)?;

    if !ctx.quiet() && !ctx.ui().mode.is_json() {
        println!(
            "{}",
            badge(
                ctx.ui(),
                Badge::Ok,
                &format!(
                    "Wrote {} to {}",
                    metadata.original_file_name,
                    destination.display()
                )
            )
        );
    }
    Ok(())
}

fn handle_list(ctx: &AppContext<'_>, args: &ListArgs) -> anyhow::Result<()> {
    let vault = ctx.open_vault()?;
    require_gate(ctx, &vault)?;
    let mut files = vault.repository().list_files()?;
    if let Some(limit) = args.limit {
        files.truncate(limit);
    }

    if ctx.ui().mode.is_json() {
        return print_json(&files_json(&files));
    }
    if files.is_empty() {
        if !ctx.quiet() {
            println!("No attachments yet.");
            println!("{}", hint(ctx.ui(), "Add one with `notevault file add PATH`."));
        }
        return Ok(());
    }
    print_file_list(ctx.ui(), &files);
    Ok(())
}

fn handle_delete(ctx: &AppContext<'_>, args: &FileIdArgs) -> anyhow::Result<()> {
    let vault = ctx.open_vault()?;
    require_gate(ctx, &vault)?;
    let metadata = find_file(&vault, &args.file_id)?;
    vault.repository().delete_file(&metadata)?;

    if !ctx.quiet() && !ctx.ui().mode.is_json() {
        println!(
            "{}",
            badge(
                ctx.ui(),
                Badge::Ok,
                &format!("Deleted {}", metadata.original_file_name)
            )
        );
    }
    Ok(())
}

fn handle_stats(ctx: &AppContext<'_>) -> anyhow::Result<()> {
    let vault = ctx.open_vault()?;
    let stats = vault.repository().file_stats()?;

    if ctx.ui().mode.is_json() {
        return print_json(&stats);
    }
    println!("{}", kv(ctx.ui(), "attachments", &stats.count.to_string()));
    println!("{}", kv(ctx.ui(), "total size", &format_bytes(stats.total_size)));
    Ok(())
}
