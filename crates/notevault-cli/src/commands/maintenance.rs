use notevault_core::repository::RepairReport;

use crate::app::AppContext;
use crate::errors::CliError;
use crate::output::print_json;
use crate::ui::render::badge;
use crate::ui::Badge;

fn print_ids(label: &str, ids: &[String]) {
    for id in ids {
        eprintln!("- {}: {}", label, id);
    }
}

pub fn handle_check(ctx: &AppContext<'_>) -> anyhow::Result<()> {
    let vault = ctx.open_vault()?;
    let startup = vault.startup_repair();
    let report = vault.repository().check_integrity()?;

    if ctx.ui().mode.is_json() {
        print_json(&serde_json::json!({
            "clean": report.is_clean(),
            "repaired_on_open": startup,
            "report": report,
        }))?;
    } else if report.is_clean() {
        if !ctx.quiet() {
            println!("{}", badge(ctx.ui(), Badge::Ok, "Integrity check: OK"));
            println!("- record store: OK");
            println!("- attachment blobs: OK");
            if !startup.orphan_blobs_removed.is_empty() {
                println!(
                    "- removed {} unreferenced blob(s) while opening",
                    startup.orphan_blobs_removed.len()
                );
            }
        }
    } else {
        eprintln!("{}", badge(ctx.ui(), Badge::Err, "Integrity check: FAILED"));
        print_ids("orphan blob", &report.orphan_blobs);
        print_ids("missing blob", &report.rows_missing_blob);
        print_ids("size mismatch", &report.size_mismatches);
        eprintln!("Hint: Run `notevault repair`, or restore from a backup.");
    }

    if !report.is_clean() {
        return Err(CliError::IntegrityFailed("Integrity check failed".to_string()).into());
    }
    Ok(())
}

pub fn handle_repair(ctx: &AppContext<'_>) -> anyhow::Result<()> {
    let vault = ctx.open_vault()?;
    let again = vault.repository().repair()?;
    let startup = vault.startup_repair();

    let mut removed = startup.orphan_blobs_removed.clone();
    removed.extend(again.orphan_blobs_removed);
    let combined = RepairReport {
        orphan_blobs_removed: removed,
        rows_missing_blob: again.rows_missing_blob,
        temp_files_removed: startup.temp_files_removed + again.temp_files_removed,
    };

    if ctx.ui().mode.is_json() {
        return print_json(&combined);
    }
    if ctx.quiet() {
        return Ok(());
    }
    if combined.is_clean() {
        println!("{}", badge(ctx.ui(), Badge::Ok, "Nothing to repair"));
        return Ok(());
    }
    println!(
        "{}",
        badge(
            ctx.ui(),
            Badge::Ok,
            &format!(
                "Removed {} unreferenced blob(s)",
                combined.orphan_blobs_removed.len()
            )
        )
    );
    if combined.temp_files_removed > 0 {
        println!(
            "- removed {} leftover temp file(s)",
            combined.temp_files_removed
        );
    }
    if !combined.rows_missing_blob.is_empty() {
        println!(
            "{}",
            badge(
                ctx.ui(),
                Badge::Warn,
                &format!(
                    "{} attachment(s) have no stored data; delete them with `notevault file delete`",
                    combined.rows_missing_blob.len()
                )
            )
        );
    }
    Ok(())
}
