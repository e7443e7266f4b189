use crate::app::AppContext;
use crate::cli::PinCommand;
use crate::errors::CliError;
use crate::helpers::{forget_grant, prompt_new_pin, prompt_pin, require_fresh_pin};
use crate::ui::render::{badge, hint};
use crate::ui::Badge;

pub fn handle_pin(ctx: &AppContext<'_>, command: &PinCommand) -> anyhow::Result<()> {
    let vault = ctx.open_vault()?;
    let gate = vault.gate();
    let interactive = ctx.ui().is_interactive();
    let report = |kind: Badge, message: &str| {
        if !ctx.quiet() && !ctx.ui().mode.is_json() {
            println!("{}", badge(ctx.ui(), kind, message));
        }
    };

    match command {
        PinCommand::Set => {
            // Changing an existing PIN requires the current one
            let replacing = require_fresh_pin(ctx, &vault)?.is_some();
            let pin = prompt_new_pin(interactive)?;
            gate.set_pin(&pin)?;
            forget_grant(&vault)?;
            report(
                Badge::Ok,
                if replacing { "PIN changed" } else { "PIN set" },
            );
            if !ctx.quiet() && !ctx.ui().mode.is_json() {
                println!(
                    "{}",
                    hint(
                        ctx.ui(),
                        "Attachment commands now ask for the PIN (or read NOTEVAULT_PIN)."
                    )
                );
            }
        }
        PinCommand::Clear => {
            if require_fresh_pin(ctx, &vault)?.is_none() {
                report(Badge::Info, "No PIN is set");
                return Ok(());
            }
            gate.remove_pin()?;
            forget_grant(&vault)?;
            report(Badge::Ok, "PIN removed");
        }
        PinCommand::Verify => {
            if !gate.is_enabled()? {
                report(Badge::Info, "No PIN is set");
                return Ok(());
            }
            let pin = prompt_pin(interactive)?;
            if !gate.verify(&pin)? {
                return Err(CliError::auth_failed("Incorrect PIN").into());
            }
            report(Badge::Ok, "PIN accepted");
        }
    }
    Ok(())
}
