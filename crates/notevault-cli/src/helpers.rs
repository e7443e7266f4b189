//! Prompt and input helpers for the CLI.

use std::io::{self, IsTerminal, Read};
use std::path::Path;

use chrono::Utc;
use dialoguer::Password;
use tracing::debug;
use zeroize::Zeroizing;

use notevault_core::fs::{set_owner_only, write_atomic};
use notevault_core::{AccessGrant, Vault};

use crate::app::AppContext;
use crate::constants::{BACKUP_PASSWORD_ENV, GRANT_FILE, NEW_PIN_ENV, PIN_ENV};
use crate::errors::CliError;

fn secret_from_env(var: &str) -> Option<Zeroizing<String>> {
    match std::env::var(var) {
        Ok(value) if !value.is_empty() => Some(Zeroizing::new(value)),
        _ => None,
    }
}

fn prompt_secret(
    var: &str,
    interactive: bool,
    prompt: &str,
    confirm: bool,
) -> anyhow::Result<Zeroizing<String>> {
    if let Some(value) = secret_from_env(var) {
        return Ok(value);
    }
    if !interactive {
        return Err(CliError::invalid_input(format!(
            "No {} provided and no TTY available. Set {}.",
            prompt.to_lowercase(),
            var
        ))
        .into());
    }
    let mut input = Password::new().with_prompt(prompt);
    if confirm {
        input = input.with_confirmation(format!("Confirm {}", prompt.to_lowercase()), "Values do not match");
    }
    input
        .interact()
        .map(Zeroizing::new)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", prompt.to_lowercase(), e))
}

/// Backup password from NOTEVAULT_BACKUP_PASSWORD or a prompt. New backups
/// ask twice.
pub fn prompt_backup_password(interactive: bool, confirm: bool) -> anyhow::Result<Zeroizing<String>> {
    prompt_secret(BACKUP_PASSWORD_ENV, interactive, "Backup password", confirm)
}

/// Current PIN from NOTEVAULT_PIN or a prompt.
pub fn prompt_pin(interactive: bool) -> anyhow::Result<Zeroizing<String>> {
    prompt_secret(PIN_ENV, interactive, "PIN", false)
}

/// New PIN from NOTEVAULT_NEW_PIN or a prompt with confirmation.
pub fn prompt_new_pin(interactive: bool) -> anyhow::Result<Zeroizing<String>> {
    prompt_secret(NEW_PIN_ENV, interactive, "New PIN", true)
}

/// Note content from `--body`, else stdin when it is piped.
pub fn read_body(body: Option<String>, no_input: bool) -> anyhow::Result<String> {
    if let Some(body) = body {
        return Ok(body);
    }
    if no_input || io::stdin().is_terminal() {
        return Ok(String::new());
    }
    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to read stdin: {}", e))?;
    Ok(buffer)
}

/// Pass the attachment PIN gate. Returns `None` when no PIN is set.
///
/// A grant from an earlier unlock is reused while it lasts, so a run of
/// commands asks for the PIN once per `grant_ttl_seconds`. A TTL of 0
/// turns the reuse off.
pub fn require_gate(ctx: &AppContext<'_>, vault: &Vault) -> anyhow::Result<Option<AccessGrant>> {
    let gate = vault.gate();
    if !gate.is_enabled()? {
        return Ok(None);
    }
    let ttl = ctx.grant_ttl()?;
    let grant_path = vault.dir().join(GRANT_FILE);
    if ttl > chrono::Duration::zero() {
        if let Some(grant) = load_grant(vault, &grant_path)? {
            debug!(expires_at = %grant.expires_at, "Reusing PIN grant");
            return Ok(Some(grant));
        }
    }

    let grant = unlock_gate(ctx, vault)?;
    if ttl > chrono::Duration::zero() {
        let token = gate.seal_grant(&grant)?;
        write_atomic(&grant_path, token.as_bytes())?;
        set_owner_only(&grant_path)
            .map_err(|e| anyhow::anyhow!("Failed to restrict {}: {}", grant_path.display(), e))?;
    }
    Ok(Some(grant))
}

/// Like [`require_gate`] but always asks for the PIN. Used before changing
/// or removing it.
pub fn require_fresh_pin(ctx: &AppContext<'_>, vault: &Vault) -> anyhow::Result<Option<AccessGrant>> {
    if !vault.gate().is_enabled()? {
        return Ok(None);
    }
    unlock_gate(ctx, vault).map(Some)
}

/// Drop any cached grant for `vault`.
pub fn forget_grant(vault: &Vault) -> anyhow::Result<()> {
    let path = vault.dir().join(GRANT_FILE);
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(anyhow::anyhow!("Failed to remove {}: {}", path.display(), e)),
    }
}

fn unlock_gate(ctx: &AppContext<'_>, vault: &Vault) -> anyhow::Result<AccessGrant> {
    let pin = prompt_pin(ctx.ui().is_interactive())?;
    let now = Utc::now();
    match vault.gate().unlock(&pin, ctx.grant_ttl()?, now)? {
        Some(grant) => Ok(grant),
        None => Err(CliError::auth_failed_with_hint(
            "Incorrect PIN",
            "Hint: Set NOTEVAULT_PIN or enter the PIN at the prompt.",
        )
        .into()),
    }
}

fn load_grant(vault: &Vault, path: &Path) -> anyhow::Result<Option<AccessGrant>> {
    let token = match std::fs::read_to_string(path) {
        Ok(token) => token,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(anyhow::anyhow!("Failed to read {}: {}", path.display(), e)),
    };
    Ok(vault.gate().open_grant(&token, Utc::now())?)
}
