use std::path::PathBuf;

use dialoguer::{Confirm, Select};

use notevault_core::Vault;

use crate::app::{build_secret_store, resolve_config_path, AppContext};
use crate::cli::InitArgs;
use crate::config::{default_vault_path, write_config, NotevaultConfig, SecretsBackend};
use crate::errors::CliError;
use crate::output::print_json;
use crate::ui::render::{hint, receipt};

fn choose_backend(interactive: bool) -> anyhow::Result<SecretsBackend> {
    if !interactive {
        return Ok(SecretsBackend::Keychain);
    }
    let choice = Select::new()
        .with_prompt("Where should the vault keys be kept?")
        .items(&["OS keychain", "Key files on disk"])
        .default(0)
        .interact()
        .map_err(|e| anyhow::anyhow!("Failed to read selection: {}", e))?;
    Ok(if choice == 0 {
        SecretsBackend::Keychain
    } else {
        SecretsBackend::Keyfile
    })
}

pub fn handle_init(ctx: &AppContext<'_>, args: &InitArgs) -> anyhow::Result<()> {
    let target = match args.path.as_deref().or(ctx.cli().vault.as_deref()) {
        Some(path) => PathBuf::from(path),
        None => default_vault_path()?,
    };
    if Vault::exists(&target) {
        return Err(CliError::invalid_input(format!(
            "A vault already exists at {}",
            target.display()
        ))
        .into());
    }

    let interactive = !args.no_input && ctx.ui().is_interactive();
    let backend = match args.secrets {
        Some(backend) => backend,
        None => choose_backend(interactive)?,
    };

    // Keys are namespaced by the canonical vault path, so the directory
    // has to exist before the secret store is built.
    std::fs::create_dir_all(&target)
        .map_err(|e| anyhow::anyhow!("Failed to create {}: {}", target.display(), e))?;
    let target = target.canonicalize()?;

    let secrets = build_secret_store(backend, args.keyfile_dir.as_deref(), &target)?;
    let vault = Vault::create(&target, secrets)?;

    let config_path = resolve_config_path()?;
    let write = if config_path.exists() && interactive {
        Confirm::new()
            .with_prompt(format!("Replace config at {}?", config_path.display()))
            .default(false)
            .interact()
            .map_err(|e| anyhow::anyhow!("Failed to read confirmation: {}", e))?
    } else {
        true
    };
    if write {
        let keyfile_dir = args.keyfile_dir.as_ref().map(PathBuf::from);
        write_config(
            &config_path,
            &NotevaultConfig::new(vault.dir(), backend, keyfile_dir),
        )?;
    }

    if ctx.ui().mode.is_json() {
        return print_json(&serde_json::json!({
            "vault": vault.dir(),
            "config": config_path,
            "config_written": write,
            "secrets": backend,
            "vault_id": vault.metadata()?.vault_id,
        }));
    }
    if !ctx.quiet() {
        println!(
            "{}",
            receipt(
                ctx.ui(),
                &format!("Initialized vault at {}", vault.dir().display()),
                &[
                    ("secrets", format!("{:?}", backend).to_lowercase()),
                    ("config", config_path.display().to_string()),
                ],
            )
        );
        if !write {
            println!(
                "{}",
                hint(ctx.ui(), "Config left unchanged; pass --vault to use this vault.")
            );
        }
    }
    Ok(())
}
