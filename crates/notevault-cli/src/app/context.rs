//! Application context for the notevault CLI.
//!
//! Bundles CLI arguments with the lazily-loaded config file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::unsync::OnceCell;
use tracing::debug;

use notevault_core::{SecretStore, Vault};

use crate::cli::Cli;
use crate::config::{NotevaultConfig, SecretsBackend, DEFAULT_GRANT_TTL_SECONDS};
use crate::errors::CliError;
use crate::ui::UiContext;

use super::resolver::{build_secret_store, load_config, missing_vault_message, resolve_vault_dir};

/// Application context that bundles CLI args with configuration.
///
/// This avoids repeatedly loading config and threading multiple parameters
/// through handler functions.
pub struct AppContext<'a> {
    cli: &'a Cli,
    config: OnceCell<Option<NotevaultConfig>>,
    ui: UiContext,
}

impl<'a> AppContext<'a> {
    /// Create a new application context from CLI arguments.
    pub fn new(cli: &'a Cli) -> Self {
        Self {
            cli,
            config: OnceCell::new(),
            ui: UiContext::from_env(cli.json, cli.no_color),
        }
    }

    /// Get the CLI arguments.
    pub fn cli(&self) -> &Cli {
        self.cli
    }

    /// Check if quiet mode is enabled.
    pub fn quiet(&self) -> bool {
        self.cli.quiet
    }

    pub fn ui(&self) -> &UiContext {
        &self.ui
    }

    /// Get the config file, loading it lazily. `None` before `init`.
    pub fn config(&self) -> anyhow::Result<Option<&NotevaultConfig>> {
        Ok(self.config.get_or_try_init(load_config)?.as_ref())
    }

    /// Directory of the vault this invocation works on.
    pub fn vault_dir(&self) -> anyhow::Result<PathBuf> {
        resolve_vault_dir(self.cli, self.config()?)
    }

    /// Secret store configured for `vault_dir`. Without a config file the
    /// OS keychain is used.
    pub fn secret_store(&self, vault_dir: &Path) -> anyhow::Result<Arc<dyn SecretStore>> {
        let config = self.config()?;
        let backend = config
            .map(|c| c.secrets.backend)
            .unwrap_or(SecretsBackend::Keychain);
        let keyfile_root = config.and_then(|c| c.secrets.keyfile_dir.as_deref());
        build_secret_store(backend, keyfile_root, vault_dir)
    }

    /// Open the vault, reporting a missing one as not found.
    pub fn open_vault(&self) -> anyhow::Result<Vault> {
        let dir = self.vault_dir()?;
        if !Vault::exists(&dir) {
            return Err(CliError::not_found(
                missing_vault_message(&dir),
                "Hint: Pass --vault to use a different directory.",
            )
            .into());
        }
        let secrets = self.secret_store(&dir)?;
        debug!(dir = %dir.display(), "Opening vault");
        Ok(Vault::open(&dir, secrets)?)
    }

    /// How long a PIN unlock stays valid.
    pub fn grant_ttl(&self) -> anyhow::Result<chrono::Duration> {
        let seconds = self
            .config()?
            .map(|c| c.gate.grant_ttl_seconds)
            .unwrap_or(DEFAULT_GRANT_TTL_SECONDS);
        Ok(chrono::Duration::seconds(seconds.min(u64::from(u32::MAX)) as i64))
    }
}
