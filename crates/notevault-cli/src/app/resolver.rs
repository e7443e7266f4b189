//! Path and secret-store resolution.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notevault_core::keys::{vault_namespace, KeychainSecretStore, KeyfileSecretStore};
use notevault_core::SecretStore;

use crate::cli::Cli;
use crate::config::{
    default_config_path, default_keyfile_dir, default_vault_path, read_config, NotevaultConfig,
    SecretsBackend,
};

/// Resolve the config file path, checking NOTEVAULT_CONFIG env var first.
pub fn resolve_config_path() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("NOTEVAULT_CONFIG") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value));
        }
    }
    default_config_path()
}

/// Load the config file, `None` when it does not exist yet.
pub fn load_config() -> anyhow::Result<Option<NotevaultConfig>> {
    let path = resolve_config_path()?;
    if !path.exists() {
        return Ok(None);
    }
    read_config(&path).map(Some)
}

/// Vault directory: `--vault`/NOTEVAULT_PATH, then the config, then the
/// default data directory.
pub fn resolve_vault_dir(cli: &Cli, config: Option<&NotevaultConfig>) -> anyhow::Result<PathBuf> {
    if let Some(path) = cli.vault.as_deref() {
        return Ok(PathBuf::from(path));
    }
    if let Some(config) = config {
        return Ok(PathBuf::from(&config.vault.path));
    }
    default_vault_path()
}

/// Keyfiles for one vault live in their own subdirectory so several vaults
/// can share a keyfile root.
pub fn keyfile_dir_for(root: Option<&str>, vault_dir: &Path) -> anyhow::Result<PathBuf> {
    let root = match root {
        Some(dir) => PathBuf::from(dir),
        None => default_keyfile_dir()?,
    };
    Ok(root.join(vault_namespace(vault_dir)))
}

/// Build the secret store the vault keys are kept in.
pub fn build_secret_store(
    backend: SecretsBackend,
    keyfile_root: Option<&str>,
    vault_dir: &Path,
) -> anyhow::Result<Arc<dyn SecretStore>> {
    let store: Arc<dyn SecretStore> = match backend {
        SecretsBackend::Keychain => Arc::new(KeychainSecretStore::for_vault(vault_dir)),
        SecretsBackend::Keyfile => {
            Arc::new(KeyfileSecretStore::new(keyfile_dir_for(keyfile_root, vault_dir)?))
        }
    };
    Ok(store)
}

/// Error message when the vault directory holds no vault.
pub fn missing_vault_message(path: &Path) -> String {
    format!(
        "No vault found at {}\n\nRun:\n  notevault init\n\nOr specify a vault path:\n  NOTEVAULT_PATH=/path/to/vault notevault init",
        path.display()
    )
}
