use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Seconds an unlocked PIN gate stays open when the config does not say.
pub const DEFAULT_GRANT_TTL_SECONDS: u64 = 300;

#[derive(Debug, Serialize, Deserialize)]
pub struct NotevaultConfig {
    pub vault: VaultSection,
    pub secrets: SecretsSection,
    #[serde(default)]
    pub gate: GateSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VaultSection {
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SecretsSection {
    pub backend: SecretsBackend,
    /// Directory for the keyfile backend; defaults next to the config file.
    pub keyfile_dir: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GateSection {
    /// How long one PIN entry keeps attachment commands unlocked. 0 asks
    /// for the PIN on every command.
    pub grant_ttl_seconds: u64,
}

impl Default for GateSection {
    fn default() -> Self {
        Self {
            grant_ttl_seconds: DEFAULT_GRANT_TTL_SECONDS,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SecretsBackend {
    /// OS keychain (Secret Service, Keychain, Credential Manager)
    Keychain,
    /// Owner-only files on disk
    Keyfile,
}

impl NotevaultConfig {
    pub fn new(vault_path: &Path, backend: SecretsBackend, keyfile_dir: Option<PathBuf>) -> Self {
        Self {
            vault: VaultSection {
                path: vault_path.to_string_lossy().to_string(),
            },
            secrets: SecretsSection {
                backend,
                keyfile_dir: keyfile_dir.map(|path| path.to_string_lossy().to_string()),
            },
            gate: GateSection::default(),
        }
    }
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_config_dir()?.join("config.toml"))
}

pub fn default_vault_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_data_dir()?.join("vault"))
}

pub fn default_keyfile_dir() -> anyhow::Result<PathBuf> {
    Ok(xdg_config_dir()?.join("keys"))
}

pub fn read_config(path: &Path) -> anyhow::Result<NotevaultConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
    toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {}", path.display(), e))
}

pub fn write_config(path: &Path, config: &NotevaultConfig) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            anyhow::anyhow!(
                "Failed to create config directory {}: {}",
                parent.display(),
                e
            )
        })?;
    }
    let contents =
        toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("TOML error: {}", e))?;
    std::fs::write(path, contents)
        .map_err(|e| anyhow::anyhow!("Failed to write config {}: {}", path.display(), e))?;
    Ok(())
}

pub fn xdg_config_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_CONFIG_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("notevault"));
        }
    }
    Ok(home_dir()?.join(".config").join("notevault"))
}

pub fn xdg_data_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_DATA_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("notevault"));
        }
    }
    Ok(home_dir()?.join(".local").join("share").join("notevault"))
}

fn home_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| anyhow::anyhow!("HOME is not set; cannot resolve default paths"))?;
    Ok(PathBuf::from(home))
}
