//! Filesystem utilities for atomic replacement of vault files.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Result, VaultError};

/// Suffix shared by every temporary file the vault creates.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Build a unique sibling temp path for `destination`.
///
/// The name starts with a dot so directory scans can skip it.
pub fn temp_path_for(destination: &Path) -> Result<PathBuf> {
    let parent = destination
        .parent()
        .ok_or_else(|| VaultError::Storage("Destination has no parent directory".to_string()))?;
    let filename = destination
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| VaultError::Storage("Invalid destination filename".to_string()))?;
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| VaultError::Storage(format!("System time error: {}", e)))?
        .as_nanos();
    Ok(parent.join(format!(
        ".{}.{}.{}{}",
        filename,
        std::process::id(),
        nanos,
        TEMP_SUFFIX
    )))
}

/// Create a new temp file next to `destination`.
pub fn create_temp_for(destination: &Path) -> Result<(PathBuf, File)> {
    let temp_path = temp_path_for(destination)?;
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .map_err(|e| VaultError::Storage(format!("Temp file create failed: {}", e)))?;
    Ok((temp_path, file))
}

/// Sync `file` and move `temp_path` over `destination`.
///
/// On failure the temp file is removed, so the destination is either the old
/// content or the complete new content.
pub fn commit_temp(temp_path: &Path, file: File, destination: &Path) -> Result<()> {
    if let Err(e) = file.sync_all() {
        let _ = fs::remove_file(temp_path);
        return Err(VaultError::Storage(format!("Temp file sync failed: {}", e)));
    }
    drop(file);
    rename_with_fallback(temp_path, destination)
        .map_err(|e| VaultError::Storage(format!("Atomic rename failed: {}", e)))
}

/// Write `data` to `path` through a temp file and rename.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let (temp_path, mut file) = create_temp_for(path)?;
    if let Err(e) = file.write_all(data) {
        let _ = fs::remove_file(&temp_path);
        return Err(VaultError::Storage(format!("Temp file write failed: {}", e)));
    }
    commit_temp(&temp_path, file, path)
}

/// Atomically rename a file, with fallback for platforms where rename fails if target exists.
///
/// On some platforms (notably Windows), `fs::rename` fails if the destination already exists.
/// This function handles that case by removing the destination first and retrying.
///
/// If the rename ultimately fails, the temp file is cleaned up.
///
/// # Errors
///
/// Returns an error if the rename fails even after the fallback attempt.
pub fn rename_with_fallback(temp_path: &Path, destination: &Path) -> io::Result<()> {
    if let Err(initial_err) = fs::rename(temp_path, destination) {
        let _ = fs::remove_file(destination);
        fs::rename(temp_path, destination).map_err(|retry_err| {
            let _ = fs::remove_file(temp_path);
            io::Error::new(
                retry_err.kind(),
                format!(
                    "Atomic rename failed (initial: {}, retry: {})",
                    initial_err, retry_err
                ),
            )
        })?;
    }
    Ok(())
}

/// Whether a directory entry name is one of our temp files.
pub fn is_temp_name(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(TEMP_SUFFIX)
}

/// Restrict a secret-bearing file to the owner.
pub fn set_owner_only(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(0o600);
        fs::set_permissions(path, perms)?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_rename_new_file() {
        let dir = tempdir().unwrap();
        let temp = dir.path().join("temp.txt");
        let dest = dir.path().join("dest.txt");

        File::create(&temp).unwrap().write_all(b"test").unwrap();

        rename_with_fallback(&temp, &dest).unwrap();

        assert!(!temp.exists());
        assert_eq!(fs::read_to_string(&dest).unwrap(), "test");
    }

    #[test]
    fn test_write_atomic_overwrites_existing() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("vault.db.age");

        fs::write(&dest, b"old").unwrap();
        write_atomic(&dest, b"new").unwrap();

        assert_eq!(fs::read(&dest).unwrap(), b"new");
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| is_temp_name(&e.file_name().to_string_lossy()))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_temp_names_are_recognized() {
        let dir = tempdir().unwrap();
        let temp = temp_path_for(&dir.path().join("abc")).unwrap();
        let name = temp.file_name().unwrap().to_string_lossy().to_string();
        assert!(is_temp_name(&name));
        assert!(!is_temp_name("abc"));
    }
}
