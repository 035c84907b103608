use anyhow::{Context, Result};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Atomically write content to a file
///
/// Writes to a temporary sibling file, syncs it to disk, then renames it
/// over the target so readers never observe a partially written file.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_directory_exists(parent)?;
    }

    // One temp file per process
    let temp_path = path.with_extension(format!("{}.tmp", std::process::id()));

    {
        let mut file = File::create(&temp_path).with_context(|| {
            format!("Failed to create temporary file: {}", temp_path.display())
        })?;

        file.write_all(content)
            .context("Failed to write to temporary file")?;

        file.sync_all().context("Failed to sync file to disk")?;
    }

    restrict_to_owner(&temp_path)?;

    std::fs::rename(&temp_path, path).with_context(|| {
        format!(
            "Failed to rename {} to {}",
            temp_path.display(),
            path.display()
        )
    })?;

    Ok(())
}

/// Ensure a directory exists, creating it and all parents if needed
pub fn ensure_directory_exists(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() || path.exists() {
        return Ok(());
    }

    std::fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory: {}", path.display()))?;

    Ok(())
}

/// Usage data is private to the family: owner read/write only (Unix)
fn restrict_to_owner(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let mut permissions = std::fs::metadata(path)
            .with_context(|| format!("Failed to get metadata for: {}", path.display()))?
            .permissions();
        permissions.set_mode(0o600);

        std::fs::set_permissions(path, permissions)
            .with_context(|| format!("Failed to set permissions for: {}", path.display()))?;
    }

    #[cfg(not(unix))]
    let _ = path;

    Ok(())
}
