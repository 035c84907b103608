pub mod common;

use anyhow::Result;
use std::path::PathBuf;

/// Platform-specific directory holding the configuration file
pub fn config_dir() -> Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        Ok(PathBuf::from("/etc/family-access"))
    }

    #[cfg(target_os = "macos")]
    {
        Ok(PathBuf::from("/Library/Application Support/family-access"))
    }

    #[cfg(target_os = "windows")]
    {
        Ok(program_data_dir())
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        anyhow::bail!("Unsupported operating system");
    }
}

/// Platform-specific directory holding the usage ledger
pub fn data_dir() -> Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        Ok(PathBuf::from("/var/lib/family-access"))
    }

    #[cfg(target_os = "macos")]
    {
        Ok(PathBuf::from("/Library/Application Support/family-access"))
    }

    #[cfg(target_os = "windows")]
    {
        Ok(program_data_dir())
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        anyhow::bail!("Unsupported operating system");
    }
}

#[cfg(target_os = "windows")]
fn program_data_dir() -> PathBuf {
    let mut path = PathBuf::from(
        std::env::var("ProgramData").unwrap_or_else(|_| "C:\\ProgramData".to_string()),
    );
    path.push("family-access");
    path
}
