//! Configuration loading and root folder resolution
//!
//! The root folder holds agora.db and any future on-disk state. Resolution
//! priority order:
//! 1. Command-line argument (highest priority)
//! 2. `AGORA_ROOT` environment variable
//! 3. TOML config file (`root_folder` key)
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Environment variable consulted when no CLI argument is given
pub const ROOT_ENV_VAR: &str = "AGORA_ROOT";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "agora.db";

/// Resolve the root folder from the 4-tier priority order
pub fn resolve_root_folder(cli_arg: Option<&str>) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ROOT_ENV_VAR) {
        return PathBuf::from(path);
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = find_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(root_folder) = config.get("root_folder").and_then(|v| v.as_str()) {
                    return PathBuf::from(root_folder);
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Create the root folder if missing and return the database path inside it
pub fn ensure_root_folder(root: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(root)?;
    Ok(root.join(DATABASE_FILE))
}

/// Locate the platform config file (`<config dir>/agora/config.toml`)
fn find_config_file() -> Result<PathBuf> {
    let user_config = dirs::config_dir()
        .map(|d| d.join("agora").join("config.toml"))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

    if user_config.exists() {
        return Ok(user_config);
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/agora/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

/// OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("agora"))
        .unwrap_or_else(|| PathBuf::from("/var/lib/agora"))
}
