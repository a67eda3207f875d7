mod config;

pub use config::{AlertSection, Config, EngineSection};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/stepalarm[-dev]/` based on STEPALARM_ENV.
///
/// Set STEPALARM_ENV=dev to use the development directory, or
/// STEPALARM_CONFIG_DIR to use an explicit one.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = resolve_dir(
        dirs::home_dir(),
        std::env::var("STEPALARM_ENV").ok(),
        std::env::var_os("STEPALARM_CONFIG_DIR").map(PathBuf::from),
    );
    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DirectoryUnavailable(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}

fn resolve_dir(home: Option<PathBuf>, env: Option<String>, explicit: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = explicit.filter(|d| !d.as_os_str().is_empty()) {
        return dir;
    }
    let base_dir = home.unwrap_or_else(|| PathBuf::from(".")).join(".config");
    if env.as_deref() == Some("dev") {
        base_dir.join("stepalarm-dev")
    } else {
        base_dir.join("stepalarm")
    }
}
