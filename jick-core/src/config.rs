use crate::error::{CoreError, Result};
use jick_scanner::GenerationConfig;
use jick_scanner::config::DEFAULT_CONFIG_TOML;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_CONFIG_PATH: &str = "~/.config/jick/form_parameters.toml";

/// Expands a leading `~` the way the shell would.
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

/// Reads a generation config from disk, or the bundled rules when no path
/// is given.
pub fn load_generation_config(path: Option<&Path>) -> Result<GenerationConfig> {
    let Some(path) = path else {
        return Ok(GenerationConfig::default());
    };
    let expanded = expand_path(&path.to_string_lossy());
    let content = fs::read_to_string(&expanded).map_err(|e| CoreError::file(&expanded, e))?;
    let config = GenerationConfig::from_toml_str(&content)?;
    info!("Loaded generation config from {}", expanded.display());
    Ok(config)
}

/// Writes the bundled rules to `raw_path`, creating parent directories.
/// An existing file is only replaced when `force` is set.
pub fn write_default_config(raw_path: &str, force: bool) -> Result<PathBuf> {
    let path = expand_path(raw_path);
    if path.exists() && !force {
        return Err(CoreError::AlreadyExists(path.display().to_string()));
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| CoreError::file(parent, e))?;
    }
    fs::write(&path, DEFAULT_CONFIG_TOML).map_err(|e| CoreError::file(&path, e))?;
    Ok(path)
}
