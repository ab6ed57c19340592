//! Backlog file resolution

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable overriding the backlog file location
pub const TODO_FILE_ENV: &str = "LCSC_TODO_FILE";

/// Conventional backlog file name inside a data directory
pub const DEFAULT_TODO_NAME: &str = "todo.sqlite";

/// Resolve the backlog file path, in priority order:
/// 1. Command-line argument (highest priority)
/// 2. `LCSC_TODO_FILE` environment variable
/// 3. `todo_file` key in the TOML config file
/// 4. `./todo.sqlite` (fallback)
///
/// A directory at any level resolves to `todo.sqlite` inside it.
/// Existence is checked when the backlog is opened, not here.
pub fn resolve_todo_file(cli_arg: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = cli_arg {
        return Ok(dir_to_todo_file(path));
    }

    if let Ok(path) = std::env::var(TODO_FILE_ENV) {
        return Ok(dir_to_todo_file(Path::new(&path)));
    }

    if let Ok(config_path) = find_config_file() {
        let toml_content = std::fs::read_to_string(&config_path)?;
        let config: toml::Value = toml::from_str(&toml_content)
            .map_err(|e| Error::Config(format!("Invalid config file {}: {}", config_path.display(), e)))?;
        if let Some(todo_file) = config.get("todo_file").and_then(|v| v.as_str()) {
            return Ok(dir_to_todo_file(Path::new(todo_file)));
        }
    }

    Ok(PathBuf::from(DEFAULT_TODO_NAME))
}

/// A directory input resolves to the conventional file name inside it
pub fn dir_to_todo_file(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(DEFAULT_TODO_NAME)
    } else {
        path.to_path_buf()
    }
}

/// Locate the platform config file (`<config dir>/lcsc/config.toml`)
fn find_config_file() -> Result<PathBuf> {
    let path = dirs::config_dir()
        .map(|d| d.join("lcsc").join("config.toml"))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;
    if path.exists() {
        Ok(path)
    } else {
        Err(Error::Config(format!("Config file not found: {}", path.display())))
    }
}
