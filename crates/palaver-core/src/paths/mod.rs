//! Path utilities for palaver data directories.
//!
//! - Application data root (settings file)
//! - App-private artifact directory for synthesized speech
//!
//! Returns `PathBuf` and [`PathError`]; no interactive I/O.

mod error;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub use error::PathError;

/// Environment variable overriding the data root.
pub const DATA_DIR_ENV: &str = "PALAVER_DATA_DIR";

/// File name of the persisted settings inside the data root.
pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Sub-directory of the data root holding synthesized speech artifacts.
pub const ARTIFACT_DIR_NAME: &str = "speech";

/// Get the root directory for application data.
///
/// Resolution order:
/// 1. `PALAVER_DATA_DIR` environment variable
/// 2. System data directory (e.g., `~/.local/share/palaver`)
pub fn data_root() -> Result<PathBuf, PathError> {
    if let Ok(path) = env::var(DATA_DIR_ENV) {
        return Ok(PathBuf::from(path));
    }

    let data_dir = dirs::data_local_dir().ok_or(PathError::NoDataDir)?;
    Ok(data_dir.join("palaver"))
}

/// Ensure the provided directory exists, creating it (and parents) if missing.
pub fn ensure_directory(path: &Path) -> Result<(), PathError> {
    if path.exists() {
        if !path.is_dir() {
            return Err(PathError::NotADirectory(path.to_path_buf()));
        }
        return Ok(());
    }

    fs::create_dir_all(path).map_err(|e| PathError::CreateFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
