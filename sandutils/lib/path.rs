//! `sandutils::path` is a module containing path utilities for the sandcore project.

use std::{env, path::PathBuf};

use crate::{SandutilsError, SandutilsResult};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The environment variable that overrides the sandcore home directory.
pub const SANDCORE_HOME_ENV_VAR: &str = "SANDCORE_HOME";

/// The sub directory of the user's home where sandcore state is kept by default.
pub const SANDCORE_HOME_DIR: &str = ".sandcore";

/// The filename of the sandbox database.
pub const SANDBOX_DB_FILENAME: &str = "sandbox.db";

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Resolves the sandcore home directory.
///
/// Uses `$SANDCORE_HOME` when it is set and non-empty, otherwise `~/.sandcore`.
pub fn resolve_home_path() -> SandutilsResult<PathBuf> {
    match env::var(SANDCORE_HOME_ENV_VAR) {
        Ok(path) if !path.trim().is_empty() => Ok(PathBuf::from(path)),
        _ => dirs::home_dir()
            .map(|home| home.join(SANDCORE_HOME_DIR))
            .ok_or(SandutilsError::HomeDirNotFound),
    }
}

/// Resolves a path given in configuration against the sandcore home directory.
///
/// Absolute paths are returned unchanged. Relative paths are joined onto the home directory.
pub fn resolve_in_home(path: impl Into<PathBuf>) -> SandutilsResult<PathBuf> {
    let path = path.into();
    if path.as_os_str().is_empty() {
        return Err(SandutilsError::PathValidation(
            "Path cannot be empty".to_string(),
        ));
    }

    if path.is_absolute() {
        return Ok(path);
    }

    Ok(resolve_home_path()?.join(path))
}

/// Returns the default location of the sandbox database.
pub fn default_db_path() -> SandutilsResult<PathBuf> {
    Ok(resolve_home_path()?.join(SANDBOX_DB_FILENAME))
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
