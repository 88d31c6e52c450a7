// src/config/loader.rs

use std::path::{Path, PathBuf};

use crate::config::model::ConfigFile;
use crate::config::validate::validate_config;
use crate::errors::Result;

/// Load a configuration file from a given path.
///
/// This only performs TOML deserialization; it does **not** perform
/// semantic validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let config: ConfigFile = toml::from_str(&contents)?;
    Ok(config)
}

/// Load a configuration file and run validation.
///
/// This is the recommended entry point for the rest of the application:
/// reads TOML, applies defaults (via `serde` + `Default` impls), and
/// checks that the glob patterns compile and limits make sense.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let config = load_from_path(&path)?;
    validate_config(&config)?;
    Ok(config)
}

/// Default config path: `Testmux.toml` in the current working directory.
///
/// A missing file is not an error to callers that can fall back to an
/// all-defaults [`ConfigFile`]; the CLI does exactly that.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Testmux.toml")
}
