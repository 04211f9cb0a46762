//! Where the config file lives, and seeding it with the commented template.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use vcom_common::ConfigError;

use super::template::default_config_toml;

const APP_DIR: &str = "vcom";
const FILE_NAME: &str = "config.toml";

/// `<config_dir>/vcom/config.toml` (`~/.config/vcom/config.toml` on Linux).
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR).join(FILE_NAME))
        .ok_or_else(|| ConfigError::ParseError("no platform config directory (is HOME set?)".into()))
}

/// Write the commented template to `path`, creating parent directories.
/// A file that already exists is left as it is.
pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| io_error("cannot create", dir, e))?;
    }

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            debug!(path = %path.display(), "config already present, not overwriting");
            return Ok(());
        }
        Err(e) => return Err(io_error("cannot create", path, e)),
    };
    file.write_all(default_config_toml().as_bytes())
        .map_err(|e| io_error("cannot write", path, e))?;

    info!(path = %path.display(), "wrote default config template");
    Ok(())
}

fn io_error(action: &str, path: &Path, err: io::Error) -> ConfigError {
    ConfigError::ParseError(format!("{action} {}: {err}", path.display()))
}
