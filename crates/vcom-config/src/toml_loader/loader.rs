//! Reading a config file: parse, fill defaults, validate.

use std::io;
use std::path::Path;

use tracing::{debug, info};
use vcom_common::ConfigError;

use super::paths::{create_default_config, default_config_path};
use crate::schema::TunnelConfig;
use crate::validation;

/// Load and validate the TOML file at `path`.
///
/// Missing keys take their defaults; a file whose values fail validation is
/// rejected as a whole.
pub fn load_from_path(path: &Path) -> Result<TunnelConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ConfigError::FileNotFound(path.to_path_buf()),
        _ => ConfigError::ParseError(format!("cannot read {}: {e}", path.display())),
    })?;

    let config: TunnelConfig = toml::from_str(&content)
        .map_err(|e| ConfigError::ParseError(format!("{}: {e}", path.display())))?;
    validation::validate(&config)?;

    info!(path = %path.display(), remote = %config.remote.endpoint(), "config loaded");
    Ok(config)
}

/// Load from [`default_config_path`]. On first run the template is written
/// there and the built-in defaults are returned.
pub fn load_default() -> Result<TunnelConfig, ConfigError> {
    let path = default_config_path()?;

    load_from_path(&path).or_else(|err| match err {
        ConfigError::FileNotFound(_) => {
            debug!(path = %path.display(), "no config file yet");
            create_default_config(&path)?;
            Ok(TunnelConfig::default())
        }
        other => Err(other),
    })
}
