//! Tunnel configuration.
//!
//! TOML-based configuration with serde defaults, serial-parameter
//! normalization and validation. Partial files work out of the box; the
//! command line layers its overrides on top of whatever is loaded here.

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{
    BaudRate, DataBits, Parity, SerialConfig, SerialSettings, StopBits, TunnelConfig,
    DEFAULT_DEVICE_PATH,
};

use std::path::Path;

use vcom_common::ConfigError;

/// Load config from `path`, or from the platform default location when `None`.
///
/// An explicit path must exist; the default location is created on first use.
pub fn load_config(path: Option<&Path>) -> Result<TunnelConfig, ConfigError> {
    match path {
        Some(path) => toml_loader::load_from_path(path),
        None => toml_loader::load_default(),
    }
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &TunnelConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_to_json_contains_all_sections() {
        let json = config_to_json(&TunnelConfig::default());
        assert!(json.contains("\"device\""));
        assert!(json.contains("\"serial\""));
        assert!(json.contains("\"remote\""));
        assert!(json.contains("\"logging\""));
        assert!(json.contains("\"/tmp/vcom0\""));
    }

    #[test]
    fn default_config_round_trips_through_json() {
        let json = config_to_json(&TunnelConfig::default());
        let parsed: TunnelConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.remote.port, 8080);
        assert_eq!(parsed.serial.parity, "none");
    }

    #[test]
    fn load_config_with_explicit_missing_path_fails() {
        let result = load_config(Some(Path::new("/tmp/definitely_missing_vcom.toml")));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn load_config_with_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[logging]\ndebug = true\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert!(config.logging.debug);
    }
}
