//! Full configuration validation.
//!
//! Checks the device path, the remote endpoint and the reconnect policy, and
//! collects every problem into a single `ConfigError`. Serial parameters are
//! not validated here: unsupported values fall back when normalized.

mod helpers;


use crate::schema::TunnelConfig;
use vcom_common::ConfigError;

use helpers::{validate_non_empty, validate_range};

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &TunnelConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_device(&mut errors, config);
    validate_remote(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

fn validate_device(errors: &mut Vec<String>, config: &TunnelConfig) {
    validate_non_empty(
        errors,
        "device.path",
        &config.device.path.to_string_lossy(),
    );
}

fn validate_remote(errors: &mut Vec<String>, config: &TunnelConfig) {
    validate_non_empty(errors, "remote.host", &config.remote.host);
    validate_range(errors, "remote.port", config.remote.port.into(), 1, 65535);
    validate_range(
        errors,
        "remote.max_reconnect_attempts",
        config.remote.max_reconnect_attempts.into(),
        1,
        100,
    );
    validate_range(
        errors,
        "remote.reconnect_backoff_secs",
        config.remote.reconnect_backoff_secs,
        0,
        3600,
    );
}
