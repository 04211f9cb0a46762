use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Top-level error surfaced by the `vcom` binary.
///
/// Every variant except `DeviceLost` is a setup failure; `DeviceLost` is
/// raised after a clean teardown when the local pseudo-device died while
/// the tunnel was running.
#[derive(Debug, thiserror::Error)]
pub enum VcomError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("device error: {0}")]
    Device(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("setup error: {0}")]
    Setup(String),

    #[error("pseudo-device became unreadable; tunnel stopped")]
    DeviceLost,
}
