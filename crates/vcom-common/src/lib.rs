pub mod errors;
pub mod hex;

pub use errors::{ConfigError, VcomError};
pub use hex::hex_preview;
