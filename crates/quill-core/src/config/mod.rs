//! Configuration module
//!
//! YAML configuration for the model provider, the document vault, session storage,
//! action handling and logging.

pub mod loader;
pub mod types;

pub use loader::*;
pub use types::*;

#[cfg(test)]
mod tests;

use crate::errors::QuillError;
use std::path::Path;

/// Load a configuration from a YAML file
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<QuillConfig, QuillError> {
    ConfigLoader::from_file(path).await
}

/// Validate a configuration
pub fn validate_config(config: &QuillConfig) -> Result<(), QuillError> {
    config.validate()
}
