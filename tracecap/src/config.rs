//! Capture configuration
//!
//! Loaded from a JSON file; every key is optional.
//!
//! ```json
//! {
//!   "ring_capacity": 1048576,
//!   "archive": { "backing": "mapped" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::archive::ArchiveOptions;
use crate::domain::ConfigError;
use crate::ring::DEFAULT_RING_CAPACITY;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptureConfig {
    /// Bytes of event stream buffered between the producer and the file
    pub ring_capacity: usize,
    /// How the resource archive opens its files
    pub archive: ArchiveOptions,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            ring_capacity: DEFAULT_RING_CAPACITY,
            archive: ArchiveOptions::default(),
        }
    }
}

impl CaptureConfig {
    /// Load and validate a JSON config file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is not valid JSON for this
    /// struct, or holds an out-of-range value
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Parse and validate a JSON config document
    ///
    /// # Errors
    /// Returns an error if the document does not parse or fails validation
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns an error naming the first invalid value
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ring_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "ring_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
