//! Top-level configuration, loaded from TOML.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Error;
use crate::general::General;
use crate::read_only::ReadOnly;
use crate::scroll::Scroll;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: General,

    #[serde(default)]
    pub read_only: ReadOnly,

    #[serde(default)]
    pub scroll: Scroll,
}

impl Config {
    /// Load the configuration file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let config = Self::from_str(&fs::read_to_string(path)?)?;
        debug!("loaded config from \"{}\"", path.display());

        Ok(config)
    }

    pub fn from_str(source: &str) -> Result<Self, Error> {
        Ok(toml::from_str(source)?)
    }
}
