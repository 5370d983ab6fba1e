//! World configuration, from defaults or environment variables.
//!
//! Every field has a default, so a missing variable is never an error. A
//! variable that is present but malformed is, since silently falling back
//! would paint a grid the user did not ask for.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::env::VarError;

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_CHUNK_HEIGHT, DEFAULT_CHUNK_WIDTH, ENV_CHUNK_HEIGHT, ENV_CHUNK_WIDTH, ENV_RETAIN_RADIUS};
use crate::coords::ChunkGrid;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be greater than zero")]
    ZeroDimension { var: &'static str },
    #[error("{var}: cannot parse {value:?} as an unsigned integer")]
    Parse { var: &'static str, value: String },
    #[error("{var} is not valid unicode")]
    NotUnicode { var: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub chunk_width: u32,
    pub chunk_height: u32,
    /// Chunks farther than this many chunks from the viewport are moved into
    /// the backing. `None` keeps everything resident.
    pub retain_radius: Option<u32>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self { chunk_width: DEFAULT_CHUNK_WIDTH, chunk_height: DEFAULT_CHUNK_HEIGHT, retain_radius: None }
    }
}

impl WorldConfig {
    #[must_use]
    pub fn grid(&self) -> ChunkGrid {
        ChunkGrid::new(self.chunk_width, self.chunk_height)
    }

    /// Build config from environment variables.
    ///
    /// Optional:
    /// - `INFINITY_CHUNK_WIDTH`: default 500
    /// - `INFINITY_CHUNK_HEIGHT`: default 500
    /// - `INFINITY_RETAIN_RADIUS`: unset disables eviction
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set but not a positive integer.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key))
    }

    /// Same as [`WorldConfig::from_env`] with a caller-supplied variable source.
    ///
    /// # Errors
    ///
    /// See [`WorldConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Result<String, VarError>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let chunk_width = env_parse(&lookup, ENV_CHUNK_WIDTH)?.unwrap_or(defaults.chunk_width);
        let chunk_height = env_parse(&lookup, ENV_CHUNK_HEIGHT)?.unwrap_or(defaults.chunk_height);
        let retain_radius = env_parse(&lookup, ENV_RETAIN_RADIUS)?;

        if chunk_width == 0 {
            return Err(ConfigError::ZeroDimension { var: ENV_CHUNK_WIDTH });
        }
        if chunk_height == 0 {
            return Err(ConfigError::ZeroDimension { var: ENV_CHUNK_HEIGHT });
        }

        Ok(Self { chunk_width, chunk_height, retain_radius })
    }
}

fn env_parse(lookup: &impl Fn(&str) -> Result<String, VarError>, var: &'static str) -> Result<Option<u32>, ConfigError> {
    match lookup(var) {
        Ok(value) => match value.trim().parse::<u32>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(ConfigError::Parse { var, value }),
        },
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => Err(ConfigError::NotUnicode { var }),
    }
}
