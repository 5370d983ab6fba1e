//! Coordinate spaces and the chunk grid.
//!
//! Three spaces are involved:
//! - [`WorldPos`]: absolute pixel position on the infinite plane.
//! - [`ChunkCoord`]: integer cell of the chunk grid.
//! - [`RenderPos`]: pixel position relative to the viewport's top-left corner.
//!
//! [`ChunkGrid`] converts between them. All conversions are pure; the only
//! state is the chunk size. A chunk coordinate doubles as the chunk key: its
//! `Display` form (`"cx, cy"`) is the wire format and `FromStr` is the strict
//! inverse.

#[cfg(test)]
#[path = "coords_test.rs"]
mod coords_test;

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::consts::KEY_SEPARATOR;

/// A point in world pixel space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldPos {
    pub x: i64,
    pub y: i64,
}

impl WorldPos {
    #[must_use]
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Translate by a delta.
    #[must_use]
    pub const fn offset(self, dx: i64, dy: i64) -> Self {
        Self { x: self.x + dx, y: self.y + dy }
    }
}

/// A point in viewport pixel space. May be negative or beyond the viewport
/// when a chunk straddles an edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RenderPos {
    pub x: i64,
    pub y: i64,
}

impl RenderPos {
    #[must_use]
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// Grid address of a chunk.
///
/// Ordered by `x` then `y` so snapshots iterate deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    pub x: i64,
    pub y: i64,
}

impl ChunkCoord {
    #[must_use]
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

// =============================================================
// Chunk keys
// =============================================================

/// Error returned when a chunk key does not parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("empty chunk key")]
    Empty,
    #[error("chunk key `{0}` is missing the `, ` separator")]
    MissingSeparator(String),
    #[error("chunk key `{0}` has more than two components")]
    ExtraComponent(String),
    #[error("chunk key component `{component}` is not an integer: {source}")]
    InvalidComponent {
        component: String,
        #[source]
        source: ParseIntError,
    },
    #[error("chunk key `{0}` is not in canonical form")]
    NonCanonical(String),
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{KEY_SEPARATOR}{}", self.x, self.y)
    }
}

impl FromStr for ChunkCoord {
    type Err = KeyError;

    /// Parse a `"cx, cy"` key. Only the exact form produced by `Display` is
    /// accepted, so `"+1, 2"`, `"01, 2"` and `"-0, 0"` are rejected.
    fn from_str(key: &str) -> Result<Self, Self::Err> {
        if key.is_empty() {
            return Err(KeyError::Empty);
        }
        let Some((raw_x, raw_y)) = key.split_once(KEY_SEPARATOR) else {
            return Err(KeyError::MissingSeparator(key.to_owned()));
        };
        if raw_y.contains(KEY_SEPARATOR) {
            return Err(KeyError::ExtraComponent(key.to_owned()));
        }

        let coord = Self::new(parse_component(raw_x)?, parse_component(raw_y)?);
        if coord.to_string() != key {
            return Err(KeyError::NonCanonical(key.to_owned()));
        }
        Ok(coord)
    }
}

fn parse_component(raw: &str) -> Result<i64, KeyError> {
    raw.parse::<i64>()
        .map_err(|source| KeyError::InvalidComponent { component: raw.to_owned(), source })
}

impl Serialize for ChunkCoord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ChunkCoord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let key = String::deserialize(deserializer)?;
        key.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================
// Grid
// =============================================================

/// Fixed-size chunk grid over world space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkGrid {
    pub chunk_width: u32,
    pub chunk_height: u32,
}

impl ChunkGrid {
    #[must_use]
    pub const fn new(chunk_width: u32, chunk_height: u32) -> Self {
        Self { chunk_width, chunk_height }
    }

    /// The chunk containing a world position.
    ///
    /// Floor division, so `-1` lands in chunk `-1` rather than chunk `0`.
    #[must_use]
    pub fn world_to_chunk(&self, pos: WorldPos) -> ChunkCoord {
        ChunkCoord {
            x: pos.x.div_euclid(i64::from(self.chunk_width)),
            y: pos.y.div_euclid(i64::from(self.chunk_height)),
        }
    }

    /// World position of a chunk's top-left corner.
    #[must_use]
    pub fn chunk_to_world(&self, coord: ChunkCoord) -> WorldPos {
        WorldPos {
            x: coord.x * i64::from(self.chunk_width),
            y: coord.y * i64::from(self.chunk_height),
        }
    }

    /// Where a chunk's top-left corner lands in the viewport when the
    /// viewport's top-left corner sits at `position`.
    #[must_use]
    pub fn chunk_to_render(&self, coord: ChunkCoord, position: WorldPos) -> RenderPos {
        let origin = self.chunk_to_world(coord);
        RenderPos { x: origin.x - position.x, y: origin.y - position.y }
    }
}
