//! Chunk backings: where chunks go when they leave memory.
//!
//! DESIGN
//! ======
//! A backing is the persistence collaborator behind the chunk store. The store
//! asks it for a chunk before materializing a blank one and hands chunks to it
//! on eviction. Two implementations ship with the crate: [`MemoryBacking`] for
//! tests and embedding, and [`DirectoryBacking`], which keeps one PNG per chunk
//! named by its key (`"-3, 12.png"`).
//!
//! ERROR HANDLING
//! ==============
//! A missing chunk is `Ok(None)`, not an error. I/O and codec failures are
//! returned to the caller, which decides whether the chunk stays resident.

#[cfg(test)]
#[path = "backing_test.rs"]
mod backing_test;

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use image::RgbaImage;
use tracing::debug;

use crate::chunk::{ChunkError, decode_chunk, encode_png};
use crate::consts::CHUNK_FILE_EXTENSION;
use crate::coords::ChunkCoord;

#[derive(Debug, thiserror::Error)]
pub enum BackingError {
    #[error("chunk backing I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Chunk(#[from] ChunkError),
}

/// Persistence collaborator for chunk pixels.
pub trait ChunkBacking {
    /// Fetch a previously saved chunk.
    ///
    /// # Errors
    ///
    /// Returns an error if the chunk exists but cannot be read.
    fn load(&self, coord: ChunkCoord) -> Result<Option<RgbaImage>, BackingError>;

    /// Save a chunk, replacing any previous copy.
    ///
    /// # Errors
    ///
    /// Returns an error if the chunk cannot be written.
    fn save(&mut self, coord: ChunkCoord, pixels: &RgbaImage) -> Result<(), BackingError>;

    /// Every chunk coordinate currently saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing cannot be enumerated.
    fn coords(&self) -> Result<Vec<ChunkCoord>, BackingError>;
}

// =============================================================
// Memory
// =============================================================

/// Keeps saved chunks in a map.
#[derive(Debug, Clone, Default)]
pub struct MemoryBacking {
    chunks: HashMap<ChunkCoord, RgbaImage>,
}

impl MemoryBacking {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

impl ChunkBacking for MemoryBacking {
    fn load(&self, coord: ChunkCoord) -> Result<Option<RgbaImage>, BackingError> {
        Ok(self.chunks.get(&coord).cloned())
    }

    fn save(&mut self, coord: ChunkCoord, pixels: &RgbaImage) -> Result<(), BackingError> {
        self.chunks.insert(coord, pixels.clone());
        Ok(())
    }

    fn coords(&self) -> Result<Vec<ChunkCoord>, BackingError> {
        let mut coords: Vec<_> = self.chunks.keys().copied().collect();
        coords.sort_unstable();
        Ok(coords)
    }
}

// =============================================================
// Directory
// =============================================================

/// One PNG file per chunk inside a directory.
#[derive(Debug, Clone)]
pub struct DirectoryBacking {
    root: PathBuf,
}

impl DirectoryBacking {
    /// Use `root` as the chunk directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, BackingError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file holding `coord`.
    #[must_use]
    pub fn path_for(&self, coord: ChunkCoord) -> PathBuf {
        self.root.join(format!("{coord}.{CHUNK_FILE_EXTENSION}"))
    }
}

impl ChunkBacking for DirectoryBacking {
    fn load(&self, coord: ChunkCoord) -> Result<Option<RgbaImage>, BackingError> {
        let path = self.path_for(coord);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(decode_chunk(&bytes)?))
    }

    fn save(&mut self, coord: ChunkCoord, pixels: &RgbaImage) -> Result<(), BackingError> {
        let bytes = encode_png(pixels)?;
        fs::write(self.path_for(coord), bytes)?;
        Ok(())
    }

    fn coords(&self) -> Result<Vec<ChunkCoord>, BackingError> {
        let mut coords = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().is_none_or(|ext| ext != CHUNK_FILE_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match stem.parse::<ChunkCoord>() {
                Ok(coord) => coords.push(coord),
                Err(e) => debug!(path = %path.display(), error = %e, "skipping file that is not a chunk"),
            }
        }
        coords.sort_unstable();
        Ok(coords)
    }
}
