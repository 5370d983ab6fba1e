//! Chunk store: sparse map from chunk coordinate to chunk content.
//!
//! Chunks are materialized on first access: restored from the attached
//! [`ChunkBacking`] when it has a copy, blank otherwise. There is exactly one
//! entry per coordinate. Without a backing nothing is ever evicted and the map
//! grows with every region visited.
//!
//! Every chunk the store creates, restores, loads or captures is stamped with
//! the next value of one store-wide revision counter. The counter never goes
//! back, so a revision handed out before an eviction is never reused after
//! the chunk is restored.

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use image::RgbaImage;

use tracing::{debug, warn};

use crate::backing::ChunkBacking;
use crate::chunk::{Chunk, normalize};
use crate::coords::{ChunkCoord, ChunkGrid};

/// Outcome of an eviction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Eviction {
    /// Chunks dropped from memory.
    pub evicted: Vec<ChunkCoord>,
    /// Chunks that should have gone but stayed (pending or failed to save).
    pub retained: usize,
}

pub struct ChunkStore {
    grid: ChunkGrid,
    chunks: HashMap<ChunkCoord, Chunk>,
    backing: Option<Box<dyn ChunkBacking>>,
    last_revision: u64,
}

impl ChunkStore {
    #[must_use]
    pub fn new(grid: ChunkGrid) -> Self {
        Self { grid, chunks: HashMap::new(), backing: None, last_revision: 0 }
    }

    /// Attach a persistence collaborator used for restore and eviction.
    pub fn set_backing(&mut self, backing: Box<dyn ChunkBacking>) {
        self.backing = Some(backing);
    }

    #[must_use]
    pub fn has_backing(&self) -> bool {
        self.backing.is_some()
    }

    #[must_use]
    pub fn grid(&self) -> ChunkGrid {
        self.grid
    }

    /// The chunk at `coord`, materializing it if this is the first access.
    pub fn get_or_create(&mut self, coord: ChunkCoord) -> &mut Chunk {
        match self.chunks.entry(coord) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let mut chunk = materialize(self.backing.as_deref(), self.grid, coord);
                chunk.stamp(next_revision(&mut self.last_revision));
                entry.insert(chunk)
            }
        }
    }

    /// Insert or overwrite a chunk directly.
    ///
    /// The chunk gets a fresh revision and is marked dirty, so render cache
    /// entries for any earlier content can never match it.
    pub fn set(&mut self, coord: ChunkCoord, mut chunk: Chunk) {
        chunk.stamp_dirty(next_revision(&mut self.last_revision));
        self.chunks.insert(coord, chunk);
    }

    /// Replace the pixels of the chunk at `coord` with a capture. Returns the
    /// revision the new pixels were stamped with.
    pub(crate) fn replace_pixels(&mut self, coord: ChunkCoord, pixels: Arc<RgbaImage>) -> u64 {
        let revision = next_revision(&mut self.last_revision);
        let grid = self.grid;
        self.chunks.entry(coord).or_insert_with(|| Chunk::blank(grid)).replace_pixels(pixels, revision);
        revision
    }

    #[must_use]
    pub fn get(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.chunks.get(&coord)
    }

    #[must_use]
    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.chunks.contains_key(&coord)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Materialized coordinates, sorted.
    #[must_use]
    pub fn coords(&self) -> Vec<ChunkCoord> {
        let mut coords: Vec<_> = self.chunks.keys().copied().collect();
        coords.sort_unstable();
        coords
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChunkCoord, &Chunk)> {
        self.chunks.iter().map(|(coord, chunk)| (*coord, chunk))
    }

    /// Resolve every pending chunk whose image has arrived.
    ///
    /// Returns the coordinates that changed.
    pub fn resolve_pending(&mut self) -> Vec<ChunkCoord> {
        let grid = self.grid;
        self.chunks
            .iter_mut()
            .filter_map(|(coord, chunk)| chunk.resolve(grid).then_some(*coord))
            .collect()
    }

    /// Move every chunk for which `keep` is false into the backing.
    ///
    /// Clean chunks are identical to their backing copy (or blank) and are
    /// dropped without a write. Pending chunks and chunks whose save fails
    /// stay resident. Without a backing nothing is evicted.
    ///
    /// The revision counter is untouched, so restored chunks always come back
    /// at a revision newer than anything handed out before.
    pub fn evict(&mut self, keep: impl Fn(ChunkCoord) -> bool) -> Eviction {
        let mut eviction = Eviction::default();
        let Some(backing) = self.backing.as_mut() else {
            return eviction;
        };

        let candidates: Vec<ChunkCoord> = self.chunks.keys().copied().filter(|c| !keep(*c)).collect();
        for coord in candidates {
            let Some(chunk) = self.chunks.get(&coord) else {
                continue;
            };
            let Some(pixels) = chunk.pixels() else {
                eviction.retained += 1;
                continue;
            };
            if chunk.is_dirty() {
                if let Err(e) = backing.save(coord, pixels) {
                    warn!(chunk = %coord, error = %e, "failed to persist chunk; keeping it resident");
                    eviction.retained += 1;
                    continue;
                }
            }
            self.chunks.remove(&coord);
            eviction.evicted.push(coord);
        }
        eviction.evicted.sort_unstable();
        eviction
    }
}

fn next_revision(last: &mut u64) -> u64 {
    *last += 1;
    *last
}

fn materialize(backing: Option<&dyn ChunkBacking>, grid: ChunkGrid, coord: ChunkCoord) -> Chunk {
    let Some(backing) = backing else {
        return Chunk::blank(grid);
    };
    match backing.load(coord) {
        Ok(Some(pixels)) => {
            debug!(chunk = %coord, "restored chunk from backing");
            Chunk::from_pixels(normalize(pixels, grid))
        }
        Ok(None) => Chunk::blank(grid),
        Err(e) => {
            warn!(chunk = %coord, error = %e, "failed to restore chunk; starting blank");
            Chunk::blank(grid)
        }
    }
}
