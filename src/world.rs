//! World: the infinite surface as the caller sees it.
//!
//! DESIGN
//! ======
//! A [`World`] binds a caller-owned [`Surface`] (the viewport) to a chunk
//! store, a render cache and a position in world space. The caller draws on
//! the surface directly, calls [`World::update_chunks`] to persist what is on
//! screen, then pans with [`World::move_by`] / [`World::move_to`]; visible
//! chunks are repainted at their new render positions.
//!
//! The World is driven through `&mut self` and holds no locks. Background
//! rasterization results arrive over a channel and are drained before every
//! repaint and capture.
//!
//! ERROR HANDLING
//! ==============
//! Only [`World::load_chunk`] can fail (malformed key, undecodable image).
//! Painting an unready chunk, missing bitmaps and degenerate capture overlap
//! are normal conditions. No error leaves the World unusable.

#[cfg(test)]
#[path = "world_test.rs"]
mod world_test;

use std::collections::BTreeMap;

use image::RgbaImage;
use tracing::{debug, info};

use crate::backing::ChunkBacking;
use crate::capture::{CaptureReport, capture_viewport};
use crate::chunk::{Chunk, ChunkError, ChunkSource};
use crate::compositor::{RepaintStats, repaint, visible_chunks};
use crate::config::WorldConfig;
use crate::coords::{ChunkCoord, ChunkGrid, WorldPos};
use crate::raster::{RasterMode, RenderCache};
use crate::store::ChunkStore;
use crate::surface::Surface;

/// Whether a move repaints the viewport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Render {
    /// Repaint visible chunks immediately.
    #[default]
    Now,
    /// Only move; the caller repaints later (e.g. with [`World::refresh`]).
    Deferred,
}

pub struct World<S: Surface> {
    surface: S,
    config: WorldConfig,
    grid: ChunkGrid,
    position: WorldPos,
    store: ChunkStore,
    cache: RenderCache,
}

impl<S: Surface> World<S> {
    /// Bind a World to `surface`, positioned at the world origin.
    #[must_use]
    pub fn new(surface: S, config: WorldConfig) -> Self {
        let grid = config.grid();
        info!(
            chunk_width = grid.chunk_width,
            chunk_height = grid.chunk_height,
            viewport_width = surface.width(),
            viewport_height = surface.height(),
            "world initialized"
        );
        Self {
            surface,
            config,
            grid,
            position: WorldPos::default(),
            store: ChunkStore::new(grid),
            cache: RenderCache::new(RasterMode::default()),
        }
    }

    #[must_use]
    pub fn with_defaults(surface: S) -> Self {
        Self::new(surface, WorldConfig::default())
    }

    /// Replace the render-cache mode. Bitmaps already cached are discarded.
    #[must_use]
    pub fn with_raster_mode(mut self, mode: RasterMode) -> Self {
        self.cache = RenderCache::new(mode);
        self
    }

    /// Attach a backing used to restore chunks and to hold evicted ones.
    #[must_use]
    pub fn with_backing(mut self, backing: impl ChunkBacking + 'static) -> Self {
        self.store.set_backing(Box::new(backing));
        self
    }

    // =========================================================
    // Accessors
    // =========================================================

    #[must_use]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// The live surface; draw through this, then call [`World::update_chunks`].
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    #[must_use]
    pub fn into_surface(self) -> S {
        self.surface
    }

    #[must_use]
    pub fn position(&self) -> WorldPos {
        self.position
    }

    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    #[must_use]
    pub fn grid(&self) -> ChunkGrid {
        self.grid
    }

    #[must_use]
    pub fn visible_chunks(&self) -> Vec<ChunkCoord> {
        visible_chunks(&self.grid, self.position, self.surface.width(), self.surface.height())
    }

    /// The resident chunk at `coord`, if any. Never materializes.
    #[must_use]
    pub fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.store.get(coord)
    }

    /// Whether a bitmap for the chunk's current content is installed.
    #[must_use]
    pub fn has_cached_bitmap(&self, coord: ChunkCoord) -> bool {
        self.store.get(coord).is_some_and(|chunk| self.cache.get(coord, chunk.revision()).is_some())
    }

    // =========================================================
    // Movement
    // =========================================================

    pub fn move_by(&mut self, dx: i64, dy: i64, render: Render) {
        self.move_to(self.position.x + dx, self.position.y + dy, render);
    }

    pub fn move_to(&mut self, x: i64, y: i64, render: Render) {
        self.position = WorldPos::new(x, y);
        debug!(x, y, ?render, "moved");
        if render == Render::Now {
            self.repaint_visible();
        }
        self.evict_distant();
    }

    // =========================================================
    // Chunk operations
    // =========================================================

    /// Capture the current viewport into the chunks it overlaps.
    pub fn update_chunks(&mut self) -> CaptureReport {
        self.pump_render_cache();
        capture_viewport(&self.surface, &mut self.store, &mut self.cache, self.position)
    }

    /// Clear the surface and repaint every visible chunk.
    pub fn refresh(&mut self) -> RepaintStats {
        self.surface.clear();
        self.repaint_visible()
    }

    /// Every resident, resolved chunk keyed by its wire key.
    ///
    /// Pending chunks whose image has arrived are resolved first; those still
    /// waiting are left out. With eviction on, chunks moved out by
    /// [`World::evict_distant`] live only in the backing and are not listed;
    /// use [`ChunkBacking::coords`] for those.
    pub fn all_chunks(&mut self) -> BTreeMap<String, &RgbaImage> {
        for coord in self.store.resolve_pending() {
            self.queue_raster(coord);
        }
        self.store
            .iter()
            .filter_map(|(coord, chunk)| chunk.pixels().map(|pixels| (coord.to_string(), pixels)))
            .collect()
    }

    /// Install externally supplied content for the chunk named by `key`, then
    /// refresh the viewport.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkError::Key`] for a malformed key and
    /// [`ChunkError::Decode`] for encoded bytes that are not an image. The
    /// World is unchanged on error.
    pub fn load_chunk(&mut self, key: &str, source: ChunkSource) -> Result<(), ChunkError> {
        let coord: ChunkCoord = key.parse()?;
        let chunk = Chunk::from_source(source, self.grid)?;
        self.store.set(coord, chunk);
        self.cache.invalidate(coord);
        self.queue_raster(coord);
        debug!(chunk = %coord, "loaded chunk");
        self.refresh();
        Ok(())
    }

    /// Install finished rasterizations. Returns how many were installed.
    pub fn pump_render_cache(&mut self) -> usize {
        self.cache.drain(&self.store)
    }

    /// Move resident chunks farther than the retain radius from the viewport
    /// into the backing. Returns how many were evicted.
    ///
    /// Does nothing without both a retain radius and a backing.
    pub fn evict_distant(&mut self) -> usize {
        let Some(radius) = self.config.retain_radius else {
            return 0;
        };
        if !self.store.has_backing() {
            return 0;
        }

        let (width, height) = (i64::from(self.surface.width()), i64::from(self.surface.height()));
        let radius = i64::from(radius);
        let near = self.grid.world_to_chunk(self.position);
        let far = self.grid.world_to_chunk(self.position.offset((width - 1).max(0), (height - 1).max(0)));
        let keep = |coord: ChunkCoord| {
            (near.x - radius..=far.x + radius).contains(&coord.x) && (near.y - radius..=far.y + radius).contains(&coord.y)
        };

        let eviction = self.store.evict(keep);
        for coord in &eviction.evicted {
            self.cache.invalidate(*coord);
        }
        if !eviction.evicted.is_empty() {
            debug!(evicted = eviction.evicted.len(), retained = eviction.retained, "evicted distant chunks");
        }
        eviction.evicted.len()
    }

    fn queue_raster(&self, coord: ChunkCoord) {
        let Some(chunk) = self.store.get(coord) else {
            return;
        };
        if let Some(pixels) = chunk.shared_pixels() {
            self.cache.submit(coord, chunk.revision(), pixels);
        }
    }

    fn repaint_visible(&mut self) -> RepaintStats {
        self.pump_render_cache();
        let coords = self.visible_chunks();
        let stats = repaint(&mut self.surface, &mut self.store, &self.cache, self.position, &coords);
        debug!(bitmaps = stats.bitmaps, blits = stats.blits, pending = stats.pending, "repainted viewport");
        stats
    }
}
