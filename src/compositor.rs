//! Viewport compositor: which chunks are visible, and painting them.
//!
//! This module is the only place that paints stored chunk content onto the
//! live surface. It reads the chunk store and render cache and writes pixels;
//! apart from materializing chunks it touches for the first time, it does not
//! mutate world state.

#[cfg(test)]
#[path = "compositor_test.rs"]
mod compositor_test;

use tracing::trace;

use crate::coords::{ChunkCoord, ChunkGrid, WorldPos};
use crate::raster::RenderCache;
use crate::store::ChunkStore;
use crate::surface::{PixelRect, Surface};

/// Counts from one repaint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepaintStats {
    /// Chunks painted from a cached bitmap.
    pub bitmaps: usize,
    /// Chunks painted by blitting the pixel buffer.
    pub blits: usize,
    /// Chunks skipped because their external image has not arrived.
    pub pending: usize,
}

/// Every chunk overlapping the `width x height` viewport anchored at
/// `position`, in column-major order.
///
/// The far corner is the viewport's last pixel, so a viewport aligned to the
/// grid covers exactly `width / chunk_width` columns and a partially visible
/// chunk at either edge is included.
#[must_use]
pub fn visible_chunks(grid: &ChunkGrid, position: WorldPos, width: u32, height: u32) -> Vec<ChunkCoord> {
    if width == 0 || height == 0 {
        return Vec::new();
    }
    let top_left = grid.world_to_chunk(position);
    let bottom_right = grid.world_to_chunk(position.offset(i64::from(width) - 1, i64::from(height) - 1));

    (top_left.x..=bottom_right.x)
        .flat_map(|x| (top_left.y..=bottom_right.y).map(move |y| ChunkCoord::new(x, y)))
        .collect()
}

/// Paint `coords` onto `surface` for a viewport anchored at `position`.
///
/// A chunk with a bitmap for its current revision takes the fast path: its
/// destination is cleared and the bitmap composited over it, which yields the
/// same pixels as the blit path. Pending chunks are skipped this frame.
pub fn repaint<S: Surface>(
    surface: &mut S,
    store: &mut ChunkStore,
    cache: &RenderCache,
    position: WorldPos,
    coords: &[ChunkCoord],
) -> RepaintStats {
    let grid = store.grid();
    let mut stats = RepaintStats::default();

    for &coord in coords {
        let chunk = store.get_or_create(coord);
        if chunk.resolve(grid) {
            if let Some(pixels) = chunk.shared_pixels() {
                cache.submit(coord, chunk.revision(), pixels);
            }
        }
        let Some(pixels) = chunk.pixels() else {
            trace!(chunk = %coord, "image not ready; skipping this frame");
            stats.pending += 1;
            continue;
        };

        let render = grid.chunk_to_render(coord, position);
        if let Some(bitmap) = cache.get(coord, chunk.revision()) {
            surface.clear_rect(PixelRect::new(render.x, render.y, grid.chunk_width, grid.chunk_height));
            surface.draw_bitmap(bitmap, render.x, render.y);
            stats.bitmaps += 1;
        } else {
            surface.put_pixels(pixels, render.x, render.y);
            stats.blits += 1;
        }
    }

    stats
}
