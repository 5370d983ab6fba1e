//! Capture engine: persisting what is on the live surface into chunks.
//!
//! DESIGN
//! ======
//! For every visible chunk the overlap between the chunk and the viewport is
//! computed in viewport space ([`plan`]). The chunk's stored content is copied
//! into a chunk-sized scratch buffer, the overlap rectangle is cleared, and the
//! viewport pixels are copied in. The scratch buffer then replaces the stored
//! chunk wholesale.
//!
//! Clearing before the copy matters: copying translucent pixels over their own
//! previous capture would blend them again and anti-aliased edges would
//! thicken with every capture. With the clear, capturing unchanged content
//! twice stores bit-identical chunks.

#[cfg(test)]
#[path = "capture_test.rs"]
mod capture_test;

use std::sync::Arc;

use image::{RgbaImage, imageops};
use tracing::{debug, trace};

use crate::coords::{ChunkCoord, ChunkGrid, WorldPos};
use crate::compositor::visible_chunks;
use crate::raster::RenderCache;
use crate::store::ChunkStore;
use crate::surface::{PixelRect, Surface};

/// Where one chunk overlaps the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRegion {
    pub coord: ChunkCoord,
    /// Overlap rectangle in viewport space.
    pub source: PixelRect,
    /// Top-left of the overlap inside the chunk.
    pub put_x: u32,
    pub put_y: u32,
}

/// Outcome of one capture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureReport {
    /// Chunks whose content was replaced.
    pub written: Vec<ChunkCoord>,
    /// Visible chunks with no actual overlap.
    pub skipped: usize,
}

/// Overlap of chunk `coord` with a `viewport_width x viewport_height`
/// viewport anchored at `position`, or `None` if there is none.
///
/// The offset inside the chunk is the distance from the chunk's render origin
/// to the clamped source origin. For a chunk hanging off the leading edge that
/// is `chunk_size - extent`, so trailing content lands at the chunk's trailing
/// edge; it stays correct when a chunk is wider than the viewport and hangs
/// off both edges.
#[must_use]
pub fn plan(
    grid: &ChunkGrid,
    position: WorldPos,
    viewport_width: u32,
    viewport_height: u32,
    coord: ChunkCoord,
) -> Option<CaptureRegion> {
    let render = grid.chunk_to_render(coord, position);
    let source_x = render.x.max(0);
    let source_y = render.y.max(0);
    let width = (render.x + i64::from(grid.chunk_width)).min(i64::from(viewport_width)) - source_x;
    let height = (render.y + i64::from(grid.chunk_height)).min(i64::from(viewport_height)) - source_y;
    if width <= 0 || height <= 0 {
        return None;
    }

    let (Ok(width), Ok(height), Ok(put_x), Ok(put_y)) = (
        u32::try_from(width),
        u32::try_from(height),
        u32::try_from(source_x - render.x),
        u32::try_from(source_y - render.y),
    ) else {
        return None;
    };

    Some(CaptureRegion { coord, source: PixelRect::new(source_x, source_y, width, height), put_x, put_y })
}

/// Capture every visible chunk from `surface` into `store`.
///
/// Each written chunk gets a new revision, loses its cached bitmap, and is
/// queued for rasterization.
pub fn capture_viewport<S: Surface>(
    surface: &S,
    store: &mut ChunkStore,
    cache: &mut RenderCache,
    position: WorldPos,
) -> CaptureReport {
    let grid = store.grid();
    let (viewport_width, viewport_height) = (surface.width(), surface.height());
    let mut report = CaptureReport::default();

    for coord in visible_chunks(&grid, position, viewport_width, viewport_height) {
        let Some(region) = plan(&grid, position, viewport_width, viewport_height, coord) else {
            trace!(chunk = %coord, "no overlap with viewport");
            report.skipped += 1;
            continue;
        };

        let chunk = store.get_or_create(coord);
        chunk.resolve(grid);
        let mut scratch = match chunk.pixels() {
            Some(pixels) => pixels.clone(),
            None => RgbaImage::new(grid.chunk_width, grid.chunk_height),
        };

        let put = PixelRect::new(
            i64::from(region.put_x),
            i64::from(region.put_y),
            region.source.width,
            region.source.height,
        );
        scratch.clear_rect(put);
        let captured = surface.read_rect(region.source);
        imageops::replace(&mut scratch, &captured, put.x, put.y);

        let pixels = Arc::new(scratch);
        let revision = store.replace_pixels(coord, Arc::clone(&pixels));
        cache.invalidate(coord);
        cache.submit(coord, revision, pixels);
        report.written.push(coord);
    }

    debug!(written = report.written.len(), skipped = report.skipped, "captured viewport");
    report
}
