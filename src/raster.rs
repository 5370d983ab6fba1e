//! Render cache: optional pre-rasterized bitmaps per chunk.
//!
//! DESIGN
//! ======
//! A chunk's pixel buffer is authoritative. A [`Bitmap`] is a derived,
//! paint-optimized copy: each row is reduced to the runs of non-transparent
//! pixels, and fully opaque runs are copied as whole slices. Most of a chunk is
//! usually empty, so painting a bitmap skips the bulk of the buffer.
//!
//! Bitmaps are produced after each capture and posted back through an
//! unbounded `tokio::sync::mpsc` queue. The world drains the queue before it
//! paints. Producers never block the capture that issued them and callers
//! never wait for a result: a chunk without a bitmap is simply painted from its
//! pixel buffer.
//!
//! Every update carries the chunk revision it was rasterized from. An update
//! is installed only while that revision is still current, so the latest
//! capture wins even if an older job finishes later.
//!
//! ERROR HANDLING
//! ==============
//! There is nothing to fail. A result whose receiver is gone (the world was
//! dropped) is discarded; a stale result is discarded.

#[cfg(test)]
#[path = "raster_test.rs"]
mod raster_test;

use std::collections::HashMap;
use std::sync::Arc;

use image::{Pixel, RgbaImage};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::trace;

use crate::chunk::Chunk;
use crate::coords::ChunkCoord;
use crate::store::ChunkStore;
use crate::surface::PixelRect;

// =============================================================
// Bitmap
// =============================================================

/// A horizontal run of non-transparent pixels in one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Run {
    y: u32,
    x: u32,
    len: u32,
    opaque: bool,
}

/// Paint-optimized form of a chunk's pixels.
#[derive(Debug, Clone)]
pub struct Bitmap {
    pixels: Arc<RgbaImage>,
    runs: Vec<Run>,
}

impl Bitmap {
    /// Scan `pixels` into runs. Shares the buffer rather than copying it.
    #[must_use]
    pub fn rasterize(pixels: Arc<RgbaImage>) -> Self {
        let (width, height) = pixels.dimensions();
        let mut runs = Vec::new();
        for y in 0..height {
            let mut x = 0;
            while x < width {
                let alpha = pixels.get_pixel(x, y).0[3];
                if alpha == 0 {
                    x += 1;
                    continue;
                }
                let opaque = alpha == u8::MAX;
                let start = x;
                while x < width {
                    let a = pixels.get_pixel(x, y).0[3];
                    if a == 0 || (a == u8::MAX) != opaque {
                        break;
                    }
                    x += 1;
                }
                runs.push(Run { y, x: start, len: x - start, opaque });
            }
        }
        Self { pixels, runs }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Number of non-transparent runs.
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Source-over composite onto `target` with the bitmap's top-left at
    /// `(x, y)`. Opaque runs are copied, translucent runs are blended, so over
    /// a cleared area the result is identical to blitting the pixel buffer.
    pub fn composite_onto(&self, target: &mut RgbaImage, x: i64, y: i64) {
        let (tw, th) = target.dimensions();
        let target_stride = tw as usize * 4;
        let source_stride = self.pixels.width() as usize * 4;

        for run in &self.runs {
            let dest = PixelRect::new(x + i64::from(run.x), y + i64::from(run.y), run.len, 1);
            let Some((dx, dy, len, _)) = dest.clip(tw, th) else {
                continue;
            };
            // Column inside the run where the clipped span starts.
            let skip = i64::from(dx) - dest.x;
            let Ok(skip) = u32::try_from(skip) else {
                continue;
            };
            let sx = run.x + skip;

            if run.opaque {
                let src_start = run.y as usize * source_stride + sx as usize * 4;
                let dst_start = dy as usize * target_stride + dx as usize * 4;
                let bytes = len as usize * 4;
                let src = &self.pixels.as_raw()[src_start..src_start + bytes];
                let dst: &mut [u8] = &mut **target;
                dst[dst_start..dst_start + bytes].copy_from_slice(src);
            } else {
                for i in 0..len {
                    let src = *self.pixels.get_pixel(sx + i, run.y);
                    let dst = target.get_pixel_mut(dx + i, dy);
                    // Over a transparent pixel source-over is a copy; skipping the
                    // float blend keeps it exact.
                    if dst.0[3] == 0 {
                        *dst = src;
                    } else {
                        dst.blend(&src);
                    }
                }
            }
        }
    }
}

// =============================================================
// Cache
// =============================================================

/// How bitmaps are produced after a capture.
#[derive(Debug, Clone, Default)]
pub enum RasterMode {
    /// No render cache; every paint blits the pixel buffer.
    Disabled,
    /// Rasterize on the calling thread. Results still go through the queue
    /// and are installed at the next drain.
    #[default]
    Inline,
    /// Rasterize on the runtime's blocking pool.
    Background(Handle),
}

/// A finished rasterization job.
#[derive(Debug)]
pub struct CacheUpdate {
    pub coord: ChunkCoord,
    pub revision: u64,
    pub bitmap: Bitmap,
}

/// Bitmaps keyed by chunk, each stamped with the revision it was built from.
pub struct RenderCache {
    mode: RasterMode,
    bitmaps: HashMap<ChunkCoord, (u64, Bitmap)>,
    tx: mpsc::UnboundedSender<CacheUpdate>,
    rx: mpsc::UnboundedReceiver<CacheUpdate>,
}

impl RenderCache {
    #[must_use]
    pub fn new(mode: RasterMode) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { mode, bitmaps: HashMap::new(), tx, rx }
    }

    /// Queue a rasterization of `pixels` for `coord` at `revision`.
    ///
    /// Never blocks on the result.
    pub fn submit(&self, coord: ChunkCoord, revision: u64, pixels: Arc<RgbaImage>) {
        match &self.mode {
            RasterMode::Disabled => {}
            RasterMode::Inline => {
                post(&self.tx, CacheUpdate { coord, revision, bitmap: Bitmap::rasterize(pixels) });
            }
            RasterMode::Background(handle) => {
                let tx = self.tx.clone();
                // Detached; the job always runs to completion.
                drop(handle.spawn_blocking(move || {
                    post(&tx, CacheUpdate { coord, revision, bitmap: Bitmap::rasterize(pixels) });
                }));
            }
        }
    }

    /// Install every queued update whose revision is still current.
    ///
    /// Returns the number of bitmaps installed.
    pub fn drain(&mut self, store: &ChunkStore) -> usize {
        let mut installed = 0;
        while let Ok(update) = self.rx.try_recv() {
            let current = store.get(update.coord).filter(|c| c.pixels().is_some()).map(Chunk::revision);
            if current != Some(update.revision) {
                trace!(chunk = %update.coord, revision = update.revision, ?current, "dropping stale bitmap");
                continue;
            }
            self.bitmaps.insert(update.coord, (update.revision, update.bitmap));
            installed += 1;
        }
        installed
    }

    /// The bitmap for `coord` if it was built from `revision`.
    #[must_use]
    pub fn get(&self, coord: ChunkCoord, revision: u64) -> Option<&Bitmap> {
        match self.bitmaps.get(&coord) {
            Some((rev, bitmap)) if *rev == revision => Some(bitmap),
            _ => None,
        }
    }

    #[must_use]
    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.bitmaps.contains_key(&coord)
    }

    /// Drop the bitmap for `coord`, typically because its chunk was replaced.
    pub fn invalidate(&mut self, coord: ChunkCoord) {
        self.bitmaps.remove(&coord);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bitmaps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bitmaps.is_empty()
    }
}

fn post(tx: &mpsc::UnboundedSender<CacheUpdate>, update: CacheUpdate) {
    let coord = update.coord;
    if tx.send(update).is_err() {
        trace!(chunk = %coord, "render cache gone; discarding bitmap");
    }
}
