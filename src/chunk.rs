//! Chunk content and the codecs used to move it in and out of persistence.
//!
//! A [`Chunk`] holds either resolved pixels or a [`PendingImage`] that an
//! external loader will complete later. Pixels are shared behind an `Arc` so a
//! background rasterization job can read them without a copy; a chunk is never
//! edited in place, only replaced.

#[cfg(test)]
#[path = "chunk_test.rs"]
mod chunk_test;

use std::io::Cursor;
use std::sync::{Arc, OnceLock};

use image::{ImageFormat, RgbaImage, imageops};

use crate::coords::{ChunkGrid, KeyError};

// =============================================================
// Errors
// =============================================================

#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    #[error("invalid chunk key: {0}")]
    Key(#[from] KeyError),
    #[error("failed to decode chunk image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("failed to encode chunk image: {0}")]
    Encode(#[source] image::ImageError),
}

// =============================================================
// Pending images
// =============================================================

/// An image supplied by an external loader that may not have arrived yet.
///
/// Clones share the same slot: the loader keeps one clone and calls
/// [`PendingImage::complete`], the world keeps another and paints it once it
/// is ready.
#[derive(Debug, Clone, Default)]
pub struct PendingImage {
    slot: Arc<OnceLock<RgbaImage>>,
}

impl PendingImage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver the image. Returns `false` if it was already delivered, in
    /// which case `image` is discarded.
    pub fn complete(&self, image: RgbaImage) -> bool {
        self.slot.set(image).is_ok()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.slot.get().is_some()
    }

    #[must_use]
    pub fn get(&self) -> Option<&RgbaImage> {
        self.slot.get()
    }
}

/// Externally sourced chunk content accepted by `World::load_chunk`.
#[derive(Debug, Clone)]
pub enum ChunkSource {
    /// Raw pixels. Normalized to the chunk size if they differ.
    Pixels(RgbaImage),
    /// An encoded image (PNG) as produced by [`encode_png`].
    Encoded(Vec<u8>),
    /// An image still being fetched.
    Pending(PendingImage),
}

// =============================================================
// Chunk
// =============================================================

/// What a chunk currently holds.
#[derive(Debug, Clone)]
enum ChunkContent {
    Pixels(Arc<RgbaImage>),
    Pending(PendingImage),
}

/// Persisted content of one grid cell.
///
/// `revision` is stamped by the owning store from a counter shared by every
/// chunk it has ever held, so it identifies one version of one chunk. A chunk
/// outside a store is at 0. `dirty` marks content the backing has not seen.
#[derive(Debug, Clone)]
pub struct Chunk {
    content: ChunkContent,
    revision: u64,
    dirty: bool,
}

impl Chunk {
    /// A fully transparent chunk sized for `grid`.
    #[must_use]
    pub fn blank(grid: ChunkGrid) -> Self {
        Self::from_pixels(RgbaImage::new(grid.chunk_width, grid.chunk_height))
    }

    #[must_use]
    pub fn from_pixels(pixels: RgbaImage) -> Self {
        Self { content: ChunkContent::Pixels(Arc::new(pixels)), revision: 0, dirty: false }
    }

    #[must_use]
    pub fn pending(image: PendingImage) -> Self {
        Self { content: ChunkContent::Pending(image), revision: 0, dirty: false }
    }

    /// Normalize an external source into a chunk sized for `grid`.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkError::Decode`] if encoded bytes are not a readable image.
    pub fn from_source(source: ChunkSource, grid: ChunkGrid) -> Result<Self, ChunkError> {
        match source {
            ChunkSource::Pixels(pixels) => Ok(Self::from_pixels(normalize(pixels, grid))),
            ChunkSource::Encoded(bytes) => Ok(Self::from_pixels(normalize(decode_chunk(&bytes)?, grid))),
            ChunkSource::Pending(image) => Ok(Self::pending(image)),
        }
    }

    /// Resolved pixels, or `None` while an external image is still pending.
    #[must_use]
    pub fn pixels(&self) -> Option<&RgbaImage> {
        match &self.content {
            ChunkContent::Pixels(pixels) => Some(pixels),
            ChunkContent::Pending(_) => None,
        }
    }

    /// Shared handle to the resolved pixels.
    #[must_use]
    pub fn shared_pixels(&self) -> Option<Arc<RgbaImage>> {
        match &self.content {
            ChunkContent::Pixels(pixels) => Some(Arc::clone(pixels)),
            ChunkContent::Pending(_) => None,
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self.content, ChunkContent::Pending(_))
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Whether the content changed since it was created or restored.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Stamp content that matches its backing copy (or is blank).
    pub(crate) fn stamp(&mut self, revision: u64) {
        self.revision = revision;
    }

    /// Stamp content the backing has not seen.
    pub(crate) fn stamp_dirty(&mut self, revision: u64) {
        self.revision = revision;
        self.dirty = true;
    }

    /// Swap in new pixels at `revision`.
    pub(crate) fn replace_pixels(&mut self, pixels: Arc<RgbaImage>, revision: u64) {
        self.content = ChunkContent::Pixels(pixels);
        self.stamp_dirty(revision);
    }

    /// Turn a completed pending image into pixels.
    ///
    /// Returns `true` only on the call that performs the transition.
    pub(crate) fn resolve(&mut self, grid: ChunkGrid) -> bool {
        let ChunkContent::Pending(image) = &self.content else {
            return false;
        };
        let Some(ready) = image.get() else {
            return false;
        };
        let pixels = normalize(ready.clone(), grid);
        self.content = ChunkContent::Pixels(Arc::new(pixels));
        true
    }
}

// =============================================================
// Codecs
// =============================================================

/// Fit `pixels` onto a transparent chunk-sized buffer, anchored top-left.
/// Larger images are cropped, smaller ones padded.
#[must_use]
pub fn normalize(pixels: RgbaImage, grid: ChunkGrid) -> RgbaImage {
    if pixels.dimensions() == (grid.chunk_width, grid.chunk_height) {
        return pixels;
    }
    let mut out = RgbaImage::new(grid.chunk_width, grid.chunk_height);
    imageops::replace(&mut out, &pixels, 0, 0);
    out
}

/// Decode an encoded chunk image into RGBA pixels.
///
/// # Errors
///
/// Returns [`ChunkError::Decode`] if the bytes are not a supported image.
pub fn decode_chunk(bytes: &[u8]) -> Result<RgbaImage, ChunkError> {
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

/// Encode chunk pixels as PNG.
///
/// # Errors
///
/// Returns [`ChunkError::Encode`] if the encoder fails.
pub fn encode_png(pixels: &RgbaImage) -> Result<Vec<u8>, ChunkError> {
    let mut out = Cursor::new(Vec::new());
    pixels.write_to(&mut out, ImageFormat::Png).map_err(ChunkError::Encode)?;
    Ok(out.into_inner())
}
