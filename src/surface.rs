//! The live drawing surface.
//!
//! The surface belongs to the host: drawing tools paint on it directly and the
//! world only ever reads back from it (capture) or paints stored chunks onto it
//! (repaint). Its dimensions are fixed for the lifetime of a world.
//!
//! [`Surface`] is implemented for [`image::RgbaImage`], which is what the
//! tests and the CLI use. Other hosts (a GPU texture, a window framebuffer)
//! implement the same six operations.
//!
//! All operations take signed positions and clip to the surface bounds, so a
//! chunk hanging off an edge can be handed over unmodified.

#[cfg(test)]
#[path = "surface_test.rs"]
mod surface_test;

use image::{Rgba, RgbaImage, imageops};

use crate::raster::Bitmap;

/// Fully transparent pixel.
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// A rectangle in surface pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    #[must_use]
    pub const fn new(x: i64, y: i64, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Intersect with `[0, width) x [0, height)`, returning unsigned bounds.
    ///
    /// Returns `None` when nothing of the rectangle is inside.
    #[must_use]
    pub fn clip(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let x0 = self.x.max(0);
        let y0 = self.y.max(0);
        let x1 = (self.x + i64::from(self.width)).min(i64::from(width));
        let y1 = (self.y + i64::from(self.height)).min(i64::from(height));
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        let (Ok(x0), Ok(y0), Ok(x1), Ok(y1)) = (u32::try_from(x0), u32::try_from(y0), u32::try_from(x1), u32::try_from(y1))
        else {
            return None;
        };
        Some((x0, y0, x1 - x0, y1 - y0))
    }
}

/// A caller-owned pixel surface the world paints onto and captures from.
pub trait Surface {
    /// Width in pixels.
    fn width(&self) -> u32;

    /// Height in pixels.
    fn height(&self) -> u32;

    /// Reset every pixel to transparent.
    fn clear(&mut self);

    /// Reset the pixels inside `rect` to transparent.
    fn clear_rect(&mut self, rect: PixelRect);

    /// Copy the pixels inside `rect` into a new `rect.width x rect.height`
    /// image. Parts of `rect` outside the surface read as transparent.
    fn read_rect(&self, rect: PixelRect) -> RgbaImage;

    /// Replace the pixels under `pixels` placed at `(x, y)`, transparency
    /// included.
    fn put_pixels(&mut self, pixels: &RgbaImage, x: i64, y: i64);

    /// Composite a pre-rasterized bitmap over the surface at `(x, y)`.
    fn draw_bitmap(&mut self, bitmap: &Bitmap, x: i64, y: i64);
}

impl Surface for RgbaImage {
    fn width(&self) -> u32 {
        self.dimensions().0
    }

    fn height(&self) -> u32 {
        self.dimensions().1
    }

    fn clear(&mut self) {
        self.pixels_mut().for_each(|px| *px = TRANSPARENT);
    }

    fn clear_rect(&mut self, rect: PixelRect) {
        let (w, h) = self.dimensions();
        let Some((x0, y0, cw, ch)) = rect.clip(w, h) else {
            return;
        };
        for y in y0..y0 + ch {
            for x in x0..x0 + cw {
                self.put_pixel(x, y, TRANSPARENT);
            }
        }
    }

    fn read_rect(&self, rect: PixelRect) -> RgbaImage {
        let mut out = RgbaImage::new(rect.width, rect.height);
        let (w, h) = self.dimensions();
        if let Some((x0, y0, cw, ch)) = rect.clip(w, h) {
            let region = imageops::crop_imm(self, x0, y0, cw, ch).to_image();
            imageops::replace(&mut out, &region, i64::from(x0) - rect.x, i64::from(y0) - rect.y);
        }
        out
    }

    fn put_pixels(&mut self, pixels: &RgbaImage, x: i64, y: i64) {
        imageops::replace(self, pixels, x, y);
    }

    fn draw_bitmap(&mut self, bitmap: &Bitmap, x: i64, y: i64) {
        bitmap.composite_onto(self, x, y);
    }
}
