use std::sync::Arc;
use std::time::Duration;

use image::{Rgba, RgbaImage};

use super::*;
use crate::coords::ChunkGrid;
use crate::surface::Surface;

const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
const HAZE: Rgba<u8> = Rgba([0, 0, 255, 128]);

fn grid() -> ChunkGrid {
    ChunkGrid::new(8, 8)
}

fn sample() -> RgbaImage {
    let mut img = RgbaImage::new(8, 8);
    for x in 2..6 {
        img.put_pixel(x, 1, RED);
    }
    img.put_pixel(6, 1, HAZE);
    img.put_pixel(0, 7, RED);
    img
}

// --- Bitmap::rasterize ---

#[test]
fn transparent_image_has_no_runs() {
    let bitmap = Bitmap::rasterize(Arc::new(RgbaImage::new(8, 8)));
    assert_eq!(bitmap.run_count(), 0);
    assert_eq!((bitmap.width(), bitmap.height()), (8, 8));
}

#[test]
fn runs_split_on_opacity_change() {
    // Row 1: opaque run of 4, then a translucent run of 1. Row 7: one pixel.
    let bitmap = Bitmap::rasterize(Arc::new(sample()));
    assert_eq!(bitmap.run_count(), 3);
}

// --- Bitmap::composite_onto ---

#[test]
fn composite_onto_blank_matches_blit() {
    let pixels = sample();
    let bitmap = Bitmap::rasterize(Arc::new(pixels.clone()));

    let mut via_bitmap = RgbaImage::new(20, 20);
    bitmap.composite_onto(&mut via_bitmap, 5, 3);
    let mut via_blit = RgbaImage::new(20, 20);
    via_blit.put_pixels(&pixels, 5, 3);

    assert_eq!(via_bitmap, via_blit);
    assert_eq!(*via_bitmap.get_pixel(11, 4), HAZE);
}

#[test]
fn composite_onto_clips_negative_offsets() {
    let bitmap = Bitmap::rasterize(Arc::new(sample()));
    let mut target = RgbaImage::new(4, 4);
    // Row 1, columns 2..6 land at x -1..3, y 0.
    bitmap.composite_onto(&mut target, -3, -1);
    assert_eq!(*target.get_pixel(0, 0), RED);
    assert_eq!(*target.get_pixel(2, 0), RED);
    assert_eq!(*target.get_pixel(3, 0), HAZE);
}

#[test]
fn composite_onto_fully_outside_is_noop() {
    let bitmap = Bitmap::rasterize(Arc::new(sample()));
    let mut target = RgbaImage::new(4, 4);
    bitmap.composite_onto(&mut target, 100, 100);
    assert!(target.pixels().all(|px| px.0[3] == 0));
}

#[test]
fn composite_onto_keeps_background_under_transparency() {
    let bitmap = Bitmap::rasterize(Arc::new(sample()));
    let mut target = RgbaImage::from_pixel(8, 8, Rgba([0, 255, 0, 255]));
    bitmap.composite_onto(&mut target, 0, 0);
    assert_eq!(target.get_pixel(0, 0).0, [0, 255, 0, 255]);
    assert_eq!(*target.get_pixel(3, 1), RED);
}

#[test]
fn translucent_run_blends_over_opaque_background() {
    let bitmap = Bitmap::rasterize(Arc::new(sample()));
    let mut target = RgbaImage::from_pixel(8, 8, Rgba([0, 255, 0, 255]));
    bitmap.composite_onto(&mut target, 0, 0);
    let px = target.get_pixel(6, 1).0;
    assert_eq!(px[3], 255);
    assert!(px[1] > 0 && px[2] > 0, "both colors contribute: {px:?}");
}

// --- RenderCache ---

fn store_with(coord: ChunkCoord, pixels: RgbaImage) -> ChunkStore {
    let mut store = ChunkStore::new(grid());
    store.set(coord, Chunk::from_pixels(pixels));
    store
}

#[test]
fn inline_results_install_on_drain() {
    let coord = ChunkCoord::new(0, 0);
    let store = store_with(coord, sample());
    let chunk = store.get(coord).unwrap();
    let mut cache = RenderCache::new(RasterMode::Inline);

    cache.submit(coord, chunk.revision(), chunk.shared_pixels().unwrap());
    assert!(cache.get(coord, chunk.revision()).is_none());

    assert_eq!(cache.drain(&store), 1);
    assert!(cache.get(coord, chunk.revision()).is_some());
}

#[test]
fn disabled_mode_never_produces_bitmaps() {
    let coord = ChunkCoord::new(0, 0);
    let store = store_with(coord, sample());
    let chunk = store.get(coord).unwrap();
    let mut cache = RenderCache::new(RasterMode::Disabled);
    cache.submit(coord, chunk.revision(), chunk.shared_pixels().unwrap());
    assert_eq!(cache.drain(&store), 0);
    assert!(cache.is_empty());
}

#[test]
fn stale_revision_is_discarded() {
    let coord = ChunkCoord::new(0, 0);
    let mut store = store_with(coord, sample());
    let mut cache = RenderCache::new(RasterMode::Inline);

    let old = store.get(coord).unwrap().revision();
    cache.submit(coord, old, Arc::new(sample()));
    store.set(coord, Chunk::from_pixels(RgbaImage::new(8, 8)));

    assert_eq!(cache.drain(&store), 0);
    assert!(!cache.contains(coord));
}

#[test]
fn later_revision_replaces_earlier() {
    let coord = ChunkCoord::new(0, 0);
    let mut store = store_with(coord, sample());
    let mut cache = RenderCache::new(RasterMode::Inline);

    let first = store.get(coord).unwrap().revision();
    cache.submit(coord, first, Arc::new(sample()));
    cache.drain(&store);

    store.set(coord, Chunk::from_pixels(RgbaImage::new(8, 8)));
    let second = store.get(coord).unwrap().revision();
    cache.submit(coord, second, store.get(coord).unwrap().shared_pixels().unwrap());
    cache.drain(&store);

    assert!(cache.get(coord, first).is_none());
    assert_eq!(cache.get(coord, second).unwrap().run_count(), 0);
    assert_eq!(cache.len(), 1);
}

#[test]
fn update_for_unknown_chunk_is_discarded() {
    let store = ChunkStore::new(grid());
    let mut cache = RenderCache::new(RasterMode::Inline);
    cache.submit(ChunkCoord::new(3, 3), 1, Arc::new(sample()));
    assert_eq!(cache.drain(&store), 0);
}

#[test]
fn invalidate_removes_entry() {
    let coord = ChunkCoord::new(0, 0);
    let store = store_with(coord, sample());
    let rev = store.get(coord).unwrap().revision();
    let mut cache = RenderCache::new(RasterMode::Inline);
    cache.submit(coord, rev, Arc::new(sample()));
    cache.drain(&store);
    cache.invalidate(coord);
    assert!(!cache.contains(coord));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn background_results_arrive_eventually() {
    let coord = ChunkCoord::new(0, 0);
    let store = store_with(coord, sample());
    let chunk = store.get(coord).unwrap();
    let mut cache = RenderCache::new(RasterMode::Background(tokio::runtime::Handle::current()));

    cache.submit(coord, chunk.revision(), chunk.shared_pixels().unwrap());

    let mut installed = 0;
    for _ in 0..200 {
        installed += cache.drain(&store);
        if installed > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(installed, 1);
    assert!(cache.get(coord, chunk.revision()).is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn background_result_after_cache_dropped_is_harmless() {
    let cache = RenderCache::new(RasterMode::Background(tokio::runtime::Handle::current()));
    cache.submit(ChunkCoord::new(0, 0), 1, Arc::new(sample()));
    drop(cache);
    tokio::time::sleep(Duration::from_millis(20)).await;
}
