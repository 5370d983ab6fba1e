use std::collections::BTreeSet;

use image::{Rgba, RgbaImage};

use super::*;
use crate::chunk::{Chunk, PendingImage};
use crate::raster::RasterMode;

const INK: Rgba<u8> = Rgba([30, 60, 90, 255]);

fn grid() -> ChunkGrid {
    ChunkGrid::new(500, 500)
}

fn xs(coords: &[ChunkCoord]) -> BTreeSet<i64> {
    coords.iter().map(|c| c.x).collect()
}

// --- visible_chunks ---

#[test]
fn aligned_viewport_covers_exactly_four_chunks() {
    let coords = visible_chunks(&grid(), WorldPos::new(0, 0), 1000, 1000);
    assert_eq!(
        coords,
        vec![ChunkCoord::new(0, 0), ChunkCoord::new(0, 1), ChunkCoord::new(1, 0), ChunkCoord::new(1, 1)]
    );
}

#[test]
fn offset_viewport_spans_three_columns() {
    let coords = visible_chunks(&grid(), WorldPos::new(250, 0), 1000, 1000);
    assert_eq!(xs(&coords), BTreeSet::from([0, 1, 2]));
    assert_eq!(coords.len(), 6);
}

#[test]
fn negative_position_includes_negative_chunks() {
    let coords = visible_chunks(&grid(), WorldPos::new(-250, -1), 1000, 1000);
    assert_eq!(xs(&coords), BTreeSet::from([-1, 0, 1]));
    assert!(coords.contains(&ChunkCoord::new(-1, -1)));
    assert!(coords.contains(&ChunkCoord::new(1, 1)));
}

#[test]
fn viewport_smaller_than_a_chunk_sees_one_chunk() {
    let coords = visible_chunks(&grid(), WorldPos::new(100, 100), 200, 200);
    assert_eq!(coords, vec![ChunkCoord::new(0, 0)]);
}

#[test]
fn empty_viewport_sees_nothing() {
    assert!(visible_chunks(&grid(), WorldPos::new(0, 0), 0, 1000).is_empty());
    assert!(visible_chunks(&grid(), WorldPos::new(0, 0), 1000, 0).is_empty());
}

#[test]
fn panning_one_chunk_shifts_visible_set_by_one() {
    let g = grid();
    for (x, y) in [(0, 0), (250, 125), (-730, 4_000)] {
        let base = visible_chunks(&g, WorldPos::new(x, y), 1000, 800);

        let right = visible_chunks(&g, WorldPos::new(x + 500, y), 1000, 800);
        let shifted: Vec<_> = base.iter().map(|c| ChunkCoord::new(c.x + 1, c.y)).collect();
        assert_eq!(right, shifted);

        let down = visible_chunks(&g, WorldPos::new(x, y + 500), 1000, 800);
        let shifted: Vec<_> = base.iter().map(|c| ChunkCoord::new(c.x, c.y + 1)).collect();
        assert_eq!(down, shifted);
    }
}

// --- repaint ---

fn small_grid() -> ChunkGrid {
    ChunkGrid::new(4, 4)
}

fn inked_chunk() -> Chunk {
    let mut pixels = RgbaImage::new(4, 4);
    pixels.put_pixel(0, 0, INK);
    pixels.put_pixel(3, 3, INK);
    Chunk::from_pixels(pixels)
}

#[test]
fn repaint_blits_chunks_at_render_position() {
    let mut store = ChunkStore::new(small_grid());
    store.set(ChunkCoord::new(1, 0), inked_chunk());
    let cache = RenderCache::new(RasterMode::Disabled);
    let mut surface = RgbaImage::new(8, 8);

    let position = WorldPos::new(2, 0);
    let coords = visible_chunks(&small_grid(), position, 8, 8);
    let stats = repaint(&mut surface, &mut store, &cache, position, &coords);

    // Chunk (1, 0) has its origin at world x 4, which is render x 2.
    assert_eq!(*surface.get_pixel(2, 0), INK);
    assert_eq!(*surface.get_pixel(5, 3), INK);
    assert_eq!(stats.blits, coords.len());
    assert_eq!(stats.bitmaps, 0);
}

#[test]
fn repaint_blit_replaces_stale_pixels() {
    let mut store = ChunkStore::new(small_grid());
    let cache = RenderCache::new(RasterMode::Disabled);
    let mut surface = RgbaImage::from_pixel(4, 4, INK);

    repaint(&mut surface, &mut store, &cache, WorldPos::new(0, 0), &[ChunkCoord::new(0, 0)]);
    assert!(surface.pixels().all(|px| px.0[3] == 0));
}

#[test]
fn repaint_materializes_missing_chunks() {
    let mut store = ChunkStore::new(small_grid());
    let cache = RenderCache::new(RasterMode::Disabled);
    let mut surface = RgbaImage::new(8, 8);
    let coords = visible_chunks(&small_grid(), WorldPos::new(0, 0), 8, 8);
    repaint(&mut surface, &mut store, &cache, WorldPos::new(0, 0), &coords);
    assert_eq!(store.len(), 4);
}

#[test]
fn bitmap_path_matches_blit_path() {
    let coord = ChunkCoord::new(0, 0);
    let position = WorldPos::new(-1, -1);

    let mut store = ChunkStore::new(small_grid());
    store.set(coord, inked_chunk());
    let mut cache = RenderCache::new(RasterMode::Inline);
    let chunk = store.get(coord).unwrap();
    cache.submit(coord, chunk.revision(), chunk.shared_pixels().unwrap());
    cache.drain(&store);

    let mut fast = RgbaImage::from_pixel(6, 6, Rgba([1, 2, 3, 255]));
    let stats = repaint(&mut fast, &mut store, &cache, position, &[coord]);
    assert_eq!(stats.bitmaps, 1);

    let mut slow = RgbaImage::from_pixel(6, 6, Rgba([1, 2, 3, 255]));
    let plain = RenderCache::new(RasterMode::Disabled);
    let stats = repaint(&mut slow, &mut store, &plain, position, &[coord]);
    assert_eq!(stats.blits, 1);

    assert_eq!(fast, slow);
}

#[test]
fn pending_chunk_is_skipped_until_ready() {
    let coord = ChunkCoord::new(0, 0);
    let image = PendingImage::new();
    let mut store = ChunkStore::new(small_grid());
    store.set(coord, Chunk::pending(image.clone()));
    let mut cache = RenderCache::new(RasterMode::Inline);
    let mut surface = RgbaImage::new(4, 4);

    let stats = repaint(&mut surface, &mut store, &cache, WorldPos::new(0, 0), &[coord]);
    assert_eq!(stats.pending, 1);
    assert!(surface.pixels().all(|px| px.0[3] == 0));

    image.complete(RgbaImage::from_pixel(4, 4, INK));
    let stats = repaint(&mut surface, &mut store, &cache, WorldPos::new(0, 0), &[coord]);
    assert_eq!(stats.blits, 1);
    assert!(surface.pixels().all(|px| *px == INK));

    // Resolving also queued a bitmap for the fast path.
    assert_eq!(cache.drain(&store), 1);
}
