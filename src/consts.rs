//! Shared numeric constants for the infinity crate.

// ── Chunk grid ──────────────────────────────────────────────────

/// Default chunk width in pixels.
///
/// Very small chunks hurt paint performance badly; 500 keeps the number of
/// chunks per viewport low without making captures expensive.
pub const DEFAULT_CHUNK_WIDTH: u32 = 500;

/// Default chunk height in pixels.
pub const DEFAULT_CHUNK_HEIGHT: u32 = 500;

/// Separator between the two components of a chunk key (`"-3, 12"`).
pub const KEY_SEPARATOR: &str = ", ";

// ── Environment ─────────────────────────────────────────────────

/// Overrides [`DEFAULT_CHUNK_WIDTH`].
pub const ENV_CHUNK_WIDTH: &str = "INFINITY_CHUNK_WIDTH";

/// Overrides [`DEFAULT_CHUNK_HEIGHT`].
pub const ENV_CHUNK_HEIGHT: &str = "INFINITY_CHUNK_HEIGHT";

/// Enables eviction of chunks farther than this many chunks from the viewport.
pub const ENV_RETAIN_RADIUS: &str = "INFINITY_RETAIN_RADIUS";

// ── Persistence ─────────────────────────────────────────────────

/// File extension used by the directory backing.
pub const CHUNK_FILE_EXTENSION: &str = "png";
