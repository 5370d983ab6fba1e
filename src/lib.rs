//! Chunked infinite drawing surface.
//!
//! The plane is cut into fixed-size chunks. A [`World`] binds a caller-owned
//! viewport surface to a sparse chunk store: the caller draws on the surface,
//! captures what is visible into chunks with [`World::update_chunks`], and pans
//! with [`World::move_by`]. Chunks that come back into view are repainted from
//! storage, optionally through a pre-rasterized bitmap built off-thread.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`world`] | The [`World`] facade: movement, capture, refresh, load/export |
//! | [`coords`] | World/chunk/render coordinate conversions and chunk keys |
//! | [`chunk`] | Chunk content, pending images, PNG codecs |
//! | [`store`] | Sparse chunk map with lazy materialization and eviction |
//! | [`compositor`] | Visible-chunk enumeration and repaint |
//! | [`capture`] | Reading the viewport back into chunks |
//! | [`raster`] | Run-length bitmaps and the render cache |
//! | [`surface`] | The [`Surface`] trait and its `RgbaImage` implementation |
//! | [`backing`] | Persistence collaborators for evicted chunks |
//! | [`config`] | [`WorldConfig`] and environment overrides |
//! | [`consts`] | Defaults and environment variable names |

pub mod backing;
pub mod capture;
pub mod chunk;
pub mod compositor;
pub mod config;
pub mod consts;
pub mod coords;
pub mod raster;
pub mod store;
pub mod surface;
pub mod world;

pub use backing::{BackingError, ChunkBacking, DirectoryBacking, MemoryBacking};
pub use capture::CaptureReport;
pub use chunk::{Chunk, ChunkError, ChunkSource, PendingImage, decode_chunk, encode_png};
pub use compositor::RepaintStats;
pub use config::{ConfigError, WorldConfig};
pub use coords::{ChunkCoord, ChunkGrid, KeyError, RenderPos, WorldPos};
pub use raster::RasterMode;
pub use surface::{PixelRect, Surface};
pub use world::{Render, World};
