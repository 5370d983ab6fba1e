use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use image::RgbaImage;
use infinity::{
    BackingError, ChunkBacking, ConfigError, DirectoryBacking, RasterMode, Render, World, WorldConfig,
};
use tracing::info;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("chunk directory: {0}")]
    Backing(#[from] BackingError),
    #[error("image I/O failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("viewport must be at least 1x1, got {width}x{height}")]
    EmptyViewport { width: u32, height: u32 },
}

#[derive(Parser, Debug)]
#[command(name = "infinity-cli", about = "Inspect, render and import chunked infinite canvases")]
struct Cli {
    /// Directory holding one PNG per chunk, named by chunk key.
    #[arg(long, env = "INFINITY_CHUNK_DIR", global = true, default_value = "chunks")]
    chunks: PathBuf,

    /// Overrides `INFINITY_CHUNK_WIDTH`.
    #[arg(long, global = true)]
    chunk_width: Option<u32>,

    /// Overrides `INFINITY_CHUNK_HEIGHT`.
    #[arg(long, global = true)]
    chunk_height: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the chunk keys present in the chunk directory.
    Keys(KeysCommand),
    /// Render a viewport from the chunk directory to a PNG.
    Render(RenderCommand),
    /// Draw a PNG into the chunk directory at a world position. Pixels under
    /// the picture replace what was stored, transparent ones included.
    Import(ImportCommand),
}

#[derive(Args, Debug)]
struct KeysCommand {
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct RenderCommand {
    #[arg(long, allow_negative_numbers = true, default_value_t = 0)]
    x: i64,
    #[arg(long, allow_negative_numbers = true, default_value_t = 0)]
    y: i64,
    #[arg(long, default_value_t = 1000)]
    width: u32,
    #[arg(long, default_value_t = 1000)]
    height: u32,
    #[arg(long)]
    out: PathBuf,
}

#[derive(Args, Debug)]
struct ImportCommand {
    #[arg(long)]
    image: PathBuf,
    #[arg(long, allow_negative_numbers = true, default_value_t = 0)]
    x: i64,
    #[arg(long, allow_negative_numbers = true, default_value_t = 0)]
    y: i64,
}

fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = WorldConfig::from_env()?;
    if let Some(width) = cli.chunk_width {
        config.chunk_width = width;
    }
    if let Some(height) = cli.chunk_height {
        config.chunk_height = height;
    }
    if config.chunk_width == 0 {
        return Err(ConfigError::ZeroDimension { var: "--chunk-width" }.into());
    }
    if config.chunk_height == 0 {
        return Err(ConfigError::ZeroDimension { var: "--chunk-height" }.into());
    }

    match cli.command {
        Command::Keys(keys) => run_keys(&cli.chunks, &keys),
        Command::Render(render) => run_render(&cli.chunks, config, &render),
        Command::Import(import) => run_import(&cli.chunks, config, &import),
    }
}

fn run_keys(dir: &Path, keys: &KeysCommand) -> Result<(), CliError> {
    let coords = DirectoryBacking::open(dir)?.coords()?;
    if keys.json {
        println!("{}", serde_json::to_string_pretty(&coords)?);
    } else {
        for coord in &coords {
            println!("{coord}");
        }
    }
    eprintln!("{} chunks in {}", coords.len(), dir.display());
    Ok(())
}

fn run_render(dir: &Path, config: WorldConfig, render: &RenderCommand) -> Result<(), CliError> {
    if render.width == 0 || render.height == 0 {
        return Err(CliError::EmptyViewport { width: render.width, height: render.height });
    }

    let backing = DirectoryBacking::open(dir)?;
    let mut world = World::new(RgbaImage::new(render.width, render.height), config)
        .with_raster_mode(RasterMode::Disabled)
        .with_backing(backing);
    world.move_to(render.x, render.y, Render::Now);

    world.into_surface().save(&render.out)?;
    info!(x = render.x, y = render.y, out = %render.out.display(), "rendered viewport");
    eprintln!("wrote {}x{} viewport to {}", render.width, render.height, render.out.display());
    Ok(())
}

fn run_import(dir: &Path, config: WorldConfig, import: &ImportCommand) -> Result<(), CliError> {
    let picture = image::open(&import.image)?.to_rgba8();
    let (width, height) = picture.dimensions();
    if width == 0 || height == 0 {
        return Err(CliError::EmptyViewport { width, height });
    }

    // The picture is the viewport: position it and capture what is on it.
    let mut world = World::new(picture, config)
        .with_raster_mode(RasterMode::Disabled)
        .with_backing(DirectoryBacking::open(dir)?);
    world.move_to(import.x, import.y, Render::Deferred);
    let report = world.update_chunks();

    let mut out = DirectoryBacking::open(dir)?;
    for &coord in &report.written {
        if let Some(pixels) = world.chunk(coord).and_then(|chunk| chunk.pixels()) {
            out.save(coord, pixels)?;
        }
    }

    info!(written = report.written.len(), x = import.x, y = import.y, "imported image");
    eprintln!("imported {}x{} image into {} chunks", width, height, report.written.len());
    Ok(())
}
