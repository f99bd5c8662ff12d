mod source;

use anyhow::{Context, Result};
use clap::Parser;
use japan_dem_mosaic::{
    ingest, GeoTiffWriter, IngestOptions, MosaicAssembler, RasterEncoding, Statistics,
    TerrainRgbConfig,
};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input XML file, ZIP file, or directory
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output GeoTIFF file
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// Number of XML parser threads
    #[arg(short, long, default_value_t = 4)]
    threads: usize,

    /// Write Terrain-RGB instead of float32 elevations
    #[arg(long)]
    terrain_rgb: bool,

    /// Add an alpha channel to Terrain-RGB output
    #[arg(long, requires = "terrain_rgb")]
    alpha: bool,

    /// Treat no-data sea surface/bottom samples as 0 m
    #[arg(long)]
    sea_level_as_zero: bool,

    /// Fail when tiles have different pixel sizes
    #[arg(long)]
    strict_pixel_size: bool,

    /// Print mosaic statistics
    #[arg(long)]
    stats: bool,
}

impl Args {
    fn encoding(&self) -> RasterEncoding {
        if self.terrain_rgb {
            RasterEncoding::TerrainRgb(TerrainRgbConfig { alpha: self.alpha })
        } else {
            RasterEncoding::Float32
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let start_time = std::time::Instant::now();

    let texts = source::load_texts(&args.input)?;
    info!("Loaded {} XML texts", texts.len());

    let options = IngestOptions {
        sea_level_as_zero: args.sea_level_as_zero,
        pool_size: args.threads,
    };
    let catalog = ingest(&texts, &options).context("Failed to ingest DEM tiles")?;

    let mosaic = MosaicAssembler::new()
        .with_pixel_size_check(args.strict_pixel_size)
        .assemble(&catalog)
        .context("Failed to assemble mosaic")?;

    if args.stats {
        print_statistics(&mosaic.statistics());
    }

    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory {:?}", parent))?;
    }

    let (grid, transform) = mosaic.into_parts();
    GeoTiffWriter::new(args.encoding())
        .write(&grid, &transform, &args.output)
        .with_context(|| format!("Failed to write {:?}", args.output))?;
    info!("Written GeoTIFF: {:?}", args.output);

    info!("Total processing time: {:?}", start_time.elapsed());
    Ok(())
}

fn print_statistics(stats: &Statistics) {
    println!("Image size:    {} x {}", stats.image_size.x, stats.image_size.y);
    println!(
        "Bounds:        ({}, {}) - ({}, {})",
        stats.bounds.lower_left.lat,
        stats.bounds.lower_left.lon,
        stats.bounds.upper_right.lat,
        stats.bounds.upper_right.lon
    );
    println!("Valid pixels:  {}", stats.valid_pixels);
    println!("NoData pixels: {}", stats.invalid_pixels);
    println!(
        "Elevation:     min {:.2}, max {:.2}, mean {:.2}",
        stats.min_elevation, stats.max_elevation, stats.average_elevation
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_arguments() {
        let args = Args::try_parse_from(["japan-dem-mosaic", "tiles.zip", "-o", "out.tif"]).unwrap();
        assert_eq!(args.threads, 4);
        assert_eq!(args.encoding(), RasterEncoding::Float32);
        assert!(!args.sea_level_as_zero);
        assert!(!args.strict_pixel_size);
    }

    #[test]
    fn test_terrain_rgb_arguments() {
        let args = Args::try_parse_from([
            "japan-dem-mosaic",
            "tiles",
            "-o",
            "out.tif",
            "--terrain-rgb",
            "--alpha",
            "-t",
            "8",
        ])
        .unwrap();
        assert_eq!(args.threads, 8);
        assert_eq!(args.encoding(), RasterEncoding::TerrainRgb(TerrainRgbConfig::rgba()));
    }

    #[test]
    fn test_alpha_requires_terrain_rgb() {
        let result = Args::try_parse_from(["japan-dem-mosaic", "tiles", "-o", "out.tif", "--alpha"]);
        assert!(result.is_err());
    }
}
