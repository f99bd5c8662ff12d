//! GeoTIFF encoding of an assembled mosaic.

pub mod ifd;

use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use rayon::prelude::*;
use tracing::info;

use crate::error::EncodeError;
use crate::model::{GeoTransform, NODATA_VALUE};
use crate::mosaic::DemGrid;
use crate::terrain_rgb::TerrainRgbConfig;
use ifd::{Directory, Entry};

const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;
const GCS_WGS_84: u16 = 4326;

/// Pixel encoding of the output raster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RasterEncoding {
    /// One 32-bit float band with `-9999` as no-data.
    #[default]
    Float32,
    TerrainRgb(TerrainRgbConfig),
}

#[derive(Debug, Clone, Default)]
pub struct GeoTiffWriter {
    encoding: RasterEncoding,
}

impl GeoTiffWriter {
    pub fn new(encoding: RasterEncoding) -> Self {
        Self { encoding }
    }

    pub fn encoding(&self) -> RasterEncoding {
        self.encoding
    }

    pub fn encode(&self, grid: &DemGrid, transform: &GeoTransform) -> Result<Vec<u8>, EncodeError> {
        match self.encoding {
            RasterEncoding::Float32 => encode_float(grid, transform),
            RasterEncoding::TerrainRgb(config) => encode_terrain_rgb(grid, transform, &config),
        }
    }

    pub fn write(
        &self,
        grid: &DemGrid,
        transform: &GeoTransform,
        output_path: &Path,
    ) -> Result<(), EncodeError> {
        let bytes = self.encode(grid, transform)?;
        std::fs::write(output_path, &bytes)?;
        info!("Wrote {} bytes to {}", bytes.len(), output_path.display());
        Ok(())
    }
}

/// Single-band float32 GeoTIFF, no-data `-9999`.
pub fn encode_float(grid: &DemGrid, transform: &GeoTransform) -> Result<Vec<u8>, EncodeError> {
    validate(grid, transform)?;

    info!(
        "Encoding float32 GeoTIFF: {} x {} pixels",
        grid.width(),
        grid.height()
    );

    let row_bytes = grid.width() * 4;
    let mut strip = vec![0u8; row_bytes * grid.height()];
    strip
        .par_chunks_mut(row_bytes)
        .zip(grid.values().par_chunks(grid.width()))
        .for_each(|(out, row)| {
            for (dst, &value) in out.chunks_exact_mut(4).zip(row) {
                LittleEndian::write_f32(dst, value as f32);
            }
        });

    let mut dir = base_directory(grid, transform, 1, 32);
    dir.push(Entry::short(ifd::PHOTOMETRIC_INTERPRETATION, 1))
        .push(Entry::short(ifd::SAMPLE_FORMAT, 3))
        .push(Entry::ascii(ifd::GDAL_NODATA, format!("{}", NODATA_VALUE)));

    finish(&dir, &strip)
}

/// 8-bit Terrain-RGB GeoTIFF with three or four interleaved channels.
pub fn encode_terrain_rgb(
    grid: &DemGrid,
    transform: &GeoTransform,
    config: &TerrainRgbConfig,
) -> Result<Vec<u8>, EncodeError> {
    validate(grid, transform)?;

    let channels = config.channels();
    info!(
        "Converting DEM to Terrain-RGB GeoTIFF: {} x {} pixels, {} channels",
        grid.width(),
        grid.height(),
        channels
    );

    let row_bytes = grid.width() * channels;
    let mut strip = vec![0u8; row_bytes * grid.height()];
    strip
        .par_chunks_mut(row_bytes)
        .zip(grid.values().par_chunks(grid.width()))
        .for_each(|(out, row)| {
            for (pixel, &value) in out.chunks_exact_mut(channels).zip(row) {
                config.encode_pixel(value, pixel);
            }
        });

    let mut dir = base_directory(grid, transform, channels as u16, 8);
    dir.push(Entry::short(ifd::PHOTOMETRIC_INTERPRETATION, 2))
        .push(Entry::ascii(ifd::IMAGE_DESCRIPTION, config.description()))
        .push(Entry::ascii(ifd::GDAL_NODATA, config.nodata_marker()));
    if config.alpha {
        // unassociated alpha
        dir.push(Entry::short(ifd::EXTRA_SAMPLES, 2));
    }

    finish(&dir, &strip)
}

fn validate(grid: &DemGrid, transform: &GeoTransform) -> Result<(), EncodeError> {
    if grid.width() == 0 || grid.height() == 0 {
        return Err(EncodeError::EmptyGrid {
            width: grid.width(),
            height: grid.height(),
        });
    }
    if transform.rotation_x != 0.0 || transform.rotation_y != 0.0 {
        return Err(EncodeError::InvalidTransform(format!(
            "rotated transforms are not supported ({}, {})",
            transform.rotation_x, transform.rotation_y
        )));
    }
    if !transform.upper_left_x.is_finite() || !transform.upper_left_y.is_finite() {
        return Err(EncodeError::InvalidTransform(format!(
            "non-finite origin ({}, {})",
            transform.upper_left_x, transform.upper_left_y
        )));
    }
    if !(transform.pixel_size_x.is_finite() && transform.pixel_size_x > 0.0) {
        return Err(EncodeError::InvalidTransform(format!(
            "x pixel size must be positive, got {}",
            transform.pixel_size_x
        )));
    }
    if !(transform.pixel_size_y.is_finite() && transform.pixel_size_y < 0.0) {
        return Err(EncodeError::InvalidTransform(format!(
            "y pixel size must be negative (north-up), got {}",
            transform.pixel_size_y
        )));
    }
    Ok(())
}

fn base_directory(
    grid: &DemGrid,
    transform: &GeoTransform,
    samples_per_pixel: u16,
    bits_per_sample: u16,
) -> Directory {
    let mut dir = Directory::new();
    dir.push(Entry::long(ifd::IMAGE_WIDTH, grid.width() as u32))
        .push(Entry::long(ifd::IMAGE_LENGTH, grid.height() as u32))
        .push(Entry::shorts(
            ifd::BITS_PER_SAMPLE,
            vec![bits_per_sample; samples_per_pixel as usize],
        ))
        .push(Entry::short(ifd::COMPRESSION, 1))
        .push(Entry::short(ifd::SAMPLES_PER_PIXEL, samples_per_pixel))
        .push(Entry::long(ifd::ROWS_PER_STRIP, grid.height() as u32))
        .push(Entry::rational(ifd::X_RESOLUTION, 1, 1))
        .push(Entry::rational(ifd::Y_RESOLUTION, 1, 1))
        .push(Entry::short(ifd::PLANAR_CONFIGURATION, 1))
        .push(Entry::short(ifd::RESOLUTION_UNIT, 1))
        .push(Entry::doubles(
            ifd::MODEL_PIXEL_SCALE,
            vec![transform.pixel_size_x, -transform.pixel_size_y, 0.0],
        ))
        .push(Entry::doubles(
            ifd::MODEL_TIEPOINT,
            vec![
                0.0,
                0.0,
                0.0,
                transform.upper_left_x,
                transform.upper_left_y,
                0.0,
            ],
        ))
        .push(Entry::shorts(ifd::GEO_KEY_DIRECTORY, geo_key_directory()));
    dir
}

/// GeoKeyDirectory header followed by model type, raster type and CRS keys.
fn geo_key_directory() -> Vec<u16> {
    vec![
        1, 1, 0, 3, //
        1024, 0, 1, MODEL_TYPE_GEOGRAPHIC, //
        1025, 0, 1, RASTER_PIXEL_IS_AREA, //
        2048, 0, 1, GCS_WGS_84,
    ]
}

fn finish(dir: &Directory, strip: &[u8]) -> Result<Vec<u8>, EncodeError> {
    let bytes = dir.write(strip)?;
    info!("Encoded GeoTIFF of {} bytes", bytes.len());
    Ok(bytes)
}
