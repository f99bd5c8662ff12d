//! Assembly of catalog tiles into one georeferenced elevation array.

use std::ops::Index;

use tracing::{debug, info, warn};

use crate::catalog::MeshCatalog;
use crate::error::{AssemblyError, EncodeError};
use crate::model::{Bounds, GeoTransform, ImageSize, PixelSize, NODATA_VALUE};

/// Mosaic dimensions at or above this many pixels are refused.
pub const MAX_DIMENSION: usize = 32000;

const PIXEL_SIZE_TOLERANCE: f64 = 1e-6;

/// Row-major elevation raster. Row 0 is the northern edge.
#[derive(Debug, Clone, PartialEq)]
pub struct DemGrid {
    width: usize,
    height: usize,
    values: Vec<f64>,
}

impl DemGrid {
    pub fn filled(width: usize, height: usize, value: f64) -> Self {
        Self {
            width,
            height,
            values: vec![value; width * height],
        }
    }

    pub fn from_vec(width: usize, height: usize, values: Vec<f64>) -> Result<Self, EncodeError> {
        if values.len() != width * height {
            return Err(EncodeError::ShapeMismatch {
                width,
                height,
                len: values.len(),
            });
        }
        Ok(Self {
            width,
            height,
            values,
        })
    }

    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, EncodeError> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        let values: Vec<f64> = rows.iter().flatten().copied().collect();
        if rows.iter().any(|row| row.len() != width) {
            return Err(EncodeError::ShapeMismatch {
                width,
                height,
                len: values.len(),
            });
        }
        Self::from_vec(width, height, values)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn size(&self) -> ImageSize {
        ImageSize {
            x: self.width,
            y: self.height,
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row < self.height && col < self.width {
            Some(self.values[row * self.width + col])
        } else {
            None
        }
    }

    pub fn row(&self, row: usize) -> Option<&[f64]> {
        if row < self.height {
            Some(&self.values[row * self.width..(row + 1) * self.width])
        } else {
            None
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        // chunks_exact panics on 0
        self.values.chunks_exact(self.width.max(1))
    }

    fn set(&mut self, row: usize, col: usize, value: f64) {
        self.values[row * self.width + col] = value;
    }
}

impl Index<(usize, usize)> for DemGrid {
    type Output = f64;

    fn index(&self, (row, col): (usize, usize)) -> &f64 {
        &self.values[row * self.width + col]
    }
}

/// Summary of a mosaic's valid and no-data pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    pub valid_pixels: usize,
    pub invalid_pixels: usize,
    pub min_elevation: f64,
    pub max_elevation: f64,
    pub average_elevation: f64,
    pub bounds: Bounds,
    pub image_size: ImageSize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mosaic {
    pub grid: DemGrid,
    pub transform: GeoTransform,
    pub size: ImageSize,
    pub bounds: Bounds,
}

impl Mosaic {
    pub fn statistics(&self) -> Statistics {
        let mut valid_pixels = 0;
        let mut invalid_pixels = 0;
        let mut min_elevation = f64::INFINITY;
        let mut max_elevation = f64::NEG_INFINITY;
        let mut total = 0.0;

        for &value in self.grid.values() {
            if value == NODATA_VALUE {
                invalid_pixels += 1;
            } else {
                valid_pixels += 1;
                min_elevation = min_elevation.min(value);
                max_elevation = max_elevation.max(value);
                total += value;
            }
        }

        let (min_elevation, max_elevation, average_elevation) = if valid_pixels > 0 {
            (min_elevation, max_elevation, total / valid_pixels as f64)
        } else {
            (0.0, 0.0, 0.0)
        };

        Statistics {
            valid_pixels,
            invalid_pixels,
            min_elevation,
            max_elevation,
            average_elevation,
            bounds: self.bounds,
            image_size: self.size,
        }
    }

    pub fn into_parts(self) -> (DemGrid, GeoTransform) {
        (self.grid, self.transform)
    }
}

/// Places every tile of a [`MeshCatalog`] into one [`DemGrid`].
#[derive(Debug, Clone, Default)]
pub struct MosaicAssembler {
    check_pixel_size: bool,
}

impl MosaicAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject tiles whose pixel size differs from the first tile's instead of
    /// only logging them.
    pub fn with_pixel_size_check(mut self, enabled: bool) -> Self {
        self.check_pixel_size = enabled;
        self
    }

    pub fn assemble(&self, catalog: &MeshCatalog) -> Result<Mosaic, AssemblyError> {
        let records = catalog.records();
        let Some(first) = records.first() else {
            return Err(AssemblyError::EmptyExtent {
                width: 0,
                height: 0,
            });
        };
        let pixel_size = first.metadata.pixel_size;
        self.check_pixel_sizes(catalog, pixel_size)?;

        let bounds = catalog.bounds();
        let size = image_size(&bounds, pixel_size)?;

        let transform = GeoTransform {
            upper_left_x: bounds.lower_left.lon,
            pixel_size_x: bounds.width() / size.x as f64,
            rotation_x: 0.0,
            upper_left_y: bounds.upper_right.lat,
            rotation_y: 0.0,
            pixel_size_y: -bounds.height() / size.y as f64,
        };

        info!(
            "Assembling {} tiles into {}x{} mosaic",
            records.len(),
            size.x,
            size.y
        );

        let mut grid = DemGrid::filled(size.x, size.y, NODATA_VALUE);

        for record in records {
            let placement = catalog.placement(&record.metadata, size, &transform);
            let values = record.values();

            let row_start = placement.row.max(0);
            let row_end = (placement.row + placement.rows as i64).min(size.y as i64);
            let col_start = placement.col.max(0);
            let col_end = (placement.col + placement.cols as i64).min(size.x as i64);

            if row_start != placement.row
                || col_start != placement.col
                || row_end != placement.row + placement.rows as i64
                || col_end != placement.col + placement.cols as i64
            {
                warn!(
                    "Mesh {} extends beyond the mosaic and is clipped",
                    record.mesh_code()
                );
            }
            debug!(
                "Placing mesh {} at row {}, col {}",
                record.mesh_code(),
                placement.row,
                placement.col
            );

            for row in row_start..row_end {
                let src_row = (row - placement.row) as usize;
                for col in col_start..col_end {
                    let src_col = (col - placement.col) as usize;
                    let value = values[src_row * placement.cols + src_col];
                    if value != NODATA_VALUE {
                        grid.set(row as usize, col as usize, value);
                    }
                }
            }
        }

        Ok(Mosaic {
            grid,
            transform,
            size,
            bounds,
        })
    }

    fn check_pixel_sizes(
        &self,
        catalog: &MeshCatalog,
        expected: PixelSize,
    ) -> Result<(), AssemblyError> {
        for record in catalog.records() {
            let actual = record.metadata.pixel_size;
            let drift_x = ((actual.x - expected.x) / expected.x).abs();
            let drift_y = ((actual.y - expected.y) / expected.y).abs();
            if drift_x <= PIXEL_SIZE_TOLERANCE && drift_y <= PIXEL_SIZE_TOLERANCE {
                continue;
            }

            if self.check_pixel_size {
                return Err(AssemblyError::PixelSizeMismatch {
                    mesh_code: record.mesh_code(),
                    expected_x: expected.x,
                    expected_y: expected.y,
                    actual_x: actual.x,
                    actual_y: actual.y,
                });
            }
            warn!(
                "Pixel size of mesh {} ({}, {}) differs from mosaic pixel size ({}, {})",
                record.mesh_code(),
                actual.x,
                actual.y,
                expected.x,
                expected.y
            );
        }
        Ok(())
    }
}

/// Mosaic dimensions, checked against [`MAX_DIMENSION`] before anything is allocated.
fn image_size(bounds: &Bounds, pixel_size: PixelSize) -> Result<ImageSize, AssemblyError> {
    let width = (bounds.width() / pixel_size.x).abs().round();
    let height = (bounds.height() / pixel_size.y.abs()).abs().round();

    if !width.is_finite()
        || !height.is_finite()
        || width >= MAX_DIMENSION as f64
        || height >= MAX_DIMENSION as f64
    {
        return Err(AssemblyError::TooLarge { width, height });
    }

    let size = ImageSize {
        x: width as usize,
        y: height as usize,
    };
    if size.x == 0 || size.y == 0 {
        return Err(AssemblyError::EmptyExtent {
            width: size.x,
            height: size.y,
        });
    }
    Ok(size)
}
