/// Elevation value marking a missing sample. Compared by exact equality.
pub const NODATA_VALUE: f64 = -9999.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

/// Sample counts of a tile grid (declared extent + 1 on each axis).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLength {
    pub x: usize,
    pub y: usize,
}

/// Position of the first sample inside the tile's row-major layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StartPoint {
    pub x: usize,
    pub y: usize,
}

/// Degrees per sample. `y` is negative: rows advance southwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelSize {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TileMetadata {
    pub mesh_code: u64,
    pub lower_corner: LatLon,
    pub upper_corner: LatLon,
    pub grid_length: GridLength,
    pub start_point: StartPoint,
    pub pixel_size: PixelSize,
    /// `srsName` of the coverage envelope, e.g. `fguuid:jgd2011.bl`.
    pub crs_identifier: Option<String>,
    /// Free-text product type, e.g. `5mメッシュ（標高）`.
    pub dem_type: Option<String>,
}

impl TileMetadata {
    /// Number of decimal digits of the mesh code (6 = second mesh, 8 = third mesh).
    pub fn mesh_code_digits(&self) -> usize {
        self.mesh_code.to_string().len()
    }

    pub fn guess_epsg(&self) -> Option<u32> {
        match self.crs_identifier.as_deref()? {
            "fguuid:jgd2011.bl" => Some(6668),
            "fguuid:jgd2000.bl" => Some(4612),
            _ => None,
        }
    }
}

/// Raw sample strings of a tile, one per grid cell from `start_point` on.
///
/// Strings are kept unparsed so that a malformed row only blanks its own cell
/// when the tile is placed into a mosaic.
#[derive(Debug, Clone, PartialEq)]
pub struct TileElevation {
    pub mesh_code: u64,
    pub items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TileRecord {
    pub metadata: TileMetadata,
    pub elevation: TileElevation,
}

impl TileRecord {
    pub fn mesh_code(&self) -> u64 {
        self.metadata.mesh_code
    }

    /// Dense `rows x cols` array of the tile, filled with [`NODATA_VALUE`]
    /// wherever no parseable sample exists.
    ///
    /// A short tuple list leaves the remaining cells at the sentinel.
    pub fn values(&self) -> Vec<f64> {
        let GridLength { x: cols, y: rows } = self.metadata.grid_length;
        let mut values = vec![NODATA_VALUE; cols * rows];
        let mut items = self.elevation.items.iter();

        let mut first_col = self.metadata.start_point.x;
        'rows: for row in self.metadata.start_point.y..rows {
            for col in first_col..cols {
                let Some(item) = items.next() else {
                    break 'rows;
                };
                if let Ok(value) = item.trim().parse::<f64>() {
                    if value.is_finite() {
                        values[row * cols + col] = value;
                    }
                }
            }
            first_col = 0;
        }

        values
    }
}

/// Geographic extent covered by a set of tiles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub lower_left: LatLon,
    pub upper_right: LatLon,
}

impl Bounds {
    pub fn width(&self) -> f64 {
        self.upper_right.lon - self.lower_left.lon
    }

    pub fn height(&self) -> f64 {
        self.upper_right.lat - self.lower_left.lat
    }
}

/// Raster dimensions in pixels (`x` columns, `y` rows).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub x: usize,
    pub y: usize,
}

/// Affine pixel-to-geographic transform in GDAL order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub upper_left_x: f64,
    pub pixel_size_x: f64,
    pub rotation_x: f64,
    pub upper_left_y: f64,
    pub rotation_y: f64,
    pub pixel_size_y: f64,
}

impl GeoTransform {
    pub fn to_array(&self) -> [f64; 6] {
        [
            self.upper_left_x,
            self.pixel_size_x,
            self.rotation_x,
            self.upper_left_y,
            self.rotation_y,
            self.pixel_size_y,
        ]
    }

    /// Geographic position `(lon, lat)` of the upper-left corner of pixel `(col, row)`.
    pub fn pixel_to_geo(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.upper_left_x + col * self.pixel_size_x + row * self.rotation_x,
            self.upper_left_y + col * self.rotation_y + row * self.pixel_size_y,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(start: StartPoint, items: &[&str]) -> TileRecord {
        TileRecord {
            metadata: TileMetadata {
                mesh_code: 53394611,
                lower_corner: LatLon { lat: 35.0, lon: 135.0 },
                upper_corner: LatLon { lat: 35.01, lon: 135.015 },
                grid_length: GridLength { x: 3, y: 2 },
                start_point: start,
                pixel_size: PixelSize { x: 0.005, y: -0.005 },
                crs_identifier: Some("fguuid:jgd2011.bl".to_string()),
                dem_type: None,
            },
            elevation: TileElevation {
                mesh_code: 53394611,
                items: items.iter().map(|s| s.to_string()).collect(),
            },
        }
    }

    #[test]
    fn test_values_row_major() {
        let tile = record(StartPoint::default(), &["1", "2", "3", "4", "5", "6"]);
        assert_eq!(tile.values(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_values_start_point_offsets_first_row_only() {
        let tile = record(StartPoint { x: 1, y: 0 }, &["2", "3", "4", "5", "6"]);
        assert_eq!(tile.values(), vec![NODATA_VALUE, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_values_short_list_leaves_sentinel() {
        let tile = record(StartPoint::default(), &["1", "2", "3", "4"]);
        assert_eq!(
            tile.values(),
            vec![1.0, 2.0, 3.0, 4.0, NODATA_VALUE, NODATA_VALUE]
        );
    }

    #[test]
    fn test_values_skip_malformed_cell() {
        let tile = record(StartPoint::default(), &["1", "abc", "", "-9999.", "5", "6"]);
        let values = tile.values();
        assert_eq!(values[0], 1.0);
        assert_eq!(values[1], NODATA_VALUE);
        assert_eq!(values[2], NODATA_VALUE);
        assert_eq!(values[3], NODATA_VALUE);
        assert_eq!(values[4], 5.0);
    }

    #[test]
    fn test_guess_epsg() {
        let tile = record(StartPoint::default(), &[]);
        assert_eq!(tile.metadata.guess_epsg(), Some(6668));
        assert_eq!(tile.metadata.mesh_code_digits(), 8);
    }

    #[test]
    fn test_pixel_to_geo() {
        let transform = GeoTransform {
            upper_left_x: 135.0,
            pixel_size_x: 0.5,
            rotation_x: 0.0,
            upper_left_y: 36.0,
            rotation_y: 0.0,
            pixel_size_y: -0.25,
        };
        assert_eq!(transform.pixel_to_geo(2.0, 4.0), (136.0, 35.0));
        assert_eq!(transform.to_array()[5], -0.25);
    }
}
