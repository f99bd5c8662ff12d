use std::collections::BTreeSet;

use tracing::{info, warn};

use crate::error::CatalogError;
use crate::model::{Bounds, GeoTransform, ImageSize, LatLon, TileMetadata, TileRecord};

/// Digit length class of a mesh code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshFormat {
    /// 6 digits.
    SecondMesh,
    /// 8 digits.
    ThirdMesh,
}

impl MeshFormat {
    pub fn of(mesh_code: u64) -> Result<Self, CatalogError> {
        match mesh_code.to_string().len() {
            6 => Ok(Self::SecondMesh),
            8 => Ok(Self::ThirdMesh),
            _ => Err(CatalogError::InvalidMeshCode(mesh_code)),
        }
    }
}

/// Signed pixel origin of a tile inside a mosaic. Row 0 is the northern edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilePlacement {
    pub row: i64,
    pub col: i64,
    pub rows: usize,
    pub cols: usize,
}

/// Validated, mesh-code-ordered set of tiles from one ingestion job.
#[derive(Debug, Clone)]
pub struct MeshCatalog {
    records: Vec<TileRecord>,
    format: MeshFormat,
    bounds: Bounds,
}

impl MeshCatalog {
    pub fn build(mut records: Vec<TileRecord>) -> Result<Self, CatalogError> {
        if records.is_empty() {
            return Err(CatalogError::Empty);
        }

        records.sort_by_key(TileRecord::mesh_code);

        let mut second = false;
        let mut third = false;
        for record in &records {
            match MeshFormat::of(record.mesh_code())? {
                MeshFormat::SecondMesh => second = true,
                MeshFormat::ThirdMesh => third = true,
            }
        }
        if second && third {
            return Err(CatalogError::MixedMeshFormat);
        }
        let format = if third {
            MeshFormat::ThirdMesh
        } else {
            MeshFormat::SecondMesh
        };

        let duplicates = records
            .windows(2)
            .filter(|pair| pair[0].mesh_code() == pair[1].mesh_code())
            .count();
        if duplicates > 0 {
            warn!("{} duplicated mesh codes in catalog", duplicates);
        }

        let crs: BTreeSet<&str> = records
            .iter()
            .filter_map(|record| record.metadata.crs_identifier.as_deref())
            .collect();
        if crs.len() > 1 {
            warn!("Tiles use different CRS identifiers: {:?}", crs);
        }
        for record in &records {
            if record.metadata.crs_identifier.is_some() && record.metadata.guess_epsg().is_none() {
                warn!(
                    "Unknown CRS identifier for mesh {}: {:?}",
                    record.mesh_code(),
                    record.metadata.crs_identifier
                );
            }
        }

        let bounds = compute_bounds(&records);
        info!(
            "Catalog of {} tiles, bounds ({}, {}) - ({}, {})",
            records.len(),
            bounds.lower_left.lat,
            bounds.lower_left.lon,
            bounds.upper_right.lat,
            bounds.upper_right.lon
        );

        Ok(Self {
            records,
            format,
            bounds,
        })
    }

    pub fn records(&self) -> &[TileRecord] {
        &self.records
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn format(&self) -> MeshFormat {
        self.format
    }

    pub fn mesh_codes(&self) -> Vec<u64> {
        self.records.iter().map(TileRecord::mesh_code).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Where `metadata`'s grid lands in a mosaic of `size` georeferenced by `transform`.
    ///
    /// Offsets are measured from the catalog's lower-left corner and rounded to
    /// the nearest pixel to absorb floating-point drift between tiles.
    pub fn placement(
        &self,
        metadata: &TileMetadata,
        size: ImageSize,
        transform: &GeoTransform,
    ) -> TilePlacement {
        let lat_distance = metadata.lower_corner.lat - self.bounds.lower_left.lat;
        let lon_distance = metadata.lower_corner.lon - self.bounds.lower_left.lon;

        let x = (lon_distance / transform.pixel_size_x).round() as i64;
        let y = (lat_distance / -transform.pixel_size_y).round() as i64;

        let rows = metadata.grid_length.y;
        let cols = metadata.grid_length.x;

        TilePlacement {
            row: size.y as i64 - (y + rows as i64),
            col: x,
            rows,
            cols,
        }
    }
}

fn compute_bounds(records: &[TileRecord]) -> Bounds {
    let mut lower_left = LatLon {
        lat: f64::INFINITY,
        lon: f64::INFINITY,
    };
    let mut upper_right = LatLon {
        lat: f64::NEG_INFINITY,
        lon: f64::NEG_INFINITY,
    };

    for meta in records.iter().map(|record| &record.metadata) {
        lower_left.lat = lower_left.lat.min(meta.lower_corner.lat);
        lower_left.lon = lower_left.lon.min(meta.lower_corner.lon);
        upper_right.lat = upper_right.lat.max(meta.upper_corner.lat);
        upper_right.lon = upper_right.lon.max(meta.upper_corner.lon);
    }

    Bounds {
        lower_left,
        upper_right,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::{GridLength, PixelSize, StartPoint, TileElevation};

    /// A tile covering `size` degrees from `(lat, lon)` with `values` rows.
    pub(crate) fn tile(
        mesh_code: u64,
        lat: f64,
        lon: f64,
        size: f64,
        values: &[&[f64]],
    ) -> TileRecord {
        let rows = values.len();
        let cols = values[0].len();
        TileRecord {
            metadata: TileMetadata {
                mesh_code,
                lower_corner: LatLon { lat, lon },
                upper_corner: LatLon {
                    lat: lat + size,
                    lon: lon + size,
                },
                grid_length: GridLength { x: cols, y: rows },
                start_point: StartPoint::default(),
                pixel_size: PixelSize {
                    x: size / cols as f64,
                    y: -size / rows as f64,
                },
                crs_identifier: Some("fguuid:jgd2011.bl".to_string()),
                dem_type: None,
            },
            elevation: TileElevation {
                mesh_code,
                items: values
                    .iter()
                    .flat_map(|row| row.iter().map(|v| v.to_string()))
                    .collect(),
            },
        }
    }

    #[test]
    fn test_sorted_by_mesh_code() {
        let catalog = MeshCatalog::build(vec![
            tile(10000002, 35.0, 135.02, 0.01, &[&[1.0]]),
            tile(10000000, 35.0, 135.0, 0.01, &[&[1.0]]),
            tile(10000001, 35.0, 135.01, 0.01, &[&[1.0]]),
        ])
        .unwrap();

        assert_eq!(catalog.mesh_codes(), vec![10000000, 10000001, 10000002]);
        assert_eq!(catalog.format(), MeshFormat::ThirdMesh);
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn test_bounds_cover_all_corners() {
        let catalog = MeshCatalog::build(vec![
            tile(533946, 35.0, 135.0, 0.5, &[&[1.0]]),
            tile(533947, 35.5, 136.0, 0.5, &[&[1.0]]),
        ])
        .unwrap();

        let bounds = catalog.bounds();
        assert_eq!(bounds.lower_left, LatLon { lat: 35.0, lon: 135.0 });
        assert_eq!(bounds.upper_right, LatLon { lat: 36.0, lon: 136.5 });
        assert_eq!(catalog.format(), MeshFormat::SecondMesh);
    }

    #[test]
    fn test_mixed_mesh_format() {
        let err = MeshCatalog::build(vec![
            tile(533946, 35.0, 135.0, 0.01, &[&[1.0]]),
            tile(53394611, 35.0, 135.01, 0.01, &[&[1.0]]),
        ])
        .unwrap_err();
        assert!(matches!(err, CatalogError::MixedMeshFormat));
    }

    #[test]
    fn test_invalid_mesh_code() {
        let err = MeshCatalog::build(vec![tile(5339461, 35.0, 135.0, 0.01, &[&[1.0]])])
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidMeshCode(5339461)));
    }

    #[test]
    fn test_empty_catalog() {
        assert!(matches!(
            MeshCatalog::build(Vec::new()),
            Err(CatalogError::Empty)
        ));
    }

    #[test]
    fn test_placement_counts_rows_from_north() {
        let south = tile(10000000, 35.0, 135.0, 0.01, &[&[1.0, 2.0], &[3.0, 4.0]]);
        let north = tile(10000010, 35.01, 135.0, 0.01, &[&[5.0, 6.0], &[7.0, 8.0]]);
        let catalog = MeshCatalog::build(vec![south.clone(), north.clone()]).unwrap();

        let size = ImageSize { x: 2, y: 4 };
        let transform = GeoTransform {
            upper_left_x: 135.0,
            pixel_size_x: 0.005,
            rotation_x: 0.0,
            upper_left_y: 35.02,
            rotation_y: 0.0,
            pixel_size_y: -0.005,
        };

        let placed = catalog.placement(&north.metadata, size, &transform);
        assert_eq!((placed.row, placed.col), (0, 0));
        let placed = catalog.placement(&south.metadata, size, &transform);
        assert_eq!((placed.row, placed.col), (2, 0));
    }
}
