use std::fmt;

use thiserror::Error;

/// Errors raised while turning one tile's XML into a [`TileRecord`](crate::TileRecord).
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Malformed XML: {0}")]
    MalformedMarkup(String),

    #[error("{0} root not found")]
    StructureMissing(&'static str),

    #[error("Required XML element not found: {0}")]
    FieldMissing(&'static str),

    #[error("Invalid value for {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },
}

/// A parse failure tagged with the submission index of the tile text.
#[derive(Debug)]
pub struct TileFailure {
    pub index: usize,
    pub error: ParseError,
}

impl fmt::Display for TileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tile {}: {}", self.index, self.error)
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("XML parsing errors: {}", join_failures(.0))]
    Tiles(Vec<TileFailure>),

    #[error("Ingestion cancelled after {completed} of {total} tiles")]
    Cancelled { completed: usize, total: usize },

    #[error("Failed to build parser thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

fn join_failures(failures: &[TileFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("No tiles to catalog")]
    Empty,

    #[error("Incorrect mesh code: mesh_code={0}")]
    InvalidMeshCode(u64),

    #[error("Mixed mesh format (2nd mesh and 3rd mesh)")]
    MixedMeshFormat,
}

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("Image size is too large: x={width}, y={height}")]
    TooLarge { width: f64, height: f64 },

    #[error("Mosaic extent is empty: x={width}, y={height}")]
    EmptyExtent { width: usize, height: usize },

    #[error(
        "Pixel size of mesh {mesh_code} ({actual_x}, {actual_y}) differs from mosaic pixel size ({expected_x}, {expected_y})"
    )]
    PixelSizeMismatch {
        mesh_code: u64,
        expected_x: f64,
        expected_y: f64,
        actual_x: f64,
        actual_y: f64,
    },
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Raster has no pixels ({width}x{height})")]
    EmptyGrid { width: usize, height: usize },

    #[error("Grid of {width}x{height} cannot hold {len} values")]
    ShapeMismatch {
        width: usize,
        height: usize,
        len: usize,
    },

    #[error("Invalid geo transform: {0}")]
    InvalidTransform(String),

    #[error("Raster of {0} bytes exceeds the 4 GiB TIFF limit")]
    TooLarge(usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Any failure of the ingest → mosaic → encode pipeline.
#[derive(Debug, Error)]
pub enum DemError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

pub type Result<T, E = DemError> = std::result::Result<T, E>;
