pub mod catalog;
pub mod error;
pub mod model;
pub mod mosaic;
pub mod parser;
pub mod pool;
pub mod terrain_rgb;
pub mod writer;
pub mod xml_tree;

pub use catalog::{MeshCatalog, MeshFormat};
pub use error::{AssemblyError, CatalogError, DemError, EncodeError, IngestError, ParseError};
pub use model::{GeoTransform, TileRecord, NODATA_VALUE};
pub use mosaic::{DemGrid, Mosaic, MosaicAssembler, Statistics};
pub use pool::{CancelFlag, IngestionPool};
pub use terrain_rgb::TerrainRgbConfig;
pub use writer::{GeoTiffWriter, RasterEncoding};

/// Options of [`ingest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOptions {
    /// Replace no-data samples of sea surface/bottom categories with `0.0`.
    pub sea_level_as_zero: bool,
    /// Number of parser workers.
    pub pool_size: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            sea_level_as_zero: false,
            pool_size: pool::DEFAULT_POOL_SIZE,
        }
    }
}

/// Parses every tile text and validates the result into a [`MeshCatalog`].
pub fn ingest<S>(texts: &[S], options: &IngestOptions) -> error::Result<MeshCatalog>
where
    S: AsRef<str> + Sync,
{
    let records =
        IngestionPool::new(options.pool_size).parse_all(texts, options.sea_level_as_zero)?;
    Ok(MeshCatalog::build(records)?)
}

/// Assembles `catalog` with the default (permissive) pixel size handling.
pub fn build_mosaic(catalog: &MeshCatalog) -> Result<Mosaic, AssemblyError> {
    MosaicAssembler::new().assemble(catalog)
}

/// Serializes `grid` as a GeoTIFF in the requested pixel encoding.
pub fn encode(
    grid: &DemGrid,
    transform: &GeoTransform,
    encoding: RasterEncoding,
) -> Result<Vec<u8>, EncodeError> {
    GeoTiffWriter::new(encoding).encode(grid, transform)
}
