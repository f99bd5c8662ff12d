use std::str::FromStr;

use tracing::debug;

use crate::error::ParseError;
use crate::model::{
    GridLength, LatLon, PixelSize, StartPoint, TileElevation, TileMetadata, TileRecord,
};
use crate::mosaic::MAX_DIMENSION;
use crate::xml_tree::{parse_markup, XmlNode};

/// Tuple-list category of samples on the sea surface.
pub const SEA_SURFACE: &str = "海水面";
/// Tuple-list category of samples on the sea bottom.
pub const SEA_BOTTOM: &str = "海水底面";
/// No-data literal as written in tuple lists.
pub const NODATA_LITERAL: &str = "-9999.";

const DATASET: &str = "dataset";
const GML: &str = "gml";

/// Parses one GSI DEM XML document into a [`TileRecord`].
///
/// When `sea_level_as_zero` is set, no-data samples classified as sea surface or
/// sea bottom are replaced by `0.0`. All other samples are kept as text.
pub fn parse_tile(xml: &str, sea_level_as_zero: bool) -> Result<TileRecord, ParseError> {
    let document = parse_markup(xml)?;

    let dataset = document
        .get_either("dataset:Dataset", "Dataset")
        .ok_or(ParseError::StructureMissing("Dataset"))?;
    let dem = dataset
        .get_either("dataset:DEM", "DEM")
        .ok_or(ParseError::StructureMissing("DEM"))?;

    let mesh_text = required_text(dem, DATASET, &["mesh"])?;
    let mesh_code = parse_number::<u64>("mesh", mesh_text)?;
    let dem_type = lookup(dem, DATASET, &["type"])
        .ok()
        .map(|node| node.text.clone())
        .filter(|text| !text.is_empty());

    let coverage = lookup(dem, DATASET, &["coverage"])?;

    let envelope = lookup(coverage, GML, &["boundedBy", "Envelope"])?;
    let lower_corner = parse_lat_lon("lowerCorner", required_text(envelope, GML, &["lowerCorner"])?)?;
    let upper_corner = parse_lat_lon("upperCorner", required_text(envelope, GML, &["upperCorner"])?)?;
    let crs_identifier = envelope.attribute("srsName").map(str::to_string);

    if upper_corner.lat < lower_corner.lat || upper_corner.lon < lower_corner.lon {
        return Err(ParseError::InvalidField {
            field: "upperCorner",
            value: format!("{} {}", upper_corner.lat, upper_corner.lon),
        });
    }

    let high = required_text(
        coverage,
        GML,
        &["gridDomain", "Grid", "limits", "GridEnvelope", "high"],
    )?;
    let (extent_x, extent_y) = parse_pair::<usize>("high", high)?;
    let grid_length = match (extent_x.checked_add(1), extent_y.checked_add(1)) {
        (Some(x), Some(y)) if x < MAX_DIMENSION && y < MAX_DIMENSION => GridLength { x, y },
        _ => {
            return Err(ParseError::InvalidField {
                field: "high",
                value: high.to_string(),
            })
        }
    };

    let start = required_text(
        coverage,
        GML,
        &["coverageFunction", "GridFunction", "startPoint"],
    )?;
    let (start_x, start_y) = parse_pair::<usize>("startPoint", start)?;

    let tuple_list = required_text(coverage, GML, &["rangeSet", "DataBlock", "tupleList"])?;

    let pixel_size = PixelSize {
        x: (upper_corner.lon - lower_corner.lon) / grid_length.x as f64,
        y: (lower_corner.lat - upper_corner.lat) / grid_length.y as f64,
    };

    let items = split_tuple_list(tuple_list, sea_level_as_zero);

    debug!(
        "Parsed mesh {}: {}x{} grid, {} samples",
        mesh_code,
        grid_length.x,
        grid_length.y,
        items.len()
    );

    Ok(TileRecord {
        metadata: TileMetadata {
            mesh_code,
            lower_corner,
            upper_corner,
            grid_length,
            start_point: StartPoint {
                x: start_x,
                y: start_y,
            },
            pixel_size,
            crs_identifier,
            dem_type,
        },
        elevation: TileElevation { mesh_code, items },
    })
}

/// Follows `path` from `node`, accepting `prefix:name` or `name` at every step.
fn lookup<'a>(
    node: &'a XmlNode,
    prefix: &str,
    path: &[&'static str],
) -> Result<&'a XmlNode, ParseError> {
    path.iter().try_fold(node, |parent, name| {
        parent
            .get_either(&format!("{prefix}:{name}"), name)
            .ok_or(ParseError::FieldMissing(*name))
    })
}

fn required_text<'a>(
    node: &'a XmlNode,
    prefix: &str,
    path: &[&'static str],
) -> Result<&'a str, ParseError> {
    let found = lookup(node, prefix, path)?;
    if found.text.is_empty() {
        // `path` is never empty at call sites
        return Err(ParseError::FieldMissing(path[path.len() - 1]));
    }
    Ok(&found.text)
}

fn parse_number<T: FromStr>(field: &'static str, text: &str) -> Result<T, ParseError> {
    text.trim().parse().map_err(|_| ParseError::InvalidField {
        field,
        value: text.to_string(),
    })
}

fn parse_pair<T: FromStr>(field: &'static str, text: &str) -> Result<(T, T), ParseError> {
    let mut parts = text.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(first), Some(second)) => Ok((
            parse_number(field, first)?,
            parse_number(field, second)?,
        )),
        _ => Err(ParseError::InvalidField {
            field,
            value: text.to_string(),
        }),
    }
}

/// Corners are written as `"lat lon"`.
fn parse_lat_lon(field: &'static str, text: &str) -> Result<LatLon, ParseError> {
    let (lat, lon) = parse_pair::<f64>(field, text)?;
    if !lat.is_finite() || !lon.is_finite() {
        return Err(ParseError::InvalidField {
            field,
            value: text.to_string(),
        });
    }
    Ok(LatLon { lat, lon })
}

/// Keeps the value column of every `category,value` line.
fn split_tuple_list(tuple_list: &str, sea_level_as_zero: bool) -> Vec<String> {
    tuple_list
        .trim()
        .lines()
        .map(|line| {
            let mut parts = line.trim().split(',');
            let category = parts.next().unwrap_or_default();
            let value = parts.next().unwrap_or_default();

            if sea_level_as_zero
                && (category == SEA_SURFACE || category == SEA_BOTTOM)
                && value == NODATA_LITERAL
            {
                "0.0".to_string()
            } else {
                value.to_string()
            }
        })
        .collect()
}
