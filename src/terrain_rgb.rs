use crate::model::NODATA_VALUE;

const ELEVATION_OFFSET: f64 = 10000.0;
const STEPS_PER_METER: f64 = 10.0;
const MAX_ENCODED: f64 = 16_777_215.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TerrainRgbConfig {
    /// Emit a fourth alpha channel marking no-data pixels as transparent.
    pub alpha: bool,
}

impl TerrainRgbConfig {
    pub fn rgba() -> Self {
        Self { alpha: true }
    }

    pub fn rgb() -> Self {
        Self { alpha: false }
    }

    pub fn channels(&self) -> usize {
        if self.alpha {
            4
        } else {
            3
        }
    }

    pub fn nodata_marker(&self) -> &'static str {
        if self.alpha {
            "0 0 0 0"
        } else {
            "0 0 0"
        }
    }

    pub fn description(&self) -> &'static str {
        if self.alpha {
            "Terrain RGB encoded elevation data"
        } else {
            "Terrain RGB encoded elevation data (RGB-only)"
        }
    }

    /// Writes one pixel into `out`, which must hold [`Self::channels`] bytes.
    pub fn encode_pixel(&self, elevation: f64, out: &mut [u8]) {
        let valid = elevation != NODATA_VALUE && elevation.is_finite();
        let (r, g, b) = if valid {
            elevation_to_rgb(elevation)
        } else {
            (0, 0, 0)
        };
        out[0] = r;
        out[1] = g;
        out[2] = b;
        if self.alpha {
            out[3] = if valid { 255 } else { 0 };
        }
    }
}

/// Packs `elevation` at 0.1 m resolution from -10000 m into 24 bits.
///
/// Values outside the representable range saturate.
pub fn elevation_to_rgb(elevation: f64) -> (u8, u8, u8) {
    let encoded = ((elevation + ELEVATION_OFFSET) * STEPS_PER_METER)
        .round()
        .clamp(0.0, MAX_ENCODED) as u32;

    let r = ((encoded >> 16) & 0xFF) as u8;
    let g = ((encoded >> 8) & 0xFF) as u8;
    let b = (encoded & 0xFF) as u8;

    (r, g, b)
}

pub fn rgb_to_elevation(r: u8, g: u8, b: u8) -> f64 {
    let encoded = (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b);

    f64::from(encoded) / STEPS_PER_METER - ELEVATION_OFFSET
}
