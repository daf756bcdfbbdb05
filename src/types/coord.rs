use serde::{Deserialize, Serialize};

use crate::error::{PoiError, Result};

/// A WGS84 position in degrees.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize, Copy)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn to_tuple(&self) -> (f64, f64) {
        (self.lat, self.lon)
    }

    /// Rejects non-finite values and anything outside [-90, 90] x [-180, 180].
    pub fn validate(&self) -> Result<()> {
        let reason = if !self.lat.is_finite() || !self.lon.is_finite() {
            Some("coordinates must be finite")
        } else if !(-90.0..=90.0).contains(&self.lat) {
            Some("latitude must be within [-90, 90]")
        } else if !(-180.0..=180.0).contains(&self.lon) {
            Some("longitude must be within [-180, 180]")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(PoiError::InvalidCoordinate {
                lat: self.lat,
                lon: self.lon,
                reason,
            }),
            None => Ok(()),
        }
    }
}

/// A WGS84 box, every edge already rounded to 8 decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
    pub utm_zone: u8,
}

impl BoundingBox {
    /// `[south, west, north, east]`, the order Overpass and the output files use.
    pub fn to_array(&self) -> [f64; 4] {
        [self.south, self.west, self.north, self.east]
    }
}

/// Renders the box as an Overpass bbox filter body: `south,west,north,east`.
impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{},{},{}", self.south, self.west, self.north, self.east)
    }
}
