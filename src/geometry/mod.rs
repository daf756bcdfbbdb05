mod utm;

use geo::{Coord, Rect};
use tracing::debug;

pub use utm::UtmZone;

use crate::error::{PoiError, Result};
use crate::types::{BoundingBox, GeoPoint};

/// UTM is only defined between 80S and 84N; the polar regions use UPS.
pub const UTM_MIN_LAT: f64 = -80.0;
pub const UTM_MAX_LAT: f64 = 84.0;

/// Side of the extraction square in metres.
pub const DEFAULT_SIDE_M: f64 = 1000.0;

/// Rounds to 8 decimal places through the decimal representation, so the
/// result is exactly the value the output files print.
pub fn round8(value: f64) -> f64 {
    format!("{value:.8}").parse().unwrap_or(value)
}

/// Builds the `side_m` x `side_m` square centred on `center`, in the UTM zone
/// containing the centre, and returns its WGS84 south-west / north-east edges.
pub fn build_square_bbox(center: GeoPoint, side_m: f64) -> Result<BoundingBox> {
    center.validate()?;
    if !side_m.is_finite() || side_m <= 0.0 {
        return Err(PoiError::InvalidSide(side_m));
    }
    if center.lat < UTM_MIN_LAT || center.lat > UTM_MAX_LAT {
        return Err(PoiError::UnsupportedArea {
            lat: center.lat,
            lon: center.lon,
            reason: format!("latitude outside the UTM band [{UTM_MIN_LAT}, {UTM_MAX_LAT}]"),
        });
    }

    let zone = UtmZone::for_point(center);
    let projected = zone.forward(center);
    let half = side_m / 2.0;
    let square = Rect::new(
        Coord {
            x: projected.x - half,
            y: projected.y - half,
        },
        Coord {
            x: projected.x + half,
            y: projected.y + half,
        },
    );

    let south_west = zone.inverse(square.min());
    let north_east = zone.inverse(square.max());

    let bbox = BoundingBox {
        south: round8(south_west.lat),
        west: round8(south_west.lon),
        north: round8(north_east.lat),
        east: round8(north_east.lon),
        utm_zone: zone.number,
    };

    if bbox.west < -180.0 || bbox.east > 180.0 {
        return Err(PoiError::UnsupportedArea {
            lat: center.lat,
            lon: center.lon,
            reason: "square crosses the antimeridian".to_string(),
        });
    }
    if bbox.south >= bbox.north || bbox.west >= bbox.east {
        return Err(PoiError::UnsupportedArea {
            lat: center.lat,
            lon: center.lon,
            reason: format!("degenerate box {bbox}"),
        });
    }

    debug!(zone = zone.number, north = zone.north, %bbox, "built square bbox");
    Ok(bbox)
}
