use geo_types::Coord;
use std::f64::consts::PI;

const EARTH_RADIUS_EQUATOR: f64 = 6378137.0;
const R2D: f64 = 180.0 / PI;

/// latitudes get limited to this value before projecting, the poles
/// themselves map to infinity
const POLAR_LIMIT: f64 = 90.0 - 1e-9;

/// Mapping between geographic coordinates and a planar coordinate system
/// measured in meters.
///
/// All offset arithmetic happens in the planar system. Implementations must be
/// pure: the same input always maps to the same output, and
/// `to_geographic(to_planar(c))` returns `c` up to floating point precision for
/// coordinates within the extent of the projection.
pub trait Projection {
    fn to_planar(&self, coord: Coord) -> Coord;

    fn to_geographic(&self, coord: Coord) -> Coord;
}

/// Spherical mercator (EPSG:3857) against WGS84 (EPSG:4326).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WebMercator;

impl Projection for WebMercator {
    fn to_planar(&self, coord: Coord) -> Coord {
        coordinate_wgs84_to_webmercator(coord)
    }

    fn to_geographic(&self, coord: Coord) -> Coord {
        coordinate_webmercator_to_wgs84(coord)
    }
}

/// Longitudes are not wrapped, so coordinates east of the antimeridian keep
/// increasing past `20_037_508.34`.
pub fn coordinate_wgs84_to_webmercator(c: Coord) -> Coord {
    let lat = c.y.clamp(-POLAR_LIMIT, POLAR_LIMIT);
    Coord::from((
        EARTH_RADIUS_EQUATOR * c.x.to_radians(),
        EARTH_RADIUS_EQUATOR * PI.mul_add(0.25, 0.5 * lat.to_radians()).tan().ln(),
    ))
}

/// The longitude of the result is not wrapped into [-180, 180]. Buffers of
/// coordinates at the antimeridian extend to longitudes beyond ±180.
pub fn coordinate_webmercator_to_wgs84(c: Coord) -> Coord {
    Coord::from((
        c.x * R2D / EARTH_RADIUS_EQUATOR,
        ((PI * 0.5) - 2.0 * (-1.0 * c.y / EARTH_RADIUS_EQUATOR).exp().atan()) * R2D,
    ))
}
