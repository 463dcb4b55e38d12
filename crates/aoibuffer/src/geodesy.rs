//! Measurements on the WGS84 ellipsoid.
//!
//! Coordinates are `x` = longitude and `y` = latitude in degrees.
use geo_types::Coord;
use geographiclib_rs::{Geodesic, InverseGeodesic};

/// geodesic distance between two coordinates in meters
pub fn geodesic_distance(from: Coord, to: Coord) -> f64 {
    Geodesic::wgs84().inverse(from.y, from.x, to.y, to.x)
}

/// forward azimuth at `from` pointing towards `to` in degrees
/// within [0, 360), clockwise from north.
///
/// Coincident coordinates have no defined azimuth, the returned value
/// is meaningless for those.
pub fn bearing(from: Coord, to: Coord) -> f64 {
    let (azi1, _, _): (f64, f64, f64) = Geodesic::wgs84().inverse(from.y, from.x, to.y, to.x);
    azi1.rem_euclid(360.0)
}

/// absolute difference between two bearings in degrees, within [0, 180]
pub fn angular_delta(a: f64, b: f64) -> f64 {
    let delta = (a - b).abs() % 360.0;
    if delta <= 180.0 {
        delta
    } else {
        360.0 - delta
    }
}

/// the turn at `p1` when walking from `p0` via `p1` to `p2` in degrees.
///
/// 0 means straight ahead, 180 a full reversal. A zero-length segment does
/// not turn.
pub fn turn_angle(p0: Coord, p1: Coord, p2: Coord) -> f64 {
    if p0 == p1 || p1 == p2 {
        return 0.0;
    }
    angular_delta(bearing(p0, p1), bearing(p1, p2))
}
