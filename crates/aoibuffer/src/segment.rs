use geo_types::Coord;
use tracing::debug;

use crate::geodesy::{geodesic_distance, turn_angle};

/// default turn angle in degrees above which a line gets split
pub const DEFAULT_SHARP_ANGLE_THRESHOLD_DEG: f64 = 45.0;

/// remove coordinates closer than `min_length_m` meters to the
/// last retained coordinate.
///
/// The first coordinate is always retained and the order is preserved. Distances
/// are geodesic, so this is independent of the planar projection used for
/// buffering later on.
pub fn filter_short_segments(coords: &[Coord], min_length_m: f64) -> Vec<Coord> {
    if coords.len() < 2 {
        return coords.to_vec();
    }

    let mut filtered = Vec::with_capacity(coords.len());
    let mut last_retained = coords[0];
    filtered.push(last_retained);

    for coord in coords.iter().skip(1) {
        if geodesic_distance(last_retained, *coord) < min_length_m {
            continue;
        }
        filtered.push(*coord);
        last_retained = *coord;
    }

    if filtered.len() != coords.len() {
        debug!(
            "removed {} of {} coordinates closer than {}m",
            coords.len() - filtered.len(),
            coords.len(),
            min_length_m
        );
    }
    filtered
}

/// split a line into pieces at every vertex with a turn of more than `threshold_deg`.
///
/// Every split emits the part of the line up to the sharp vertex, then the
/// sharp vertex on its own as a single-coordinate piece, and continues with a new
/// part starting at the sharp vertex. Lines with less than three coordinates
/// are returned as the single piece.
pub fn split_at_sharp_angles(coords: &[Coord], threshold_deg: f64) -> Vec<Vec<Coord>> {
    if coords.len() < 3 {
        return vec![coords.to_vec()];
    }

    let mut pieces = vec![];
    let mut current: Vec<Coord> = vec![coords[0], coords[1]];

    for window in coords.windows(3) {
        let (p0, p1, p2) = (window[0], window[1], window[2]);
        let theta = turn_angle(p0, p1, p2);
        if theta <= threshold_deg {
            current.push(p2);
        } else {
            debug!(
                "splitting line at ({}, {}), turn of {:.1} degrees",
                p1.x, p1.y, theta
            );
            pieces.push(std::mem::replace(&mut current, vec![p1, p2]));
            // the corner itself, as there is no join between the pieces
            pieces.push(vec![p1]);
        }
    }
    pieces.push(current);
    pieces
}
