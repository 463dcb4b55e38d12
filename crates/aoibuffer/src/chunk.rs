//! Splitting of large areas into smaller parts.
//!
//! Consumers of the buffered areas often limit the size of a single
//! area-of-interest polygon. Polygons exceeding [`AREA_LIMIT_M2`] are cut along a
//! grid aligned to their bounding boxes until every part fits.
use geo::{BooleanOps, BoundingRect, ChamberlainDuquetteArea};
use geo_types::{Coord, Geometry, MultiPolygon, Polygon, Rect};
use tracing::debug;

use crate::buffer::geometry_kind;
use crate::error::Error;

/// maximum area of a polygon in square meters before it gets split
pub const AREA_LIMIT_M2: f64 = 1_000_000.0;

/// parts get split until their bounding box is at most this size in degrees
pub const KATANA_THRESHOLD_DEG: f64 = 0.01;

/// upper bound for the recursion of [`katana`]
pub const KATANA_MAX_DEPTH: usize = 250;

/// upper bound for the number of squares grouped into a single `MultiPolygon`
pub const MAX_MULTIPOLYGON_CARDINALITY: usize = 8;

/// split a `Polygon` or `MultiPolygon` into parts when its area
/// exceeds `limit_m2`.
///
/// Areas below the limit are returned unchanged as the only element, larger
/// ones as a list of polygons.
pub fn chunk_by_area(geom: &Geometry, limit_m2: f64) -> Result<Vec<Geometry>, Error> {
    let (area, mp) = match geom {
        Geometry::Polygon(poly) => (
            poly.chamberlain_duquette_unsigned_area(),
            MultiPolygon::new(vec![poly.clone()]),
        ),
        Geometry::MultiPolygon(mp) => (mp.chamberlain_duquette_unsigned_area(), mp.clone()),
        _ => {
            return Err(Error::UnsupportedGeometryKind(
                geometry_kind(geom).to_string(),
            ))
        }
    };

    if area < limit_m2 {
        return Ok(vec![geom.clone()]);
    }

    let parts = katana(&mp, KATANA_THRESHOLD_DEG, 0);
    debug!(
        "split area of {:.0}m² into {} parts (limit: {:.0}m²)",
        area,
        parts.len(),
        limit_m2
    );
    Ok(parts.into_iter().map(Geometry::Polygon).collect())
}

/// split a multipolygon along its shortest dimension until the bounding box of
/// every part is at most `threshold` wide and high.
///
/// Based on <https://snorfalorpagus.net/blog/2016/03/13/splitting-large-polygons-for-faster-intersections/>
pub fn katana(mp: &MultiPolygon, threshold: f64, depth: usize) -> Vec<Polygon> {
    let bounds = match mp.bounding_rect() {
        Some(rect) => rect,
        None => return vec![],
    };
    if bounds.width().max(bounds.height()) <= threshold || depth >= KATANA_MAX_DEPTH {
        return mp.0.clone();
    }

    // the outer edges of the halves lie beyond the bounds, so they never
    // overlap with edges of the input
    let pad = bounds.width().max(bounds.height());
    let min = Coord::from((bounds.min().x - pad, bounds.min().y - pad));
    let max = Coord::from((bounds.max().x + pad, bounds.max().y + pad));
    let halves = if bounds.height() >= bounds.width() {
        let mid_y = bounds.min().y + bounds.height() / 2.0;
        [
            Rect::new(min, Coord::from((max.x, mid_y))),
            Rect::new(Coord::from((min.x, mid_y)), max),
        ]
    } else {
        let mid_x = bounds.min().x + bounds.width() / 2.0;
        [
            Rect::new(min, Coord::from((mid_x, max.y))),
            Rect::new(Coord::from((mid_x, min.y)), max),
        ]
    };

    let mut parts = vec![];
    for half in halves {
        let clipped = mp.intersection(&MultiPolygon::new(vec![half.to_polygon()]));
        if clipped.0.is_empty() {
            continue;
        }
        parts.extend(katana(&clipped, threshold, depth + 1));
    }
    parts
}

/// number of point squares of `width_m` to group into a single `MultiPolygon`
/// so the group stays below [`AREA_LIMIT_M2`].
pub fn multipolygon_group_size(width_m: f64) -> usize {
    let fitting = (AREA_LIMIT_M2 / (width_m * width_m)).floor();
    let fitting = if fitting.is_finite() {
        (fitting as usize).max(2)
    } else {
        usize::MAX
    };
    MAX_MULTIPOLYGON_CARDINALITY.min(fitting - 1)
}
