use geo_types::{Coord, Geometry, LineString, MultiPolygon, Polygon};
use tracing::trace;
use uom::si::f64::Length;
use uom::si::length::meter;

use crate::error::Error;
use crate::segment::{
    filter_short_segments, split_at_sharp_angles, DEFAULT_SHARP_ANGLE_THRESHOLD_DEG,
};
use crate::webmercator::{Projection, WebMercator};

/// default buffer width in meters
pub const DEFAULT_WIDTH_M: f64 = 25.0;

/// The full width of a buffer. Always finite and > 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Width(Length);

impl Width {
    pub fn meters(&self) -> f64 {
        self.0.get::<meter>()
    }

    pub fn half_meters(&self) -> f64 {
        self.meters() / 2.0
    }
}

impl Default for Width {
    fn default() -> Self {
        Self(Length::new::<meter>(DEFAULT_WIDTH_M))
    }
}

impl TryFrom<Length> for Width {
    type Error = Error;

    fn try_from(value: Length) -> Result<Self, Self::Error> {
        let m = value.get::<meter>();
        if !m.is_finite() || m <= 0.0 {
            Err(Error::InvalidWidth(m))
        } else {
            Ok(Self(value))
        }
    }
}

impl TryFrom<f64> for Width {
    type Error = Error;

    /// width in meters
    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::try_from(Length::new::<meter>(value))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BufferOptions {
    pub width: Width,

    /// lines get split at vertices turning more than this angle (degrees)
    pub sharp_angle_threshold_deg: f64,

    /// coordinates closer than this to their predecessor are dropped.
    ///
    /// Defaults to the width when not set.
    pub min_segment_length: Option<Length>,
}

impl Default for BufferOptions {
    fn default() -> Self {
        Self {
            width: Width::default(),
            sharp_angle_threshold_deg: DEFAULT_SHARP_ANGLE_THRESHOLD_DEG,
            min_segment_length: None,
        }
    }
}

impl BufferOptions {
    pub fn with_width(width: Width) -> Self {
        Self {
            width,
            ..Default::default()
        }
    }

    pub fn min_segment_length_m(&self) -> f64 {
        self.min_segment_length
            .map(|l| l.get::<meter>())
            .unwrap_or_else(|| self.width.meters())
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !(0.0..=180.0).contains(&self.sharp_angle_threshold_deg) {
            return Err(Error::InvalidThreshold(self.sharp_angle_threshold_deg));
        }
        let min_length = self.min_segment_length_m();
        if !min_length.is_finite() || min_length < 0.0 {
            return Err(Error::InvalidWidth(min_length));
        }
        Ok(())
    }
}

/// name of the kind of a geometry, as used in GeoJSON
pub fn geometry_kind(geom: &Geometry) -> &'static str {
    match geom {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

/// axis-aligned square of side `width` centered on `coord` in the
/// planar system of `projection`.
pub fn buffer_point<P: Projection>(coord: Coord, width: &Width, projection: &P) -> Polygon {
    square(coord, width.half_meters(), projection)
}

fn square<P: Projection>(coord: Coord, hw: f64, projection: &P) -> Polygon {
    let c = projection.to_planar(coord);

    let mut ring: Vec<Coord> = [(-hw, -hw), (hw, -hw), (hw, hw), (-hw, hw)]
        .iter()
        .map(|(dx, dy)| projection.to_geographic(Coord::from((c.x + dx, c.y + dy))))
        .collect();
    ring.push(ring[0]);
    Polygon::new(LineString::from(ring), vec![])
}

/// unit normal pointing to the left of the segment `from` -> `to`, scaled
/// by `half_width`. Both coordinates are planar.
fn scaled_normal(from: Coord, to: Coord, half_width: f64) -> Option<Coord> {
    let d = to - from;
    let magnitude = d.x.hypot(d.y);
    if magnitude == 0.0 || !magnitude.is_finite() {
        return None;
    }
    Some(Coord::from((
        -d.y / magnitude * half_width,
        d.x / magnitude * half_width,
    )))
}

/// buffer a line with flat caps by offsetting every segment by `half_width_m`
/// to both sides.
///
/// The line must not contain turns sharper than the threshold the offsets can
/// cope with, see [`split_at_sharp_angles`]. There is no join geometry: each
/// vertex is offset along the normal of the segment ending in it (the first
/// vertex along the normal of the first segment).
///
/// The ring is the left-hand chain from the first to the last vertex followed by
/// the right-hand chain back to the first vertex. A single coordinate becomes a
/// square as with [`buffer_point`].
pub fn buffer_line<P: Projection>(
    coords: &[Coord],
    half_width_m: f64,
    projection: &P,
) -> Result<Polygon, Error> {
    match coords {
        [] => return Err(Error::TooFewCoordinates(0)),
        [single] => return Ok(square(*single, half_width_m, projection)),
        _ => (),
    }
    let planar: Vec<Coord> = coords.iter().map(|c| projection.to_planar(*c)).collect();

    let mut left = Vec::with_capacity(planar.len() * 2 + 1);
    let mut right = Vec::with_capacity(planar.len());

    for (i, pair) in planar.windows(2).enumerate() {
        let (p0, p1) = (pair[0], pair[1]);
        let n = scaled_normal(p0, p1, half_width_m)
            .ok_or(Error::DegenerateSegment { index: i })?;
        if i == 0 {
            left.push(p0 + n);
            right.push(p0 - n);
        }
        left.push(p1 + n);
        right.push(p1 - n);
    }

    left.extend(right.into_iter().rev());
    let mut ring: Vec<Coord> = left
        .into_iter()
        .map(|c| projection.to_geographic(c))
        .collect();
    ring.push(ring[0]);
    Ok(Polygon::new(LineString::from(ring), vec![]))
}

/// buffers geometries using square caps and without joins.
#[derive(Debug, Clone, Default)]
pub struct SquareBuffer<P = WebMercator> {
    projection: P,
    options: BufferOptions,
}

impl<P: Projection> SquareBuffer<P> {
    pub fn new(projection: P, options: BufferOptions) -> Result<Self, Error> {
        options.validate()?;
        Ok(Self {
            projection,
            options,
        })
    }

    /// buffer a geometry.
    ///
    /// * `Point` becomes a square `Polygon`.
    /// * `LineString` becomes a `Polygon`, or a `MultiPolygon` when the line
    ///   had to be split at sharp angles.
    /// * `Polygon` and `MultiPolygon` are returned unchanged.
    ///
    /// All other kinds fail with [`Error::UnsupportedGeometryKind`].
    pub fn buffer_geometry(&self, geom: &Geometry) -> Result<Geometry, Error> {
        match geom {
            Geometry::Point(point) => Ok(Geometry::Polygon(self.buffer_point(point.0))),
            Geometry::LineString(ls) => self.buffer_linestring(&ls.0),
            Geometry::Polygon(_) | Geometry::MultiPolygon(_) => Ok(geom.clone()),
            Geometry::Line(_)
            | Geometry::MultiPoint(_)
            | Geometry::MultiLineString(_)
            | Geometry::GeometryCollection(_)
            | Geometry::Rect(_)
            | Geometry::Triangle(_) => Err(Error::UnsupportedGeometryKind(
                geometry_kind(geom).to_string(),
            )),
        }
    }

    pub fn buffer_point(&self, coord: Coord) -> Polygon {
        buffer_point(coord, &self.options.width, &self.projection)
    }

    /// buffer the coordinates of a line.
    ///
    /// Lines collapsing to a single coordinate after removing short segments
    /// become a square. Lines with sharp angles are split and every piece
    /// is buffered on its own, the result is then a `MultiPolygon` with one
    /// polygon per piece. Pieces are not merged, they may overlap.
    pub fn buffer_linestring(&self, coords: &[Coord]) -> Result<Geometry, Error> {
        let filtered = filter_short_segments(coords, self.options.min_segment_length_m());
        match filtered.len() {
            0 => return Err(Error::TooFewCoordinates(0)),
            1 => return Ok(Geometry::Polygon(self.buffer_point(filtered[0]))),
            _ => (),
        }

        let pieces = split_at_sharp_angles(&filtered, self.options.sharp_angle_threshold_deg);
        if pieces.len() == 1 {
            return Ok(Geometry::Polygon(buffer_line(
                &filtered,
                self.options.width.half_meters(),
                &self.projection,
            )?));
        }

        trace!("buffering {} pieces of a split line", pieces.len());
        let mut polygons = Vec::with_capacity(pieces.len());
        for piece in pieces.iter() {
            match self.buffer_linestring(piece)? {
                Geometry::Polygon(poly) => polygons.push(poly),
                Geometry::MultiPolygon(mp) => polygons.extend(mp.0),
                other => {
                    return Err(Error::UnsupportedGeometryKind(
                        geometry_kind(&other).to_string(),
                    ))
                }
            }
        }
        Ok(Geometry::MultiPolygon(MultiPolygon::new(polygons)))
    }
}

/// buffer a geometry by `width` using spherical mercator for the
/// offset calculations.
pub fn buffer_geometry(geom: &Geometry, width: Length) -> Result<Geometry, Error> {
    let options = BufferOptions::with_width(Width::try_from(width)?);
    SquareBuffer::new(WebMercator, options)?.buffer_geometry(geom)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use float_cmp::approx_eq;
    use geo::{GeometryCollection, MultiPoint, Point};
    use geo_types::{coord, line_string, polygon};

    use super::*;
    use crate::geodesy::geodesic_distance;

    fn planar_ring(poly: &Polygon) -> Vec<Coord> {
        poly.exterior()
            .coords()
            .map(|c| WebMercator.to_planar(*c))
            .collect()
    }

    fn distance(a: Coord, b: Coord) -> f64 {
        (b - a).x.hypot((b - a).y)
    }

    fn dot(a: Coord, b: Coord) -> f64 {
        a.x * b.x + a.y * b.y
    }

    fn assert_closed(poly: &Polygon) {
        let ring = &poly.exterior().0;
        assert!(ring.len() >= 4);
        assert_eq!(ring.first(), ring.last());
    }

    fn width(m: f64) -> Width {
        Width::try_from(m).unwrap()
    }

    #[test]
    fn width_validation() {
        assert!(Width::try_from(10.0).is_ok());
        assert_eq!(Width::try_from(0.0), Err(Error::InvalidWidth(0.0)));
        assert!(Width::try_from(-3.0).is_err());
        assert!(Width::try_from(f64::NAN).is_err());
        assert!(Width::try_from(f64::INFINITY).is_err());
        assert_eq!(Width::default().meters(), DEFAULT_WIDTH_M);
        assert_eq!(width(4.0).half_meters(), 2.0);
    }

    #[test]
    fn options_validation() {
        assert!(BufferOptions::default().validate().is_ok());
        let options = BufferOptions {
            sharp_angle_threshold_deg: 190.0,
            ..Default::default()
        };
        assert_eq!(options.validate(), Err(Error::InvalidThreshold(190.0)));
        assert!(SquareBuffer::new(WebMercator, options).is_err());
    }

    #[test]
    fn min_segment_length_defaults_to_width() {
        let options = BufferOptions::with_width(width(12.0));
        assert_eq!(options.min_segment_length_m(), 12.0);
        let options = BufferOptions {
            min_segment_length: Some(Length::new::<meter>(3.0)),
            ..options
        };
        assert_eq!(options.min_segment_length_m(), 3.0);
    }

    #[test]
    fn point_buffer_is_square() {
        let center = coord! {x: 10.0, y: 20.0};
        let poly = buffer_point(center, &width(4.0), &WebMercator);
        assert_closed(&poly);
        assert_eq!(poly.exterior().0.len(), 5);
        assert!(poly.interiors().is_empty());

        let ring = planar_ring(&poly);
        for i in 0..4 {
            let side = distance(ring[i], ring[i + 1]);
            assert_abs_diff_eq!(side, 4.0, epsilon = 1e-6);

            let a = ring[i + 1] - ring[i];
            let b = ring[(i + 2) % 4] - ring[i + 1];
            assert_abs_diff_eq!(dot(a, b), 0.0, epsilon = 1e-6);
        }

        // centered on the point
        let c = WebMercator.to_planar(center);
        let cx = ring[..4].iter().map(|c| c.x).sum::<f64>() / 4.0;
        let cy = ring[..4].iter().map(|c| c.y).sum::<f64>() / 4.0;
        assert_abs_diff_eq!(cx, c.x, epsilon = 1e-6);
        assert_abs_diff_eq!(cy, c.y, epsilon = 1e-6);
    }

    fn assert_planar_square(poly: &Polygon, side: f64) {
        let ring = planar_ring(poly);
        for i in 0..4 {
            assert_abs_diff_eq!(distance(ring[i], ring[i + 1]), side, epsilon = 1e-6);
        }
    }

    #[test]
    fn polar_point_stays_in_place() {
        let buffered = buffer_geometry(
            &Geometry::Point(Point::new(10.0, -87.0)),
            Length::new::<meter>(25.0),
        )
        .unwrap();
        let Geometry::Polygon(poly) = buffered else {
            panic!("expected a polygon");
        };
        assert_closed(&poly);
        assert_planar_square(&poly, 25.0);
        for c in poly.exterior().coords() {
            assert_abs_diff_eq!(c.y, -87.0, epsilon = 1e-3);
            assert_abs_diff_eq!(c.x, 10.0, epsilon = 1e-2);
        }
    }

    #[test]
    fn polar_line_is_buffered() {
        let line = Geometry::LineString(line_string![(x: 10.0, y: 86.0), (x: 10.0, y: 87.0)]);
        let buffered = buffer_geometry(&line, Length::new::<meter>(25.0)).unwrap();
        let Geometry::Polygon(poly) = buffered else {
            panic!("expected a polygon");
        };
        assert_closed(&poly);
        assert_eq!(poly.exterior().0.len(), 5);
        let ring = planar_ring(&poly);
        assert_abs_diff_eq!(distance(ring[1], ring[2]), 25.0, epsilon = 1e-6);
        let (min_y, max_y) = poly
            .exterior()
            .coords()
            .fold((f64::MAX, f64::MIN), |(lo, hi), c| (lo.min(c.y), hi.max(c.y)));
        assert_abs_diff_eq!(min_y, 86.0, epsilon = 1e-3);
        assert_abs_diff_eq!(max_y, 87.0, epsilon = 1e-3);
    }

    #[test]
    fn antimeridian_point_is_square() {
        let poly = buffer_point(coord! {x: 180.0, y: 0.0}, &width(25.0), &WebMercator);
        assert_closed(&poly);
        assert_planar_square(&poly, 25.0);
        let ring = &poly.exterior().0;
        assert!(ring[1].x > 180.0);
        assert!(ring[0].x < 180.0);
    }

    #[test]
    fn two_point_line_is_rectangle() {
        let coords = [coord! {x: 0.0, y: 0.0}, coord! {x: 0.0, y: 1.0}];
        let poly = buffer_line(&coords, 5.0, &WebMercator).unwrap();
        assert_closed(&poly);
        assert_eq!(poly.exterior().0.len(), 5);

        let ring = planar_ring(&poly);
        let p0 = WebMercator.to_planar(coords[0]);
        let p1 = WebMercator.to_planar(coords[1]);

        // left side of a line heading north is west
        assert_abs_diff_eq!(ring[0].x, p0.x - 5.0, epsilon = 1e-6);
        assert_abs_diff_eq!(ring[1].x, p1.x - 5.0, epsilon = 1e-6);
        assert_abs_diff_eq!(ring[2].x, p1.x + 5.0, epsilon = 1e-6);
        assert_abs_diff_eq!(ring[3].x, p0.x + 5.0, epsilon = 1e-6);

        // caps have the full width
        assert_abs_diff_eq!(distance(ring[1], ring[2]), 10.0, epsilon = 1e-6);
        assert_abs_diff_eq!(distance(ring[3], ring[0]), 10.0, epsilon = 1e-6);

        // sides have the length of the line
        let length = distance(p0, p1);
        assert_abs_diff_eq!(distance(ring[0], ring[1]), length, epsilon = 1e-6);
        assert_abs_diff_eq!(distance(ring[2], ring[3]), length, epsilon = 1e-6);
        let geodesic_length = geodesic_distance(coords[0], coords[1]);
        assert!(approx_eq!(f64, length, geodesic_length, epsilon = 0.01 * geodesic_length));
    }

    #[test]
    fn line_ring_grows_linearly() {
        let coords: Vec<_> = (0..6)
            .map(|i| coord! {x: 8.0 + i as f64 * 0.001, y: 50.0 + (i % 2) as f64 * 0.000_1})
            .collect();
        let poly = buffer_line(&coords, 12.5, &WebMercator).unwrap();
        assert_closed(&poly);
        assert_eq!(poly.exterior().0.len(), 2 * coords.len() + 1);
    }

    #[test]
    fn line_offsets_of_shared_vertex_mirror_each_other() {
        let coords = [
            coord! {x: 0.0, y: 0.0},
            coord! {x: 0.0, y: 0.001},
            coord! {x: 0.000_2, y: 0.002},
        ];
        let poly = buffer_line(&coords, 5.0, &WebMercator).unwrap();
        let ring = planar_ring(&poly);
        let n = coords.len();
        for (i, c) in coords.iter().enumerate() {
            let p = WebMercator.to_planar(*c);
            let left = ring[i];
            let right = ring[2 * n - 1 - i];
            assert_abs_diff_eq!((left.x + right.x) / 2.0, p.x, epsilon = 1e-6);
            assert_abs_diff_eq!((left.y + right.y) / 2.0, p.y, epsilon = 1e-6);
            assert_abs_diff_eq!(distance(left, right), 10.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn line_of_single_coordinate_is_square() {
        let c = coord! {x: 10.0, y: 20.0};
        assert_eq!(
            buffer_line(&[c], 2.0, &WebMercator).unwrap(),
            buffer_point(c, &width(4.0), &WebMercator)
        );
    }

    #[test]
    fn line_errors() {
        assert_eq!(
            buffer_line(&[], 1.0, &WebMercator),
            Err(Error::TooFewCoordinates(0))
        );
        let c = coord! {x: 3.0, y: 3.0};
        assert_eq!(
            buffer_line(&[coord! {x: 0.0, y: 0.0}, c, c], 1.0, &WebMercator),
            Err(Error::DegenerateSegment { index: 1 })
        );
    }

    #[test]
    fn dispatch_point() {
        let geom = Geometry::Point(Point::new(10.0, 20.0));
        let buffered = buffer_geometry(&geom, Length::new::<meter>(4.0)).unwrap();
        match buffered {
            Geometry::Polygon(poly) => {
                assert_closed(&poly);
                assert_eq!(poly.exterior().0.len(), 5);
            }
            _ => panic!("expected a polygon"),
        }
    }

    #[test]
    fn dispatch_two_point_line() {
        let geom = Geometry::LineString(line_string![(x: 0.0, y: 0.0), (x: 0.0, y: 1.0)]);
        let buffered = buffer_geometry(&geom, Length::new::<meter>(10.0)).unwrap();
        match buffered {
            Geometry::Polygon(poly) => {
                assert_closed(&poly);
                assert_eq!(poly.exterior().0.len(), 5);
            }
            _ => panic!("expected a polygon"),
        }
    }

    #[test]
    fn dispatch_right_angle_line() {
        let geom = Geometry::LineString(line_string![
            (x: 0.0, y: 0.0),
            (x: 0.0, y: 1.0),
            (x: 1.0, y: 1.0)
        ]);
        let buffered = buffer_geometry(&geom, Length::new::<meter>(10.0)).unwrap();
        match buffered {
            Geometry::MultiPolygon(mp) => {
                assert_eq!(mp.0.len(), 3);
                for poly in mp.0.iter() {
                    assert_closed(poly);
                    assert_eq!(poly.exterior().0.len(), 5);
                }
                // the corner piece is a square around the sharp vertex
                let corner = WebMercator.to_planar(coord! {x: 0.0, y: 1.0});
                let ring = planar_ring(&mp.0[1]);
                assert_abs_diff_eq!(ring[0].x, corner.x - 5.0, epsilon = 1e-6);
                assert_abs_diff_eq!(ring[0].y, corner.y - 5.0, epsilon = 1e-6);
            }
            _ => panic!("expected a multipolygon"),
        }
    }

    #[test]
    fn dispatch_split_pieces_keep_width() {
        let geom = Geometry::LineString(line_string![
            (x: 0.0, y: 0.0),
            (x: 0.0, y: 0.01),
            (x: 0.01, y: 0.01)
        ]);
        let buffered = buffer_geometry(&geom, Length::new::<meter>(100.0)).unwrap();
        let Geometry::MultiPolygon(mp) = buffered else {
            panic!("expected a multipolygon")
        };
        let ring = planar_ring(&mp.0[0]);
        assert_abs_diff_eq!(distance(ring[1], ring[2]), 100.0, epsilon = 1e-6);
    }

    #[test]
    fn dispatch_collapsed_line_is_square() {
        // all coordinates within a few meters of the first one
        let geom = Geometry::LineString(line_string![
            (x: 7.0, y: 47.0),
            (x: 7.000_01, y: 47.0),
            (x: 7.000_02, y: 47.000_01)
        ]);
        let buffered = buffer_geometry(&geom, Length::new::<meter>(25.0)).unwrap();
        let Geometry::Polygon(poly) = buffered else {
            panic!("expected a polygon")
        };
        let ring = planar_ring(&poly);
        assert_abs_diff_eq!(distance(ring[0], ring[1]), 25.0, epsilon = 1e-6);
        assert_abs_diff_eq!(distance(ring[1], ring[2]), 25.0, epsilon = 1e-6);
    }

    #[test]
    fn dispatch_empty_line() {
        let geom = Geometry::LineString(LineString::new(vec![]));
        assert_eq!(
            buffer_geometry(&geom, Length::new::<meter>(25.0)),
            Err(Error::TooFewCoordinates(0))
        );
    }

    #[test]
    fn dispatch_polygon_passthrough() {
        let poly = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0)];
        let geom = Geometry::Polygon(poly.clone());
        assert_eq!(
            buffer_geometry(&geom, Length::new::<meter>(25.0)).unwrap(),
            geom
        );

        let geom = Geometry::MultiPolygon(MultiPolygon::new(vec![poly.clone(), poly]));
        assert_eq!(
            buffer_geometry(&geom, Length::new::<meter>(25.0)).unwrap(),
            geom
        );
    }

    #[test]
    fn dispatch_unsupported() {
        let geom = Geometry::GeometryCollection(GeometryCollection(vec![]));
        assert_eq!(
            buffer_geometry(&geom, Length::new::<meter>(25.0)),
            Err(Error::UnsupportedGeometryKind("GeometryCollection".to_string()))
        );

        let geom = Geometry::MultiPoint(MultiPoint::from(vec![(1.0, 2.0)]));
        assert_eq!(
            buffer_geometry(&geom, Length::new::<meter>(25.0)),
            Err(Error::UnsupportedGeometryKind("MultiPoint".to_string()))
        );
    }

    #[test]
    fn invalid_width_is_rejected() {
        let geom = Geometry::Point(Point::new(1.0, 2.0));
        assert_eq!(
            buffer_geometry(&geom, Length::new::<meter>(-1.0)),
            Err(Error::InvalidWidth(-1.0))
        );
    }
}
