#![warn(
    clippy::all,
    clippy::correctness,
    clippy::suspicious,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    nonstandard_style
)]

//! Buffering of points and lines given in WGS84 coordinates into polygons
//! of a fixed metric width.
//!
//! Points become squares, lines become chains of rectangles with flat caps. The
//! offsets are calculated in spherical mercator, so the buffer is only exact
//! in that projection. Lines get split at sharp turns as the offset chains
//! would self-intersect there.
//!
//! ```
//! use aoibuffer::buffer_geometry;
//! use geo_types::{line_string, Geometry};
//! use uom::si::f64::Length;
//! use uom::si::length::meter;
//!
//! let line = Geometry::LineString(line_string![(x: 13.40, y: 52.52), (x: 13.41, y: 52.52)]);
//! let buffered = buffer_geometry(&line, Length::new::<meter>(25.0)).unwrap();
//! assert!(matches!(buffered, Geometry::Polygon(_)));
//! ```

pub mod buffer;
pub mod chunk;
pub mod error;
pub mod geodesy;
pub mod segment;
pub mod webmercator;

pub use crate::buffer::{
    buffer_geometry, buffer_line, buffer_point, BufferOptions, SquareBuffer, Width,
    DEFAULT_WIDTH_M,
};
pub use crate::error::Error;
pub use crate::webmercator::{Projection, WebMercator};
