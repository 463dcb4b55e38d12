#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("unsupported geometry kind: {0}")]
    UnsupportedGeometryKind(String),

    #[error("buffer width must be a finite value > 0.0 meters, got {0}")]
    InvalidWidth(f64),

    #[error("sharp angle threshold must be within [0, 180] degrees, got {0}")]
    InvalidThreshold(f64),

    #[error("insufficient number of coordinates: {0}")]
    TooFewCoordinates(usize),

    #[error("segment starting at coordinate {index} has zero length")]
    DegenerateSegment { index: usize },
}
