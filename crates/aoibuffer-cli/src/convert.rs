use anyhow::{anyhow, Context, Result};
use aoibuffer::buffer::geometry_kind;
use aoibuffer::chunk::chunk_by_area;
use aoibuffer::{SquareBuffer, WebMercator};
use geo_types::{Geometry, MultiPolygon, Polygon};
use geojson::{Feature, JsonObject};
use indicatif::ProgressBar;
use rayon::prelude::*;
use tracing::warn;

/// the buffered geometries of a single input feature
#[derive(Debug, Clone, PartialEq)]
pub struct Converted {
    /// the input was a point, so `geometries` holds a single square
    pub from_point: bool,
    pub properties: JsonObject,
    pub geometries: Vec<Geometry>,
}

impl Converted {
    pub fn into_features(self) -> impl Iterator<Item = Feature> {
        let properties = self.properties;
        self.geometries
            .into_iter()
            .map(move |geom| to_feature(&geom, properties.clone()))
    }
}

fn to_feature(geom: &Geometry, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::from(geom))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

pub struct FeatureConverter {
    buffer: SquareBuffer<WebMercator>,
    area_limit_m2: f64,
    chunk_polygons: bool,
    id_field: Option<String>,
}

impl FeatureConverter {
    pub fn new(
        buffer: SquareBuffer<WebMercator>,
        area_limit_m2: f64,
        chunk_polygons: bool,
        id_field: Option<String>,
    ) -> Self {
        Self {
            buffer,
            area_limit_m2,
            chunk_polygons,
            id_field,
        }
    }

    pub fn convert(&self, feature: &Feature) -> Result<Converted> {
        let value = feature
            .geometry
            .as_ref()
            .map(|g| g.value.clone())
            .ok_or_else(|| anyhow!("feature has no geometry"))?;
        let geom: Geometry = value.try_into()?;

        let buffered = self.buffer.buffer_geometry(&geom)?;
        let geometries = match geom {
            Geometry::Polygon(_) | Geometry::MultiPolygon(_) if self.chunk_polygons => {
                chunk_by_area(&buffered, self.area_limit_m2)?
            }
            _ => vec![buffered],
        };

        Ok(Converted {
            from_point: matches!(geom, Geometry::Point(_)),
            properties: self.output_properties(feature),
            geometries,
        })
    }

    fn output_properties(&self, feature: &Feature) -> JsonObject {
        let mut properties = JsonObject::new();
        if let Some(id_field) = self.id_field.as_ref() {
            if let Some(value) = feature
                .properties
                .as_ref()
                .and_then(|props| props.get(id_field))
            {
                properties.insert("id".to_string(), value.clone());
            }
        }
        properties
    }

    /// convert all features in parallel, keeping their order.
    ///
    /// With `keep_going` failing features are logged and skipped, otherwise the
    /// first failure aborts the conversion.
    pub fn convert_all(
        &self,
        features: &[Feature],
        keep_going: bool,
        progress: &ProgressBar,
    ) -> Result<Vec<Converted>> {
        let results: Vec<_> = features
            .par_iter()
            .enumerate()
            .map(|(i, feature)| {
                let result = self
                    .convert(feature)
                    .with_context(|| format!("converting feature #{}", i));
                progress.inc(1);
                result
            })
            .collect();

        let mut converted = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(c) => converted.push(c),
                Err(e) if keep_going => warn!("skipping: {:#}", e),
                Err(e) => return Err(e),
            }
        }
        Ok(converted)
    }
}

/// build the output features, grouping runs of consecutive point squares into
/// multipolygons of up to `group_size` squares when `group_size` is given.
pub fn into_features(converted: Vec<Converted>, group_size: Option<usize>) -> Vec<Feature> {
    let group_size = match group_size {
        Some(gs) => gs.max(1),
        None => return converted.into_iter().flat_map(Converted::into_features).collect(),
    };

    let mut features = vec![];
    let mut squares: Vec<Polygon> = vec![];
    let flush = |squares: &mut Vec<Polygon>, features: &mut Vec<Feature>| {
        for group in squares.chunks(group_size) {
            let mp = Geometry::MultiPolygon(MultiPolygon::new(group.to_vec()));
            features.push(to_feature(&mp, JsonObject::new()));
        }
        squares.clear();
    };

    for c in converted {
        if c.from_point {
            for geom in c.geometries {
                match geom {
                    Geometry::Polygon(poly) => squares.push(poly),
                    other => warn!(
                        "not grouping a {} derived from a point",
                        geometry_kind(&other)
                    ),
                }
            }
        } else {
            flush(&mut squares, &mut features);
            features.extend(c.into_features());
        }
    }
    flush(&mut squares, &mut features);
    features
}
