use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use csv::StringRecord;
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject, JsonValue, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    GeoJson,

    /// one point per row
    Csv,
}

impl InputFormat {
    /// files ending in `.csv` are read as CSV, everything else as GeoJSON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Self::Csv,
            _ => Self::GeoJson,
        }
    }
}

/// read all features of a GeoJSON document.
///
/// A single feature or a bare geometry are treated as a collection of one
/// feature.
pub fn read_features(path: &Path) -> Result<Vec<Feature>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    parse_features(&contents).with_context(|| format!("parsing {}", path.display()))
}

pub fn parse_features(contents: &str) -> Result<Vec<Feature>> {
    let features = match contents.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::Geometry(geometry) => vec![Feature::from(geometry)],
    };
    Ok(features)
}

/// column positions of a CSV file
#[derive(Debug, PartialEq, Eq)]
struct CsvColumns {
    lon: usize,
    lat: usize,
    id: Option<usize>,
}

impl CsvColumns {
    /// locate the coordinate columns (`lon`/`longitude`, `lat`/`latitude`) and
    /// the optional id column. Names are matched case-insensitively.
    fn from_headers(headers: &StringRecord, id_field: Option<&str>) -> Result<Self> {
        let (mut lon, mut lat, mut id) = (None, None, None);
        for (i, name) in headers.iter().enumerate() {
            let name = name.trim();
            if name.eq_ignore_ascii_case("lat") || name.eq_ignore_ascii_case("latitude") {
                lat = Some(i);
            } else if name.eq_ignore_ascii_case("lon") || name.eq_ignore_ascii_case("longitude") {
                lon = Some(i);
            } else if id_field.map_or(false, |field| name.eq_ignore_ascii_case(field)) {
                id = Some(i);
            }
        }

        if let (Some(field), None) = (id_field, id) {
            bail!("id column {} not found", field);
        }
        Ok(Self {
            lon: lon.ok_or_else(|| anyhow!("no lon or longitude column found"))?,
            lat: lat.ok_or_else(|| anyhow!("no lat or latitude column found"))?,
            id,
        })
    }
}

pub fn read_csv_features(path: &Path, id_field: Option<&str>) -> Result<Vec<Feature>> {
    let file = File::open(path).with_context(|| format!("reading {}", path.display()))?;
    parse_csv_features(file, id_field).with_context(|| format!("parsing {}", path.display()))
}

/// read the rows of a CSV document as point features.
///
/// With `id_field` the value of that column is stored as a string property
/// of the same name.
pub fn parse_csv_features<R: Read>(reader: R, id_field: Option<&str>) -> Result<Vec<Feature>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let columns = CsvColumns::from_headers(reader.headers()?, id_field)?;

    let mut features = vec![];
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let row = i + 1;
        let column = |idx: usize| {
            record
                .get(idx)
                .ok_or_else(|| anyhow!("row {} has no column {}", row, idx))
        };
        let lon: f64 = column(columns.lon)?
            .parse()
            .with_context(|| format!("invalid longitude in row {}", row))?;
        let lat: f64 = column(columns.lat)?
            .parse()
            .with_context(|| format!("invalid latitude in row {}", row))?;

        let mut properties = JsonObject::new();
        if let (Some(field), Some(idx)) = (id_field, columns.id) {
            properties.insert(
                field.to_string(),
                JsonValue::String(column(idx)?.to_string()),
            );
        }
        features.push(Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(Value::Point(vec![lon, lat]))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        });
    }
    Ok(features)
}

pub fn write_feature_collection<W: Write>(mut writer: W, features: Vec<Feature>) -> Result<()> {
    let fc = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };
    serde_json::to_writer(&mut writer, &fc)?;
    writer.flush()?;
    Ok(())
}

pub fn write_features(path: &Path, features: Vec<Feature>) -> Result<()> {
    let writer = BufWriter::new(
        File::create(path).with_context(|| format!("creating {}", path.display()))?,
    );
    write_feature_collection(writer, features)
}
