use std::ops::Deref;
use std::path::Path;

use anyhow::Context;
use aoibuffer::chunk::AREA_LIMIT_M2;
use aoibuffer::segment::DEFAULT_SHARP_ANGLE_THRESHOLD_DEG;
use aoibuffer::{BufferOptions, Width, DEFAULT_WIDTH_M};
use serde::Deserialize;
use uom::si::f64::Length;
use uom::si::length::meter;

#[derive(Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(try_from = "f64")]
pub struct NonZeroPositive(f64);

impl TryFrom<f64> for NonZeroPositive {
    type Error = anyhow::Error;

    fn try_from(value: f64) -> std::result::Result<Self, Self::Error> {
        if !value.is_normal() || value <= 0.0 {
            Err(Self::Error::msg(format!("value must be > 0.0, got {}", value)))
        } else {
            Ok(Self(value))
        }
    }
}

impl Deref for NonZeroPositive {
    type Target = f64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

fn default_chunk_polygons() -> bool {
    true
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// full width of the buffer in meters
    pub width_m: Option<NonZeroPositive>,

    /// turns above this angle split lines into separately buffered pieces
    pub sharp_angle_threshold_deg: Option<f64>,

    /// coordinates closer than this to their predecessor are removed from lines.
    ///
    /// Defaults to `width_m`.
    pub min_segment_length_m: Option<f64>,

    /// polygons and multipolygons of the input larger than this get split
    pub area_limit_m2: Option<NonZeroPositive>,

    #[serde(default = "default_chunk_polygons")]
    pub chunk_polygons: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            width_m: None,
            sharp_angle_threshold_deg: None,
            min_segment_length_m: None,
            area_limit_m2: None,
            chunk_polygons: default_chunk_polygons(),
        }
    }
}

impl Config {
    pub fn from_yaml_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(threshold) = self.sharp_angle_threshold_deg {
            if !(0.0..=180.0).contains(&threshold) {
                anyhow::bail!(
                    "sharp_angle_threshold_deg must be within [0, 180], got {}",
                    threshold
                );
            }
        }
        if let Some(min_segment_length) = self.min_segment_length_m {
            if !min_segment_length.is_finite() || min_segment_length < 0.0 {
                anyhow::bail!(
                    "min_segment_length_m must be >= 0.0, got {}",
                    min_segment_length
                );
            }
        }
        Ok(())
    }

    pub fn width_m(&self) -> f64 {
        self.width_m.map(|w| *w).unwrap_or(DEFAULT_WIDTH_M)
    }

    pub fn area_limit_m2(&self) -> f64 {
        self.area_limit_m2.map(|a| *a).unwrap_or(AREA_LIMIT_M2)
    }

    pub fn buffer_options(&self) -> anyhow::Result<BufferOptions> {
        self.validate()?;
        Ok(BufferOptions {
            width: Width::try_from(self.width_m())?,
            sharp_angle_threshold_deg: self
                .sharp_angle_threshold_deg
                .unwrap_or(DEFAULT_SHARP_ANGLE_THRESHOLD_DEG),
            min_segment_length: self
                .min_segment_length_m
                .map(|m| Length::new::<meter>(m)),
        })
    }
}
