#![warn(
    clippy::all,
    clippy::correctness,
    clippy::suspicious,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    nonstandard_style
)]

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use aoibuffer::chunk::multipolygon_group_size;
use aoibuffer::{SquareBuffer, WebMercator};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use indicatif::{ProgressBar, ProgressStyle};
use mimalloc::MiMalloc;
use tracing::info;

use crate::config::{Config, NonZeroPositive};
use crate::convert::{into_features, FeatureConverter};
use crate::io::{read_csv_features, read_features, write_features, InputFormat};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

mod config;
mod convert;
mod io;

const ARG_INPUT: &str = "INPUT";
const ARG_OUTPUT: &str = "OUTPUT";
const ARG_WIDTH: &str = "width";
const ARG_THRESHOLD: &str = "sharp-angle-threshold";
const ARG_CONFIG: &str = "config";
const ARG_FORMAT: &str = "format";
const ARG_ID_FIELD: &str = "id-field";
const ARG_GROUP_POINTS: &str = "group-points";
const ARG_KEEP_GOING: &str = "keep-going";
const ARG_QUIET: &str = "quiet";

fn build_command() -> Command {
    Command::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::new(ARG_INPUT)
                .help("input GeoJSON file (FeatureCollection, Feature or Geometry) or CSV file with lat/lon columns")
                .value_parser(value_parser!(PathBuf))
                .required(true),
        )
        .arg(
            Arg::new(ARG_OUTPUT)
                .help("output file to write the GeoJSON FeatureCollection to")
                .value_parser(value_parser!(PathBuf))
                .required(true),
        )
        .arg(
            Arg::new(ARG_WIDTH)
                .help("width of the buffer in meters [default: 25]")
                .short('w')
                .long(ARG_WIDTH)
                .value_name("METERS")
                .value_parser(value_parser!(f64)),
        )
        .arg(
            Arg::new(ARG_THRESHOLD)
                .help("split lines at turns sharper than this angle in degrees [default: 45]")
                .short('t')
                .long(ARG_THRESHOLD)
                .value_name("DEGREES")
                .value_parser(value_parser!(f64)),
        )
        .arg(
            Arg::new(ARG_CONFIG)
                .help("YAML configuration file")
                .short('c')
                .long(ARG_CONFIG)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new(ARG_FORMAT)
                .help("format of the input file [default: csv for *.csv files, geojson otherwise]")
                .short('f')
                .long(ARG_FORMAT)
                .value_parser(["geojson", "csv"]),
        )
        .arg(
            Arg::new(ARG_ID_FIELD)
                .help("property or CSV column of the input to copy as `id` to the output features")
                .short('I')
                .long(ARG_ID_FIELD)
                .value_name("FIELD"),
        )
        .arg(
            Arg::new(ARG_GROUP_POINTS)
                .help("group the squares of consecutive points into multipolygons (always done for CSV input)")
                .long(ARG_GROUP_POINTS)
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_KEEP_GOING)
                .help("skip features which can not be converted instead of aborting")
                .long(ARG_KEEP_GOING)
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_QUIET)
                .help("only report warnings and errors")
                .short('q')
                .long(ARG_QUIET)
                .action(ArgAction::SetTrue),
        )
}

fn main() -> Result<()> {
    let matches = build_command().get_matches();
    let default_filter = if matches.get_flag(ARG_QUIET) {
        "warn"
    } else {
        "info"
    };
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, default_filter),
    );
    run(&matches)
}

fn required_path<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a Path> {
    matches
        .get_one::<PathBuf>(name)
        .map(PathBuf::as_path)
        .ok_or_else(|| anyhow!("missing argument {}", name))
}

/// configuration file values overridden by the values given on the command line
fn config_from_matches(matches: &ArgMatches) -> Result<Config> {
    let mut config = match matches.get_one::<PathBuf>(ARG_CONFIG) {
        Some(path) => Config::from_yaml_file(path)?,
        None => Config::default(),
    };
    if let Some(width) = matches.get_one::<f64>(ARG_WIDTH) {
        config.width_m = Some(NonZeroPositive::try_from(*width)?);
    }
    if let Some(threshold) = matches.get_one::<f64>(ARG_THRESHOLD) {
        config.sharp_angle_threshold_deg = Some(*threshold);
    }
    config.validate()?;
    Ok(config)
}

fn input_format(matches: &ArgMatches, input: &Path) -> InputFormat {
    match matches.get_one::<String>(ARG_FORMAT).map(String::as_str) {
        Some("csv") => InputFormat::Csv,
        Some(_) => InputFormat::GeoJson,
        None => InputFormat::from_path(input),
    }
}

fn progress_bar(len: usize, quiet: bool) -> Result<ProgressBar> {
    if quiet {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} features ({eta})")?
            .progress_chars("##-"),
    );
    Ok(pb)
}

fn run(matches: &ArgMatches) -> Result<()> {
    let quiet = matches.get_flag(ARG_QUIET);
    let input = required_path(matches, ARG_INPUT)?;
    let output = required_path(matches, ARG_OUTPUT)?;
    let config = config_from_matches(matches)?;
    let id_field = matches.get_one::<String>(ARG_ID_FIELD).cloned();
    let format = input_format(matches, input);

    // grouping would mix the ids of the grouped points
    let group_points = matches.get_flag(ARG_GROUP_POINTS) || format == InputFormat::Csv;
    let group_size = if group_points && id_field.is_none() {
        Some(multipolygon_group_size(config.width_m()))
    } else {
        None
    };

    info!("reading {}", input.display());
    let features = match format {
        InputFormat::GeoJson => read_features(input)?,
        InputFormat::Csv => read_csv_features(input, id_field.as_deref())?,
    };

    let converter = FeatureConverter::new(
        SquareBuffer::new(WebMercator, config.buffer_options()?)?,
        config.area_limit_m2(),
        config.chunk_polygons,
        id_field,
    );

    info!(
        "converting {} features to polygons using a width of {}m",
        features.len(),
        config.width_m()
    );
    let pb = progress_bar(features.len(), quiet)?;
    let converted = converter.convert_all(&features, matches.get_flag(ARG_KEEP_GOING), &pb)?;
    pb.finish_and_clear();

    let out_features = into_features(converted, group_size);
    info!(
        "writing {} features to {}",
        out_features.len(),
        output.display()
    );
    write_features(output, out_features)?;
    Ok(())
}
