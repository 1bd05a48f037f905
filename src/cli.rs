use std::path::PathBuf;

use clap::Parser;

use crate::resolver::is_shapefile_input;
use crate::shapefile::DecodeOptions;

#[derive(Parser, Debug)]
#[command(name = "shpingest")]
#[command(version)]
#[command(about = "Decode a shapefile upload into GeoJSON", long_about = None)]
#[command(after_help = "Examples:\n  \
  shpingest parcels.zip -o parcels.geojson      decode a zipped shapefile\n  \
  shpingest roads.shp roads.shx roads.dbf       decode loose component files\n  \
  shpingest --encoding utf-8 --pretty data.zip  decode UTF-8 attributes, indented output")]
pub struct Cli {
    /// A .zip archive, or .shp/.shx/.dbf (and optional .prj) files
    #[arg(value_name = "FILES")]
    pub files: Vec<PathBuf>,

    /// Write the GeoJSON document here instead of stdout
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Indent the GeoJSON output
    #[arg(long)]
    pub pretty: bool,

    /// Text encoding of .dbf attributes (any WHATWG label)
    #[arg(long, value_name = "LABEL", default_value = "windows-1252", value_parser = parse_encoding)]
    pub encoding: DecodeOptions,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,

    /// More log output (-vv => trace)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// The inputs with a shapefile-related extension, in the order given.
    pub fn shapefile_inputs(&self) -> Vec<PathBuf> {
        self.files
            .iter()
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(is_shapefile_input)
            })
            .cloned()
            .collect()
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    /// Log level filter applied unless `RUST_LOG` is set.
    pub fn log_level(&self) -> log::LevelFilter {
        match (self.quiet, self.verbose) {
            (q, _) if q > 1 => log::LevelFilter::Off,
            (1, _) => log::LevelFilter::Error,
            (_, 0) => log::LevelFilter::Warn,
            (_, 1) => log::LevelFilter::Info,
            (_, 2) => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

fn parse_encoding(label: &str) -> Result<DecodeOptions, String> {
    DecodeOptions::from_label(label).ok_or_else(|| format!("unknown text encoding {label:?}"))
}
