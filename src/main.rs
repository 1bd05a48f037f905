//! Main entry point for the shpingest CLI application.
//!
//! This binary decodes a shapefile upload, given as a zip archive or as
//! loose component files, and writes the resulting GeoJSON document.

use anyhow::{Result, bail};
use clap::Parser;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

use shpingest::{Cli, FeatureCollection, Ingestor, RawFile, RawFileSet, Upload};

const NO_INPUT: &str = "Please select a shapefile (.zip) or shapefile components (.shp, .shx, .dbf)";

/// Application entry point.
///
/// Parses command-line arguments, installs the logger and runs one
/// ingestion over the selected files.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .init();

    let inputs = cli.shapefile_inputs();
    if inputs.is_empty() {
        bail!(NO_INPUT);
    }
    for skipped in cli.files.iter().filter(|f| !inputs.contains(f)) {
        log::warn!("skipping {}: not a shapefile component", skipped.display());
    }

    let files = open_inputs(&inputs)?;
    let upload = Upload::from_file_set(&files);
    let name = upload.layer_name().unwrap_or("layer").to_string();

    let collection = Ingestor::new(cli.encoding)
        .ingest_upload(&upload)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to parse shapefile ({}): {e}", e.stage()))?;

    write_output(&collection, &cli).await?;

    if !cli.is_quiet() {
        eprintln!("Loaded layer '{name}' ({} features)", collection.len());
    }

    Ok(())
}

/// Open every input lazily; nothing is read until resolution needs it.
fn open_inputs(paths: &[PathBuf]) -> Result<RawFileSet> {
    paths
        .iter()
        .map(|path| {
            RawFile::open(path)
                .map_err(|e| anyhow::anyhow!("Failed to parse shapefile ({}): {e}", e.stage()))
        })
        .collect()
}

/// Serialise the collection to the `-o` file, or to stdout.
async fn write_output(collection: &FeatureCollection, cli: &Cli) -> Result<()> {
    let mut json = if cli.pretty {
        serde_json::to_vec_pretty(collection)?
    } else {
        serde_json::to_vec(collection)?
    };
    json.push(b'\n');

    match &cli.output {
        Some(path) => tokio::fs::write(path, &json).await?,
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&json).await?;
            stdout.flush().await?;
        }
    }

    Ok(())
}
