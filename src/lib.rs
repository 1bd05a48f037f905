//! # shpingest
//!
//! Shapefile ingestion: turn an uploaded shapefile, either a `.zip` bundle or
//! loose component files, into a GeoJSON-shaped feature collection.
//!
//! The pipeline runs in four stages:
//!
//! 1. **Resolve** the upload into component buffers ([`resolver`]). A zip
//!    archive needs `.shp` and `.dbf` members; loose files need `.shp`,
//!    `.shx` and `.dbf`. A `.prj` is carried along when present.
//! 2. **Extract** archive members through a random-access [`ReadAt`] source
//!    ([`zip`]), with STORED and DEFLATE members and CRC-32 checks.
//! 3. **Decode** geometry records and attribute rows in lockstep
//!    ([`shapefile`]), one feature at a time.
//! 4. **Assemble** the features, in order, into a [`FeatureCollection`].
//!
//! Any failure aborts the whole attempt with an [`Error`] naming its stage;
//! there are no partial results.
//!
//! ## Features
//!
//! - Point, MultiPoint, PolyLine and Polygon shapes, with their Z and M variants
//! - Polygon rings grouped into shells and holes by winding order
//! - dBASE attribute values typed as strings, numbers, booleans or dates
//! - Configurable attribute text encoding (windows-1252 by default)
//! - ZIP64 archives
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use shpingest::{Ingestor, RawFile, RawFileSet};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let files: RawFileSet = ["parcels.shp", "parcels.shx", "parcels.dbf"]
//!         .into_iter()
//!         .map(|name| RawFile::open(Path::new(name)))
//!         .collect::<Result<_, _>>()?;
//!
//!     let collection = Ingestor::default().ingest_files(&files).await?;
//!     for feature in &collection.features {
//!         println!("{:?}", feature.properties);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;
pub mod feature;
pub mod geometry;
pub mod ingest;
pub mod io;
pub mod resolver;
pub mod shapefile;
pub mod zip;

pub use cli::Cli;
pub use error::{Error, Result};
pub use feature::{Feature, FeatureCollection, Properties};
pub use geometry::{Geometry, Position, Ring};
pub use ingest::{Ingestor, ingest, layer_name};
pub use io::{LocalFileReader, MemoryReader, ReadAt};
pub use resolver::{ComponentBundle, ComponentRole, LooseFiles, RawFile, RawFileSet, Upload};
pub use shapefile::{DecodeOptions, Decoder};
pub use zip::{ZipArchive, ZipFileEntry};
