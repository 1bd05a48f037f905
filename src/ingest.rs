//! The ingestion entry point: files in, feature collection out.

use crate::error::Result;
use crate::feature::FeatureCollection;
use crate::resolver::{self, ComponentBundle, RawFile, RawFileSet, Upload};
use crate::shapefile::DecodeOptions;

pub use crate::resolver::layer_name;

/// Runs the whole pipeline with one set of [`DecodeOptions`].
///
/// Each call is independent; an `Ingestor` holds no state besides its options.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ingestor {
    options: DecodeOptions,
}

impl Ingestor {
    pub fn new(options: DecodeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> DecodeOptions {
        self.options
    }

    /// Resolve an upload to its component buffers without decoding them.
    ///
    /// Use [`ComponentBundle::decoder`] to pull features one at a time.
    pub async fn resolve(&self, upload: &Upload) -> Result<ComponentBundle> {
        resolver::resolve(upload).await
    }

    pub async fn ingest_upload(&self, upload: &Upload) -> Result<FeatureCollection> {
        let bundle = self.resolve(upload).await?;
        let collection = FeatureCollection::assemble(bundle.decoder(self.options)?)?;
        log::debug!(
            "decoded {} feature(s) from {}",
            collection.len(),
            upload.layer_name().unwrap_or("upload")
        );
        Ok(collection)
    }

    /// Ingest files classified by extension. Any `.zip` takes precedence.
    pub async fn ingest_files(&self, files: &RawFileSet) -> Result<FeatureCollection> {
        self.ingest_upload(&Upload::from_file_set(files)).await
    }

    /// Ingest files bound by position.
    ///
    /// When `geometry` is a `.zip` archive the other arguments are ignored
    /// and the components come from the archive.
    pub async fn ingest(
        &self,
        geometry: RawFile,
        index: Option<RawFile>,
        attributes: Option<RawFile>,
        projection: Option<RawFile>,
    ) -> Result<FeatureCollection> {
        let upload = Upload::positional(geometry, index, attributes, projection);
        self.ingest_upload(&upload).await
    }
}

/// [`Ingestor::ingest`] with default options.
pub async fn ingest(
    geometry: RawFile,
    index: Option<RawFile>,
    attributes: Option<RawFile>,
    projection: Option<RawFile>,
) -> Result<FeatureCollection> {
    Ingestor::default()
        .ingest(geometry, index, attributes, projection)
        .await
}
