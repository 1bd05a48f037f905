//! Component resolution: from uploaded files to the byte buffers the
//! decoder needs.
//!
//! Two kinds of upload are accepted and they have different minimum
//! requirements:
//!
//! - a zip archive must contain a `.shp` and a `.dbf` member
//! - loose files must include `.shp`, `.shx` and `.dbf`
//!
//! Archives are assumed to be self-consistent bundles, while a loose
//! upload has to name its index explicitly.

use std::borrow::Cow;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::io::{LocalFileReader, MemoryReader, ReadAt};
use crate::shapefile::{DecodeOptions, Decoder};
use crate::zip::ZipArchive;

/// Suffix identifying a zip bundle.
pub const ARCHIVE_EXTENSION: &str = ".zip";

/// The part a file plays in a shapefile, decided by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentRole {
    Geometry,
    Index,
    Attributes,
    Projection,
}

impl ComponentRole {
    pub const ALL: [ComponentRole; 4] = [
        ComponentRole::Geometry,
        ComponentRole::Index,
        ComponentRole::Attributes,
        ComponentRole::Projection,
    ];

    pub fn extension(self) -> &'static str {
        match self {
            ComponentRole::Geometry => ".shp",
            ComponentRole::Index => ".shx",
            ComponentRole::Attributes => ".dbf",
            ComponentRole::Projection => ".prj",
        }
    }

    /// Classify a file name by its (case-insensitive) extension.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|role| lower.ends_with(role.extension()))
    }
}

impl fmt::Display for ComponentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ComponentRole::Geometry => "geometry",
            ComponentRole::Index => "index",
            ComponentRole::Attributes => "attributes",
            ComponentRole::Projection => "projection",
        })
    }
}

pub fn is_archive_name(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(ARCHIVE_EXTENSION)
}

/// Whether a file name is something ingestion can use at all.
pub fn is_shapefile_input(name: &str) -> bool {
    is_archive_name(name) || ComponentRole::from_file_name(name).is_some()
}

/// Display name for a layer: the file name without its shapefile extension.
pub fn layer_name(file_name: &str) -> &str {
    let base = Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(file_name);
    let lower = base.to_ascii_lowercase();
    let known = std::iter::once(ARCHIVE_EXTENSION).chain(ComponentRole::ALL.map(ComponentRole::extension));
    for ext in known {
        if lower.ends_with(ext) {
            return &base[..base.len() - ext.len()];
        }
    }
    base
}

/// One uploaded file: a name plus a byte source.
///
/// The name is only used to classify the file; bytes are read when
/// resolution needs them.
#[derive(Clone)]
pub struct RawFile {
    name: String,
    source: Arc<dyn ReadAt>,
}

impl RawFile {
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::from_reader(name, Arc::new(MemoryReader::new(bytes)))
    }

    pub fn from_reader(name: impl Into<String>, source: Arc<dyn ReadAt>) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }

    /// Open a file on disk; its contents are read lazily.
    pub fn open(path: &Path) -> Result<Self> {
        let reader = LocalFileReader::new(path).map_err(|source| Error::Read {
            name: path.display().to_string(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::from_reader(name, Arc::new(reader)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.source.size()
    }

    pub fn role(&self) -> Option<ComponentRole> {
        ComponentRole::from_file_name(&self.name)
    }

    pub fn is_archive(&self) -> bool {
        is_archive_name(&self.name)
    }

    pub async fn read_all(&self) -> Result<Vec<u8>> {
        self.source.read_all().await.map_err(|source| Error::Read {
            name: self.name.clone(),
            source,
        })
    }
}

impl fmt::Debug for RawFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawFile")
            .field("name", &self.name)
            .field("size", &self.size())
            .finish()
    }
}

/// The files handed over for one ingestion attempt.
#[derive(Debug, Clone, Default)]
pub struct RawFileSet {
    files: Vec<RawFile>,
}

impl RawFileSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, file: RawFile) {
        self.files.push(file);
    }

    pub fn files(&self) -> &[RawFile] {
        &self.files
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Display name for the layer: the archive's name if there is one,
    /// otherwise the `.shp` file's.
    pub fn layer_name(&self) -> Option<&str> {
        self.files
            .iter()
            .find(|f| f.is_archive())
            .or_else(|| {
                self.files
                    .iter()
                    .find(|f| f.role() == Some(ComponentRole::Geometry))
            })
            .map(|f| layer_name(f.name()))
    }
}

impl FromIterator<RawFile> for RawFileSet {
    fn from_iter<T: IntoIterator<Item = RawFile>>(iter: T) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

/// Loose component files, bound to their roles.
#[derive(Debug, Clone, Default)]
pub struct LooseFiles {
    pub geometry: Option<RawFile>,
    pub index: Option<RawFile>,
    pub attributes: Option<RawFile>,
    pub projection: Option<RawFile>,
}

impl LooseFiles {
    /// Bind files to roles by extension. The first file for a role wins;
    /// unrecognised files are skipped.
    pub fn classify(files: &[RawFile]) -> Self {
        let mut loose = Self::default();
        for file in files {
            let Some(role) = file.role() else {
                log::debug!("ignoring {}: not a shapefile component", file.name());
                continue;
            };
            let slot = loose.slot(role);
            if let Some(existing) = slot {
                log::warn!(
                    "ignoring {}: {} already supplied by {}",
                    file.name(),
                    role,
                    existing.name()
                );
            } else {
                *slot = Some(file.clone());
            }
        }
        loose
    }

    fn slot(&mut self, role: ComponentRole) -> &mut Option<RawFile> {
        match role {
            ComponentRole::Geometry => &mut self.geometry,
            ComponentRole::Index => &mut self.index,
            ComponentRole::Attributes => &mut self.attributes,
            ComponentRole::Projection => &mut self.projection,
        }
    }

    /// Required roles with no file, in role order.
    pub fn missing_roles(&self) -> Vec<ComponentRole> {
        [
            (ComponentRole::Geometry, &self.geometry),
            (ComponentRole::Index, &self.index),
            (ComponentRole::Attributes, &self.attributes),
        ]
        .into_iter()
        .filter(|(_, file)| file.is_none())
        .map(|(role, _)| role)
        .collect()
    }
}

/// An upload, split by which validation policy applies to it.
#[derive(Debug, Clone)]
pub enum Upload {
    Archive(RawFile),
    Loose(LooseFiles),
}

impl Upload {
    /// An upload containing any `.zip` is treated as that archive; the
    /// first one wins and everything else is ignored.
    pub fn from_file_set(files: &RawFileSet) -> Self {
        let mut archives = files.files().iter().filter(|f| f.is_archive());
        if let Some(archive) = archives.next() {
            if files.len() > 1 {
                log::warn!(
                    "using archive {} and ignoring {} other file(s)",
                    archive.name(),
                    files.len() - 1
                );
            }
            return Upload::Archive(archive.clone());
        }
        Upload::Loose(LooseFiles::classify(files.files()))
    }

    /// Files passed by position: geometry (or an archive), index,
    /// attributes, projection.
    pub fn positional(
        geometry: RawFile,
        index: Option<RawFile>,
        attributes: Option<RawFile>,
        projection: Option<RawFile>,
    ) -> Self {
        if geometry.is_archive() {
            return Upload::Archive(geometry);
        }
        Upload::Loose(LooseFiles {
            geometry: Some(geometry),
            index,
            attributes,
            projection,
        })
    }

    /// Layer display name taken from the archive or the `.shp` file.
    pub fn layer_name(&self) -> Option<&str> {
        let file = match self {
            Upload::Archive(file) => Some(file),
            Upload::Loose(loose) => loose.geometry.as_ref(),
        };
        file.map(|f| layer_name(f.name()))
    }
}

/// The byte buffers a decode needs. Geometry and attributes are always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentBundle {
    geometry: Vec<u8>,
    attributes: Vec<u8>,
    index: Option<Vec<u8>>,
    projection: Option<Vec<u8>>,
}

impl ComponentBundle {
    /// Fails with [`Error::MissingRequiredComponent`] naming every absent
    /// required buffer.
    pub fn new(
        geometry: Option<Vec<u8>>,
        attributes: Option<Vec<u8>>,
        index: Option<Vec<u8>>,
        projection: Option<Vec<u8>>,
    ) -> Result<Self> {
        match (geometry, attributes) {
            (Some(geometry), Some(attributes)) => Ok(Self {
                geometry,
                attributes,
                index,
                projection,
            }),
            (geometry, attributes) => {
                let mut roles = Vec::new();
                if geometry.is_none() {
                    roles.push(ComponentRole::Geometry);
                }
                if attributes.is_none() {
                    roles.push(ComponentRole::Attributes);
                }
                Err(Error::MissingRequiredComponent { roles })
            }
        }
    }

    pub fn geometry(&self) -> &[u8] {
        &self.geometry
    }

    pub fn attributes(&self) -> &[u8] {
        &self.attributes
    }

    pub fn index(&self) -> Option<&[u8]> {
        self.index.as_deref()
    }

    pub fn projection(&self) -> Option<&[u8]> {
        self.projection.as_deref()
    }

    /// The `.prj` well-known text. Carried through but not applied.
    pub fn projection_wkt(&self) -> Option<Cow<'_, str>> {
        self.projection
            .as_deref()
            .map(|bytes| String::from_utf8_lossy(bytes))
    }

    /// A lazy feature decoder over these buffers.
    pub fn decoder(&self, options: DecodeOptions) -> Result<Decoder<'_>> {
        let decoder = Decoder::new(&self.geometry, &self.attributes, options)?;
        Ok(match self.index() {
            Some(index) => decoder.with_index(index),
            None => decoder,
        })
    }
}

/// Read and bind the buffers for an upload.
pub async fn resolve(upload: &Upload) -> Result<ComponentBundle> {
    match upload {
        Upload::Archive(file) => resolve_archive(file).await,
        Upload::Loose(files) => resolve_loose(files).await,
    }
}

async fn resolve_archive(file: &RawFile) -> Result<ComponentBundle> {
    let archive = ZipArchive::open(file.source.clone()).await?;

    let geometry = archive.find_by_extension(ComponentRole::Geometry.extension());
    let attributes = archive.find_by_extension(ComponentRole::Attributes.extension());
    let missing: Vec<_> = [
        (ComponentRole::Geometry, geometry),
        (ComponentRole::Attributes, attributes),
    ]
    .into_iter()
    .filter(|(_, member)| member.is_none())
    .map(|(role, _)| role)
    .collect();
    let (Some(geometry), Some(attributes)) = (geometry, attributes) else {
        return Err(Error::MissingRequiredComponent { roles: missing });
    };
    log::debug!("{}: using members {geometry} and {attributes}", file.name());

    let geometry = archive.extract(geometry).await?;
    let attributes = archive.extract(attributes).await?;

    let mut optional = [None, None];
    for (slot, role) in optional
        .iter_mut()
        .zip([ComponentRole::Index, ComponentRole::Projection])
    {
        let Some(member) = archive.find_by_extension(role.extension()) else {
            continue;
        };
        match archive.extract(member).await {
            Ok(bytes) => *slot = Some(bytes),
            Err(e) => log::warn!("ignoring unreadable {role} member {member}: {e}"),
        }
    }
    let [index, projection] = optional;

    ComponentBundle::new(Some(geometry), Some(attributes), index, projection)
}

async fn resolve_loose(files: &LooseFiles) -> Result<ComponentBundle> {
    let missing = files.missing_roles();
    if !missing.is_empty() {
        return Err(Error::MissingRequiredComponent { roles: missing });
    }

    async fn read(file: &Option<RawFile>) -> Result<Option<Vec<u8>>> {
        match file {
            Some(file) => Ok(Some(file.read_all().await?)),
            None => Ok(None),
        }
    }

    let projection = match read(&files.projection).await {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("ignoring unreadable projection: {e}");
            None
        }
    };

    ComponentBundle::new(
        read(&files.geometry).await?,
        read(&files.attributes).await?,
        read(&files.index).await?,
        projection,
    )
}
