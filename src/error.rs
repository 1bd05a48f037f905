//! Error type shared by every ingestion stage.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::resolver::ComponentRole;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures raised while turning uploaded files into a feature collection.
///
/// Every variant is fatal to the ingestion attempt that produced it.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An input file could not be read.
    #[error("failed to read {name}: {source}")]
    Read {
        /// Name of the input as supplied by the caller.
        name: String,
        source: io::Error,
    },
    /// The zip archive could not be opened or one of its members is damaged.
    #[error("archive could not be opened: {reason}")]
    ArchiveCorrupt { reason: String },
    /// Extraction was requested for a member the archive does not contain.
    #[error("archive has no member named {name:?}")]
    MemberNotFound { name: String },
    /// One or more required component files are absent from the upload.
    #[error("missing required shapefile component(s): {}", RoleList(.roles))]
    MissingRequiredComponent { roles: Vec<ComponentRole> },
    /// A `.shp`, `.shx` or `.dbf` header is unreadable.
    #[error("invalid {role} header: {reason}")]
    MalformedHeader { role: ComponentRole, reason: String },
    /// A geometry record extends past the bytes available to it.
    #[error(
        "geometry record {record} at byte {offset} needs {needed} bytes but only {available} remain"
    )]
    TruncatedGeometryRecord {
        /// Zero-based ordinal of the record.
        record: usize,
        offset: usize,
        needed: usize,
        available: usize,
    },
    /// A geometry record is long enough but its counts or offsets are inconsistent.
    #[error("geometry record {record} is malformed: {reason}")]
    MalformedGeometryRecord { record: usize, reason: String },
    /// A geometry record carries a shape type code this decoder does not know.
    #[error("geometry record {record} has unsupported geometry type code {code}")]
    UnsupportedGeometryType { record: usize, code: i32 },
    /// An attribute row could not be decoded.
    #[error("attribute row {row} is malformed: {reason}")]
    MalformedAttributes { row: usize, reason: String },
    /// The geometry and attribute files disagree on the number of records.
    #[error("geometry file has {geometry} record(s) but attribute table has {attributes} row(s)")]
    RecordCountMismatch { geometry: usize, attributes: usize },
}

impl Error {
    /// Name of the pipeline stage that failed, for messages shown to users.
    pub fn stage(&self) -> &'static str {
        match self {
            Error::Read { .. } => "file read",
            Error::ArchiveCorrupt { .. } => "archive open",
            Error::MemberNotFound { .. } | Error::MissingRequiredComponent { .. } => {
                "missing component"
            }
            Error::MalformedHeader { .. }
            | Error::TruncatedGeometryRecord { .. }
            | Error::MalformedGeometryRecord { .. }
            | Error::UnsupportedGeometryType { .. }
            | Error::MalformedAttributes { .. } => "binary decode",
            Error::RecordCountMismatch { .. } => "count mismatch",
        }
    }

    pub(crate) fn corrupt_archive(reason: impl Into<String>) -> Self {
        Error::ArchiveCorrupt {
            reason: reason.into(),
        }
    }
}

struct RoleList<'a>(&'a [ComponentRole]);

impl fmt::Display for RoleList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, role) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{role} ({})", role.extension())?;
        }
        Ok(())
    }
}
