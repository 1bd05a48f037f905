//! ZIP archive parsing and extraction.
//!
//! Shapefiles are usually shared as a zip bundle of their component
//! files; this module opens such a bundle from any [`ReadAt`](crate::io::ReadAt)
//! source and hands back member contents as byte buffers.
//!
//! Lookups go by extension, because that is all a shapefile bundle
//! guarantees: members may sit in subdirectories and their names may be
//! in any case. [`ZipArchive::find_by_extension`] returns the first match
//! in central-directory order, so a bundle with two `.shp` members
//! silently uses whichever was stored first.
//!
//! [`parser`] locates the end-of-central-directory record (ZIP64 aware)
//! and lists the members; [`archive`] resolves names and inflates data.
//! Encrypted and multi-disk archives are rejected, as is any compression
//! method other than STORED and DEFLATE.

mod archive;
mod parser;
mod structures;

pub use archive::ZipArchive;
pub use parser::ZipParser;
pub use structures::*;
