//! Shapefile decoding.
//!
//! A shapefile is a set of sibling files sharing a base name:
//!
//! - `.shp`: the geometry records, after a 100-byte header
//! - `.shx`: fixed-size offsets into `.shp`, one per record
//! - `.dbf`: a dBASE table with one attribute row per record
//!
//! [`Decoder`] walks `.shp` and `.dbf` in lockstep and yields one
//! [`Feature`](crate::feature::Feature) per record. The `.shx` index is
//! optional; records are found by following each record's declared length.

mod dbf;
mod decoder;
mod header;
mod rings;
mod shp;
mod shx;

pub use dbf::{DbfHeader, DbfRows, FieldDescriptor, FieldType, decode_value};
pub use decoder::{DecodeOptions, Decoder};
pub use header::{BoundingBox, FILE_CODE, FileHeader, HEADER_LEN};
pub use shp::{RECORD_HEADER_LEN, ShapeRecord, ShapeRecords, ShapeType, read_record};
pub use shx::{IndexEntry, ShapeIndex};
