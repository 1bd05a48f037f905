use encoding_rs::{Encoding, WINDOWS_1252};

use crate::error::{Error, Result};
use crate::feature::Feature;
use crate::resolver::ComponentRole;

use super::dbf::{DbfRows, FieldDescriptor};
use super::header::FileHeader;
use super::shp::ShapeRecords;
use super::shx::ShapeIndex;

/// Settings applied while decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Character encoding of `.dbf` text values and field names.
    pub encoding: &'static Encoding,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            encoding: WINDOWS_1252,
        }
    }
}

impl DecodeOptions {
    /// Options for an encoding named by a WHATWG label such as `"utf-8"` or `"latin1"`.
    pub fn from_label(label: &str) -> Option<Self> {
        Encoding::for_label(label.as_bytes()).map(|encoding| Self { encoding })
    }
}

/// Pairs `.shp` records with `.dbf` rows, one [`Feature`] per pull.
///
/// Geometry records and attribute rows are matched by ordinal position
/// only; if one side runs out before the other the decoder yields
/// [`Error::RecordCountMismatch`]. The first error ends iteration.
pub struct Decoder<'a> {
    header: FileHeader,
    shapes: ShapeRecords<'a>,
    rows: DbfRows<'a>,
    index: Option<ShapeIndex>,
    finished: bool,
}

impl<'a> Decoder<'a> {
    pub fn new(geometry: &'a [u8], attributes: &'a [u8], options: DecodeOptions) -> Result<Self> {
        let header = FileHeader::parse(geometry, ComponentRole::Geometry)?;
        let rows = DbfRows::new(attributes, options.encoding)?;
        Ok(Self {
            header,
            shapes: ShapeRecords::new(geometry),
            rows,
            index: None,
            finished: false,
        })
    }

    /// Attach the `.shx` index. It is only used to cross-check the record
    /// count, so an unreadable index is logged and ignored.
    pub fn with_index(mut self, index: &[u8]) -> Self {
        match ShapeIndex::parse(index) {
            Ok(index) => self.index = Some(index),
            Err(e) => log::warn!("ignoring unreadable index: {e}"),
        }
        self
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.rows.header().fields
    }

    fn fail(&mut self, err: Error) -> Option<Result<Feature>> {
        self.finished = true;
        Some(Err(err))
    }

    /// Records still in the `.shp` stream, stopping at the first bad one
    fn remaining_shapes(&mut self) -> usize {
        self.shapes.by_ref().take_while(Result::is_ok).count()
    }

    fn remaining_rows(&mut self) -> usize {
        self.rows.by_ref().take_while(Result::is_ok).count()
    }

    fn check_index(&self, decoded: usize) {
        if let Some(index) = &self.index
            && index.len() != decoded
        {
            log::warn!(
                "index lists {} record(s) but the geometry file holds {decoded}",
                index.len()
            );
        }
    }
}

impl Iterator for Decoder<'_> {
    type Item = Result<Feature>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.shapes.next() {
            Some(Ok(record)) => match self.rows.next() {
                Some(Ok(properties)) => Some(Ok(Feature {
                    geometry: record.geometry,
                    properties,
                })),
                Some(Err(e)) => self.fail(e),
                None => {
                    let attributes = self.rows.position();
                    let geometry = self.shapes.position() + self.remaining_shapes();
                    self.fail(Error::RecordCountMismatch {
                        geometry,
                        attributes,
                    })
                }
            },
            Some(Err(e)) => self.fail(e),
            None => {
                let geometry = self.shapes.position();
                self.finished = true;
                if self.rows.next().is_some() {
                    let attributes = geometry + 1 + self.remaining_rows();
                    return self.fail(Error::RecordCountMismatch {
                        geometry,
                        attributes,
                    });
                }
                self.check_index(geometry);
                None
            }
        }
    }
}
