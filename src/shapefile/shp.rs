//! `.shp` record decoding.
//!
//! Records are decoded by [`read_record`], a pure function from a buffer and
//! a byte offset to the decoded record and the offset of the next one.
//! [`ShapeRecords`] threads that offset through successive calls.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{Error, Result};
use crate::geometry::{Geometry, Position, Ring};

use super::header::HEADER_LEN;
use super::rings;

/// Record number plus content length, both big-endian.
pub const RECORD_HEADER_LEN: usize = 8;

/// Shape type codes understood by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeType {
    Null,
    Point,
    PolyLine,
    Polygon,
    MultiPoint,
    PointZ,
    PolyLineZ,
    PolygonZ,
    MultiPointZ,
    PointM,
    PolyLineM,
    PolygonM,
    MultiPointM,
}

impl ShapeType {
    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            0 => ShapeType::Null,
            1 => ShapeType::Point,
            3 => ShapeType::PolyLine,
            5 => ShapeType::Polygon,
            8 => ShapeType::MultiPoint,
            11 => ShapeType::PointZ,
            13 => ShapeType::PolyLineZ,
            15 => ShapeType::PolygonZ,
            18 => ShapeType::MultiPointZ,
            21 => ShapeType::PointM,
            23 => ShapeType::PolyLineM,
            25 => ShapeType::PolygonM,
            28 => ShapeType::MultiPointM,
            _ => return None,
        })
    }

    pub fn code(self) -> i32 {
        match self {
            ShapeType::Null => 0,
            ShapeType::Point => 1,
            ShapeType::PolyLine => 3,
            ShapeType::Polygon => 5,
            ShapeType::MultiPoint => 8,
            ShapeType::PointZ => 11,
            ShapeType::PolyLineZ => 13,
            ShapeType::PolygonZ => 15,
            ShapeType::MultiPointZ => 18,
            ShapeType::PointM => 21,
            ShapeType::PolyLineM => 23,
            ShapeType::PolygonM => 25,
            ShapeType::MultiPointM => 28,
        }
    }

    /// Whether positions carry a z value after the x/y array
    pub fn has_z(self) -> bool {
        matches!(
            self,
            ShapeType::PointZ | ShapeType::PolyLineZ | ShapeType::PolygonZ | ShapeType::MultiPointZ
        )
    }
}

/// One decoded `.shp` record.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeRecord {
    /// Record number as stored in the file (1-based by convention, not trusted).
    pub number: i32,
    pub geometry: Option<Geometry>,
}

/// Decode the record starting at `offset`.
///
/// `index` is the zero-based ordinal of the record and is only used for
/// error reporting. Returns the record and the offset just past it.
pub fn read_record(buf: &[u8], offset: usize, index: usize) -> Result<(ShapeRecord, usize)> {
    let available = buf.len().saturating_sub(offset);
    if available < RECORD_HEADER_LEN {
        return Err(Error::TruncatedGeometryRecord {
            record: index,
            offset,
            needed: RECORD_HEADER_LEN,
            available,
        });
    }

    let number = BigEndian::read_i32(&buf[offset..offset + 4]);
    let words = BigEndian::read_i32(&buf[offset + 4..offset + 8]);
    let content_len = usize::try_from(words)
        .ok()
        .and_then(|w| w.checked_mul(2))
        .ok_or_else(|| Error::MalformedGeometryRecord {
            record: index,
            reason: format!("negative content length {words}"),
        })?;

    let needed = RECORD_HEADER_LEN + content_len;
    if needed > available {
        return Err(Error::TruncatedGeometryRecord {
            record: index,
            offset,
            needed,
            available,
        });
    }

    let content = &buf[offset + RECORD_HEADER_LEN..offset + needed];
    let geometry = RecordReader::new(content, index, offset).shape()?;
    Ok((ShapeRecord { number, geometry }, offset + needed))
}

/// Lazily decodes every record after the file header.
///
/// Iteration ends at the end of the buffer regardless of the header's
/// declared file length, and stops for good after the first error.
pub struct ShapeRecords<'a> {
    buf: &'a [u8],
    offset: usize,
    index: usize,
    failed: bool,
}

impl<'a> ShapeRecords<'a> {
    /// `buf` is the whole `.shp` file; its header must already be validated.
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            offset: HEADER_LEN.min(buf.len()),
            index: 0,
            failed: false,
        }
    }

    /// Number of records yielded so far
    pub fn position(&self) -> usize {
        self.index
    }
}

impl Iterator for ShapeRecords<'_> {
    type Item = Result<ShapeRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.buf.len() {
            return None;
        }

        match read_record(self.buf, self.offset, self.index) {
            Ok((record, next)) => {
                self.offset = next;
                self.index += 1;
                Some(Ok(record))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Little-endian reads over one record's content, bounded by its declared length.
struct RecordReader<'a> {
    data: &'a [u8],
    pos: usize,
    record: usize,
    offset: usize,
}

impl<'a> RecordReader<'a> {
    fn new(data: &'a [u8], record: usize, offset: usize) -> Self {
        Self {
            data,
            pos: 0,
            record,
            offset,
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).filter(|&end| end <= self.data.len());
        let Some(end) = end else {
            return Err(Error::TruncatedGeometryRecord {
                record: self.record,
                offset: self.offset,
                needed: RECORD_HEADER_LEN + self.pos.saturating_add(len),
                available: RECORD_HEADER_LEN + self.data.len(),
            });
        };
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn i32(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }

    fn f64(&mut self) -> Result<f64> {
        Ok(LittleEndian::read_f64(self.take(8)?))
    }

    fn count(&mut self, what: &str) -> Result<usize> {
        let value = self.i32()?;
        usize::try_from(value).map_err(|_| self.malformed(format!("negative {what} count {value}")))
    }

    fn malformed(&self, reason: String) -> Error {
        Error::MalformedGeometryRecord {
            record: self.record,
            reason,
        }
    }

    fn position(&mut self) -> Result<Position> {
        Ok(Position::new(self.f64()?, self.f64()?))
    }

    fn positions(&mut self, n: usize) -> Result<Vec<Position>> {
        // Bounds-check the whole array before allocating for it
        let bytes = self.take(n.saturating_mul(16))?;
        Ok(bytes
            .chunks_exact(16)
            .map(|xy| {
                Position::new(
                    LittleEndian::read_f64(&xy[..8]),
                    LittleEndian::read_f64(&xy[8..]),
                )
            })
            .collect())
    }

    /// Z range followed by one z value per position
    fn z_values(&mut self, positions: &mut [Position]) -> Result<()> {
        self.take(16)?;
        let bytes = self.take(positions.len().saturating_mul(8))?;
        for (p, z) in positions.iter_mut().zip(bytes.chunks_exact(8)) {
            p.z = Some(LittleEndian::read_f64(z));
        }
        Ok(())
    }

    fn shape(&mut self) -> Result<Option<Geometry>> {
        let code = self.i32()?;
        let shape = ShapeType::from_code(code).ok_or(Error::UnsupportedGeometryType {
            record: self.record,
            code,
        })?;

        // M values trail the x/y (and z) data and are never read
        let geometry = match shape {
            ShapeType::Null => return Ok(None),
            ShapeType::Point | ShapeType::PointM => Geometry::Point(self.position()?),
            ShapeType::PointZ => {
                let Position { x, y, .. } = self.position()?;
                Geometry::Point(Position::with_z(x, y, self.f64()?))
            }
            ShapeType::MultiPoint | ShapeType::MultiPointM | ShapeType::MultiPointZ => {
                self.take(32)?;
                let n = self.count("point")?;
                let mut points = self.positions(n)?;
                if shape.has_z() {
                    self.z_values(&mut points)?;
                }
                Geometry::MultiPoint(points)
            }
            ShapeType::PolyLine
            | ShapeType::PolyLineM
            | ShapeType::PolyLineZ
            | ShapeType::Polygon
            | ShapeType::PolygonM
            | ShapeType::PolygonZ => {
                let parts = self.parts(shape.has_z())?;
                if matches!(
                    shape,
                    ShapeType::Polygon | ShapeType::PolygonM | ShapeType::PolygonZ
                ) {
                    rings::polygon(parts)
                } else if parts.len() == 1 {
                    Geometry::LineString(parts.into_iter().flatten().collect())
                } else {
                    Geometry::MultiLineString(parts)
                }
            }
        };
        Ok(Some(geometry))
    }

    /// Bounding box, part and point counts, part offsets, then the points,
    /// split into one ring per part.
    fn parts(&mut self, has_z: bool) -> Result<Vec<Ring>> {
        self.take(32)?;
        let num_parts = self.count("part")?;
        let num_points = self.count("point")?;

        let offsets = self.take(num_parts.saturating_mul(4))?;
        let starts: Vec<usize> = offsets
            .chunks_exact(4)
            .map(|b| LittleEndian::read_i32(b))
            .map(|start| usize::try_from(start).unwrap_or(usize::MAX))
            .collect();

        let mut points = self.positions(num_points)?;
        if has_z {
            self.z_values(&mut points)?;
        }

        let mut parts = Vec::with_capacity(num_parts);
        for (i, &start) in starts.iter().enumerate() {
            let end = starts.get(i + 1).copied().unwrap_or(num_points);
            if start > end || end > num_points {
                return Err(self.malformed(format!(
                    "part {i} spans points {start}..{end} of {num_points}"
                )));
            }
            parts.push(points[start..end].to_vec());
        }
        Ok(parts)
    }
}
