use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{Error, Result};
use crate::resolver::ComponentRole;

/// Size of the fixed header shared by `.shp` and `.shx` files.
pub const HEADER_LEN: usize = 100;

/// Magic number stored big-endian in the first four bytes.
pub const FILE_CODE: i32 = 9994;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

/// The 100-byte `.shp` / `.shx` file header.
///
/// Mixed endianness is part of the format: the file code and length are
/// big-endian, everything from the version onwards is little-endian.
#[derive(Debug, Clone, PartialEq)]
pub struct FileHeader {
    /// Declared file length in bytes. Exports frequently get this wrong, so
    /// it is informational only.
    pub file_length: u64,
    pub version: i32,
    /// Raw shape type code for the whole file.
    pub shape_type: i32,
    pub bbox: BoundingBox,
    pub z_range: (f64, f64),
    pub m_range: (f64, f64),
}

impl FileHeader {
    pub fn parse(bytes: &[u8], role: ComponentRole) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::MalformedHeader {
                role,
                reason: format!(
                    "expected a {HEADER_LEN}-byte header, found {} bytes",
                    bytes.len()
                ),
            });
        }

        let file_code = BigEndian::read_i32(&bytes[0..4]);
        if file_code != FILE_CODE {
            return Err(Error::MalformedHeader {
                role,
                reason: format!("file code is {file_code}, expected {FILE_CODE}"),
            });
        }

        let f64_at = |at: usize| LittleEndian::read_f64(&bytes[at..at + 8]);
        let words = BigEndian::read_i32(&bytes[24..28]);

        Ok(Self {
            file_length: u64::from(words.unsigned_abs()) * 2,
            version: LittleEndian::read_i32(&bytes[28..32]),
            shape_type: LittleEndian::read_i32(&bytes[32..36]),
            bbox: BoundingBox {
                x_min: f64_at(36),
                y_min: f64_at(44),
                x_max: f64_at(52),
                y_max: f64_at(60),
            },
            z_range: (f64_at(68), f64_at(76)),
            m_range: (f64_at(84), f64_at(92)),
        })
    }
}
