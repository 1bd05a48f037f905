use byteorder::{BigEndian, ByteOrder};

use crate::error::Result;
use crate::resolver::ComponentRole;

use super::header::{FileHeader, HEADER_LEN};

const ENTRY_LEN: usize = 8;

/// Location of one `.shp` record, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub offset: u64,
    pub content_len: u64,
}

/// The `.shx` index: the `.shp` header repeated, then one entry per record.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeIndex {
    pub header: FileHeader,
    pub entries: Vec<IndexEntry>,
}

impl ShapeIndex {
    pub fn parse(buf: &[u8]) -> Result<Self> {
        let header = FileHeader::parse(buf, ComponentRole::Index)?;
        let body = &buf[HEADER_LEN..];
        if body.len() % ENTRY_LEN != 0 {
            log::warn!(
                "index has {} trailing byte(s) after its last entry",
                body.len() % ENTRY_LEN
            );
        }

        // Offsets and lengths are stored in 16-bit words
        let entries = body
            .chunks_exact(ENTRY_LEN)
            .map(|entry| IndexEntry {
                offset: u64::from(BigEndian::read_i32(&entry[..4]).unsigned_abs()) * 2,
                content_len: u64::from(BigEndian::read_i32(&entry[4..]).unsigned_abs()) * 2,
            })
            .collect();

        Ok(Self { header, entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
