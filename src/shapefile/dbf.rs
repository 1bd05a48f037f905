//! `.dbf` attribute table decoding.
//!
//! The table is a dBASE III file: a header with one 32-byte descriptor per
//! field, then fixed-width rows. Every value is stored as text and typed by
//! its field descriptor.

use byteorder::{ByteOrder, LittleEndian};
use chrono::NaiveDate;
use encoding_rs::Encoding;
use serde_json::{Number, Value};

use crate::error::{Error, Result};
use crate::feature::Properties;
use crate::resolver::ComponentRole;

const PREFIX_LEN: usize = 32;
const DESCRIPTOR_LEN: usize = 32;
const HEADER_TERMINATOR: u8 = 0x0D;
const END_OF_FILE: u8 = 0x1A;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Character,
    Numeric,
    Float,
    Logical,
    Date,
    Memo,
    Binary,
    Other(u8),
}

impl FieldType {
    pub fn from_byte(b: u8) -> Self {
        match b.to_ascii_uppercase() {
            b'C' => FieldType::Character,
            b'N' => FieldType::Numeric,
            b'F' => FieldType::Float,
            b'L' => FieldType::Logical,
            b'D' => FieldType::Date,
            b'M' => FieldType::Memo,
            b'B' => FieldType::Binary,
            _ => FieldType::Other(b),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub field_type: FieldType,
    pub width: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbfHeader {
    /// Row count declared by the header.
    pub record_count: usize,
    pub header_len: usize,
    pub record_len: usize,
    pub fields: Vec<FieldDescriptor>,
}

impl DbfHeader {
    pub fn parse(buf: &[u8], encoding: &'static Encoding) -> Result<Self> {
        let malformed = |reason: String| Error::MalformedHeader {
            role: ComponentRole::Attributes,
            reason,
        };

        if buf.len() < PREFIX_LEN + 1 {
            return Err(malformed(format!(
                "{} bytes is too short for a dBASE header",
                buf.len()
            )));
        }

        let record_count = LittleEndian::read_u32(&buf[4..8]) as usize;
        let header_len = LittleEndian::read_u16(&buf[8..10]) as usize;
        let record_len = LittleEndian::read_u16(&buf[10..12]) as usize;
        if header_len <= PREFIX_LEN || header_len > buf.len() {
            return Err(malformed(format!(
                "header length {header_len} does not fit a {}-byte file",
                buf.len()
            )));
        }

        let mut fields = Vec::new();
        let mut at = PREFIX_LEN;
        while at < header_len && buf[at] != HEADER_TERMINATOR {
            let Some(descriptor) = buf.get(at..at + DESCRIPTOR_LEN) else {
                return Err(malformed(format!("field descriptor at byte {at} is cut short")));
            };
            let name_bytes = &descriptor[..11];
            let name_end = name_bytes.iter().position(|&b| b == 0).unwrap_or(11);
            let (name, _) = encoding.decode_without_bom_handling(&name_bytes[..name_end]);

            fields.push(FieldDescriptor {
                name: name.into_owned(),
                field_type: FieldType::from_byte(descriptor[11]),
                width: descriptor[16] as usize,
            });
            at += DESCRIPTOR_LEN;
        }

        // One leading byte per row is the deletion flag
        let row_width = 1 + fields.iter().map(|f| f.width).sum::<usize>();
        if row_width > record_len {
            return Err(malformed(format!(
                "fields need {row_width} bytes per row but rows are {record_len} bytes"
            )));
        }

        Ok(Self {
            record_count,
            header_len,
            record_len,
            fields,
        })
    }
}

/// Lazily decodes rows into property maps.
///
/// Ends after the declared row count, at the end of the buffer, or at the
/// 0x1A end-of-file marker, whichever comes first.
pub struct DbfRows<'a> {
    buf: &'a [u8],
    header: DbfHeader,
    encoding: &'static Encoding,
    row: usize,
    done: bool,
}

impl<'a> DbfRows<'a> {
    pub fn new(buf: &'a [u8], encoding: &'static Encoding) -> Result<Self> {
        let header = DbfHeader::parse(buf, encoding)?;
        Ok(Self {
            buf,
            header,
            encoding,
            row: 0,
            done: false,
        })
    }

    pub fn header(&self) -> &DbfHeader {
        &self.header
    }

    /// Number of rows yielded so far
    pub fn position(&self) -> usize {
        self.row
    }

    fn decode_row(&self, bytes: &[u8]) -> Properties {
        let mut properties = Properties::with_capacity(self.header.fields.len());
        let mut at = 1;
        for field in &self.header.fields {
            let raw = &bytes[at..at + field.width];
            at += field.width;
            properties.insert(
                field.name.clone(),
                decode_value(field.field_type, raw, self.encoding),
            );
        }
        properties
    }
}

impl Iterator for DbfRows<'_> {
    type Item = Result<Properties>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.row >= self.header.record_count {
            return None;
        }

        let start = self.header.header_len + self.row * self.header.record_len;
        match self.buf.get(start) {
            None | Some(&END_OF_FILE) => {
                self.done = true;
                return None;
            }
            Some(_) => {}
        }

        let Some(bytes) = self.buf.get(start..start + self.header.record_len) else {
            self.done = true;
            return Some(Err(Error::MalformedAttributes {
                row: self.row,
                reason: format!(
                    "row needs {} bytes but only {} remain",
                    self.header.record_len,
                    self.buf.len() - start
                ),
            }));
        };

        let properties = self.decode_row(bytes);
        self.row += 1;
        Some(Ok(properties))
    }
}

/// Type one stored value. Blank or unparseable values become `null`.
pub fn decode_value(field_type: FieldType, raw: &[u8], encoding: &'static Encoding) -> Value {
    let (text, _) = encoding.decode_without_bom_handling(raw);
    let text = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');

    match field_type {
        FieldType::Numeric | FieldType::Float | FieldType::Memo | FieldType::Binary => {
            number(text)
        }
        FieldType::Logical => match text {
            "t" | "T" | "y" | "Y" => Value::Bool(true),
            "f" | "F" | "n" | "N" => Value::Bool(false),
            _ => Value::Null,
        },
        FieldType::Date => NaiveDate::parse_from_str(text, "%Y%m%d")
            .map(|date| Value::String(date.format("%Y-%m-%d").to_string()))
            .unwrap_or(Value::Null),
        FieldType::Character | FieldType::Other(_) => {
            if text.is_empty() {
                Value::Null
            } else {
                Value::String(text.to_string())
            }
        }
    }
}

fn number(text: &str) -> Value {
    if let Ok(i) = text.parse::<i64>() {
        return Value::Number(i.into());
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map_or(Value::Null, Value::Number)
}
