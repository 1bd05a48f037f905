// Fixture encoders shared by unit and behaviour tests.
//
// Unit tests pull this file in with `include!`, so it must stay free of
// inner attributes and of references to the crate under test.

use std::io::{Cursor, Write};

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};

const SHP_HEADER_LEN: usize = 100;

/// Builds `.shp` and matching `.shx` bytes record by record.
#[derive(Debug, Clone)]
pub struct ShpBuilder {
    shape_type: i32,
    records: Vec<Vec<u8>>,
    extent: Vec<(f64, f64)>,
}

impl ShpBuilder {
    /// `shape_type` is written to the file header only; every record
    /// carries its own code.
    pub fn new(shape_type: i32) -> Self {
        Self {
            shape_type,
            records: Vec::new(),
            extent: Vec::new(),
        }
    }

    pub fn null(mut self) -> Self {
        self.records.push(0i32.to_le_bytes().to_vec());
        self
    }

    pub fn point(mut self, x: f64, y: f64) -> Self {
        let mut content = Vec::new();
        content.write_i32::<LittleEndian>(1).unwrap();
        content.write_f64::<LittleEndian>(x).unwrap();
        content.write_f64::<LittleEndian>(y).unwrap();
        self.extent.push((x, y));
        self.records.push(content);
        self
    }

    /// PointZ with a zero measure.
    pub fn point_z(mut self, x: f64, y: f64, z: f64) -> Self {
        let mut content = Vec::new();
        content.write_i32::<LittleEndian>(11).unwrap();
        for value in [x, y, z, 0.0] {
            content.write_f64::<LittleEndian>(value).unwrap();
        }
        self.extent.push((x, y));
        self.records.push(content);
        self
    }

    pub fn multipoint(mut self, points: &[(f64, f64)]) -> Self {
        let mut content = Vec::new();
        content.write_i32::<LittleEndian>(8).unwrap();
        write_bbox(&mut content, points);
        content.write_i32::<LittleEndian>(points.len() as i32).unwrap();
        write_points(&mut content, points);
        self.extent.extend_from_slice(points);
        self.records.push(content);
        self
    }

    pub fn polyline(self, parts: &[&[(f64, f64)]]) -> Self {
        self.multipart(3, parts, None)
    }

    /// Rings are written as given; winding decides shells and holes.
    pub fn polygon(self, rings: &[&[(f64, f64)]]) -> Self {
        self.multipart(5, rings, None)
    }

    /// PolyLineZ with a zero measure for every vertex.
    pub fn polyline_z(self, parts: &[&[(f64, f64, f64)]]) -> Self {
        let xy: Vec<Vec<(f64, f64)>> = parts
            .iter()
            .map(|part| part.iter().map(|&(x, y, _)| (x, y)).collect())
            .collect();
        let xy: Vec<&[(f64, f64)]> = xy.iter().map(Vec::as_slice).collect();
        let z: Vec<f64> = parts.iter().flat_map(|part| part.iter().map(|p| p.2)).collect();
        self.multipart(13, &xy, Some(&z))
    }

    fn multipart(mut self, code: i32, parts: &[&[(f64, f64)]], z: Option<&[f64]>) -> Self {
        let points: Vec<(f64, f64)> = parts.iter().flat_map(|part| part.iter().copied()).collect();

        let mut content = Vec::new();
        content.write_i32::<LittleEndian>(code).unwrap();
        write_bbox(&mut content, &points);
        content.write_i32::<LittleEndian>(parts.len() as i32).unwrap();
        content.write_i32::<LittleEndian>(points.len() as i32).unwrap();
        let mut start = 0;
        for part in parts {
            content.write_i32::<LittleEndian>(start).unwrap();
            start += part.len() as i32;
        }
        write_points(&mut content, &points);

        if let Some(z) = z {
            let (lo, hi) = range(z);
            content.write_f64::<LittleEndian>(lo).unwrap();
            content.write_f64::<LittleEndian>(hi).unwrap();
            for &value in z {
                content.write_f64::<LittleEndian>(value).unwrap();
            }
            // Measure range and values
            for _ in 0..points.len() + 2 {
                content.write_f64::<LittleEndian>(0.0).unwrap();
            }
        }

        self.extent.extend(points);
        self.records.push(content);
        self
    }

    /// The `.shp` file: header, then each record numbered from 1.
    pub fn shp(&self) -> Vec<u8> {
        let body_len: usize = self.records.iter().map(|r| 8 + r.len()).sum();
        let mut out = self.header(SHP_HEADER_LEN + body_len);
        for (i, content) in self.records.iter().enumerate() {
            out.write_i32::<BigEndian>(i as i32 + 1).unwrap();
            out.write_i32::<BigEndian>((content.len() / 2) as i32).unwrap();
            out.extend_from_slice(content);
        }
        out
    }

    /// The `.shx` index: the same header, then offset and length words.
    pub fn shx(&self) -> Vec<u8> {
        let mut out = self.header(SHP_HEADER_LEN + 8 * self.records.len());
        let mut offset = SHP_HEADER_LEN;
        for content in &self.records {
            out.write_i32::<BigEndian>((offset / 2) as i32).unwrap();
            out.write_i32::<BigEndian>((content.len() / 2) as i32).unwrap();
            offset += 8 + content.len();
        }
        out
    }

    fn header(&self, file_len: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(file_len);
        out.write_i32::<BigEndian>(9994).unwrap();
        out.extend_from_slice(&[0; 20]);
        out.write_i32::<BigEndian>((file_len / 2) as i32).unwrap();
        out.write_i32::<LittleEndian>(1000).unwrap();
        out.write_i32::<LittleEndian>(self.shape_type).unwrap();
        write_bbox(&mut out, &self.extent);
        // Z and M ranges
        out.extend_from_slice(&[0; 32]);
        out
    }
}

fn range(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

fn write_bbox(out: &mut Vec<u8>, points: &[(f64, f64)]) {
    let xs: Vec<f64> = points.iter().map(|p| p.0).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.1).collect();
    let (x_min, x_max) = range(&xs);
    let (y_min, y_max) = range(&ys);
    for value in [x_min, y_min, x_max, y_max] {
        out.write_f64::<LittleEndian>(value).unwrap();
    }
}

fn write_points(out: &mut Vec<u8>, points: &[(f64, f64)]) {
    for &(x, y) in points {
        out.write_f64::<LittleEndian>(x).unwrap();
        out.write_f64::<LittleEndian>(y).unwrap();
    }
}

/// Builds a dBASE III table with space-padded text values.
#[derive(Debug, Clone, Default)]
pub struct DbfBuilder {
    fields: Vec<(String, u8, usize)>,
    rows: Vec<Vec<String>>,
}

impl DbfBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &str, kind: u8, width: usize) -> Self {
        self.fields.push((name.to_string(), kind, width));
        self
    }

    /// Values in field order; each is truncated or padded to its width.
    pub fn row(mut self, values: &[&str]) -> Self {
        self.rows.push(values.iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let header_len = 32 + 32 * self.fields.len() + 1;
        let record_len = 1 + self.fields.iter().map(|f| f.2).sum::<usize>();

        let mut out = Vec::new();
        out.write_u8(3).unwrap();
        out.extend_from_slice(&[124, 1, 1]);
        out.write_u32::<LittleEndian>(self.rows.len() as u32).unwrap();
        out.write_u16::<LittleEndian>(header_len as u16).unwrap();
        out.write_u16::<LittleEndian>(record_len as u16).unwrap();
        out.extend_from_slice(&[0; 20]);

        for (name, kind, width) in &self.fields {
            let mut descriptor = [0u8; 32];
            let name = name.as_bytes();
            let n = name.len().min(10);
            descriptor[..n].copy_from_slice(&name[..n]);
            descriptor[11] = *kind;
            descriptor[16] = *width as u8;
            out.extend_from_slice(&descriptor);
        }
        out.write_u8(0x0D).unwrap();

        for row in &self.rows {
            out.write_u8(b' ').unwrap();
            for (i, (_, _, width)) in self.fields.iter().enumerate() {
                let value = row.get(i).map(String::as_bytes).unwrap_or_default();
                let mut cell = vec![b' '; *width];
                let n = value.len().min(*width);
                cell[..n].copy_from_slice(&value[..n]);
                out.extend_from_slice(&cell);
            }
        }
        out.write_u8(0x1A).unwrap();
        out
    }
}

/// A zip archive with deflated members. Names ending in `/` become
/// directory entries.
pub fn zip_archive(members: &[(&str, &[u8])]) -> Vec<u8> {
    write_zip(members, ::zip::CompressionMethod::Deflated, None)
}

pub fn zip_archive_stored(members: &[(&str, &[u8])]) -> Vec<u8> {
    write_zip(members, ::zip::CompressionMethod::Stored, None)
}

pub fn zip_archive_with_comment(members: &[(&str, &[u8])], comment: &str) -> Vec<u8> {
    write_zip(members, ::zip::CompressionMethod::Deflated, Some(comment))
}

fn write_zip(
    members: &[(&str, &[u8])],
    method: ::zip::CompressionMethod,
    comment: Option<&str>,
) -> Vec<u8> {
    let mut writer = ::zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = ::zip::write::SimpleFileOptions::default().compression_method(method);
    for (name, data) in members {
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
    }
    if let Some(comment) = comment {
        writer.set_comment(comment);
    }
    writer.finish().unwrap().into_inner()
}
