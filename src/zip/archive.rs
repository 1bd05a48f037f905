use flate2::Crc;
use flate2::read::DeflateDecoder;
use std::io::Read;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::io::ReadAt;

use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipFileEntry};

/// An opened ZIP archive whose members can be looked up and extracted.
///
/// The central directory is read once by [`ZipArchive::open`]; lookups are
/// answered from that listing and extraction reads only the member's bytes.
pub struct ZipArchive<R: ReadAt + ?Sized> {
    parser: ZipParser<R>,
    entries: Vec<ZipFileEntry>,
}

impl<R: ReadAt + ?Sized> ZipArchive<R> {
    /// Open the archive and read its central directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ArchiveCorrupt`] if the data is not a readable ZIP.
    pub async fn open(reader: Arc<R>) -> Result<Self> {
        let parser = ZipParser::new(reader);
        let entries = parser.list_files().await?;
        log::debug!("opened archive with {} member(s)", entries.len());
        Ok(Self { parser, entries })
    }

    /// All entries, in central directory order
    pub fn entries(&self) -> &[ZipFileEntry] {
        &self.entries
    }

    /// Name of the first non-directory member whose name ends with `ext`
    /// (case-insensitive), in listing order.
    pub fn find_by_extension(&self, ext: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.has_extension(ext))
            .map(|e| e.file_name.as_str())
    }

    /// Extract a member by its full name.
    ///
    /// # Errors
    ///
    /// [`Error::MemberNotFound`] if no member has that name, or
    /// [`Error::ArchiveCorrupt`] if its data cannot be decoded.
    pub async fn extract(&self, name: &str) -> Result<Vec<u8>> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.file_name == name)
            .ok_or_else(|| Error::MemberNotFound {
                name: name.to_string(),
            })?;
        self.extract_entry(entry).await
    }

    /// Extract file data to memory, decompressing and checking the CRC-32.
    pub async fn extract_entry(&self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        if entry.is_encrypted() {
            return Err(Error::corrupt_archive(format!(
                "{} is encrypted",
                entry.file_name
            )));
        }

        let raw = self.parser.read_member_data(entry).await?;
        let data = match entry.compression_method {
            CompressionMethod::Stored => raw,
            CompressionMethod::Deflate => inflate(&raw, entry)?,
            CompressionMethod::Unknown(method) => {
                return Err(Error::corrupt_archive(format!(
                    "{} uses unsupported compression method {method}",
                    entry.file_name
                )));
            }
        };

        if data.len() as u64 != entry.uncompressed_size {
            return Err(Error::corrupt_archive(format!(
                "{} decompressed to {} bytes, expected {}",
                entry.file_name,
                data.len(),
                entry.uncompressed_size
            )));
        }

        let mut crc = Crc::new();
        crc.update(&data);
        if crc.sum() != entry.crc32 {
            return Err(Error::corrupt_archive(format!(
                "CRC mismatch for {}",
                entry.file_name
            )));
        }

        Ok(data)
    }
}

fn inflate(raw: &[u8], entry: &ZipFileEntry) -> Result<Vec<u8>> {
    // The declared size is only a capacity hint; a lying header must not drive allocation
    let hint = (entry.uncompressed_size as usize).min(raw.len().saturating_mul(16));
    let mut data = Vec::with_capacity(hint);
    DeflateDecoder::new(raw)
        .take(entry.uncompressed_size.saturating_add(1))
        .read_to_end(&mut data)
        .map_err(|e| Error::corrupt_archive(format!("{}: {e}", entry.file_name)))?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryReader;
    use rstest::rstest;

    #[allow(dead_code)]
    mod support {
        include!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/support.rs"));
    }

    async fn open(bytes: Vec<u8>) -> Result<ZipArchive<MemoryReader>> {
        ZipArchive::open(Arc::new(MemoryReader::new(bytes))).await
    }

    #[tokio::test]
    async fn extracts_deflated_and_stored_members() {
        let bytes = support::zip_archive(&[
            ("a/readme.txt", b"hello hello hello hello".as_slice()),
            ("b.bin", &[0u8, 1, 2, 3]),
        ]);
        let stored = support::zip_archive_stored(&[("c.txt", b"plain".as_slice())]);

        let archive = open(bytes).await.expect("open archive");
        assert_eq!(archive.entries().len(), 2);
        assert_eq!(
            archive.extract("a/readme.txt").await.unwrap(),
            b"hello hello hello hello"
        );
        assert_eq!(archive.extract("b.bin").await.unwrap(), vec![0, 1, 2, 3]);

        let archive = open(stored).await.expect("open stored archive");
        assert_eq!(archive.extract("c.txt").await.unwrap(), b"plain");
    }

    #[rstest]
    #[case(".shp", Some("data/Parcels.SHP"))]
    #[case(".SHP", Some("data/Parcels.SHP"))]
    #[case(".dbf", Some("first.dbf"))]
    #[case(".prj", None)]
    #[tokio::test]
    async fn find_by_extension_is_case_insensitive_first_match(
        #[case] ext: &str,
        #[case] expected: Option<&str>,
    ) {
        let bytes = support::zip_archive(&[
            ("data/", b"".as_slice()),
            ("first.dbf", b"1"),
            ("data/Parcels.SHP", b"2"),
            ("second.dbf", b"3"),
        ]);
        let archive = open(bytes).await.expect("open archive");
        assert_eq!(archive.find_by_extension(ext), expected);
    }

    #[tokio::test]
    async fn archive_comment_is_skipped() {
        let bytes = support::zip_archive_with_comment(&[("x.shp", b"x".as_slice())], "made by hand");
        let archive = open(bytes).await.expect("open archive with comment");
        assert_eq!(archive.find_by_extension(".shp"), Some("x.shp"));
    }

    #[tokio::test]
    async fn extracting_unknown_member_fails() {
        let archive = open(support::zip_archive(&[("x.shp", b"x".as_slice())]))
            .await
            .unwrap();
        let err = archive.extract("y.shp").await.unwrap_err();
        assert!(matches!(err, Error::MemberNotFound { ref name } if name == "y.shp"));
    }

    #[rstest]
    #[case::empty(Vec::new())]
    #[case::not_a_zip(b"this is certainly not a zip archive at all".to_vec())]
    #[tokio::test]
    async fn garbage_is_archive_corrupt(#[case] bytes: Vec<u8>) {
        let err = open(bytes).await.err().expect("garbage must not open");
        assert!(matches!(err, Error::ArchiveCorrupt { .. }), "{err}");
    }

    #[tokio::test]
    async fn crc_mismatch_is_archive_corrupt() {
        let mut bytes = support::zip_archive_stored(&[("x.txt", b"payload".as_slice())]);
        let at = bytes
            .windows(7)
            .position(|w| w == b"payload")
            .expect("stored member data is verbatim");
        bytes[at] ^= 0xFF;

        let archive = open(bytes).await.expect("directory is intact");
        let err = archive.extract("x.txt").await.unwrap_err();
        assert!(matches!(err, Error::ArchiveCorrupt { ref reason } if reason.contains("CRC")));
    }

    #[tokio::test]
    async fn truncated_archive_is_archive_corrupt() {
        let bytes = support::zip_archive(&[("x.shp", b"some geometry bytes".as_slice())]);
        let truncated = bytes[..bytes.len() - 10].to_vec();
        let err = open(truncated).await.err().expect("truncated must not open");
        assert!(matches!(err, Error::ArchiveCorrupt { .. }));
    }
}
