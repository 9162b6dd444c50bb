//! Index block decoding and encoding
//!
//! An SFF file may end with an index block located by the header's
//! `index_offset` and `index_length`. The block opens with a 4-byte magic and a
//! 4-byte version which select its layout:
//!
//! * `.mft` (manifest): XML length (u32), entry table length (u32), the XML run
//!   manifest, then the entry table
//! * `.srt` (sorted): four null bytes, then the entry table
//! * anything else is kept as [`IndexBlock::Unknown`] and not interpreted further
//!
//! The entry table holds one entry per read: the read name, a null byte, the
//! record offset as four base-255 digits, and a `0xFF` terminator.
//!
//! Index decoding is independent of record decoding: a damaged index never stops
//! a plain iteration over the records, it only fails the calls asking for it.

mod entry;

use std::io::{BufReader, Read, Seek, Write};

use byteorder::{BigEndian, WriteBytesExt};

pub use entry::{decode_offset, encode_offset, IndexEntry, ReadIndex, MAX_INDEX_OFFSET};

use crate::cursor::ByteCursor;
use crate::error::{IndexError, Result};
use crate::header::SffHeader;

/// Magic of the manifest index (entries plus XML)
pub const MANIFEST_MAGIC: &[u8; 4] = b".mft";

/// Magic of the sorted index (entries only)
pub const SORTED_MAGIC: &[u8; 4] = b".srt";

/// Magic of the hash table index, recognized but not decoded
pub const HASH_MAGIC: &[u8; 4] = b".hsh";

/// The only supported index version, `1.00`
pub const INDEX_VERSION: &[u8; 4] = b"1.00";

/// Magic and version
const SIZE_INDEX_PREFIX: u64 = 8;

/// Magic, version and the two manifest length fields
const SIZE_MANIFEST_PREFIX: u64 = 16;

/// Magic, version and four null bytes
const SIZE_SORTED_PREFIX: u64 = 12;

/// Decoded manifest index
#[derive(Debug, Clone, Default)]
pub struct ManifestIndex {
    /// XML run manifest, kept as opaque text
    pub xml: String,

    /// Read entries
    pub entries: ReadIndex,
}
impl ManifestIndex {
    /// Builds a manifest index with entries sorted by name
    #[must_use]
    pub fn new(xml: impl Into<String>, mut entries: Vec<IndexEntry>) -> Self {
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Self {
            xml: xml.into(),
            entries: ReadIndex::new(entries),
        }
    }

    /// Total size of the block without trailing padding
    #[must_use]
    pub fn encoded_len(&self) -> u64 {
        SIZE_MANIFEST_PREFIX + self.xml.len() as u64 + self.entries.encoded_len()
    }

    /// Largest record offset referenced by the entries
    #[must_use]
    pub fn max_offset(&self) -> Option<u64> {
        self.entries.iter().map(|entry| entry.offset).max()
    }

    pub fn write_bytes<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(MANIFEST_MAGIC)?;
        writer.write_all(INDEX_VERSION)?;
        writer.write_u32::<BigEndian>(self.xml.len() as u32)?;
        writer.write_u32::<BigEndian>(self.entries.encoded_len() as u32)?;
        writer.write_all(self.xml.as_bytes())?;
        self.entries.write_bytes(writer)
    }
}

/// The index block found at the end of an SFF file
#[derive(Debug, Clone)]
pub enum IndexBlock {
    /// `.mft`: entries plus an XML manifest
    Manifest(ManifestIndex),

    /// `.srt`: entries only
    Sorted(ReadIndex),

    /// A block with an unrecognized magic
    Unknown { magic: [u8; 4], version: [u8; 4] },
}
impl IndexBlock {
    /// Decodes the block at the cursor position, which must be the header's
    /// index offset
    pub fn from_cursor<R: Read>(cursor: &mut ByteCursor<R>, header: &SffHeader) -> Result<Self> {
        match Layout::from_cursor(cursor, header)? {
            Layout::Manifest {
                xml_length,
                entries_length,
            } => {
                let xml = cursor.read_vec(xml_length as usize)?;
                let xml = String::from_utf8(xml).map_err(|e| e.utf8_error())?;
                let entries = ReadIndex::from_cursor(
                    cursor,
                    header.number_of_reads,
                    u64::from(entries_length),
                )?;
                Ok(Self::Manifest(ManifestIndex { xml, entries }))
            }
            Layout::Sorted { entries_length } => Ok(Self::Sorted(ReadIndex::from_cursor(
                cursor,
                header.number_of_reads,
                entries_length,
            )?)),
            Layout::Unknown { magic, version } => Ok(Self::Unknown { magic, version }),
        }
    }

    /// The block's magic
    #[must_use]
    pub fn magic(&self) -> [u8; 4] {
        match self {
            Self::Manifest(_) => *MANIFEST_MAGIC,
            Self::Sorted(_) => *SORTED_MAGIC,
            Self::Unknown { magic, .. } => *magic,
        }
    }

    /// The read entries
    ///
    /// # Errors
    ///
    /// `IndexError::UnknownIndexFormat` for unrecognized blocks
    pub fn entries(&self) -> Result<&ReadIndex> {
        match self {
            Self::Manifest(manifest) => Ok(&manifest.entries),
            Self::Sorted(entries) => Ok(entries),
            Self::Unknown { magic, version } => Err(IndexError::UnknownIndexFormat {
                magic: *magic,
                version: *version,
            }
            .into()),
        }
    }

    /// The XML manifest
    ///
    /// # Errors
    ///
    /// * `IndexError::NoXmlManifest` for sorted indices and empty manifests
    /// * `IndexError::UnknownIndexFormat` for unrecognized blocks
    pub fn manifest_xml(&self) -> Result<&str> {
        match self {
            Self::Manifest(manifest) if !manifest.xml.is_empty() => Ok(&manifest.xml),
            Self::Manifest(_) | Self::Sorted(_) => Err(IndexError::NoXmlManifest.into()),
            Self::Unknown { magic, version } => Err(IndexError::UnknownIndexFormat {
                magic: *magic,
                version: *version,
            }
            .into()),
        }
    }
}

/// Sizes read from the block prefix
enum Layout {
    Manifest { xml_length: u32, entries_length: u32 },
    Sorted { entries_length: u64 },
    Unknown { magic: [u8; 4], version: [u8; 4] },
}
impl Layout {
    fn from_cursor<R: Read>(cursor: &mut ByteCursor<R>, header: &SffHeader) -> Result<Self> {
        let magic = cursor.read_array::<4>()?;
        let version = cursor.read_array::<4>()?;
        let known = [MANIFEST_MAGIC, SORTED_MAGIC].contains(&&magic);
        if known && &version != INDEX_VERSION {
            return Err(IndexError::UnsupportedIndexVersion { magic, version }.into());
        }
        let layout = match &magic {
            MANIFEST_MAGIC => {
                let xml_length = cursor.read_u32()?;
                let entries_length = cursor.read_u32()?;
                let computed =
                    SIZE_MANIFEST_PREFIX + u64::from(xml_length) + u64::from(entries_length);
                if u64::from(header.index_length) != computed {
                    return Err(IndexError::ManifestHeaderSizeMismatch {
                        declared: header.index_length,
                        xml_length,
                        entries_length,
                    }
                    .into());
                }
                Self::Manifest {
                    xml_length,
                    entries_length,
                }
            }
            SORTED_MAGIC => {
                let offset = cursor.position();
                if cursor.read_array::<4>()? != [0; 4] {
                    return Err(IndexError::SortedIndexMissingNulls { offset }.into());
                }
                Self::Sorted {
                    entries_length: u64::from(header.index_length)
                        .saturating_sub(SIZE_SORTED_PREFIX),
                }
            }
            _ => {
                log::debug!(
                    "Unrecognized index block {:?} at offset {}",
                    String::from_utf8_lossy(&magic),
                    cursor.position() - SIZE_INDEX_PREFIX
                );
                Self::Unknown { magic, version }
            }
        };
        Ok(layout)
    }
}

/// Decodes the header of a seekable source and positions a buffered cursor at
/// its index block
fn seek_index<R: Read + Seek>(source: R) -> Result<(SffHeader, ByteCursor<BufReader<R>>)> {
    let mut cursor = ByteCursor::new(BufReader::new(source));
    cursor.seek_to(0)?;
    let header = SffHeader::from_cursor(&mut cursor)?;
    if !header.has_index() {
        return Err(IndexError::NoIndexPresent.into());
    }
    cursor.seek_to(header.index_offset)?;
    Ok((header, cursor))
}

/// Locates and decodes the index block of a seekable source
///
/// # Errors
///
/// * `IndexError::NoIndexPresent` if the header declares no index
/// * any header decoding error
/// * any index decoding error
pub fn find_index<R: Read + Seek>(source: R) -> Result<IndexBlock> {
    let (header, mut cursor) = seek_index(source)?;
    let block = IndexBlock::from_cursor(&mut cursor, &header)?;
    log::debug!(
        "Decoded {:?} index block at offset {}",
        String::from_utf8_lossy(&block.magic()),
        header.index_offset
    );
    Ok(block)
}

/// Reads the XML manifest of a seekable source without decoding the entries
///
/// # Errors
///
/// * `IndexError::NoIndexPresent` if the header declares no index
/// * `IndexError::NoXmlManifest` if the index carries no XML
/// * `IndexError::UnknownIndexFormat` for unrecognized index blocks
pub fn read_manifest_xml<R: Read + Seek>(source: R) -> Result<String> {
    let (header, mut cursor) = seek_index(source)?;
    match Layout::from_cursor(&mut cursor, &header)? {
        Layout::Manifest { xml_length, .. } if xml_length > 0 => {
            let xml = cursor.read_vec(xml_length as usize)?;
            Ok(String::from_utf8(xml).map_err(|e| e.utf8_error())?)
        }
        Layout::Manifest { .. } | Layout::Sorted { .. } => Err(IndexError::NoXmlManifest.into()),
        Layout::Unknown { magic, version } => {
            Err(IndexError::UnknownIndexFormat { magic, version }.into())
        }
    }
}

#[cfg(test)]
mod testing {
    use std::io::Cursor;

    use byteorder::ByteOrder;

    use super::*;
    use crate::error::{Error, ErrorKind};
    use crate::fixtures;
    use crate::NamedRead;

    #[test]
    fn test_find_manifest_index() -> Result<()> {
        let bytes = fixtures::file(true)?;
        let block = find_index(Cursor::new(&bytes))?;
        assert_eq!(&block.magic(), MANIFEST_MAGIC);
        assert_eq!(block.manifest_xml()?, fixtures::MANIFEST_XML);

        let entries = block.entries()?;
        assert_eq!(entries.len(), 3);
        assert_eq!(entries.offsets(), vec![48, 112, 176]);
        let entry = entries.get("E3MFGYR02JWQ7T").unwrap();
        assert_eq!(entry.offset, 48);
        assert_eq!(entry.region(), Some(2));

        // entries are stored sorted by name
        let names: Vec<&str> = entries.iter().map(|entry| entry.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["E3MFGYR02JA6IL", "E3MFGYR02JHD4H", "E3MFGYR02JWQ7T"]
        );
        Ok(())
    }

    #[test]
    fn test_read_manifest_xml() -> Result<()> {
        let bytes = fixtures::file(true)?;
        assert_eq!(read_manifest_xml(Cursor::new(&bytes))?, fixtures::MANIFEST_XML);
        Ok(())
    }

    #[test]
    fn test_no_index_present() -> Result<()> {
        let bytes = fixtures::file(false)?;
        let err = find_index(Cursor::new(&bytes)).unwrap_err();
        assert!(err.is_no_index());
        let err = read_manifest_xml(Cursor::new(&bytes)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoIndexPresent);
        Ok(())
    }

    #[test]
    fn test_manifest_size_mismatch() -> Result<()> {
        let mut bytes = fixtures::file(true)?;
        let declared = BigEndian::read_u32(&bytes[16..20]);
        BigEndian::write_u32(&mut bytes[16..20], declared + 8);
        let err = find_index(Cursor::new(&bytes)).unwrap_err();
        match err {
            Error::IndexError(IndexError::ManifestHeaderSizeMismatch {
                declared: seen,
                xml_length,
                entries_length,
            }) => {
                assert_eq!(seen, declared + 8);
                assert_eq!(xml_length as usize, fixtures::MANIFEST_XML.len());
                assert_eq!(entries_length, 60);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_manifest_entries_length_field() -> Result<()> {
        let mut bytes = fixtures::file(true)?;
        let field = fixtures::INDEX_OFFSET as usize + 12;
        BigEndian::write_u32(&mut bytes[field..field + 4], 0);
        let err = find_index(Cursor::new(&bytes)).unwrap_err();
        assert!(matches!(
            err,
            Error::IndexError(IndexError::ManifestHeaderSizeMismatch {
                declared,
                xml_length: 7,
                entries_length: 0,
            }) if declared == fixtures::INDEX_LENGTH
        ));
        Ok(())
    }

    #[test]
    fn test_manifest_xml_length_field() -> Result<()> {
        let mut bytes = fixtures::file(true)?;
        let field = fixtures::INDEX_OFFSET as usize + 8;
        BigEndian::write_u32(&mut bytes[field..field + 4], 9);
        let err = read_manifest_xml(Cursor::new(&bytes)).unwrap_err();
        assert!(matches!(
            err,
            Error::IndexError(IndexError::ManifestHeaderSizeMismatch {
                xml_length: 9,
                entries_length: 60,
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn test_fewer_reads_than_entries() -> Result<()> {
        let mut bytes = fixtures::file(true)?;
        BigEndian::write_u32(&mut bytes[20..24], 2);
        let err = find_index(Cursor::new(&bytes)).unwrap_err();
        match err {
            Error::IndexError(IndexError::IndexLengthMismatch {
                declared, consumed, ..
            }) => {
                assert_eq!(declared, 60);
                assert_eq!(consumed, 40);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_missing_null_terminator() -> Result<()> {
        let mut bytes = fixtures::file(true)?;
        let table = fixtures::INDEX_OFFSET as usize + 16 + fixtures::MANIFEST_XML.len();
        bytes[table + 14] = b'x';
        let err = find_index(Cursor::new(&bytes)).unwrap_err();
        assert!(matches!(
            err,
            Error::IndexError(IndexError::MissingNullTerminator { offset })
                if offset == table as u64 + 14
        ));
        Ok(())
    }

    #[test]
    fn test_truncated_entries() -> Result<()> {
        let bytes = fixtures::file(true)?;
        let cut = fixtures::INDEX_OFFSET as usize + 16 + fixtures::MANIFEST_XML.len() + 30;
        let err = find_index(Cursor::new(&bytes[..cut])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PrematureEof);
        Ok(())
    }

    #[test]
    fn test_unknown_index() -> Result<()> {
        let mut bytes = fixtures::file(true)?;
        let offset = fixtures::INDEX_OFFSET as usize;
        bytes[offset..offset + 4].copy_from_slice(b".hsh");
        let block = find_index(Cursor::new(&bytes))?;
        assert_eq!(&block.magic(), HASH_MAGIC);
        assert_eq!(block.entries().unwrap_err().kind(), ErrorKind::UnknownIndexFormat);
        assert_eq!(
            read_manifest_xml(Cursor::new(&bytes)).unwrap_err().kind(),
            ErrorKind::UnknownIndexFormat
        );
        Ok(())
    }

    #[test]
    fn test_unsupported_index_version() -> Result<()> {
        let mut bytes = fixtures::file(true)?;
        let offset = fixtures::INDEX_OFFSET as usize;
        bytes[offset + 4..offset + 8].copy_from_slice(b"2.00");
        let err = find_index(Cursor::new(&bytes)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedIndexVersion);
        assert_eq!(
            err.to_string(),
            "Unsupported version in .mft index header, 50.46.48.48"
        );
        Ok(())
    }

    #[test]
    fn test_sorted_index() -> Result<()> {
        let entries = ReadIndex::new(vec![
            IndexEntry::new("E3MFGYR02JA6IL", 112),
            IndexEntry::new("E3MFGYR02JWQ7T", 48),
        ]);
        let mut block = Vec::new();
        block.extend_from_slice(SORTED_MAGIC);
        block.extend_from_slice(INDEX_VERSION);
        block.extend_from_slice(&[0; 4]);
        entries.write_bytes(&mut block)?;

        let mut header = fixtures::header();
        header.number_of_reads = 2;
        header.index_offset = 240;
        header.index_length = block.len() as u32;

        let decoded = IndexBlock::from_cursor(
            &mut ByteCursor::with_offset(block.as_slice(), 240),
            &header,
        )?;
        assert_eq!(decoded.entries()?.get("E3MFGYR02JWQ7T").unwrap().offset, 48);
        assert_eq!(decoded.manifest_xml().unwrap_err().kind(), ErrorKind::NoXmlManifest);

        block[10] = 1;
        let err = IndexBlock::from_cursor(
            &mut ByteCursor::with_offset(block.as_slice(), 240),
            &header,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::IndexError(IndexError::SortedIndexMissingNulls { offset: 248 })
        ));
        Ok(())
    }

    #[test]
    fn test_empty_manifest_xml() -> Result<()> {
        let manifest = ManifestIndex::new("", vec![IndexEntry::new("a", 48)]);
        let block = IndexBlock::Manifest(manifest);
        assert_eq!(block.manifest_xml().unwrap_err().kind(), ErrorKind::NoXmlManifest);
        Ok(())
    }
}
