//! Header module for the sffio library
//!
//! This module provides the global header structure of SFF files. The header
//! describes the flow order and key sequence shared by every read, the number of
//! reads, and where the optional index block lives.
//!
//! | Offset | Size        | Field                  |
//! | ------ | ----------- | ---------------------- |
//! | 0      | 4           | magic (`.sff`)         |
//! | 4      | 4           | version (`0.0.0.1`)    |
//! | 8      | 8           | index offset           |
//! | 16     | 4           | index length           |
//! | 20     | 4           | number of reads        |
//! | 24     | 2           | header length          |
//! | 26     | 2           | key length             |
//! | 28     | 2           | flows per read         |
//! | 30     | 1           | flowgram format code   |
//! | 31     | flows       | flow characters        |
//! | ..     | key length  | key sequence           |
//! | ..     | ..          | null padding to 8      |
//!
//! All integers are big-endian.

use std::io::{Read, Write};

use byteorder::{BigEndian, ByteOrder};

use crate::cursor::{padding_len, round_up_8, ByteCursor};
use crate::error::{BuilderError, HeaderError, ReadError, Result};
use crate::index::{HASH_MAGIC, MANIFEST_MAGIC, SORTED_MAGIC};

/// Magic number identifying an SFF file
pub const MAGIC: &[u8; 4] = b".sff";

/// The only supported SFF version
pub const VERSION: [u8; 4] = [0, 0, 0, 1];

/// Size of the fixed part of the header in bytes
pub const SIZE_FIXED_HEADER: usize = 31;

/// The only defined flowgram format (u16 values scaled by 100)
pub const FLOWGRAM_FORMAT: u8 = 1;

/// The header length implied by a flow count and key length
#[must_use]
pub fn expected_header_length(flows: u16, key: u16) -> u64 {
    round_up_8(SIZE_FIXED_HEADER as u64 + u64::from(flows) + u64::from(key))
}

/// Flow count, key length and header length as stored in the fixed header
fn field_lengths(flow_chars: &[u8], key_sequence: &[u8]) -> Result<(u16, u16, u16)> {
    let Ok(flows) = u16::try_from(flow_chars.len()) else {
        return Err(BuilderError::FieldTooLong {
            field: "flow_chars",
            len: flow_chars.len(),
        }
        .into());
    };
    let Ok(key) = u16::try_from(key_sequence.len()) else {
        return Err(BuilderError::FieldTooLong {
            field: "key_sequence",
            len: key_sequence.len(),
        }
        .into());
    };
    let Ok(header_length) = u16::try_from(expected_header_length(flows, key)) else {
        return Err(BuilderError::FieldTooLong {
            field: "header",
            len: flow_chars.len() + key_sequence.len(),
        }
        .into());
    };
    Ok((flows, key, header_length))
}

/// Builder for [`SffHeader`]
///
/// # Examples
///
/// ```
/// use sffio::SffHeaderBuilder;
///
/// let header = SffHeaderBuilder::new()
///     .flow_chars(b"TACG".repeat(100))
///     .key_sequence(b"TCAG".to_vec())
///     .build()
///     .unwrap();
/// assert_eq!(header.number_of_flows(), 400);
/// assert_eq!(header.header_length, 440);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SffHeaderBuilder {
    flow_chars: Option<Vec<u8>>,
    key_sequence: Option<Vec<u8>>,
}
impl SffHeaderBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    #[must_use]
    pub fn flow_chars(mut self, flow_chars: Vec<u8>) -> Self {
        self.flow_chars = Some(flow_chars);
        self
    }
    #[must_use]
    pub fn key_sequence(mut self, key_sequence: Vec<u8>) -> Self {
        self.key_sequence = Some(key_sequence);
        self
    }
    pub fn build(self) -> Result<SffHeader> {
        let Some(flow_chars) = self.flow_chars else {
            return Err(BuilderError::MissingFlowChars.into());
        };
        let key_sequence = self.key_sequence.unwrap_or_default();
        let (_, _, header_length) = field_lengths(&flow_chars, &key_sequence)?;
        Ok(SffHeader {
            magic: *MAGIC,
            version: VERSION,
            index_offset: 0,
            index_length: 0,
            number_of_reads: 0,
            header_length,
            flowgram_format: FLOWGRAM_FORMAT,
            flow_chars,
            key_sequence,
        })
    }
}

/// Global header of an SFF file
///
/// Decoded once when a file is opened and immutable afterwards. Record decoding
/// borrows it to size the flowgram of every read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SffHeader {
    /// Always `.sff`
    pub magic: [u8; 4],

    /// Always `0.0.0.1`
    pub version: [u8; 4],

    /// Absolute offset of the index block, 0 if absent
    pub index_offset: u64,

    /// Length of the index block (without trailing padding), 0 if absent
    pub index_length: u32,

    /// Number of reads stored in the file
    pub number_of_reads: u32,

    /// Length of the header including flow chars, key and padding
    pub header_length: u16,

    /// Always 1
    pub flowgram_format: u8,

    /// Nucleotide flowed at each cycle, one per flowgram value
    pub flow_chars: Vec<u8>,

    /// Key sequence prefixed to every read
    pub key_sequence: Vec<u8>,
}
impl SffHeader {
    /// Number of flowgram values in every read
    #[must_use]
    pub fn number_of_flows(&self) -> usize {
        self.flow_chars.len()
    }

    #[must_use]
    pub fn key_length(&self) -> usize {
        self.key_sequence.len()
    }

    /// Whether the header points at an index block
    #[must_use]
    pub fn has_index(&self) -> bool {
        self.index_offset != 0 && self.index_length != 0
    }

    /// Decodes a header from the start of a byte source
    ///
    /// The cursor is left at `header_length` on success.
    ///
    /// # Errors
    ///
    /// * `ReadError::EmptyFile` if the source holds no bytes at all
    /// * `HeaderError::TooSmall` if fewer than 31 bytes are available
    /// * `HeaderError::AtIndexBlock` if the source starts with an index block magic
    /// * `HeaderError::BadMagic` if the magic is not `.sff`
    /// * `HeaderError::UnsupportedVersion` if the version is not `0.0.0.1`
    /// * `HeaderError::UnsupportedFlowgramFormat` if the format code is not 1
    /// * `HeaderError::InconsistentIndex` if only one of the index fields is zero
    /// * `HeaderError::MalformedHeader` if the header length is inconsistent
    /// * `ReadError::PrematureEof` / `ReadError::BadPadding` for the variable part
    pub fn from_cursor<R: Read>(cursor: &mut ByteCursor<R>) -> Result<Self> {
        let mut fixed = [0u8; SIZE_FIXED_HEADER];
        let available = cursor.read_available(&mut fixed)?;
        if available == 0 {
            return Err(ReadError::EmptyFile.into());
        }
        if available < SIZE_FIXED_HEADER {
            return Err(HeaderError::TooSmall { available }.into());
        }
        let mut header = Self::from_fixed(&fixed)?;
        header.flow_chars = cursor.read_vec(header.flow_chars.len())?;
        header.key_sequence = cursor.read_vec(header.key_sequence.len())?;
        let used = SIZE_FIXED_HEADER + header.number_of_flows() + header.key_length();
        cursor.expect_padding(usize::from(header.header_length) - used)?;
        Ok(header)
    }

    /// Decodes a header from a buffer holding at least the whole header
    pub fn from_buffer(buffer: &[u8]) -> Result<Self> {
        Self::from_cursor(&mut ByteCursor::new(buffer))
    }

    /// Validates the fixed part of the header
    ///
    /// The returned header has zero-filled `flow_chars` and `key_sequence` of the
    /// declared lengths; [`SffHeader::from_cursor`] replaces them with the real bytes.
    fn from_fixed(buffer: &[u8; SIZE_FIXED_HEADER]) -> Result<Self> {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&buffer[0..4]);
        if [MANIFEST_MAGIC, SORTED_MAGIC, HASH_MAGIC].contains(&&magic) {
            return Err(HeaderError::AtIndexBlock(magic).into());
        }
        if &magic != MAGIC {
            return Err(HeaderError::BadMagic(magic).into());
        }
        let mut version = [0u8; 4];
        version.copy_from_slice(&buffer[4..8]);
        if version != VERSION {
            return Err(HeaderError::UnsupportedVersion(version).into());
        }

        let index_offset = BigEndian::read_u64(&buffer[8..16]);
        let index_length = BigEndian::read_u32(&buffer[16..20]);
        let number_of_reads = BigEndian::read_u32(&buffer[20..24]);
        let header_length = BigEndian::read_u16(&buffer[24..26]);
        let key = BigEndian::read_u16(&buffer[26..28]);
        let flows = BigEndian::read_u16(&buffer[28..30]);
        let flowgram_format = buffer[30];

        if flowgram_format != FLOWGRAM_FORMAT {
            return Err(HeaderError::UnsupportedFlowgramFormat(flowgram_format).into());
        }
        if (index_offset == 0) != (index_length == 0) {
            return Err(HeaderError::InconsistentIndex {
                offset: index_offset,
                length: index_length,
            }
            .into());
        }
        let expected = expected_header_length(flows, key);
        if u64::from(header_length) != expected {
            return Err(HeaderError::MalformedHeader {
                header_length,
                expected,
                flows,
                key,
            }
            .into());
        }

        log::debug!(
            "SFF header: {number_of_reads} reads, {flows} flows, index at {index_offset}+{index_length}"
        );
        Ok(Self {
            magic,
            version,
            index_offset,
            index_length,
            number_of_reads,
            header_length,
            flowgram_format,
            flow_chars: vec![0; usize::from(flows)],
            key_sequence: vec![0; usize::from(key)],
        })
    }

    /// Header length implied by the current flow characters and key sequence
    ///
    /// `header_length` is a plain field, so it goes stale if `flow_chars` or
    /// `key_sequence` are replaced after decoding or building.
    ///
    /// # Errors
    ///
    /// * `BuilderError::FieldTooLong` if either sequence overflows its u16 field
    pub fn computed_header_length(&self) -> Result<u16> {
        field_lengths(&self.flow_chars, &self.key_sequence).map(|(_, _, length)| length)
    }

    /// Serializes the header, including its trailing padding
    ///
    /// The length fields are derived from `flow_chars` and `key_sequence`,
    /// not copied from `header_length`.
    ///
    /// # Errors
    ///
    /// * `BuilderError::FieldTooLong` if either sequence overflows its u16 field
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let (flows, key, header_length) = field_lengths(&self.flow_chars, &self.key_sequence)?;
        let mut buffer = vec![0u8; SIZE_FIXED_HEADER];
        buffer[0..4].copy_from_slice(&self.magic);
        buffer[4..8].copy_from_slice(&self.version);
        BigEndian::write_u64(&mut buffer[8..16], self.index_offset);
        BigEndian::write_u32(&mut buffer[16..20], self.index_length);
        BigEndian::write_u32(&mut buffer[20..24], self.number_of_reads);
        BigEndian::write_u16(&mut buffer[24..26], header_length);
        BigEndian::write_u16(&mut buffer[26..28], key);
        BigEndian::write_u16(&mut buffer[28..30], flows);
        buffer[30] = self.flowgram_format;
        buffer.extend_from_slice(&self.flow_chars);
        buffer.extend_from_slice(&self.key_sequence);
        buffer.resize(buffer.len() + padding_len(buffer.len() as u64), 0);
        Ok(buffer)
    }

    /// Writes the header to a writer
    pub fn write_bytes<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.to_bytes()?)?;
        Ok(())
    }
}
