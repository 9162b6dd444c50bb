//! Read records of an SFF file
//!
//! Every record is made of two independently padded sections:
//!
//! * a read header: `read_header_length` (u16), `name_length` (u16),
//!   `number_of_bases` (u32), four clip values (u16 each), the name, and null
//!   padding up to `read_header_length`
//! * a data section: one u16 flowgram value per flow, then one byte per base for
//!   each of the flow index, the bases and the quality scores, followed by null
//!   padding to the next multiple of 8
//!
//! Clip values are stored exactly as found on disk (1-based, 0 meaning unset)
//! so that writing a decoded record reproduces its bytes.

mod name;

use std::io::{Read, Write};
use std::ops::Range;

use byteorder::{BigEndian, WriteBytesExt};

pub use name::{read_coords, read_region, read_time, NamedRead, ReadTime, STANDARD_NAME_LENGTH};

use crate::cursor::{padding_len, round_up_8, ByteCursor};
use crate::error::{ReadError, Result, WriteError};
use crate::header::SffHeader;

/// Size of the fixed part of a read header in bytes
pub const SIZE_READ_HEADER: usize = 16;

const PADDING: [u8; 8] = [0; 8];

/// The read header length implied by a name length
#[must_use]
pub fn expected_read_header_length(name_length: u16) -> u64 {
    round_up_8(SIZE_READ_HEADER as u64 + u64::from(name_length))
}

/// A single decoded read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SffRecord {
    /// Read name (ASCII)
    pub name: String,

    /// 1-based position of the first base after quality clipping, 0 if unset
    pub clip_qual_left: u16,

    /// 1-based position of the last base before quality clipping, 0 if unset
    pub clip_qual_right: u16,

    /// 1-based position of the first base after adapter clipping, 0 if unset
    pub clip_adapter_left: u16,

    /// 1-based position of the last base before adapter clipping, 0 if unset
    pub clip_adapter_right: u16,

    /// Flowgram intensities scaled by 100, one per flow
    pub flowgram: Vec<u16>,

    /// Flow index of every base, relative to the previous base
    pub flow_index: Vec<u8>,

    /// Called bases
    pub bases: Vec<u8>,

    /// Phred quality of every base
    pub quality: Vec<u8>,
}
impl SffRecord {
    /// Creates an unclipped record
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        flowgram: Vec<u16>,
        flow_index: Vec<u8>,
        bases: Vec<u8>,
        quality: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            flowgram,
            flow_index,
            bases,
            quality,
            ..Self::default()
        }
    }

    /// Sets the quality and adapter clip values (on-disk convention)
    #[must_use]
    pub fn with_clips(mut self, qual: (u16, u16), adapter: (u16, u16)) -> Self {
        (self.clip_qual_left, self.clip_qual_right) = qual;
        (self.clip_adapter_left, self.clip_adapter_right) = adapter;
        self
    }

    #[must_use]
    pub fn number_of_bases(&self) -> usize {
        self.bases.len()
    }

    /// Length of the padded read header section
    #[must_use]
    pub fn read_header_length(&self) -> u16 {
        expected_read_header_length(self.name.len() as u16) as u16
    }

    /// Length of the data section before padding
    fn data_length(&self) -> u64 {
        2 * self.flowgram.len() as u64 + 3 * self.bases.len() as u64
    }

    /// Number of bytes this record occupies on disk, padding included
    #[must_use]
    pub fn encoded_len(&self) -> u64 {
        u64::from(self.read_header_length()) + round_up_8(self.data_length())
    }

    /// Decodes one record starting at the cursor position
    ///
    /// On success the cursor sits on the 8-byte boundary following the data
    /// section.
    ///
    /// # Errors
    ///
    /// * `ReadError::MalformedRecordHeader` if `read_header_length` does not match
    ///   the name length
    /// * `ReadError::BadPadding` if either padding region holds a non-null byte
    /// * `ReadError::PrematureEof` if the source ends inside the record
    pub fn from_cursor<R: Read>(cursor: &mut ByteCursor<R>, header: &SffHeader) -> Result<Self> {
        let offset = cursor.position();
        let read_header_length = cursor.read_u16()?;
        let name_length = cursor.read_u16()?;
        let expected = expected_read_header_length(name_length);
        if u64::from(read_header_length) != expected {
            return Err(ReadError::MalformedRecordHeader {
                offset,
                read_header_length,
                expected,
            }
            .into());
        }
        let number_of_bases = cursor.read_u32()? as usize;
        let clip_qual_left = cursor.read_u16()?;
        let clip_qual_right = cursor.read_u16()?;
        let clip_adapter_left = cursor.read_u16()?;
        let clip_adapter_right = cursor.read_u16()?;

        let name_offset = cursor.position();
        let name = cursor.read_vec(usize::from(name_length))?;
        let name = String::from_utf8(name).map_err(|e| ReadError::InvalidReadName {
            offset: name_offset,
            valid_up_to: e.utf8_error().valid_up_to(),
        })?;
        cursor.expect_padding(usize::from(read_header_length) - SIZE_READ_HEADER - name.len())?;

        let flowgram = cursor.read_u16_vec(header.number_of_flows())?;
        let flow_index = cursor.read_vec(number_of_bases)?;
        let bases = cursor.read_vec(number_of_bases)?;
        let quality = cursor.read_vec(number_of_bases)?;

        let record = Self {
            name,
            clip_qual_left,
            clip_qual_right,
            clip_adapter_left,
            clip_adapter_right,
            flowgram,
            flow_index,
            bases,
            quality,
        };
        cursor.expect_padding(padding_len(record.data_length()))?;
        Ok(record)
    }

    /// Decodes one record from a buffer starting at the record
    pub fn from_buffer(buffer: &[u8], header: &SffHeader) -> Result<Self> {
        Self::from_cursor(&mut ByteCursor::new(buffer), header)
    }

    /// Checks that the record can be encoded under `header`
    ///
    /// # Errors
    ///
    /// * `WriteError::InvalidName` for empty names, non-ASCII names, or names
    ///   containing a null byte
    /// * `WriteError::FieldTooLong` if the name or base count overflows its field
    /// * `WriteError::FlowCountMismatch` if the flowgram length differs from the
    ///   header's flow count
    /// * `WriteError::BaseCountMismatch` if flow index or quality lengths differ
    ///   from the number of bases
    pub fn validate(&self, header: &SffHeader) -> Result<()> {
        if self.name.is_empty() || !self.name.is_ascii() || self.name.contains('\0') {
            return Err(WriteError::InvalidName(self.name.clone()).into());
        }
        // the padded read header length must itself fit in a u16
        if self.name.len() > usize::from(u16::MAX) - SIZE_READ_HEADER - 7 {
            return Err(WriteError::FieldTooLong {
                name: self.name.clone(),
                field: "name",
                len: self.name.len(),
            }
            .into());
        }
        if u32::try_from(self.bases.len()).is_err() {
            return Err(WriteError::FieldTooLong {
                name: self.name.clone(),
                field: "bases",
                len: self.bases.len(),
            }
            .into());
        }
        if self.flowgram.len() != header.number_of_flows() {
            return Err(WriteError::FlowCountMismatch {
                name: self.name.clone(),
                expected: header.number_of_flows(),
                got: self.flowgram.len(),
            }
            .into());
        }
        for (field, len) in [
            ("flow index", self.flow_index.len()),
            ("quality", self.quality.len()),
        ] {
            if len != self.bases.len() {
                return Err(WriteError::BaseCountMismatch {
                    name: self.name.clone(),
                    field,
                    bases: self.bases.len(),
                    got: len,
                }
                .into());
            }
        }
        Ok(())
    }

    /// Encodes the record, padding included
    ///
    /// The record is assumed to have passed [`SffRecord::validate`].
    pub fn write_bytes<W: Write>(&self, writer: &mut W) -> Result<()> {
        let read_header_length = self.read_header_length();
        writer.write_u16::<BigEndian>(read_header_length)?;
        writer.write_u16::<BigEndian>(self.name.len() as u16)?;
        writer.write_u32::<BigEndian>(self.bases.len() as u32)?;
        writer.write_u16::<BigEndian>(self.clip_qual_left)?;
        writer.write_u16::<BigEndian>(self.clip_qual_right)?;
        writer.write_u16::<BigEndian>(self.clip_adapter_left)?;
        writer.write_u16::<BigEndian>(self.clip_adapter_right)?;
        writer.write_all(self.name.as_bytes())?;
        let name_padding = usize::from(read_header_length) - SIZE_READ_HEADER - self.name.len();
        writer.write_all(&PADDING[..name_padding])?;

        for value in &self.flowgram {
            writer.write_u16::<BigEndian>(*value)?;
        }
        writer.write_all(&self.flow_index)?;
        writer.write_all(&self.bases)?;
        writer.write_all(&self.quality)?;
        writer.write_all(&PADDING[..padding_len(self.data_length())])?;
        Ok(())
    }

    /// Encodes the record into a new buffer
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(self.encoded_len() as usize);
        self.write_bytes(&mut buffer)?;
        Ok(buffer)
    }

    /// 0-based half-open range of bases kept after quality and adapter clipping
    ///
    /// Overlapping clip values trim the read to nothing.
    #[must_use]
    pub fn clip_range(&self) -> Range<usize> {
        let n = self.bases.len();
        let left = usize::from(
            self.clip_qual_left
                .saturating_sub(1)
                .max(self.clip_adapter_left.saturating_sub(1)),
        );
        let right = match (self.clip_qual_right, self.clip_adapter_right) {
            (0, 0) => n,
            (0, adapter) => usize::from(adapter),
            (qual, 0) => usize::from(qual),
            (qual, adapter) => usize::from(qual.min(adapter)),
        }
        .min(n);
        if left >= right {
            log::warn!(
                "Overlapping clip values in SFF record {}, trimmed to nothing",
                self.name
            );
            return 0..0;
        }
        left..right
    }

    /// Bases within the clip range
    #[must_use]
    pub fn trimmed_bases(&self) -> &[u8] {
        &self.bases[self.clip_range()]
    }

    /// Quality scores within the clip range
    #[must_use]
    pub fn trimmed_quality(&self) -> &[u8] {
        &self.quality[self.clip_range()]
    }

    /// All bases, with clipped regions in lower case and the kept region in upper case
    #[must_use]
    pub fn masked_bases(&self) -> Vec<u8> {
        let keep = self.clip_range();
        self.bases
            .iter()
            .enumerate()
            .map(|(idx, base)| {
                if keep.contains(&idx) {
                    base.to_ascii_uppercase()
                } else {
                    base.to_ascii_lowercase()
                }
            })
            .collect()
    }

    /// Flowgram values as floating point intensities
    #[must_use]
    pub fn flow_intensities(&self) -> Vec<f32> {
        self.flowgram
            .iter()
            .map(|&value| f32::from(value) / 100.0)
            .collect()
    }

    /// 1-based flow number at which each base was called
    #[must_use]
    pub fn flow_positions(&self) -> Vec<usize> {
        self.flow_index
            .iter()
            .scan(0, |pos, &delta| {
                *pos += usize::from(delta);
                Some(*pos)
            })
            .collect()
    }

    /// Flowgram intensity observed for each called base
    #[must_use]
    pub fn base_intensities(&self) -> Vec<Option<f32>> {
        self.flow_positions()
            .into_iter()
            .map(|pos| {
                pos.checked_sub(1)
                    .and_then(|idx| self.flowgram.get(idx))
                    .map(|&value| f32::from(value) / 100.0)
            })
            .collect()
    }
}
impl NamedRead for SffRecord {
    fn name(&self) -> &str {
        &self.name
    }
}
