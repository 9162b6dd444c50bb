//! SFF writer module
//!
//! [`SffWriter`] encodes records behind a placeholder header. The final read
//! count and index location are only known once every record is written, so
//! [`SffWriter::finish`] appends the manifest index and then seeks back to
//! rewrite the header. Output sinks therefore need to implement [`Seek`].
//!
//! ```
//! use std::io::Cursor;
//! use sffio::{SffHeaderBuilder, SffReader, SffRecord, SffWriterBuilder};
//!
//! let header = SffHeaderBuilder::new()
//!     .flow_chars(b"TACG".to_vec())
//!     .key_sequence(b"TCAG".to_vec())
//!     .build()
//!     .unwrap();
//! let mut writer = SffWriterBuilder::default()
//!     .header(header)
//!     .build(Cursor::new(Vec::new()))
//!     .unwrap();
//! let record = SffRecord::new("read_1", vec![100, 0, 0, 0], vec![1], b"T".to_vec(), vec![30]);
//! writer.write_record(&record).unwrap();
//! let bytes = writer.finish().unwrap().into_inner();
//!
//! let mut reader = SffReader::new(bytes.as_slice()).unwrap();
//! assert_eq!(reader.next().unwrap().unwrap(), record);
//! assert!(reader.next().is_none());
//! ```

use std::io::{BufWriter, IntoInnerError, Seek, SeekFrom, Write};

use crate::cursor::padding_len;
use crate::error::{Result, WriteError};
use crate::header::SffHeader;
use crate::index::{IndexEntry, ManifestIndex, MAX_INDEX_OFFSET};
use crate::record::SffRecord;

/// Default size of the output buffer
pub const DEFAULT_BUFFER_CAPACITY: usize = 8192;

const PADDING: [u8; 8] = [0; 8];

/// The XML written into the manifest index when the caller supplies none
#[must_use]
pub fn default_manifest_xml() -> String {
    format!(
        "<!-- This file was written by {} {} without a run manifest. -->\n",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    )
}

/// Builder for [`SffWriter`]
///
/// The header is required. By default a manifest index is written, holding
/// [`default_manifest_xml`].
#[derive(Debug, Clone, Default)]
pub struct SffWriterBuilder {
    header: Option<SffHeader>,
    index: Option<bool>,
    manifest_xml: Option<String>,
    buffer_capacity: Option<usize>,
}
impl SffWriterBuilder {
    #[must_use]
    pub fn header(mut self, header: SffHeader) -> Self {
        self.header = Some(header);
        self
    }

    /// Whether to append a manifest index
    #[must_use]
    pub fn index(mut self, index: bool) -> Self {
        self.index = Some(index);
        self
    }

    /// XML run manifest embedded in the index
    #[must_use]
    pub fn manifest_xml(mut self, xml: impl Into<String>) -> Self {
        self.manifest_xml = Some(xml.into());
        self
    }

    #[must_use]
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = Some(capacity);
        self
    }

    pub fn build<W: Write + Seek>(self, inner: W) -> Result<SffWriter<W>> {
        let Some(header) = self.header else {
            return Err(WriteError::MissingHeader.into());
        };
        SffWriter::new(
            BufWriter::with_capacity(
                self.buffer_capacity.unwrap_or(DEFAULT_BUFFER_CAPACITY),
                inner,
            ),
            header,
            self.index.unwrap_or(true),
            self.manifest_xml.unwrap_or_else(default_manifest_xml),
        )
    }
}

/// Writes SFF records to a seekable sink
///
/// Offsets stored in the header and index are relative to the sink position at
/// construction, which is where the header is written.
///
/// The header written at construction is a placeholder declaring no reads and
/// no index. Only [`SffWriter::finish`] patches it, so a writer dropped without
/// finishing leaves a file whose records are invisible to readers.
pub struct SffWriter<W: Write + Seek> {
    /// Buffered output
    inner: BufWriter<W>,

    /// Header template; read count and index fields are filled on finish
    header: SffHeader,

    /// Whether to append a manifest index
    emit_index: bool,

    /// XML embedded in the manifest index
    manifest_xml: String,

    /// Name and offset of every written record
    entries: Vec<IndexEntry>,

    /// Sink position of the header
    start: u64,

    /// Bytes written since `start`
    position: u64,
}
impl<W: Write + Seek> SffWriter<W> {
    /// Writes a placeholder header and returns a writer positioned for records
    ///
    /// Prefer [`SffWriterBuilder`] for construction.
    pub fn new(
        mut inner: BufWriter<W>,
        mut header: SffHeader,
        emit_index: bool,
        manifest_xml: String,
    ) -> Result<Self> {
        header.header_length = header.computed_header_length()?;
        let start = inner.stream_position()?;
        let placeholder = SffHeader {
            index_offset: 0,
            index_length: 0,
            number_of_reads: 0,
            ..header.clone()
        };
        let bytes = placeholder.to_bytes()?;
        inner.write_all(&bytes)?;
        Ok(Self {
            inner,
            header,
            emit_index,
            manifest_xml,
            entries: Vec::new(),
            start,
            position: bytes.len() as u64,
        })
    }

    #[must_use]
    pub fn header(&self) -> &SffHeader {
        &self.header
    }

    /// Number of records written so far
    #[must_use]
    pub fn num_records(&self) -> usize {
        self.entries.len()
    }

    /// Validates and writes a single record
    ///
    /// Nothing is written if the record does not fit the header.
    pub fn write_record(&mut self, record: &SffRecord) -> Result<()> {
        record.validate(&self.header)?;
        if self.entries.len() == u32::MAX as usize {
            return Err(WriteError::FieldTooLong {
                name: record.name.clone(),
                field: "number_of_reads",
                len: self.entries.len() + 1,
            }
            .into());
        }
        record.write_bytes(&mut self.inner)?;
        self.entries
            .push(IndexEntry::new(record.name.clone(), self.position));
        self.position += record.encoded_len();
        Ok(())
    }

    /// Builds the manifest index, or `None` if it is disabled or cannot be
    /// expressed
    fn manifest_index(&mut self) -> Option<ManifestIndex> {
        if !self.emit_index {
            return None;
        }
        let index = ManifestIndex::new(
            std::mem::take(&mut self.manifest_xml),
            std::mem::take(&mut self.entries),
        );
        if index.max_offset().is_some_and(|offset| offset > MAX_INDEX_OFFSET) {
            log::warn!(
                "Record offsets exceed {MAX_INDEX_OFFSET}, writing SFF file without an index"
            );
            return None;
        }
        if u32::try_from(index.encoded_len()).is_err() {
            log::warn!(
                "Index of {} bytes exceeds the header field, writing SFF file without an index",
                index.encoded_len()
            );
            return None;
        }
        Some(index)
    }

    /// Writes the index and the final header, then returns the sink
    ///
    /// The sink is left positioned at the end of the written file.
    pub fn finish(mut self) -> Result<W> {
        let mut header = self.header.clone();
        header.number_of_reads = self.entries.len() as u32;
        header.index_offset = 0;
        header.index_length = 0;

        if let Some(index) = self.manifest_index() {
            index.write_bytes(&mut self.inner)?;
            header.index_offset = self.position;
            header.index_length = index.encoded_len() as u32;
            self.position += index.encoded_len();
            let padding = padding_len(self.position);
            self.inner.write_all(&PADDING[..padding])?;
            self.position += padding as u64;
        }

        self.inner.seek(SeekFrom::Start(self.start))?;
        header.write_bytes(&mut self.inner)?;
        self.inner
            .seek(SeekFrom::Start(self.start + self.position))?;
        self.inner.flush()?;
        log::debug!(
            "Wrote SFF file of {} reads and {} bytes",
            header.number_of_reads,
            self.position
        );
        Ok(self.inner.into_inner().map_err(IntoInnerError::into_error)?)
    }
}

/// Writes a complete SFF file to `sink` and returns the number of records written
///
/// Every record is validated before any byte is written, so an invalid batch
/// leaves the sink untouched.
pub fn write_file<W: Write + Seek>(
    sink: W,
    header: &SffHeader,
    records: &[SffRecord],
    emit_index: bool,
) -> Result<usize> {
    for record in records {
        record.validate(header)?;
    }
    let mut writer = SffWriterBuilder::default()
        .header(header.clone())
        .index(emit_index)
        .build(sink)?;
    for record in records {
        writer.write_record(record)?;
    }
    writer.finish()?;
    Ok(records.len())
}

#[cfg(test)]
mod testing {
    use std::fs::File;
    use std::io::Cursor;

    use super::*;
    use crate::error::{BuilderError, Error, ErrorKind};
    use crate::fixtures;
    use crate::index::find_index;
    use crate::reader::SffReader;

    fn decode_all(bytes: &[u8]) -> Result<(SffHeader, Vec<SffRecord>)> {
        let reader = SffReader::new(bytes)?;
        let header = reader.header().clone();
        let records = reader.collect::<Result<Vec<_>>>()?;
        Ok((header, records))
    }

    #[test]
    fn test_roundtrip_with_index() -> Result<()> {
        let bytes = fixtures::file(true)?;
        assert_eq!(bytes.len(), fixtures::FILE_LENGTH);

        let (header, records) = decode_all(&bytes)?;
        assert_eq!(header.number_of_reads, 3);
        assert_eq!(header.index_offset, fixtures::INDEX_OFFSET);
        assert_eq!(header.index_length, fixtures::INDEX_LENGTH);
        assert_eq!(records, fixtures::records());
        Ok(())
    }

    #[test]
    fn test_roundtrip_without_index() -> Result<()> {
        let bytes = fixtures::file(false)?;
        assert_eq!(bytes.len() as u64, fixtures::INDEX_OFFSET);

        let (header, records) = decode_all(&bytes)?;
        assert_eq!(header.index_offset, 0);
        assert_eq!(header.index_length, 0);
        assert_eq!(records, fixtures::records());

        let err = find_index(Cursor::new(&bytes)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoIndexPresent);
        Ok(())
    }

    #[test]
    fn test_rewrite_is_byte_exact() -> Result<()> {
        let bytes = fixtures::file(true)?;
        let (header, records) = decode_all(&bytes)?;

        let mut writer = SffWriterBuilder::default()
            .header(header)
            .manifest_xml(fixtures::MANIFEST_XML)
            .build(Cursor::new(Vec::new()))?;
        for record in &records {
            writer.write_record(record)?;
        }
        assert_eq!(writer.finish()?.into_inner(), bytes);
        Ok(())
    }

    #[test]
    fn test_write_file() -> Result<()> {
        let mut sink = Cursor::new(Vec::new());
        let count = write_file(&mut sink, &fixtures::header(), &fixtures::records(), true)?;
        assert_eq!(count, 3);

        let bytes = sink.into_inner();
        let (_, records) = decode_all(&bytes)?;
        assert_eq!(records.len(), 3);
        let block = find_index(Cursor::new(&bytes))?;
        assert_eq!(block.manifest_xml()?, default_manifest_xml());
        Ok(())
    }

    #[test]
    fn test_write_file_validates_first() {
        let mut records = fixtures::records();
        records[2].quality.pop();
        let mut sink = Cursor::new(Vec::new());
        let err = write_file(&mut sink, &fixtures::header(), &records, true).unwrap_err();
        assert!(matches!(
            err,
            Error::WriteError(WriteError::BaseCountMismatch { bases: 4, got: 3, .. })
        ));
        assert!(sink.into_inner().is_empty());
    }

    #[test]
    fn test_rejected_record_is_not_written() -> Result<()> {
        let mut writer = SffWriterBuilder::default()
            .header(fixtures::header())
            .index(false)
            .build(Cursor::new(Vec::new()))?;
        let mut record = fixtures::records()[0].clone();
        record.flowgram.push(0);
        assert_eq!(
            writer.write_record(&record).unwrap_err().kind(),
            ErrorKind::InvalidRecord
        );
        assert_eq!(writer.num_records(), 0);

        let bytes = writer.finish()?.into_inner();
        assert_eq!(bytes.len(), 48);
        let (header, records) = decode_all(&bytes)?;
        assert_eq!(header.number_of_reads, 0);
        assert!(records.is_empty());
        Ok(())
    }

    #[test]
    fn test_missing_header() {
        let err = SffWriterBuilder::default()
            .build(Cursor::new(Vec::new()))
            .err()
            .unwrap();
        assert!(matches!(err, Error::WriteError(WriteError::MissingHeader)));
    }

    #[test]
    fn test_offsets_beyond_index_range() -> Result<()> {
        let mut writer = SffWriterBuilder::default()
            .header(fixtures::header())
            .build(Cursor::new(Vec::new()))?;
        writer.write_record(&fixtures::records()[0])?;
        writer
            .entries
            .push(IndexEntry::new("E3MFGYR02JA6IL", MAX_INDEX_OFFSET + 1));
        assert!(writer.manifest_index().is_none());
        Ok(())
    }

    #[test]
    fn test_header_fields_are_recomputed() -> Result<()> {
        let mut header = fixtures::header();
        header.number_of_reads = 99;
        header.index_offset = 1;
        header.index_length = 1;
        let mut sink = Cursor::new(Vec::new());
        write_file(&mut sink, &header, &fixtures::records(), false)?;
        let (header, _) = decode_all(sink.get_ref())?;
        assert_eq!(header.number_of_reads, 3);
        assert!(!header.has_index());
        Ok(())
    }

    #[test]
    fn test_flow_chars_replaced_after_build() -> Result<()> {
        let mut header = fixtures::header();
        header.flow_chars = b"TACG".repeat(4);
        let record = SffRecord::new(
            "E3MFGYR02JWQ7T",
            vec![101; 16],
            vec![1, 2, 3, 0],
            b"TCAA".to_vec(),
            vec![38, 37, 36, 36],
        );

        let mut sink = Cursor::new(Vec::new());
        assert_eq!(write_file(&mut sink, &header, &[record.clone()], true)?, 1);
        let (decoded, records) = decode_all(sink.get_ref())?;
        assert_eq!(decoded.header_length, 56);
        assert_eq!(decoded.number_of_flows(), 16);
        assert_eq!(records, vec![record]);
        Ok(())
    }

    #[test]
    fn test_oversized_key_is_rejected() {
        let mut header = fixtures::header();
        header.key_sequence = vec![b'A'; usize::from(u16::MAX) + 1];
        let mut sink = Cursor::new(Vec::new());
        let err = write_file(&mut sink, &header, &[], false).unwrap_err();
        assert!(matches!(
            err,
            Error::BuilderError(BuilderError::FieldTooLong { field: "key_sequence", .. })
        ));
        assert!(sink.into_inner().is_empty());
    }

    #[test]
    fn test_to_path() -> Result<()> {
        let path = "test_writer_to_path.sff";
        let count = write_file(
            File::create(path)?,
            &fixtures::header(),
            &fixtures::records(),
            true,
        )?;
        assert_eq!(count, 3);
        let bytes = std::fs::read(path)?;
        let (header, records) = decode_all(&bytes)?;
        assert_eq!(header.index_offset, fixtures::INDEX_OFFSET);
        assert_eq!(records, fixtures::records());

        // delete file
        std::fs::remove_file(path)?;
        Ok(())
    }
}
