//! Sequential SFF reading
//!
//! [`SffReader`] decodes the header when it is created and then yields one
//! record at a time. Records have data-dependent lengths, so decoding is
//! strictly sequential; the reader only needs [`Read`] and never seeks.
//!
//! Once the declared number of records has been read, the rest of the source is
//! checked before iteration ends: the index block must start right after the
//! last record, its padding must be null, and nothing may follow it. A violation
//! is reported as the final item of the iteration, after every valid record has
//! been yielded.

mod mmap;

use std::io::{Read, Seek};
use std::iter::FusedIterator;

pub use mmap::{MmapReader, BATCH_SIZE};

use crate::cursor::{padding_len, ByteCursor};
use crate::error::{ReadError, Result};
use crate::header::{SffHeader, MAGIC};
use crate::record::SffRecord;

/// Opens a byte source for sequential reading
///
/// Equivalent to [`SffReader::new`].
pub fn open<R: Read>(source: R) -> Result<SffReader<R>> {
    SffReader::new(source)
}

/// A forward-only reader over the records of an SFF byte source
///
/// # Examples
///
/// ```
/// use sffio::{SffHeaderBuilder, SffReader, SffRecord, write_file};
/// use std::io::Cursor;
///
/// let header = SffHeaderBuilder::new().flow_chars(b"TACG".to_vec()).build().unwrap();
/// let records = vec![SffRecord::new("r1", vec![100, 0, 0, 0], vec![1], b"T".to_vec(), vec![30])];
/// let mut sink = Cursor::new(Vec::new());
/// write_file(&mut sink, &header, &records, true).unwrap();
///
/// let reader = SffReader::new(sink.get_ref().as_slice()).unwrap();
/// assert_eq!(reader.header().number_of_reads, 1);
/// for record in reader {
///     let record = record.unwrap();
///     assert_eq!(record.bases, b"T");
/// }
/// ```
#[derive(Debug)]
pub struct SffReader<R: Read> {
    /// Offset-tracking source
    cursor: ByteCursor<R>,

    /// Header decoded at construction
    header: SffHeader,

    /// Number of records yielded so far
    records_read: u32,

    /// Set once the end checks ran or an error was yielded
    finished: bool,
}
impl<R: Read> SffReader<R> {
    /// Decodes the header of `source`, which must be positioned at its start
    ///
    /// # Errors
    ///
    /// `ReadError::EmptyFile` for an empty source, or any header decoding error.
    pub fn new(source: R) -> Result<Self> {
        let mut cursor = ByteCursor::new(source);
        let header = SffHeader::from_cursor(&mut cursor)?;
        Ok(Self::from_parts(cursor, header))
    }

    /// Continues from a cursor already positioned after `header`
    pub(crate) fn from_parts(cursor: ByteCursor<R>, header: SffHeader) -> Self {
        Self {
            cursor,
            header,
            records_read: 0,
            finished: false,
        }
    }

    #[must_use]
    pub fn header(&self) -> &SffHeader {
        &self.header
    }

    /// Current absolute offset in the source
    #[must_use]
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    /// Number of records decoded so far
    #[must_use]
    pub fn records_read(&self) -> u32 {
        self.records_read
    }

    pub fn into_inner(self) -> R {
        self.cursor.into_inner()
    }

    /// Decodes the next record, or runs the end-of-file checks once every
    /// declared record has been read
    pub fn next_record(&mut self) -> Option<Result<SffRecord>> {
        if self.finished {
            return None;
        }
        if self.records_read == self.header.number_of_reads {
            self.finished = true;
            return self.check_end().err().map(Err);
        }
        if self.header.has_index() && self.cursor.position() == self.header.index_offset {
            self.finished = true;
            return Some(Err(ReadError::IndexBeforeRecordsExhausted {
                index_offset: self.header.index_offset,
                records_read: self.records_read,
                declared: self.header.number_of_reads,
            }
            .into()));
        }
        match SffRecord::from_cursor(&mut self.cursor, &self.header) {
            Ok(record) => {
                self.records_read += 1;
                Some(Ok(record))
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }

    /// Validates everything after the last record
    fn check_end(&mut self) -> Result<()> {
        if self.header.has_index() && !self.skip_index()? {
            return Ok(());
        }
        let offset = self.cursor.position();
        let mut probe = [0u8; 4];
        let available = self.cursor.read_available(&mut probe)?;
        if available == 0 {
            return Ok(());
        }
        if &probe == MAGIC {
            return Err(ReadError::ConcatenatedFilesDetected { offset }.into());
        }
        Err(ReadError::TrailingGarbage { offset }.into())
    }

    /// Consumes the index block and its padding
    ///
    /// Returns `false` if the source ended inside the padding, in which case
    /// nothing is left to inspect.
    fn skip_index(&mut self) -> Result<bool> {
        let record_end = self.cursor.position();
        let index_offset = self.header.index_offset;
        if record_end < index_offset {
            return Err(ReadError::UnexpectedGapBeforeIndex {
                gap: index_offset - record_end,
                record_end,
                index_offset,
            }
            .into());
        }
        if record_end > index_offset {
            return Err(ReadError::CorruptIndexPointer {
                record_end,
                index_offset,
            }
            .into());
        }
        // read rather than seek so pipes work
        self.cursor.skip(u64::from(self.header.index_length))?;

        let end = self.cursor.position();
        let padding = padding_len(end);
        if padding == 0 {
            return Ok(true);
        }
        let mut buf = [0u8; 8];
        let available = self.cursor.read_available(&mut buf[..padding])?;
        let region = &buf[..available];
        if region.first().is_some_and(|&b| b != 0) && self.magic_at(region)? {
            return Err(ReadError::ConcatenatedFilesDetected { offset: end }.into());
        }
        if padding >= 4 && region.ends_with(MAGIC) {
            return Err(ReadError::TrailingPaddingLooksLikeConcatenation {
                offset: end,
                padding,
            }
            .into());
        }
        if let Some(idx) = region.iter().position(|&b| b != 0) {
            return Err(ReadError::BadPadding {
                offset: end + idx as u64,
                region: end,
                len: padding,
            }
            .into());
        }
        if available < padding {
            log::warn!(
                "SFF file is missing {} of the {padding} null padding bytes after the index at offset {end}",
                padding - available
            );
            return Ok(false);
        }
        Ok(true)
    }

    /// Whether `head`, continued from the source if shorter than the magic,
    /// starts with the SFF magic
    fn magic_at(&mut self, head: &[u8]) -> Result<bool> {
        let mut probe = [0u8; 4];
        let mut filled = head.len().min(4);
        probe[..filled].copy_from_slice(&head[..filled]);
        if filled < 4 {
            filled += self.cursor.read_available(&mut probe[filled..])?;
        }
        Ok(filled == 4 && &probe == MAGIC)
    }
}
impl<R: Read + Seek> SffReader<R> {
    /// Restarts iteration at the first record
    pub fn rewind(&mut self) -> Result<()> {
        self.cursor.seek_to(u64::from(self.header.header_length))?;
        self.records_read = 0;
        self.finished = false;
        Ok(())
    }
}
impl<R: Read> Iterator for SffReader<R> {
    type Item = Result<SffRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record()
    }
}
impl<R: Read> FusedIterator for SffReader<R> {}
