use std::collections::HashMap;
use std::io::{Read, Write};

use crate::cursor::ByteCursor;
use crate::error::{IndexError, ReadError, Result};
use crate::record::NamedRead;

/// Terminates every index entry; never a valid base-255 digit
pub const ENTRY_TERMINATOR: u8 = 0xFF;

/// Largest record offset an index entry can express (`255^4 - 1`)
pub const MAX_INDEX_OFFSET: u64 = 255 * 255 * 255 * 255 - 1;

/// Bytes following the name in every entry: null, four offset digits, terminator
const ENTRY_SUFFIX: usize = 6;

/// Encodes an offset as four base-255 digits, most significant first
#[must_use]
pub fn encode_offset(offset: u64) -> Option<[u8; 4]> {
    if offset > MAX_INDEX_OFFSET {
        return None;
    }
    Some([
        (offset / (255 * 255 * 255)) as u8,
        (offset / (255 * 255) % 255) as u8,
        (offset / 255 % 255) as u8,
        (offset % 255) as u8,
    ])
}

#[must_use]
pub fn decode_offset(digits: [u8; 4]) -> u64 {
    digits
        .iter()
        .fold(0, |offset, &digit| offset * 255 + u64::from(digit))
}

/// Location of a single read in the file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexEntry {
    /// Read name
    pub name: String,

    /// Absolute offset of the read's record
    pub offset: u64,
}
impl IndexEntry {
    pub fn new(name: impl Into<String>, offset: u64) -> Self {
        Self {
            name: name.into(),
            offset,
        }
    }

    /// Number of bytes the entry occupies in the entry table
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        self.name.len() + ENTRY_SUFFIX
    }

    /// Decodes one entry by scanning for its terminator
    ///
    /// # Errors
    ///
    /// * `IndexError::MissingNullTerminator` if the byte before the offset digits is
    ///   not null
    /// * `ReadError::PrematureEof` if the source ends before the terminator
    pub fn from_cursor<R: Read>(cursor: &mut ByteCursor<R>) -> Result<Self> {
        let start = cursor.position();
        let mut data = cursor.read_vec(ENTRY_SUFFIX)?;
        loop {
            let byte = cursor.read_u8()?;
            data.push(byte);
            if byte == ENTRY_TERMINATOR {
                break;
            }
        }
        let name_end = data.len() - ENTRY_SUFFIX;
        if data[name_end] != 0 {
            return Err(IndexError::MissingNullTerminator {
                offset: start + name_end as u64,
            }
            .into());
        }
        let mut digits = [0u8; 4];
        digits.copy_from_slice(&data[name_end + 1..data.len() - 1]);
        data.truncate(name_end);
        let name = String::from_utf8(data).map_err(|e| ReadError::InvalidReadName {
            offset: start,
            valid_up_to: e.utf8_error().valid_up_to(),
        })?;
        Ok(Self {
            name,
            offset: decode_offset(digits),
        })
    }

    /// Encodes the entry
    ///
    /// Offsets beyond [`MAX_INDEX_OFFSET`] are rejected before an index is built,
    /// so they are saturated here.
    pub fn write_bytes<W: Write>(&self, writer: &mut W) -> Result<()> {
        let digits = encode_offset(self.offset).unwrap_or([254; 4]);
        writer.write_all(self.name.as_bytes())?;
        writer.write_all(&[0])?;
        writer.write_all(&digits)?;
        writer.write_all(&[ENTRY_TERMINATOR])?;
        Ok(())
    }
}
impl NamedRead for IndexEntry {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Decoded entry table, keyed by read name
#[derive(Debug, Clone, Default)]
pub struct ReadIndex {
    entries: Vec<IndexEntry>,
    lookup: HashMap<String, usize>,
}
impl ReadIndex {
    /// Builds a lookup over entries kept in their stored order
    ///
    /// When a name occurs more than once the first entry wins.
    #[must_use]
    pub fn new(entries: Vec<IndexEntry>) -> Self {
        let mut lookup = HashMap::with_capacity(entries.len());
        for (idx, entry) in entries.iter().enumerate() {
            lookup.entry(entry.name.clone()).or_insert(idx);
        }
        Self { entries, lookup }
    }

    /// Decodes `number_of_reads` entries from a table of `declared` bytes
    ///
    /// # Errors
    ///
    /// * `IndexError::MissingNullTerminator` / `ReadError::PrematureEof` from a
    ///   single entry
    /// * `IndexError::IndexLengthMismatch` if the entries do not exactly fill the
    ///   declared table
    pub fn from_cursor<R: Read>(
        cursor: &mut ByteCursor<R>,
        number_of_reads: u32,
        declared: u64,
    ) -> Result<Self> {
        let start = cursor.position();
        let mut entries = Vec::with_capacity((number_of_reads as usize).min(1 << 20));
        for _ in 0..number_of_reads {
            entries.push(IndexEntry::from_cursor(cursor)?);
        }
        let observed_end = cursor.position();
        let consumed = observed_end - start;
        if consumed != declared {
            return Err(IndexError::IndexLengthMismatch {
                declared,
                consumed,
                expected_end: start + declared,
                observed_end,
            }
            .into());
        }
        log::debug!("Decoded {} index entries from {declared} bytes", entries.len());
        Ok(Self::new(entries))
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&IndexEntry> {
        self.lookup.get(name).map(|&idx| &self.entries[idx])
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.lookup.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in stored order
    #[must_use]
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, IndexEntry> {
        self.entries.iter()
    }

    /// Record offsets in file order
    #[must_use]
    pub fn offsets(&self) -> Vec<u64> {
        let mut offsets: Vec<u64> = self.entries.iter().map(|entry| entry.offset).collect();
        offsets.sort_unstable();
        offsets
    }

    /// Total size of the encoded entry table
    #[must_use]
    pub fn encoded_len(&self) -> u64 {
        self.entries
            .iter()
            .map(|entry| entry.encoded_len() as u64)
            .sum()
    }

    pub fn write_bytes<W: Write>(&self, writer: &mut W) -> Result<()> {
        for entry in &self.entries {
            entry.write_bytes(writer)?;
        }
        Ok(())
    }
}
impl<'a> IntoIterator for &'a ReadIndex {
    type Item = &'a IndexEntry;
    type IntoIter = std::slice::Iter<'a, IndexEntry>;
    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
