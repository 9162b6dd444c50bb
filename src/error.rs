/// Custom Result type for sffio operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the sffio library, encompassing all possible error cases
/// that can occur while decoding or encoding SFF files.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub enum Error {
    /// Errors related to the global SFF header
    HeaderError(#[from] HeaderError),
    /// Errors that occur while reading records or walking the file layout
    ReadError(#[from] ReadError),
    /// Errors related to the trailing index block
    IndexError(#[from] IndexError),
    /// Errors that occur during write operations
    WriteError(#[from] WriteError),
    /// Errors that occur while building headers or writers
    BuilderError(#[from] BuilderError),
    /// Standard I/O errors from the Rust standard library
    IoError(#[from] std::io::Error),
    /// UTF-8 decoding errors (read names, manifest XML)
    Utf8Error(#[from] std::str::Utf8Error),
    /// Generic errors, typically raised by user supplied processors
    AnyhowError(#[from] anyhow::Error),
}
impl Error {
    /// Returns the flat kind of this error
    ///
    /// This is useful for callers that want to branch on the structural problem
    /// without matching on the nested error enums.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::HeaderError(err) => err.kind(),
            Self::ReadError(err) => err.kind(),
            Self::IndexError(err) => err.kind(),
            Self::WriteError(_) | Self::BuilderError(_) => ErrorKind::InvalidRecord,
            Self::IoError(_) => ErrorKind::Io,
            Self::Utf8Error(_) => ErrorKind::Utf8,
            Self::AnyhowError(_) => ErrorKind::Other,
        }
    }

    /// Checks if the error reports a file without an index block
    #[must_use]
    pub fn is_no_index(&self) -> bool {
        self.kind() == ErrorKind::NoIndexPresent
    }
}

/// Flat classification of every error the codec can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    EmptyFile,
    TooSmall,
    BadMagic,
    AtIndexBlock,
    UnsupportedVersion,
    UnsupportedFlowgramFormat,
    InconsistentIndex,
    MalformedHeader,
    MalformedRecordHeader,
    BadPadding,
    PrematureEof,
    UnknownIndexFormat,
    UnsupportedIndexVersion,
    SortedIndexMissingNulls,
    ManifestHeaderSizeMismatch,
    MissingNullTerminator,
    IndexLengthMismatch,
    NoIndexPresent,
    NoXmlManifest,
    IndexBeforeRecordsExhausted,
    UnexpectedGapBeforeIndex,
    CorruptIndexPointer,
    ConcatenatedFilesDetected,
    TrailingPaddingLooksLikeConcatenation,
    TrailingGarbage,
    InvalidReadName,
    IncompatibleFile,
    InvalidRecord,
    Io,
    Utf8,
    Other,
}

/// Errors specific to processing and validating the global SFF header
#[derive(thiserror::Error, Debug)]
pub enum HeaderError {
    /// Fewer bytes than the fixed header part were available
    #[error("File too small to hold a valid SFF header ({available} of 31 bytes)")]
    TooSmall { available: usize },

    /// The first four bytes are not the SFF magic
    #[error("SFF file did not start '.sff', but {:?}", String::from_utf8_lossy(.0))]
    BadMagic([u8; 4]),

    /// The first four bytes are an index block magic
    #[error("Handle seems to be at SFF index block ({:?}), not start", String::from_utf8_lossy(.0))]
    AtIndexBlock([u8; 4]),

    /// The version field is not `0.0.0.1`
    #[error("Unsupported SFF version in header, {}.{}.{}.{}", .0[0], .0[1], .0[2], .0[3])]
    UnsupportedVersion([u8; 4]),

    /// Only flowgram format code 1 is defined
    #[error("Flowgram format code {0} not supported")]
    UnsupportedFlowgramFormat(u8),

    /// Exactly one of index offset and index length is zero
    #[error("Index offset {offset} but index length {length}")]
    InconsistentIndex { offset: u64, length: u32 },

    /// The declared header length disagrees with the flow and key lengths
    #[error("Header length {header_length} is invalid, expected {expected} for {flows} flows and a {key} byte key")]
    MalformedHeader {
        header_length: u16,
        expected: u64,
        flows: u16,
        key: u16,
    },
}
impl HeaderError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TooSmall { .. } => ErrorKind::TooSmall,
            Self::BadMagic(_) => ErrorKind::BadMagic,
            Self::AtIndexBlock(_) => ErrorKind::AtIndexBlock,
            Self::UnsupportedVersion(_) => ErrorKind::UnsupportedVersion,
            Self::UnsupportedFlowgramFormat(_) => ErrorKind::UnsupportedFlowgramFormat,
            Self::InconsistentIndex { .. } => ErrorKind::InconsistentIndex,
            Self::MalformedHeader { .. } => ErrorKind::MalformedHeader,
        }
    }
}

/// Errors that can occur while reading records and walking the file layout
#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    /// The byte source contains no bytes at all
    #[error("Empty file.")]
    EmptyFile,

    /// The path given to a memory-mapped reader is not a regular file
    #[error("File is not regular")]
    IncompatibleFile,

    /// The read header length disagrees with the name length
    ///
    /// # Fields
    /// * `offset` - Byte position where the record starts
    /// * `read_header_length` - The declared read header length
    /// * `expected` - The length implied by the name length
    #[error("Malformed read header at offset {offset}, says length is {read_header_length} but expected {expected}")]
    MalformedRecordHeader {
        offset: u64,
        read_header_length: u16,
        expected: u64,
    },

    /// A padding region contained a non-null byte
    ///
    /// # Fields
    /// * `offset` - Byte position of the first offending byte
    /// * `region` - Byte position where the padding region starts
    /// * `len` - Size of the padding region
    #[error("{len} byte padding region at offset {region} contained data (first non-null byte at offset {offset})")]
    BadPadding { offset: u64, region: u64, len: usize },

    /// The byte source ended in the middle of a structure
    ///
    /// # Fields
    /// * `offset` - Byte position where the truncated read started
    /// * `expected` - Number of bytes that were required
    /// * `available` - Number of bytes actually available
    #[error("Premature end of file at offset {offset}: needed {expected} bytes, found {available}")]
    PrematureEof {
        offset: u64,
        expected: usize,
        available: usize,
    },

    /// The index block was reached while records were still expected
    #[error("Reached index block at offset {index_offset} after {records_read} of {declared} records")]
    IndexBeforeRecordsExhausted {
        index_offset: u64,
        records_read: u32,
        declared: u32,
    },

    /// Unexplained bytes between the final record and the index block
    #[error("Gap of {gap} bytes after final record end {record_end}, before {index_offset} where index starts?")]
    UnexpectedGapBeforeIndex {
        gap: u64,
        record_end: u64,
        index_offset: u64,
    },

    /// The final record ended beyond the declared index start
    #[error("Final record ends at {record_end}, beyond the declared index offset {index_offset}")]
    CorruptIndexPointer { record_end: u64, index_offset: u64 },

    /// A stored read name is not valid UTF-8
    ///
    /// # Fields
    /// * `offset` - Byte position where the name starts
    /// * `valid_up_to` - Length of the valid UTF-8 prefix
    #[error("Read name at offset {offset} is not valid UTF-8 (invalid byte at offset {})", .offset + *.valid_up_to as u64)]
    InvalidReadName { offset: u64, valid_up_to: usize },

    /// A second SFF file starts after the end of the first
    #[error("Additional data at end of SFF file, perhaps multiple SFF files concatenated? See offset {offset}")]
    ConcatenatedFilesDetected { offset: u64 },

    /// The padding after the index ended in the SFF magic
    #[error("Your SFF file is invalid, post index {padding} byte null padding region ended '.sff' which could be the start of a concatenated SFF file? See offset {offset}")]
    TrailingPaddingLooksLikeConcatenation { offset: u64, padding: usize },

    /// Unrecognised bytes after the end of the file layout
    #[error("Additional data at end of SFF file, see offset {offset}")]
    TrailingGarbage { offset: u64 },
}
impl ReadError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyFile => ErrorKind::EmptyFile,
            Self::IncompatibleFile => ErrorKind::IncompatibleFile,
            Self::MalformedRecordHeader { .. } => ErrorKind::MalformedRecordHeader,
            Self::BadPadding { .. } => ErrorKind::BadPadding,
            Self::PrematureEof { .. } => ErrorKind::PrematureEof,
            Self::IndexBeforeRecordsExhausted { .. } => ErrorKind::IndexBeforeRecordsExhausted,
            Self::UnexpectedGapBeforeIndex { .. } => ErrorKind::UnexpectedGapBeforeIndex,
            Self::CorruptIndexPointer { .. } => ErrorKind::CorruptIndexPointer,
            Self::ConcatenatedFilesDetected { .. } => ErrorKind::ConcatenatedFilesDetected,
            Self::TrailingPaddingLooksLikeConcatenation { .. } => {
                ErrorKind::TrailingPaddingLooksLikeConcatenation
            }
            Self::TrailingGarbage { .. } => ErrorKind::TrailingGarbage,
            Self::InvalidReadName { .. } => ErrorKind::InvalidReadName,
        }
    }
}

/// Errors related to the index block at the end of an SFF file
#[derive(thiserror::Error, Debug)]
pub enum IndexError {
    /// The header declares no index block
    #[error("No index present in this SFF file")]
    NoIndexPresent,

    /// The index block magic is not one this library can interpret
    #[error("Unknown magic number {:?} in SFF index header (version bytes {:?})", String::from_utf8_lossy(.magic), .version)]
    UnknownIndexFormat { magic: [u8; 4], version: [u8; 4] },

    /// The index block magic is known but the version is not `1.00`
    #[error("Unsupported version in {} index header, {}.{}.{}.{}", String::from_utf8_lossy(.magic), .version[0], .version[1], .version[2], .version[3])]
    UnsupportedIndexVersion { magic: [u8; 4], version: [u8; 4] },

    /// A sorted index did not carry its four null bytes
    #[error("Did not find expected null four bytes in .srt index at offset {offset}")]
    SortedIndexMissingNulls { offset: u64 },

    /// The manifest header sizes do not add up to the declared index length
    #[error("Problem understanding .mft index header, {declared} != 8 + 8 + {xml_length} + {entries_length}")]
    ManifestHeaderSizeMismatch {
        declared: u32,
        xml_length: u32,
        entries_length: u32,
    },

    /// A read name in the index was not followed by a null byte
    #[error("Expected a null terminator to the read name at offset {offset}")]
    MissingNullTerminator { offset: u64 },

    /// The entry table length disagrees with the bytes consumed reading it
    #[error("Problem with index length? consumed {consumed} bytes but {declared} were declared (ended at {observed_end} vs {expected_end})")]
    IndexLengthMismatch {
        declared: u64,
        consumed: u64,
        expected_end: u64,
        observed_end: u64,
    },

    /// The index block carries no XML manifest
    #[error("No XML manifest found")]
    NoXmlManifest,
}
impl IndexError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoIndexPresent => ErrorKind::NoIndexPresent,
            Self::UnknownIndexFormat { .. } => ErrorKind::UnknownIndexFormat,
            Self::UnsupportedIndexVersion { .. } => ErrorKind::UnsupportedIndexVersion,
            Self::SortedIndexMissingNulls { .. } => ErrorKind::SortedIndexMissingNulls,
            Self::ManifestHeaderSizeMismatch { .. } => ErrorKind::ManifestHeaderSizeMismatch,
            Self::MissingNullTerminator { .. } => ErrorKind::MissingNullTerminator,
            Self::IndexLengthMismatch { .. } => ErrorKind::IndexLengthMismatch,
            Self::NoXmlManifest => ErrorKind::NoXmlManifest,
        }
    }
}

/// Errors that can occur while writing SFF data
#[derive(thiserror::Error, Debug)]
pub enum WriteError {
    /// The number of flowgram values does not match the header
    #[error("Record {name} has {got} flowgram values, but the header declares {expected} flows")]
    FlowCountMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    /// A per-base field does not match the number of bases
    #[error("Record {name} has {bases} bases but {got} {field} values")]
    BaseCountMismatch {
        name: String,
        field: &'static str,
        bases: usize,
        got: usize,
    },

    /// The read name cannot be stored
    #[error("Invalid read name {0:?}: must be non-empty ASCII without null or 0xFF bytes")]
    InvalidName(String),

    /// A field is longer than its length prefix can express
    #[error("Record {name}: {field} length {len} exceeds the format limit")]
    FieldTooLong {
        name: String,
        field: &'static str,
        len: usize,
    },

    /// Attempted to write data without first setting up the header
    #[error("Missing header in writer builder")]
    MissingHeader,
}

/// Errors that can occur while building headers
#[derive(thiserror::Error, Debug)]
pub enum BuilderError {
    /// No flow characters were supplied
    #[error("Missing flow characters")]
    MissingFlowChars,

    /// A header field is longer than a u16 length prefix
    #[error("Header {field} length {len} exceeds 65535")]
    FieldTooLong { field: &'static str, len: usize },
}
