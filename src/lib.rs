//! # sffio
//!
//! A strict reader and writer for the Standard Flowgram Format (SFF), the binary
//! container written by 454 pyrosequencing instruments.
//!
//! An SFF file holds a global header, one variable-length record per read, and
//! an optional index block that maps read names to record offsets and may embed
//! an XML run manifest. Every structure is padded to 8 bytes with null bytes.
//!
//! Decoding is strict: truncation, non-null padding, inconsistent lengths and
//! concatenated files are all reported with the offending byte offsets (see
//! [`ErrorKind`]), and records already decoded before a fault are still handed
//! to the caller.
//!
//! ## Reading
//!
//! * [`SffReader`] (or [`open`]) decodes records sequentially from any [`std::io::Read`]
//! * [`MmapReader`] maps a file for random access by read name and parallel
//!   processing over the index
//! * [`find_index`] and [`read_manifest_xml`] decode the index block of a
//!   seekable source
//!
//! ## Writing
//!
//! * [`SffWriter`] (built with [`SffWriterBuilder`]) encodes records and appends
//!   a manifest index
//! * [`write_file`] writes a whole batch after validating every record
//!
//! ## Example
//!
//! ```
//! use std::io::Cursor;
//! use sffio::{find_index, write_file, NamedRead, SffHeaderBuilder, SffReader, SffRecord};
//!
//! let header = SffHeaderBuilder::new()
//!     .flow_chars(b"TACG".repeat(2))
//!     .key_sequence(b"TCAG".to_vec())
//!     .build()
//!     .unwrap();
//! let record = SffRecord::new(
//!     "E3MFGYR02JWQ7T",
//!     vec![101, 4, 97, 2, 6, 203, 8, 3],
//!     vec![1, 2, 3, 0],
//!     b"TCAA".to_vec(),
//!     vec![38, 37, 36, 36],
//! );
//!
//! let mut sink = Cursor::new(Vec::new());
//! write_file(&mut sink, &header, &[record.clone()], true).unwrap();
//!
//! let records: Vec<SffRecord> = SffReader::new(sink.get_ref().as_slice())
//!     .unwrap()
//!     .collect::<sffio::Result<_>>()
//!     .unwrap();
//! assert_eq!(records, vec![record]);
//!
//! let index = find_index(&mut sink).unwrap();
//! let entry = index.entries().unwrap().get("E3MFGYR02JWQ7T").unwrap();
//! assert_eq!(entry.offset, 48);
//! assert_eq!(entry.coords(), Some((3946, 2103)));
//! ```

mod cursor;
pub mod error;
pub mod header;
pub mod index;
mod parallel;
pub mod reader;
pub mod record;
pub mod writer;

#[cfg(test)]
mod fixtures;

pub use cursor::{padding_len, round_up_8, ByteCursor};
pub use error::{Error, ErrorKind, IndexError, ReadError, Result, WriteError};
pub use header::{SffHeader, SffHeaderBuilder};
pub use index::{find_index, read_manifest_xml, IndexBlock, IndexEntry, ManifestIndex, ReadIndex};
pub use parallel::{ParallelProcessor, ParallelReader};
pub use reader::{open, MmapReader, SffReader};
pub use record::{NamedRead, ReadTime, SffRecord};
pub use writer::{write_file, SffWriter, SffWriterBuilder};
