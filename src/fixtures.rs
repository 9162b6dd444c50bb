//! In-memory SFF files shared by the unit tests
//!
//! Eight flows and a four byte key give a 48 byte header. Every read has a
//! 14 character name and four bases, so each record occupies 64 bytes and the
//! records start at 48, 112 and 176. The manifest index follows at 240 and is
//! 83 bytes long, which leaves five bytes of trailing padding.

use std::io::Cursor;

use crate::error::Result;
use crate::header::{SffHeader, SffHeaderBuilder};
use crate::record::SffRecord;
use crate::writer::SffWriterBuilder;

pub const MANIFEST_XML: &str = "<run/>\n";

pub const INDEX_OFFSET: u64 = 240;

pub const INDEX_LENGTH: u32 = 83;

pub const FILE_LENGTH: usize = 328;

pub fn header() -> SffHeader {
    SffHeaderBuilder::new()
        .flow_chars(b"TACGTACG".to_vec())
        .key_sequence(b"TCAG".to_vec())
        .build()
        .unwrap()
}

pub fn records() -> Vec<SffRecord> {
    vec![
        SffRecord::new(
            "E3MFGYR02JWQ7T",
            vec![101, 4, 97, 2, 6, 203, 8, 3],
            vec![1, 2, 3, 0],
            b"TCAA".to_vec(),
            vec![38, 37, 36, 36],
        ),
        SffRecord::new(
            "E3MFGYR02JA6IL",
            vec![99, 102, 5, 196, 2, 7, 1, 0],
            vec![1, 1, 2, 0],
            b"TAGG".to_vec(),
            vec![40, 40, 33, 33],
        )
        .with_clips((2, 4), (0, 0)),
        SffRecord::new(
            "E3MFGYR02JHD4H",
            vec![3, 100, 98, 101, 97, 4, 2, 6],
            vec![2, 1, 1, 1],
            b"ACGT".to_vec(),
            vec![30, 31, 32, 33],
        )
        .with_clips((0, 0), (0, 3)),
    ]
}

/// Encodes the fixture records, with or without a manifest index
pub fn file(emit_index: bool) -> Result<Vec<u8>> {
    let mut writer = SffWriterBuilder::default()
        .header(header())
        .index(emit_index)
        .manifest_xml(MANIFEST_XML)
        .build(Cursor::new(Vec::new()))?;
    for record in &records() {
        writer.write_record(record)?;
    }
    Ok(writer.finish()?.into_inner())
}
