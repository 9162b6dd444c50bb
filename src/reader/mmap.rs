use std::fs::File;
use std::ops::Range;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use memmap2::Mmap;

use super::SffReader;
use crate::cursor::ByteCursor;
use crate::error::{IndexError, ReadError, Result};
use crate::header::SffHeader;
use crate::index::{IndexBlock, ReadIndex};
use crate::record::SffRecord;
use crate::{ParallelProcessor, ParallelReader};

/// Number of records a thread processes between calls to
/// [`ParallelProcessor::on_batch_complete`]
pub const BATCH_SIZE: usize = 1024;

/// A memory-mapped reader for SFF files
///
/// Besides sequential iteration this reader offers random access by read name
/// through the file's index, which is decoded on first use and cached. The
/// mapping is shared through an `Arc`, so records can be decoded from many
/// threads at once (see [`ParallelReader`]).
///
/// # Examples
///
/// ```no_run
/// use sffio::{MmapReader, Result};
///
/// fn main() -> Result<()> {
///     let reader = MmapReader::new("./data/reads.sff")?;
///     println!("{} reads", reader.num_records());
///
///     if let Some(record) = reader.get("E3MFGYR02JWQ7T")? {
///         println!("{}", String::from_utf8_lossy(record.trimmed_bases()));
///     }
///     Ok(())
/// }
/// ```
pub struct MmapReader {
    /// Memory mapped file contents
    mmap: Arc<Mmap>,

    /// Header decoded at construction
    header: SffHeader,

    /// Index block, decoded on first use
    index: OnceLock<IndexBlock>,
}
impl MmapReader {
    /// Maps a file and decodes its header
    ///
    /// # Errors
    ///
    /// * `ReadError::IncompatibleFile` if the path is not a regular file
    /// * any header decoding error
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        // Verify input file is a file before attempting to map
        let file = File::open(path)?;
        if !file.metadata()?.is_file() {
            return Err(ReadError::IncompatibleFile.into());
        }

        // Safety: the file is open and won't be modified while mapped
        let mmap = unsafe { Mmap::map(&file)? };
        let header = SffHeader::from_buffer(&mmap)?;

        Ok(Self {
            mmap: Arc::new(mmap),
            header,
            index: OnceLock::new(),
        })
    }

    #[must_use]
    pub fn header(&self) -> &SffHeader {
        &self.header
    }

    /// Number of reads declared in the header
    #[must_use]
    pub fn num_records(&self) -> usize {
        self.header.number_of_reads as usize
    }

    /// Sequential reader over the mapped records
    #[must_use]
    pub fn records(&self) -> SffReader<&[u8]> {
        let start = usize::from(self.header.header_length);
        let cursor = ByteCursor::with_offset(&self.mmap[start..], start as u64);
        SffReader::from_parts(cursor, self.header.clone())
    }

    /// Mapped bytes from `offset` to the end of the file
    fn tail(&self, offset: u64, expected: usize) -> Result<&[u8]> {
        usize::try_from(offset)
            .ok()
            .and_then(|start| self.mmap.get(start..))
            .ok_or_else(|| {
                ReadError::PrematureEof {
                    offset,
                    expected,
                    available: 0,
                }
                .into()
            })
    }

    /// The index block, decoded on first call
    ///
    /// # Errors
    ///
    /// * `IndexError::NoIndexPresent` if the header declares no index
    /// * any index decoding error
    pub fn index(&self) -> Result<&IndexBlock> {
        if let Some(block) = self.index.get() {
            return Ok(block);
        }
        if !self.header.has_index() {
            return Err(IndexError::NoIndexPresent.into());
        }
        let offset = self.header.index_offset;
        let bytes = self.tail(offset, self.header.index_length as usize)?;
        let block = IndexBlock::from_cursor(&mut ByteCursor::with_offset(bytes, offset), &self.header)?;
        Ok(self.index.get_or_init(|| block))
    }

    /// The read entries of the index
    pub fn entries(&self) -> Result<&ReadIndex> {
        self.index()?.entries()
    }

    /// The XML manifest embedded in the index
    pub fn manifest_xml(&self) -> Result<&str> {
        self.index()?.manifest_xml()
    }

    /// Decodes the record starting at `offset`
    pub fn record_at(&self, offset: u64) -> Result<SffRecord> {
        let bytes = self.tail(offset, 0)?;
        SffRecord::from_cursor(&mut ByteCursor::with_offset(bytes, offset), &self.header)
    }

    /// Looks a read up by name through the index
    ///
    /// Returns `Ok(None)` if the index holds no such name.
    pub fn get(&self, name: &str) -> Result<Option<SffRecord>> {
        match self.entries()?.get(name) {
            Some(entry) => self.record_at(entry.offset).map(Some),
            None => Ok(None),
        }
    }
}

impl ParallelReader for MmapReader {
    fn process_parallel<P: ParallelProcessor + Clone + 'static>(
        self,
        processor: P,
        num_threads: usize,
    ) -> Result<()> {
        let num_records = self.entries()?.len();
        self.process_parallel_range(processor, num_threads, 0..num_records)
    }

    /// Records are ordered by their offset in the file, so `range` selects a
    /// contiguous stretch of the file regardless of the index order
    fn process_parallel_range<P: ParallelProcessor + Clone + 'static>(
        self,
        processor: P,
        num_threads: usize,
        range: Range<usize>,
    ) -> Result<()> {
        // Calculate the number of threads to use
        let num_threads = if num_threads == 0 {
            num_cpus::get()
        } else {
            num_threads.min(num_cpus::get())
        };

        let offsets = self.entries()?.offsets();
        let num_records = offsets.len();
        if range.start >= num_records || range.end > num_records || range.start >= range.end {
            return Ok(()); // Nothing to process or invalid range
        }
        let records_per_thread = (range.end - range.start).div_ceil(num_threads);
        let (range_start, range_end) = (range.start, range.end);

        let reader = Arc::new(self);
        let offsets = Arc::new(offsets);

        let mut handles = Vec::new();
        for tid in 0..num_threads {
            let mut processor = processor.clone();
            let reader = reader.clone();
            let offsets = offsets.clone();
            processor.set_tid(tid);

            let handle = std::thread::spawn(move || -> Result<()> {
                let start_idx = range_start + tid * records_per_thread;
                let end_idx = (start_idx + records_per_thread).min(range_end);
                if start_idx >= end_idx {
                    return Ok(()); // No records for this thread
                }

                for batch in offsets[start_idx..end_idx].chunks(BATCH_SIZE) {
                    for &offset in batch {
                        processor.process_record(reader.record_at(offset)?)?;
                    }
                    processor.on_batch_complete()?;
                }
                Ok(())
            });
            handles.push(handle);
        }

        for (tid, handle) in handles.into_iter().enumerate() {
            handle
                .join()
                .map_err(|_| anyhow::anyhow!("SFF worker thread {tid} panicked"))??;
        }
        Ok(())
    }
}

#[cfg(test)]
mod testing {
    use parking_lot::Mutex;

    use super::*;
    use crate::error::ErrorKind;
    use crate::fixtures;

    fn write_temp(path: &str, emit_index: bool) -> Result<()> {
        std::fs::write(path, fixtures::file(emit_index)?)?;
        Ok(())
    }

    #[derive(Clone, Default)]
    struct NameCollector {
        names: Arc<Mutex<Vec<String>>>,
        batches: Arc<Mutex<usize>>,
        tid: Option<usize>,
    }
    impl ParallelProcessor for NameCollector {
        fn process_record(&mut self, record: SffRecord) -> Result<()> {
            self.names.lock().push(record.name);
            Ok(())
        }
        fn on_batch_complete(&mut self) -> Result<()> {
            *self.batches.lock() += 1;
            Ok(())
        }
        fn set_tid(&mut self, tid: usize) {
            self.tid = Some(tid);
        }
        fn get_tid(&self) -> Option<usize> {
            self.tid
        }
    }

    #[test]
    fn test_random_access() -> Result<()> {
        let path = "test_mmap_random_access.sff";
        write_temp(path, true)?;
        let reader = MmapReader::new(path)?;
        assert_eq!(reader.num_records(), 3);
        assert_eq!(reader.manifest_xml()?, fixtures::MANIFEST_XML);

        let expected = fixtures::records();
        assert_eq!(reader.get("E3MFGYR02JHD4H")?.as_ref(), Some(&expected[2]));
        assert_eq!(reader.get("E3MFGYR02JA6IL")?.as_ref(), Some(&expected[1]));
        assert!(reader.get("missing")?.is_none());

        let records = reader.records().collect::<Result<Vec<_>>>()?;
        assert_eq!(records, expected);

        std::fs::remove_file(path)?;
        Ok(())
    }

    #[test]
    fn test_without_index() -> Result<()> {
        let path = "test_mmap_without_index.sff";
        write_temp(path, false)?;
        let reader = MmapReader::new(path)?;
        assert_eq!(reader.records().count(), 3);
        assert!(reader.get("E3MFGYR02JWQ7T").unwrap_err().is_no_index());

        let err = reader
            .process_parallel(NameCollector::default(), 2)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoIndexPresent);

        std::fs::remove_file(path)?;
        Ok(())
    }

    #[test]
    fn test_process_parallel() -> Result<()> {
        let path = "test_mmap_process_parallel.sff";
        write_temp(path, true)?;
        let collector = NameCollector::default();
        MmapReader::new(path)?.process_parallel(collector.clone(), 2)?;

        let mut names = collector.names.lock().clone();
        names.sort();
        let mut expected: Vec<String> = fixtures::records().into_iter().map(|r| r.name).collect();
        expected.sort();
        assert_eq!(names, expected);
        assert!(*collector.batches.lock() >= 1);

        std::fs::remove_file(path)?;
        Ok(())
    }

    #[test]
    fn test_process_parallel_range() -> Result<()> {
        let path = "test_mmap_process_parallel_range.sff";
        write_temp(path, true)?;
        let collector = NameCollector::default();
        MmapReader::new(path)?.process_parallel_range(collector.clone(), 1, 1..3)?;

        // file order, not index order
        assert_eq!(
            *collector.names.lock(),
            vec!["E3MFGYR02JA6IL".to_string(), "E3MFGYR02JHD4H".to_string()]
        );

        std::fs::remove_file(path)?;
        Ok(())
    }

    #[test]
    fn test_directory_is_incompatible() {
        let err = MmapReader::new("src").err().unwrap();
        assert!(matches!(
            err.kind(),
            ErrorKind::IncompatibleFile | ErrorKind::Io
        ));
    }
}
