//! Offset-tracking byte cursor
//!
//! Every structure in an SFF file is located by absolute byte offset, and every
//! error reports one. [`ByteCursor`] wraps any [`Read`] source, counts the bytes
//! it hands out, and turns short reads into [`ReadError::PrematureEof`] carrying
//! the offset where the truncated read began.
//!
//! The same decode logic runs over purely sequential sources (pipes, network
//! streams, decompressors) and seekable ones; seeking is only available when the
//! wrapped source implements [`Seek`].

use std::io::{self, Read, Seek, SeekFrom};

use byteorder::{BigEndian, ByteOrder};

use crate::error::{ReadError, Result};

/// Number of bytes needed to pad `len` up to the next multiple of 8
#[must_use]
pub fn padding_len(len: u64) -> usize {
    ((8 - len % 8) % 8) as usize
}

/// Rounds `len` up to the next multiple of 8
#[must_use]
pub fn round_up_8(len: u64) -> u64 {
    len + padding_len(len) as u64
}

/// A sequential reader over a byte source that tracks its absolute position
#[derive(Debug)]
pub struct ByteCursor<R> {
    inner: R,
    pos: u64,
}
impl<R: Read> ByteCursor<R> {
    /// Wraps a source positioned at offset 0
    pub fn new(inner: R) -> Self {
        Self::with_offset(inner, 0)
    }

    /// Wraps a source whose first byte sits at absolute offset `pos`
    pub fn with_offset(inner: R, pos: u64) -> Self {
        Self { inner, pos }
    }

    /// Current absolute offset
    #[must_use]
    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Reads as many bytes as are available up to `buf.len()`
    ///
    /// Unlike [`ByteCursor::read_exact_bytes`], hitting the end of the source is not
    /// an error here; the number of bytes actually read is returned.
    pub fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        self.pos += filled as u64;
        Ok(filled)
    }

    /// Fills `buf` completely or fails with [`ReadError::PrematureEof`]
    pub fn read_exact_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        let start = self.pos;
        let available = self.read_available(buf)?;
        if available < buf.len() {
            return Err(ReadError::PrematureEof {
                offset: start,
                expected: buf.len(),
                available,
            }
            .into());
        }
        Ok(())
    }

    /// Reads exactly `len` bytes into a new buffer
    ///
    /// The buffer grows with the data actually read, so a corrupted length field
    /// fails with [`ReadError::PrematureEof`] instead of a huge allocation.
    pub fn read_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        let start = self.pos;
        let mut buf = Vec::with_capacity(len.min(1 << 16));
        let available = (&mut self.inner).take(len as u64).read_to_end(&mut buf)?;
        self.pos += available as u64;
        if available < len {
            return Err(ReadError::PrematureEof {
                offset: start,
                expected: len,
                available,
            }
            .into());
        }
        Ok(buf)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0; N];
        self.read_exact_bytes(&mut buf)?;
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(BigEndian::read_u16(&self.read_array::<2>()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(BigEndian::read_u32(&self.read_array::<4>()?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(BigEndian::read_u64(&self.read_array::<8>()?))
    }

    /// Reads `n` big-endian u16 values
    pub fn read_u16_vec(&mut self, n: usize) -> Result<Vec<u16>> {
        let bytes = self.read_vec(n * 2)?;
        let mut values = vec![0; n];
        BigEndian::read_u16_into(&bytes, &mut values);
        Ok(values)
    }

    /// Consumes a padding region of `len` bytes that must be entirely null
    pub fn expect_padding(&mut self, len: usize) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        let region = self.pos;
        let mut buf = [0u8; 8];
        let mut remaining = len;
        while remaining > 0 {
            let chunk = remaining.min(buf.len());
            let chunk_start = self.pos;
            self.read_exact_bytes(&mut buf[..chunk])?;
            if let Some(idx) = buf[..chunk].iter().position(|&b| b != 0) {
                return Err(ReadError::BadPadding {
                    offset: chunk_start + idx as u64,
                    region,
                    len,
                }
                .into());
            }
            remaining -= chunk;
        }
        Ok(())
    }

    /// Discards exactly `len` bytes by reading them
    ///
    /// Reading rather than seeking keeps this usable on network handles and
    /// decompressors.
    pub fn skip(&mut self, len: u64) -> Result<()> {
        let start = self.pos;
        let copied = io::copy(&mut (&mut self.inner).take(len), &mut io::sink())?;
        self.pos += copied;
        if copied < len {
            return Err(ReadError::PrematureEof {
                offset: start,
                expected: len as usize,
                available: copied as usize,
            }
            .into());
        }
        Ok(())
    }
}
impl<R: Read + Seek> ByteCursor<R> {
    /// Moves the cursor to an absolute offset
    pub fn seek_to(&mut self, offset: u64) -> Result<()> {
        self.pos = self.inner.seek(SeekFrom::Start(offset))?;
        Ok(())
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::error::{Error, ErrorKind};

    #[test]
    fn test_padding_arithmetic() {
        assert_eq!(padding_len(0), 0);
        assert_eq!(padding_len(30), 2);
        assert_eq!(padding_len(43), 5);
        assert_eq!(round_up_8(43), 48);
        assert_eq!(round_up_8(48), 48);
    }

    #[test]
    fn test_big_endian_fields() -> Result<()> {
        let bytes = [0x00, 0x01, 0x00, 0x00, 0x00, 0x02, 0xAB];
        let mut cursor = ByteCursor::new(&bytes[..]);
        assert_eq!(cursor.read_u16()?, 1);
        assert_eq!(cursor.read_u32()?, 2);
        assert_eq!(cursor.read_u8()?, 0xAB);
        assert_eq!(cursor.position(), 7);
        Ok(())
    }

    #[test]
    fn test_premature_eof_reports_offset() {
        let bytes = [0u8; 5];
        let mut cursor = ByteCursor::with_offset(&bytes[..], 100);
        let err = cursor.read_u64().unwrap_err();
        match err {
            Error::ReadError(ReadError::PrematureEof {
                offset,
                expected,
                available,
            }) => {
                assert_eq!(offset, 100);
                assert_eq!(expected, 8);
                assert_eq!(available, 5);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_padding_must_be_null() {
        let bytes = [0, 0, 0, 0, 0, 0, 0, 0, 0, 7];
        let mut cursor = ByteCursor::new(&bytes[..]);
        let err = cursor.expect_padding(10).unwrap_err();
        match err {
            Error::ReadError(ReadError::BadPadding {
                offset,
                region,
                len,
            }) => {
                assert_eq!(offset, 9);
                assert_eq!(region, 0);
                assert_eq!(len, 10);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_skip_past_end() {
        let bytes = [1u8; 4];
        let mut cursor = ByteCursor::new(&bytes[..]);
        let err = cursor.skip(6).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PrematureEof);
        assert_eq!(cursor.position(), 4);
    }

    #[test]
    fn test_seek_updates_position() -> Result<()> {
        let mut cursor = ByteCursor::new(std::io::Cursor::new(vec![0u8, 1, 2, 3, 4, 5]));
        cursor.seek_to(4)?;
        assert_eq!(cursor.position(), 4);
        assert_eq!(cursor.read_u8()?, 4);
        Ok(())
    }
}
