// SPDX-License-Identifier: MIT OR Apache-2.0

use std::io::{ Read, Seek, SeekFrom };
use byteorder::{ ReadBytesExt, LittleEndian };
use memchr::memmem;

use crate::error::{ Error, Result };

// Bytes read per window while scanning for a literal
const SCAN_WINDOW: usize = 64 * 1024;

/// Seekable, read-only byte source addressed by absolute offsets.
///
/// Every read seeks first, so no operation depends on where a previous one left the cursor.
/// The cursor itself is still a single mutable resource: a `ByteSource` must not be shared
/// between threads without serialising each seek+read pair. Open one source per reader instead.
pub struct ByteSource<R> {
    inner: R,
    len: u64,
}

fn map_read_error(e: std::io::Error, len: u64, offset: u64, expected: u64) -> Error {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::ShortRead { offset, expected, available: len.saturating_sub(offset) }
    } else {
        Error::Io(e)
    }
}

/// `base + delta` for offsets read from the file, which may point anywhere.
pub fn relative_offset(base: u64, delta: i64) -> Result<u64> {
    base.checked_add_signed(delta).ok_or(Error::OffsetOutOfRange { base, delta })
}

macro_rules! read_at {
    ($($name:ident => $ty:ty, $read:ident, $size:expr;)*) => {
        $(
            pub fn $name(&mut self, offset: u64) -> Result<$ty> {
                self.seek_checked(offset, $size)?;
                let len = self.len;
                self.inner.$read::<LittleEndian>().map_err(|e| map_read_error(e, len, offset, $size))
            }
        )*
    };
}

impl<R: Read + Seek> ByteSource<R> {
    pub fn new(inner: R, len: u64) -> Self {
        Self { inner, len }
    }

    /// Wraps `inner`, taking the total length from the end of the stream.
    pub fn from_stream(mut inner: R) -> Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        Ok(Self { inner, len })
    }

    pub fn len(&self) -> u64 { self.len }
    pub fn is_empty(&self) -> bool { self.len == 0 }

    pub fn into_inner(self) -> R { self.inner }

    fn seek_checked(&mut self, offset: u64, size: u64) -> Result<()> {
        let available = self.len.saturating_sub(offset);
        if size > available {
            return Err(Error::ShortRead { offset, expected: size, available });
        }
        self.inner.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    pub fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let size = buf.len() as u64;
        self.seek_checked(offset, size)?;
        let len = self.len;
        self.inner.read_exact(buf).map_err(|e| map_read_error(e, len, offset, size))
    }

    pub fn read_bytes_at(&mut self, offset: u64, size: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; size];
        self.read_exact_at(offset, &mut buf)?;
        Ok(buf)
    }

    read_at! {
        read_i32_at => i32, read_i32, 4;
        read_u32_at => u32, read_u32, 4;
        read_f32_at => f32, read_f32, 4;
        read_u64_at => u64, read_u64, 8;
    }

    /// Reads exactly `count` little-endian u16 samples starting at `offset`.
    pub fn read_u16s_at(&mut self, offset: u64, count: u64) -> Result<Vec<u16>> {
        let size = count.checked_mul(2).ok_or(Error::ShortRead { offset, expected: u64::MAX, available: self.len.saturating_sub(offset) })?;
        self.seek_checked(offset, size)?;
        let mut out = vec![0u16; count as usize];
        let len = self.len;
        self.inner.read_u16_into::<LittleEndian>(&mut out).map_err(|e| map_read_error(e, len, offset, size))?;
        Ok(out)
    }

    /// Absolute offset of the first occurrence of `pattern` fully contained in `[start, end)`.
    ///
    /// Every offset in the region is a candidate, the same result a byte-by-byte comparison
    /// gives. Repeated searches over one region should share a [`PatternScanner`] instead.
    pub fn find_pattern(&mut self, pattern: &[u8], start: u64, end: u64) -> Result<Option<u64>> {
        PatternScanner::new(pattern, end).find_from(self, start)
    }
}

/// Forward searches for one literal inside a region, keeping the last window read.
///
/// Windows overlap by `pattern.len() - 1` bytes so matches across a window edge are not lost.
/// A search starting inside the buffered window is answered from memory, so scanning a region
/// match after match reads each byte about once.
pub struct PatternScanner<'p> {
    finder: memmem::Finder<'p>,
    end: u64,
    window: Vec<u8>,
    window_start: u64,
}

impl<'p> PatternScanner<'p> {
    /// Scanner for `pattern` in regions ending at `end` (exclusive).
    pub fn new(pattern: &'p [u8], end: u64) -> Self {
        Self { finder: memmem::Finder::new(pattern), end, window: Vec::new(), window_start: 0 }
    }

    fn window_end(&self) -> u64 {
        self.window_start + self.window.len() as u64
    }

    /// Absolute offset of the first match at or after `from`.
    pub fn find_from<R: Read + Seek>(&mut self, source: &mut ByteSource<R>, from: u64) -> Result<Option<u64>> {
        let pattern_len = self.finder.needle().len();
        if pattern_len == 0 {
            return Ok(None);
        }
        let end = self.end.min(source.len());

        let mut pos = from;
        while pos.checked_add(pattern_len as u64).is_some_and(|x| x <= end) {
            if pos < self.window_start || pos + pattern_len as u64 > self.window_end() {
                let size = ((end - pos) as usize).min(SCAN_WINDOW.max(pattern_len * 2));
                self.window.resize(size, 0);
                source.read_exact_at(pos, &mut self.window)?;
                self.window_start = pos;
            }
            let rel = (pos - self.window_start) as usize;
            if let Some(i) = self.finder.find(&self.window[rel..]) {
                return Ok(Some(pos + i as u64));
            }
            if self.window_end() >= end {
                break;
            }
            pos = self.window_end() - (pattern_len as u64 - 1);
        }
        Ok(None)
    }
}
