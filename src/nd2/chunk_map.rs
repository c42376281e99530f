// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeMap;
use std::io::{ Read, Seek };
use std::ops::Range;

use crate::error::{ Error, ErrorKind, Result };
use crate::source::{ ByteSource, PatternScanner };

pub const FRAME_RECORD_TAG: &[u8] = b"ImageDataSeq|";
// Frame number digits and the '!' terminator must fit in this many bytes
pub const INDEX_LOOKAHEAD: u64 = 10;
const INDEX_TERMINATOR: u8 = b'!';
// start coordinate (u64) + record length (u64)
const RECORD_FIELDS_SIZE: u64 = 16;

/// Where the next header search starts after a record was parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum ScanResume {
    /// One byte past the start of the match. Tolerates records overlapping inside
    /// already consumed bytes.
    #[default]
    NextByte,
    /// Past the consumed record. Malformed records still resume at the next byte.
    PastRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRecord {
    pub frame_index: usize,
    /// Offset of the `ImageDataSeq|` literal
    pub header_offset: u64,
    pub start_coordinate: u64,
    pub record_length: u64,
    /// First byte after the record
    pub end: u64,
}

/// Frame number → absolute start coordinate of the frame chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct FrameIndexTable {
    capacity: Option<usize>,
    frames: BTreeMap<usize, u64>,
}

impl FrameIndexTable {
    /// `capacity` of `None` accepts any frame index.
    pub fn new(capacity: Option<usize>) -> Self {
        Self { capacity, frames: BTreeMap::new() }
    }

    pub fn capacity(&self) -> Option<usize> { self.capacity }
    pub fn len(&self) -> usize { self.frames.len() }
    pub fn is_empty(&self) -> bool { self.frames.is_empty() }

    pub fn get(&self, index: usize) -> Option<u64> {
        self.frames.get(&index).copied()
    }

    /// Inserts a frame, returning the coordinate it replaced.
    pub fn insert(&mut self, index: usize, coordinate: u64) -> Result<Option<u64>> {
        match self.capacity {
            Some(capacity) if index >= capacity => Err(Error::CapacityExceeded { index, capacity }),
            _ => Ok(self.frames.insert(index, coordinate)),
        }
    }

    /// Entries in ascending frame order
    pub fn iter(&self) -> impl Iterator<Item = (usize, u64)> + '_ {
        self.frames.iter().map(|(i, c)| (*i, *c))
    }
}

#[derive(Debug, Default)]
pub struct ChunkMapScan {
    pub table: FrameIndexTable,
    /// Records that parsed successfully, including those dropped for capacity
    pub matches: usize,
    /// Isolated per-record failures, either format or capacity errors
    pub rejected: Vec<Error>,
}

/// Parses the frame record whose `ImageDataSeq|` literal starts at `header_offset`.
pub fn parse_frame_record<R: Read + Seek>(source: &mut ByteSource<R>, header_offset: u64, region_end: u64) -> Result<FrameRecord> {
    let digits_start = header_offset + FRAME_RECORD_TAG.len() as u64;
    if digits_start >= region_end {
        return Err(Error::TruncatedRecord { offset: header_offset, region_end });
    }
    let lookahead = INDEX_LOOKAHEAD.min(region_end - digits_start);
    let buf = source.read_bytes_at(digits_start, lookahead as usize)?;

    let term = memchr::memchr(INDEX_TERMINATOR, &buf).ok_or(Error::MissingTerminator(digits_start))?;
    let digits = &buf[..term];
    let invalid = || Error::InvalidFrameIndex { offset: digits_start, text: String::from_utf8_lossy(digits).into() };
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return Err(invalid());
    }
    let frame_index = std::str::from_utf8(digits).ok().and_then(|x| x.parse::<usize>().ok()).ok_or_else(invalid)?;

    let fields = digits_start + term as u64 + 1;
    let end = fields + RECORD_FIELDS_SIZE;
    if end > region_end {
        return Err(Error::TruncatedRecord { offset: header_offset, region_end });
    }

    Ok(FrameRecord {
        frame_index,
        header_offset,
        start_coordinate: source.read_u64_at(fields)?,
        record_length: source.read_u64_at(fields + 8)?,
        end,
    })
}

pub fn scan_frame_index<R: Read + Seek>(source: &mut ByteSource<R>, region: Range<u64>, capacity: Option<usize>, resume: ScanResume) -> Result<ChunkMapScan> {
    let mut scan = ChunkMapScan { table: FrameIndexTable::new(capacity), ..Default::default() };

    let mut scanner = PatternScanner::new(FRAME_RECORD_TAG, region.end);
    let mut pos = region.start;
    while let Some(offset) = scanner.find_from(source, pos)? {
        pos = offset + 1;
        match parse_frame_record(source, offset, region.end) {
            Ok(record) => {
                scan.matches += 1;
                log::debug!("Frame {} at {} (length {})", record.frame_index, record.start_coordinate, record.record_length);
                match scan.table.insert(record.frame_index, record.start_coordinate) {
                    Ok(Some(previous)) => log::debug!("Frame {} listed twice, replacing {previous}", record.frame_index),
                    Ok(None) => { },
                    Err(e) => {
                        log::debug!("{e}");
                        scan.rejected.push(e);
                    }
                }
                if resume == ScanResume::PastRecord {
                    pos = record.end;
                }
            },
            Err(e) if e.kind() == ErrorKind::Format => {
                if log::log_enabled!(log::Level::Warn) {
                    let size = (FRAME_RECORD_TAG.len() as u64 + INDEX_LOOKAHEAD + RECORD_FIELDS_SIZE).min(region.end - offset);
                    let dump = source.read_bytes_at(offset, size as usize).unwrap_or_default();
                    log::warn!("Skipping frame record at {offset}: {e}\n{}", pretty_hex::pretty_hex(&dump));
                }
                scan.rejected.push(e);
            },
            Err(e) => return Err(e),
        }
    }

    log::info!("Indexed {} frames from {} records ({} rejected)", scan.table.len(), scan.matches, scan.rejected.len());
    Ok(scan)
}
