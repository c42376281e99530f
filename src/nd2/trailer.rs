// SPDX-License-Identifier: MIT OR Apache-2.0

use std::io::{ Read, Seek };
use std::ops::Range;

use crate::error::{ Error, Result };
use crate::source::ByteSource;

pub const TRAILER_SIZE: u64 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Trailer {
    pub chunk_map_start: u64,
    pub chunk_map_size: u64,
    pub file_length: u64,
}

impl Trailer {
    /// `[chunk_map_start, file_length - 8)`, the chunk map without the trailer itself.
    pub fn chunk_map_region(&self) -> Range<u64> {
        self.chunk_map_start..self.file_length - TRAILER_SIZE
    }
}

pub fn resolve_trailer<R: Read + Seek>(source: &mut ByteSource<R>) -> Result<Trailer> {
    let file_length = source.len();
    if file_length < TRAILER_SIZE {
        return Err(Error::ShortRead { offset: 0, expected: TRAILER_SIZE, available: file_length });
    }
    let chunk_map_start = source.read_u64_at(file_length - TRAILER_SIZE)?;
    if chunk_map_start >= file_length - TRAILER_SIZE {
        return Err(Error::InvalidTrailer { chunk_map_start, file_length });
    }
    log::debug!("Chunk map at {chunk_map_start}, file length {file_length}");

    Ok(Trailer {
        chunk_map_start,
        chunk_map_size: file_length - chunk_map_start,
        file_length,
    })
}
