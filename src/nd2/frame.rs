// SPDX-License-Identifier: MIT OR Apache-2.0

use std::io::{ Read, Seek };

use crate::error::{ Error, Result };
use crate::source::{ ByteSource, relative_offset };

// Layout relative to the frame start coordinate
const DATA_OFFSET_POS: u64 = 4;
const DATA_LENGTH_POS: u64 = 8;
// Relative to start + data offset
const TIMESTAMP_POS: u64 = 16;
const PIXELS_POS: u64 = 24;
// The timestamp slot that precedes the samples is counted in the data length
const TIMESTAMP_SLOT: u64 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct FrameHeader {
    pub start_coordinate: u64,
    pub data_offset: i32,
    pub data_length: u64,
    pub pixel_count: u64,
}

impl FrameHeader {
    fn data_position(&self, pos: u64) -> Result<u64> {
        relative_offset(relative_offset(self.start_coordinate, pos as i64)?, self.data_offset as i64)
    }
    pub fn timestamp_position(&self) -> Result<u64> { self.data_position(TIMESTAMP_POS) }
    pub fn pixels_position(&self) -> Result<u64> { self.data_position(PIXELS_POS) }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Frame {
    pub timestamp: f32,
    pub pixels: Vec<u16>,
}

/// Number of u16 samples described by a data length field.
pub fn pixel_count_from_length(data_length: u64, offset: u64) -> Result<u64> {
    data_length.checked_sub(TIMESTAMP_SLOT)
        .map(|x| x / 2)
        .ok_or(Error::InvalidDataLength { offset, length: data_length })
}

pub fn read_frame_header<R: Read + Seek>(source: &mut ByteSource<R>, start_coordinate: u64) -> Result<FrameHeader> {
    let data_offset = source.read_i32_at(relative_offset(start_coordinate, DATA_OFFSET_POS as i64)?)?;
    let length_pos = relative_offset(start_coordinate, DATA_LENGTH_POS as i64)?;
    let data_length = source.read_u64_at(length_pos)?;

    Ok(FrameHeader {
        start_coordinate,
        data_offset,
        data_length,
        pixel_count: pixel_count_from_length(data_length, length_pos)?,
    })
}

pub fn pixel_count<R: Read + Seek>(source: &mut ByteSource<R>, start_coordinate: u64) -> Result<u64> {
    Ok(read_frame_header(source, start_coordinate)?.pixel_count)
}

/// Reads the timestamp and all samples of the frame starting at `start_coordinate`.
///
/// When `expected_pixel_count` is given, a frame of any other size is rejected before the
/// samples are read.
pub fn read_frame<R: Read + Seek>(source: &mut ByteSource<R>, start_coordinate: u64, expected_pixel_count: Option<u64>) -> Result<Frame> {
    let header = read_frame_header(source, start_coordinate)?;
    if let Some(expected) = expected_pixel_count {
        if expected != header.pixel_count {
            return Err(Error::PixelCountMismatch { expected, actual: header.pixel_count });
        }
    }

    let timestamp = source.read_f32_at(header.timestamp_position()?)?;
    let pixels = source.read_u16s_at(header.pixels_position()?, header.pixel_count)?;

    Ok(Frame { timestamp, pixels })
}
