// SPDX-License-Identifier: MIT OR Apache-2.0

use std::io::{ Read, Seek };

use crate::error::{ Error, Result };
use crate::nd2::trailer::TRAILER_SIZE;
use crate::source::{ ByteSource, relative_offset };

pub const ATTRIBUTES_TAG: &[u8] = b"ImageAttributesLV";
// Past the literal and its '!' terminator
const ANCHOR_COORD_POS: u64 = 18;
const INNER_OFFSET_POS: u64 = 4;
const BLOCK_SIZE_POS: u64 = 12;
const BLOCK_DATA_POS: i64 = 16;
// 2-byte terminator between a key name and its value
const KEY_TERMINATOR_SIZE: u64 = 2;

pub const HEIGHT_KEY: &str = "uiHeight";
pub const WIDTH_KEY: &str = "uiWidth";

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ImageDimensions {
    pub height: u32,
    pub width: u32,
}

impl ImageDimensions {
    pub fn pixel_count(&self) -> u64 {
        self.height as u64 * self.width as u64
    }
}

/// ASCII key stored with every character followed by `padding` ignored bytes.
///
/// The attribute block stores names as UTF-16LE, which for ASCII is one padding byte per
/// character (see [`InterleavedKey::utf16`]).
#[derive(Debug, Clone, Copy)]
pub struct InterleavedKey<'a> {
    key: &'a str,
    padding: usize,
}

impl<'a> InterleavedKey<'a> {
    pub fn new(key: &'a str, padding: usize) -> Self {
        Self { key, padding }
    }

    pub fn utf16(key: &'a str) -> Self {
        Self::new(key, 1)
    }

    pub fn encoded_len(&self) -> usize {
        self.key.len() * (1 + self.padding)
    }

    /// Distance from the start of a match to the value stored after the key
    pub fn value_offset(&self) -> u64 {
        self.encoded_len() as u64 + KEY_TERMINATOR_SIZE
    }

    /// Decodes one key at `pos`. Padding bytes are skipped without being inspected.
    pub fn matches_at(&self, buf: &[u8], pos: usize) -> bool {
        let Some(encoded) = buf.get(pos..pos + self.encoded_len()) else {
            return false;
        };
        let mut p = 0;
        for expected in self.key.bytes() {
            if encoded[p] != expected {
                return false;
            }
            p += 1 + self.padding;
        }
        true
    }

    /// First position in `buf` where the key matches
    pub fn find(&self, buf: &[u8]) -> Option<usize> {
        if self.key.is_empty() || buf.len() < self.encoded_len() {
            return None;
        }
        (0..=buf.len() - self.encoded_len()).find(|&k| self.matches_at(buf, k))
    }
}

fn read_key_value<R: Read + Seek>(source: &mut ByteSource<R>, block: &[u8], block_start: u64, key: &'static str) -> Result<u32> {
    let interleaved = InterleavedKey::utf16(key);
    let k = interleaved.find(block).ok_or(Error::MissingKey(key))?;
    let value_pos = block_start + k as u64 + interleaved.value_offset();
    log::debug!("{key} at {}, value at {value_pos}", block_start + k as u64);
    source.read_u32_at(value_pos)
}

/// Recovers the image height and width from the image attributes block listed in the chunk map.
pub fn resolve_dimensions<R: Read + Seek>(source: &mut ByteSource<R>, chunk_map_start: u64) -> Result<ImageDimensions> {
    let search_end = source.len().saturating_sub(TRAILER_SIZE);
    let anchor = source.find_pattern(ATTRIBUTES_TAG, chunk_map_start, search_end)?
        .ok_or(Error::PatternNotFound("ImageAttributesLV"))?;

    let attrib_coord = source.read_u64_at(anchor + ANCHOR_COORD_POS)?;
    let inner_offset = source.read_i32_at(relative_offset(attrib_coord, INNER_OFFSET_POS as i64)?)?;
    let block_size = source.read_u64_at(relative_offset(attrib_coord, BLOCK_SIZE_POS as i64)?)?;

    let block_start = relative_offset(relative_offset(attrib_coord, BLOCK_DATA_POS)?, inner_offset as i64)?;
    let block_end = block_start.saturating_add(block_size).min(source.len());
    log::debug!("Image attributes at {attrib_coord}, block {block_start}..{block_end}");

    let block = if block_start < block_end {
        source.read_bytes_at(block_start, (block_end - block_start) as usize)?
    } else {
        Vec::new()
    };

    let height = read_key_value(source, &block, block_start, HEIGHT_KEY)?;
    let width = read_key_value(source, &block, block_start, WIDTH_KEY)?;
    log::info!("Image dimensions: {width}x{height}");

    Ok(ImageDimensions { height, width })
}
