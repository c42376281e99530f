// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod attributes;
pub mod chunk_map;
pub mod frame;
pub mod trailer;

use std::io::{ Read, Seek };
use std::ops::Range;
use std::path::Path;

use crate::error::{ Error, Result };
use crate::filesystem::{ self, ReadSeek };
use crate::source::ByteSource;

pub use attributes::{ ImageDimensions, InterleavedKey, resolve_dimensions };
pub use chunk_map::{ ChunkMapScan, FrameIndexTable, FrameRecord, ScanResume, scan_frame_index };
pub use frame::{ Frame, FrameHeader, pixel_count, read_frame };
pub use trailer::{ Trailer, resolve_trailer };

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ParseOptions {
    /// Frame index capacity. Frames numbered at or above it are dropped.
    pub max_frames: Option<usize>,
    pub scan_resume: ScanResume,
    /// Require every frame to hold exactly `height * width` samples
    pub validate_pixel_count: bool,
}

/// Frame header summary, without the samples
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct FrameInfo {
    pub index: usize,
    pub start_coordinate: u64,
    pub data_offset: i32,
    pub data_length: u64,
    pub pixel_count: u64,
    pub timestamp: f32,
}

/// An open ND2 container.
///
/// Every read seeks the one underlying cursor, hence `&mut self` throughout. To read from
/// several threads, open one `Nd2File` per thread on the same path.
pub struct Nd2File<R> {
    source: ByteSource<R>,
    trailer: Trailer,
    options: ParseOptions,
    frame_index: Option<FrameIndexTable>,
    dimensions: Option<ImageDimensions>,
}

impl Nd2File<Box<dyn ReadSeek>> {
    pub fn possible_extensions() -> Vec<&'static str> {
        vec!["nd2"]
    }

    pub fn detect<P: AsRef<Path>>(filepath: P) -> bool {
        filesystem::has_extension(filepath.as_ref(), &Self::possible_extensions())
    }

    pub fn open<P: AsRef<Path>>(path: P, options: ParseOptions) -> Result<Self> {
        let wrapper = filesystem::open_file(path.as_ref())?;
        Self::from_stream(wrapper.file, wrapper.size, options)
    }
}

impl<R: Read + Seek> Nd2File<R> {
    pub fn from_stream(stream: R, size: u64, options: ParseOptions) -> Result<Self> {
        let mut source = ByteSource::new(stream, size);
        let trailer = resolve_trailer(&mut source)?;
        Ok(Self {
            source,
            trailer,
            options,
            frame_index: None,
            dimensions: None,
        })
    }

    pub fn trailer(&self) -> &Trailer { &self.trailer }
    pub fn options(&self) -> &ParseOptions { &self.options }
    pub fn chunk_map_region(&self) -> Range<u64> { self.trailer.chunk_map_region() }

    pub fn into_inner(self) -> R { self.source.into_inner() }

    /// Scans the chunk map without caching the result.
    pub fn scan(&mut self) -> Result<ChunkMapScan> {
        scan_frame_index(&mut self.source, self.trailer.chunk_map_region(), self.options.max_frames, self.options.scan_resume)
    }

    /// Frame index table, built on first use.
    pub fn frame_index(&mut self) -> Result<&FrameIndexTable> {
        if self.frame_index.is_none() {
            self.frame_index = Some(self.scan()?.table);
        }
        Ok(self.frame_index.get_or_insert_default())
    }

    pub fn frame_count(&mut self) -> Result<usize> {
        Ok(self.frame_index()?.len())
    }

    /// Image height and width, resolved on first use.
    pub fn dimensions(&mut self) -> Result<ImageDimensions> {
        if let Some(dims) = self.dimensions {
            return Ok(dims);
        }
        let dims = resolve_dimensions(&mut self.source, self.trailer.chunk_map_start)?;
        self.dimensions = Some(dims);
        Ok(dims)
    }

    fn coordinate(&mut self, index: usize) -> Result<u64> {
        self.frame_index()?.get(index).ok_or(Error::FrameNotIndexed(index))
    }

    fn expected_pixel_count(&mut self) -> Result<Option<u64>> {
        if self.options.validate_pixel_count {
            Ok(Some(self.dimensions()?.pixel_count()))
        } else {
            Ok(None)
        }
    }

    pub fn pixel_count(&mut self, index: usize) -> Result<u64> {
        let start = self.coordinate(index)?;
        pixel_count(&mut self.source, start)
    }

    pub fn frame_info(&mut self, index: usize) -> Result<FrameInfo> {
        let start = self.coordinate(index)?;
        let header = frame::read_frame_header(&mut self.source, start)?;
        let timestamp = self.source.read_f32_at(header.timestamp_position()?)?;
        Ok(FrameInfo {
            index,
            start_coordinate: start,
            data_offset: header.data_offset,
            data_length: header.data_length,
            pixel_count: header.pixel_count,
            timestamp,
        })
    }

    pub fn read_frame(&mut self, index: usize) -> Result<Frame> {
        let start = self.coordinate(index)?;
        let expected = self.expected_pixel_count()?;
        read_frame(&mut self.source, start, expected)
    }

    /// Reads the frame chunk at an explicit start coordinate.
    pub fn read_frame_at(&mut self, start_coordinate: u64, expected_pixel_count: Option<u64>) -> Result<Frame> {
        read_frame(&mut self.source, start_coordinate, expected_pixel_count)
    }

    /// Reads every indexed frame in ascending frame order. Stops at the first error.
    pub fn for_each_frame<F>(&mut self, mut callback: F) -> Result<usize>
        where F: FnMut(usize, Frame)
    {
        let entries: Vec<(usize, u64)> = self.frame_index()?.iter().collect();
        let expected = self.expected_pixel_count()?;
        for (index, start) in &entries {
            let frame = read_frame(&mut self.source, *start, expected)?;
            callback(*index, frame);
        }
        Ok(entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_util::*;
    use std::io::Cursor;

    fn open(synthetic: &Synthetic, options: ParseOptions) -> Nd2File<Cursor<Vec<u8>>> {
        Nd2File::from_stream(synthetic.cursor(), synthetic.bytes.len() as u64, options).unwrap()
    }

    #[test]
    fn every_indexed_frame_reads_back() {
        let synthetic = ContainerBuilder::new().frames(7, 24).build();
        let mut file = open(&synthetic, ParseOptions::default());

        let mut seen = Vec::new();
        let count = file.for_each_frame(|index, frame| {
            assert_eq!(frame.pixels, frame_pixels(index, 24));
            assert_eq!(frame.timestamp, index as f32 * 0.25 + 10.0);
            seen.push(index);
        }).unwrap();

        assert_eq!(count, 7);
        assert_eq!(seen, (0..7).collect::<Vec<_>>());
    }

    #[test]
    fn frame_lookup_by_index() {
        let synthetic = ContainerBuilder::new().frames(3, 5).build();
        let mut file = open(&synthetic, ParseOptions::default());

        assert_eq!(file.frame_count().unwrap(), 3);
        assert_eq!(file.pixel_count(2).unwrap(), 5);
        assert_eq!(file.read_frame(1).unwrap().pixels, frame_pixels(1, 5));

        let info = file.frame_info(2).unwrap();
        assert_eq!(info.start_coordinate, synthetic.coord(2));
        assert_eq!(info.data_length, 18);
        assert_eq!(info.timestamp, 10.5);

        let err = file.read_frame(3).unwrap_err();
        assert!(matches!(err, Error::FrameNotIndexed(3)));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn capacity_comes_from_options() {
        let synthetic = ContainerBuilder::new().frames(6, 2).build();
        let mut file = open(&synthetic, ParseOptions { max_frames: Some(4), ..Default::default() });
        assert_eq!(file.frame_count().unwrap(), 4);
        assert!(matches!(file.read_frame(4), Err(Error::FrameNotIndexed(4))));
    }

    #[test]
    fn validates_pixel_count_against_dimensions() {
        let synthetic = ContainerBuilder::new().frames(2, 6).dimensions(Some(2), Some(3)).build();
        let mut file = open(&synthetic, ParseOptions { validate_pixel_count: true, ..Default::default() });
        assert_eq!(file.dimensions().unwrap(), ImageDimensions { height: 2, width: 3 });
        assert_eq!(file.read_frame(0).unwrap().pixels.len(), 6);

        let synthetic = ContainerBuilder::new().frames(2, 6).dimensions(Some(2), Some(4)).build();
        let mut file = open(&synthetic, ParseOptions { validate_pixel_count: true, ..Default::default() });
        assert!(matches!(file.read_frame(0), Err(Error::PixelCountMismatch { expected: 8, actual: 6 })));
    }

    #[test]
    fn rejects_invalid_trailer_on_open() {
        let mut bytes = vec![0u8; 32];
        bytes.extend_from_slice(&1000u64.to_le_bytes());
        let len = bytes.len() as u64;
        let err = Nd2File::from_stream(Cursor::new(bytes), len, ParseOptions::default()).err().unwrap();
        assert!(matches!(err, Error::InvalidTrailer { chunk_map_start: 1000, file_length: 40 }));
    }

    #[test]
    fn detects_by_extension() {
        assert!(Nd2File::detect("/data/run_01.ND2"));
        assert!(!Nd2File::detect("/data/run_01.tif"));
        assert!(!Nd2File::detect("nd2"));
    }
}
