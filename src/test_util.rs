// SPDX-License-Identifier: MIT OR Apache-2.0

// Synthetic ND2 containers for tests. Self-contained so integration tests can pull it in too.
#![allow(dead_code)]

pub const CHUNK_MAGIC: u32 = 0x0ABECEDA;

#[derive(Clone, Debug)]
pub struct SyntheticFrame {
    pub index: usize,
    pub timestamp: f32,
    pub pixels: Vec<u16>,
}

pub struct Synthetic {
    pub bytes: Vec<u8>,
    /// (frame index, start coordinate) in the order the frames were written
    pub coords: Vec<(usize, u64)>,
    pub chunk_map_start: u64,
}

impl Synthetic {
    pub fn coord(&self, index: usize) -> u64 {
        self.coords.iter().find(|(i, _)| *i == index).map(|(_, c)| *c).unwrap()
    }
    pub fn cursor(&self) -> std::io::Cursor<Vec<u8>> {
        std::io::Cursor::new(self.bytes.clone())
    }
}

/// UTF-16LE without terminator, the way the attribute block stores key names
pub fn interleave(key: &str) -> Vec<u8> {
    key.bytes().flat_map(|b| [b, 0]).collect()
}

pub fn frame_pixels(index: usize, count: usize) -> Vec<u16> {
    (0..count).map(|i| (index * 1000 + i * 7) as u16).collect()
}

/// Reader that counts the bytes handed out, to check how often a region is read
pub struct CountingReader<R> {
    pub inner: R,
    pub read: u64,
}

impl<R: std::io::Read> std::io::Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.read += n as u64;
        Ok(n)
    }
}

impl<R: std::io::Seek> std::io::Seek for CountingReader<R> {
    fn seek(&mut self, pos: std::io::SeekFrom) -> std::io::Result<u64> {
        self.inner.seek(pos)
    }
}

pub struct ContainerBuilder {
    frames: Vec<SyntheticFrame>,
    height: Option<u32>,
    width: Option<u32>,
    attributes: bool,
    name_len: usize,
    extra_chunk_map: Vec<u8>,
}

impl Default for ContainerBuilder {
    fn default() -> Self { Self::new() }
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self {
            frames: Vec::new(),
            height: Some(4),
            width: Some(6),
            attributes: true,
            name_len: 20,
            extra_chunk_map: Vec::new(),
        }
    }

    pub fn frame(mut self, index: usize, timestamp: f32, pixels: Vec<u16>) -> Self {
        self.frames.push(SyntheticFrame { index, timestamp, pixels });
        self
    }

    /// Frames `0..n`, each with `pixels` samples
    pub fn frames(mut self, n: usize, pixels: usize) -> Self {
        for i in 0..n {
            self.frames.push(SyntheticFrame { index: i, timestamp: i as f32 * 0.25 + 10.0, pixels: frame_pixels(i, pixels) });
        }
        self
    }

    pub fn dimensions(mut self, height: Option<u32>, width: Option<u32>) -> Self {
        self.height = height;
        self.width = width;
        self
    }

    pub fn without_attributes(mut self) -> Self {
        self.attributes = false;
        self
    }

    /// Name length of every chunk, i.e. the data offset stored at `start + 4`
    pub fn name_len(mut self, len: usize) -> Self {
        self.name_len = len;
        self
    }

    /// Raw bytes appended to the chunk map after the frame records
    pub fn raw_chunk_map(mut self, bytes: &[u8]) -> Self {
        self.extra_chunk_map.extend_from_slice(bytes);
        self
    }

    fn chunk_header(&self, out: &mut Vec<u8>, data_length: u64) {
        out.extend_from_slice(&CHUNK_MAGIC.to_le_bytes());
        out.extend_from_slice(&(self.name_len as i32).to_le_bytes());
        out.extend_from_slice(&data_length.to_le_bytes());
        out.extend(std::iter::repeat_n(b'n', self.name_len));
    }

    pub fn build(&self) -> Synthetic {
        let mut bytes = b"ND2 FILE SIGNATURE CHUNK NAME01!".to_vec();
        let mut coords = Vec::new();
        let mut records = Vec::new();

        for frame in &self.frames {
            let start = bytes.len() as u64;
            let data_length = 8 + 2 * frame.pixels.len() as u64;
            self.chunk_header(&mut bytes, data_length);
            bytes.extend_from_slice(&frame.timestamp.to_le_bytes());
            bytes.extend_from_slice(&[0u8; 4]);
            for p in &frame.pixels {
                bytes.extend_from_slice(&p.to_le_bytes());
            }
            coords.push((frame.index, start));
            records.push((format!("ImageDataSeq|{}!", frame.index), start, data_length + 16 + self.name_len as u64));
        }

        if self.attributes {
            let mut content = vec![0x03, 0x09, 0x41];
            if let Some(w) = self.width {
                content.push(0x03);
                content.extend(interleave("uiWidth"));
                content.extend_from_slice(&[0, 0]);
                content.extend_from_slice(&w.to_le_bytes());
            }
            if let Some(h) = self.height {
                content.push(0x03);
                content.extend(interleave("uiHeight"));
                content.extend_from_slice(&[0, 0]);
                content.extend_from_slice(&h.to_le_bytes());
            }
            content.extend_from_slice(&[0x07, 0x00, 0x00]);

            // magic, inner offset, 4 spare bytes, block size at +12, 4 spare bytes, content at +24
            let attrib_coord = bytes.len() as u64;
            bytes.extend_from_slice(&CHUNK_MAGIC.to_le_bytes());
            bytes.extend_from_slice(&8i32.to_le_bytes());
            bytes.extend_from_slice(&[0u8; 4]);
            bytes.extend_from_slice(&(content.len() as u64).to_le_bytes());
            bytes.extend_from_slice(&[0u8; 4]);
            bytes.extend_from_slice(&content);
            records.push(("ImageAttributesLV!".to_string(), attrib_coord, content.len() as u64 + 24));
        }

        let chunk_map_start = bytes.len() as u64;
        bytes.extend_from_slice(b"ND2 CHUNK MAP SIGNATURE 0000001!");
        for (i, (name, coord, len)) in records.iter().enumerate() {
            bytes.extend_from_slice(name.as_bytes());
            bytes.extend_from_slice(&coord.to_le_bytes());
            bytes.extend_from_slice(&len.to_le_bytes());
            // Records are not fixed-stride
            bytes.extend(std::iter::repeat_n(0u8, i % 3));
        }
        bytes.extend_from_slice(&self.extra_chunk_map);
        bytes.extend_from_slice(b"ND2 CHUNK MAP SIGNATURE 0000001!");
        bytes.extend_from_slice(&chunk_map_start.to_le_bytes());

        Synthetic { bytes, coords, chunk_map_start }
    }
}
