// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for ND2 parsing

use thiserror::Error;

/// Result type for ND2 operations
pub type Result<T> = std::result::Result<T, Error>;

/// Broad failure class of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Seek/read failed or returned fewer bytes than required
    Io,
    /// A structural expectation of the container was violated
    Format,
    /// A required literal or metadata key was absent
    NotFound,
    /// A frame index exceeded the table capacity
    Capacity,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Short read at offset {offset}: expected {expected} bytes, {available} available")]
    ShortRead { offset: u64, expected: u64, available: u64 },

    #[error("Invalid trailer: chunk map start {chunk_map_start} is outside of a {file_length} byte file")]
    InvalidTrailer { chunk_map_start: u64, file_length: u64 },

    #[error("Frame index at offset {0} has no '!' terminator")]
    MissingTerminator(u64),

    #[error("Invalid frame index {text:?} at offset {offset}")]
    InvalidFrameIndex { offset: u64, text: String },

    #[error("Frame record at offset {offset} extends past the chunk map end ({region_end})")]
    TruncatedRecord { offset: u64, region_end: u64 },

    #[error("Invalid frame data length {length} at offset {offset}")]
    InvalidDataLength { offset: u64, length: u64 },

    #[error("Pixel count mismatch: expected {expected}, frame holds {actual}")]
    PixelCountMismatch { expected: u64, actual: u64 },

    #[error("Offset out of range: {base} + {delta}")]
    OffsetOutOfRange { base: u64, delta: i64 },

    #[error("Unsupported file extension: {0:?}")]
    UnsupportedExtension(String),

    #[error("Pattern {0:?} not found")]
    PatternNotFound(&'static str),

    #[error("Metadata key {0:?} not found")]
    MissingKey(&'static str),

    #[error("Frame {0} is not in the frame index")]
    FrameNotIndexed(usize),

    #[error("Frame index {index} exceeds the table capacity of {capacity}")]
    CapacityExceeded { index: usize, capacity: usize },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) | Error::ShortRead { .. } => ErrorKind::Io,
            Error::InvalidTrailer { .. }
            | Error::MissingTerminator(_)
            | Error::InvalidFrameIndex { .. }
            | Error::TruncatedRecord { .. }
            | Error::InvalidDataLength { .. }
            | Error::PixelCountMismatch { .. }
            | Error::OffsetOutOfRange { .. }
            | Error::UnsupportedExtension(_) => ErrorKind::Format,
            Error::PatternNotFound(_) | Error::MissingKey(_) | Error::FrameNotIndexed(_) => ErrorKind::NotFound,
            Error::CapacityExceeded { .. } => ErrorKind::Capacity,
        }
    }

    /// Short reads are reported as [`Error::ShortRead`] regardless of whether they were caught
    /// by the length check or by the underlying reader.
    pub fn is_short_read(&self) -> bool {
        match self {
            Error::ShortRead { .. } => true,
            Error::Io(e) => e.kind() == std::io::ErrorKind::UnexpectedEof,
            _ => false,
        }
    }
}
