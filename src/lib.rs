// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod error;
pub mod filesystem;
pub mod nd2;
pub mod source;

#[cfg(test)]
mod test_util;

pub use error::{ Error, ErrorKind, Result };
pub use nd2::*;
pub use source::ByteSource;
