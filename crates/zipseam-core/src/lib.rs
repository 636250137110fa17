//! # zipseam-core
//!
//! Error types and checksum arithmetic shared across the zipseam workspace.
//!
//! The interesting piece lives in [`checksum`]: CRC-32 and Adler-32
//! combination over sub-stream lengths, which lets the stitcher emit a
//! correct trailer for a concatenated stream from per-input checksums alone.

pub mod checksum;
pub mod error;

pub use checksum::{adler32_combine, crc32_combine, Adler32, Checksum, Crc32};
pub use error::{Error, Result};
