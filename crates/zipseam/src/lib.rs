//! # zipseam
//!
//! Concatenate gzip or zlib streams at the DEFLATE block level, without
//! recompressing the payload.
//!
//! Decompressing the stitched output yields exactly the concatenation of the
//! inputs' decompressions, but the work done is a single streaming pass over
//! the compressed bytes: the stitcher walks each input's block structure,
//! clears the "final block" bit of every input except the last, pads a
//! mid-byte tail out to a byte boundary with minimal empty blocks, and
//! derives the output trailer from per-input checksums with CRC-32/Adler-32
//! combination arithmetic.
//!
//! ## Stitching
//!
//! ```
//! use std::io::{Cursor, Read, Write};
//!
//! // two independent gzip members
//! let mut members = Vec::new();
//! for payload in [&b"hello, "[..], &b"world"[..]] {
//!     let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
//!     enc.write_all(payload).unwrap();
//!     members.push(Cursor::new(enc.finish().unwrap()));
//! }
//!
//! let mut joined = Vec::new();
//! zipseam::concat_gzip(&mut joined, members).unwrap();
//!
//! let mut decoded = String::new();
//! flate2::read::GzDecoder::new(&joined[..])
//!     .read_to_string(&mut decoded)
//!     .unwrap();
//! assert_eq!(decoded, "hello, world");
//! ```
//!
//! ## Validating decompression
//!
//! [`GzipReader`] and [`ZlibReader`] decompress a single wrapped stream
//! through [`std::io::Read`], verifying the trailer checksum (and, for gzip,
//! ISIZE) once the final block completes.

pub mod gzip;
pub mod inflate;
pub mod zlib;

mod frame;
mod huffman;
mod reader;
mod stitch;

pub use gzip::{concat_gzip, GzipReader};
pub use inflate::{BlockInflater, Progress, Step};
pub use zipseam_core::{
    adler32_combine, crc32_combine, Adler32, Checksum, Crc32, Error, Result,
};
pub use zlib::{concat_zlib, ZlibReader};
