//! Wrapper-format abstraction shared by the stitcher and validating readers.

use std::io::{BufRead, Write};

use zipseam_core::{Checksum, Result};

/// Everything that differs between the gzip and zlib wrappers: canonical
/// header bytes, header parsing, trailer layout, and which checksum runs
/// over the uncompressed stream.
pub(crate) trait Frame {
    /// Per-input checksum accumulator.
    type Check: Checksum + Default;

    /// Canonical wrapper header emitted by the stitcher.
    const HEADER: &'static [u8];

    /// Wrapper trailer length in bytes (at most 8).
    const TRAILER_LEN: usize;

    /// Seed of the running combined checksum (CRC-32: 0, Adler-32: 1).
    const CHECK_SEED: u32;

    /// Parse and discard a wrapper header, returning the bytes consumed.
    fn parse_header<R: BufRead>(reader: &mut R) -> Result<usize>;

    /// Fold a finished sub-stream checksum into the running value.
    fn combine(running: u32, part: u32, part_len: u64) -> u32;

    /// Write the wrapper trailer for the given checksum and total size.
    fn write_trailer<W: Write>(writer: &mut W, check: u32, size: u64) -> Result<()>;

    /// Verify a trailer (exactly `TRAILER_LEN` bytes) against the computed
    /// checksum and size.
    fn verify_trailer(trailer: &[u8], check: u32, size: u64) -> Result<()>;
}
