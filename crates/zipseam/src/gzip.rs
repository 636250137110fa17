//! Gzip wrapper handling (RFC 1952) and the gzip-facing API.

use std::io::{self, BufRead, Read, Write};

use tracing::trace;
use zipseam_core::{crc32_combine, Crc32, Error, Result};

use crate::frame::Frame;
use crate::reader::FrameReader;
use crate::stitch;

/// Gzip magic number.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Compression method: DEFLATE.
const CM_DEFLATE: u8 = 8;

/// Header flags.
const FHCRC: u8 = 2;
const FEXTRA: u8 = 4;
const FNAME: u8 = 8;
const FCOMMENT: u8 = 16;

/// Reserved flag bits; must be clear.
const FLG_RESERVED: u8 = 0xe0;

/// Header the stitcher emits: method 8, no flags, zero mtime, unknown OS.
const GZIP_HEADER: [u8; 10] = [0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff];

/// Gzip wrapper marker for the generic stitcher and reader.
pub(crate) struct Gzip;

impl Frame for Gzip {
    type Check = Crc32;

    const HEADER: &'static [u8] = &GZIP_HEADER;
    const TRAILER_LEN: usize = 8;
    const CHECK_SEED: u32 = 0;

    fn parse_header<R: BufRead>(reader: &mut R) -> Result<usize> {
        read_gzip_header(reader)
    }

    fn combine(running: u32, part: u32, part_len: u64) -> u32 {
        crc32_combine(running, part, part_len)
    }

    fn write_trailer<W: Write>(writer: &mut W, check: u32, size: u64) -> Result<()> {
        let mut trailer = [0u8; 8];
        trailer[..4].copy_from_slice(&check.to_le_bytes());
        trailer[4..].copy_from_slice(&(size as u32).to_le_bytes());
        writer.write_all(&trailer)?;
        Ok(())
    }

    fn verify_trailer(trailer: &[u8], check: u32, size: u64) -> Result<()> {
        let stored_crc = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        if stored_crc != check {
            return Err(Error::checksum_mismatch(check, stored_crc));
        }
        let stored_size = u32::from_le_bytes([trailer[4], trailer[5], trailer[6], trailer[7]]);
        if stored_size != size as u32 {
            return Err(Error::size_mismatch(size as u32, stored_size));
        }
        Ok(())
    }
}

/// Parse a gzip member header, returning the number of bytes consumed.
fn read_gzip_header<R: BufRead>(reader: &mut R) -> Result<usize> {
    let mut fixed = [0u8; 10];
    reader.read_exact(&mut fixed)?;
    if fixed[0] != GZIP_MAGIC[0] || fixed[1] != GZIP_MAGIC[1] {
        return Err(Error::malformed_header("bad gzip magic"));
    }
    if fixed[2] != CM_DEFLATE {
        return Err(Error::malformed_header("unsupported compression method"));
    }
    let flags = fixed[3];
    if flags & FLG_RESERVED != 0 {
        return Err(Error::malformed_header("reserved flag bits set"));
    }

    let mut n = fixed.len();
    if flags & FEXTRA != 0 {
        let mut len = [0u8; 2];
        reader.read_exact(&mut len)?;
        n += 2 + skip_bytes(reader, usize::from(u16::from_le_bytes(len)))?;
    }
    if flags & FNAME != 0 {
        n += skip_string(reader)?;
    }
    if flags & FCOMMENT != 0 {
        n += skip_string(reader)?;
    }
    if flags & FHCRC != 0 {
        n += skip_bytes(reader, 2)?;
    }
    trace!(header_len = n, "parsed gzip header");
    Ok(n)
}

/// Skip exactly `count` bytes.
fn skip_bytes<R: BufRead>(reader: &mut R, count: usize) -> Result<usize> {
    let mut left = count;
    while left > 0 {
        let available = reader.fill_buf()?;
        if available.is_empty() {
            return Err(Error::Io(io::ErrorKind::UnexpectedEof.into()));
        }
        let take = available.len().min(left);
        reader.consume(take);
        left -= take;
    }
    Ok(count)
}

/// Skip a NUL-terminated field, returning bytes consumed including the NUL.
fn skip_string<R: BufRead>(reader: &mut R) -> Result<usize> {
    let mut n = 0;
    loop {
        let mut byte = [0u8; 1];
        reader.read_exact(&mut byte)?;
        n += 1;
        if byte[0] == 0 {
            return Ok(n);
        }
    }
}

/// Stitch whole gzip streams into a single gzip stream without
/// recompressing the payload.
///
/// Decompressing the output yields the concatenation of the inputs'
/// decompressions. A single input is copied through verbatim; zero inputs
/// is an error.
pub fn concat_gzip<W, R, I>(writer: W, inputs: I) -> Result<()>
where
    W: Write,
    R: Read,
    I: IntoIterator<Item = R>,
{
    stitch::concat::<Gzip, _, _, _>(writer, inputs)
}

/// Validating gzip decompressor.
///
/// Streams decompressed bytes through [`Read`] and verifies the trailer
/// CRC-32 and ISIZE when the final block completes; mismatches surface as
/// [`Error::ChecksumMismatch`] / [`Error::SizeMismatch`] wrapped in the
/// final `read`'s [`io::Error`].
pub struct GzipReader<R: Read> {
    inner: FrameReader<Gzip, R>,
}

impl<R: Read> GzipReader<R> {
    /// Parse the gzip header and set up the streaming decompressor.
    pub fn new(reader: R) -> Result<Self> {
        Ok(Self {
            inner: FrameReader::new(reader)?,
        })
    }
}

impl<R: Read> Read for GzipReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufReader;

    fn parse(bytes: &[u8]) -> Result<usize> {
        read_gzip_header(&mut BufReader::new(bytes))
    }

    #[test]
    fn test_plain_header() {
        assert_eq!(parse(&GZIP_HEADER).unwrap(), 10);
    }

    #[test]
    fn test_header_with_all_optional_fields() {
        let mut header = vec![0x1f, 0x8b, 0x08, FEXTRA | FNAME | FCOMMENT | FHCRC];
        header.extend_from_slice(&[0; 6]);
        header.extend_from_slice(&3u16.to_le_bytes());
        header.extend_from_slice(b"xyz");
        header.extend_from_slice(b"name\0");
        header.extend_from_slice(b"comment\0");
        header.extend_from_slice(&[0xaa, 0xbb]);
        let expected = header.len();
        header.extend_from_slice(b"deflate data follows");

        assert_eq!(parse(&header).unwrap(), expected);
    }

    #[test]
    fn test_bad_magic() {
        let header = [0x1f, 0x8c, 0x08, 0, 0, 0, 0, 0, 0, 0xff];
        assert!(matches!(
            parse(&header),
            Err(Error::MalformedHeader { .. })
        ));
    }

    #[test]
    fn test_bad_method() {
        let header = [0x1f, 0x8b, 0x07, 0, 0, 0, 0, 0, 0, 0xff];
        assert!(matches!(
            parse(&header),
            Err(Error::MalformedHeader { .. })
        ));
    }

    #[test]
    fn test_reserved_flags_rejected() {
        let header = [0x1f, 0x8b, 0x08, 0x20, 0, 0, 0, 0, 0, 0xff];
        assert!(matches!(
            parse(&header),
            Err(Error::MalformedHeader { .. })
        ));
    }

    #[test]
    fn test_trailer_roundtrip() {
        let mut buf = Vec::new();
        Gzip::write_trailer(&mut buf, 0xdead_beef, 0x1_0000_1234).unwrap();
        assert_eq!(buf.len(), 8);
        // ISIZE is the size mod 2^32
        Gzip::verify_trailer(&buf, 0xdead_beef, 0x1_0000_1234).unwrap();
        Gzip::verify_trailer(&buf, 0xdead_beef, 0x0_0000_1234).unwrap();
        assert!(matches!(
            Gzip::verify_trailer(&buf, 0xdead_beee, 0x1234),
            Err(Error::ChecksumMismatch { .. })
        ));
        assert!(matches!(
            Gzip::verify_trailer(&buf, 0xdead_beef, 0x1235),
            Err(Error::SizeMismatch { .. })
        ));
    }
}
