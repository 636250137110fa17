//! Zlib wrapper handling (RFC 1950) and the zlib-facing API.

use std::io::{self, BufRead, Read, Write};

use tracing::trace;
use zipseam_core::{adler32_combine, Adler32, Error, Result};

use crate::frame::Frame;
use crate::reader::FrameReader;
use crate::stitch;

/// Zlib compression method: DEFLATE.
const CM_DEFLATE: u8 = 8;

/// FLG bit indicating a preset dictionary.
const FDICT: u8 = 0x20;

/// Header the stitcher emits: deflate, 32 KiB window, default level,
/// FCHECK-valid.
const ZLIB_HEADER: [u8; 2] = [0x78, 0x9c];

/// Zlib wrapper marker for the generic stitcher and reader.
pub(crate) struct Zlib;

impl Frame for Zlib {
    type Check = Adler32;

    const HEADER: &'static [u8] = &ZLIB_HEADER;
    const TRAILER_LEN: usize = 4;
    const CHECK_SEED: u32 = 1;

    fn parse_header<R: BufRead>(reader: &mut R) -> Result<usize> {
        read_zlib_header(reader)
    }

    fn combine(running: u32, part: u32, part_len: u64) -> u32 {
        adler32_combine(running, part, part_len)
    }

    fn write_trailer<W: Write>(writer: &mut W, check: u32, _size: u64) -> Result<()> {
        writer.write_all(&check.to_be_bytes())?;
        Ok(())
    }

    fn verify_trailer(trailer: &[u8], check: u32, _size: u64) -> Result<()> {
        let stored = u32::from_be_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        if stored != check {
            return Err(Error::checksum_mismatch(check, stored));
        }
        Ok(())
    }
}

/// Parse a zlib stream header, returning the number of bytes consumed.
fn read_zlib_header<R: BufRead>(reader: &mut R) -> Result<usize> {
    let mut header = [0u8; 2];
    reader.read_exact(&mut header)?;
    let cmf = header[0];
    let flg = header[1];

    if cmf & 0x0f != CM_DEFLATE {
        return Err(Error::malformed_header(format!(
            "only deflate compression is supported, got method {}",
            cmf & 0x0f
        )));
    }
    if cmf >> 4 > 7 {
        return Err(Error::malformed_header("window size above 32 KiB"));
    }
    if (u16::from(cmf) << 8 | u16::from(flg)) % 31 != 0 {
        return Err(Error::malformed_header("FCHECK failed"));
    }
    if flg & FDICT != 0 {
        return Err(Error::UnsupportedDictionary);
    }
    trace!("parsed zlib header");
    Ok(header.len())
}

/// Stitch whole zlib streams into a single zlib stream without
/// recompressing the payload.
///
/// Decompressing the output yields the concatenation of the inputs'
/// decompressions. A single input is copied through verbatim; zero inputs
/// is an error.
pub fn concat_zlib<W, R, I>(writer: W, inputs: I) -> Result<()>
where
    W: Write,
    R: Read,
    I: IntoIterator<Item = R>,
{
    stitch::concat::<Zlib, _, _, _>(writer, inputs)
}

/// Validating zlib decompressor.
///
/// Streams decompressed bytes through [`Read`] and verifies the Adler-32
/// trailer when the final block completes; a mismatch surfaces as
/// [`Error::ChecksumMismatch`] wrapped in the final `read`'s [`io::Error`].
pub struct ZlibReader<R: Read> {
    inner: FrameReader<Zlib, R>,
}

impl<R: Read> ZlibReader<R> {
    /// Parse the zlib header and set up the streaming decompressor.
    pub fn new(reader: R) -> Result<Self> {
        Ok(Self {
            inner: FrameReader::new(reader)?,
        })
    }
}

impl<R: Read> Read for ZlibReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufReader;

    fn parse(bytes: &[u8]) -> Result<usize> {
        read_zlib_header(&mut BufReader::new(bytes))
    }

    #[test]
    fn test_canonical_header() {
        assert_eq!(parse(&ZLIB_HEADER).unwrap(), 2);
        // the canonical header satisfies its own FCHECK
        assert_eq!((u16::from(ZLIB_HEADER[0]) << 8 | u16::from(ZLIB_HEADER[1])) % 31, 0);
    }

    #[test]
    fn test_all_window_sizes_accepted() {
        for cinfo in 0..=7u8 {
            let cmf = CM_DEFLATE | (cinfo << 4);
            let rem = (u16::from(cmf) << 8) % 31;
            let flg = if rem == 0 { 0 } else { (31 - rem) as u8 };
            parse(&[cmf, flg]).unwrap();
        }
    }

    #[test]
    fn test_bad_method() {
        assert!(matches!(
            parse(&[0x79, 0x9c]),
            Err(Error::MalformedHeader { .. })
        ));
    }

    #[test]
    fn test_oversized_window() {
        // CINFO = 8
        let cmf = 0x88u8;
        let rem = (u16::from(cmf) << 8) % 31;
        let flg = if rem == 0 { 0 } else { (31 - rem) as u8 };
        assert!(matches!(
            parse(&[cmf, flg]),
            Err(Error::MalformedHeader { .. })
        ));
    }

    #[test]
    fn test_fcheck_rejected() {
        assert!(matches!(
            parse(&[0x78, 0x9d]),
            Err(Error::MalformedHeader { .. })
        ));
    }

    #[test]
    fn test_dictionary_rejected() {
        // 0x78 0x9c with FDICT set, FCHECK re-adjusted
        let cmf = 0x78u8;
        let flg_base = 0x9cu8 & 0xc0 | FDICT;
        let rem = ((u16::from(cmf) << 8) | u16::from(flg_base)) % 31;
        let flg = flg_base | if rem == 0 { 0 } else { (31 - rem) as u8 };
        assert!(matches!(
            parse(&[cmf, flg]),
            Err(Error::UnsupportedDictionary)
        ));
    }

    #[test]
    fn test_trailer_roundtrip() {
        let mut buf = Vec::new();
        Zlib::write_trailer(&mut buf, 0x0102_0304, 0).unwrap();
        assert_eq!(buf, [0x01, 0x02, 0x03, 0x04]);
        Zlib::verify_trailer(&buf, 0x0102_0304, 0).unwrap();
        assert!(matches!(
            Zlib::verify_trailer(&buf, 0x0102_0305, 0),
            Err(Error::ChecksumMismatch { .. })
        ));
    }
}
