//! Validating streaming decompressor shared by the gzip and zlib readers.

use std::io::{self, BufReader, Read};

use zipseam_core::{Checksum, Error, Result};

use crate::frame::Frame;
use crate::inflate::{BlockInflater, Step};
use crate::stitch::{alloc_buf, read_full, BUF_SIZE};

/// Drives the block-boundary inflater over a wrapped stream, checksums the
/// produced bytes, and verifies the wrapper trailer at end of stream.
pub(crate) struct FrameReader<F: Frame, R: Read> {
    src: BufReader<R>,
    infl: BlockInflater,
    inbuf: Box<[u8]>,
    level: usize,
    off: usize,
    outbuf: Box<[u8]>,
    out_len: usize,
    out_off: usize,
    check: F::Check,
    size: u64,
    verified: bool,
}

impl<F: Frame, R: Read> FrameReader<F, R> {
    pub fn new(reader: R) -> Result<Self> {
        let mut src = BufReader::new(reader);
        F::parse_header(&mut src)?;
        Ok(Self {
            src,
            infl: BlockInflater::new()?,
            inbuf: alloc_buf(BUF_SIZE)?,
            level: 0,
            off: 0,
            outbuf: alloc_buf(BUF_SIZE)?,
            out_len: 0,
            out_off: 0,
            check: F::Check::default(),
            size: 0,
            verified: false,
        })
    }

    /// Retain the unconsumed tail and top the buffer up from the source.
    fn refill(&mut self) -> Result<()> {
        let tail = self.level - self.off;
        self.inbuf.copy_within(self.off..self.level, 0);
        self.off = 0;
        let fresh = read_full(&mut self.src, &mut self.inbuf[tail..])?;
        if fresh == 0 {
            return Err(Error::truncated(self.infl.bytes_consumed()));
        }
        self.level = tail + fresh;
        Ok(())
    }

    /// Run the inflater until it produces output. Returns `false` at end of
    /// stream, after the trailer has been verified.
    fn fill_output(&mut self) -> Result<bool> {
        loop {
            if self.infl.is_finished() {
                // verified exactly once; a failure surfaces on the read that
                // hit end of stream, later reads just report EOF
                if !self.verified {
                    self.verified = true;
                    self.verify_trailer()?;
                }
                return Ok(false);
            }
            let progress = self
                .infl
                .inflate(&self.inbuf[self.off..self.level], &mut self.outbuf)?;
            self.off += progress.consumed;
            if progress.produced > 0 {
                self.check.update(&self.outbuf[..progress.produced]);
                self.size += progress.produced as u64;
                self.out_len = progress.produced;
                self.out_off = 0;
                return Ok(true);
            }
            if progress.step == Step::NeedsInput {
                self.refill()?;
            }
        }
    }

    /// Read the wrapper trailer from the unconsumed buffer tail (topped up
    /// from the source if short) and verify it.
    fn verify_trailer(&mut self) -> Result<()> {
        // the trailer starts at the byte boundary after the final block
        if self.infl.bit_offset() != 0 {
            self.off += 1;
        }
        let mut trailer = [0u8; 8];
        let want = F::TRAILER_LEN;
        let have = (self.level - self.off).min(want);
        trailer[..have].copy_from_slice(&self.inbuf[self.off..self.off + have]);
        self.off += have;
        if have < want {
            self.src.read_exact(&mut trailer[have..want])?;
        }
        F::verify_trailer(&trailer[..want], self.check.value(), self.size)
    }

    pub fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut n = 0;
        while n < buf.len() {
            if self.out_off == self.out_len {
                match self.fill_output() {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(err) => return Err(err.into()),
                }
            }
            let take = (self.out_len - self.out_off).min(buf.len() - n);
            buf[n..n + take].copy_from_slice(&self.outbuf[self.out_off..self.out_off + take]);
            self.out_off += take;
            n += take;
        }
        Ok(n)
    }
}
