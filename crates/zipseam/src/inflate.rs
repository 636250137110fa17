//! Streaming DEFLATE decompression with block-boundary reporting.
//!
//! [`BlockInflater`] decodes RFC 1951 data from caller-owned slices and
//! returns control at every block boundary, carrying enough telemetry for a
//! caller to locate the next block's header bit inside the compressed bytes
//! it is buffering. That is the contract the stitcher needs to find and
//! clear BFINAL bits without owning the buffer itself.
//!
//! Consumption is reported in whole bytes: a byte the decoder is only
//! partway through stays in the caller's buffer (its sub-byte position is
//! [`BlockInflater::bit_offset`]) and must be presented again at the start
//! of the next input slice, followed by fresh data.

use zipseam_core::{Error, Result};

use crate::huffman::{
    Bits, HuffmanDecoder, CL_CODE_ORDER, DISTANCE_BASE, DISTANCE_EXTRA_BITS, FIXED_DIST_LENGTHS,
    FIXED_LIT_LENGTHS, LENGTH_BASE, LENGTH_EXTRA_BITS,
};

/// Back-reference window size (RFC 1951 maximum distance).
pub(crate) const WINDOW_SIZE: usize = 1 << 15;

/// Maximum match length. Output space for one worst-case symbol is reserved
/// before each decode, so calls must supply at least this much room.
const MAX_LENGTH: usize = 258;

/// Why [`BlockInflater::inflate`] returned.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Step {
    /// A block's end was processed; telemetry describes the boundary.
    BlockEnd,
    /// The input slice has no more usable bits.
    NeedsInput,
    /// The output buffer cannot hold another symbol.
    OutputFull,
}

/// Byte counts and outcome of one [`BlockInflater::inflate`] call.
#[derive(Clone, Copy, Debug)]
pub struct Progress {
    /// Input bytes fully consumed by this call.
    pub consumed: usize,
    /// Output bytes produced by this call.
    pub produced: usize,
    /// Why the call returned.
    pub step: Step,
}

enum Mode {
    /// Between blocks; the next bits are a block header.
    Header,
    /// Inside a stored block with `remaining` literal bytes to copy.
    Stored { remaining: u16 },
    /// Inside a Huffman-coded block.
    Block {
        lit: HuffmanDecoder,
        dist: HuffmanDecoder,
    },
    /// The final block has been fully decoded.
    Done,
}

/// Resumable DEFLATE decoder that stops at every block boundary.
pub struct BlockInflater {
    mode: Mode,
    window: Box<[u8]>,
    wpos: usize,
    wlen: usize,
    bit_offset: u32,
    last_block: bool,
    finished: bool,
    bytes_consumed: u64,
    bytes_produced: u64,
}

impl BlockInflater {
    /// Create a decoder positioned at the first block header.
    pub fn new() -> Result<Self> {
        let mut window = Vec::new();
        window
            .try_reserve_exact(WINDOW_SIZE)
            .map_err(|_| Error::alloc_failure(WINDOW_SIZE))?;
        window.resize(WINDOW_SIZE, 0);

        Ok(Self {
            mode: Mode::Header,
            window: window.into_boxed_slice(),
            wpos: 0,
            wlen: 0,
            bit_offset: 0,
            last_block: false,
            finished: false,
            bytes_consumed: 0,
            bytes_produced: 0,
        })
    }

    /// BFINAL of the most recently parsed block header.
    pub fn last_block(&self) -> bool {
        self.last_block
    }

    /// True once the final block has been fully decoded.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Bits already consumed from the next unread input byte (0 = the
    /// decoder sits on a byte boundary). When non-zero after a
    /// [`Step::BlockEnd`], the next block header starts at this bit of the
    /// first unconsumed byte, and the number of unused bits in that byte is
    /// `8 - bit_offset`.
    pub fn bit_offset(&self) -> u32 {
        self.bit_offset
    }

    /// Total input bytes consumed across all calls.
    pub fn bytes_consumed(&self) -> u64 {
        self.bytes_consumed
    }

    /// Total output bytes produced across all calls.
    pub fn bytes_produced(&self) -> u64 {
        self.bytes_produced
    }

    /// Decode until a block ends, the output fills, or the input runs dry.
    ///
    /// `input` must begin with the partially consumed byte from the previous
    /// call whenever [`bit_offset`](Self::bit_offset) is non-zero. `output`
    /// must hold at least 258 bytes.
    pub fn inflate(&mut self, input: &[u8], output: &mut [u8]) -> Result<Progress> {
        if self.finished {
            return Ok(Progress {
                consumed: 0,
                produced: 0,
                step: Step::BlockEnd,
            });
        }
        if input.is_empty() {
            return Ok(Progress {
                consumed: 0,
                produced: 0,
                step: Step::NeedsInput,
            });
        }
        debug_assert!(output.len() >= MAX_LENGTH);

        let mut bits = Bits::new(input, self.bit_offset);
        let mut out_pos = 0usize;

        let step = 'drive: loop {
            match std::mem::replace(&mut self.mode, Mode::Header) {
                Mode::Header => {
                    let mark = bits.mark();
                    let Some(header) = bits.try_read(3) else {
                        break 'drive Step::NeedsInput;
                    };
                    self.last_block = header & 1 != 0;
                    match header >> 1 {
                        0 => {
                            bits.align();
                            let Some(len) = bits.try_read(16) else {
                                bits.rewind(mark);
                                break 'drive Step::NeedsInput;
                            };
                            let Some(nlen) = bits.try_read(16) else {
                                bits.rewind(mark);
                                break 'drive Step::NeedsInput;
                            };
                            if len as u16 != !(nlen as u16) {
                                return Err(Error::malformed_input(
                                    "stored block length mismatch",
                                ));
                            }
                            self.mode = Mode::Stored {
                                remaining: len as u16,
                            };
                        }
                        1 => {
                            self.mode = Mode::Block {
                                lit: HuffmanDecoder::from_lengths(&FIXED_LIT_LENGTHS)?,
                                dist: HuffmanDecoder::from_lengths(&FIXED_DIST_LENGTHS)?,
                            };
                        }
                        2 => match parse_dynamic_header(&mut bits)? {
                            Some((lit, dist)) => self.mode = Mode::Block { lit, dist },
                            None => {
                                bits.rewind(mark);
                                break 'drive Step::NeedsInput;
                            }
                        },
                        _ => return Err(Error::malformed_input("invalid block type 3")),
                    }
                }
                Mode::Stored { remaining } => {
                    let mut left = remaining;
                    let suspend = loop {
                        if left == 0 {
                            break None;
                        }
                        if out_pos == output.len() {
                            break Some(Step::OutputFull);
                        }
                        match bits.try_read(8) {
                            Some(byte) => {
                                self.emit(output, &mut out_pos, byte as u8);
                                left -= 1;
                            }
                            None => break Some(Step::NeedsInput),
                        }
                    };
                    if let Some(step) = suspend {
                        self.mode = Mode::Stored { remaining: left };
                        break 'drive step;
                    }
                    break 'drive self.block_end();
                }
                Mode::Block { lit, dist } => {
                    let step = loop {
                        if output.len() - out_pos < MAX_LENGTH {
                            break Step::OutputFull;
                        }
                        let mark = bits.mark();
                        let Some(sym) = lit.try_decode(&mut bits)? else {
                            break Step::NeedsInput;
                        };
                        if sym < 256 {
                            self.emit(output, &mut out_pos, sym as u8);
                            continue;
                        }
                        if sym == 256 {
                            break Step::BlockEnd;
                        }
                        if sym > 285 {
                            return Err(Error::malformed_input("invalid literal/length code"));
                        }

                        let idx = usize::from(sym - 257);
                        let Some(extra) = bits.try_read(u32::from(LENGTH_EXTRA_BITS[idx])) else {
                            bits.rewind(mark);
                            break Step::NeedsInput;
                        };
                        let length = usize::from(LENGTH_BASE[idx]) + extra as usize;

                        let Some(dsym) = dist.try_decode(&mut bits)? else {
                            bits.rewind(mark);
                            break Step::NeedsInput;
                        };
                        let dsym = usize::from(dsym);
                        if dsym >= DISTANCE_BASE.len() {
                            return Err(Error::malformed_input("invalid distance code"));
                        }
                        let Some(dextra) = bits.try_read(u32::from(DISTANCE_EXTRA_BITS[dsym]))
                        else {
                            bits.rewind(mark);
                            break Step::NeedsInput;
                        };
                        let distance = usize::from(DISTANCE_BASE[dsym]) + dextra as usize;
                        if distance > self.wlen {
                            return Err(Error::malformed_input("distance beyond produced output"));
                        }

                        // copy through the window; source may overlap the
                        // bytes being written
                        let mut src = (self.wpos + WINDOW_SIZE - distance) & (WINDOW_SIZE - 1);
                        for _ in 0..length {
                            let byte = self.window[src];
                            src = (src + 1) & (WINDOW_SIZE - 1);
                            self.emit(output, &mut out_pos, byte);
                        }
                    };
                    match step {
                        Step::BlockEnd => break 'drive self.block_end(),
                        suspend => {
                            self.mode = Mode::Block { lit, dist };
                            break 'drive suspend;
                        }
                    }
                }
                Mode::Done => unreachable!("inflate resumed after the final block"),
            }
        };

        let consumed_bits = bits.bits_consumed();
        self.bit_offset = (consumed_bits % 8) as u32;
        let consumed = (consumed_bits / 8) as usize;
        self.bytes_consumed += consumed as u64;
        self.bytes_produced += out_pos as u64;

        Ok(Progress {
            consumed,
            produced: out_pos,
            step,
        })
    }

    fn emit(&mut self, output: &mut [u8], out_pos: &mut usize, byte: u8) {
        output[*out_pos] = byte;
        *out_pos += 1;
        self.window[self.wpos] = byte;
        self.wpos = (self.wpos + 1) & (WINDOW_SIZE - 1);
        if self.wlen < WINDOW_SIZE {
            self.wlen += 1;
        }
    }

    fn block_end(&mut self) -> Step {
        if self.last_block {
            self.finished = true;
            self.mode = Mode::Done;
        }
        Step::BlockEnd
    }
}

/// Parse a dynamic block's code descriptor. Returns `None` (consuming
/// nothing at the caller's rewind point) if the input runs short; the whole
/// descriptor is re-parsed on the next call.
fn parse_dynamic_header(bits: &mut Bits<'_>) -> Result<Option<(HuffmanDecoder, HuffmanDecoder)>> {
    let Some(counts) = bits.try_read(14) else {
        return Ok(None);
    };
    let hlit = (counts & 0x1f) as usize + 257;
    let hdist = ((counts >> 5) & 0x1f) as usize + 1;
    let hclen = ((counts >> 10) & 0xf) as usize + 4;
    if hlit > 286 || hdist > 30 {
        return Err(Error::malformed_input("invalid code count"));
    }

    let mut cl_lengths = [0u8; 19];
    for &slot in CL_CODE_ORDER.iter().take(hclen) {
        let Some(len) = bits.try_read(3) else {
            return Ok(None);
        };
        cl_lengths[slot] = len as u8;
    }
    let cl_decoder = HuffmanDecoder::from_lengths(&cl_lengths)?;

    let mut lengths = vec![0u8; hlit + hdist];
    let mut i = 0;
    while i < lengths.len() {
        let Some(sym) = cl_decoder.try_decode(bits)? else {
            return Ok(None);
        };
        match sym {
            0..=15 => {
                lengths[i] = sym as u8;
                i += 1;
            }
            16 => {
                if i == 0 {
                    return Err(Error::malformed_input("repeat at start"));
                }
                let Some(count) = bits.try_read(2) else {
                    return Ok(None);
                };
                let prev = lengths[i - 1];
                for _ in 0..count + 3 {
                    if i >= lengths.len() {
                        return Err(Error::malformed_input("repeat overflow"));
                    }
                    lengths[i] = prev;
                    i += 1;
                }
            }
            17 => {
                let Some(count) = bits.try_read(3) else {
                    return Ok(None);
                };
                for _ in 0..count + 3 {
                    if i >= lengths.len() {
                        return Err(Error::malformed_input("zero repeat overflow"));
                    }
                    lengths[i] = 0;
                    i += 1;
                }
            }
            18 => {
                let Some(count) = bits.try_read(7) else {
                    return Ok(None);
                };
                for _ in 0..count + 11 {
                    if i >= lengths.len() {
                        return Err(Error::malformed_input("long zero repeat overflow"));
                    }
                    lengths[i] = 0;
                    i += 1;
                }
            }
            _ => return Err(Error::malformed_input("invalid code length symbol")),
        }
    }

    let lit = HuffmanDecoder::from_lengths(&lengths[..hlit])?;
    let dist = HuffmanDecoder::from_lengths(&lengths[hlit..])?;
    Ok(Some((lit, dist)))
}
