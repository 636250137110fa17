//! Error types for stream stitching and validation.

use thiserror::Error;

/// Result type alias for zipseam operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors surfaced by the stitcher, framing codecs, and validating readers.
#[derive(Debug, Error)]
pub enum Error {
    /// Wrapper header failed a structural check.
    #[error("malformed header: {message}")]
    MalformedHeader { message: String },

    /// zlib FDICT is set; preset dictionaries are not supported.
    #[error("preset dictionary not supported")]
    UnsupportedDictionary,

    /// DEFLATE data failed to decode.
    #[error("malformed deflate data: {message}")]
    MalformedInput { message: String },

    /// Input ended before its final block.
    #[error("truncated input after {bytes_read} compressed bytes")]
    TruncatedInput { bytes_read: u64 },

    /// Trailer checksum disagrees with the computed value.
    #[error("checksum mismatch: expected 0x{expected:08x}, got 0x{actual:08x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// gzip ISIZE disagrees with the computed uncompressed size.
    #[error("size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: u32, actual: u32 },

    /// A concat operation was given zero inputs.
    #[error("no input streams")]
    EmptyArgList,

    /// I/O error from an underlying reader or writer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Buffer allocation failed.
    #[error("allocation failed: could not allocate {requested_bytes} bytes")]
    AllocFailure { requested_bytes: usize },
}

impl Error {
    /// Create a malformed header error.
    pub fn malformed_header(message: impl Into<String>) -> Self {
        Error::MalformedHeader {
            message: message.into(),
        }
    }

    /// Create a malformed DEFLATE data error.
    pub fn malformed_input(message: impl Into<String>) -> Self {
        Error::MalformedInput {
            message: message.into(),
        }
    }

    /// Create a truncated input error.
    pub fn truncated(bytes_read: u64) -> Self {
        Error::TruncatedInput { bytes_read }
    }

    /// Create a checksum mismatch error.
    pub fn checksum_mismatch(expected: u32, actual: u32) -> Self {
        Error::ChecksumMismatch { expected, actual }
    }

    /// Create a size mismatch error.
    pub fn size_mismatch(expected: u32, actual: u32) -> Self {
        Error::SizeMismatch { expected, actual }
    }

    /// Create an allocation failure error.
    pub fn alloc_failure(requested_bytes: usize) -> Self {
        Error::AllocFailure { requested_bytes }
    }
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(inner) => inner,
            other => std::io::Error::other(other),
        }
    }
}
