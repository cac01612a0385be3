//! Decode and encode error types.

use std::fmt::{Debug, Formatter};

/// A struct returned when decompression fails
pub struct InflateDecodeErrors
{
    /// reason why decompression fails
    pub error: DecodeErrorStatus,
    /// Decoded data up until that decompression error
    pub data:  Vec<u8>
}

impl InflateDecodeErrors
{
    /// Create a new decode wrapper with data being
    /// how many bytes we actually decoded before hitting an error
    pub fn new(error: DecodeErrorStatus, data: Vec<u8>) -> InflateDecodeErrors
    {
        InflateDecodeErrors { error, data }
    }
    /// Create a new decode wrapper with an empty vector
    pub fn new_with_error(error: DecodeErrorStatus) -> InflateDecodeErrors
    {
        InflateDecodeErrors::new(error, vec![])
    }
}

impl Debug for InflateDecodeErrors
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result
    {
        writeln!(f, "{:?}", self.error)
    }
}

impl From<DecodeErrorStatus> for InflateDecodeErrors
{
    fn from(error: DecodeErrorStatus) -> Self
    {
        InflateDecodeErrors::new_with_error(error)
    }
}

pub enum DecodeErrorStatus
{
    /// Input data is not enough to construct
    /// a full output
    InsufficientData,
    /// Anything that isn't significant
    Generic(&'static str),
    GenericStr(String),
    ///Input data was malformed.
    CorruptData,
    /// Limit set by the user was exceeded by
    /// decompressed output
    OutputLimitExceeded(usize, usize),
    /// A stored block's length check failed,
    /// LEN is not the one's complement of NLEN
    MismatchedStoredLen(u16, u16),
    /// Output Adler-32 does not match stored Adler-32.
    ///
    /// Only present for zlib
    MismatchedAdler(u32, u32),
    /// A back-reference pointed before the start of output
    CorruptDistance(usize, usize)
}

impl Debug for DecodeErrorStatus
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result
    {
        match self
        {
            Self::InsufficientData => writeln!(f, "Insufficient data"),
            Self::Generic(reason) => writeln!(f, "{reason}"),
            Self::GenericStr(reason) => writeln!(f, "{reason}"),
            Self::CorruptData => writeln!(f, "Corrupt data"),
            Self::OutputLimitExceeded(limit, current) => writeln!(
                f,
                "Output limit exceeded, set limit was {limit} and output size is {current}"
            ),
            Self::MismatchedStoredLen(len, nlen) =>
            {
                writeln!(f, "Stored block length {len} does not match check {nlen}")
            }
            Self::MismatchedAdler(expected, found) =>
            {
                writeln!(f, "Mismatched Adler, expected {expected} but found {found}")
            }
            Self::CorruptDistance(distance, available) => writeln!(
                f,
                "Back-reference distance {distance} exceeds {available} decoded bytes"
            )
        }
    }
}

/// Errors the encode side can raise.
///
/// These all come from configuration, the encoder accepts every
/// possible input buffer.
pub enum EncodeErrorStatus
{
    /// Window size is not a power of two
    WindowNotPowerOfTwo(usize),
    /// Window size is outside 256..=32768
    WindowOutOfRange(usize),
    Generic(&'static str),
    GenericStr(String)
}

impl Debug for EncodeErrorStatus
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result
    {
        match self
        {
            Self::WindowNotPowerOfTwo(size) =>
            {
                writeln!(f, "Window size {size} is not a power of two")
            }
            Self::WindowOutOfRange(size) =>
            {
                writeln!(f, "Window size {size} is outside the range 256..=32768")
            }
            Self::Generic(reason) => writeln!(f, "{reason}"),
            Self::GenericStr(reason) => writeln!(f, "{reason}")
        }
    }
}
