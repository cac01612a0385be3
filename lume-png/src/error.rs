use std::fmt::{Debug, Formatter};

use lume_inflate::errors::{DecodeErrorStatus, EncodeErrorStatus, InflateDecodeErrors};

use crate::enums::PngColor;

pub enum PngDecodeErrors
{
    BadSignature,
    GenericStatic(&'static str),
    Generic(String),
    BadCrc(u32, u32),
    /// A critical chunk the decoder does not understand.
    UnknownCriticalChunk([u8; 4]),
    /// A known chunk appeared in a position the specification forbids.
    OutOfOrderChunk(&'static str),
    ZlibDecodeErrors(DecodeErrorStatus),
    /// Width, height and the configured limit.
    TooLargeDimensions(usize, usize, usize)
}

impl Debug for PngDecodeErrors
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result
    {
        match self
        {
            Self::BadSignature => writeln!(f, "Bad PNG signature, not a png"),
            Self::GenericStatic(val) => writeln!(f, "{val}"),
            Self::Generic(val) => writeln!(f, "{val}"),
            Self::BadCrc(expected, found) => writeln!(
                f,
                "CRC does not match, expected {expected} but found {found}",
            ),
            Self::UnknownCriticalChunk(name) =>
            {
                let name = core::str::from_utf8(name).unwrap_or("XXXX");
                writeln!(f, "Unknown critical chunk {name}")
            }
            Self::OutOfOrderChunk(reason) =>
            {
                writeln!(f, "Chunk out of order: {reason}")
            }
            Self::ZlibDecodeErrors(err) =>
            {
                writeln!(f, "Error decoding idat chunks {err:?}")
            }
            Self::TooLargeDimensions(width, height, limit) => writeln!(
                f,
                "Image dimensions {width}x{height} exceed the configured limit {limit}"
            )
        }
    }
}

impl From<&'static str> for PngDecodeErrors
{
    fn from(val: &'static str) -> Self
    {
        Self::GenericStatic(val)
    }
}

impl From<String> for PngDecodeErrors
{
    fn from(val: String) -> Self
    {
        Self::Generic(val)
    }
}

impl From<DecodeErrorStatus> for PngDecodeErrors
{
    fn from(val: DecodeErrorStatus) -> Self
    {
        Self::ZlibDecodeErrors(val)
    }
}

impl From<InflateDecodeErrors> for PngDecodeErrors
{
    fn from(val: InflateDecodeErrors) -> Self
    {
        Self::ZlibDecodeErrors(val.error)
    }
}

pub enum PngEncodeErrors
{
    /// Width or height is zero.
    ZeroDimensions,
    /// The raw buffer is smaller than the dimensions require.
    TooShortInput(usize, usize),
    /// Color type and bit depth cannot be combined in a PNG stream.
    InvalidColorCombination(PngColor, u8),
    /// Encoding to palette hit a pixel whose color is not an entry.
    ColorNotInPalette(u8, u8, u8, u8),
    /// Palette mode with no palette, or more than 256 entries.
    BadPalette(usize),
    /// A text keyword failed validation.
    BadKeyword(&'static str),
    ZlibEncodeErrors(EncodeErrorStatus),
    GenericStatic(&'static str),
    Generic(String)
}

impl Debug for PngEncodeErrors
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result
    {
        match self
        {
            Self::ZeroDimensions => writeln!(f, "Width and height cannot be zero"),
            Self::TooShortInput(expected, found) => writeln!(
                f,
                "Too short input, expected {expected} bytes but found {found}"
            ),
            Self::InvalidColorCombination(color, depth) =>
            {
                writeln!(f, "Invalid color type {color:?} and bit depth {depth}")
            }
            Self::ColorNotInPalette(r, g, b, a) =>
            {
                writeln!(f, "Color ({r},{g},{b},{a}) has no palette entry")
            }
            Self::BadPalette(size) => writeln!(f, "Invalid palette size {size}"),
            Self::BadKeyword(reason) => writeln!(f, "Invalid text keyword: {reason}"),
            Self::ZlibEncodeErrors(err) => writeln!(f, "Error compressing data {err:?}"),
            Self::GenericStatic(val) => writeln!(f, "{val}"),
            Self::Generic(val) => writeln!(f, "{val}")
        }
    }
}

impl From<&'static str> for PngEncodeErrors
{
    fn from(val: &'static str) -> Self
    {
        Self::GenericStatic(val)
    }
}

impl From<String> for PngEncodeErrors
{
    fn from(val: String) -> Self
    {
        Self::Generic(val)
    }
}

impl From<EncodeErrorStatus> for PngEncodeErrors
{
    fn from(val: EncodeErrorStatus) -> Self
    {
        Self::ZlibEncodeErrors(val)
    }
}

impl From<PngEncodeErrors> for PngDecodeErrors
{
    fn from(val: PngEncodeErrors) -> Self
    {
        PngDecodeErrors::Generic(format!("{val:?}"))
    }
}
