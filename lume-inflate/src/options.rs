//! Decoder and encoder options.
//!
//! Both option structs use consuming builder setters so a
//! configuration reads as one expression:
//!
//! ```
//! use lume_inflate::DeflateOptions;
//!
//! let options = DeflateOptions::default()
//!     .set_limit(1 << 20)
//!     .set_confirm_adler(false);
//! # let _ = options;
//! ```

use crate::constants::DEFLATE_MAX_WINDOW_SIZE;
use crate::errors::{EncodeErrorStatus, InflateDecodeErrors};

/// Replacement for the built-in zlib stage: a plain function taking
/// the byte buffer and the recognized options.
///
/// Context, if any, must live in the function itself (statics or
/// thread locals); the options structs stay `Copy`.
pub type CustomDecompressor = fn(&[u8], &DeflateOptions) -> Result<Vec<u8>, InflateDecodeErrors>;
pub type CustomCompressor =
    fn(&[u8], &DeflateEncodeOptions) -> Result<Vec<u8>, EncodeErrorStatus>;

/// Options for the inflate side.
#[derive(Copy, Clone, Debug)]
pub struct DeflateOptions
{
    limit:          usize,
    confirm_adler:  bool,
    inspect_blocks: bool,
    custom_zlib:    Option<CustomDecompressor>
}

impl Default for DeflateOptions
{
    fn default() -> Self
    {
        DeflateOptions {
            limit:          usize::MAX,
            confirm_adler:  true,
            inspect_blocks: false,
            custom_zlib:    None
        }
    }
}

impl DeflateOptions
{
    /// Get the output size above which decoding fails with
    /// `OutputLimitExceeded`.
    pub const fn get_limit(&self) -> usize
    {
        self.limit
    }
    /// Set the maximum size of the decompressed output.
    ///
    /// Callers that know the exact expected size (e.g. a PNG decoder
    /// that computed the scanline buffer size) should set it, both as
    /// a zip-bomb guard and to pre-size the output in one allocation.
    pub fn set_limit(mut self, limit: usize) -> Self
    {
        self.limit = limit;
        self
    }

    /// Whether the zlib Adler-32 trailer is verified against the
    /// decoded output.
    pub const fn get_confirm_adler(&self) -> bool
    {
        self.confirm_adler
    }
    /// Set whether the inflate decoder should confirm
    /// adler checksums
    pub fn set_confirm_adler(mut self, yes: bool) -> Self
    {
        self.confirm_adler = yes;
        self
    }

    /// Whether per-block structure is recorded during decoding,
    /// see [`crate::extract_zlib_info`].
    pub const fn get_inspect_blocks(&self) -> bool
    {
        self.inspect_blocks
    }
    pub fn set_inspect_blocks(mut self, yes: bool) -> Self
    {
        self.inspect_blocks = yes;
        self
    }

    pub const fn get_custom_zlib(&self) -> Option<CustomDecompressor>
    {
        self.custom_zlib
    }
    /// Substitute the whole zlib decompression stage.
    ///
    /// Only honored by [`crate::zlib_decompress`] and by callers that
    /// check it (the PNG decoder does); errors from the hook propagate
    /// unchanged.
    pub fn set_custom_zlib(mut self, hook: CustomDecompressor) -> Self
    {
        self.custom_zlib = Some(hook);
        self
    }
}

/// How the deflate encoder represents blocks.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DeflateEncodingStrategy
{
    /// Stored blocks only, no entropy coding.
    NoCompression,
    /// The fixed RFC 1951 code tables.
    Fixed,
    /// Per-block code tables built from symbol frequencies; falls
    /// back to fixed or stored when those are estimated smaller.
    Dynamic
}

impl DeflateEncodingStrategy
{
    /// Compression level hint stored in the zlib FLG byte.
    pub(crate) fn to_level(self) -> u8
    {
        match self
        {
            Self::NoCompression => 0,
            Self::Fixed => 1,
            Self::Dynamic => 2
        }
    }
}

/// Options for the deflate side.
#[derive(Copy, Clone, Debug)]
pub struct DeflateEncodeOptions
{
    strategy:      DeflateEncodingStrategy,
    use_lz77:      bool,
    window_size:   usize,
    min_match:     usize,
    nice_match:    usize,
    lazy_matching: bool,
    /// 0 means pick automatically from the input size.
    block_size:    usize,
    custom_zlib:   Option<CustomCompressor>
}

impl Default for DeflateEncodeOptions
{
    fn default() -> Self
    {
        DeflateEncodeOptions {
            strategy:      DeflateEncodingStrategy::Dynamic,
            use_lz77:      true,
            window_size:   2048,
            min_match:     3,
            nice_match:    128,
            lazy_matching: true,
            block_size:    0,
            custom_zlib:   None
        }
    }
}

impl DeflateEncodeOptions
{
    pub const fn get_strategy(&self) -> DeflateEncodingStrategy
    {
        self.strategy
    }
    pub fn set_strategy(mut self, strategy: DeflateEncodingStrategy) -> Self
    {
        self.strategy = strategy;
        self
    }

    pub const fn get_use_lz77(&self) -> bool
    {
        self.use_lz77
    }
    /// Disable the match finder, emitting every byte as a literal.
    ///
    /// Entropy coding still applies; this is the "huffman only" mode.
    pub fn set_use_lz77(mut self, yes: bool) -> Self
    {
        self.use_lz77 = yes;
        self
    }

    pub const fn get_window_size(&self) -> usize
    {
        self.window_size
    }
    /// Set the back-reference window. Must be a power of two in
    /// 256..=32768; validated when encoding starts.
    pub fn set_window_size(mut self, window_size: usize) -> Self
    {
        self.window_size = window_size;
        self
    }

    pub const fn get_min_match(&self) -> usize
    {
        self.min_match
    }
    pub fn set_min_match(mut self, min_match: usize) -> Self
    {
        self.min_match = min_match;
        self
    }

    pub const fn get_nice_match(&self) -> usize
    {
        self.nice_match
    }
    /// A match at least this long stops the chain walk early.
    pub fn set_nice_match(mut self, nice_match: usize) -> Self
    {
        self.nice_match = nice_match;
        self
    }

    pub const fn get_lazy_matching(&self) -> bool
    {
        self.lazy_matching
    }
    pub fn set_lazy_matching(mut self, yes: bool) -> Self
    {
        self.lazy_matching = yes;
        self
    }

    pub const fn get_block_size(&self) -> usize
    {
        self.block_size
    }
    pub fn set_block_size(mut self, block_size: usize) -> Self
    {
        self.block_size = block_size;
        self
    }

    pub const fn get_custom_zlib(&self) -> Option<CustomCompressor>
    {
        self.custom_zlib
    }
    /// Substitute the whole zlib compression stage, see
    /// [`crate::zlib_compress`].
    pub fn set_custom_zlib(mut self, hook: CustomCompressor) -> Self
    {
        self.custom_zlib = Some(hook);
        self
    }

    /// Check the window configuration before encoding.
    pub(crate) fn validate(&self) -> Result<(), EncodeErrorStatus>
    {
        if !self.window_size.is_power_of_two()
        {
            return Err(EncodeErrorStatus::WindowNotPowerOfTwo(self.window_size));
        }
        if !(256..=DEFLATE_MAX_WINDOW_SIZE).contains(&self.window_size)
        {
            return Err(EncodeErrorStatus::WindowOutOfRange(self.window_size));
        }
        Ok(())
    }
}
