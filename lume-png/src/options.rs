//! Decoder and encoder options.

use bitflags::bitflags;
use lume_inflate::{DeflateEncodeOptions, DeflateOptions};

use crate::color::ColorMode;
use crate::enums::{FilterStrategy, InterlaceMethod};

fn decoder_strict_mode() -> DecoderFlags
{
    let mut flags = DecoderFlags::empty();

    flags.set(DecoderFlags::CONFIRM_CRC, true);
    flags.set(DecoderFlags::CONFIRM_ADLER, true);
    flags.set(DecoderFlags::READ_TEXT_CHUNKS, true);
    flags.set(DecoderFlags::COLOR_CONVERT, true);

    flags
}

/// Error resilient and fast: skips checksum verification.
fn fast_options() -> DecoderFlags
{
    let mut flags = decoder_strict_mode();

    flags.set(DecoderFlags::CONFIRM_CRC, false);
    flags.set(DecoderFlags::CONFIRM_ADLER, false);

    flags
}

bitflags! {
    /// Decoder options that are flags
    pub struct DecoderFlags: u32 {
        /// Whether chunk CRCs are verified; a mismatch is a hard error.
        const CONFIRM_CRC             = 0b0000_0001;
        /// Whether the IDAT zlib Adler-32 trailer is verified.
        const CONFIRM_ADLER           = 0b0000_0010;
        /// Whether unknown ancillary chunks are retained verbatim in
        /// [`PngInfo`](crate::PngInfo) instead of skipped.
        const REMEMBER_UNKNOWN_CHUNKS = 0b0000_0100;
        /// Whether tEXt/zTXt/iTXt chunks are decoded at all.
        const READ_TEXT_CHUNKS        = 0b0000_1000;
        /// Whether decoded pixels are converted to the requested
        /// color mode; off means they stay in the stream's own mode.
        const COLOR_CONVERT           = 0b0001_0000;
    }
}

/// PNG decoder options.
#[derive(Clone, Debug)]
pub struct DecoderOptions
{
    max_width:     usize,
    max_height:    usize,
    /// Upper bound on a single decompressed text payload.
    max_text_size: usize,
    /// The color mode decoded pixels are returned in when color
    /// conversion is on.
    out_color:     ColorMode,
    inflate:       DeflateOptions,
    flags:         DecoderFlags
}

impl Default for DecoderOptions
{
    fn default() -> Self
    {
        DecoderOptions {
            max_width:     1 << 14,
            max_height:    1 << 14,
            max_text_size: 16 << 20,
            out_color:     ColorMode::default(),
            inflate:       DeflateOptions::default(),
            flags:         decoder_strict_mode()
        }
    }
}

impl DecoderOptions
{
    /// Strict options, the same as `default`: all checksums verified.
    pub fn new_safe() -> DecoderOptions
    {
        DecoderOptions::default()
    }

    /// Lenient options for bulk work: checksum failures are ignored.
    pub fn new_fast() -> DecoderOptions
    {
        let mut options = DecoderOptions::default();
        options.flags = fast_options();
        options
    }

    pub const fn get_max_width(&self) -> usize
    {
        self.max_width
    }
    pub fn set_max_width(mut self, width: usize) -> Self
    {
        self.max_width = width;
        self
    }

    pub const fn get_max_height(&self) -> usize
    {
        self.max_height
    }
    pub fn set_max_height(mut self, height: usize) -> Self
    {
        self.max_height = height;
        self
    }

    pub const fn get_max_text_size(&self) -> usize
    {
        self.max_text_size
    }
    pub fn set_max_text_size(mut self, size: usize) -> Self
    {
        self.max_text_size = size;
        self
    }

    pub fn get_out_color_mode(&self) -> &ColorMode
    {
        &self.out_color
    }
    /// Set the color mode `decode` returns pixels in. Default RGBA
    /// with eight bits per channel.
    pub fn set_out_color_mode(mut self, mode: ColorMode) -> Self
    {
        self.out_color = mode;
        self
    }

    pub const fn get_inflate_options(&self) -> DeflateOptions
    {
        self.inflate
    }
    /// Options handed to the zlib stage, including any custom
    /// decompressor hook.
    pub fn set_inflate_options(mut self, options: DeflateOptions) -> Self
    {
        self.inflate = options;
        self
    }

    pub const fn get_confirm_crc(&self) -> bool
    {
        self.flags.contains(DecoderFlags::CONFIRM_CRC)
    }
    pub fn set_confirm_crc(mut self, yes: bool) -> Self
    {
        self.flags.set(DecoderFlags::CONFIRM_CRC, yes);
        self
    }

    pub const fn get_confirm_adler(&self) -> bool
    {
        self.flags.contains(DecoderFlags::CONFIRM_ADLER)
    }
    pub fn set_confirm_adler(mut self, yes: bool) -> Self
    {
        self.flags.set(DecoderFlags::CONFIRM_ADLER, yes);
        self
    }

    pub const fn get_remember_unknown_chunks(&self) -> bool
    {
        self.flags.contains(DecoderFlags::REMEMBER_UNKNOWN_CHUNKS)
    }
    pub fn set_remember_unknown_chunks(mut self, yes: bool) -> Self
    {
        self.flags.set(DecoderFlags::REMEMBER_UNKNOWN_CHUNKS, yes);
        self
    }

    pub const fn get_read_text_chunks(&self) -> bool
    {
        self.flags.contains(DecoderFlags::READ_TEXT_CHUNKS)
    }
    pub fn set_read_text_chunks(mut self, yes: bool) -> Self
    {
        self.flags.set(DecoderFlags::READ_TEXT_CHUNKS, yes);
        self
    }

    pub const fn get_color_convert(&self) -> bool
    {
        self.flags.contains(DecoderFlags::COLOR_CONVERT)
    }
    pub fn set_color_convert(mut self, yes: bool) -> Self
    {
        self.flags.set(DecoderFlags::COLOR_CONVERT, yes);
        self
    }

    /// Set both checksum toggles at once.
    pub fn set_strict_mode(mut self, yes: bool) -> Self
    {
        let flags = DecoderFlags::CONFIRM_CRC | DecoderFlags::CONFIRM_ADLER;

        self.flags.set(flags, yes);
        self
    }
}

/// PNG encoder options.
#[derive(Clone, Debug)]
pub struct EncoderOptions
{
    width:               usize,
    height:              usize,
    /// Layout of the raw pixels handed to the encoder.
    raw_color:           ColorMode,
    /// Stream color mode used when auto-convert is off; `None` means
    /// encode in the raw mode unchanged.
    png_color:           Option<ColorMode>,
    auto_convert:        bool,
    interlace:           InterlaceMethod,
    filter_strategy:     FilterStrategy,
    filter_palette_zero: bool,
    predefined_filters:  Vec<u8>,
    add_id:              bool,
    text_compression:    bool,
    deflate:             DeflateEncodeOptions
}

impl Default for EncoderOptions
{
    fn default() -> Self
    {
        EncoderOptions {
            width:               0,
            height:              0,
            raw_color:           ColorMode::default(),
            png_color:           None,
            auto_convert:        true,
            interlace:           InterlaceMethod::Standard,
            filter_strategy:     FilterStrategy::MinSum,
            filter_palette_zero: true,
            predefined_filters:  Vec::new(),
            add_id:              false,
            text_compression:    true,
            deflate:             DeflateEncodeOptions::default()
        }
    }
}

impl EncoderOptions
{
    /// Start from dimensions and the raw pixel layout, the two things
    /// every encode needs.
    pub fn new(width: usize, height: usize, raw_color: ColorMode) -> EncoderOptions
    {
        let mut options = EncoderOptions::default();

        options.width = width;
        options.height = height;
        options.raw_color = raw_color;
        options
    }

    pub const fn get_width(&self) -> usize
    {
        self.width
    }
    pub const fn get_height(&self) -> usize
    {
        self.height
    }
    pub fn get_raw_color(&self) -> &ColorMode
    {
        &self.raw_color
    }
    pub fn get_png_color(&self) -> Option<&ColorMode>
    {
        self.png_color.as_ref()
    }
    /// Force the stream color mode; only honored when auto-convert is
    /// off.
    pub fn set_png_color(mut self, mode: ColorMode) -> Self
    {
        self.png_color = Some(mode);
        self
    }

    pub const fn get_auto_convert(&self) -> bool
    {
        self.auto_convert
    }
    /// Whether the encoder scans the image and picks the smallest
    /// lossless stream mode itself.
    pub fn set_auto_convert(mut self, yes: bool) -> Self
    {
        self.auto_convert = yes;
        self
    }

    pub const fn get_interlace(&self) -> InterlaceMethod
    {
        self.interlace
    }
    pub fn set_interlace(mut self, method: InterlaceMethod) -> Self
    {
        self.interlace = method;
        self
    }

    pub const fn get_filter_strategy(&self) -> FilterStrategy
    {
        self.filter_strategy
    }
    pub fn set_filter_strategy(mut self, strategy: FilterStrategy) -> Self
    {
        self.filter_strategy = strategy;
        self
    }

    pub const fn get_filter_palette_zero(&self) -> bool
    {
        self.filter_palette_zero
    }
    /// Palette and sub-byte images force filter zero; higher filters
    /// only hurt compression on indexed data.
    pub fn set_filter_palette_zero(mut self, yes: bool) -> Self
    {
        self.filter_palette_zero = yes;
        self
    }

    pub fn get_predefined_filters(&self) -> &[u8]
    {
        &self.predefined_filters
    }
    /// One filter byte per scanline, used by
    /// [`FilterStrategy::Predefined`]. For interlaced images the
    /// sequence restarts at each pass.
    pub fn set_predefined_filters(mut self, filters: Vec<u8>) -> Self
    {
        self.predefined_filters = filters;
        self
    }

    pub const fn get_add_id(&self) -> bool
    {
        self.add_id
    }
    /// Append a `Software` identification text chunk.
    pub fn set_add_id(mut self, yes: bool) -> Self
    {
        self.add_id = yes;
        self
    }

    pub const fn get_text_compression(&self) -> bool
    {
        self.text_compression
    }
    /// Prefer zTXt over tEXt for latin-1 text payloads.
    pub fn set_text_compression(mut self, yes: bool) -> Self
    {
        self.text_compression = yes;
        self
    }

    pub const fn get_deflate_options(&self) -> DeflateEncodeOptions
    {
        self.deflate
    }
    /// Options handed to the zlib stage for IDAT and compressed text,
    /// including any custom compressor hook.
    pub fn set_deflate_options(mut self, options: DeflateEncodeOptions) -> Self
    {
        self.deflate = options;
        self
    }
}
