//! The encode pipeline: color conversion → interlace → filter →
//! deflate → chunk emission.

use log::warn;
use lume_inflate::zlib_compress;

use crate::adam7;
use crate::color::{
    auto_choose_color, convert, linebits_exact, linebytes_rounded, ColorMode
};
use crate::constants::{MAX_CHUNK_LENGTH, PNG_SIGNATURE};
use crate::chunks::write_chunk;
use crate::decoder::{Background, PngInfo};
use crate::enums::{FilterStrategy, FilterType, InterlaceMethod, PngColor};
use crate::error::PngEncodeErrors;
use crate::filters::{entropy, filter_scanline};
use crate::options::EncoderOptions;
use crate::text::{string_to_latin1, validate_keyword};

/// The value of the identification text chunk `add_id` appends.
const ID_KEYWORD: &str = "Software";
const ID_TEXT: &str = concat!("lume-png ", env!("CARGO_PKG_VERSION"));

pub struct PngEncoder<'a>
{
    data:    &'a [u8],
    options: EncoderOptions,
    info:    PngInfo
}

impl<'a> PngEncoder<'a>
{
    pub fn new(data: &'a [u8], options: EncoderOptions) -> PngEncoder<'a>
    {
        PngEncoder {
            data,
            options,
            info: PngInfo::default()
        }
    }

    /// Attach ancillary metadata (background, physical size, time,
    /// text, retained unknown chunks) to embed in the stream.
    ///
    /// Dimensions and color modes inside `info` are ignored; those
    /// come from the encoder options.
    pub fn set_info(&mut self, info: PngInfo)
    {
        self.info = info;
    }

    pub fn encode(&mut self) -> Result<Vec<u8>, PngEncodeErrors>
    {
        let width = self.options.get_width();
        let height = self.options.get_height();

        if width == 0 || height == 0
        {
            return Err(PngEncodeErrors::ZeroDimensions);
        }

        let raw_mode = self.options.get_raw_color().clone();

        raw_mode.check_validity()?;

        let expected = raw_mode.raw_size(width, height);

        if self.data.len() < expected
        {
            return Err(PngEncodeErrors::TooShortInput(expected, self.data.len()));
        }

        let png_mode = if self.options.get_auto_convert()
        {
            auto_choose_color(&self.data[..expected], width, height, &raw_mode)?
        }
        else
        {
            self.options
                .get_png_color()
                .cloned()
                .unwrap_or_else(|| raw_mode.clone())
        };

        png_mode.check_validity()?;

        if png_mode.colortype == PngColor::Palette && png_mode.palette().is_empty()
        {
            return Err(PngEncodeErrors::BadPalette(0));
        }

        // bring the pixels into the stream mode
        let converted;
        let image: &[u8] = if png_mode != raw_mode
        {
            let mut buffer = vec![0_u8; png_mode.raw_size(width, height)];

            convert(&mut buffer, self.data, &png_mode, &raw_mode, width, height)?;

            converted = buffer;
            &converted
        }
        else
        {
            &self.data[..expected]
        };

        let filtered = self.filter_image(image, width, height, &png_mode)?;
        let idat = zlib_compress(&filtered, &self.options.get_deflate_options())?;

        // assemble the chunk stream
        let mut out = Vec::with_capacity(idat.len() + 1024);

        out.extend_from_slice(&PNG_SIGNATURE.to_be_bytes());

        self.add_chunk_ihdr(&mut out, width, height, &png_mode);
        out.extend_from_slice(&self.info.unknown_chunks[0]);

        if png_mode.colortype == PngColor::Palette
            || (!png_mode.palette().is_empty()
                && matches!(png_mode.colortype, PngColor::RGB | PngColor::RGBA))
        {
            add_chunk_plte(&mut out, &png_mode);
        }
        add_chunk_trns(&mut out, &png_mode);

        self.add_chunk_bkgd(&mut out, &png_mode);
        self.add_chunk_phys(&mut out);

        out.extend_from_slice(&self.info.unknown_chunks[1]);

        for segment in idat.chunks(MAX_CHUNK_LENGTH)
        {
            write_chunk(&mut out, *b"IDAT", segment);
        }

        self.add_chunk_time(&mut out);
        self.add_text_chunks(&mut out)?;

        out.extend_from_slice(&self.info.unknown_chunks[2]);

        write_chunk(&mut out, *b"IEND", &[]);

        Ok(out)
    }

    fn add_chunk_ihdr(&self, out: &mut Vec<u8>, width: usize, height: usize, mode: &ColorMode)
    {
        let mut payload = Vec::with_capacity(13);

        payload.extend_from_slice(&(width as u32).to_be_bytes());
        payload.extend_from_slice(&(height as u32).to_be_bytes());
        payload.push(mode.depth());
        payload.push(mode.colortype.to_int());
        // compression and filter method have a single defined value
        payload.push(0);
        payload.push(0);
        payload.push(self.options.get_interlace().to_int());

        write_chunk(out, *b"IHDR", &payload);
    }

    fn add_chunk_bkgd(&self, out: &mut Vec<u8>, mode: &ColorMode)
    {
        let Some(background) = self.info.background
        else
        {
            return;
        };

        // the stored form must match the stream's color type; after a
        // mode change the background no longer applies
        let payload: Vec<u8> = match (background, mode.colortype)
        {
            (Background::Palette(index), PngColor::Palette)
                if usize::from(index) < mode.palette().len() =>
            {
                vec![index]
            }
            (Background::Grey(grey), PngColor::Luma | PngColor::LumaA) =>
            {
                grey.to_be_bytes().to_vec()
            }
            (Background::Rgb(r, g, b), PngColor::RGB | PngColor::RGBA) =>
            {
                let mut payload = Vec::with_capacity(6);
                payload.extend_from_slice(&r.to_be_bytes());
                payload.extend_from_slice(&g.to_be_bytes());
                payload.extend_from_slice(&b.to_be_bytes());
                payload
            }
            _ =>
            {
                warn!("Dropping bKGD, it no longer matches the stream color type");
                return;
            }
        };

        write_chunk(out, *b"bKGD", &payload);
    }

    fn add_chunk_phys(&self, out: &mut Vec<u8>)
    {
        if let Some(phys) = self.info.phys
        {
            let mut payload = Vec::with_capacity(9);

            payload.extend_from_slice(&phys.x.to_be_bytes());
            payload.extend_from_slice(&phys.y.to_be_bytes());
            payload.push(phys.unit);

            write_chunk(out, *b"pHYs", &payload);
        }
    }

    fn add_chunk_time(&self, out: &mut Vec<u8>)
    {
        if let Some(time) = self.info.time
        {
            let mut payload = Vec::with_capacity(7);

            payload.extend_from_slice(&time.year.to_be_bytes());
            payload.push(time.month);
            payload.push(time.day);
            payload.push(time.hour);
            payload.push(time.minute);
            payload.push(time.second);

            write_chunk(out, *b"tIME", &payload);
        }
    }

    fn add_text_chunks(&self, out: &mut Vec<u8>) -> Result<(), PngEncodeErrors>
    {
        for text in &self.info.texts
        {
            validate_keyword(&text.keyword)?;

            if self.options.get_text_compression()
            {
                add_chunk_ztxt(out, text, &self.options)?;
            }
            else
            {
                add_chunk_text(out, text)?;
            }
        }

        if self.options.get_add_id()
        {
            let already_added = self.info.texts.iter().any(|t| t.keyword == ID_KEYWORD);

            if !already_added
            {
                // short enough that tEXt beats zTXt
                let id = crate::text::TextChunk {
                    keyword: ID_KEYWORD.to_string(),
                    text:    ID_TEXT.to_string()
                };
                add_chunk_text(out, &id)?;
            }
        }

        for itext in &self.info.itexts
        {
            validate_keyword(&itext.keyword)?;
            add_chunk_itxt(out, itext, &self.options)?;
        }
        Ok(())
    }

    /// Interlace if requested and filter every pass, returning the
    /// scanline stream IDAT compresses.
    fn filter_image(
        &self, image: &[u8], width: usize, height: usize, mode: &ColorMode
    ) -> Result<Vec<u8>, PngEncodeErrors>
    {
        let bpp = mode.bpp();

        let mut chooser = FilterChooser::new(mode, &self.options);
        let mut out = Vec::with_capacity(height * (1 + linebytes_rounded(width, bpp)));

        match self.options.get_interlace()
        {
            InterlaceMethod::Standard =>
            {
                filter_pass(&mut out, image, width, height, bpp, &mut chooser)?;
            }
            InterlaceMethod::Adam7 =>
            {
                let passes = adam7::pass_values(width, height, bpp);

                let packed_size: usize = passes.iter().map(|p| p.packed_len).sum();
                let mut packed = vec![0_u8; packed_size];

                adam7::interlace(&mut packed, image, width, height, bpp);

                let mut offset = 0;

                for pass in &passes
                {
                    if pass.w == 0 || pass.h == 0
                    {
                        continue;
                    }
                    chooser.start_pass();
                    filter_pass(
                        &mut out,
                        &packed[offset..offset + pass.packed_len],
                        pass.w,
                        pass.h,
                        bpp,
                        &mut chooser
                    )?;
                    offset += pass.packed_len;
                }
            }
        }
        Ok(out)
    }
}

fn add_chunk_plte(out: &mut Vec<u8>, mode: &ColorMode)
{
    let mut payload = Vec::with_capacity(mode.palette().len() * 3);

    for entry in mode.palette()
    {
        payload.push(entry.red);
        payload.push(entry.green);
        payload.push(entry.blue);
    }
    write_chunk(out, *b"PLTE", &payload);
}

fn add_chunk_trns(out: &mut Vec<u8>, mode: &ColorMode)
{
    match mode.colortype
    {
        PngColor::Palette =>
        {
            // emit only up to the last translucent entry
            let amount = mode
                .palette()
                .iter()
                .rposition(|e| e.alpha != 255)
                .map(|pos| pos + 1)
                .unwrap_or(0);

            if amount > 0
            {
                let payload: Vec<u8> =
                    mode.palette()[..amount].iter().map(|e| e.alpha).collect();

                write_chunk(out, *b"tRNS", &payload);
            }
        }
        PngColor::Luma =>
        {
            if let Some((grey, _, _)) = mode.key()
            {
                write_chunk(out, *b"tRNS", &grey.to_be_bytes());
            }
        }
        PngColor::RGB =>
        {
            if let Some((r, g, b)) = mode.key()
            {
                let mut payload = Vec::with_capacity(6);

                payload.extend_from_slice(&r.to_be_bytes());
                payload.extend_from_slice(&g.to_be_bytes());
                payload.extend_from_slice(&b.to_be_bytes());

                write_chunk(out, *b"tRNS", &payload);
            }
        }
        _ => ()
    }
}

fn add_chunk_text(
    out: &mut Vec<u8>, text: &crate::text::TextChunk
) -> Result<(), PngEncodeErrors>
{
    let mut payload = string_to_latin1(&text.keyword)?;

    payload.push(0);
    payload.extend_from_slice(&string_to_latin1(&text.text)?);

    write_chunk(out, *b"tEXt", &payload);
    Ok(())
}

fn add_chunk_ztxt(
    out: &mut Vec<u8>, text: &crate::text::TextChunk, options: &EncoderOptions
) -> Result<(), PngEncodeErrors>
{
    let mut payload = string_to_latin1(&text.keyword)?;

    payload.push(0);
    // compression method, 0 is zlib
    payload.push(0);

    let compressed =
        zlib_compress(&string_to_latin1(&text.text)?, &options.get_deflate_options())?;

    payload.extend_from_slice(&compressed);

    write_chunk(out, *b"zTXt", &payload);
    Ok(())
}

fn add_chunk_itxt(
    out: &mut Vec<u8>, itext: &crate::text::ItxtChunk, options: &EncoderOptions
) -> Result<(), PngEncodeErrors>
{
    let compress = options.get_text_compression();

    let mut payload = string_to_latin1(&itext.keyword)?;

    payload.push(0);
    payload.push(u8::from(compress));
    payload.push(0);
    payload.extend_from_slice(itext.language_tag.as_bytes());
    payload.push(0);
    payload.extend_from_slice(itext.translated_keyword.as_bytes());
    payload.push(0);

    if compress
    {
        let compressed =
            zlib_compress(itext.text.as_bytes(), &options.get_deflate_options())?;

        payload.extend_from_slice(&compressed);
    }
    else
    {
        payload.extend_from_slice(itext.text.as_bytes());
    }

    write_chunk(out, *b"iTXt", &payload);
    Ok(())
}

/// Per-scanline filter selection state, shared across passes.
struct FilterChooser
{
    strategy:   FilterStrategy,
    bytewidth:  usize,
    predefined: Vec<u8>,
    /// Scanline index within the current pass, for predefined
    /// filters.
    line_index: usize,
    deflate:    lume_inflate::DeflateEncodeOptions
}

impl FilterChooser
{
    fn new(mode: &ColorMode, options: &EncoderOptions) -> FilterChooser
    {
        // palette and sub-byte images compress better unfiltered
        let strategy = if options.get_filter_palette_zero()
            && (mode.colortype == PngColor::Palette || mode.depth() < 8)
        {
            FilterStrategy::Zero
        }
        else
        {
            options.get_filter_strategy()
        };

        FilterChooser {
            strategy,
            bytewidth: (mode.bpp() + 7) / 8,
            predefined: options.get_predefined_filters().to_vec(),
            line_index: 0,
            deflate: options.get_deflate_options()
        }
    }

    fn start_pass(&mut self)
    {
        self.line_index = 0;
    }

    /// Append the chosen filter byte and the filtered line to `out`.
    fn filter_line(
        &mut self, out: &mut Vec<u8>, line: &[u8], prevline: Option<&[u8]>
    ) -> Result<(), PngEncodeErrors>
    {
        const ALL_FILTERS: [FilterType; 5] = [
            FilterType::None,
            FilterType::Sub,
            FilterType::Up,
            FilterType::Average,
            FilterType::Paeth
        ];

        let linebytes = line.len();

        match self.strategy
        {
            FilterStrategy::Zero =>
            {
                out.push(0);
                out.extend_from_slice(line);
            }
            FilterStrategy::Predefined =>
            {
                let filter_byte = self.predefined.get(self.line_index).copied().unwrap_or(0);
                let filter = FilterType::from_int(filter_byte).ok_or(
                    PngEncodeErrors::GenericStatic("Predefined filter byte out of range")
                )?;

                out.push(filter_byte);

                let start = out.len();
                out.resize(start + linebytes, 0);
                filter_scanline(&mut out[start..], line, prevline, self.bytewidth, filter);
            }
            FilterStrategy::MinSum =>
            {
                let mut best = vec![0_u8; 1 + linebytes];
                let mut attempt = vec![0_u8; 1 + linebytes];
                let mut smallest = 0_usize;

                for filter in ALL_FILTERS
                {
                    attempt[0] = filter.to_int();
                    filter_scanline(&mut attempt[1..], line, prevline, self.bytewidth, filter);

                    // filter 0 is no difference, so its bytes are
                    // unsigned; the rest are signed differences
                    let sum: usize = if filter == FilterType::None
                    {
                        attempt.iter().map(|s| usize::from(*s)).sum()
                    }
                    else
                    {
                        attempt
                            .iter()
                            .map(|s| usize::from(if *s < 128 { *s } else { 255 - *s }))
                            .sum()
                    };

                    if filter == FilterType::None || sum < smallest
                    {
                        smallest = sum;
                        core::mem::swap(&mut attempt, &mut best);
                    }
                }
                out.extend_from_slice(&best);
            }
            FilterStrategy::Entropy =>
            {
                let mut best = vec![0_u8; 1 + linebytes];
                let mut attempt = vec![0_u8; 1 + linebytes];
                let mut smallest = 0_f32;

                for filter in ALL_FILTERS
                {
                    attempt[0] = filter.to_int();
                    filter_scanline(&mut attempt[1..], line, prevline, self.bytewidth, filter);

                    let cost = entropy(&attempt);

                    if filter == FilterType::None || cost < smallest
                    {
                        smallest = cost;
                        core::mem::swap(&mut attempt, &mut best);
                    }
                }
                out.extend_from_slice(&best);
            }
            FilterStrategy::BruteForce =>
            {
                let mut best = vec![0_u8; 1 + linebytes];
                let mut attempt = vec![0_u8; 1 + linebytes];
                let mut smallest = 0_usize;

                for filter in ALL_FILTERS
                {
                    attempt[0] = filter.to_int();
                    filter_scanline(&mut attempt[1..], line, prevline, self.bytewidth, filter);

                    let size = zlib_compress(&attempt, &self.deflate)?.len();

                    if filter == FilterType::None || size < smallest
                    {
                        smallest = size;
                        core::mem::swap(&mut attempt, &mut best);
                    }
                }
                out.extend_from_slice(&best);
            }
        }

        self.line_index += 1;
        Ok(())
    }
}

/// Filter one (sub-)image whose pixels are fully bit-packed in
/// `packed`.
fn filter_pass(
    out: &mut Vec<u8>, packed: &[u8], w: usize, h: usize, bpp: usize,
    chooser: &mut FilterChooser
) -> Result<(), PngEncodeErrors>
{
    let linebytes = linebytes_rounded(w, bpp);

    if linebytes == 0 || h == 0
    {
        return Ok(());
    }

    let needs_padding = bpp < 8 && linebits_exact(w, bpp) != linebytes * 8;

    if needs_padding
    {
        // rows are not byte aligned in the packed buffer; expand each
        // into a byte-padded scratch line before filtering
        let mut lines = vec![0_u8; 2 * linebytes];
        let (mut current, mut previous) = lines.split_at_mut(linebytes);

        for y in 0..h
        {
            core::mem::swap(&mut current, &mut previous);

            add_padding_bits_line(current, packed, linebits_exact(w, bpp), y);

            let prevline: Option<&[u8]> = if y > 0 { Some(&*previous) } else { None };

            chooser.filter_line(out, current, prevline)?;
        }
    }
    else
    {
        let mut prevline: Option<&[u8]> = None;

        for line in packed.chunks_exact(linebytes).take(h)
        {
            chooser.filter_line(out, line, prevline)?;
            prevline = Some(line);
        }
    }
    Ok(())
}

/// Expand row `y` of a fully packed sub-byte image into a byte padded
/// line.
fn add_padding_bits_line(out: &mut [u8], packed: &[u8], ilinebits: usize, y: usize)
{
    out.fill(0);

    for x in 0..ilinebits
    {
        let bit = adam7::read_bit(packed, y * ilinebits + x);

        adam7::set_bit0(out, x, bit);
    }
}
