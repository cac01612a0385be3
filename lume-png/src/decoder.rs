//! The decode pipeline: chunk stream → IDAT inflate → unfilter →
//! deinterlace → color conversion.

use log::trace;
use lume_core::bytestream::ByteReader;
use lume_inflate::zlib_decompress;

use crate::adam7;
use crate::color::{convert, linebits_exact, linebytes_rounded, ColorMode};
use crate::constants::{MAX_CHUNK_LENGTH, PNG_SIGNATURE};
use crate::enums::{ChunkPosition, FilterType, InterlaceMethod, PngChunkType};
use crate::error::PngDecodeErrors;
use crate::filters::{
    handle_avg, handle_avg_first, handle_paeth, handle_paeth_first, handle_sub, handle_up
};
use crate::options::DecoderOptions;
use crate::text::{ItxtChunk, TextChunk};

#[derive(Copy, Clone)]
pub(crate) struct PngChunk
{
    pub length:     usize,
    pub chunk_type: PngChunkType,
    pub chunk:      [u8; 4],
    pub crc:        u32
}

/// The last modification time from a tIME chunk.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TimeInfo
{
    pub year:   u16,
    pub month:  u8,
    pub day:    u8,
    pub hour:   u8,
    pub minute: u8,
    pub second: u8
}

/// Physical pixel dimensions from a pHYs chunk.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PhysInfo
{
    pub x:    u32,
    pub y:    u32,
    /// 0 is unspecified, 1 is meters.
    pub unit: u8
}

/// The preferred background color from a bKGD chunk, in the form the
/// stream's color type dictates.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Background
{
    Palette(u8),
    Grey(u16),
    Rgb(u16, u16, u16)
}

/// Everything the stream says about the image besides its pixels.
#[derive(Clone, Debug, Default)]
pub struct PngInfo
{
    pub width:  usize,
    pub height: usize,
    /// The color mode of the stream itself, not of the returned
    /// pixels.
    pub color: ColorMode,
    pub interlace_method: InterlaceMethod,
    pub background: Option<Background>,
    pub phys: Option<PhysInfo>,
    pub time: Option<TimeInfo>,
    /// Latin-1 pairs from tEXt and zTXt.
    pub texts: Vec<TextChunk>,
    /// International text from iTXt.
    pub itexts: Vec<ItxtChunk>,
    /// Unknown ancillary chunks retained verbatim (full framing),
    /// grouped by position class: before PLTE, between PLTE and
    /// IDAT, after IDAT.
    pub unknown_chunks: [Vec<u8>; 3]
}

pub struct PngDecoder<'a>
{
    pub(crate) stream:  ByteReader<'a>,
    pub(crate) options: DecoderOptions,
    pub(crate) png_info: PngInfo,
    pub(crate) idat_chunks: Vec<u8>,
    pub(crate) seen_hdr: bool,
    pub(crate) seen_plte: bool,
    pub(crate) seen_trns: bool,
    pub(crate) seen_idat: bool,
    pub(crate) previous_was_idat: bool,
    pub(crate) position_class: ChunkPosition,
    chunks_read: bool
}

impl<'a> PngDecoder<'a>
{
    pub fn new(data: &'a [u8]) -> PngDecoder<'a>
    {
        PngDecoder::new_with_options(data, DecoderOptions::default())
    }
    pub fn new_with_options(data: &'a [u8], options: DecoderOptions) -> PngDecoder<'a>
    {
        PngDecoder {
            stream: ByteReader::new(data),
            options,
            png_info: PngInfo::default(),
            idat_chunks: Vec::with_capacity(37),
            seen_hdr: false,
            seen_plte: false,
            seen_trns: false,
            seen_idat: false,
            previous_was_idat: false,
            position_class: ChunkPosition::BeforePlte,
            chunks_read: false
        }
    }

    pub const fn get_dimensions(&self) -> Option<(usize, usize)>
    {
        if !self.seen_hdr
        {
            return None;
        }
        Some((self.png_info.width, self.png_info.height))
    }
    pub fn get_depth(&self) -> Option<u8>
    {
        if !self.seen_hdr
        {
            return None;
        }
        Some(self.png_info.color.depth())
    }
    /// The color mode of the stream, available once IHDR was parsed.
    pub fn get_color_mode(&self) -> Option<&ColorMode>
    {
        if !self.seen_hdr
        {
            return None;
        }
        Some(&self.png_info.color)
    }
    /// Metadata gathered from the chunk stream.
    pub fn get_info(&self) -> Option<&PngInfo>
    {
        if !self.seen_hdr
        {
            return None;
        }
        Some(&self.png_info)
    }
    /// The mode `decode` returns pixels in under the current options.
    pub fn out_color_mode(&self) -> &ColorMode
    {
        if self.options.get_color_convert()
        {
            self.options.get_out_color_mode()
        }
        else
        {
            &self.png_info.color
        }
    }

    pub(crate) fn read_chunk_header(&mut self) -> Result<PngChunk, PngDecodeErrors>
    {
        // Format is length - chunk type - [data] - crc
        let chunk_length = self.stream.get_u32_be_err()? as usize;
        let chunk_type_int = self.stream.get_u32_be_err()?.to_be_bytes();

        if chunk_length > MAX_CHUNK_LENGTH
        {
            return Err(PngDecodeErrors::Generic(format!(
                "Chunk length {chunk_length} exceeds the format limit"
            )));
        }

        let mut crc_bytes = [0; 4];
        let crc_ref = self.stream.peek_at(chunk_length, 4)?;

        crc_bytes.copy_from_slice(crc_ref);

        let crc = u32::from_be_bytes(crc_bytes);

        let chunk_type = match &chunk_type_int
        {
            b"IHDR" => PngChunkType::IHDR,
            b"PLTE" => PngChunkType::PLTE,
            b"IDAT" => PngChunkType::IDAT,
            b"IEND" => PngChunkType::IEND,
            b"tRNS" => PngChunkType::tRNS,
            b"bKGD" => PngChunkType::bKGD,
            b"pHYs" => PngChunkType::pHYs,
            b"tIME" => PngChunkType::tIME,
            b"tEXt" => PngChunkType::tEXt,
            b"zTXt" => PngChunkType::zTXt,
            b"iTXt" => PngChunkType::iTXt,
            _ => PngChunkType::unkn
        };

        if !self.stream.has(chunk_length + 4 /*crc stream*/)
        {
            let err = format!(
                "Not enough bytes for chunk {:?}, bytes requested are {}, but bytes present are {}",
                chunk_type,
                chunk_length + 4,
                self.stream.remaining()
            );

            return Err(PngDecodeErrors::Generic(err));
        }

        if self.options.get_confirm_crc()
        {
            use crate::crc::crc32_slice8;

            // go back and point to the chunk type
            self.stream.rewind(4);
            // read chunk type + chunk data
            let bytes = self.stream.peek_at(0, chunk_length + 4).unwrap();

            let calc_crc = !crc32_slice8(bytes, u32::MAX);

            if crc != calc_crc
            {
                return Err(PngDecodeErrors::BadCrc(crc, calc_crc));
            }
            // The parsers expect the stream to point to the start of
            // the chunk data.
            self.stream.skip(4);
        }

        Ok(PngChunk {
            length: chunk_length,
            chunk: chunk_type_int,
            chunk_type,
            crc
        })
    }

    /// Run the chunk loop to IEND, filling `png_info` and gathering
    /// the IDAT payload.
    pub(crate) fn read_chunks(&mut self) -> Result<(), PngDecodeErrors>
    {
        if self.chunks_read
        {
            return Ok(());
        }

        let signature = self.stream.get_u64_be_err()?;

        if signature != PNG_SIGNATURE
        {
            return Err(PngDecodeErrors::BadSignature);
        }

        if self.stream.peek_at(4, 4)? != b"IHDR"
        {
            return Err(PngDecodeErrors::GenericStatic(
                "First chunk not IHDR, corrupt PNG"
            ));
        }

        loop
        {
            let header = self.read_chunk_header()?;

            match header.chunk_type
            {
                PngChunkType::IHDR => self.parse_ihdr(header)?,
                PngChunkType::PLTE => self.parse_plte(header)?,
                PngChunkType::IDAT => self.parse_idat(header)?,
                PngChunkType::tRNS => self.parse_trns(header)?,
                PngChunkType::bKGD => self.parse_bkgd(header)?,
                PngChunkType::pHYs => self.parse_phys(header)?,
                PngChunkType::tIME => self.parse_time(header)?,
                PngChunkType::tEXt => self.parse_text(header)?,
                PngChunkType::zTXt => self.parse_ztxt(header)?,
                PngChunkType::iTXt => self.parse_itxt(header)?,
                PngChunkType::IEND =>
                {
                    self.stream.skip(header.length + 4);
                    break;
                }
                PngChunkType::unkn => self.parse_unknown(header)?
            }

            self.previous_was_idat = header.chunk_type == PngChunkType::IDAT;
        }

        if !self.seen_idat
        {
            return Err(PngDecodeErrors::GenericStatic("No IDAT chunk present"));
        }
        if self.png_info.color.colortype == crate::enums::PngColor::Palette && !self.seen_plte
        {
            return Err(PngDecodeErrors::GenericStatic(
                "Palette image without a PLTE chunk"
            ));
        }

        self.chunks_read = true;
        Ok(())
    }

    /// Decode the image, returning raw pixels in the requested color
    /// mode (or the stream's own mode when conversion is off).
    pub fn decode(&mut self) -> Result<Vec<u8>, PngDecodeErrors>
    {
        self.read_chunks()?;

        let scanlines = self.inflate_idat()?;

        self.postprocess(&scanlines)
    }

    /// The filter byte of every scanline, one vector per pass (a
    /// single vector for non-interlaced streams).
    pub fn inspect_filters(&mut self) -> Result<Vec<Vec<u8>>, PngDecodeErrors>
    {
        self.read_chunks()?;

        let scanlines = self.inflate_idat()?;

        let info = &self.png_info;
        let bpp = info.color.bpp();

        let mut passes_filters = Vec::new();

        match info.interlace_method
        {
            InterlaceMethod::Standard =>
            {
                let stride = 1 + linebytes_rounded(info.width, bpp);

                passes_filters.push(
                    scanlines
                        .chunks_exact(stride)
                        .take(info.height)
                        .map(|row| row[0])
                        .collect()
                );
            }
            InterlaceMethod::Adam7 =>
            {
                let mut offset = 0;

                for pass in adam7::pass_values(info.width, info.height, bpp)
                {
                    let stride = 1 + linebytes_rounded(pass.w, bpp);

                    passes_filters.push(
                        scanlines[offset..offset + pass.filtered_len]
                            .chunks_exact(stride.max(1))
                            .map(|row| row[0])
                            .collect()
                    );
                    offset += pass.filtered_len;
                }
            }
        }
        Ok(passes_filters)
    }

    /// Size of the filtered scanline stream IDAT must inflate to.
    fn expected_scanline_bytes(&self) -> usize
    {
        let info = &self.png_info;
        let bpp = info.color.bpp();

        match info.interlace_method
        {
            InterlaceMethod::Standard =>
            {
                info.height * (1 + linebytes_rounded(info.width, bpp))
            }
            InterlaceMethod::Adam7 => adam7::pass_values(info.width, info.height, bpp)
                .iter()
                .map(|pass| pass.filtered_len)
                .sum()
        }
    }

    fn inflate_idat(&mut self) -> Result<Vec<u8>, PngDecodeErrors>
    {
        let expected = self.expected_scanline_bytes();

        let options = self
            .options
            .get_inflate_options()
            .set_limit(expected)
            .set_confirm_adler(self.options.get_confirm_adler());

        let data = zlib_decompress(&self.idat_chunks, &options)?;

        if data.len() < expected
        {
            return Err(PngDecodeErrors::Generic(format!(
                "Not enough pixel data, expected {expected} bytes but found {}",
                data.len()
            )));
        }

        trace!("Inflated {} bytes of scanline data", data.len());

        // done with the compressed stream
        self.idat_chunks = Vec::new();

        Ok(data)
    }

    fn postprocess(&mut self, scanlines: &[u8]) -> Result<Vec<u8>, PngDecodeErrors>
    {
        let info = &self.png_info;
        let (width, height) = (info.width, info.height);
        let bpp = info.color.bpp();
        let raw_size = info.color.raw_size(width, height);

        let raw = match info.interlace_method
        {
            InterlaceMethod::Standard =>
            {
                let linebytes = linebytes_rounded(width, bpp);
                let mut padded = vec![0_u8; height * linebytes];

                unfilter_into(&mut padded, scanlines, width, height, bpp)?;

                if bpp < 8 && linebits_exact(width, bpp) != linebytes * 8
                {
                    let mut packed = vec![0_u8; raw_size];

                    remove_padding_bits(
                        &mut packed,
                        &padded,
                        linebits_exact(width, bpp),
                        linebytes * 8,
                        height
                    );
                    packed
                }
                else
                {
                    padded.truncate(raw_size);
                    padded
                }
            }
            InterlaceMethod::Adam7 =>
            {
                let passes = adam7::pass_values(width, height, bpp);

                let packed_size: usize = passes.iter().map(|p| p.packed_len).sum();
                let mut packed = vec![0_u8; packed_size];

                let mut offset_filtered = 0;
                let mut offset_packed = 0;

                for pass in &passes
                {
                    if pass.w == 0 || pass.h == 0
                    {
                        continue;
                    }
                    let linebytes = linebytes_rounded(pass.w, bpp);
                    let mut padded = vec![0_u8; pass.padded_len];

                    unfilter_into(
                        &mut padded,
                        &scanlines[offset_filtered..offset_filtered + pass.filtered_len],
                        pass.w,
                        pass.h,
                        bpp
                    )?;

                    if bpp < 8 && linebits_exact(pass.w, bpp) != linebytes * 8
                    {
                        remove_padding_bits(
                            &mut packed[offset_packed..],
                            &padded,
                            linebits_exact(pass.w, bpp),
                            linebytes * 8,
                            pass.h
                        );
                    }
                    else
                    {
                        packed[offset_packed..offset_packed + pass.packed_len]
                            .copy_from_slice(&padded[..pass.packed_len]);
                    }

                    offset_filtered += pass.filtered_len;
                    offset_packed += pass.packed_len;
                }

                let mut raw = vec![0_u8; raw_size];

                adam7::deinterlace(&mut raw, &packed, width, height, bpp);
                raw
            }
        };

        let out_mode = self.options.get_out_color_mode().clone();

        if self.options.get_color_convert() && out_mode != info.color
        {
            let mut out = vec![0_u8; out_mode.raw_size(width, height)];

            convert(&mut out, &raw, &out_mode, &info.color, width, height)?;

            return Ok(out);
        }
        Ok(raw)
    }
}

/// Undo the per-scanline filters of one (sub-)image.
///
/// `inp` holds `h` rows of filter byte plus line bytes; `out`
/// receives the de-filtered rows without filter bytes.
fn unfilter_into(
    out: &mut [u8], inp: &[u8], w: usize, h: usize, bpp: usize
) -> Result<(), PngDecodeErrors>
{
    let linebytes = linebytes_rounded(w, bpp);

    if linebytes == 0 || h == 0
    {
        return Ok(());
    }

    // the byte distance of the left neighbor; sub-byte depths filter
    // byte-wise
    let components = (bpp / 8).max(1);
    let chunk_size = linebytes + 1;

    let mut prev_row_start = 0;
    let mut out_position = 0;
    let mut first_row = true;

    for in_stride in inp.chunks_exact(chunk_size).take(h)
    {
        let (prev, current) = out.split_at_mut(out_position);

        let mut prev_row: &[u8] = &[];

        if !first_row
        {
            prev_row = &prev[prev_row_start..prev_row_start + linebytes];
            prev_row_start += linebytes;
        }

        let filter_byte = in_stride[0];
        let raw = &in_stride[1..];
        let current = &mut current[..linebytes];

        let Some(filter) = FilterType::from_int(filter_byte)
        else
        {
            return Err(PngDecodeErrors::Generic(format!(
                "Unknown filter type {filter_byte}"
            )));
        };

        // the first row has no row above it; Up degenerates to a
        // copy, Average and Paeth to their left-only forms
        match (filter, first_row)
        {
            (FilterType::None, _) | (FilterType::Up, true) =>
            {
                current.copy_from_slice(raw);
            }
            (FilterType::Sub, _) => handle_sub(raw, current, components),
            (FilterType::Up, false) => handle_up(prev_row, raw, current),
            (FilterType::Average, true) => handle_avg_first(raw, current, components),
            (FilterType::Average, false) => handle_avg(prev_row, raw, current, components),
            (FilterType::Paeth, true) => handle_paeth_first(raw, current, components),
            (FilterType::Paeth, false) => handle_paeth(prev_row, raw, current, components)
        }

        out_position += linebytes;
        first_row = false;
    }
    Ok(())
}

/// Drop the padding bits byte-aligned scanlines carry when the line
/// width is not a whole number of bytes, packing rows tightly.
fn remove_padding_bits(out: &mut [u8], inp: &[u8], olinebits: usize, ilinebits: usize, h: usize)
{
    let diff = ilinebits - olinebits;

    let mut ibp = 0;
    let mut obp = 0;

    for _ in 0..h
    {
        for _ in 0..olinebits
        {
            let bit = adam7::read_bit(inp, ibp);
            ibp += 1;
            adam7::set_bit0(out, obp, bit);
            obp += 1;
        }
        ibp += diff;
    }
}
