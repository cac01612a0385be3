//! Parsers for the individual chunk types.
//!
//! Each parser consumes its chunk's payload and trailing CRC and
//! enforces the ordering rules the format attaches to that chunk.

use log::{info, trace, warn};
use lume_inflate::zlib_decompress;

use crate::color::{ColorMode, PLTEEntry};
use crate::decoder::{Background, PhysInfo, PngChunk, PngDecoder, TimeInfo};
use crate::enums::{ChunkPosition, InterlaceMethod, PngColor};
use crate::error::PngDecodeErrors;
use crate::text::{latin1_to_string, ItxtChunk, TextChunk};

fn split_at_nul(data: &[u8]) -> (&[u8], &[u8])
{
    match data.iter().position(|b| *b == 0)
    {
        Some(pos) => (&data[..pos], &data[pos + 1..]),
        None => (data, &[])
    }
}

impl<'a> PngDecoder<'a>
{
    pub(crate) fn parse_ihdr(&mut self, chunk: PngChunk) -> Result<(), PngDecodeErrors>
    {
        if self.seen_hdr
        {
            return Err(PngDecodeErrors::GenericStatic("Multiple IHDR, corrupt PNG"));
        }

        if chunk.length != 13
        {
            return Err(PngDecodeErrors::GenericStatic("Bad IHDR length"));
        }

        let width = self.stream.get_u32_be() as usize;
        let height = self.stream.get_u32_be() as usize;

        if width == 0 || height == 0
        {
            return Err(PngDecodeErrors::GenericStatic("Width or height cannot be zero"));
        }

        if width > self.options.get_max_width()
        {
            return Err(PngDecodeErrors::TooLargeDimensions(
                width,
                height,
                self.options.get_max_width()
            ));
        }
        if height > self.options.get_max_height()
        {
            return Err(PngDecodeErrors::TooLargeDimensions(
                width,
                height,
                self.options.get_max_height()
            ));
        }

        self.png_info.width = width;
        self.png_info.height = height;

        let depth = self.stream.get_u8();
        let color = self.stream.get_u8();

        let Some(img_color) = PngColor::from_int(color)
        else
        {
            return Err(PngDecodeErrors::Generic(format!("Unknown color value {color}")));
        };

        let mode = ColorMode::new(img_color, depth);

        if mode.check_validity().is_err()
        {
            return Err(PngDecodeErrors::Generic(format!(
                "Invalid color type {img_color:?} and bit depth {depth} combination"
            )));
        }
        self.png_info.color = mode;

        if self.stream.get_u8() != 0
        {
            return Err(PngDecodeErrors::GenericStatic("Unknown compression method"));
        }
        if self.stream.get_u8() != 0
        {
            return Err(PngDecodeErrors::GenericStatic("Unknown filter method"));
        }

        let interlace_method = self.stream.get_u8();

        let Some(method) = InterlaceMethod::from_int(interlace_method)
        else
        {
            return Err(PngDecodeErrors::Generic(format!(
                "Unknown interlace method {interlace_method}"
            )));
        };
        self.png_info.interlace_method = method;

        // skip crc
        self.stream.skip(4);

        info!("Width: {}", self.png_info.width);
        info!("Height: {}", self.png_info.height);
        info!("Colortype: {:?}", self.png_info.color.colortype);
        info!("Depth: {:?}", self.png_info.color.depth());
        info!("Interlace: {:?}", self.png_info.interlace_method);

        self.seen_hdr = true;

        Ok(())
    }

    pub(crate) fn parse_plte(&mut self, chunk: PngChunk) -> Result<(), PngDecodeErrors>
    {
        if self.seen_plte
        {
            return Err(PngDecodeErrors::OutOfOrderChunk("multiple PLTE chunks"));
        }
        if self.seen_idat
        {
            return Err(PngDecodeErrors::OutOfOrderChunk("PLTE after IDAT"));
        }
        if self.seen_trns
        {
            return Err(PngDecodeErrors::OutOfOrderChunk("PLTE after tRNS"));
        }
        if self.png_info.color.colortype.is_greyscale()
        {
            return Err(PngDecodeErrors::GenericStatic(
                "PLTE is forbidden for greyscale color types"
            ));
        }

        if chunk.length % 3 != 0
        {
            return Err(PngDecodeErrors::GenericStatic("Invalid PLTE length, corrupt PNG"));
        }
        if chunk.length / 3 > 256
        {
            return Err(PngDecodeErrors::GenericStatic("PLTE with more than 256 entries"));
        }
        if chunk.length / 3 > (1_usize << self.png_info.color.depth())
            && self.png_info.color.colortype == PngColor::Palette
        {
            return Err(PngDecodeErrors::GenericStatic(
                "PLTE with more entries than the bit depth can index"
            ));
        }

        let mut palette = Vec::with_capacity(chunk.length / 3);

        for _ in 0..chunk.length / 3
        {
            palette.push(PLTEEntry::new(
                self.stream.get_u8(),
                self.stream.get_u8(),
                self.stream.get_u8(),
                255
            ));
        }
        self.png_info.color.set_palette(palette);

        // skip crc
        self.stream.skip(4);

        self.seen_plte = true;
        self.position_class = ChunkPosition::BeforeIdat;

        Ok(())
    }

    pub(crate) fn parse_idat(&mut self, png_chunk: PngChunk) -> Result<(), PngDecodeErrors>
    {
        if self.seen_idat && !self.previous_was_idat
        {
            return Err(PngDecodeErrors::OutOfOrderChunk("IDAT chunks are not contiguous"));
        }

        // collect the whole compressed stream; it is handed to the
        // inflater in one piece after IEND
        let idat_stream = self.stream.get(png_chunk.length)?;

        self.idat_chunks.extend_from_slice(idat_stream);

        // skip crc
        self.stream.skip(4);

        self.seen_idat = true;
        self.position_class = ChunkPosition::AfterIdat;

        Ok(())
    }

    pub(crate) fn parse_trns(&mut self, chunk: PngChunk) -> Result<(), PngDecodeErrors>
    {
        if self.seen_idat
        {
            return Err(PngDecodeErrors::OutOfOrderChunk("tRNS after IDAT"));
        }

        match self.png_info.color.colortype
        {
            PngColor::Luma =>
            {
                if chunk.length != 2
                {
                    return Err(PngDecodeErrors::GenericStatic("Invalid tRNS length"));
                }
                let grey_sample = self.stream.get_u16_be();

                self.png_info.color.set_key(grey_sample, grey_sample, grey_sample);
            }
            PngColor::RGB =>
            {
                if chunk.length != 6
                {
                    return Err(PngDecodeErrors::GenericStatic("Invalid tRNS length"));
                }
                let red = self.stream.get_u16_be();
                let green = self.stream.get_u16_be();
                let blue = self.stream.get_u16_be();

                self.png_info.color.set_key(red, green, blue);
            }
            PngColor::Palette =>
            {
                if !self.seen_plte
                {
                    return Err(PngDecodeErrors::OutOfOrderChunk("tRNS before PLTE"));
                }
                if self.png_info.color.palette().len() < chunk.length
                {
                    return Err(PngDecodeErrors::Generic(format!(
                        "tRNS chunk with too many entries {}",
                        chunk.length
                    )));
                }

                let mut palette = self.png_info.color.palette().to_vec();

                for entry in palette.iter_mut().take(chunk.length)
                {
                    entry.alpha = self.stream.get_u8();
                }
                self.png_info.color.set_palette(palette);
            }
            _ =>
            {
                let msg = format!(
                    "A tRNS chunk shall not appear for colour type {:?} as it is already transparent",
                    self.png_info.color.colortype
                );

                return Err(PngDecodeErrors::Generic(msg));
            }
        }
        // skip crc
        self.stream.skip(4);
        self.seen_trns = true;

        Ok(())
    }

    pub(crate) fn parse_bkgd(&mut self, chunk: PngChunk) -> Result<(), PngDecodeErrors>
    {
        if self.seen_idat
        {
            return Err(PngDecodeErrors::OutOfOrderChunk("bKGD after IDAT"));
        }

        let background = match self.png_info.color.colortype
        {
            PngColor::Palette =>
            {
                if !self.seen_plte
                {
                    return Err(PngDecodeErrors::OutOfOrderChunk("bKGD before PLTE"));
                }
                if chunk.length != 1
                {
                    return Err(PngDecodeErrors::GenericStatic("Invalid bKGD length"));
                }
                let index = self.stream.get_u8();

                if usize::from(index) >= self.png_info.color.palette().len()
                {
                    return Err(PngDecodeErrors::Generic(format!(
                        "bKGD index {index} outside the palette"
                    )));
                }
                Background::Palette(index)
            }
            PngColor::Luma | PngColor::LumaA =>
            {
                if chunk.length != 2
                {
                    return Err(PngDecodeErrors::GenericStatic("Invalid bKGD length"));
                }
                Background::Grey(self.stream.get_u16_be())
            }
            PngColor::RGB | PngColor::RGBA =>
            {
                if chunk.length != 6
                {
                    return Err(PngDecodeErrors::GenericStatic("Invalid bKGD length"));
                }
                Background::Rgb(
                    self.stream.get_u16_be(),
                    self.stream.get_u16_be(),
                    self.stream.get_u16_be()
                )
            }
            PngColor::Unknown => unreachable!()
        };
        self.png_info.background = Some(background);

        // skip crc
        self.stream.skip(4);

        Ok(())
    }

    pub(crate) fn parse_phys(&mut self, chunk: PngChunk) -> Result<(), PngDecodeErrors>
    {
        if self.seen_idat
        {
            return Err(PngDecodeErrors::OutOfOrderChunk("pHYs after IDAT"));
        }
        if chunk.length != 9
        {
            return Err(PngDecodeErrors::GenericStatic("Invalid pHYs length"));
        }

        let x = self.stream.get_u32_be();
        let y = self.stream.get_u32_be();
        let unit = self.stream.get_u8();

        if unit > 1
        {
            return Err(PngDecodeErrors::Generic(format!("Invalid pHYs unit {unit}")));
        }
        self.png_info.phys = Some(PhysInfo { x, y, unit });

        // skip crc
        self.stream.skip(4);

        Ok(())
    }

    pub(crate) fn parse_time(&mut self, chunk: PngChunk) -> Result<(), PngDecodeErrors>
    {
        if chunk.length != 7
        {
            return Err(PngDecodeErrors::GenericStatic("Invalid tIME chunk length"));
        }

        let year = self.stream.get_u16_be();
        let month = self.stream.get_u8();
        let day = self.stream.get_u8();
        let hour = self.stream.get_u8();
        let minute = self.stream.get_u8();
        let second = self.stream.get_u8();

        if month == 0 || month > 12 || day == 0 || day > 31 || hour > 23 || minute > 59
            || second > 60
        {
            warn!("Out of range tIME value, keeping it anyway");
        }

        self.png_info.time = Some(TimeInfo {
            year,
            month,
            day,
            hour,
            minute,
            second
        });

        // skip crc
        self.stream.skip(4);

        Ok(())
    }

    pub(crate) fn parse_text(&mut self, chunk: PngChunk) -> Result<(), PngDecodeErrors>
    {
        if !self.options.get_read_text_chunks()
        {
            self.stream.skip(chunk.length + 4);
            return Ok(());
        }

        let payload = self.stream.get(chunk.length)?;
        let (keyword, text) = split_at_nul(payload);

        if keyword.is_empty() || keyword.len() > 79
        {
            return Err(PngDecodeErrors::GenericStatic("Invalid tEXt keyword length"));
        }

        self.png_info.texts.push(TextChunk {
            keyword: latin1_to_string(keyword),
            text:    latin1_to_string(text)
        });

        // skip crc
        self.stream.skip(4);

        Ok(())
    }

    pub(crate) fn parse_ztxt(&mut self, chunk: PngChunk) -> Result<(), PngDecodeErrors>
    {
        if !self.options.get_read_text_chunks()
        {
            self.stream.skip(chunk.length + 4);
            return Ok(());
        }

        let payload = self.stream.get(chunk.length)?;
        let (keyword, rest) = split_at_nul(payload);

        if keyword.is_empty() || keyword.len() > 79
        {
            return Err(PngDecodeErrors::GenericStatic("Invalid zTXt keyword length"));
        }
        if rest.first() != Some(&0)
        {
            return Err(PngDecodeErrors::GenericStatic("Unknown zTXt compression method"));
        }

        let options = self
            .options
            .get_inflate_options()
            .set_limit(self.options.get_max_text_size());

        let text = zlib_decompress(&rest[1..], &options)?;

        self.png_info.texts.push(TextChunk {
            keyword: latin1_to_string(keyword),
            text:    latin1_to_string(&text)
        });

        // skip crc
        self.stream.skip(4);

        Ok(())
    }

    pub(crate) fn parse_itxt(&mut self, chunk: PngChunk) -> Result<(), PngDecodeErrors>
    {
        if !self.options.get_read_text_chunks()
        {
            self.stream.skip(chunk.length + 4);
            return Ok(());
        }

        let payload = self.stream.get(chunk.length)?;
        let (keyword, rest) = split_at_nul(payload);

        if keyword.is_empty() || keyword.len() > 79
        {
            return Err(PngDecodeErrors::GenericStatic("Invalid iTXt keyword length"));
        }
        if rest.len() < 2
        {
            return Err(PngDecodeErrors::GenericStatic("Truncated iTXt chunk"));
        }

        let compressed = match rest[0]
        {
            0 => false,
            1 => true,
            _ =>
            {
                return Err(PngDecodeErrors::GenericStatic("Invalid iTXt compression flag"))
            }
        };
        if rest[1] != 0
        {
            return Err(PngDecodeErrors::GenericStatic("Unknown iTXt compression method"));
        }

        let (language_tag, rest) = split_at_nul(&rest[2..]);
        let (translated_keyword, text) = split_at_nul(rest);

        let text = if compressed
        {
            let options = self
                .options
                .get_inflate_options()
                .set_limit(self.options.get_max_text_size());

            zlib_decompress(text, &options)?
        }
        else
        {
            if text.len() > self.options.get_max_text_size()
            {
                return Err(PngDecodeErrors::GenericStatic("iTXt text too large"));
            }
            text.to_vec()
        };

        self.png_info.itexts.push(ItxtChunk {
            keyword: latin1_to_string(keyword),
            language_tag: String::from_utf8_lossy(language_tag).into_owned(),
            translated_keyword: String::from_utf8_lossy(translated_keyword).into_owned(),
            text: String::from_utf8_lossy(&text).into_owned()
        });

        // skip crc
        self.stream.skip(4);

        Ok(())
    }

    pub(crate) fn parse_unknown(&mut self, chunk: PngChunk) -> Result<(), PngDecodeErrors>
    {
        let chunk_name = core::str::from_utf8(&chunk.chunk).unwrap_or("XXXX");

        if chunk.chunk[0] & (1 << 5) == 0
        {
            return Err(PngDecodeErrors::UnknownCriticalChunk(chunk.chunk));
        }

        if self.options.get_remember_unknown_chunks()
        {
            trace!("Retaining unknown chunk {chunk_name:?}");

            // capture the chunk verbatim, framing included
            self.stream.rewind(8);

            let raw = self.stream.get(8 + chunk.length + 4)?;

            self.png_info.unknown_chunks[self.position_class as usize]
                .extend_from_slice(raw);
        }
        else
        {
            trace!("Skipping unknown chunk {chunk_name:?}, length {}", chunk.length);

            self.stream.skip(chunk.length + 4);
        }

        Ok(())
    }
}
