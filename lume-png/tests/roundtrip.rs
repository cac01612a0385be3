//! End to end decode/encode round trips over the full mode matrix,
//! plus the chunk preservation and robustness guarantees.

use lume_png::{
    inspect_chunks, ColorMode, DecoderOptions, EncoderOptions, InterlaceMethod, PLTEEntry,
    PngColor, PngDecoder, PngEncoder, TextChunk, TimeInfo
};

/// Deterministic bytes for a raw buffer of the given size, with the
/// unused padding bits of the final byte cleared.
fn raw_buffer(mode: &ColorMode, w: usize, h: usize) -> Vec<u8>
{
    let size = mode.raw_size(w, h);
    let mut data: Vec<u8> = (0..size).map(|i| (i * 131 + 7) as u8).collect();

    if mode.colortype == PngColor::Palette
    {
        // every sample must be a valid palette index
        let max = mode.palette().len() as u8;

        for byte in data.iter_mut()
        {
            if mode.depth() == 8
            {
                *byte %= max;
            }
            // sub-byte palette buffers are handled by the caller
        }
    }

    let used_bits = w * h * mode.bpp();

    if used_bits % 8 != 0
    {
        let last = data.len() - 1;
        data[last] &= !(0xFF_u8 >> (used_bits % 8));
    }
    data
}

fn four_color_palette() -> Vec<PLTEEntry>
{
    vec![
        PLTEEntry::new(255, 0, 0, 255),
        PLTEEntry::new(0, 255, 0, 255),
        PLTEEntry::new(0, 0, 255, 255),
        PLTEEntry::new(16, 32, 64, 128),
    ]
}

/// Encode without auto-convert and decode without conversion; the
/// bytes that come back must be the bytes that went in.
fn assert_roundtrip(mode: ColorMode, w: usize, h: usize, interlace: InterlaceMethod)
{
    let raw = raw_buffer(&mode, w, h);

    let options = EncoderOptions::new(w, h, mode.clone())
        .set_auto_convert(false)
        .set_interlace(interlace);

    let png = PngEncoder::new(&raw, options).encode().unwrap();

    let decoder_options = DecoderOptions::default().set_color_convert(false);
    let mut decoder = PngDecoder::new_with_options(&png, decoder_options);
    let decoded = decoder.decode().unwrap();

    assert_eq!(decoder.get_dimensions(), Some((w, h)));
    assert_eq!(decoded, raw, "{mode:?} {w}x{h} {interlace:?}");
}

#[test]
fn roundtrip_every_color_mode()
{
    let modes = [
        ColorMode::new(PngColor::Luma, 1),
        ColorMode::new(PngColor::Luma, 2),
        ColorMode::new(PngColor::Luma, 4),
        ColorMode::new(PngColor::Luma, 8),
        ColorMode::new(PngColor::Luma, 16),
        ColorMode::new(PngColor::RGB, 8),
        ColorMode::new(PngColor::RGB, 16),
        ColorMode::new(PngColor::LumaA, 8),
        ColorMode::new(PngColor::LumaA, 16),
        ColorMode::new(PngColor::RGBA, 8),
        ColorMode::new(PngColor::RGBA, 16),
    ];

    for mode in modes
    {
        for (w, h) in [(1, 1), (7, 7), (16, 8), (13, 3)]
        {
            assert_roundtrip(mode.clone(), w, h, InterlaceMethod::Standard);
            assert_roundtrip(mode.clone(), w, h, InterlaceMethod::Adam7);
        }
    }
}

#[test]
fn roundtrip_palette_modes()
{
    // two entries for depth 1, four for the rest
    for depth in [1_u8, 2, 4, 8]
    {
        let mut mode = ColorMode::new(PngColor::Palette, depth);
        let entries = if depth == 1 { 2 } else { 4 };
        mode.set_palette(four_color_palette()[..entries].to_vec());

        for (w, h) in [(1, 1), (7, 7), (16, 4)]
        {
            // build an index raster valid at this depth
            let size = mode.raw_size(w, h);
            let raw: Vec<u8> = (0..size)
                .map(|i| {
                    let pattern = (i * 37) as u8;
                    if depth == 8
                    {
                        pattern % entries as u8
                    }
                    else
                    {
                        // packed sub-byte indices; every field of the
                        // pattern byte stays below 2^depth, entries
                        // is a power of two here
                        let mask = (entries as u8 - 1) * 0b0101_0101;
                        pattern & mask
                    }
                })
                .collect();

            let options = EncoderOptions::new(w, h, mode.clone()).set_auto_convert(false);
            let png = PngEncoder::new(&raw, options).encode().unwrap();

            let decoder_options = DecoderOptions::default().set_color_convert(false);
            let mut decoder = PngDecoder::new_with_options(&png, decoder_options);
            let mut decoded = decoder.decode().unwrap();

            // compare only the pixel bits
            let used_bits = w * h * mode.bpp();
            let mut expected = raw.clone();

            if used_bits % 8 != 0
            {
                let mask = !(0xFF_u8 >> (used_bits % 8));
                let last = expected.len() - 1;
                expected[last] &= mask;
                decoded[last] &= mask;
            }

            assert_eq!(decoded, expected, "palette depth {depth} {w}x{h}");
            assert_eq!(decoder.get_color_mode().unwrap().palette(), mode.palette());
        }
    }
}

#[test]
fn single_blue_pixel()
{
    let pixel = [0_u8, 0, 255, 255];

    let options = EncoderOptions::new(1, 1, ColorMode::new(PngColor::RGBA, 8));
    let png = PngEncoder::new(&pixel, options).encode().unwrap();

    let mut decoder = PngDecoder::new(&png);
    let decoded = decoder.decode().unwrap();

    assert_eq!(decoded, pixel);

    // one opaque colored pixel: palette is unprofitable at this size,
    // so the encoder lands on 8-bit RGB
    let mode = decoder.get_color_mode().unwrap();

    assert_eq!(mode.colortype, PngColor::RGB);
    assert_eq!(mode.depth(), 8);
}

#[test]
fn palette_image_filters_are_zero()
{
    let mut mode = ColorMode::new(PngColor::Palette, 8);
    mode.set_palette(four_color_palette());

    let raw: Vec<u8> = (0..49_u32).map(|i| (i % 4) as u8).collect();

    let options = EncoderOptions::new(7, 7, mode.clone()).set_auto_convert(false);
    let png = PngEncoder::new(&raw, options).encode().unwrap();

    let filters = PngDecoder::new(&png).inspect_filters().unwrap();

    assert_eq!(filters.len(), 1);
    assert_eq!(filters[0], vec![0_u8; 7]);

    // decoded RGBA must match a palette lookup done by hand
    let decoded = PngDecoder::new(&png).decode().unwrap();
    let palette = four_color_palette();

    for (i, px) in decoded.chunks_exact(4).enumerate()
    {
        let entry = palette[raw[i] as usize];

        assert_eq!(px, [entry.red, entry.green, entry.blue, entry.alpha]);
    }
}

#[test]
fn sixteen_bit_grey_keeps_byte_order()
{
    let mode = ColorMode::new(PngColor::Luma, 16);
    let mut raw = raw_buffer(&mode, 32, 32);

    raw[0] = 0xAA;
    raw[1] = 0xBB;

    let options = EncoderOptions::new(32, 32, mode).set_auto_convert(false);
    let png = PngEncoder::new(&raw, options).encode().unwrap();

    let decoder_options = DecoderOptions::default()
        .set_out_color_mode(ColorMode::new(PngColor::RGBA, 16));
    let decoded = PngDecoder::new_with_options(&png, decoder_options)
        .decode()
        .unwrap();

    // big-endian samples: the second byte of the first pixel is the
    // low half of the first grey sample
    assert_eq!(decoded[0], 0xAA);
    assert_eq!(decoded[1], 0xBB);
}

#[test]
fn one_transparent_pixel_becomes_a_key()
{
    let (w, h) = (20, 20);
    let k = 173;

    let mut raw = Vec::with_capacity(w * h * 4);

    for i in 0..w * h
    {
        if i == k
        {
            raw.extend_from_slice(&[1, 2, 3, 0]);
        }
        else
        {
            // hundreds of distinct opaque colors keep palette out
            raw.extend_from_slice(&[(i % 256) as u8, (i / 2 % 256) as u8, 9, 255]);
        }
    }

    let options = EncoderOptions::new(w, h, ColorMode::new(PngColor::RGBA, 8));
    let png = PngEncoder::new(&raw, options).encode().unwrap();

    let mut decoder = PngDecoder::new(&png);
    let decoded = decoder.decode().unwrap();

    let mode = decoder.get_color_mode().unwrap();

    assert_eq!(mode.colortype, PngColor::RGB);
    assert_eq!(mode.key(), Some((1, 2, 3)));

    for (i, px) in decoded.chunks_exact(4).enumerate()
    {
        if i == k
        {
            assert_eq!(px[3], 0, "pixel {i} must be transparent");
        }
        else
        {
            assert_eq!(px[3], 255, "pixel {i} must be opaque");
        }
    }
}

#[test]
fn interlaced_and_linear_decode_identically()
{
    for (mode, w, h) in [
        (ColorMode::new(PngColor::RGBA, 8), 7, 7),
        (ColorMode::new(PngColor::RGB, 8), 9, 5),
        (ColorMode::new(PngColor::Luma, 1), 9, 5),
        (ColorMode::new(PngColor::Luma, 2), 11, 3),
        (ColorMode::new(PngColor::Luma, 16), 4, 9),
    ]
    {
        let raw = raw_buffer(&mode, w, h);

        let linear = PngEncoder::new(
            &raw,
            EncoderOptions::new(w, h, mode.clone()).set_auto_convert(false)
        )
        .encode()
        .unwrap();

        let interlaced = PngEncoder::new(
            &raw,
            EncoderOptions::new(w, h, mode.clone())
                .set_auto_convert(false)
                .set_interlace(InterlaceMethod::Adam7)
        )
        .encode()
        .unwrap();

        let a = PngDecoder::new(&linear).decode().unwrap();
        let b = PngDecoder::new(&interlaced).decode().unwrap();

        assert_eq!(a, b, "{mode:?} {w}x{h}");
    }
}

/// Insert an ancillary private chunk right after IHDR.
fn insert_unknown_chunk(png: &[u8], name: [u8; 4], payload: &[u8]) -> Vec<u8>
{
    // signature (8) + IHDR frame (8 + 13 + 4)
    let split = 8 + 25;

    let mut out = png[..split].to_vec();

    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());

    let crc_start = out.len();

    out.extend_from_slice(&name);
    out.extend_from_slice(payload);

    // CRC over type and payload
    let mut crc = u32::MAX;
    for byte in &out[crc_start..]
    {
        crc ^= u32::from(*byte);
        for _ in 0..8
        {
            crc = if crc & 1 != 0 { (crc >> 1) ^ 0xEDB8_8320 } else { crc >> 1 };
        }
    }
    out.extend_from_slice(&(!crc).to_be_bytes());

    out.extend_from_slice(&png[split..]);
    out
}

#[test]
fn chunk_stream_is_preserved()
{
    let mode = ColorMode::new(PngColor::RGB, 8);
    let raw = raw_buffer(&mode, 5, 5);

    let mut info = lume_png::PngInfo::default();

    info.time = Some(TimeInfo {
        year:   2012,
        month:  6,
        day:    30,
        hour:   23,
        minute: 59,
        second: 60
    });
    info.phys = Some(lume_png::PhysInfo {
        x:    2835,
        y:    2835,
        unit: 1
    });
    info.texts.push(TextChunk {
        keyword: "Comment".to_string(),
        text:    "round trips are sacred".to_string()
    });

    let options = EncoderOptions::new(5, 5, mode.clone()).set_auto_convert(false);
    let mut encoder = PngEncoder::new(&raw, options);
    encoder.set_info(info);

    let original = insert_unknown_chunk(&encoder.encode().unwrap(), *b"prVt", b"opaque blob");

    // decode remembering everything, then encode from what was
    // remembered
    let decoder_options = DecoderOptions::default()
        .set_remember_unknown_chunks(true)
        .set_color_convert(false);

    let mut decoder = PngDecoder::new_with_options(&original, decoder_options);
    let pixels = decoder.decode().unwrap();
    let stream_mode = decoder.get_color_mode().unwrap().clone();
    let info = decoder.get_info().unwrap().clone();

    let options = EncoderOptions::new(5, 5, stream_mode)
        .set_auto_convert(false);
    let mut encoder = PngEncoder::new(&pixels, options);
    encoder.set_info(info);

    let reencoded = encoder.encode().unwrap();

    let original_names: Vec<[u8; 4]> =
        inspect_chunks(&original).unwrap().iter().map(|c| c.name).collect();
    let reencoded_names: Vec<[u8; 4]> =
        inspect_chunks(&reencoded).unwrap().iter().map(|c| c.name).collect();

    assert_eq!(original_names, reencoded_names);

    // and the pixels are still the same
    let decoded_again = PngDecoder::new(&reencoded).decode().unwrap();
    let decoded_original = PngDecoder::new(&original).decode().unwrap();

    assert_eq!(decoded_again, decoded_original);
}

#[test]
fn metadata_survives_decoding()
{
    let mode = ColorMode::new(PngColor::RGB, 8);
    let raw = raw_buffer(&mode, 3, 3);

    let mut info = lume_png::PngInfo::default();

    info.texts.push(TextChunk {
        keyword: "Title".to_string(),
        text:    "metadata check".to_string()
    });
    info.background = Some(lume_png::Background::Rgb(1, 2, 3));

    let options = EncoderOptions::new(3, 3, mode).set_auto_convert(false);
    let mut encoder = PngEncoder::new(&raw, options);
    encoder.set_info(info);

    let png = encoder.encode().unwrap();

    let mut decoder = PngDecoder::new(&png);
    decoder.decode().unwrap();

    let info = decoder.get_info().unwrap();

    assert_eq!(info.texts.len(), 1);
    assert_eq!(info.texts[0].keyword, "Title");
    assert_eq!(info.texts[0].text, "metadata check");
    assert_eq!(info.background, Some(lume_png::Background::Rgb(1, 2, 3)));
}

#[test]
fn crc_errors_are_recoverable()
{
    let mode = ColorMode::new(PngColor::RGB, 8);
    let raw = raw_buffer(&mode, 4, 4);

    let options = EncoderOptions::new(4, 4, mode).set_auto_convert(false);
    let mut png = PngEncoder::new(&raw, options).encode().unwrap();

    // corrupt the IHDR CRC
    let crc_offset = 8 + 8 + 13;
    png[crc_offset] ^= 0xFF;

    assert!(PngDecoder::new(&png).decode().is_err());

    let lenient = DecoderOptions::default().set_confirm_crc(false);
    assert!(PngDecoder::new_with_options(&png, lenient).decode().is_ok());
}

#[test]
fn damaged_streams_never_panic()
{
    let mut mode = ColorMode::new(PngColor::Palette, 2);
    mode.set_palette(four_color_palette());

    let raw: Vec<u8> = vec![0b0001_1011; mode.raw_size(7, 7)];

    let options = EncoderOptions::new(7, 7, mode).set_auto_convert(false);
    let png = PngEncoder::new(&raw, options).encode().unwrap();

    let lenient = DecoderOptions::default().set_strict_mode(false);

    for i in 0..png.len()
    {
        for value in [0x00, 0xFF, !png[i]]
        {
            let mut corrupt = png.clone();
            corrupt[i] = value;

            // any outcome is fine as long as it is a return value
            let _ = PngDecoder::new(&corrupt).decode();
            let _ = PngDecoder::new_with_options(&corrupt, lenient.clone()).decode();
        }
        for bit in 0..8
        {
            let mut corrupt = png.clone();
            corrupt[i] ^= 1 << bit;

            let _ = PngDecoder::new(&corrupt).decode();
        }
    }
}

#[test]
fn rejects_non_png_data()
{
    assert!(PngDecoder::new(b"definitely not a png").decode().is_err());
    assert!(PngDecoder::new(&[]).decode().is_err());

    let summary = inspect_chunks(b"also not a png");
    assert!(summary.is_err());
}

#[test]
fn inspect_chunks_lists_the_stream()
{
    let mode = ColorMode::new(PngColor::RGB, 8);
    let raw = raw_buffer(&mode, 4, 4);

    let options = EncoderOptions::new(4, 4, mode).set_auto_convert(false);
    let png = PngEncoder::new(&raw, options).encode().unwrap();

    let chunks = inspect_chunks(&png).unwrap();

    assert_eq!(chunks.first().map(|c| c.name), Some(*b"IHDR"));
    assert_eq!(chunks.last().map(|c| c.name), Some(*b"IEND"));
    assert!(chunks.iter().any(|c| &c.name == b"IDAT"));

    // offsets point at real chunk boundaries
    for chunk in &chunks
    {
        assert_eq!(&png[chunk.offset + 4..chunk.offset + 8], &chunk.name);
    }
}

#[test]
fn grey_roundtrip_through_rgba()
{
    // decode to RGBA8 and re-encode with auto-convert: the encoder
    // must find its way back to 1-bit grey
    let mode = ColorMode::new(PngColor::Luma, 1);
    let raw = raw_buffer(&mode, 16, 16);

    let options = EncoderOptions::new(16, 16, mode.clone()).set_auto_convert(false);
    let png = PngEncoder::new(&raw, options).encode().unwrap();

    let rgba = PngDecoder::new(&png).decode().unwrap();

    let options = EncoderOptions::new(16, 16, ColorMode::new(PngColor::RGBA, 8));
    let reencoded = PngEncoder::new(&rgba, options).encode().unwrap();

    let mut decoder = PngDecoder::new_with_options(
        &reencoded,
        DecoderOptions::default().set_color_convert(false)
    );
    let back = decoder.decode().unwrap();

    assert_eq!(decoder.get_color_mode().unwrap(), &mode);
    assert_eq!(back, raw);
}
