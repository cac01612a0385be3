//! End to end zlib round trips, cross-checked against miniz_oxide.

use lume_inflate::{
    extract_zlib_info, zlib_compress, zlib_decompress, DeflateDecoder, DeflateEncodeOptions,
    DeflateEncoder, DeflateEncodingStrategy, DeflateOptions, LzToken
};

fn sample_inputs() -> Vec<Vec<u8>>
{
    let mut inputs = vec![
        Vec::new(),
        vec![0_u8],
        b"abcabcabcabcabcabc".to_vec(),
        vec![0_u8; 100_000],
        (0..=255_u8).collect(),
    ];

    // pseudo random, lightly compressible
    let mut state = 0x12345678_u32;
    let mut noisy = Vec::with_capacity(300_000);

    for i in 0..300_000_u32
    {
        state = state.wrapping_mul(1664525).wrapping_add(1013904223);
        if i % 97 < 30
        {
            noisy.extend_from_slice(b"structured-span");
        }
        noisy.push((state >> 24) as u8);
    }
    inputs.push(noisy);

    inputs
}

#[test]
fn roundtrip_all_strategies()
{
    for input in sample_inputs()
    {
        for strategy in [
            DeflateEncodingStrategy::NoCompression,
            DeflateEncodingStrategy::Fixed,
            DeflateEncodingStrategy::Dynamic
        ]
        {
            let options = DeflateEncodeOptions::default().set_strategy(strategy);

            let compressed = DeflateEncoder::new_with_options(&input, options)
                .encode_zlib()
                .unwrap();

            let decompressed = DeflateDecoder::new(&compressed).decode_zlib().unwrap();

            assert_eq!(decompressed, input, "{strategy:?}, len {}", input.len());
        }
    }
}

#[test]
fn our_streams_decode_under_miniz()
{
    for input in sample_inputs()
    {
        for strategy in [
            DeflateEncodingStrategy::NoCompression,
            DeflateEncodingStrategy::Fixed,
            DeflateEncodingStrategy::Dynamic
        ]
        {
            let options = DeflateEncodeOptions::default().set_strategy(strategy);

            let compressed = DeflateEncoder::new_with_options(&input, options)
                .encode_zlib()
                .unwrap();

            let decompressed =
                miniz_oxide::inflate::decompress_to_vec_zlib(&compressed).unwrap();

            assert_eq!(decompressed, input, "{strategy:?}, len {}", input.len());
        }
    }
}

#[test]
fn miniz_streams_decode_under_us()
{
    for input in sample_inputs()
    {
        for level in [0, 1, 6, 10]
        {
            let compressed = miniz_oxide::deflate::compress_to_vec_zlib(&input, level);
            let decompressed = DeflateDecoder::new(&compressed).decode_zlib().unwrap();

            assert_eq!(decompressed, input, "level {level}, len {}", input.len());
        }
    }
}

#[test]
fn framing_checks_out()
{
    for window in [256, 2048, 32768]
    {
        let options = DeflateEncodeOptions::default().set_window_size(window);
        let stream = DeflateEncoder::new_with_options(b"framing", options)
            .encode_zlib()
            .unwrap();

        // CM = deflate, no preset dictionary, FCHECK multiple of 31
        assert_eq!(stream[0] & 0xF, 8);
        assert_eq!((stream[1] >> 5) & 1, 0);
        assert_eq!((u32::from(stream[0]) * 256 + u32::from(stream[1])) % 31, 0);

        // CINFO encodes the window size
        assert_eq!(u32::from(stream[0] >> 4), window.trailing_zeros() - 8);
    }
}

#[test]
fn huffman_only_mode()
{
    let input = b"no matches allowed here, every byte a literal".repeat(100);

    let options = DeflateEncodeOptions::default().set_use_lz77(false);
    let compressed = DeflateEncoder::new_with_options(&input, options)
        .encode_zlib()
        .unwrap();

    let decompressed = DeflateDecoder::new(&compressed).decode_zlib().unwrap();
    assert_eq!(decompressed, input);

    let blocks = extract_zlib_info(&compressed).unwrap();

    for block in blocks
    {
        for symbol in block.symbols
        {
            assert!(!matches!(symbol, LzToken::Match { .. }));
        }
    }
}

#[test]
fn block_inspection_reports_structure()
{
    let input = b"inspect inspect inspect inspect inspect".repeat(50);

    let compressed = DeflateEncoder::new(&input).encode_zlib().unwrap();
    let blocks = extract_zlib_info(&compressed).unwrap();

    assert!(!blocks.is_empty());
    assert!(blocks.last().unwrap().is_final);

    let total: usize = blocks.iter().map(|b| b.uncompressed_bytes).sum();
    assert_eq!(total, input.len());

    for block in &blocks
    {
        if block.block_type == 2
        {
            assert!(block.hlit >= 257);
            assert!(block.hdist >= 1);
            assert!((4..=19).contains(&block.hclen));
            assert_eq!(block.litlen_lens.len(), block.hlit);
            assert_eq!(block.dist_lens.len(), block.hdist);
            assert!(matches!(block.symbols.last(), Some(LzToken::EndOfBlock)));
        }
    }
}

#[test]
fn convenience_wrappers_roundtrip()
{
    let input = b"wrapper round trip".to_vec();

    let compressed = zlib_compress(&input, &DeflateEncodeOptions::default()).unwrap();
    let decompressed = zlib_decompress(&compressed, &DeflateOptions::default()).unwrap();

    assert_eq!(decompressed, input);
}

#[test]
fn custom_hooks_bypass_the_engine()
{
    fn null_compressor(
        data: &[u8], _: &DeflateEncodeOptions
    ) -> Result<Vec<u8>, lume_inflate::errors::EncodeErrorStatus>
    {
        // identity "compressor" with a marker byte
        let mut out = vec![0xAB];
        out.extend_from_slice(data);
        Ok(out)
    }

    fn null_decompressor(
        data: &[u8], _: &DeflateOptions
    ) -> Result<Vec<u8>, lume_inflate::errors::InflateDecodeErrors>
    {
        Ok(data[1..].to_vec())
    }

    let input = b"hooked".to_vec();

    let compress_options = DeflateEncodeOptions::default().set_custom_zlib(null_compressor);
    let stream = zlib_compress(&input, &compress_options).unwrap();

    assert_eq!(stream[0], 0xAB);

    let decompress_options = DeflateOptions::default().set_custom_zlib(null_decompressor);
    let decoded = zlib_decompress(&stream, &decompress_options).unwrap();

    assert_eq!(decoded, input);
}
