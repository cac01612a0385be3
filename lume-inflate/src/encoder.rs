/*
 * Copyright (c) 2023.
 *
 * This software is free software; You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! The deflate side: blockwise encoding with stored, fixed and
//! dynamic Huffman blocks, plus zlib framing.

use crate::bitstream::BitStreamWriter;
use crate::constants::{
    distance_to_symbol, fill_fixed_code_lengths, length_to_symbol, DEFLATE_MAX_CODEWORD_LENGTH,
    DEFLATE_NUM_LITLEN_SYMS, DEFLATE_NUM_OFFSET_SYMS, DEFLATE_PRECODE_LENS_PERMUTATION
};
use crate::errors::EncodeErrorStatus;
use crate::huffman::{build_codes, build_lengths};
use crate::lz77::{self, MatchFinderOptions, Token};
pub use crate::options::{DeflateEncodeOptions, DeflateEncodingStrategy};
use crate::utils::calc_adler_hash;

/// Literal/length symbols an encoder can actually emit (286 and 287
/// exist only in the fixed code).
const NUM_LITLEN_USED: usize = 286;
const NUM_OFFSET_USED: usize = 30;

/// Largest stored-block payload, LEN is a u16.
const MAX_STORED_LEN: usize = u16::MAX as usize;

/// One run-length coded element of the code-length stream:
/// (symbol, extra bit count, extra bits value).
type RleSym = (u8, u8, u8);

pub struct DeflateEncoder<'a>
{
    data:    &'a [u8],
    options: DeflateEncodeOptions
}

impl<'a> DeflateEncoder<'a>
{
    /// Create a new deflate encoder with default options.
    pub fn new(data: &'a [u8]) -> DeflateEncoder<'a>
    {
        DeflateEncoder::new_with_options(data, DeflateEncodeOptions::default())
    }
    pub fn new_with_options(data: &'a [u8], options: DeflateEncodeOptions) -> DeflateEncoder<'a>
    {
        DeflateEncoder { data, options }
    }

    /// Encode the input as a zlib (RFC 1950) stream.
    pub fn encode_zlib(&mut self) -> Result<Vec<u8>, EncodeErrorStatus>
    {
        self.options.validate()?;

        let mut out = Vec::with_capacity(self.data.len() / 2 + 64);

        self.write_zlib_header(&mut out);
        self.encode_blocks_into(&mut out);

        // add adler hash
        let hash = calc_adler_hash(self.data);
        out.extend_from_slice(&hash.to_be_bytes());

        Ok(out)
    }

    /// Encode the input as a bare deflate stream.
    pub fn encode_deflate(&mut self) -> Result<Vec<u8>, EncodeErrorStatus>
    {
        self.options.validate()?;

        let mut out = Vec::with_capacity(self.data.len() / 2 + 64);
        self.encode_blocks_into(&mut out);

        Ok(out)
    }

    fn write_zlib_header(&self, out: &mut Vec<u8>)
    {
        const ZLIB_CM_DEFLATE: u16 = 8;

        // CINFO is log2(window) - 8, the window was validated to be a
        // power of two in 256..=32768
        let cinfo = self.options.get_window_size().trailing_zeros() as u16 - 8;
        let level_hint = self.options.get_strategy().to_level();

        let mut hdr = (ZLIB_CM_DEFLATE << 8) | (cinfo << 12);

        hdr |= u16::from(level_hint) << 6;
        hdr |= 31 - (hdr % 31);

        out.extend_from_slice(&hdr.to_be_bytes());
    }

    fn encode_blocks_into(&self, out: &mut Vec<u8>)
    {
        let mut writer = BitStreamWriter::with_buffer(core::mem::take(out));

        if self.options.get_strategy() == DeflateEncodingStrategy::NoCompression
        {
            self.encode_no_compression(&mut writer);
            *out = writer.finish();
            return;
        }

        let tokens = if self.options.get_use_lz77()
        {
            let mf_options = MatchFinderOptions {
                window_size: self.options.get_window_size(),
                max_chain:   self.options.get_window_size(),
                nice_match:  self.options.get_nice_match(),
                min_match:   self.options.get_min_match().clamp(3, 258),
                lazy:        self.options.get_lazy_matching()
            };
            lz77::compress(self.data, &mf_options)
        }
        else
        {
            self.data.iter().map(|b| Token::Literal(*b)).collect()
        };

        // Split the token stream into blocks bounded by uncompressed
        // size, so each block gets trees fitted to its own statistics.
        let block_size = match self.options.get_block_size()
        {
            0 => (self.data.len() / 8 + 8).clamp(1 << 16, 1 << 18),
            n => n
        };

        let mut token_start = 0;
        let mut byte_start = 0;

        while token_start < tokens.len() || byte_start == 0
        {
            let mut token_end = token_start;
            let mut byte_end = byte_start;

            while token_end < tokens.len() && byte_end - byte_start < block_size
            {
                byte_end += match tokens[token_end]
                {
                    Token::Literal(_) => 1,
                    Token::Match { length, .. } => usize::from(length)
                };
                token_end += 1;
            }

            let is_last = token_end == tokens.len();

            self.emit_block(
                &mut writer,
                &tokens[token_start..token_end],
                &self.data[byte_start..byte_end],
                is_last
            );

            token_start = token_end;
            byte_start = byte_end;

            if is_last
            {
                break;
            }
        }

        *out = writer.finish();
    }

    /// Encode deflate data blocks with no compression
    fn encode_no_compression(&self, writer: &mut BitStreamWriter)
    {
        /*
         * If the input is zero-length, we still must output a block in
         * order for the output to be a valid DEFLATE stream.
         */
        if self.data.is_empty()
        {
            emit_stored(writer, &[], true);
            return;
        }

        let chunk_count = self.data.len().div_ceil(MAX_STORED_LEN);

        for (i, chunk) in self.data.chunks(MAX_STORED_LEN).enumerate()
        {
            emit_stored(writer, chunk, i + 1 == chunk_count);
        }
    }

    /// Write one logical block, choosing the cheapest representation
    /// its strategy allows.
    fn emit_block(&self, writer: &mut BitStreamWriter, tokens: &[Token], raw: &[u8], is_last: bool)
    {
        let mut lit_freqs = [0_u32; NUM_LITLEN_USED];
        let mut dist_freqs = [0_u32; NUM_OFFSET_USED];
        // extra bits cost the same under any code
        let mut extra_bits: usize = 0;

        for token in tokens
        {
            match token
            {
                Token::Literal(byte) => lit_freqs[usize::from(*byte)] += 1,
                Token::Match { length, distance } =>
                {
                    let (sym, len_extra, _) = length_to_symbol(*length);
                    let (dsym, dist_extra, _) = distance_to_symbol(*distance);

                    lit_freqs[usize::from(sym)] += 1;
                    dist_freqs[usize::from(dsym)] += 1;
                    extra_bits += usize::from(len_extra) + usize::from(dist_extra);
                }
            }
        }
        lit_freqs[256] += 1;

        // fixed representation cost
        let mut fixed_lens = [0_u8; DEFLATE_NUM_LITLEN_SYMS + DEFLATE_NUM_OFFSET_SYMS];
        fill_fixed_code_lengths(&mut fixed_lens);

        let fixed_bits = 3
            + cost_bits(&lit_freqs, &fixed_lens[..NUM_LITLEN_USED])
            + cost_bits(&dist_freqs, &fixed_lens[DEFLATE_NUM_LITLEN_SYMS..])
            + extra_bits;

        // stored representation cost, header bytes per 65535 chunk
        // plus up to seven alignment bits
        let stored_bits = 8 * raw.len() + 40 * raw.len().div_ceil(MAX_STORED_LEN).max(1) + 7;

        // a forced block type is honored as-is
        if self.options.get_strategy() == DeflateEncodingStrategy::Fixed
        {
            writer.write_bits(u64::from(is_last), 1);
            writer.write_bits(1, 2);
            write_tokens(writer, tokens, &fixed_lens);
            return;
        }

        // dynamic representation: fit trees to this block
        let lit_lens = build_lengths(&lit_freqs, DEFLATE_MAX_CODEWORD_LENGTH);
        let dist_lens = build_lengths(&dist_freqs, DEFLATE_MAX_CODEWORD_LENGTH);

        let hlit = trimmed_len(&lit_lens, 257);
        let hdist = trimmed_len(&dist_lens, 1);

        let mut all_lens = Vec::with_capacity(hlit + hdist);
        all_lens.extend_from_slice(&lit_lens[..hlit]);
        all_lens.extend_from_slice(&dist_lens[..hdist]);

        let rle = rle_code_lengths(&all_lens);

        let mut cl_freqs = [0_u32; 19];

        for (sym, _, _) in &rle
        {
            cl_freqs[usize::from(*sym)] += 1;
        }
        let cl_lens = build_lengths(&cl_freqs, 7);

        let mut hclen = 19;

        while hclen > 4
            && cl_lens[usize::from(DEFLATE_PRECODE_LENS_PERMUTATION[hclen - 1])] == 0
        {
            hclen -= 1;
        }

        let tree_bits = 14
            + 3 * hclen
            + rle
                .iter()
                .map(|(sym, eb, _)| usize::from(cl_lens[usize::from(*sym)]) + usize::from(*eb))
                .sum::<usize>();

        let mut dynamic_lens = [0_u8; DEFLATE_NUM_LITLEN_SYMS + DEFLATE_NUM_OFFSET_SYMS];
        dynamic_lens[..NUM_LITLEN_USED].copy_from_slice(&lit_lens);
        dynamic_lens[DEFLATE_NUM_LITLEN_SYMS..DEFLATE_NUM_LITLEN_SYMS + NUM_OFFSET_USED]
            .copy_from_slice(&dist_lens);

        let dynamic_bits = 3
            + tree_bits
            + cost_bits(&lit_freqs, &dynamic_lens[..NUM_LITLEN_USED])
            + cost_bits(&dist_freqs, &dynamic_lens[DEFLATE_NUM_LITLEN_SYMS..])
            + extra_bits;

        if stored_bits <= fixed_bits && stored_bits <= dynamic_bits
        {
            self.emit_raw_chunks(writer, raw, is_last);
            return;
        }
        if fixed_bits <= dynamic_bits
        {
            writer.write_bits(u64::from(is_last), 1);
            writer.write_bits(1, 2);
            write_tokens(writer, tokens, &fixed_lens);
            return;
        }

        // dynamic wins, write the tree description then the data
        writer.write_bits(u64::from(is_last), 1);
        writer.write_bits(2, 2);

        writer.write_bits((hlit - 257) as u64, 5);
        writer.write_bits((hdist - 1) as u64, 5);
        writer.write_bits((hclen - 4) as u64, 4);

        for i in 0..hclen
        {
            let sym = usize::from(DEFLATE_PRECODE_LENS_PERMUTATION[i]);
            writer.write_bits(u64::from(cl_lens[sym]), 3);
        }

        let cl_codes = build_codes(&cl_lens);

        for (sym, eb, ev) in &rle
        {
            let sym = usize::from(*sym);

            writer.write_bits(u64::from(cl_codes[sym]), cl_lens[sym]);

            if *eb > 0
            {
                writer.write_bits(u64::from(*ev), *eb);
            }
        }

        write_tokens(writer, tokens, &dynamic_lens);
    }

    /// Stored representation of a block the entropy coder lost on.
    fn emit_raw_chunks(&self, writer: &mut BitStreamWriter, raw: &[u8], is_last: bool)
    {
        if raw.is_empty()
        {
            emit_stored(writer, &[], is_last);
            return;
        }
        let chunk_count = raw.len().div_ceil(MAX_STORED_LEN);

        for (i, chunk) in raw.chunks(MAX_STORED_LEN).enumerate()
        {
            emit_stored(writer, chunk, is_last && i + 1 == chunk_count);
        }
    }
}

/// Bits needed to code `freqs` under the code lengths `lens`,
/// excluding extra bits.
fn cost_bits(freqs: &[u32], lens: &[u8]) -> usize
{
    freqs
        .iter()
        .zip(lens.iter())
        .map(|(f, l)| *f as usize * usize::from(*l))
        .sum()
}

/// Index one past the last nonzero length, bounded below.
fn trimmed_len(lens: &[u8], min: usize) -> usize
{
    let mut len = lens.len();

    while len > min && lens[len - 1] == 0
    {
        len -= 1;
    }
    len
}

/// Run-length code a lit/dist code-length vector into the 0..=18
/// alphabet of RFC 1951 §3.2.7.
fn rle_code_lengths(lens: &[u8]) -> Vec<RleSym>
{
    let mut rle = Vec::with_capacity(lens.len() / 2 + 8);
    let mut i = 0;

    while i < lens.len()
    {
        let value = lens[i];
        let mut run = 1;

        while i + run < lens.len() && lens[i + run] == value
        {
            run += 1;
        }
        i += run;

        if value == 0
        {
            while run >= 11
            {
                let n = run.min(138);
                rle.push((18, 7, (n - 11) as u8));
                run -= n;
            }
            if run >= 3
            {
                rle.push((17, 3, (run - 3) as u8));
                run = 0;
            }
            for _ in 0..run
            {
                rle.push((0, 0, 0));
            }
        }
        else
        {
            // symbol 16 repeats the previously written length
            rle.push((value, 0, 0));
            run -= 1;

            while run >= 3
            {
                let n = run.min(6);
                rle.push((16, 2, (n - 3) as u8));
                run -= n;
            }
            for _ in 0..run
            {
                rle.push((value, 0, 0));
            }
        }
    }
    rle
}

/// One stored block, 65535 bytes or fewer.
fn emit_stored(writer: &mut BitStreamWriter, chunk: &[u8], bfinal: bool)
{
    debug_assert!(chunk.len() <= MAX_STORED_LEN);

    writer.write_bits(u64::from(bfinal), 1);
    writer.write_bits(0, 2);
    writer.align_to_byte();

    let len = chunk.len() as u16;

    writer.put_slice(&len.to_le_bytes());
    writer.put_slice(&(!len).to_le_bytes());
    writer.put_slice(chunk);
}

/// Write the token stream and the end-of-block symbol under the code
/// described by `lens` (288 literal/length entries followed by 32
/// offset entries).
fn write_tokens(writer: &mut BitStreamWriter, tokens: &[Token], lens: &[u8])
{
    let lit_codes = build_codes(&lens[..DEFLATE_NUM_LITLEN_SYMS]);
    let dist_codes = build_codes(&lens[DEFLATE_NUM_LITLEN_SYMS..]);
    let dist_lens = &lens[DEFLATE_NUM_LITLEN_SYMS..];

    for token in tokens
    {
        match token
        {
            Token::Literal(byte) =>
            {
                let sym = usize::from(*byte);
                writer.write_bits(u64::from(lit_codes[sym]), lens[sym]);
            }
            Token::Match { length, distance } =>
            {
                let (sym, len_extra, len_val) = length_to_symbol(*length);
                let sym = usize::from(sym);

                writer.write_bits(u64::from(lit_codes[sym]), lens[sym]);

                if len_extra > 0
                {
                    writer.write_bits(u64::from(len_val), len_extra);
                }

                let (dsym, dist_extra, dist_val) = distance_to_symbol(*distance);
                let dsym = usize::from(dsym);

                writer.write_bits(u64::from(dist_codes[dsym]), dist_lens[dsym]);

                if dist_extra > 0
                {
                    writer.write_bits(u64::from(dist_val), dist_extra);
                }
            }
        }
    }
    writer.write_bits(u64::from(lit_codes[256]), lens[256]);
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::DeflateDecoder;

    #[test]
    fn rle_splits_runs_correctly()
    {
        let lens = [0_u8; 150];
        let rle = rle_code_lengths(&lens);

        assert_eq!(rle, vec![(18, 7, 127), (18, 7, 1)]);

        let lens = [8_u8; 9];
        let rle = rle_code_lengths(&lens);

        assert_eq!(rle, vec![(8, 0, 0), (16, 2, 3), (16, 2, 0), (8, 0, 0), (8, 0, 0)]);
    }

    #[test]
    fn stored_roundtrip()
    {
        let data: Vec<u8> = (0_u32..100_000).map(|i| (i % 255) as u8).collect();

        let options =
            DeflateEncodeOptions::default().set_strategy(DeflateEncodingStrategy::NoCompression);
        let encoded = DeflateEncoder::new_with_options(&data, options)
            .encode_zlib()
            .unwrap();

        let decoded = DeflateDecoder::new(&encoded).decode_zlib().unwrap();

        assert_eq!(decoded, data);
    }

    #[test]
    fn empty_input_is_a_valid_stream()
    {
        for strategy in [
            DeflateEncodingStrategy::NoCompression,
            DeflateEncodingStrategy::Fixed,
            DeflateEncodingStrategy::Dynamic
        ]
        {
            let options = DeflateEncodeOptions::default().set_strategy(strategy);
            let encoded = DeflateEncoder::new_with_options(&[], options)
                .encode_zlib()
                .unwrap();

            let decoded = DeflateDecoder::new(&encoded).decode_zlib().unwrap();

            assert!(decoded.is_empty(), "{strategy:?}");
        }
    }

    #[test]
    fn window_validation()
    {
        let options = DeflateEncodeOptions::default().set_window_size(3000);
        assert!(DeflateEncoder::new_with_options(b"x", options)
            .encode_zlib()
            .is_err());

        let options = DeflateEncodeOptions::default().set_window_size(128);
        assert!(DeflateEncoder::new_with_options(b"x", options)
            .encode_zlib()
            .is_err());

        let options = DeflateEncodeOptions::default().set_window_size(32768);
        assert!(DeflateEncoder::new_with_options(b"x", options)
            .encode_zlib()
            .is_ok());
    }

    #[test]
    fn zlib_header_is_valid()
    {
        let encoded = DeflateEncoder::new(b"check the framing").encode_zlib().unwrap();

        let check = u16::from(encoded[0]) * 256 + u16::from(encoded[1]);

        assert_eq!(encoded[0] & 0xF, 8);
        assert_eq!(check % 31, 0);
    }
}
