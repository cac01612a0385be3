//! The inflate side: blockwise deflate decoding plus zlib framing.

use crate::bitstream::BitStreamReader;
use crate::constants::{
    fill_fixed_code_lengths, DEFLATE_BLOCKTYPE_DYNAMIC_HUFFMAN, DEFLATE_BLOCKTYPE_STATIC,
    DEFLATE_BLOCKTYPE_UNCOMPRESSED, DEFLATE_MAX_CODEWORD_LENGTH, DEFLATE_MAX_LENS_OVERRUN,
    DEFLATE_MAX_PRE_CODEWORD_LEN, DEFLATE_NUM_LITLEN_SYMS, DEFLATE_NUM_OFFSET_SYMS,
    DEFLATE_NUM_PRECODE_SYMS, DEFLATE_PRECODE_LENS_PERMUTATION, DISTANCE_BASE,
    DISTANCE_EXTRA_BITS, HUFFDEC_SUBTABLE_POINTER, LENGTH_BASE, LENGTH_EXTRA_BITS, LITLEN_ENOUGH,
    LITLEN_TABLE_BITS, OFFSET_ENOUGH, OFFSET_TABLE_BITS, PRECODE_ENOUGH, PRECODE_TABLE_BITS
};
use crate::errors::DecodeErrorStatus::{self, CorruptData, InsufficientData};
use crate::errors::InflateDecodeErrors;
use crate::huffman::build_decode_table;
use crate::inspect::{LzToken, ZlibBlockInfo};
use crate::options::DeflateOptions;
use crate::utils::calc_adler_hash;

/// Decode one symbol from the stream using a two-level decode table.
///
/// The caller refills the stream; near the end of input the bit
/// buffer pads with zeroes, which either still resolves a genuine
/// short codeword or fails the `has` check here.
#[inline(always)]
fn decode_symbol(
    stream: &mut BitStreamReader, table: &[u32], table_bits: usize
) -> Result<u16, DecodeErrorStatus>
{
    let mut entry = table[stream.peek_var_bits(table_bits)];

    if entry & HUFFDEC_SUBTABLE_POINTER != 0
    {
        // codeword is longer than the root table, low byte holds the
        // root bits to consume before indexing the subtable
        if !stream.has(entry as u8)
        {
            return Err(InsufficientData);
        }
        stream.drop_bits(entry as u8);

        let subtable_bits = ((entry >> 8) & 0x3F) as usize;

        entry = table[(entry >> 16) as usize + stream.peek_var_bits(subtable_bits)];
    }

    if !stream.has(entry as u8)
    {
        return Err(InsufficientData);
    }
    stream.drop_bits(entry as u8);

    Ok((entry >> 16) as u16)
}

pub struct DeflateDecoder<'a>
{
    data:       &'a [u8],
    position:   usize,
    options:    DeflateOptions,
    block_info: Vec<ZlibBlockInfo>
}

impl<'a> DeflateDecoder<'a>
{
    pub fn new(data: &'a [u8]) -> DeflateDecoder<'a>
    {
        DeflateDecoder::new_with_options(data, DeflateOptions::default())
    }
    pub fn new_with_options(data: &'a [u8], options: DeflateOptions) -> DeflateDecoder<'a>
    {
        DeflateDecoder {
            data,
            position: 0,
            options,
            block_info: Vec::new()
        }
    }

    /// Block records collected during the last decode when
    /// [`DeflateOptions::set_inspect_blocks`] was set.
    pub fn take_block_info(&mut self) -> Vec<ZlibBlockInfo>
    {
        core::mem::take(&mut self.block_info)
    }

    /// Decode a zlib (RFC 1950) framed deflate stream.
    pub fn decode_zlib(&mut self) -> Result<Vec<u8>, InflateDecodeErrors>
    {
        if self.data.len()
            < 2 /* zlib header */
            + 4
        /* Adler32 */
        {
            return Err(InflateDecodeErrors::new_with_error(InsufficientData));
        }

        // Zlib flags
        // See https://www.ietf.org/rfc/rfc1950.txt for
        // the RFC
        let cmf = self.data[0];
        let flg = self.data[1];

        let cm = cmf & 0xF;
        let cinfo = cmf >> 4;

        // confirm we have the right deflate methods
        if cm != 8
        {
            if cm == 15
            {
                return Err(InflateDecodeErrors::new_with_error(
                    DecodeErrorStatus::Generic(
                        "CM of 15 is reserved by the standard, currently can't handle it"
                    )
                ));
            }
            return Err(InflateDecodeErrors::new_with_error(
                DecodeErrorStatus::GenericStr(format!("Unknown zlib compression method {cm}"))
            ));
        }
        if cinfo > 7
        {
            return Err(InflateDecodeErrors::new_with_error(
                DecodeErrorStatus::GenericStr(format!(
                    "Unknown cinfo `{cinfo}` greater than 7, not allowed"
                ))
            ));
        }
        let flag_checks = (u16::from(cmf) * 256) + u16::from(flg);

        if flag_checks % 31 != 0
        {
            return Err(InflateDecodeErrors::new_with_error(
                DecodeErrorStatus::Generic("FCHECK integrity not preserved")
            ));
        }
        if (flg >> 5) & 1 != 0
        {
            return Err(InflateDecodeErrors::new_with_error(
                DecodeErrorStatus::Generic("Preset dictionaries are not supported")
            ));
        }

        self.position = 2;

        let out = self.inflate()?;

        if self.options.get_confirm_adler()
        {
            let Some(trailer) = self
                .data
                .get(self.position..self.position + 4)
            else
            {
                return Err(InflateDecodeErrors::new(InsufficientData, out));
            };
            let expected = u32::from_be_bytes(trailer.try_into().unwrap());
            let found = calc_adler_hash(&out);

            if expected != found
            {
                return Err(InflateDecodeErrors::new(
                    DecodeErrorStatus::MismatchedAdler(expected, found),
                    out
                ));
            }
        }

        Ok(out)
    }

    /// Decode a bare deflate stream with no framing.
    pub fn decode_deflate(&mut self) -> Result<Vec<u8>, InflateDecodeErrors>
    {
        self.position = 0;
        self.inflate()
    }

    fn inflate(&mut self) -> Result<Vec<u8>, InflateDecodeErrors>
    {
        let mut out = Vec::with_capacity(
            (self.data.len().saturating_mul(3)).min(self.options.get_limit())
        );

        match self.inflate_inner(&mut out)
        {
            Ok(()) => Ok(out),
            Err(status) => Err(InflateDecodeErrors::new(status, out))
        }
    }

    fn inflate_inner(&mut self, out: &mut Vec<u8>) -> Result<(), DecodeErrorStatus>
    {
        const COUNT: usize =
            DEFLATE_NUM_LITLEN_SYMS + DEFLATE_NUM_OFFSET_SYMS + DEFLATE_MAX_LENS_OVERRUN;

        let data = self.data;
        let src = &data[self.position.min(data.len())..];
        let mut stream = BitStreamReader::new(src);

        let limit = self.options.get_limit();
        let inspecting = self.options.get_inspect_blocks();

        let mut precode_lens = [0_u8; DEFLATE_NUM_PRECODE_SYMS];
        let mut precode_decode_table = [0_u32; PRECODE_ENOUGH];
        let mut litlen_decode_table = [0_u32; LITLEN_ENOUGH];
        let mut offset_decode_table = [0_u32; OFFSET_ENOUGH];

        let mut lens = [0_u8; COUNT];

        let mut num_litlen_syms = 0;
        let mut num_offset_syms = 0;
        let mut static_codes_loaded = false;

        'block: loop
        {
            stream.refill();

            if !stream.has(3)
            {
                return Err(InsufficientData);
            }

            let block_start_bits = stream.bits_consumed();
            let out_start = out.len();

            let is_last_block = stream.get_bits(1) == 1;
            let block_type = stream.get_bits(2);

            let mut info = inspecting.then(|| ZlibBlockInfo {
                is_final: is_last_block,
                block_type: block_type as u8,
                ..ZlibBlockInfo::default()
            });

            if block_type == DEFLATE_BLOCKTYPE_UNCOMPRESSED
            {
                /*
                 * Uncompressed block: skip any remaining bits in the
                 * current partially processed byte, read LEN and NLEN,
                 * copy LEN bytes literally.
                 */
                stream.align_to_byte();

                let pos = stream.get_position();

                let Some(header) = src.get(pos..pos + 4)
                else
                {
                    return Err(InsufficientData);
                };
                let len = u16::from_le_bytes(header[0..2].try_into().unwrap());
                let nlen = u16::from_le_bytes(header[2..4].try_into().unwrap());

                if len != !nlen
                {
                    return Err(DecodeErrorStatus::MismatchedStoredLen(len, nlen));
                }
                let len = usize::from(len);

                let Some(block) = src.get(pos + 4..pos + 4 + len)
                else
                {
                    return Err(InsufficientData);
                };

                if out.len() + len > limit
                {
                    return Err(DecodeErrorStatus::OutputLimitExceeded(
                        limit,
                        out.len() + len
                    ));
                }
                out.extend_from_slice(block);
                stream.advance(4 + len);

                if let Some(info) = info.as_mut()
                {
                    info.compressed_bits = stream.bits_consumed() - block_start_bits;
                    info.uncompressed_bytes = out.len() - out_start;
                }
                if let Some(info) = info
                {
                    self.block_info.push(info);
                }

                if is_last_block
                {
                    break 'block;
                }
                continue 'block;
            }
            else if block_type == DEFLATE_BLOCKTYPE_STATIC
            {
                if !static_codes_loaded
                {
                    fill_fixed_code_lengths(&mut lens);

                    num_litlen_syms = DEFLATE_NUM_LITLEN_SYMS;
                    num_offset_syms = DEFLATE_NUM_OFFSET_SYMS;

                    build_decode_table(
                        &lens[num_litlen_syms..num_litlen_syms + num_offset_syms],
                        &mut offset_decode_table,
                        OFFSET_TABLE_BITS,
                        num_offset_syms,
                        DEFLATE_MAX_CODEWORD_LENGTH
                    )?;
                    build_decode_table(
                        &lens,
                        &mut litlen_decode_table,
                        LITLEN_TABLE_BITS,
                        num_litlen_syms,
                        DEFLATE_MAX_CODEWORD_LENGTH
                    )?;

                    static_codes_loaded = true;
                }
            }
            else if block_type == DEFLATE_BLOCKTYPE_DYNAMIC_HUFFMAN
            {
                // Dynamic Huffman block
                // Read codeword lengths
                if !stream.has(14)
                {
                    return Err(InsufficientData);
                }
                num_litlen_syms = 257 + stream.get_bits(5) as usize;
                num_offset_syms = 1 + stream.get_bits(5) as usize;

                let num_explicit_precode_lens = 4 + stream.get_bits(4) as usize;

                static_codes_loaded = false;
                precode_lens = [0; DEFLATE_NUM_PRECODE_SYMS];

                for i in DEFLATE_PRECODE_LENS_PERMUTATION
                    .iter()
                    .take(num_explicit_precode_lens)
                {
                    if !stream.has(3)
                    {
                        stream.refill();

                        if !stream.has(3)
                        {
                            return Err(InsufficientData);
                        }
                    }
                    precode_lens[usize::from(*i)] = stream.get_bits(3) as u8;
                }

                build_decode_table(
                    &precode_lens,
                    &mut precode_decode_table,
                    PRECODE_TABLE_BITS,
                    DEFLATE_NUM_PRECODE_SYMS,
                    DEFLATE_MAX_PRE_CODEWORD_LEN
                )?;

                /* Decode the litlen and offset codeword lengths. */
                let total_syms = num_litlen_syms + num_offset_syms;
                let mut i = 0;

                while i < total_syms
                {
                    // a precode codeword plus its longest repeat field
                    if !stream.has((DEFLATE_MAX_PRE_CODEWORD_LEN + 7) as u8)
                    {
                        stream.refill();
                    }
                    let entry = precode_decode_table[stream.peek_var_bits(PRECODE_TABLE_BITS)];

                    if !stream.has(entry as u8)
                    {
                        return Err(InsufficientData);
                    }
                    stream.drop_bits(entry as u8);

                    let presym = entry >> 16;

                    if presym < 16
                    {
                        // explicit codeword length
                        lens[i] = presym as u8;
                        i += 1;
                        continue;
                    }

                    /*
                     * Run-length encoded codeword lengths.
                     *
                     * Note: we don't need to verify that the repeat
                     * count doesn't overflow the number of elements,
                     * since the lens array has enough extra space for
                     * the worst-case overrun (138 zeroes when only 1
                     * length was remaining). For the small repeat
                     * counts it is fastest to always write the
                     * maximum number of entries.
                     */
                    if presym == 16
                    {
                        // repeat previous length 3 to 6 times
                        if i == 0
                        {
                            return Err(CorruptData);
                        }
                        if !stream.has(2)
                        {
                            return Err(InsufficientData);
                        }
                        let rep_val = lens[i - 1];
                        let rep_count = 3 + stream.get_bits(2) as usize;

                        lens[i..i + 6].fill(rep_val);

                        i += rep_count;
                    }
                    else if presym == 17
                    {
                        /* Repeat zero 3 - 10 times. */
                        if !stream.has(3)
                        {
                            return Err(InsufficientData);
                        }
                        let rep_count = 3 + stream.get_bits(3) as usize;

                        lens[i..i + 10].fill(0);

                        i += rep_count;
                    }
                    else
                    {
                        // repeat zero 11-138 times.
                        if !stream.has(7)
                        {
                            return Err(InsufficientData);
                        }
                        let rep_count = 11 + stream.get_bits(7) as usize;

                        lens[i..i + rep_count].fill(0);

                        i += rep_count;
                    }
                }

                if i != total_syms
                {
                    // a repeat ran across the litlen/offset boundary
                    return Err(CorruptData);
                }

                build_decode_table(
                    &lens[num_litlen_syms..num_litlen_syms + num_offset_syms],
                    &mut offset_decode_table,
                    OFFSET_TABLE_BITS,
                    num_offset_syms,
                    DEFLATE_MAX_CODEWORD_LENGTH
                )?;

                build_decode_table(
                    &lens,
                    &mut litlen_decode_table,
                    LITLEN_TABLE_BITS,
                    num_litlen_syms,
                    DEFLATE_MAX_CODEWORD_LENGTH
                )?;

                if let Some(info) = info.as_mut()
                {
                    info.hlit = num_litlen_syms;
                    info.hdist = num_offset_syms;
                    info.hclen = num_explicit_precode_lens;
                    info.precode_lens = precode_lens.to_vec();
                }
            }
            else
            {
                return Err(DecodeErrorStatus::Generic("Invalid block type 3"));
            }

            if let Some(info) = info.as_mut()
            {
                info.litlen_lens = lens[..num_litlen_syms].to_vec();
                info.dist_lens = lens[num_litlen_syms..num_litlen_syms + num_offset_syms].to_vec();
            }

            // literal and match decoding.
            //
            // One refill per iteration covers the worst case of
            // 15 (litlen) + 5 (length extra) + 15 (offset) + 13
            // (offset extra) = 48 bits.
            'symbols: loop
            {
                stream.refill();

                let sym = decode_symbol(&mut stream, &litlen_decode_table, LITLEN_TABLE_BITS)?;

                if sym < 256
                {
                    if out.len() + 1 > limit
                    {
                        return Err(DecodeErrorStatus::OutputLimitExceeded(limit, out.len() + 1));
                    }
                    out.push(sym as u8);

                    if let Some(info) = info.as_mut()
                    {
                        info.symbols.push(LzToken::Literal(sym as u8));
                    }
                    continue 'symbols;
                }
                if sym == 256
                {
                    if let Some(info) = info.as_mut()
                    {
                        info.symbols.push(LzToken::EndOfBlock);
                    }
                    break 'symbols;
                }

                let index = usize::from(sym - 257);

                if index >= LENGTH_BASE.len()
                {
                    return Err(CorruptData);
                }
                let extra_bits = LENGTH_EXTRA_BITS[index];

                if !stream.has(extra_bits)
                {
                    return Err(InsufficientData);
                }
                let length =
                    usize::from(LENGTH_BASE[index]) + stream.get_bits(extra_bits) as usize;

                let offset_sym =
                    decode_symbol(&mut stream, &offset_decode_table, OFFSET_TABLE_BITS)?;
                let offset_index = usize::from(offset_sym);

                if offset_index >= DISTANCE_BASE.len()
                {
                    return Err(CorruptData);
                }
                let offset_extra = DISTANCE_EXTRA_BITS[offset_index];

                if !stream.has(offset_extra)
                {
                    return Err(InsufficientData);
                }
                let offset = usize::from(DISTANCE_BASE[offset_index])
                    + stream.get_bits(offset_extra) as usize;

                if offset > out.len()
                {
                    return Err(DecodeErrorStatus::CorruptDistance(offset, out.len()));
                }
                if out.len() + length > limit
                {
                    return Err(DecodeErrorStatus::OutputLimitExceeded(
                        limit,
                        out.len() + length
                    ));
                }

                let start = out.len() - offset;

                if offset >= length
                {
                    // non overlapping, a single memmove
                    out.extend_from_within(start..start + length);
                }
                else
                {
                    out.reserve(length);

                    for k in 0..length
                    {
                        let byte = out[start + k];
                        out.push(byte);
                    }
                }

                if let Some(info) = info.as_mut()
                {
                    info.symbols.push(LzToken::Match {
                        length:   length as u16,
                        distance: offset as u16
                    });
                }
            }

            if let Some(mut info) = info
            {
                info.compressed_bits = stream.bits_consumed() - block_start_bits;
                info.uncompressed_bytes = out.len() - out_start;
                self.block_info.push(info);
            }

            if is_last_block
            {
                break 'block;
            }
        }

        // whole bytes consumed, for the zlib trailer position
        self.position += (stream.bits_consumed() + 7) / 8;

        Ok(())
    }
}

#[cfg(test)]
mod tests
{
    use super::DeflateDecoder;
    use crate::options::DeflateOptions;

    #[test]
    fn rejects_bad_zlib_header()
    {
        // CM of 7 is not deflate
        let data = [0x77, 0x9C, 0, 0, 0, 0, 0, 0];
        assert!(DeflateDecoder::new(&data).decode_zlib().is_err());

        // bad FCHECK
        let data = [0x78, 0x9D, 0, 0, 0, 0, 0, 0];
        assert!(DeflateDecoder::new(&data).decode_zlib().is_err());
    }

    #[test]
    fn decodes_stored_block()
    {
        // BFINAL=1 BTYPE=00, LEN=5 NLEN=!5, "hello"
        let mut data = vec![0b0000_0001, 5, 0, 0xFA, 0xFF];
        data.extend_from_slice(b"hello");

        let decoded = DeflateDecoder::new(&data).decode_deflate().unwrap();

        assert_eq!(decoded, b"hello");
    }

    #[test]
    fn stored_block_nlen_mismatch_is_error()
    {
        let mut data = vec![0b0000_0001, 5, 0, 0xFB, 0xFF];
        data.extend_from_slice(b"hello");

        assert!(DeflateDecoder::new(&data).decode_deflate().is_err());
    }

    #[test]
    fn output_limit_is_enforced()
    {
        let payload = vec![7_u8; 4096];
        let compressed = miniz_oxide::deflate::compress_to_vec_zlib(&payload, 6);

        let options = DeflateOptions::default().set_limit(100);
        let result = DeflateDecoder::new_with_options(&compressed, options).decode_zlib();

        assert!(result.is_err());
    }

    #[test]
    fn decodes_miniz_streams()
    {
        let mut payload = Vec::new();

        for i in 0_u32..10_000
        {
            payload.push((i * 17 % 256) as u8);
            if i % 50 == 0
            {
                payload.extend_from_slice(b"some repeated text to give the matcher work");
            }
        }

        for level in [0, 1, 6, 10]
        {
            let compressed = miniz_oxide::deflate::compress_to_vec_zlib(&payload, level);
            let decoded = DeflateDecoder::new(&compressed).decode_zlib().unwrap();

            assert_eq!(decoded, payload, "level {level}");
        }
    }

    #[test]
    fn corrupt_adler_is_reported_and_ignorable()
    {
        let payload = b"adler adler adler".to_vec();
        let mut compressed = miniz_oxide::deflate::compress_to_vec_zlib(&payload, 6);

        let last = compressed.len() - 1;
        compressed[last] ^= 0xFF;

        assert!(DeflateDecoder::new(&compressed).decode_zlib().is_err());

        let options = DeflateOptions::default().set_confirm_adler(false);
        let decoded = DeflateDecoder::new_with_options(&compressed, options)
            .decode_zlib()
            .unwrap();

        assert_eq!(decoded, payload);
    }
}
