//! Per-block stream inspection.
//!
//! Chunk and compression introspection tools want to see how a zlib
//! stream is put together, not just its bytes. Decoding with
//! [`DeflateOptions::set_inspect_blocks`](crate::DeflateOptions::set_inspect_blocks)
//! records one [`ZlibBlockInfo`] per deflate block.

use crate::decoder::DeflateDecoder;
use crate::errors::InflateDecodeErrors;
use crate::options::DeflateOptions;

/// One decoded element of a block's symbol stream.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LzToken
{
    Literal(u8),
    Match
    {
        length:   u16,
        distance: u16
    },
    EndOfBlock
}

/// The shape of a single deflate block.
///
/// For stored blocks only the sizes are meaningful; for fixed blocks
/// the code length vectors hold the RFC 1951 fixed lengths and the
/// header counts stay zero.
#[derive(Clone, Debug, Default)]
pub struct ZlibBlockInfo
{
    /// Whether the BFINAL bit was set.
    pub is_final:           bool,
    /// BTYPE, 0|1|2.
    pub block_type:         u8,
    /// Compressed size in bits, header included.
    pub compressed_bits:    usize,
    /// Bytes the block decoded to.
    pub uncompressed_bytes: usize,
    /// Literal/length codes declared in the header (dynamic only).
    pub hlit:               usize,
    /// Distance codes declared in the header (dynamic only).
    pub hdist:              usize,
    /// Explicit precode lengths in the header (dynamic only).
    pub hclen:              usize,
    /// Code lengths of the code-length alphabet, index order.
    pub precode_lens:       Vec<u8>,
    /// Code lengths of the literal/length alphabet.
    pub litlen_lens:        Vec<u8>,
    /// Code lengths of the distance alphabet.
    pub dist_lens:          Vec<u8>,
    /// The decoded LZ77 symbol stream.
    pub symbols:            Vec<LzToken>
}

/// Decode a zlib stream, returning the structure of every block.
///
/// The Adler-32 trailer is not verified; inspection is expected to
/// run on possibly damaged files.
pub fn extract_zlib_info(data: &[u8]) -> Result<Vec<ZlibBlockInfo>, InflateDecodeErrors>
{
    let options = DeflateOptions::default()
        .set_inspect_blocks(true)
        .set_confirm_adler(false);

    let mut decoder = DeflateDecoder::new_with_options(data, options);

    decoder.decode_zlib()?;

    Ok(decoder.take_block_info())
}
