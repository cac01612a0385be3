//! An incredibly spiffy deflate encoder and decoder.
//!
//! This crate implements the whole of RFC 1951 (DEFLATE) and the zlib
//! wrapper of RFC 1950 in safe Rust, with no dependencies.
//!
//! - [`DeflateDecoder`] inflates zlib or raw deflate streams.
//! - [`DeflateEncoder`] deflates byte buffers with stored, fixed or
//!   dynamic Huffman blocks, including hash-chain LZ77 matching with
//!   lazy evaluation.
//! - [`extract_zlib_info`] decodes a stream while recording the shape
//!   of every block, for inspection tools.
//!
//! # Example
//! ```
//! let data = vec![42_u8; 1000];
//!
//! let compressed = lume_inflate::zlib_compress(&data, &Default::default()).unwrap();
//!
//! let mut decoder = lume_inflate::DeflateDecoder::new(&compressed);
//! let decompressed = decoder.decode_zlib().unwrap();
//!
//! assert_eq!(data, decompressed);
//! ```
pub use crate::decoder::DeflateDecoder;
pub use crate::encoder::{DeflateEncoder, DeflateEncodingStrategy};
pub use crate::inspect::{extract_zlib_info, LzToken, ZlibBlockInfo};
pub use crate::options::{DeflateEncodeOptions, DeflateOptions};

mod bitstream;
mod constants;
mod decoder;
mod encoder;
pub mod errors;
mod huffman;
mod inspect;
mod lz77;
mod options;
mod utils;

use crate::errors::{EncodeErrorStatus, InflateDecodeErrors};

/// Compress `data` into a zlib stream.
///
/// When a custom compressor is configured in `options` it replaces the
/// built-in engine and its result (or error) is returned unchanged.
pub fn zlib_compress(data: &[u8], options: &DeflateEncodeOptions)
    -> Result<Vec<u8>, EncodeErrorStatus>
{
    if let Some(hook) = options.get_custom_zlib()
    {
        return hook(data, options);
    }
    DeflateEncoder::new_with_options(data, *options).encode_zlib()
}

/// Decompress a zlib stream.
///
/// When a custom decompressor is configured in `options` it replaces
/// the built-in engine and its result (or error) is returned unchanged.
pub fn zlib_decompress(data: &[u8], options: &DeflateOptions)
    -> Result<Vec<u8>, InflateDecodeErrors>
{
    if let Some(hook) = options.get_custom_zlib()
    {
        return hook(data, options);
    }
    DeflateDecoder::new_with_options(data, *options).decode_zlib()
}
