//! A PNG decoder and encoder built for bit-faithful round trips.
//!
//! The decoder takes a complete PNG byte stream and returns raw
//! pixels in a requested color mode; the encoder takes raw pixels
//! and produces a stream, by default auto-choosing the smallest
//! color mode that holds the image losslessly. Ancillary metadata
//! (background, physical size, time, text) and unknown ancillary
//! chunks survive a decode→encode round trip.
//!
//! Compression is provided by the sibling `lume-inflate` crate; a
//! caller can substitute its own zlib implementation through the
//! option hooks.
//!
//! # Decoding
//! ```no_run
//! use lume_png::PngDecoder;
//!
//! let data = std::fs::read("image.png").unwrap();
//!
//! let mut decoder = PngDecoder::new(&data);
//! let pixels = decoder.decode().unwrap();
//! let (width, height) = decoder.get_dimensions().unwrap();
//! # let _ = (pixels, width, height);
//! ```
//!
//! # Encoding
//! ```
//! use lume_png::{ColorMode, EncoderOptions, PngColor, PngEncoder};
//!
//! let pixels = [0_u8, 0, 255, 255]; // one blue pixel
//!
//! let options = EncoderOptions::new(1, 1, ColorMode::new(PngColor::RGBA, 8));
//! let png = PngEncoder::new(&pixels, options).encode().unwrap();
//! # let _ = png;
//! ```
pub use chunks::{inspect_chunks, ChunkSummary};
pub use color::{ColorMode, PLTEEntry};
pub use decoder::{Background, PhysInfo, PngDecoder, PngInfo, TimeInfo};
pub use encoder::PngEncoder;
pub use enums::{FilterStrategy, FilterType, InterlaceMethod, PngColor};
pub use options::{DecoderOptions, EncoderOptions};
pub use text::{ItxtChunk, TextChunk};

mod adam7;
mod chunks;
mod color;
mod constants;
mod crc;
mod decoder;
mod encoder;
mod enums;
pub mod error;
mod filters;
mod headers;
mod options;
mod text;
