//! A simple implementation of a bytestream reader
//! and writer.
//!
//! The reader hands out integers in either endianness from a borrowed
//! slice, the writer accumulates them into a growing vector. Both are
//! used by the PNG chunk layer and the zlib framing code.
pub use reader::ByteReader;
pub use writer::ByteWriter;

mod reader;
mod writer;
