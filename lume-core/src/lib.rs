//! Shared plumbing for the lume codec crates.
//!
//! This crate carries the pieces that both the PNG codec and the
//! DEFLATE engine need but that belong to neither: positioned byte
//! readers and writers over in-memory buffers.
//!
//! Nothing here does I/O; every type operates on complete byte slices
//! or growing byte vectors owned by the caller.
pub mod bytestream;
