//! Chunk framing: writing chunks with their CRC, and the lightweight
//! chunk walker used by inspection tools.

use lume_core::bytestream::ByteReader;

use crate::constants::{MAX_CHUNK_LENGTH, PNG_SIGNATURE};
use crate::crc::crc32;
use crate::error::PngDecodeErrors;

/// Append one chunk: length, type, payload and the CRC over
/// type‖payload.
pub(crate) fn write_chunk(out: &mut Vec<u8>, name: [u8; 4], payload: &[u8])
{
    debug_assert!(payload.len() <= MAX_CHUNK_LENGTH);

    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());

    let crc_start = out.len();

    out.extend_from_slice(&name);
    out.extend_from_slice(payload);

    let crc = crc32(&out[crc_start..]);

    out.extend_from_slice(&crc.to_be_bytes());
}

/// One chunk's framing as seen by [`inspect_chunks`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ChunkSummary
{
    /// The four type bytes.
    pub name:   [u8; 4],
    /// Byte offset of the chunk (its length field) in the file.
    pub offset: usize,
    /// Payload length, excluding framing.
    pub length: usize
}

/// Walk the chunk sequence of a PNG byte stream without decoding any
/// pixel data. CRCs are not verified.
pub fn inspect_chunks(data: &[u8]) -> Result<Vec<ChunkSummary>, PngDecodeErrors>
{
    let mut stream = ByteReader::new(data);

    if stream.get_u64_be_err().map_err(|_| PngDecodeErrors::BadSignature)? != PNG_SIGNATURE
    {
        return Err(PngDecodeErrors::BadSignature);
    }

    let mut chunks = Vec::new();

    loop
    {
        let offset = stream.get_position();

        let length = stream.get_u32_be_err()? as usize;
        let name: [u8; 4] = stream
            .get(4)?
            .try_into()
            .expect("four bytes were requested");

        if length > MAX_CHUNK_LENGTH
        {
            return Err(PngDecodeErrors::Generic(format!(
                "Chunk {} has length {length} exceeding the format limit",
                String::from_utf8_lossy(&name)
            )));
        }
        if !stream.has(length + 4)
        {
            return Err(PngDecodeErrors::GenericStatic("Truncated chunk"));
        }
        stream.skip(length + 4);

        chunks.push(ChunkSummary {
            name,
            offset,
            length
        });

        if &name == b"IEND"
        {
            break;
        }
        if stream.remaining() == 0
        {
            return Err(PngDecodeErrors::GenericStatic("Missing IEND chunk"));
        }
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn written_chunks_carry_correct_crc()
    {
        let mut out = Vec::new();
        write_chunk(&mut out, *b"IEND", &[]);

        assert_eq!(out, [0, 0, 0, 0, b'I', b'E', b'N', b'D', 0xAE, 0x42, 0x60, 0x82]);
    }
}
