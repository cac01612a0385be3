/// The eight byte PNG signature as one big-endian word.
pub const PNG_SIGNATURE: u64 = 0x8950_4E47_0D0A_1A0A;

/// Largest value the four byte chunk length field may carry.
pub const MAX_CHUNK_LENGTH: usize = (1 << 31) - 1;

/// Adam7 pass origins and steps: x start, y start, x step, y step.
pub static ADAM7_IX: [usize; 7] = [0, 4, 0, 2, 0, 1, 0];
pub static ADAM7_IY: [usize; 7] = [0, 0, 4, 0, 2, 0, 1];
pub static ADAM7_DX: [usize; 7] = [8, 8, 4, 4, 2, 2, 1];
pub static ADAM7_DY: [usize; 7] = [8, 8, 8, 4, 4, 2, 2];
