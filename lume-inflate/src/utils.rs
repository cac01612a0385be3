/// Compute the Adler-32 checksum of `data` per RFC 1950.
///
/// Sums are folded every 5552 bytes, the largest block for which the
/// running sums provably stay below 2^32.
pub(crate) fn calc_adler_hash(data: &[u8]) -> u32
{
    const MOD_ADLER: u32 = 65521;
    const BLOCK_SIZE: usize = 5552;

    let mut a: u32 = 1;
    let mut b: u32 = 0;

    for chunk in data.chunks(BLOCK_SIZE)
    {
        for byte in chunk
        {
            a += u32::from(*byte);
            b += a;
        }
        a %= MOD_ADLER;
        b %= MOD_ADLER;
    }

    (b << 16) | a
}

#[cfg(test)]
mod tests
{
    use super::calc_adler_hash;

    #[test]
    fn known_vectors()
    {
        // "Wikipedia" from the checksum's article
        assert_eq!(calc_adler_hash(b"Wikipedia"), 0x11E6_0398);
        assert_eq!(calc_adler_hash(b""), 1);
    }

    #[test]
    fn long_input_does_not_overflow()
    {
        let data = vec![255_u8; 1 << 20];
        let hash = calc_adler_hash(&data);

        assert_eq!(hash, {
            // straightforward reference with word-sized sums
            let mut a: u64 = 1;
            let mut b: u64 = 0;
            for byte in &data
            {
                a = (a + u64::from(*byte)) % 65521;
                b = (b + a) % 65521;
            }
            ((b << 16) | a) as u32
        });
    }
}
