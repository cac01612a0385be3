//! CRC-32 over the PNG polynomial, eight bytes per step.

const CRC32_POLYNOMIAL: u32 = 0xEDB8_8320;

const fn make_tables() -> [[u32; 256]; 8]
{
    let mut tables = [[0_u32; 256]; 8];

    let mut i = 0;

    while i < 256
    {
        let mut crc = i as u32;
        let mut j = 0;

        while j < 8
        {
            crc = if crc & 1 != 0
            {
                (crc >> 1) ^ CRC32_POLYNOMIAL
            }
            else
            {
                crc >> 1
            };
            j += 1;
        }
        tables[0][i] = crc;
        i += 1;
    }

    let mut t = 1;

    while t < 8
    {
        let mut i = 0;

        while i < 256
        {
            let prev = tables[t - 1][i];
            tables[t][i] = (prev >> 8) ^ tables[0][(prev & 0xFF) as usize];
            i += 1;
        }
        t += 1;
    }
    tables
}

static CRC32_TABLES: [[u32; 256]; 8] = make_tables();

/// Running slice-by-8 CRC-32; feed `!0` as the first `crc` and invert
/// the result for the PNG convention.
pub(crate) fn crc32_slice8(data: &[u8], mut crc: u32) -> u32
{
    let mut chunks = data.chunks_exact(8);

    for chunk in &mut chunks
    {
        crc ^= u32::from_le_bytes(chunk[0..4].try_into().unwrap());

        let hi = u32::from_le_bytes(chunk[4..8].try_into().unwrap());

        crc = CRC32_TABLES[7][(crc & 0xFF) as usize]
            ^ CRC32_TABLES[6][((crc >> 8) & 0xFF) as usize]
            ^ CRC32_TABLES[5][((crc >> 16) & 0xFF) as usize]
            ^ CRC32_TABLES[4][(crc >> 24) as usize]
            ^ CRC32_TABLES[3][(hi & 0xFF) as usize]
            ^ CRC32_TABLES[2][((hi >> 8) & 0xFF) as usize]
            ^ CRC32_TABLES[1][((hi >> 16) & 0xFF) as usize]
            ^ CRC32_TABLES[0][(hi >> 24) as usize];
    }

    for byte in chunks.remainder()
    {
        crc = (crc >> 8) ^ CRC32_TABLES[0][((crc ^ u32::from(*byte)) & 0xFF) as usize];
    }
    crc
}

/// CRC-32 of a whole buffer with the standard init and final XOR.
pub(crate) fn crc32(data: &[u8]) -> u32
{
    !crc32_slice8(data, u32::MAX)
}

#[cfg(test)]
mod tests
{
    use super::crc32;

    #[test]
    fn check_value()
    {
        // the standard CRC-32 check value
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn iend_crc()
    {
        // every PNG ends with this exact chunk CRC
        assert_eq!(crc32(b"IEND"), 0xAE42_6082);
    }

    #[test]
    fn slice8_matches_bytewise()
    {
        let data: Vec<u8> = (0..1000_u32).map(|i| (i * 7 % 256) as u8).collect();

        let mut reference = u32::MAX;
        for byte in &data
        {
            reference ^= u32::from(*byte);
            for _ in 0..8
            {
                reference = if reference & 1 != 0
                {
                    (reference >> 1) ^ 0xEDB8_8320
                }
                else
                {
                    reference >> 1
                };
            }
        }
        assert_eq!(crc32(&data), !reference);
    }
}
