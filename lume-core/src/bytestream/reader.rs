static ERROR_MSG: &str = "No more bytes";

/// An encapsulation of a byte stream reader.
///
/// The reader borrows the underlying buffer, hence the
/// lifetime parameter. Reads past the end either return a
/// default value or an error depending on the variant called.
pub struct ByteReader<'a>
{
    /// Data stream
    stream:   &'a [u8],
    position: usize
}

enum Mode
{
    // Big endian
    BE,
    // Little Endian
    LE
}

impl<'a> ByteReader<'a>
{
    pub const fn new(buf: &'a [u8]) -> ByteReader<'a>
    {
        ByteReader {
            stream:   buf,
            position: 0
        }
    }
    /// Skip `n` bytes ahead of the stream.
    pub fn skip(&mut self, bytes: usize)
    {
        self.position = self.position.saturating_add(bytes);
    }
    /// Undo a read of `n` bytes, moving the cursor backwards.
    pub fn rewind(&mut self, bytes: usize)
    {
        self.position = self.position.saturating_sub(bytes);
    }
    /// Return true if the stream can satisfy `bytes` more reads
    /// from its current position.
    pub const fn has(&self, bytes: usize) -> bool
    {
        self.position.saturating_add(bytes) <= self.stream.len()
    }
    pub const fn remaining(&self) -> usize
    {
        self.stream.len().saturating_sub(self.position)
    }
    pub const fn len(&self) -> usize
    {
        self.stream.len()
    }
    pub const fn is_empty(&self) -> bool
    {
        self.stream.is_empty()
    }
    pub const fn get_position(&self) -> usize
    {
        self.position
    }
    /// Look at `num_bytes` bytes starting `position` bytes ahead of the
    /// cursor, without consuming anything.
    pub fn peek_at(&self, position: usize, num_bytes: usize) -> Result<&'a [u8], &'static str>
    {
        let start = self.position.wrapping_add(position);
        let end = start.wrapping_add(num_bytes);

        self.stream.get(start..end).ok_or(ERROR_MSG)
    }
    /// Consume `num_bytes` bytes, returning them as a slice.
    pub fn get(&mut self, num_bytes: usize) -> Result<&'a [u8], &'static str>
    {
        let bytes = self
            .stream
            .get(self.position..self.position.wrapping_add(num_bytes))
            .ok_or(ERROR_MSG)?;

        self.position += num_bytes;

        Ok(bytes)
    }
}

macro_rules! get_single_type {
    ($name:tt,$name2:tt,$name3:tt,$name4:tt,$name5:tt,$name6:tt,$int_type:tt) => {
        impl<'a> ByteReader<'a>
        {
            #[inline(always)]
            fn $name(&mut self, mode: Mode) -> $int_type
            {
                const SIZE_OF_VAL: usize = core::mem::size_of::<$int_type>();

                let mut space = [0; SIZE_OF_VAL];

                match self.stream.get(self.position..self.position + SIZE_OF_VAL)
                {
                    Some(position) =>
                    {
                        space.copy_from_slice(position);
                        self.position += SIZE_OF_VAL;

                        match mode
                        {
                            Mode::LE => $int_type::from_le_bytes(space),
                            Mode::BE => $int_type::from_be_bytes(space)
                        }
                    }
                    None => 0
                }
            }

            #[inline(always)]
            fn $name2(&mut self, mode: Mode) -> Result<$int_type, &'static str>
            {
                const SIZE_OF_VAL: usize = core::mem::size_of::<$int_type>();

                let mut space = [0; SIZE_OF_VAL];

                match self.stream.get(self.position..self.position + SIZE_OF_VAL)
                {
                    Some(position) =>
                    {
                        space.copy_from_slice(position);
                        self.position += SIZE_OF_VAL;

                        match mode
                        {
                            Mode::LE => Ok($int_type::from_le_bytes(space)),
                            Mode::BE => Ok($int_type::from_be_bytes(space))
                        }
                    }
                    None => Err(ERROR_MSG)
                }
            }

            pub fn $name3(&mut self) -> Result<$int_type, &'static str>
            {
                self.$name2(Mode::BE)
            }

            pub fn $name4(&mut self) -> Result<$int_type, &'static str>
            {
                self.$name2(Mode::LE)
            }
            pub fn $name5(&mut self) -> $int_type
            {
                self.$name(Mode::BE)
            }

            pub fn $name6(&mut self) -> $int_type
            {
                self.$name(Mode::LE)
            }
        }
    };
}

get_single_type!(
    get_u8_inner_or_default,
    get_u8_inner_or_die,
    get_u8_be_err,
    get_u8_le_err,
    get_u8_be,
    get_u8_le,
    u8
);
get_single_type!(
    get_u16_inner_or_default,
    get_u16_inner_or_die,
    get_u16_be_err,
    get_u16_le_err,
    get_u16_be,
    get_u16_le,
    u16
);
get_single_type!(
    get_u32_inner_or_default,
    get_u32_inner_or_die,
    get_u32_be_err,
    get_u32_le_err,
    get_u32_be,
    get_u32_le,
    u32
);
get_single_type!(
    get_u64_inner_or_default,
    get_u64_inner_or_die,
    get_u64_be_err,
    get_u64_le_err,
    get_u64_be,
    get_u64_le,
    u64
);

impl<'a> ByteReader<'a>
{
    /// Fetch one byte, 0 on an exhausted stream.
    pub fn get_u8(&mut self) -> u8
    {
        self.get_u8_be()
    }
    /// Fetch one byte, error on an exhausted stream.
    pub fn get_u8_err(&mut self) -> Result<u8, &'static str>
    {
        self.get_u8_be_err()
    }
}

#[cfg(test)]
mod tests
{
    use super::ByteReader;

    #[test]
    fn read_integers_be()
    {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05];
        let mut reader = ByteReader::new(&data);

        assert_eq!(reader.get_u32_be_err(), Ok(0x0102_0304));
        assert_eq!(reader.get_u8(), 0x05);
        assert!(reader.get_u8_err().is_err());
    }

    #[test]
    fn peek_does_not_consume()
    {
        let data = [1, 2, 3, 4];
        let mut reader = ByteReader::new(&data);

        assert_eq!(reader.peek_at(1, 2), Ok(&data[1..3]));
        assert_eq!(reader.get_position(), 0);
        reader.skip(2);
        assert_eq!(reader.remaining(), 2);
        reader.rewind(1);
        assert_eq!(reader.get_u8(), 2);
    }
}
