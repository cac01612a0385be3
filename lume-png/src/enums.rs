//! Small closed enums for the stream level values PNG defines.

/// The color type byte of the IHDR chunk.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PngColor
{
    Luma,
    RGB,
    Palette,
    LumaA,
    RGBA,
    Unknown
}

impl Default for PngColor
{
    fn default() -> Self
    {
        Self::Unknown
    }
}

impl PngColor
{
    pub(crate) fn from_int(int: u8) -> Option<PngColor>
    {
        match int
        {
            0 => Some(Self::Luma),
            2 => Some(Self::RGB),
            3 => Some(Self::Palette),
            4 => Some(Self::LumaA),
            6 => Some(Self::RGBA),
            _ => None
        }
    }
    pub(crate) const fn to_int(self) -> u8
    {
        match self
        {
            Self::Luma => 0,
            Self::RGB => 2,
            Self::Palette => 3,
            Self::LumaA => 4,
            Self::RGBA => 6,
            Self::Unknown => 255
        }
    }
    pub const fn num_components(&self) -> u8
    {
        match self
        {
            Self::Luma | Self::Palette => 1,
            Self::LumaA => 2,
            Self::RGB => 3,
            Self::RGBA => 4,
            Self::Unknown => 0
        }
    }
    pub const fn has_alpha(&self) -> bool
    {
        matches!(self, Self::LumaA | Self::RGBA)
    }
    pub const fn is_greyscale(&self) -> bool
    {
        matches!(self, Self::Luma | Self::LumaA)
    }
}

/// A scanline filter type byte, 0..=4.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FilterType
{
    None,
    Sub,
    Up,
    Average,
    Paeth
}

impl FilterType
{
    pub(crate) fn from_int(int: u8) -> Option<FilterType>
    {
        match int
        {
            0 => Some(Self::None),
            1 => Some(Self::Sub),
            2 => Some(Self::Up),
            3 => Some(Self::Average),
            4 => Some(Self::Paeth),
            _ => None
        }
    }
    pub(crate) const fn to_int(self) -> u8
    {
        match self
        {
            Self::None => 0,
            Self::Sub => 1,
            Self::Up => 2,
            Self::Average => 3,
            Self::Paeth => 4
        }
    }
}

/// The interlace method byte of the IHDR chunk.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InterlaceMethod
{
    Standard,
    Adam7
}

impl Default for InterlaceMethod
{
    fn default() -> Self
    {
        Self::Standard
    }
}

impl InterlaceMethod
{
    pub(crate) fn from_int(int: u8) -> Option<InterlaceMethod>
    {
        match int
        {
            0 => Some(Self::Standard),
            1 => Some(Self::Adam7),
            _ => None
        }
    }
    pub(crate) const fn to_int(self) -> u8
    {
        match self
        {
            Self::Standard => 0,
            Self::Adam7 => 1
        }
    }
}

/// Chunk types the decoder understands; everything else goes through
/// the unknown-chunk path.
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PngChunkType
{
    IHDR,
    PLTE,
    IDAT,
    IEND,
    tRNS,
    bKGD,
    pHYs,
    tIME,
    tEXt,
    zTXt,
    iTXt,
    unkn
}

/// How the encoder picks a filter for each scanline.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FilterStrategy
{
    /// Always filter type 0.
    Zero,
    /// Smallest sum of absolute differences, the PNG standard's
    /// suggested heuristic.
    MinSum,
    /// Smallest Shannon entropy of the filtered bytes.
    Entropy,
    /// Deflate every candidate and keep the smallest; slow.
    BruteForce,
    /// Caller supplied one filter byte per scanline.
    Predefined
}

impl Default for FilterStrategy
{
    fn default() -> Self
    {
        Self::MinSum
    }
}

/// Where in the stream a chunk sits, used to re-emit retained unknown
/// chunks in their original region.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum ChunkPosition
{
    BeforePlte = 0,
    BeforeIdat = 1,
    AfterIdat  = 2
}
