//! The color model: stream color modes, pixel conversion between
//! every legal mode pair, and the encoder's automatic mode choice.
//!
//! Raw buffers use PNG packing rules in whatever mode they are in:
//! samples at bit depths below eight are packed MSB-first with no
//! padding between scanlines (only the final byte of the buffer is
//! zero padded), 16-bit samples are big-endian. Keeping 16-bit
//! samples big-endian in memory makes every decode→encode round trip
//! byte-identical regardless of host endianness.

use std::collections::HashMap;

use crate::enums::PngColor;
use crate::error::PngEncodeErrors;

/// One palette entry; alpha defaults to opaque and is only changed by
/// a tRNS chunk or an explicit caller.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PLTEEntry
{
    pub red:   u8,
    pub green: u8,
    pub blue:  u8,
    pub alpha: u8
}

impl Default for PLTEEntry
{
    fn default() -> Self
    {
        PLTEEntry {
            red:   0,
            green: 0,
            blue:  0,
            alpha: 255
        }
    }
}

impl PLTEEntry
{
    pub const fn new(red: u8, green: u8, blue: u8, alpha: u8) -> PLTEEntry
    {
        PLTEEntry {
            red,
            green,
            blue,
            alpha
        }
    }
}

/// A color layout: PNG color type, bit depth, and the optional
/// palette and transparency key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColorMode
{
    pub colortype: PngColor,
    depth:         u8,
    palette:       Vec<PLTEEntry>,
    /// A single fully transparent color, meaningful for Luma and RGB
    /// only. Stored at the stream bit depth.
    key:           Option<(u16, u16, u16)>
}

impl Default for ColorMode
{
    fn default() -> Self
    {
        ColorMode::new(PngColor::RGBA, 8)
    }
}

impl ColorMode
{
    pub fn new(colortype: PngColor, depth: u8) -> ColorMode
    {
        ColorMode {
            colortype,
            depth,
            palette: Vec::new(),
            key: None
        }
    }

    pub const fn depth(&self) -> u8
    {
        self.depth
    }
    pub fn channels(&self) -> usize
    {
        usize::from(self.colortype.num_components())
    }
    /// Bits per pixel, depth times channels.
    pub fn bpp(&self) -> usize
    {
        usize::from(self.depth) * self.channels()
    }

    pub fn palette(&self) -> &[PLTEEntry]
    {
        &self.palette
    }
    pub fn set_palette(&mut self, palette: Vec<PLTEEntry>)
    {
        self.palette = palette;
    }
    pub fn add_palette_entry(&mut self, entry: PLTEEntry) -> Result<(), PngEncodeErrors>
    {
        if self.palette.len() >= 256
        {
            return Err(PngEncodeErrors::BadPalette(self.palette.len() + 1));
        }
        self.palette.push(entry);
        Ok(())
    }

    pub const fn key(&self) -> Option<(u16, u16, u16)>
    {
        self.key
    }
    pub fn set_key(&mut self, red: u16, green: u16, blue: u16)
    {
        self.key = Some((red, green, blue));
    }
    pub fn clear_key(&mut self)
    {
        self.key = None;
    }

    pub fn is_greyscale_type(&self) -> bool
    {
        self.colortype.is_greyscale()
    }
    pub fn has_alpha_channel(&self) -> bool
    {
        self.colortype.has_alpha()
    }
    /// True if any pixel could come out non-opaque: an alpha channel,
    /// a color key, or a translucent palette entry.
    pub fn can_have_alpha(&self) -> bool
    {
        self.has_alpha_channel()
            || self.key.is_some()
            || self.palette.iter().any(|e| e.alpha != 255)
    }

    /// Bytes a `w` by `h` raw buffer occupies in this mode.
    ///
    /// Pixels are bit-packed across scanline boundaries, so this is
    /// the total bit count rounded up to bytes once.
    pub fn raw_size(&self, w: usize, h: usize) -> usize
    {
        let bpp = self.bpp();
        let n = w * h;

        (n / 8) * bpp + ((n & 7) * bpp + 7) / 8
    }

    /// Validate the type/depth/palette/key combination against the
    /// stream rules.
    pub(crate) fn check_validity(&self) -> Result<(), PngEncodeErrors>
    {
        let valid_depth = match self.colortype
        {
            PngColor::Luma => matches!(self.depth, 1 | 2 | 4 | 8 | 16),
            PngColor::Palette => matches!(self.depth, 1 | 2 | 4 | 8),
            PngColor::RGB | PngColor::LumaA | PngColor::RGBA => matches!(self.depth, 8 | 16),
            PngColor::Unknown => false
        };

        if !valid_depth
        {
            return Err(PngEncodeErrors::InvalidColorCombination(
                self.colortype,
                self.depth
            ));
        }
        if self.colortype == PngColor::Palette && self.palette.len() > (1 << self.depth)
        {
            return Err(PngEncodeErrors::BadPalette(self.palette.len()));
        }
        if self.key.is_some() && self.colortype.has_alpha()
        {
            return Err(PngEncodeErrors::GenericStatic(
                "A color key cannot be combined with a full alpha channel"
            ));
        }
        Ok(())
    }
}

/// Exact bits of one scanline.
pub(crate) fn linebits_exact(w: usize, bpp: usize) -> usize
{
    w * bpp
}
/// Scanline bytes, rounded up to whole bytes as in the filtered
/// stream representation.
pub(crate) fn linebytes_rounded(w: usize, bpp: usize) -> usize
{
    (w * bpp + 7) / 8
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct Rgba
{
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8
}

impl Rgba
{
    pub(crate) const fn new(r: u8, g: u8, b: u8, a: u8) -> Rgba
    {
        Rgba { r, g, b, a }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Rgba16
{
    r: u16,
    g: u16,
    b: u16,
    a: u16
}

/// Read `nbits` MSB-first bits starting at bit `bitpointer`.
pub(crate) fn read_bits_msb(data: &[u8], bitpointer: usize, nbits: usize) -> u32
{
    let mut result = 0_u32;

    for i in 0..nbits
    {
        let bp = bitpointer + i;
        let bit = (data[bp >> 3] >> (7 - (bp & 7))) & 1;

        result = (result << 1) | u32::from(bit);
    }
    result
}

/// Write a sub-byte sample at pixel `index`; the buffer must start
/// zeroed since partial bytes are only OR-ed into.
fn add_color_bits(out: &mut [u8], index: usize, bits: usize, value: u32)
{
    let m = match bits
    {
        1 => 7,
        2 => 3,
        _ => 1
    };
    // p is the sub-position inside the byte, e.g. with 4 bits per
    // value it is 0 for the high half and 1 for the low half
    let p = index & m;
    let mut value = value & ((1 << bits) - 1);

    value <<= bits * (m - p);

    if p == 0
    {
        out[index * bits / 8] = value as u8;
    }
    else
    {
        out[index * bits / 8] |= value as u8;
    }
}

/// Fetch pixel `i` as 8-bit RGBA, expanding any input mode.
///
/// Color-keyed pixels come out fully transparent; palette indices
/// past the palette end come out opaque black, which is what most
/// decoders in the wild do.
fn get_pixel_rgba8(inp: &[u8], i: usize, mode: &ColorMode) -> Rgba
{
    match mode.colortype
    {
        PngColor::Luma => match mode.depth
        {
            8 =>
            {
                let t = inp[i];
                let a = alpha_for_key(mode, u16::from(t), u16::from(t), u16::from(t));

                Rgba::new(t, t, t, a)
            }
            16 =>
            {
                let t = inp[i * 2];
                let g = 256 * u16::from(inp[i * 2]) + u16::from(inp[i * 2 + 1]);
                let a = alpha_for_key(mode, g, g, g);

                Rgba::new(t, t, t, a)
            }
            depth =>
            {
                let highest = (1_u16 << depth) - 1;
                let value = read_bits_msb(inp, i * usize::from(depth), usize::from(depth));

                let a = alpha_for_key(mode, value as u16, value as u16, value as u16);
                let t = ((value * 255) / u32::from(highest)) as u8;

                Rgba::new(t, t, t, a)
            }
        },
        PngColor::RGB =>
        {
            if mode.depth == 8
            {
                let px = &inp[i * 3..i * 3 + 3];
                let a = alpha_for_key(
                    mode,
                    u16::from(px[0]),
                    u16::from(px[1]),
                    u16::from(px[2])
                );

                Rgba::new(px[0], px[1], px[2], a)
            }
            else
            {
                let px = &inp[i * 6..i * 6 + 6];
                let a = alpha_for_key(
                    mode,
                    256 * u16::from(px[0]) + u16::from(px[1]),
                    256 * u16::from(px[2]) + u16::from(px[3]),
                    256 * u16::from(px[4]) + u16::from(px[5])
                );

                Rgba::new(px[0], px[2], px[4], a)
            }
        }
        PngColor::Palette =>
        {
            let index = if mode.depth == 8
            {
                usize::from(inp[i])
            }
            else
            {
                read_bits_msb(inp, i * usize::from(mode.depth), usize::from(mode.depth)) as usize
            };

            match mode.palette().get(index)
            {
                Some(entry) => Rgba::new(entry.red, entry.green, entry.blue, entry.alpha),
                None => Rgba::new(0, 0, 0, 255)
            }
        }
        PngColor::LumaA =>
        {
            if mode.depth == 8
            {
                let px = &inp[i * 2..i * 2 + 2];
                Rgba::new(px[0], px[0], px[0], px[1])
            }
            else
            {
                let px = &inp[i * 4..i * 4 + 4];
                Rgba::new(px[0], px[0], px[0], px[2])
            }
        }
        PngColor::RGBA =>
        {
            if mode.depth == 8
            {
                let px = &inp[i * 4..i * 4 + 4];
                Rgba::new(px[0], px[1], px[2], px[3])
            }
            else
            {
                let px = &inp[i * 8..i * 8 + 8];
                Rgba::new(px[0], px[2], px[4], px[6])
            }
        }
        PngColor::Unknown => unreachable!()
    }
}

fn alpha_for_key(mode: &ColorMode, r: u16, g: u16, b: u16) -> u8
{
    if mode.key() == Some((r, g, b))
    {
        0
    }
    else
    {
        255
    }
}

/// The grey value a pixel takes when written to a grey target.
///
/// Equal channels pass through; unequal channels average, the lossy
/// downgrade only reachable when the caller forces a grey mode.
fn grey_of(px: Rgba) -> u8
{
    if px.r == px.g && px.r == px.b
    {
        px.r
    }
    else
    {
        ((u16::from(px.r) + u16::from(px.g) + u16::from(px.b)) / 3) as u8
    }
}

fn grey_of_16(px: Rgba16) -> u16
{
    if px.r == px.g && px.r == px.b
    {
        px.r
    }
    else
    {
        ((u32::from(px.r) + u32::from(px.g) + u32::from(px.b)) / 3) as u16
    }
}

/// Write pixel `i` given as 8-bit RGBA into any output mode.
///
/// `colormap` answers "does this color exist in the palette and at
/// what index" when the target is palette.
fn put_pixel_rgba8(
    out: &mut [u8], i: usize, mode: &ColorMode, colormap: &HashMap<Rgba, u8>, px: Rgba
) -> Result<(), PngEncodeErrors>
{
    match mode.colortype
    {
        PngColor::Luma =>
        {
            let grey = grey_of(px);

            match mode.depth
            {
                8 => out[i] = grey,
                16 =>
                {
                    out[i * 2] = grey;
                    out[i * 2 + 1] = grey;
                }
                depth =>
                {
                    // take the most significant bits of the grey value
                    let scaled =
                        (u32::from(grey) >> (8 - depth)) & ((1 << depth) - 1);

                    add_color_bits(out, i, usize::from(depth), scaled);
                }
            }
        }
        PngColor::RGB =>
        {
            if mode.depth == 8
            {
                out[i * 3] = px.r;
                out[i * 3 + 1] = px.g;
                out[i * 3 + 2] = px.b;
            }
            else
            {
                out[i * 6] = px.r;
                out[i * 6 + 1] = px.r;
                out[i * 6 + 2] = px.g;
                out[i * 6 + 3] = px.g;
                out[i * 6 + 4] = px.b;
                out[i * 6 + 5] = px.b;
            }
        }
        PngColor::Palette =>
        {
            let index = *colormap
                .get(&px)
                .ok_or(PngEncodeErrors::ColorNotInPalette(px.r, px.g, px.b, px.a))?;

            if mode.depth == 8
            {
                out[i] = index;
            }
            else
            {
                add_color_bits(out, i, usize::from(mode.depth), u32::from(index));
            }
        }
        PngColor::LumaA =>
        {
            let grey = grey_of(px);

            if mode.depth == 8
            {
                out[i * 2] = grey;
                out[i * 2 + 1] = px.a;
            }
            else
            {
                out[i * 4] = grey;
                out[i * 4 + 1] = grey;
                out[i * 4 + 2] = px.a;
                out[i * 4 + 3] = px.a;
            }
        }
        PngColor::RGBA =>
        {
            if mode.depth == 8
            {
                out[i * 4] = px.r;
                out[i * 4 + 1] = px.g;
                out[i * 4 + 2] = px.b;
                out[i * 4 + 3] = px.a;
            }
            else
            {
                out[i * 8] = px.r;
                out[i * 8 + 1] = px.r;
                out[i * 8 + 2] = px.g;
                out[i * 8 + 3] = px.g;
                out[i * 8 + 4] = px.b;
                out[i * 8 + 5] = px.b;
                out[i * 8 + 6] = px.a;
                out[i * 8 + 7] = px.a;
            }
        }
        PngColor::Unknown => unreachable!()
    }
    Ok(())
}

/// Fetch pixel `i` as 16-bit RGBA; only called for 16-bit non-palette
/// modes.
fn get_pixel_rgba16(inp: &[u8], i: usize, mode: &ColorMode) -> Rgba16
{
    debug_assert_eq!(mode.depth, 16);

    let word = |offset: usize| 256 * u16::from(inp[offset]) + u16::from(inp[offset + 1]);

    match mode.colortype
    {
        PngColor::Luma =>
        {
            let g = word(i * 2);
            let a = if mode.key() == Some((g, g, g)) { 0 } else { 65535 };

            Rgba16 {
                r: g,
                g,
                b: g,
                a
            }
        }
        PngColor::RGB =>
        {
            let r = word(i * 6);
            let g = word(i * 6 + 2);
            let b = word(i * 6 + 4);
            let a = if mode.key() == Some((r, g, b)) { 0 } else { 65535 };

            Rgba16 { r, g, b, a }
        }
        PngColor::LumaA =>
        {
            let g = word(i * 4);

            Rgba16 {
                r: g,
                g,
                b: g,
                a: word(i * 4 + 2)
            }
        }
        PngColor::RGBA => Rgba16 {
            r: word(i * 8),
            g: word(i * 8 + 2),
            b: word(i * 8 + 4),
            a: word(i * 8 + 6)
        },
        PngColor::Palette | PngColor::Unknown => unreachable!()
    }
}

fn put_pixel_rgba16(out: &mut [u8], i: usize, mode: &ColorMode, px: Rgba16)
{
    debug_assert_eq!(mode.depth, 16);

    let mut write = |offset: usize, value: u16| {
        out[offset] = (value >> 8) as u8;
        out[offset + 1] = value as u8;
    };

    match mode.colortype
    {
        PngColor::Luma => write(i * 2, grey_of_16(px)),
        PngColor::RGB =>
        {
            write(i * 6, px.r);
            write(i * 6 + 2, px.g);
            write(i * 6 + 4, px.b);
        }
        PngColor::LumaA =>
        {
            let grey = grey_of_16(px);
            write(i * 4, grey);
            write(i * 4 + 2, px.a);
        }
        PngColor::RGBA =>
        {
            write(i * 8, px.r);
            write(i * 8 + 2, px.g);
            write(i * 8 + 4, px.b);
            write(i * 8 + 6, px.a);
        }
        PngColor::Palette | PngColor::Unknown => unreachable!()
    }
}

/// Convert `inp` (in `mode_in`) into `out` (in `mode_out`).
///
/// `out` must be zeroed and sized `mode_out.raw_size(w, h)`. Both
/// 16-bit endpoints take a lossless 16-bit path, every other pair
/// goes through an 8-bit RGBA intermediate.
pub(crate) fn convert(
    out: &mut [u8], inp: &[u8], mode_out: &ColorMode, mode_in: &ColorMode, w: usize, h: usize
) -> Result<(), PngEncodeErrors>
{
    let numpixels = w * h;

    if mode_out == mode_in
    {
        let numbytes = mode_in.raw_size(w, h);

        out[..numbytes].copy_from_slice(&inp[..numbytes]);
        return Ok(());
    }

    let mut colormap = HashMap::new();

    if mode_out.colortype == PngColor::Palette
    {
        // a caller that requested palette output but supplied no
        // entries means "use the input palette"
        let palette = if mode_out.palette().is_empty()
        {
            mode_in.palette()
        }
        else
        {
            mode_out.palette()
        };
        let palsize = 1_usize << mode_out.depth();
        let palette = &palette[..palette.len().min(palsize)];

        for (index, entry) in palette.iter().enumerate()
        {
            colormap.insert(
                Rgba::new(entry.red, entry.green, entry.blue, entry.alpha),
                index as u8
            );
        }
    }

    if mode_in.depth() == 16 && mode_out.depth() == 16 && mode_out.colortype != PngColor::Palette
    {
        for i in 0..numpixels
        {
            let px = get_pixel_rgba16(inp, i, mode_in);
            put_pixel_rgba16(out, i, mode_out, px);
        }
    }
    else
    {
        for i in 0..numpixels
        {
            let px = get_pixel_rgba8(inp, i, mode_in);
            put_pixel_rgba8(out, i, mode_out, &colormap, px)?;
        }
    }
    Ok(())
}

/// What one pass over the pixels revealed, the input to the encoder's
/// automatic mode choice.
pub(crate) struct ColorProfile
{
    pub colored:   bool,
    pub key:       bool,
    /// The candidate key, always widened to 16 bits per channel.
    pub key_r:     u16,
    pub key_g:     u16,
    pub key_b:     u16,
    pub alpha:     bool,
    pub numcolors: u16,
    pub palette:   [Rgba; 256],
    pub bits:      u8
}

impl ColorProfile
{
    pub(crate) fn new() -> ColorProfile
    {
        ColorProfile {
            colored:   false,
            key:       false,
            key_r:     0,
            key_g:     0,
            key_b:     0,
            alpha:     false,
            numcolors: 0,
            palette:   [Rgba::new(0, 0, 0, 0); 256],
            bits:      1
        }
    }

    /// Track the alpha state of one pixel; returns true once no later
    /// pixel can change the outcome.
    fn check_alpha(&mut self, px: Rgba) -> bool
    {
        let matchkey = u16::from(px.r) == self.key_r
            && u16::from(px.g) == self.key_g
            && u16::from(px.b) == self.key_b;

        if px.a != 255 && (px.a != 0 || (self.key && !matchkey))
        {
            // translucency, or a second transparent color; a key
            // cannot represent either
            self.alpha = true;
            self.key = false;

            if self.bits < 8
            {
                self.bits = 8;
            }
            return true;
        }
        else if px.a == 0 && !self.alpha && !self.key
        {
            self.key = true;
            self.key_r = u16::from(px.r);
            self.key_g = u16::from(px.g);
            self.key_b = u16::from(px.b);
        }
        else if px.a == 255 && self.key && matchkey
        {
            // the key color also appears opaque, a key would make
            // those pixels vanish
            self.alpha = true;
            self.key = false;

            if self.bits < 8
            {
                self.bits = 8;
            }
            return true;
        }
        false
    }
}

/// How many bits a grey sample needs, the 1/2/4/8 ladder.
///
/// The scaling of 2-bit and 4-bit values uses multiples of 85 and 17.
fn get_value_required_bits(value: u8) -> u8
{
    match value
    {
        0 | 255 => 1,
        x if x % 17 == 0 =>
        {
            if value % 85 == 0
            {
                2
            }
            else
            {
                4
            }
        }
        _ => 8
    }
}

fn has_any_16_bit_pixels(inp: &[u8], numpixels: usize, mode: &ColorMode) -> bool
{
    for i in 0..numpixels
    {
        let px = get_pixel_rgba16(inp, i, mode);

        if [px.r, px.g, px.b, px.a]
            .iter()
            .any(|c| (c >> 8) != (c & 0xFF))
        {
            return true;
        }
    }
    false
}

fn get_color_profile16(inp: &[u8], numpixels: usize, mode: &ColorMode) -> ColorProfile
{
    let mut profile = ColorProfile::new();

    // counting colors is pointless, palette has no 16-bit form
    profile.bits = 16;

    let mut colored_done = mode.is_greyscale_type();
    let mut alpha_done = !mode.can_have_alpha();

    for i in 0..numpixels
    {
        let px = get_pixel_rgba16(inp, i, mode);

        if !colored_done && (px.r != px.g || px.r != px.b)
        {
            profile.colored = true;
            colored_done = true;
        }
        if !alpha_done
        {
            let matchkey =
                px.r == profile.key_r && px.g == profile.key_g && px.b == profile.key_b;

            if px.a != 65535 && (px.a != 0 || (profile.key && !matchkey))
            {
                profile.alpha = true;
                profile.key = false;
                alpha_done = true;
            }
            else if px.a == 0 && !profile.alpha && !profile.key
            {
                profile.key = true;
                profile.key_r = px.r;
                profile.key_g = px.g;
                profile.key_b = px.b;
            }
            else if px.a == 65535 && profile.key && matchkey
            {
                profile.alpha = true;
                profile.key = false;
                alpha_done = true;
            }
        }
        if alpha_done && colored_done
        {
            break;
        }
    }

    if profile.key && !profile.alpha
    {
        for i in 0..numpixels
        {
            let px = get_pixel_rgba16(inp, i, mode);

            if px.a != 0
                && px.r == profile.key_r
                && px.g == profile.key_g
                && px.b == profile.key_b
            {
                // the key color also appears opaque
                profile.alpha = true;
                profile.key = false;
                break;
            }
        }
    }
    profile
}

/// Scan the image once, collecting everything `auto_choose_color`
/// needs to pick a minimal mode.
pub(crate) fn get_color_profile(
    inp: &[u8], w: usize, h: usize, mode: &ColorMode
) -> ColorProfile
{
    let numpixels = w * h;

    if mode.depth() == 16 && has_any_16_bit_pixels(inp, numpixels, mode)
    {
        return get_color_profile16(inp, numpixels, mode);
    }

    let mut profile = ColorProfile::new();

    let mut colored_done = mode.is_greyscale_type();
    let mut alpha_done = !mode.can_have_alpha();
    let mut numcolors_done = false;
    let mut bits_done = mode.bpp() == 1;
    let maxnumcolors: u16 = 257;

    let mut colormap: HashMap<Rgba, u8> = HashMap::with_capacity(usize::from(maxnumcolors));

    for i in 0..numpixels
    {
        let px = get_pixel_rgba8(inp, i, mode);

        if !bits_done && profile.bits < 8
        {
            let bits = get_value_required_bits(px.r);

            if bits > profile.bits
            {
                profile.bits = bits;
            }
        }
        bits_done = usize::from(profile.bits) >= mode.bpp();

        if !colored_done && (px.r != px.g || px.r != px.b)
        {
            profile.colored = true;
            colored_done = true;

            // PNG has no colored modes with less than 8 bits per channel
            if profile.bits < 8
            {
                profile.bits = 8;
            }
        }
        if !alpha_done && profile.check_alpha(px)
        {
            alpha_done = true;
        }
        if !numcolors_done && !colormap.contains_key(&px)
        {
            colormap.insert(px, profile.numcolors as u8);

            if profile.numcolors < 256
            {
                profile.palette[usize::from(profile.numcolors)] = px;
            }
            profile.numcolors += 1;
            numcolors_done = profile.numcolors >= maxnumcolors;
        }
        if alpha_done && numcolors_done && colored_done && bits_done
        {
            break;
        }
    }

    if profile.key && !profile.alpha
    {
        for i in 0..numpixels
        {
            let px = get_pixel_rgba8(inp, i, mode);

            if px.a != 0
                && u16::from(px.r) == profile.key_r
                && u16::from(px.g) == profile.key_g
                && u16::from(px.b) == profile.key_b
            {
                profile.alpha = true;
                profile.key = false;

                if profile.bits < 8
                {
                    profile.bits = 8;
                }
                break;
            }
        }
    }

    // make the profile's key always 16-bit for consistency, repeat
    // each byte twice
    profile.key_r += profile.key_r << 8;
    profile.key_g += profile.key_g << 8;
    profile.key_b += profile.key_b << 8;

    profile
}

/// Choose the smallest color mode that losslessly holds the image.
///
/// Precedence: grey at the minimal depth, then palette when it is
/// both possible and profitable, then 8- or 16-bit grey/RGB with or
/// without alpha. A single fully transparent color becomes a tRNS
/// key rather than an alpha channel, except for tiny images where
/// the chunk overhead outweighs it.
pub(crate) fn auto_choose_color(
    image: &[u8], w: usize, h: usize, mode_in: &ColorMode
) -> Result<ColorMode, PngEncodeErrors>
{
    let mut mode_out = ColorMode::new(PngColor::Luma, 8);
    let mut profile = get_color_profile(image, w, h, mode_in);

    if profile.key && w * h <= 16
    {
        profile.alpha = true;
        profile.key = false;

        if profile.bits < 8
        {
            profile.bits = 8;
        }
    }

    let n = profile.numcolors;
    let palettebits = if n <= 2
    {
        1
    }
    else if n <= 4
    {
        2
    }
    else if n <= 16
    {
        4
    }
    else
    {
        8
    };

    let palette_ok = (n <= 256 && profile.bits <= 8)
        && (w * h >= usize::from(n) * 2)
        && (profile.colored || profile.bits > palettebits);

    if palette_ok
    {
        let palette = &profile.palette[..usize::from(n)];

        mode_out.colortype = PngColor::Palette;
        mode_out.depth = palettebits;

        for entry in palette
        {
            mode_out.add_palette_entry(PLTEEntry::new(entry.r, entry.g, entry.b, entry.a))?;
        }

        if mode_in.colortype == PngColor::Palette
            && mode_in.palette().len() >= mode_out.palette().len()
            && mode_in.depth() == mode_out.depth()
        {
            // the input palette holds the same colors, keep it to
            // preserve index order and skip a conversion
            mode_out = mode_in.clone();
        }
    }
    else
    {
        mode_out.depth = profile.bits;
        mode_out.colortype = match (profile.alpha, profile.colored)
        {
            (true, true) => PngColor::RGBA,
            (true, false) => PngColor::LumaA,
            (false, true) => PngColor::RGB,
            (false, false) => PngColor::Luma
        };

        if profile.key
        {
            // the profile key is 16-bit, mask it to the chosen depth
            let mask = ((1_u32 << mode_out.depth()) - 1) as u16;

            mode_out.set_key(
                profile.key_r & mask,
                profile.key_g & mask,
                profile.key_b & mask
            );
        }
    }
    Ok(mode_out)
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn convert_to(
        inp: &[u8], mode_in: &ColorMode, mode_out: &ColorMode, w: usize, h: usize
    ) -> Vec<u8>
    {
        let mut out = vec![0_u8; mode_out.raw_size(w, h)];
        convert(&mut out, inp, mode_out, mode_in, w, h).unwrap();
        out
    }

    #[test]
    fn grey_expands_to_rgba()
    {
        let grey = ColorMode::new(PngColor::Luma, 8);
        let rgba = ColorMode::new(PngColor::RGBA, 8);

        let out = convert_to(&[0, 128, 255], &grey, &rgba, 3, 1);

        assert_eq!(
            out,
            vec![0, 0, 0, 255, 128, 128, 128, 255, 255, 255, 255, 255]
        );
    }

    #[test]
    fn one_bit_grey_scales()
    {
        let grey = ColorMode::new(PngColor::Luma, 1);
        let rgb = ColorMode::new(PngColor::RGB, 8);

        // pixels 1,0,1,1 packed MSB first
        let out = convert_to(&[0b1011_0000], &grey, &rgb, 4, 1);

        assert_eq!(out, vec![255, 255, 255, 0, 0, 0, 255, 255, 255, 255, 255, 255]);
    }

    #[test]
    fn color_key_becomes_transparent()
    {
        let mut rgb = ColorMode::new(PngColor::RGB, 8);
        rgb.set_key(10, 20, 30);

        let rgba = ColorMode::new(PngColor::RGBA, 8);

        let out = convert_to(&[10, 20, 30, 10, 20, 31], &rgb, &rgba, 2, 1);

        assert_eq!(out[3], 0);
        assert_eq!(out[7], 255);
    }

    #[test]
    fn sixteen_bit_stays_big_endian()
    {
        let grey16 = ColorMode::new(PngColor::Luma, 16);
        let rgba16 = ColorMode::new(PngColor::RGBA, 16);

        let out = convert_to(&[0x12, 0x34], &grey16, &rgba16, 1, 1);

        assert_eq!(out, vec![0x12, 0x34, 0x12, 0x34, 0x12, 0x34, 0xFF, 0xFF]);
    }

    #[test]
    fn palette_roundtrip()
    {
        let mut pal = ColorMode::new(PngColor::Palette, 2);
        pal.set_palette(vec![
            PLTEEntry::new(255, 0, 0, 255),
            PLTEEntry::new(0, 255, 0, 255),
            PLTEEntry::new(0, 0, 255, 128),
        ]);

        let rgba = ColorMode::new(PngColor::RGBA, 8);

        // indices 2,1,0,2 at 2 bits: 0b10_01_00_10
        let packed = [0b1001_0010];
        let expanded = convert_to(&packed, &pal, &rgba, 4, 1);

        assert_eq!(
            expanded,
            vec![0, 0, 255, 128, 0, 255, 0, 255, 255, 0, 0, 255, 0, 0, 255, 128]
        );

        let back = convert_to(&expanded, &rgba, &pal, 4, 1);
        assert_eq!(back, packed);
    }

    #[test]
    fn missing_palette_entry_is_an_error()
    {
        let mut pal = ColorMode::new(PngColor::Palette, 8);
        pal.set_palette(vec![PLTEEntry::new(1, 2, 3, 255)]);

        let rgba = ColorMode::new(PngColor::RGBA, 8);
        let mut out = vec![0_u8; pal.raw_size(1, 1)];

        let result = convert(&mut out, &[9, 9, 9, 255], &pal, &rgba, 1, 1);

        assert!(matches!(
            result,
            Err(PngEncodeErrors::ColorNotInPalette(9, 9, 9, 255))
        ));
    }

    #[test]
    fn auto_convert_picks_minimal_grey()
    {
        let rgba = ColorMode::new(PngColor::RGBA, 8);

        // black and white only
        let image = [0, 0, 0, 255, 255, 255, 255, 255, 0, 0, 0, 255, 0, 0, 0, 255];
        // 4x1 so the tiny-image key suppression (w*h <= 16) applies
        // but no key is needed anyway
        let chosen = auto_choose_color(&image, 4, 1, &rgba).unwrap();

        assert_eq!(chosen.colortype, PngColor::Luma);
        assert_eq!(chosen.depth(), 1);
    }

    #[test]
    fn auto_convert_picks_palette_for_few_colors()
    {
        let rgba = ColorMode::new(PngColor::RGBA, 8);

        let mut image = Vec::new();
        let colors: [[u8; 4]; 3] = [[255, 0, 0, 255], [0, 255, 0, 255], [0, 0, 255, 255]];

        for i in 0..64
        {
            image.extend_from_slice(&colors[i % 3]);
        }
        let chosen = auto_choose_color(&image, 8, 8, &rgba).unwrap();

        assert_eq!(chosen.colortype, PngColor::Palette);
        assert_eq!(chosen.depth(), 2);
        assert_eq!(chosen.palette().len(), 3);
    }

    #[test]
    fn auto_convert_prefers_key_over_alpha_channel()
    {
        let rgba = ColorMode::new(PngColor::RGBA, 8);

        // many colors (forces non-palette), one fully transparent one
        let mut image = Vec::new();

        for i in 0_u32..300
        {
            let x = (i % 256) as u8;
            image.extend_from_slice(&[x, x.wrapping_add(1), x.wrapping_mul(3), 255]);
        }
        image.extend_from_slice(&[7, 99, 200, 0]);

        let chosen = auto_choose_color(&image, 7, 43, &rgba).unwrap();

        assert_eq!(chosen.colortype, PngColor::RGB);
        assert_eq!(chosen.key(), Some((7, 99, 200)));
    }

    #[test]
    fn auto_convert_uses_alpha_when_translucent()
    {
        let rgba = ColorMode::new(PngColor::RGBA, 8);

        let mut image = Vec::new();

        for i in 0_u32..300
        {
            let x = (i % 256) as u8;
            image.extend_from_slice(&[x, x.wrapping_add(1), x.wrapping_mul(3), 255]);
        }
        image.extend_from_slice(&[7, 99, 200, 128]);

        let chosen = auto_choose_color(&image, 7, 43, &rgba).unwrap();

        assert_eq!(chosen.colortype, PngColor::RGBA);
        assert_eq!(chosen.key(), None);
    }
}
