//! The Adam7 interlace transform.
//!
//! Interlaced streams store seven reduced images; each pass is
//! filtered like an independent image and starts at a byte boundary,
//! while the linear raw buffer is fully bit-packed. The two
//! directions here convert between the concatenated packed passes and
//! the linear buffer and are exact inverses for every image size.

use crate::color::{linebits_exact, linebytes_rounded};
use crate::constants::{ADAM7_DX, ADAM7_DY, ADAM7_IX, ADAM7_IY};

#[derive(Copy, Clone, Debug)]
pub(crate) struct Adam7Pass
{
    pub w: usize,
    pub h: usize,
    /// Bytes of this pass in the filtered stream, one filter byte per
    /// scanline included.
    pub filtered_len: usize,
    /// Bytes of this pass with byte-padded scanlines, no filter bytes.
    pub padded_len: usize,
    /// Bytes of this pass fully bit-packed.
    pub packed_len: usize,
    pub ix: usize,
    pub iy: usize,
    pub dx: usize,
    pub dy: usize
}

/// Dimensions and buffer sizes of the seven passes for a `w` by `h`
/// image at `bpp` bits per pixel.
pub(crate) fn pass_values(w: usize, h: usize, bpp: usize) -> [Adam7Pass; 7]
{
    core::array::from_fn(|p| {
        let (ix, iy) = (ADAM7_IX[p], ADAM7_IY[p]);
        let (dx, dy) = (ADAM7_DX[p], ADAM7_DY[p]);

        let mut pass_w = (w + dx - ix - 1) / dx;
        let mut pass_h = (h + dy - iy - 1) / dy;

        if pass_w == 0
        {
            pass_h = 0;
        }
        if pass_h == 0
        {
            pass_w = 0;
        }

        Adam7Pass {
            w: pass_w,
            h: pass_h,
            filtered_len: pass_h * (1 + linebytes_rounded(pass_w, bpp)),
            padded_len: pass_h * linebytes_rounded(pass_w, bpp),
            packed_len: (pass_h * pass_w * bpp + 7) / 8,
            ix,
            iy,
            dx,
            dy
        }
    })
}

#[inline(always)]
pub(crate) fn read_bit(data: &[u8], bitpointer: usize) -> u8
{
    (data[bitpointer >> 3] >> (7 - (bitpointer & 7))) & 1
}

/// The target bit must be zero beforehand; both directions write into
/// freshly zeroed buffers.
#[inline(always)]
pub(crate) fn set_bit0(data: &mut [u8], bitpointer: usize, bit: u8)
{
    if bit != 0
    {
        data[bitpointer >> 3] |= 1 << (7 - (bitpointer & 7));
    }
}

/// Reorder concatenated packed passes in `inp` into the linear image
/// `out`. `out` must be zeroed.
pub(crate) fn deinterlace(out: &mut [u8], inp: &[u8], w: usize, h: usize, bpp: usize)
{
    let passes = pass_values(w, h, bpp);
    let bytewidth = bpp / 8;

    let mut offset_packed = 0;

    if bpp >= 8
    {
        for pass in &passes
        {
            for y in 0..pass.h
            {
                for x in 0..pass.w
                {
                    let pixel_in = offset_packed + (y * pass.w + x) * bytewidth;
                    let pixel_out =
                        ((pass.iy + y * pass.dy) * w + pass.ix + x * pass.dx) * bytewidth;

                    out[pixel_out..pixel_out + bytewidth]
                        .copy_from_slice(&inp[pixel_in..pixel_in + bytewidth]);
                }
            }
            offset_packed += pass.packed_len;
        }
    }
    else
    {
        for pass in &passes
        {
            let ilinebits = linebits_exact(pass.w, bpp);
            let olinebits = linebits_exact(w, bpp);

            for y in 0..pass.h
            {
                for x in 0..pass.w
                {
                    let mut ibp = 8 * offset_packed + y * ilinebits + x * bpp;
                    let mut obp =
                        (pass.iy + y * pass.dy) * olinebits + (pass.ix + x * pass.dx) * bpp;

                    for _ in 0..bpp
                    {
                        let bit = read_bit(inp, ibp);
                        ibp += 1;
                        set_bit0(out, obp, bit);
                        obp += 1;
                    }
                }
            }
            offset_packed += pass.packed_len;
        }
    }
}

/// Scatter the linear image `inp` into concatenated packed passes in
/// `out`. `out` must be zeroed.
pub(crate) fn interlace(out: &mut [u8], inp: &[u8], w: usize, h: usize, bpp: usize)
{
    let passes = pass_values(w, h, bpp);
    let bytewidth = bpp / 8;

    let mut offset_packed = 0;

    if bpp >= 8
    {
        for pass in &passes
        {
            for y in 0..pass.h
            {
                for x in 0..pass.w
                {
                    let pixel_out = offset_packed + (y * pass.w + x) * bytewidth;
                    let pixel_in =
                        ((pass.iy + y * pass.dy) * w + pass.ix + x * pass.dx) * bytewidth;

                    out[pixel_out..pixel_out + bytewidth]
                        .copy_from_slice(&inp[pixel_in..pixel_in + bytewidth]);
                }
            }
            offset_packed += pass.packed_len;
        }
    }
    else
    {
        for pass in &passes
        {
            let olinebits = linebits_exact(pass.w, bpp);
            let ilinebits = linebits_exact(w, bpp);

            for y in 0..pass.h
            {
                for x in 0..pass.w
                {
                    let mut obp = 8 * offset_packed + y * olinebits + x * bpp;
                    let mut ibp =
                        (pass.iy + y * pass.dy) * ilinebits + (pass.ix + x * pass.dx) * bpp;

                    for _ in 0..bpp
                    {
                        let bit = read_bit(inp, ibp);
                        ibp += 1;
                        set_bit0(out, obp, bit);
                        obp += 1;
                    }
                }
            }
            offset_packed += pass.packed_len;
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn roundtrip(w: usize, h: usize, bpp: usize)
    {
        let raw_size = (w * h * bpp + 7) / 8;
        let image: Vec<u8> = (0..raw_size).map(|i| (i * 89 % 256) as u8).collect();

        let packed_size: usize = pass_values(w, h, bpp).iter().map(|p| p.packed_len).sum();

        let mut passes = vec![0_u8; packed_size];
        interlace(&mut passes, &image, w, h, bpp);

        let mut restored = vec![0_u8; raw_size];
        deinterlace(&mut restored, &passes, w, h, bpp);

        // trailing padding bits of the source are not pixels; mask
        // the final partial byte before comparing
        let mut expected = image;
        let used_bits = w * h * bpp;

        if used_bits % 8 != 0
        {
            let mask = !(0xFF_u8 >> (used_bits % 8));
            let last = expected.len() - 1;
            expected[last] &= mask;
        }

        assert_eq!(restored, expected, "{w}x{h} at {bpp} bpp");
    }

    #[test]
    fn reversible_at_byte_depths()
    {
        for (w, h) in [(1, 1), (2, 2), (3, 7), (7, 3), (8, 8), (9, 9), (16, 5), (31, 17)]
        {
            for bpp in [8, 16, 24, 32, 48, 64]
            {
                roundtrip(w, h, bpp);
            }
        }
    }

    #[test]
    fn reversible_at_sub_byte_depths()
    {
        for (w, h) in [(1, 1), (2, 2), (3, 7), (7, 7), (8, 8), (9, 5), (31, 17)]
        {
            for bpp in [1, 2, 4]
            {
                roundtrip(w, h, bpp);
            }
        }
    }

    #[test]
    fn pass_sizes_match_the_pattern()
    {
        // an 8x8 image has one pixel in pass 1 and a full row pair in
        // pass 7
        let passes = pass_values(8, 8, 8);

        let dims: Vec<(usize, usize)> = passes.iter().map(|p| (p.w, p.h)).collect();

        assert_eq!(
            dims,
            vec![(1, 1), (1, 1), (2, 1), (2, 2), (4, 2), (4, 4), (8, 4)]
        );

        // empty passes of a 1x1 image contribute no bytes
        let passes = pass_values(1, 1, 8);

        assert_eq!(passes[0].packed_len, 1);
        for pass in &passes[1..]
        {
            assert_eq!(pass.packed_len, 0);
            assert_eq!(pass.filtered_len, 0);
        }
    }
}
