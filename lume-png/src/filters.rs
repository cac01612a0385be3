//! Scanline filters.
//!
//! There exist two kinds of de-filter functions here: the normal ones
//! taking the previous scanline, and special variants with a `_first`
//! suffix for the first scanline of an image or pass, where the
//! missing row above is treated as zeroes.
//!
//! `components` is the filtering byte width, `max(1, bits_per_pixel / 8)`;
//! for sub-byte depths filtering is byte-wise and the left neighbor is
//! the previous byte.

use crate::enums::FilterType;

pub(crate) fn handle_sub(raw: &[u8], current: &mut [u8], components: usize)
{
    if raw.len() < components || current.len() < components
    {
        return;
    }

    // handle leftmost bytes explicitly
    for i in 0..components
    {
        current[i] = raw[i];
    }

    let end = current.len().min(raw.len());

    for i in components..end
    {
        let a = current[i - components];
        current[i] = raw[i].wrapping_add(a);
    }
}

pub(crate) fn handle_up(prev_row: &[u8], raw: &[u8], current: &mut [u8])
{
    for ((filt, recon), up) in raw.iter().zip(current).zip(prev_row)
    {
        *recon = (*filt).wrapping_add(*up)
    }
}

pub(crate) fn handle_avg(prev_row: &[u8], raw: &[u8], current: &mut [u8], components: usize)
{
    if raw.len() < components || current.len() < components
    {
        return;
    }

    for i in 0..components
    {
        current[i] = raw[i].wrapping_add(prev_row[i] >> 1);
    }

    let end = current.len().min(raw.len()).min(prev_row.len());

    for i in components..end
    {
        let a = current[i - components];
        let b = prev_row[i];

        // average without overflowing the byte
        let c = (a & b) + ((a ^ b) >> 1);

        current[i] = raw[i].wrapping_add(c);
    }
}

/// First scanline of a pass, the row above is all zeroes.
pub(crate) fn handle_avg_first(raw: &[u8], current: &mut [u8], components: usize)
{
    if raw.len() < components || current.len() < components
    {
        return;
    }

    for i in 0..components
    {
        current[i] = raw[i];
    }

    let end = current.len().min(raw.len());

    for i in components..end
    {
        let avg = current[i - components] >> 1;
        current[i] = raw[i].wrapping_add(avg)
    }
}

pub(crate) fn handle_paeth(prev_row: &[u8], raw: &[u8], current: &mut [u8], components: usize)
{
    if raw.len() < components || current.len() < components
    {
        return;
    }

    for i in 0..components
    {
        current[i] = raw[i].wrapping_add(paeth(0, prev_row[i], 0));
    }

    let end = current.len().min(raw.len()).min(prev_row.len());

    for i in components..end
    {
        let paeth_res = paeth(
            current[i - components],
            prev_row[i],
            prev_row[i - components]
        );
        current[i] = raw[i].wrapping_add(paeth_res)
    }
}

/// First scanline of a pass; with the row above zero the predictor
/// degenerates to the left neighbor.
pub(crate) fn handle_paeth_first(raw: &[u8], current: &mut [u8], components: usize)
{
    if raw.len() < components || current.len() < components
    {
        return;
    }

    for i in 0..components
    {
        current[i] = raw[i];
    }

    let end = current.len().min(raw.len());

    for i in components..end
    {
        let paeth_res = paeth(current[i - components], 0, 0);
        current[i] = raw[i].wrapping_add(paeth_res)
    }
}

/// The Paeth predictor; ties break in the order left, up, upper-left.
#[inline(always)]
pub(crate) fn paeth(a: u8, b: u8, c: u8) -> u8
{
    let a = i16::from(a);
    let b = i16::from(b);
    let c = i16::from(c);
    let p = a + b - c;
    let pa = (p - a).abs();
    let pb = (p - b).abs();
    let pc = (p - c).abs();

    if pa <= pb && pa <= pc
    {
        return a as u8;
    }
    if pb <= pc
    {
        return b as u8;
    }
    c as u8
}

/// Forward-filter one scanline for the encoder.
///
/// `prevline` is `None` on the first scanline of a pass.
pub(crate) fn filter_scanline(
    out: &mut [u8], scanline: &[u8], prevline: Option<&[u8]>, bytewidth: usize,
    filter_type: FilterType
)
{
    let length = scanline.len();

    match filter_type
    {
        FilterType::None => out[..length].copy_from_slice(scanline),
        FilterType::Sub =>
        {
            for i in 0..bytewidth.min(length)
            {
                out[i] = scanline[i];
            }
            for i in bytewidth..length
            {
                out[i] = scanline[i].wrapping_sub(scanline[i - bytewidth]);
            }
        }
        FilterType::Up =>
        {
            if let Some(prev) = prevline
            {
                for i in 0..length
                {
                    out[i] = scanline[i].wrapping_sub(prev[i]);
                }
            }
            else
            {
                out[..length].copy_from_slice(scanline);
            }
        }
        FilterType::Average =>
        {
            if let Some(prev) = prevline
            {
                for i in 0..bytewidth.min(length)
                {
                    out[i] = scanline[i].wrapping_sub(prev[i] >> 1);
                }
                for i in bytewidth..length
                {
                    let avg =
                        ((u16::from(scanline[i - bytewidth]) + u16::from(prev[i])) >> 1) as u8;

                    out[i] = scanline[i].wrapping_sub(avg);
                }
            }
            else
            {
                for i in 0..bytewidth.min(length)
                {
                    out[i] = scanline[i];
                }
                for i in bytewidth..length
                {
                    out[i] = scanline[i].wrapping_sub(scanline[i - bytewidth] >> 1);
                }
            }
        }
        FilterType::Paeth =>
        {
            if let Some(prev) = prevline
            {
                for i in 0..bytewidth.min(length)
                {
                    // paeth(0, up, 0) is always up
                    out[i] = scanline[i].wrapping_sub(prev[i]);
                }
                for i in bytewidth..length
                {
                    let predictor =
                        paeth(scanline[i - bytewidth], prev[i], prev[i - bytewidth]);

                    out[i] = scanline[i].wrapping_sub(predictor);
                }
            }
            else
            {
                for i in 0..bytewidth.min(length)
                {
                    out[i] = scanline[i];
                }
                for i in bytewidth..length
                {
                    // paeth(left, 0, 0) is always left
                    out[i] = scanline[i].wrapping_sub(scanline[i - bytewidth]);
                }
            }
        }
    }
}

/// Shannon entropy of a byte buffer, the cost proxy for the entropy
/// filter strategy.
pub(crate) fn entropy(attempt: &[u8]) -> f32
{
    let mut count = [0_u32; 256];

    for byte in attempt
    {
        count[usize::from(*byte)] += 1;
    }

    count
        .iter()
        .filter(|c| **c > 0)
        .map(|c| {
            let p = *c as f32;
            (1.0 / p).log2() * p
        })
        .sum()
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn unfilter(
        filter: FilterType, filtered: &[u8], prev: Option<&[u8]>, bytewidth: usize
    ) -> Vec<u8>
    {
        let mut out = vec![0_u8; filtered.len()];

        match (filter, prev)
        {
            (FilterType::None, _) => out.copy_from_slice(filtered),
            (FilterType::Sub, _) => handle_sub(filtered, &mut out, bytewidth),
            (FilterType::Up, Some(prev)) => handle_up(prev, filtered, &mut out),
            (FilterType::Up, None) => out.copy_from_slice(filtered),
            (FilterType::Average, Some(prev)) =>
            {
                handle_avg(prev, filtered, &mut out, bytewidth)
            }
            (FilterType::Average, None) => handle_avg_first(filtered, &mut out, bytewidth),
            (FilterType::Paeth, Some(prev)) =>
            {
                handle_paeth(prev, filtered, &mut out, bytewidth)
            }
            (FilterType::Paeth, None) => handle_paeth_first(filtered, &mut out, bytewidth)
        }
        out
    }

    #[test]
    fn every_filter_reverses()
    {
        let line: Vec<u8> = (0..64_u32).map(|i| (i * 37 % 256) as u8).collect();
        let prev: Vec<u8> = (0..64_u32).map(|i| (i * 211 % 256) as u8).collect();

        for filter in [
            FilterType::None,
            FilterType::Sub,
            FilterType::Up,
            FilterType::Average,
            FilterType::Paeth
        ]
        {
            for bytewidth in [1_usize, 2, 3, 4, 6, 8]
            {
                let mut filtered = vec![0_u8; line.len()];

                filter_scanline(&mut filtered, &line, Some(&prev), bytewidth, filter);
                let restored = unfilter(filter, &filtered, Some(&prev), bytewidth);
                assert_eq!(restored, line, "{filter:?} bw {bytewidth} with prev");

                filter_scanline(&mut filtered, &line, None, bytewidth, filter);
                let restored = unfilter(filter, &filtered, None, bytewidth);
                assert_eq!(restored, line, "{filter:?} bw {bytewidth} first row");
            }
        }
    }

    #[test]
    fn paeth_tie_breaks_left_first()
    {
        // p = a+b-c; with a=b=c all distances are 0, left wins
        assert_eq!(paeth(10, 10, 10), 10);
        // pa == pb with the upper-left further away, still left
        assert_eq!(paeth(7, 7, 3), 7);
        // the upper-left wins only when strictly closest
        assert_eq!(paeth(0, 2, 1), 1);
    }

    #[test]
    fn entropy_prefers_uniform_buffers()
    {
        let flat = [42_u8; 100];
        let mixed: Vec<u8> = (0..100_u32).map(|i| (i % 256) as u8).collect();

        assert!(entropy(&flat) < entropy(&mixed));
    }
}
