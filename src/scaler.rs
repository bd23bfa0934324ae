use rayon::{
    iter::{IndexedParallelIterator, ParallelIterator},
    slice::ParallelSliceMut,
};

use crate::renderer::{CHANNELS, FrameBuffer};

/// Precomputed mapping from dest pixels to src neighbors + weights
pub struct ScaleLut {
    x0: Vec<usize>,
    x1: Vec<usize>,
    wx: Vec<u32>,
    y0: Vec<usize>,
    y1: Vec<usize>,
    wy: Vec<u32>,
}

impl ScaleLut {
    pub fn empty() -> Self {
        Self {
            x0: Vec::new(),
            x1: Vec::new(),
            wx: Vec::new(),
            y0: Vec::new(),
            y1: Vec::new(),
            wy: Vec::new(),
        }
    }

    #[inline]
    pub fn dst_size(&self) -> (usize, usize) {
        (self.x0.len(), self.y0.len())
    }
}

/// Neighbor indices and 8.8 fixed-point weights along one axis.
fn axis_lut(dst: usize, src: usize) -> (Vec<usize>, Vec<usize>, Vec<u32>) {
    let step = src as f32 / dst as f32;
    let last = src.saturating_sub(1);
    (0..dst)
        .map(|d| {
            let f = d as f32 * step;
            let i0 = (f.floor() as usize).min(last);
            let i1 = (i0 + 1).min(last);
            (i0, i1, ((f - i0 as f32) * 256.0).round().clamp(0.0, 256.0) as u32)
        })
        .fold(
            (Vec::with_capacity(dst), Vec::with_capacity(dst), Vec::with_capacity(dst)),
            |(mut a, mut b, mut w), (i0, i1, wi)| {
                a.push(i0);
                b.push(i1);
                w.push(wi);
                (a, b, w)
            },
        )
}

pub fn build_scale_lut(dst_w: usize, dst_h: usize, src_w: usize, src_h: usize) -> ScaleLut {
    let (x0, x1, wx) = axis_lut(dst_w, src_w);
    let (y0, y1, wy) = axis_lut(dst_h, src_h);
    ScaleLut {
        x0,
        x1,
        wx,
        y0,
        y1,
        wy,
    }
}

#[inline]
fn lerp_channel(a: u8, b: u8, w256: u32) -> u32 {
    (a as u32 * (256 - w256) + b as u32 * w256) >> 8
}

#[inline]
fn sample(src: &[u8], row: usize, x0: usize, x1: usize, wx: u32) -> [u32; 3] {
    let a = &src[(row + x0) * CHANNELS..];
    let b = &src[(row + x1) * CHANNELS..];
    [
        lerp_channel(a[0], b[0], wx),
        lerp_channel(a[1], b[1], wx),
        lerp_channel(a[2], b[2], wx),
    ]
}

/// Parallel bilinear stretch of an RGB8 frame into a 0x00RRGGBB surface.
/// Rows are processed in parallel for cache friendly writes
pub fn blit_bilinear_stretch(dst: &mut [u32], frame: &FrameBuffer, lut: &ScaleLut) {
    let (dw, _) = lut.dst_size();
    if dw == 0 || frame.width() == 0 || frame.height() == 0 {
        return;
    }
    let src = frame.as_bytes();
    let sw = frame.width();

    dst.par_chunks_mut(dw).enumerate().for_each(|(y, dst_row)| {
        let Some(&y0) = lut.y0.get(y) else { return };
        let row0 = y0 * sw;
        let row1 = lut.y1[y] * sw;
        let wy = lut.wy[y];

        for (x, px) in dst_row.iter_mut().enumerate() {
            let (x0, x1, wx) = (lut.x0[x], lut.x1[x], lut.wx[x]);
            let top = sample(src, row0, x0, x1, wx);
            let bot = sample(src, row1, x0, x1, wx);
            let mix = |c: usize| ((top[c] * (256 - wy) + bot[c] * wy) >> 8).min(255);
            *px = (mix(0) << 16) | (mix(1) << 8) | mix(2);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;

    #[test]
    fn identity_scale_copies_pixels() {
        let mut frame = FrameBuffer::new(2, 2);
        {
            let mut bands = frame.column_bands(1);
            bands[0].write_column(0, &[Rgb(10, 20, 30), Rgb(1, 2, 3)]);
            bands[0].write_column(1, &[Rgb(255, 0, 0), Rgb(0, 0, 255)]);
        }
        let lut = build_scale_lut(2, 2, 2, 2);
        let mut dst = vec![0u32; 4];
        blit_bilinear_stretch(&mut dst, &frame, &lut);
        assert_eq!(dst, vec![0x0A141E, 0xFF0000, 0x010203, 0x0000FF]);
    }

    #[test]
    fn upscale_stays_in_bounds() {
        let frame = FrameBuffer::new(3, 2);
        let lut = build_scale_lut(7, 5, 3, 2);
        assert_eq!(lut.dst_size(), (7, 5));
        assert!(lut.x1.iter().all(|&x| x < 3));
        assert!(lut.y1.iter().all(|&y| y < 2));
        let mut dst = vec![1u32; 35];
        blit_bilinear_stretch(&mut dst, &frame, &lut);
        assert!(dst.iter().all(|&p| p == 0));
    }
}
