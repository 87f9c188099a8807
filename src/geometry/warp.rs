//! Inverse-mapped perspective resampling.

use image::{DynamicImage, ImageBuffer, Pixel};
use rayon::prelude::*;

use super::corners::OrderedQuad;
use super::homography::Homography;
use super::size::RectifiedSize;
use crate::error::LabelCropError;
use crate::label::Point;

/// A channel value that can be blended in `f64`.
pub(crate) trait Sample: Copy + Send + Sync {
    fn to_f64(self) -> f64;
    fn from_f64(value: f64) -> Self;
}

impl Sample for u8 {
    #[inline]
    fn to_f64(self) -> f64 {
        f64::from(self)
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        value.round().clamp(0.0, f64::from(u8::MAX)) as u8
    }
}

impl Sample for u16 {
    #[inline]
    fn to_f64(self) -> f64 {
        f64::from(self)
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        value.round().clamp(0.0, f64::from(u16::MAX)) as u16
    }
}

impl Sample for f32 {
    #[inline]
    fn to_f64(self) -> f64 {
        f64::from(self)
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

/// Cuts `quad` out of `src` into an axis-aligned raster of `size`.
///
/// # Errors
/// Returns `IllConditionedTransform` if the quad cannot be mapped onto the
/// raster corners.
pub fn rectify(
    src: &DynamicImage,
    quad: &OrderedQuad,
    size: RectifiedSize,
) -> Result<DynamicImage, LabelCropError> {
    let inverse = Homography::rectify(quad, size)?.inverse()?;
    Ok(warp_perspective(src, &inverse, size))
}

/// Fills a `size` raster by pulling every destination pixel through
/// `inverse` and sampling `src` bilinearly.
///
/// Sample taps outside `src` contribute black, so pixels that map fully
/// outside the source come out black (transparent for alpha layouts). The
/// output keeps the source's channel layout and sample type.
pub fn warp_perspective(
    src: &DynamicImage,
    inverse: &Homography,
    size: RectifiedSize,
) -> DynamicImage {
    match src {
        DynamicImage::ImageLuma8(buf) => DynamicImage::ImageLuma8(warp_buffer(buf, inverse, size)),
        DynamicImage::ImageLumaA8(buf) => {
            DynamicImage::ImageLumaA8(warp_buffer(buf, inverse, size))
        }
        DynamicImage::ImageRgb8(buf) => DynamicImage::ImageRgb8(warp_buffer(buf, inverse, size)),
        DynamicImage::ImageRgba8(buf) => DynamicImage::ImageRgba8(warp_buffer(buf, inverse, size)),
        DynamicImage::ImageLuma16(buf) => {
            DynamicImage::ImageLuma16(warp_buffer(buf, inverse, size))
        }
        DynamicImage::ImageLumaA16(buf) => {
            DynamicImage::ImageLumaA16(warp_buffer(buf, inverse, size))
        }
        DynamicImage::ImageRgb16(buf) => DynamicImage::ImageRgb16(warp_buffer(buf, inverse, size)),
        DynamicImage::ImageRgba16(buf) => {
            DynamicImage::ImageRgba16(warp_buffer(buf, inverse, size))
        }
        DynamicImage::ImageRgb32F(buf) => {
            DynamicImage::ImageRgb32F(warp_buffer(buf, inverse, size))
        }
        DynamicImage::ImageRgba32F(buf) => {
            DynamicImage::ImageRgba32F(warp_buffer(buf, inverse, size))
        }
        other => DynamicImage::ImageRgba8(warp_buffer(&other.to_rgba8(), inverse, size)),
    }
}

fn warp_buffer<P>(
    src: &ImageBuffer<P, Vec<P::Subpixel>>,
    inverse: &Homography,
    size: RectifiedSize,
) -> ImageBuffer<P, Vec<P::Subpixel>>
where
    P: Pixel,
    P::Subpixel: Sample,
{
    let channels = usize::from(P::CHANNEL_COUNT);
    let (src_width, src_height) = src.dimensions();
    let raw: &[P::Subpixel] = src.as_raw();

    let mut dst: ImageBuffer<P, Vec<P::Subpixel>> = ImageBuffer::new(size.width, size.height);
    let row_len = size.width as usize * channels;

    dst.par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(dst_y, row)| {
            for (dst_x, out) in row.chunks_mut(channels).enumerate() {
                let Some(source) = inverse.apply(Point::new(dst_x as f64, dst_y as f64)) else {
                    continue;
                };
                sample_bilinear(raw, src_width, src_height, channels, source, out);
            }
        });

    dst
}

fn sample_bilinear<S: Sample>(
    raw: &[S],
    width: u32,
    height: u32,
    channels: usize,
    at: Point,
    out: &mut [S],
) {
    let (w, h) = (f64::from(width), f64::from(height));
    // Also rejects NaN.
    if !(at.x > -1.0 && at.y > -1.0 && at.x < w && at.y < h) {
        return;
    }

    let x0 = at.x.floor();
    let y0 = at.y.floor();
    let fx = at.x - x0;
    let fy = at.y - y0;

    let taps = [
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x0 + 1.0, y0, fx * (1.0 - fy)),
        (x0, y0 + 1.0, (1.0 - fx) * fy),
        (x0 + 1.0, y0 + 1.0, fx * fy),
    ];

    for (channel, slot) in out.iter_mut().enumerate() {
        let mut acc = 0.0;
        for &(tx, ty, weight) in &taps {
            if weight == 0.0 || tx < 0.0 || ty < 0.0 || tx >= w || ty >= h {
                continue;
            }
            let idx = (ty as usize * width as usize + tx as usize) * channels + channel;
            acc += weight * raw[idx].to_f64();
        }
        *slot = S::from_f64(acc);
    }
}
