//! Colour conversions between the frame formats the bridge sees.
//!
//! YUV 4:2:0 decoding uses the BT.601 video-range integer coefficients also
//! used by OpenCV's `COLOR_YUV2RGBA_NV21`, so frames look identical to what
//! a Java-side `Imgproc.cvtColor` would produce.

use crate::{Image, ImageError, ImageView, PixelFormat};
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ColorError {
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error("YUV 4:2:0 frames need even dimensions (width={width}, height={height})")]
    OddDimensions { width: usize, height: usize },
    #[error("{plane} plane too short (expected at least {expected} bytes, got {got})")]
    PlaneTooShort {
        plane: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("chroma pixel stride must be 1 or 2 (got {0})")]
    InvalidPixelStride(usize),
}

/// Memory layout of a contiguous YUV 4:2:0 buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YuvLayout {
    /// Y plane followed by interleaved V/U (Android camera default).
    Nv21,
    /// Y plane followed by interleaved U/V.
    Nv12,
    /// Y plane, U plane, V plane.
    I420,
    /// Y plane, V plane, U plane.
    Yv12,
}

/// A YUV 4:2:0 frame described plane by plane.
///
/// This covers both contiguous layouts and the `YUV_420_888` planes an
/// Android `ImageReader` hands out, where the chroma planes may alias each
/// other with a pixel stride of 2.
#[derive(Clone, Copy, Debug)]
pub struct YuvFrame<'a> {
    pub width: usize,
    pub height: usize,
    pub y: &'a [u8],
    pub y_stride: usize,
    pub u: &'a [u8],
    pub v: &'a [u8],
    pub uv_stride: usize,
    /// Distance between consecutive chroma samples in `u`/`v` (1 planar, 2 semi-planar).
    pub uv_pixel_stride: usize,
}

impl<'a> YuvFrame<'a> {
    /// Split a tightly packed buffer according to `layout`.
    pub fn from_packed(
        width: usize,
        height: usize,
        layout: YuvLayout,
        data: &'a [u8],
    ) -> Result<Self, ColorError> {
        check_even(width, height)?;
        let luma = width * height;
        let expected = luma + luma / 2;
        if data.len() < expected {
            return Err(ColorError::PlaneTooShort {
                plane: "yuv",
                expected,
                got: data.len(),
            });
        }
        let y = &data[..luma];
        let chroma = &data[luma..expected];
        let quarter = luma / 4;
        let (u, v, uv_stride, uv_pixel_stride) = match layout {
            YuvLayout::Nv21 => (&chroma[1..], chroma, width, 2),
            YuvLayout::Nv12 => (chroma, &chroma[1..], width, 2),
            YuvLayout::I420 => (&chroma[..quarter], &chroma[quarter..], width / 2, 1),
            YuvLayout::Yv12 => (&chroma[quarter..], &chroma[..quarter], width / 2, 1),
        };
        Ok(Self {
            width,
            height,
            y,
            y_stride: width,
            u,
            v,
            uv_stride,
            uv_pixel_stride,
        })
    }

    fn validate(&self) -> Result<(), ColorError> {
        check_even(self.width, self.height)?;
        if !(1..=2).contains(&self.uv_pixel_stride) {
            return Err(ColorError::InvalidPixelStride(self.uv_pixel_stride));
        }
        let y_needed = self.y_stride * (self.height - 1) + self.width;
        if self.y_stride < self.width || self.y.len() < y_needed {
            return Err(ColorError::PlaneTooShort {
                plane: "y",
                expected: y_needed,
                got: self.y.len(),
            });
        }
        let cw = self.width / 2;
        let ch = self.height / 2;
        let uv_needed = self.uv_stride * (ch - 1) + (cw - 1) * self.uv_pixel_stride + 1;
        for (plane, buf) in [("u", self.u), ("v", self.v)] {
            if buf.len() < uv_needed {
                return Err(ColorError::PlaneTooShort {
                    plane,
                    expected: uv_needed,
                    got: buf.len(),
                });
            }
        }
        Ok(())
    }
}

fn check_even(width: usize, height: usize) -> Result<(), ColorError> {
    if width == 0 || height == 0 {
        return Err(ImageError::InvalidDimensions { width, height }.into());
    }
    if width % 2 != 0 || height % 2 != 0 {
        return Err(ColorError::OddDimensions { width, height });
    }
    Ok(())
}

// 20-bit fixed point BT.601 video-range coefficients.
const SHIFT: i32 = 20;
const CY: i32 = 1_220_542;
const CVR: i32 = 1_673_527;
const CVG: i32 = -852_492;
const CUG: i32 = -409_993;
const CUB: i32 = 2_116_026;

#[inline]
fn clamp_u8(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

/// Convert one YUV sample to RGB.
#[inline]
pub fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let yy = (y as i32 - 16).max(0) * CY;
    let u = u as i32 - 128;
    let v = v as i32 - 128;
    let half = 1 << (SHIFT - 1);
    let r = (yy + CVR * v + half) >> SHIFT;
    let g = (yy + CVG * v + CUG * u + half) >> SHIFT;
    let b = (yy + CUB * u + half) >> SHIFT;
    [clamp_u8(r), clamp_u8(g), clamp_u8(b)]
}

/// Decode a YUV 4:2:0 frame into packed RGBA (alpha = 255).
pub fn yuv420_to_rgba(frame: &YuvFrame<'_>) -> Result<Image, ColorError> {
    frame.validate()?;
    let mut out = Image::new(frame.width, frame.height, PixelFormat::Rgba8)?;
    let row_bytes = frame.width * 4;
    for (row, dst) in out.data.chunks_exact_mut(row_bytes).enumerate() {
        let y_row = &frame.y[row * frame.y_stride..];
        let c_off = (row / 2) * frame.uv_stride;
        for (col, px) in dst.chunks_exact_mut(4).enumerate() {
            let c = c_off + (col / 2) * frame.uv_pixel_stride;
            let [r, g, b] = yuv_to_rgb(y_row[col], frame.u[c], frame.v[c]);
            px.copy_from_slice(&[r, g, b, 255]);
        }
    }
    Ok(out)
}

fn map_pixels<const N: usize>(
    src: &ImageView<'_>,
    expected: PixelFormat,
    target: PixelFormat,
    f: impl Fn(&[u8]) -> [u8; N],
) -> Result<Image, ImageError> {
    src.expect_format(expected)?;
    let mut out = Image::new(src.width, src.height, target)?;
    let c = expected.channels();
    for (y, dst_row) in out.data.chunks_exact_mut(src.width * N).enumerate() {
        for (px, dst) in src.row(y).chunks_exact(c).zip(dst_row.chunks_exact_mut(N)) {
            dst.copy_from_slice(&f(px));
        }
    }
    Ok(out)
}

/// Drop the alpha channel.
pub fn rgba_to_rgb(src: &ImageView<'_>) -> Result<Image, ImageError> {
    map_pixels(src, PixelFormat::Rgba8, PixelFormat::Rgb8, |p| {
        [p[0], p[1], p[2]]
    })
}

pub fn gray_to_rgb(src: &ImageView<'_>) -> Result<Image, ImageError> {
    map_pixels(src, PixelFormat::Gray8, PixelFormat::Rgb8, |p| {
        [p[0], p[0], p[0]]
    })
}

/// BT.601 luma, rounded.
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    // 0.299, 0.587, 0.114 in 14-bit fixed point.
    let v = 4899 * r as u32 + 9617 * g as u32 + 1868 * b as u32;
    ((v + (1 << 13)) >> 14) as u8
}

pub fn rgb_to_gray(src: &ImageView<'_>) -> Result<Image, ImageError> {
    map_pixels(src, PixelFormat::Rgb8, PixelFormat::Gray8, |p| {
        [luma(p[0], p[1], p[2])]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_range_black_and_white() {
        assert_eq!(yuv_to_rgb(16, 128, 128), [0, 0, 0]);
        assert_eq!(yuv_to_rgb(235, 128, 128), [255, 255, 255]);
        // Below-black luma is clamped.
        assert_eq!(yuv_to_rgb(0, 128, 128), [0, 0, 0]);
    }

    #[test]
    fn strong_v_is_red() {
        let [r, g, b] = yuv_to_rgb(81, 90, 240);
        assert!(r > 240, "r={r}");
        assert!(g < 20, "g={g}");
        assert!(b < 20, "b={b}");
    }

    #[test]
    fn nv21_and_i420_agree() {
        // 2x2 frame, one chroma sample.
        let nv21 = [100, 110, 120, 130, 200, 50]; // V=200, U=50
        let i420 = [100, 110, 120, 130, 50, 200]; // U=50, V=200
        let a = yuv420_to_rgba(&YuvFrame::from_packed(2, 2, YuvLayout::Nv21, &nv21).unwrap())
            .unwrap();
        let b = yuv420_to_rgba(&YuvFrame::from_packed(2, 2, YuvLayout::I420, &i420).unwrap())
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.format, PixelFormat::Rgba8);
        assert!(a.data.chunks_exact(4).all(|p| p[3] == 255));
    }

    #[test]
    fn nv12_swaps_chroma_order() {
        let nv21 = [100, 100, 100, 100, 200, 50];
        let nv12 = [100, 100, 100, 100, 50, 200];
        let a = yuv420_to_rgba(&YuvFrame::from_packed(2, 2, YuvLayout::Nv21, &nv21).unwrap())
            .unwrap();
        let b = yuv420_to_rgba(&YuvFrame::from_packed(2, 2, YuvLayout::Nv12, &nv12).unwrap())
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn odd_dimensions_are_rejected() {
        let data = [0u8; 64];
        assert_eq!(
            YuvFrame::from_packed(3, 2, YuvLayout::Nv21, &data).unwrap_err(),
            ColorError::OddDimensions {
                width: 3,
                height: 2
            }
        );
    }

    #[test]
    fn short_buffer_is_rejected() {
        let data = [0u8; 5];
        assert!(matches!(
            YuvFrame::from_packed(2, 2, YuvLayout::Nv21, &data),
            Err(ColorError::PlaneTooShort { .. })
        ));
    }

    #[test]
    fn rgba_to_rgb_drops_alpha() {
        let data = [1, 2, 3, 4, 5, 6, 7, 8];
        let view = ImageView::new(2, 1, PixelFormat::Rgba8, &data).unwrap();
        let rgb = rgba_to_rgb(&view).unwrap();
        assert_eq!(rgb.data, vec![1, 2, 3, 5, 6, 7]);
        assert_eq!(rgb.format, PixelFormat::Rgb8);
    }

    #[test]
    fn rgba_to_rgb_rejects_wrong_format() {
        let data = [0u8; 6];
        let view = ImageView::new(2, 1, PixelFormat::Rgb8, &data).unwrap();
        assert!(matches!(
            rgba_to_rgb(&view),
            Err(ImageError::UnexpectedFormat { .. })
        ));
    }

    #[test]
    fn luma_of_white_is_255() {
        assert_eq!(luma(255, 255, 255), 255);
        assert_eq!(luma(0, 0, 0), 0);
    }
}
