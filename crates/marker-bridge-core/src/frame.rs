//! Interleaved 8-bit frames with an explicit row stride.
//!
//! `ImageView` borrows caller memory for the duration of one call; `Image`
//! owns a packed buffer (stride == width * channels). Constructors validate
//! buffer lengths so a wrong width/height/format tag surfaces as an
//! [`ImageError`] instead of an out-of-bounds access.

use serde::{Deserialize, Serialize};

/// Pixel layout of an interleaved 8-bit buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    Gray8,
    Rgb8,
    Rgba8,
}

impl PixelFormat {
    /// Bytes per pixel.
    #[inline]
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ImageError {
    #[error("invalid image dimensions (width={width}, height={height})")]
    InvalidDimensions { width: usize, height: usize },
    #[error("row stride {stride} is smaller than one row ({row_bytes} bytes)")]
    InvalidStride { stride: usize, row_bytes: usize },
    #[error("invalid buffer length (expected at least {expected} bytes, got {got})")]
    InvalidBufferLength { expected: usize, got: usize },
    #[error("unexpected pixel format (expected {expected:?}, got {got:?})")]
    UnexpectedFormat {
        expected: PixelFormat,
        got: PixelFormat,
    },
    #[error("image size mismatch ({0}x{1} vs {2}x{3})")]
    SizeMismatch(usize, usize, usize, usize),
}

/// Minimum number of bytes a strided buffer must hold.
///
/// The last row only needs `row_bytes`, not a full stride.
pub fn required_len(
    width: usize,
    height: usize,
    stride: usize,
    channels: usize,
) -> Result<usize, ImageError> {
    if width == 0 || height == 0 {
        return Err(ImageError::InvalidDimensions { width, height });
    }
    let row_bytes = width
        .checked_mul(channels)
        .ok_or(ImageError::InvalidDimensions { width, height })?;
    if stride < row_bytes {
        return Err(ImageError::InvalidStride { stride, row_bytes });
    }
    stride
        .checked_mul(height - 1)
        .and_then(|v| v.checked_add(row_bytes))
        .ok_or(ImageError::InvalidDimensions { width, height })
}

/// Borrowed interleaved frame.
#[derive(Clone, Copy, Debug)]
pub struct ImageView<'a> {
    pub width: usize,
    pub height: usize,
    /// Bytes between the starts of consecutive rows.
    pub stride: usize,
    pub format: PixelFormat,
    pub data: &'a [u8],
}

impl<'a> ImageView<'a> {
    /// Packed view (stride == width * channels).
    pub fn new(
        width: usize,
        height: usize,
        format: PixelFormat,
        data: &'a [u8],
    ) -> Result<Self, ImageError> {
        Self::with_stride(width, height, width * format.channels(), format, data)
    }

    pub fn with_stride(
        width: usize,
        height: usize,
        stride: usize,
        format: PixelFormat,
        data: &'a [u8],
    ) -> Result<Self, ImageError> {
        let expected = required_len(width, height, stride, format.channels())?;
        if data.len() < expected {
            return Err(ImageError::InvalidBufferLength {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            stride,
            format,
            data,
        })
    }

    #[inline]
    pub fn row_bytes(&self) -> usize {
        self.width * self.format.channels()
    }

    /// Pixel bytes of row `y` (without stride padding).
    #[inline]
    pub fn row(&self, y: usize) -> &'a [u8] {
        let start = y * self.stride;
        &self.data[start..start + self.row_bytes()]
    }

    /// Bytes of the pixel at `(x, y)`.
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> &'a [u8] {
        let c = self.format.channels();
        let start = y * self.stride + x * c;
        &self.data[start..start + c]
    }

    pub fn expect_format(&self, expected: PixelFormat) -> Result<(), ImageError> {
        if self.format != expected {
            return Err(ImageError::UnexpectedFormat {
                expected,
                got: self.format,
            });
        }
        Ok(())
    }

    /// Copy into an owned packed image.
    pub fn to_owned_image(&self) -> Image {
        let mut data = Vec::with_capacity(self.row_bytes() * self.height);
        for y in 0..self.height {
            data.extend_from_slice(self.row(y));
        }
        Image {
            width: self.width,
            height: self.height,
            format: self.format,
            data,
        }
    }
}

/// Mutable borrowed frame, used for caller-provided output buffers.
#[derive(Debug)]
pub struct ImageViewMut<'a> {
    pub width: usize,
    pub height: usize,
    pub stride: usize,
    pub format: PixelFormat,
    pub data: &'a mut [u8],
}

impl<'a> ImageViewMut<'a> {
    pub fn new(
        width: usize,
        height: usize,
        format: PixelFormat,
        data: &'a mut [u8],
    ) -> Result<Self, ImageError> {
        Self::with_stride(width, height, width * format.channels(), format, data)
    }

    pub fn with_stride(
        width: usize,
        height: usize,
        stride: usize,
        format: PixelFormat,
        data: &'a mut [u8],
    ) -> Result<Self, ImageError> {
        let expected = required_len(width, height, stride, format.channels())?;
        if data.len() < expected {
            return Err(ImageError::InvalidBufferLength {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            stride,
            format,
            data,
        })
    }

    #[inline]
    pub fn row_bytes(&self) -> usize {
        self.width * self.format.channels()
    }

    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        let start = y * self.stride;
        let len = self.row_bytes();
        &mut self.data[start..start + len]
    }
}

/// Owned packed frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Image {
    pub width: usize,
    pub height: usize,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

impl Image {
    /// Zero-filled image.
    pub fn new(width: usize, height: usize, format: PixelFormat) -> Result<Self, ImageError> {
        let len = required_len(width, height, width * format.channels(), format.channels())?;
        Ok(Self {
            width,
            height,
            format,
            data: vec![0; len],
        })
    }

    /// Wrap an existing packed buffer; the length must match exactly.
    pub fn from_raw(
        width: usize,
        height: usize,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Result<Self, ImageError> {
        let expected = required_len(width, height, width * format.channels(), format.channels())?;
        if data.len() != expected {
            return Err(ImageError::InvalidBufferLength {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.width * self.format.channels()
    }

    #[inline]
    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn view(&self) -> ImageView<'_> {
        ImageView {
            width: self.width,
            height: self.height,
            stride: self.stride(),
            format: self.format,
            data: &self.data,
        }
    }

    pub fn view_mut(&mut self) -> ImageViewMut<'_> {
        let stride = self.stride();
        ImageViewMut {
            width: self.width,
            height: self.height,
            stride,
            format: self.format,
            data: &mut self.data,
        }
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> &[u8] {
        let c = self.format.channels();
        let start = (y * self.width + x) * c;
        &self.data[start..start + c]
    }
}

#[cfg(feature = "image")]
mod image_interop {
    use super::{Image, ImageError, ImageView, PixelFormat};

    impl Image {
        /// Convert into the `image` crate buffer matching the pixel format.
        pub fn into_dynamic(self) -> Result<::image::DynamicImage, ImageError> {
            let (w, h) = (self.width as u32, self.height as u32);
            let err = ImageError::InvalidDimensions {
                width: self.width,
                height: self.height,
            };
            let out = match self.format {
                PixelFormat::Gray8 => ::image::GrayImage::from_raw(w, h, self.data)
                    .map(::image::DynamicImage::ImageLuma8),
                PixelFormat::Rgb8 => ::image::RgbImage::from_raw(w, h, self.data)
                    .map(::image::DynamicImage::ImageRgb8),
                PixelFormat::Rgba8 => ::image::RgbaImage::from_raw(w, h, self.data)
                    .map(::image::DynamicImage::ImageRgba8),
            };
            out.ok_or(err)
        }
    }

    /// Borrow an `image::GrayImage` as a core view.
    pub fn gray_view(img: &::image::GrayImage) -> ImageView<'_> {
        ImageView {
            width: img.width() as usize,
            height: img.height() as usize,
            stride: img.width() as usize,
            format: PixelFormat::Gray8,
            data: img.as_raw(),
        }
    }
}

#[cfg(feature = "image")]
pub use image_interop::gray_view;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strided_view_only_needs_row_bytes_on_last_row() {
        // 2x2 RGBA with 12-byte stride: 12 + 8 bytes.
        let data = vec![0u8; 20];
        let view = ImageView::with_stride(2, 2, 12, PixelFormat::Rgba8, &data).expect("view");
        assert_eq!(view.row(1).len(), 8);
    }

    #[test]
    fn short_buffer_is_rejected() {
        let data = vec![0u8; 5];
        let err = ImageView::new(2, 2, PixelFormat::Rgb8, &data).unwrap_err();
        assert_eq!(
            err,
            ImageError::InvalidBufferLength {
                expected: 12,
                got: 5
            }
        );
    }

    #[test]
    fn stride_smaller_than_row_is_rejected() {
        let data = vec![0u8; 64];
        assert!(matches!(
            ImageView::with_stride(4, 2, 3, PixelFormat::Gray8, &data),
            Err(ImageError::InvalidStride { .. })
        ));
    }

    #[test]
    fn to_owned_image_drops_padding() {
        let data: Vec<u8> = (0..10).collect();
        let view = ImageView::with_stride(3, 2, 5, PixelFormat::Gray8, &data).expect("view");
        let img = view.to_owned_image();
        assert_eq!(img.data, vec![0, 1, 2, 5, 6, 7]);
    }
}
