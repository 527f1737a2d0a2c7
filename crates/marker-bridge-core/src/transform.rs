//! Pixel-order transforms on raw buffers.

use crate::{Image, ImageError, ImageView, ImageViewMut};

/// Rotate a packed buffer by 180 degrees in place.
///
/// `bytes_per_pixel` is the element size of one pixel (for example 1 for
/// `Gray8`, 4 for `Rgba8`, 8 for a two-channel `f32` map). Applying the
/// rotation twice restores the original bytes.
pub fn rotate_180_in_place(
    data: &mut [u8],
    width: usize,
    height: usize,
    bytes_per_pixel: usize,
) -> Result<(), ImageError> {
    if bytes_per_pixel == 0 {
        return Err(ImageError::InvalidDimensions { width, height });
    }
    let row_bytes = width
        .checked_mul(bytes_per_pixel)
        .ok_or(ImageError::InvalidDimensions { width, height })?;
    let expected = crate::frame::required_len(width, height, row_bytes, bytes_per_pixel)?;
    if data.len() != expected {
        return Err(ImageError::InvalidBufferLength {
            expected,
            got: data.len(),
        });
    }

    let n = width * height;
    for i in 0..n / 2 {
        let j = n - 1 - i;
        let (head, tail) = data.split_at_mut(j * bytes_per_pixel);
        head[i * bytes_per_pixel..(i + 1) * bytes_per_pixel]
            .swap_with_slice(&mut tail[..bytes_per_pixel]);
    }
    Ok(())
}

/// Rotate 90 degrees clockwise. Output is `height x width`.
pub fn rotate_90_cw(src: &ImageView<'_>) -> Image {
    let c = src.format.channels();
    let (w, h) = (src.height, src.width);
    let mut data = vec![0u8; w * h * c];
    for (y, dst_row) in data.chunks_exact_mut(w * c).enumerate() {
        for (x, px) in dst_row.chunks_exact_mut(c).enumerate() {
            // dst(x, y) = src(col = y, row = H - 1 - x)
            px.copy_from_slice(src.pixel(y, src.height - 1 - x));
        }
    }
    Image {
        width: w,
        height: h,
        format: src.format,
        data,
    }
}

/// Mirror around the vertical axis, in place.
pub fn flip_horizontal(img: &mut Image) {
    let c = img.format.channels();
    let w = img.width;
    for row in img.data.chunks_exact_mut(w * c) {
        for x in 0..w / 2 {
            let (head, tail) = row.split_at_mut((w - 1 - x) * c);
            head[x * c..(x + 1) * c].swap_with_slice(&mut tail[..c]);
        }
    }
}

/// Copy `src` row by row into `dst`, honouring `dst.stride`.
///
/// Only the overlapping region is written when the sizes differ; bytes
/// between the end of a row and the next stride are left untouched.
pub fn copy_rows(src: &ImageView<'_>, dst: &mut ImageViewMut<'_>) -> Result<(), ImageError> {
    if src.format != dst.format {
        return Err(ImageError::UnexpectedFormat {
            expected: dst.format,
            got: src.format,
        });
    }
    let rows = src.height.min(dst.height);
    let bytes = src.row_bytes().min(dst.row_bytes());
    for y in 0..rows {
        dst.row_mut(y)[..bytes].copy_from_slice(&src.row(y)[..bytes]);
    }
    Ok(())
}
