//! Presenting camera frames onto a platform window surface.
//!
//! The surface is modelled after `ANativeWindow`: acquire a reference, lock
//! a buffer with its own row stride, write, unlock and post, release.
//! [`SurfaceGuard`] owns that sequence so every exit path unlocks and
//! releases whatever was taken.

use crate::config::DebugRect;
use crate::core::{
    copy_rows, draw_rect, flip_horizontal, rotate_90_cw, yuv420_to_rgba, ColorError, Image,
    ImageError, ImageViewMut, PixelFormat, YuvFrame,
};
use crate::BridgeContext;

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(thiserror::Error, Debug)]
pub enum PresentError {
    #[error(transparent)]
    Color(#[from] ColorError),
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error("failed to acquire window surface: {0}")]
    Acquire(String),
    #[error("failed to lock window buffer: {0}")]
    Lock(String),
    #[error("window buffer format {0:?} is not supported")]
    UnsupportedFormat(PixelFormat),
}

/// A locked window buffer.
#[derive(Debug)]
pub struct SurfaceBuffer<'a> {
    pub width: usize,
    pub height: usize,
    /// Row stride in pixels, `>= width`.
    pub stride: usize,
    pub format: PixelFormat,
    pub bits: &'a mut [u8],
}

impl SurfaceBuffer<'_> {
    fn as_view_mut(&mut self) -> Result<ImageViewMut<'_>, PresentError> {
        if self.format != PixelFormat::Rgba8 {
            return Err(PresentError::UnsupportedFormat(self.format));
        }
        let c = self.format.channels();
        Ok(ImageViewMut::with_stride(
            self.width,
            self.height,
            self.stride * c,
            self.format,
            self.bits,
        )?)
    }
}

/// Platform window primitives.
pub trait WindowSurface {
    fn acquire(&mut self) -> Result<(), PresentError>;
    fn lock(&mut self) -> Result<SurfaceBuffer<'_>, PresentError>;
    fn unlock_and_post(&mut self);
    fn release(&mut self);
}

/// Scoped acquisition of a [`WindowSurface`].
pub struct SurfaceGuard<'s, S: WindowSurface + ?Sized> {
    surface: &'s mut S,
    locked: bool,
}

impl<'s, S: WindowSurface + ?Sized> SurfaceGuard<'s, S> {
    pub fn acquire(surface: &'s mut S) -> Result<Self, PresentError> {
        surface.acquire()?;
        Ok(Self {
            surface,
            locked: false,
        })
    }

    /// Lock the buffer; it is unlocked and posted when the guard drops.
    pub fn lock(&mut self) -> Result<SurfaceBuffer<'_>, PresentError> {
        match self.surface.lock() {
            Ok(buffer) => {
                self.locked = true;
                Ok(buffer)
            }
            Err(e) => Err(e),
        }
    }
}

impl<S: WindowSurface + ?Sized> Drop for SurfaceGuard<'_, S> {
    fn drop(&mut self) {
        if self.locked {
            self.surface.unlock_and_post();
        }
        self.surface.release();
    }
}

/// YUV -> RGBA, oriented for the display, debug rectangles painted.
pub fn render_preview(yuv: &YuvFrame<'_>, debug_rects: &[DebugRect]) -> Result<Image, PresentError> {
    let rgba = yuv420_to_rgba(yuv)?;
    let mut frame = rotate_90_cw(&rgba.view());
    flip_horizontal(&mut frame);
    for r in debug_rects {
        draw_rect(&mut frame, r.rect, r.color, r.thickness);
    }
    Ok(frame)
}

/// Render `yuv` and copy it row by row into the window buffer.
///
/// The buffer may be larger or smaller than the frame; only the overlap is
/// written.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(width = yuv.width, height = yuv.height))
)]
pub fn present_yuv_frame<S: WindowSurface + ?Sized>(
    yuv: &YuvFrame<'_>,
    surface: &mut S,
    debug_rects: &[DebugRect],
) -> Result<(), PresentError> {
    let frame = render_preview(yuv, debug_rects)?;

    let mut guard = SurfaceGuard::acquire(surface)?;
    let mut buffer = guard.lock()?;
    let mut dst = buffer.as_view_mut()?;
    copy_rows(&frame.view(), &mut dst)?;
    Ok(())
}

impl<B> BridgeContext<B> {
    /// [`present_yuv_frame`] with the configured debug rectangles.
    pub fn present_yuv_frame<S: WindowSurface + ?Sized>(
        &self,
        yuv: &YuvFrame<'_>,
        surface: &mut S,
    ) -> Result<(), PresentError> {
        present_yuv_frame(yuv, surface, &self.config.debug_rects)
    }
}
