//! Frame types and buffer plumbing for the marker bridge.
//!
//! This crate is deliberately free of any vision library. It covers what
//! happens around a detector call: wrapping caller buffers, converting
//! colour spaces, rotating and copying pixels, drawing debug overlays and
//! turning marker poses into renderer-ready matrices.

mod camera;
mod color;
mod draw;
mod frame;
mod logger;
mod transform;

pub use camera::{cv_to_gl, gl_axis_flip, CameraIntrinsics, MarkerPose, DEFAULT_DISTORTION_LEN};
pub use color::{
    gray_to_rgb, luma, rgb_to_gray, rgba_to_rgb, yuv420_to_rgba, yuv_to_rgb, ColorError,
    YuvFrame, YuvLayout,
};
pub use draw::{
    draw_axes, draw_line, draw_marker_outline, draw_polyline, draw_rect, set_pixel, Color, Rect,
    BLUE, GREEN, RED, YELLOW,
};
#[cfg(feature = "image")]
pub use frame::gray_view;
pub use frame::{required_len, Image, ImageError, ImageView, ImageViewMut, PixelFormat};
pub use transform::{copy_rows, flip_horizontal, rotate_180_in_place, rotate_90_cw};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, level_from_verbosity};
