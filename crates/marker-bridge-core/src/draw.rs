//! Software overlays: lines, rectangles, marker outlines and axis gizmos.
//!
//! Colours are given as RGBA and written according to the target format
//! (alpha dropped for `Rgb8`, BT.601 luma for `Gray8`). Everything clips to
//! the image bounds.

use crate::color::luma;
use crate::{Image, PixelFormat};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// RGBA colour.
pub type Color = [u8; 4];

pub const RED: Color = [255, 0, 0, 255];
pub const GREEN: Color = [0, 255, 0, 255];
pub const BLUE: Color = [0, 0, 255, 255];
pub const YELLOW: Color = [255, 255, 0, 255];

/// Axis-aligned rectangle in pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

#[inline]
fn encode(format: PixelFormat, color: Color) -> ([u8; 4], usize) {
    match format {
        PixelFormat::Gray8 => ([luma(color[0], color[1], color[2]), 0, 0, 0], 1),
        PixelFormat::Rgb8 => (color, 3),
        PixelFormat::Rgba8 => (color, 4),
    }
}

#[inline]
pub fn set_pixel(img: &mut Image, x: i64, y: i64, color: Color) {
    if x < 0 || y < 0 || x >= img.width as i64 || y >= img.height as i64 {
        return;
    }
    let (px, c) = encode(img.format, color);
    let start = (y as usize * img.width + x as usize) * c;
    img.data[start..start + c].copy_from_slice(&px[..c]);
}

fn stamp(img: &mut Image, x: i64, y: i64, color: Color, thickness: u32) {
    if thickness <= 1 {
        set_pixel(img, x, y, color);
        return;
    }
    let r = thickness as i64 / 2;
    for dy in -r..=r {
        for dx in -r..=r {
            set_pixel(img, x + dx, y + dy, color);
        }
    }
}

/// Liang-Barsky clip of `p0 -> p1` against `[lo, hi]` on both axes.
///
/// Endpoints may lie arbitrarily far outside; the arithmetic is done in
/// `f64` so the deltas cannot overflow.
fn clip_segment(
    p0: (i64, i64),
    p1: (i64, i64),
    lo: (i64, i64),
    hi: (i64, i64),
) -> Option<((i64, i64), (i64, i64))> {
    let (x0, y0) = (p0.0 as f64, p0.1 as f64);
    let dx = p1.0 as f64 - x0;
    let dy = p1.1 as f64 - y0;
    let mut t0 = 0.0f64;
    let mut t1 = 1.0f64;
    for (p, q) in [
        (-dx, x0 - lo.0 as f64),
        (dx, hi.0 as f64 - x0),
        (-dy, y0 - lo.1 as f64),
        (dy, hi.1 as f64 - y0),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }

    let at = |t: f64| {
        let x = (x0 + t * dx).round() as i64;
        let y = (y0 + t * dy).round() as i64;
        (x.clamp(lo.0, hi.0), y.clamp(lo.1, hi.1))
    };
    // Unclipped ends keep their exact coordinates.
    let a = if t0 == 0.0 { p0 } else { at(t0) };
    let b = if t1 == 1.0 { p1 } else { at(t1) };
    Some((a, b))
}

/// Bresenham line. Thickness > 1 is approximated with a square brush.
///
/// The segment is clipped to the image (grown by the brush radius) first,
/// so far off-image endpoints cost nothing.
pub fn draw_line(img: &mut Image, p0: (i64, i64), p1: (i64, i64), color: Color, thickness: u32) {
    if img.width == 0 || img.height == 0 {
        return;
    }
    let r = (thickness / 2) as i64;
    let lo = (-r, -r);
    let hi = (img.width as i64 - 1 + r, img.height as i64 - 1 + r);
    let Some(((mut x0, mut y0), (x1, y1))) = clip_segment(p0, p1, lo, hi) else {
        return;
    };
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        stamp(img, x0, y0, color, thickness);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[inline]
fn round(p: Point2<f32>) -> (i64, i64) {
    (p.x.round() as i64, p.y.round() as i64)
}

/// Draw a polyline through `points`, closing it when `closed` is set.
pub fn draw_polyline(
    img: &mut Image,
    points: &[Point2<f32>],
    closed: bool,
    color: Color,
    thickness: u32,
) {
    for pair in points.windows(2) {
        draw_line(img, round(pair[0]), round(pair[1]), color, thickness);
    }
    if closed && points.len() > 2 {
        draw_line(
            img,
            round(points[points.len() - 1]),
            round(points[0]),
            color,
            thickness,
        );
    }
}

/// Rectangle outline.
pub fn draw_rect(img: &mut Image, rect: Rect, color: Color, thickness: u32) {
    if rect.width == 0 || rect.height == 0 {
        return;
    }
    let x0 = rect.x as i64;
    let y0 = rect.y as i64;
    let x1 = x0 + rect.width as i64 - 1;
    let y1 = y0 + rect.height as i64 - 1;
    draw_line(img, (x0, y0), (x1, y0), color, thickness);
    draw_line(img, (x1, y0), (x1, y1), color, thickness);
    draw_line(img, (x1, y1), (x0, y1), color, thickness);
    draw_line(img, (x0, y1), (x0, y0), color, thickness);
}

/// Outline of one detected marker; the first corner gets a small square so
/// the orientation is visible.
pub fn draw_marker_outline(img: &mut Image, corners: &[Point2<f32>; 4], color: Color) {
    draw_polyline(img, corners, true, color, 1);
    let (cx, cy) = round(corners[0]);
    draw_rect(img, Rect::new(cx as i32 - 3, cy as i32 - 3, 7, 7), RED, 1);
}

/// Axis gizmo from projected image points: X red, Y green, Z blue.
pub fn draw_axes(
    img: &mut Image,
    origin: Point2<f32>,
    x_axis: Point2<f32>,
    y_axis: Point2<f32>,
    z_axis: Point2<f32>,
    thickness: u32,
) {
    let o = round(origin);
    draw_line(img, o, round(x_axis), RED, thickness);
    draw_line(img, o, round(y_axis), GREEN, thickness);
    draw_line(img, o, round(z_axis), BLUE, thickness);
}
