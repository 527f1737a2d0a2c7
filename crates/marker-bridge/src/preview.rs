//! Camera preview size selection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum difference between view and candidate aspect ratios.
pub const ASPECT_TOLERANCE: f32 = 0.2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect(self) -> f32 {
        self.width as f32 / self.height as f32
    }

    fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("expected WIDTHxHEIGHT, got {0:?}")]
pub struct ParseSizeError(String);

impl FromStr for Size {
    type Err = ParseSizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseSizeError(s.to_string());
        let (w, h) = s.trim().split_once(['x', 'X']).ok_or_else(err)?;
        let width = w.trim().parse().map_err(|_| err())?;
        let height = h.trim().parse().map_err(|_| err())?;
        Ok(Self { width, height })
    }
}

/// Pick the camera output size for a view.
///
/// The largest candidate that fits inside `view` and whose aspect ratio is
/// within [`ASPECT_TOLERANCE`] of the view's wins, wherever it sits in the
/// list. With no such candidate the first one is used. `None` only for an
/// empty candidate list.
pub fn choose_preview_size(view: Size, candidates: &[Size]) -> Option<Size> {
    let first = *candidates.first()?;
    if view.width == 0 || view.height == 0 {
        return Some(first);
    }
    let aspect = view.aspect();
    let best = candidates
        .iter()
        .copied()
        .filter(|c| c.width > 0 && c.height > 0)
        .filter(|c| c.width <= view.width && c.height <= view.height)
        .filter(|c| (aspect - c.aspect()).abs() < ASPECT_TOLERANCE)
        // max_by_key keeps the last maximum; reverse so ties go to the earlier size.
        .rev()
        .max_by_key(|c| c.area());
    log::debug!("preview for view {view}: {:?}", best);
    Some(best.unwrap_or(first))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANDIDATES: [Size; 5] = [
        Size::new(1920, 1080),
        Size::new(1280, 720),
        Size::new(1024, 768),
        Size::new(640, 480),
        Size::new(320, 240),
    ];

    #[test]
    fn largest_fitting_with_matching_aspect() {
        let pick = choose_preview_size(Size::new(1400, 800), &CANDIDATES);
        assert_eq!(pick, Some(Size::new(1280, 720)));
    }

    #[test]
    fn oversized_first_candidate_is_replaced() {
        let pick = choose_preview_size(
            Size::new(1400, 800),
            &[Size::new(1920, 1080), Size::new(1280, 720)],
        );
        assert_eq!(pick, Some(Size::new(1280, 720)));
    }

    #[test]
    fn aspect_filter_skips_wrong_shapes() {
        // 4:3 view, 1280x720 fits but is 16:9.
        let pick = choose_preview_size(Size::new(1300, 975), &CANDIDATES);
        assert_eq!(pick, Some(Size::new(1024, 768)));
    }

    #[test]
    fn falls_back_to_first_candidate() {
        let pick = choose_preview_size(Size::new(100, 100), &CANDIDATES);
        assert_eq!(pick, Some(Size::new(1920, 1080)));
        assert_eq!(choose_preview_size(Size::new(100, 100), &[]), None);
    }

    #[test]
    fn parses_width_by_height() {
        assert_eq!("640x480".parse(), Ok(Size::new(640, 480)));
        assert_eq!(" 1920X1080 ".parse(), Ok(Size::new(1920, 1080)));
        assert!("640".parse::<Size>().is_err());
        assert!("ax480".parse::<Size>().is_err());
    }
}
