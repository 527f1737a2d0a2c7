//! Grid-board layout used as the calibration reference.

use crate::PredefinedDictionary;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Static description of a planar grid of markers.
///
/// Markers are laid out row-major from the top-left, ids counting up from
/// `first_marker_id`. Lengths are in metres (any unit works as long as it is
/// used consistently; calibration output inherits it).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridBoardSpec {
    pub markers_x: u32,
    pub markers_y: u32,
    pub marker_length: f32,
    pub marker_separation: f32,
    #[serde(default)]
    pub dictionary: PredefinedDictionary,
    #[serde(default)]
    pub first_marker_id: i32,
}

impl Default for GridBoardSpec {
    fn default() -> Self {
        Self {
            markers_x: 5,
            markers_y: 7,
            marker_length: 0.04,
            marker_separation: 0.01,
            dictionary: PredefinedDictionary::Dict6x6_250,
            first_marker_id: 0,
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum GridBoardError {
    #[error("markers_x and markers_y must be >= 1")]
    InvalidSize,
    #[error("marker_length must be > 0 (got {0})")]
    InvalidMarkerLength(f32),
    #[error("marker_separation must be >= 0 (got {0})")]
    InvalidSeparation(f32),
    #[error("first_marker_id must be >= 0 (got {0})")]
    InvalidFirstId(i32),
    #[error("board needs ids up to {needed}, {dictionary} has {available}")]
    NotEnoughDictionaryCodes {
        needed: usize,
        available: usize,
        dictionary: PredefinedDictionary,
    },
}

/// Validated grid board.
#[derive(Clone, Debug, PartialEq)]
pub struct GridBoard {
    spec: GridBoardSpec,
}

impl GridBoard {
    pub fn new(spec: GridBoardSpec) -> Result<Self, GridBoardError> {
        if spec.markers_x == 0 || spec.markers_y == 0 {
            return Err(GridBoardError::InvalidSize);
        }
        if !spec.marker_length.is_finite() || spec.marker_length <= 0.0 {
            return Err(GridBoardError::InvalidMarkerLength(spec.marker_length));
        }
        if !spec.marker_separation.is_finite() || spec.marker_separation < 0.0 {
            return Err(GridBoardError::InvalidSeparation(spec.marker_separation));
        }
        if spec.first_marker_id < 0 {
            return Err(GridBoardError::InvalidFirstId(spec.first_marker_id));
        }

        let needed = spec.first_marker_id as usize + (spec.markers_x * spec.markers_y) as usize;
        let available = spec.dictionary.marker_count();
        if needed > available {
            return Err(GridBoardError::NotEnoughDictionaryCodes {
                needed,
                available,
                dictionary: spec.dictionary,
            });
        }

        Ok(Self { spec })
    }

    #[inline]
    pub fn spec(&self) -> GridBoardSpec {
        self.spec
    }

    #[inline]
    pub fn dictionary(&self) -> PredefinedDictionary {
        self.spec.dictionary
    }

    #[inline]
    pub fn marker_count(&self) -> usize {
        (self.spec.markers_x * self.spec.markers_y) as usize
    }

    /// Ids in layout order.
    pub fn marker_ids(&self) -> Vec<i32> {
        let first = self.spec.first_marker_id;
        (0..self.marker_count() as i32).map(|i| first + i).collect()
    }

    /// `(column, row)` of a marker id.
    pub fn marker_cell(&self, id: i32) -> Option<(u32, u32)> {
        let idx = id.checked_sub(self.spec.first_marker_id)?;
        let idx = u32::try_from(idx).ok()?;
        if idx as usize >= self.marker_count() {
            return None;
        }
        Some((idx % self.spec.markers_x, idx / self.spec.markers_x))
    }

    #[inline]
    fn pitch(&self) -> f32 {
        self.spec.marker_length + self.spec.marker_separation
    }

    /// Object-space corners (TL, TR, BR, BL) of a marker on the z = 0 plane,
    /// origin at the board's top-left corner, y pointing down.
    pub fn marker_object_corners(&self, id: i32) -> Option<[Point3<f32>; 4]> {
        let (cx, cy) = self.marker_cell(id)?;
        let l = self.spec.marker_length;
        let x = cx as f32 * self.pitch();
        let y = cy as f32 * self.pitch();
        Some([
            Point3::new(x, y, 0.0),
            Point3::new(x + l, y, 0.0),
            Point3::new(x + l, y + l, 0.0),
            Point3::new(x, y + l, 0.0),
        ])
    }

}
