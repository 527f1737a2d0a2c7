//! Per-frame marker detections as returned by a vision backend.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Four image-space corners, clockwise from the marker's top-left.
pub type MarkerCorners = [Point2<f32>; 4];

/// One decoded marker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkerObservation {
    pub id: i32,
    /// TL, TR, BR, BL in image pixels.
    pub corners: MarkerCorners,
}

impl MarkerObservation {
    pub fn new(id: i32, corners: MarkerCorners) -> Self {
        Self { id, corners }
    }

}

/// Output of one detection pass.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MarkerDetections {
    pub markers: Vec<MarkerObservation>,
    /// Quads that looked like markers but failed to decode. Board refinement
    /// may recover some of them.
    #[serde(default)]
    pub rejected: Vec<MarkerCorners>,
}

impl MarkerDetections {
    pub fn new(markers: Vec<MarkerObservation>) -> Self {
        Self {
            markers,
            rejected: Vec::new(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn ids(&self) -> Vec<i32> {
        self.markers.iter().map(|m| m.id).collect()
    }

    pub fn corners(&self) -> Vec<MarkerCorners> {
        self.markers.iter().map(|m| m.corners).collect()
    }

    pub fn first(&self) -> Option<&MarkerObservation> {
        self.markers.first()
    }
}
