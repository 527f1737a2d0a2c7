//! Marker vocabulary shared by the bridge and its vision backends.
//!
//! This crate focuses on:
//! - predefined dictionary names (resolved by the backend, not decoded here),
//! - marker observations as produced by a detection pass,
//! - the grid-board layout used as the calibration reference.
//!
//! It does **not** detect or decode markers. That work belongs to the
//! vision backend behind `marker_bridge::VisionBackend`.

mod board;
mod dictionary;
mod observation;

pub use board::{GridBoard, GridBoardError, GridBoardSpec};
pub use dictionary::{PredefinedDictionary, UnknownDictionary};
pub use observation::{MarkerCorners, MarkerDetections, MarkerObservation};
