//! The seam between the bridge and the vision library doing the real work.
//!
//! Marker decoding, corner refinement, PnP and the calibration solve are all
//! delegated to a [`VisionBackend`]. The bridge only prepares buffers, keeps
//! state and converts results. Drawing has software defaults so a backend
//! only needs to override it when the library renders differently.

use crate::aruco::{GridBoard, MarkerCorners, MarkerDetections, MarkerObservation, PredefinedDictionary};
use crate::core::{draw_marker_outline, CameraIntrinsics, Image, ImageView, MarkerPose, GREEN};
use crate::VisionError;

/// Solver switches forwarded to the calibration backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CalibrationFlags {
    /// Keep `fx / fy` at the ratio of the initial guess.
    pub fix_aspect_ratio: bool,
}

/// Flattened calibration observations.
///
/// `corners` and `ids` are the concatenation of every captured frame;
/// `marker_counts[i]` says how many of them belong to frame `i`.
#[derive(Clone, Copy, Debug)]
pub struct CalibrationInput<'a> {
    pub corners: &'a [MarkerCorners],
    pub ids: &'a [i32],
    pub marker_counts: &'a [usize],
    pub board: &'a GridBoard,
    pub image_size: (usize, usize),
    pub initial_guess: &'a CameraIntrinsics,
    pub flags: CalibrationFlags,
}

impl CalibrationInput<'_> {
    /// Observations of frame `i`, or `None` past the end.
    pub fn frame(&self, i: usize) -> Option<(&[MarkerCorners], &[i32])> {
        let count = *self.marker_counts.get(i)?;
        let start: usize = self.marker_counts[..i].iter().sum();
        let end = start + count;
        Some((self.corners.get(start..end)?, self.ids.get(start..end)?))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CalibrationSolution {
    /// RMS reprojection error in pixels.
    pub reprojection_error: f64,
    pub intrinsics: CameraIntrinsics,
}

/// Vision library operations the bridge depends on.
pub trait VisionBackend {
    /// Detect markers of `dictionary` in a grayscale frame.
    fn detect_markers(
        &mut self,
        gray: &ImageView<'_>,
        dictionary: PredefinedDictionary,
    ) -> Result<MarkerDetections, VisionError>;

    /// Recover missed markers using the known board layout. May move
    /// entries from `detections.rejected` into `detections.markers`.
    fn refine_detected_markers(
        &mut self,
        gray: &ImageView<'_>,
        board: &GridBoard,
        detections: &mut MarkerDetections,
        intrinsics: Option<&CameraIntrinsics>,
    ) -> Result<(), VisionError>;

    /// One pose per marker, in input order.
    fn estimate_poses(
        &mut self,
        markers: &[MarkerObservation],
        marker_length: f64,
        intrinsics: &CameraIntrinsics,
    ) -> Result<Vec<MarkerPose>, VisionError>;

    fn calibrate(&mut self, input: &CalibrationInput<'_>) -> Result<CalibrationSolution, VisionError>;

    fn draw_detected_markers(&mut self, image: &mut Image, markers: &[MarkerObservation]) {
        for marker in markers {
            draw_marker_outline(image, &marker.corners, GREEN);
        }
    }

    /// Draw an axis gizmo of `length` for `pose`. Poses that project behind
    /// the camera are skipped.
    fn draw_frame_axes(
        &mut self,
        image: &mut Image,
        intrinsics: &CameraIntrinsics,
        pose: &MarkerPose,
        length: f64,
    ) {
        match pose.project_axes(intrinsics, length) {
            Some([o, x, y, z]) => crate::core::draw_axes(image, o, x, y, z, 3),
            None => log::debug!("axis gizmo behind the camera, skipped"),
        }
    }
}

impl<B: VisionBackend + ?Sized> VisionBackend for &mut B {
    fn detect_markers(
        &mut self,
        gray: &ImageView<'_>,
        dictionary: PredefinedDictionary,
    ) -> Result<MarkerDetections, VisionError> {
        (**self).detect_markers(gray, dictionary)
    }

    fn refine_detected_markers(
        &mut self,
        gray: &ImageView<'_>,
        board: &GridBoard,
        detections: &mut MarkerDetections,
        intrinsics: Option<&CameraIntrinsics>,
    ) -> Result<(), VisionError> {
        (**self).refine_detected_markers(gray, board, detections, intrinsics)
    }

    fn estimate_poses(
        &mut self,
        markers: &[MarkerObservation],
        marker_length: f64,
        intrinsics: &CameraIntrinsics,
    ) -> Result<Vec<MarkerPose>, VisionError> {
        (**self).estimate_poses(markers, marker_length, intrinsics)
    }

    fn calibrate(&mut self, input: &CalibrationInput<'_>) -> Result<CalibrationSolution, VisionError> {
        (**self).calibrate(input)
    }

    fn draw_detected_markers(&mut self, image: &mut Image, markers: &[MarkerObservation]) {
        (**self).draw_detected_markers(image, markers)
    }

    fn draw_frame_axes(
        &mut self,
        image: &mut Image,
        intrinsics: &CameraIntrinsics,
        pose: &MarkerPose,
        length: f64,
    ) {
        (**self).draw_frame_axes(image, intrinsics, pose, length)
    }
}

impl<B: VisionBackend + ?Sized> VisionBackend for Box<B> {
    fn detect_markers(
        &mut self,
        gray: &ImageView<'_>,
        dictionary: PredefinedDictionary,
    ) -> Result<MarkerDetections, VisionError> {
        (**self).detect_markers(gray, dictionary)
    }

    fn refine_detected_markers(
        &mut self,
        gray: &ImageView<'_>,
        board: &GridBoard,
        detections: &mut MarkerDetections,
        intrinsics: Option<&CameraIntrinsics>,
    ) -> Result<(), VisionError> {
        (**self).refine_detected_markers(gray, board, detections, intrinsics)
    }

    fn estimate_poses(
        &mut self,
        markers: &[MarkerObservation],
        marker_length: f64,
        intrinsics: &CameraIntrinsics,
    ) -> Result<Vec<MarkerPose>, VisionError> {
        (**self).estimate_poses(markers, marker_length, intrinsics)
    }

    fn calibrate(&mut self, input: &CalibrationInput<'_>) -> Result<CalibrationSolution, VisionError> {
        (**self).calibrate(input)
    }

    fn draw_detected_markers(&mut self, image: &mut Image, markers: &[MarkerObservation]) {
        (**self).draw_detected_markers(image, markers)
    }

    fn draw_frame_axes(
        &mut self,
        image: &mut Image,
        intrinsics: &CameraIntrinsics,
        pose: &MarkerPose,
        length: f64,
    ) {
        (**self).draw_frame_axes(image, intrinsics, pose, length)
    }
}
