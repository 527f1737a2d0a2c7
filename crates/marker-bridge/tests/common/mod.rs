#![allow(dead_code)]

use marker_bridge::aruco::{GridBoard, MarkerCorners, MarkerDetections, MarkerObservation, PredefinedDictionary};
use marker_bridge::core::{CameraIntrinsics, Image, ImageView, MarkerPose};
use marker_bridge::{
    BridgeConfig, BridgeContext, CalibrationFlags, CalibrationInput, CalibrationSolution,
    DebugDumpConfig, VisionBackend, VisionError,
};
use nalgebra::{Point2, Vector3};
use std::path::Path;

pub fn square(id: i32, x: f32, y: f32, side: f32) -> MarkerObservation {
    MarkerObservation::new(id, quad(x, y, side))
}

pub fn quad(x: f32, y: f32, side: f32) -> MarkerCorners {
    [
        Point2::new(x, y),
        Point2::new(x + side, y),
        Point2::new(x + side, y + side),
        Point2::new(x, y + side),
    ]
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Calls {
    pub detect: usize,
    pub refine: usize,
    pub estimate: usize,
    pub calibrate: usize,
    pub draw_markers: usize,
    pub draw_axes: usize,
}

/// What the backend saw on its last `calibrate` call.
#[derive(Clone, Debug)]
pub struct RecordedCalibration {
    pub ids: Vec<i32>,
    pub marker_counts: Vec<usize>,
    pub image_size: (usize, usize),
    pub flags: CalibrationFlags,
    pub initial_guess: CameraIntrinsics,
}

/// Scripted stand-in for a vision library.
pub struct MockBackend {
    /// Returned by every `detect_markers` call.
    pub markers: Vec<MarkerObservation>,
    pub rejected: Vec<MarkerCorners>,
    /// Id given to rejected quads that refinement recovers.
    pub recover_as: Option<i32>,
    /// Pose returned for every marker.
    pub pose: MarkerPose,
    pub fail_detect: bool,
    pub solution: CalibrationSolution,
    pub calls: Calls,
    pub dictionaries: Vec<PredefinedDictionary>,
    pub pose_batches: Vec<Vec<i32>>,
    pub last_calibration: Option<RecordedCalibration>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            markers: Vec::new(),
            rejected: Vec::new(),
            recover_as: None,
            pose: MarkerPose::new(Vector3::zeros(), Vector3::new(0.0, 0.0, 0.5)),
            fail_detect: false,
            solution: CalibrationSolution {
                reprojection_error: 0.42,
                intrinsics: CameraIntrinsics::new(
                    800.0,
                    800.0,
                    320.0,
                    240.0,
                    vec![0.1, -0.05, 0.0, 0.0, 0.01],
                ),
            },
            calls: Calls::default(),
            dictionaries: Vec::new(),
            pose_batches: Vec::new(),
            last_calibration: None,
        }
    }
}

impl MockBackend {
    pub fn with_markers(markers: Vec<MarkerObservation>) -> Self {
        Self {
            markers,
            ..Self::default()
        }
    }
}

impl VisionBackend for MockBackend {
    fn detect_markers(
        &mut self,
        _gray: &ImageView<'_>,
        dictionary: PredefinedDictionary,
    ) -> Result<MarkerDetections, VisionError> {
        self.calls.detect += 1;
        self.dictionaries.push(dictionary);
        if self.fail_detect {
            return Err(VisionError::Backend("scripted failure".into()));
        }
        Ok(MarkerDetections {
            markers: self.markers.clone(),
            rejected: self.rejected.clone(),
        })
    }

    fn refine_detected_markers(
        &mut self,
        _gray: &ImageView<'_>,
        _board: &GridBoard,
        detections: &mut MarkerDetections,
        _intrinsics: Option<&CameraIntrinsics>,
    ) -> Result<(), VisionError> {
        self.calls.refine += 1;
        if let Some(id) = self.recover_as {
            for corners in detections.rejected.drain(..) {
                detections.markers.push(MarkerObservation::new(id, corners));
            }
        }
        Ok(())
    }

    fn estimate_poses(
        &mut self,
        markers: &[MarkerObservation],
        _marker_length: f64,
        _intrinsics: &CameraIntrinsics,
    ) -> Result<Vec<MarkerPose>, VisionError> {
        self.calls.estimate += 1;
        self.pose_batches.push(markers.iter().map(|m| m.id).collect());
        Ok(vec![self.pose; markers.len()])
    }

    fn calibrate(&mut self, input: &CalibrationInput<'_>) -> Result<CalibrationSolution, VisionError> {
        self.calls.calibrate += 1;
        self.last_calibration = Some(RecordedCalibration {
            ids: input.ids.to_vec(),
            marker_counts: input.marker_counts.to_vec(),
            image_size: input.image_size,
            flags: input.flags,
            initial_guess: input.initial_guess.clone(),
        });
        Ok(self.solution.clone())
    }

    fn draw_detected_markers(&mut self, _image: &mut Image, _markers: &[MarkerObservation]) {
        self.calls.draw_markers += 1;
    }

    fn draw_frame_axes(
        &mut self,
        _image: &mut Image,
        _intrinsics: &CameraIntrinsics,
        _pose: &MarkerPose,
        _length: f64,
    ) {
        self.calls.draw_axes += 1;
    }
}

/// Config that keeps every file inside `dir`.
pub fn config_in(dir: &Path) -> BridgeConfig {
    BridgeConfig {
        calibration_path: dir.join("calibration.yml"),
        debug_dumps: DebugDumpConfig {
            enabled: true,
            dir: dir.to_path_buf(),
        },
        ..BridgeConfig::default()
    }
}

pub fn context_in(dir: &Path, backend: MockBackend) -> BridgeContext<MockBackend> {
    BridgeContext::new(backend, config_in(dir)).expect("context")
}

/// Deterministic test pattern.
pub fn pattern(width: usize, height: usize, channels: usize) -> Vec<u8> {
    (0..width * height * channels)
        .map(|i| (i * 31 % 251) as u8)
        .collect()
}
