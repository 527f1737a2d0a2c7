//! Calibration capture and solve.
//!
//! Each accepted frame becomes one [`CalibrationSample`], so corners, ids
//! and images are appended together and can never drift apart in length.
//! The solve reads the whole set and leaves it in place; call
//! [`BridgeContext::reset_calibration_samples`] to start over.

use crate::aruco::{MarkerCorners, MarkerDetections};
use crate::backend::{CalibrationFlags, CalibrationInput};
use crate::core::{gray_to_rgb, CameraIntrinsics, Image, ImageView, PixelFormat};
use crate::{calibration_file, BridgeContext, BridgeError, VisionBackend};
use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum CalibrationError {
    #[error("frame is {got:?}, earlier calibration frames are {expected:?}")]
    FrameSizeMismatch {
        expected: (usize, usize),
        got: (usize, usize),
    },
    #[error("calibration sample cap of {0} frames reached")]
    SampleLimitReached(usize),
    #[error("no calibration frames captured")]
    NoSamples,
}

/// Observations of one captured frame.
#[derive(Clone, Debug, PartialEq)]
pub struct CalibrationSample {
    pub corners: Vec<MarkerCorners>,
    pub ids: Vec<i32>,
    pub image: Image,
}

impl CalibrationSample {
    pub fn from_detections(detections: &MarkerDetections, image: Image) -> Self {
        Self {
            corners: detections.corners(),
            ids: detections.ids(),
            image,
        }
    }
}

/// Flattened view of a sample set, ready for the solver.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlattenedSamples {
    pub corners: Vec<MarkerCorners>,
    pub ids: Vec<i32>,
    pub marker_counts: Vec<usize>,
}

/// Accumulated calibration frames plus their shared image size.
#[derive(Clone, Debug, Default)]
pub struct CalibrationSamples {
    samples: Vec<CalibrationSample>,
    image_size: Option<(usize, usize)>,
}

impl CalibrationSamples {
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// `(width, height)` shared by every sample.
    pub fn image_size(&self) -> Option<(usize, usize)> {
        self.image_size
    }

    pub fn as_slice(&self) -> &[CalibrationSample] {
        &self.samples
    }

    pub fn corners(&self) -> impl Iterator<Item = &[MarkerCorners]> + '_ {
        self.samples.iter().map(|s| s.corners.as_slice())
    }

    pub fn ids(&self) -> impl Iterator<Item = &[i32]> + '_ {
        self.samples.iter().map(|s| s.ids.as_slice())
    }

    pub fn images(&self) -> impl Iterator<Item = &Image> + '_ {
        self.samples.iter().map(|s| &s.image)
    }

    pub fn total_markers(&self) -> usize {
        self.samples.iter().map(|s| s.ids.len()).sum()
    }

    /// Check that a `width x height` frame may be appended.
    pub fn check_accepts(
        &self,
        width: usize,
        height: usize,
        max_samples: Option<usize>,
    ) -> Result<(), CalibrationError> {
        if let Some(cap) = max_samples {
            if self.samples.len() >= cap {
                return Err(CalibrationError::SampleLimitReached(cap));
            }
        }
        match self.image_size {
            Some(expected) if expected != (width, height) => Err(CalibrationError::FrameSizeMismatch {
                expected,
                got: (width, height),
            }),
            _ => Ok(()),
        }
    }

    /// Append a sample and return the new count.
    pub fn push(&mut self, sample: CalibrationSample) -> Result<usize, CalibrationError> {
        let size = sample.image.size();
        self.check_accepts(size.0, size.1, None)?;
        self.image_size = Some(size);
        self.samples.push(sample);
        Ok(self.samples.len())
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.image_size = None;
    }

    pub fn flatten(&self) -> FlattenedSamples {
        let mut out = FlattenedSamples {
            corners: Vec::with_capacity(self.total_markers()),
            ids: Vec::with_capacity(self.total_markers()),
            marker_counts: Vec::with_capacity(self.samples.len()),
        };
        for s in &self.samples {
            out.corners.extend_from_slice(&s.corners);
            out.ids.extend_from_slice(&s.ids);
            out.marker_counts.push(s.ids.len());
        }
        out
    }
}

/// Result of a successful calibration solve.
#[derive(Clone, Debug, PartialEq)]
pub struct CalibrationReport {
    pub reprojection_error: f64,
    pub intrinsics: CameraIntrinsics,
    pub frames_used: usize,
    pub markers_used: usize,
    pub saved_to: PathBuf,
}

impl<B: VisionBackend> BridgeContext<B> {
    /// Detect and refine markers in `gray`, store the frame and return the
    /// new sample count.
    ///
    /// Frames are not checked for novelty; near-duplicates are accepted.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, gray), fields(width = gray.width, height = gray.height))
    )]
    pub fn capture_calibration_frame(&mut self, gray: &ImageView<'_>) -> Result<usize, BridgeError> {
        gray.expect_format(PixelFormat::Gray8)?;
        self.samples
            .check_accepts(gray.width, gray.height, self.config.max_samples)?;

        let mut detections = self.backend.detect_markers(gray, self.board.dictionary())?;
        let intrinsics = if self.calibrated {
            self.intrinsics.as_ref()
        } else {
            None
        };
        self.backend
            .refine_detected_markers(gray, &self.board, &mut detections, intrinsics)?;

        let image = gray.to_owned_image();
        if self.config.debug_dumps.enabled {
            self.dump_capture(self.samples.len(), &image, &detections);
        }

        let count = self
            .samples
            .push(CalibrationSample::from_detections(&detections, image))?;
        log::info!(
            "calibration frame {count} captured with {} markers",
            detections.len()
        );
        Ok(count)
    }

    fn dump_capture(&mut self, index: usize, image: &Image, detections: &MarkerDetections) {
        let dumps = &self.config.debug_dumps;
        let original = dumps.original_path(index);
        let markers = dumps.markers_path(index);

        write_png(&original, image.clone());
        match gray_to_rgb(&image.view()) {
            Ok(mut overlay) => {
                self.backend
                    .draw_detected_markers(&mut overlay, &detections.markers);
                write_png(&markers, overlay);
            }
            Err(e) => log::warn!("skipping {}: {e}", markers.display()),
        }
    }

    /// Solve for intrinsics over every captured frame, install them and
    /// persist them to the configured calibration file.
    ///
    /// The sample set is left untouched, so a later call solves over the
    /// union of old and new captures.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self)))]
    pub fn calibrate(&mut self) -> Result<CalibrationReport, BridgeError> {
        let image_size = self.samples.image_size().ok_or(CalibrationError::NoSamples)?;
        let flat = self.samples.flatten();
        let initial_guess = CameraIntrinsics::with_fixed_aspect(self.config.calibration_aspect_ratio);
        let input = CalibrationInput {
            corners: &flat.corners,
            ids: &flat.ids,
            marker_counts: &flat.marker_counts,
            board: &self.board,
            image_size,
            initial_guess: &initial_guess,
            flags: CalibrationFlags {
                fix_aspect_ratio: true,
            },
        };
        let solution = self.backend.calibrate(&input)?;

        log::info!(
            "calibration over {} frames / {} markers, reprojection error {:.4}",
            flat.marker_counts.len(),
            flat.ids.len(),
            solution.reprojection_error
        );
        log::info!("camera matrix: {}", solution.intrinsics.camera_matrix);
        log::info!("distortion: {:?}", solution.intrinsics.dist_coeffs);

        self.set_intrinsics(solution.intrinsics.clone());
        let path = self.config.calibration_path.clone();
        calibration_file::save(&path, &solution.intrinsics)?;

        Ok(CalibrationReport {
            reprojection_error: solution.reprojection_error,
            intrinsics: solution.intrinsics,
            frames_used: flat.marker_counts.len(),
            markers_used: flat.ids.len(),
            saved_to: path,
        })
    }
}

fn write_png(path: &Path, image: Image) {
    let result = image
        .into_dynamic()
        .map_err(|e| e.to_string())
        .and_then(|img| img.save(path).map_err(|e| e.to_string()));
    if let Err(e) = result {
        log::warn!("failed to write {}: {e}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aruco::MarkerObservation;
    use nalgebra::Point2;

    fn sample(width: usize, height: usize, ids: &[i32]) -> CalibrationSample {
        let markers = ids
            .iter()
            .map(|&id| MarkerObservation::new(id, [Point2::new(id as f32, 0.0); 4]))
            .collect();
        let det = MarkerDetections::new(markers);
        let image = Image::new(width, height, PixelFormat::Gray8).unwrap();
        CalibrationSample::from_detections(&det, image)
    }

    #[test]
    fn push_counts_up_and_keeps_views_aligned() {
        let mut set = CalibrationSamples::default();
        let frames: [&[i32]; 3] = [&[1, 2], &[], &[3]];
        for (i, ids) in frames.into_iter().enumerate() {
            let n = set.push(sample(8, 6, ids)).unwrap();
            assert_eq!(n, i + 1);
            assert_eq!(set.corners().count(), n);
            assert_eq!(set.ids().count(), n);
            assert_eq!(set.images().count(), n);
        }
        assert_eq!(set.total_markers(), 3);
        assert_eq!(set.image_size(), Some((8, 6)));
    }

    #[test]
    fn mismatched_frame_size_is_rejected() {
        let mut set = CalibrationSamples::default();
        set.push(sample(8, 6, &[1])).unwrap();
        assert_eq!(
            set.push(sample(6, 8, &[1])),
            Err(CalibrationError::FrameSizeMismatch {
                expected: (8, 6),
                got: (6, 8)
            })
        );
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn cap_is_enforced_before_append() {
        let mut set = CalibrationSamples::default();
        set.push(sample(4, 4, &[])).unwrap();
        assert_eq!(
            set.check_accepts(4, 4, Some(1)),
            Err(CalibrationError::SampleLimitReached(1))
        );
        assert!(set.check_accepts(4, 4, Some(2)).is_ok());
    }

    #[test]
    fn flatten_concatenates_in_capture_order() {
        let mut set = CalibrationSamples::default();
        set.push(sample(4, 4, &[5, 6])).unwrap();
        set.push(sample(4, 4, &[])).unwrap();
        set.push(sample(4, 4, &[7])).unwrap();
        let flat = set.flatten();
        assert_eq!(flat.ids, vec![5, 6, 7]);
        assert_eq!(flat.marker_counts, vec![2, 0, 1]);
        assert_eq!(flat.corners.len(), 3);
        assert_eq!(flat.corners[2][0].x, 7.0);
    }

    #[test]
    fn clear_forgets_image_size() {
        let mut set = CalibrationSamples::default();
        set.push(sample(4, 4, &[1])).unwrap();
        set.clear();
        assert!(set.is_empty());
        assert!(set.image_size().is_none());
        assert!(set.push(sample(2, 2, &[])).is_ok());
    }
}
