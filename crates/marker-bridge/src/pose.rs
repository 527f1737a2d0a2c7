use crate::core::{ImageView, PixelFormat};
use crate::{BridgeContext, VisionBackend, VisionError};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Outcome of [`BridgeContext::estimate_marker_pose`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PoseOutcome {
    /// Pose of the first detected marker.
    Found {
        marker_id: i32,
        /// Column-major model-view matrix, renderer convention (Y up, Z back).
        model_view: [f32; 16],
    },
    NoMarkers,
}

impl PoseOutcome {
    pub fn model_view(&self) -> Option<&[f32; 16]> {
        match self {
            PoseOutcome::Found { model_view, .. } => Some(model_view),
            PoseOutcome::NoMarkers => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, PoseOutcome::Found { .. })
    }
}

impl<B: VisionBackend> BridgeContext<B> {
    /// Pose of the first marker found in a grayscale frame.
    ///
    /// Uses the configured marker length and the current intrinsics (the
    /// placeholder camera when none exist yet).
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, gray), fields(width = gray.width, height = gray.height))
    )]
    pub fn estimate_marker_pose(&mut self, gray: &ImageView<'_>) -> Result<PoseOutcome, VisionError> {
        gray.expect_format(PixelFormat::Gray8)?;
        let detections = self.backend.detect_markers(gray, self.config.dictionary)?;
        let Some(first) = detections.first() else {
            return Ok(PoseOutcome::NoMarkers);
        };

        let marker_length = self.config.marker_length;
        let intrinsics = self.active_intrinsics().clone();
        let poses = self.backend.estimate_poses(
            std::slice::from_ref(first),
            marker_length,
            &intrinsics,
        )?;
        let pose = poses.first().ok_or(VisionError::PoseCountMismatch {
            expected: 1,
            got: 0,
        })?;

        Ok(PoseOutcome::Found {
            marker_id: first.id,
            model_view: pose.model_view(),
        })
    }

    /// [`estimate_marker_pose`](Self::estimate_marker_pose) that logs
    /// backend failures and reports them as "no pose".
    pub fn try_estimate_marker_pose(&mut self, gray: &ImageView<'_>) -> Option<[f32; 16]> {
        match self.estimate_marker_pose(gray) {
            Ok(outcome) => outcome.model_view().copied(),
            Err(e) => {
                log::error!("marker pose estimation failed: {e}");
                None
            }
        }
    }
}
