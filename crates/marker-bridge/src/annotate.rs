use crate::core::{copy_rows, rgb_to_gray, rgba_to_rgb, Image, ImageView, ImageViewMut, PixelFormat};
use crate::{BridgeContext, BridgeError, VisionBackend};

#[cfg(feature = "tracing")]
use tracing::instrument;

impl<B: VisionBackend> BridgeContext<B> {
    /// Detect markers in an RGBA frame and return an annotated RGB copy.
    ///
    /// Outlines are drawn for every marker. When real intrinsics exist each
    /// marker also gets a pose and one axis gizmo; without a calibration the
    /// frame only carries outlines.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, rgba), fields(width = rgba.width, height = rgba.height))
    )]
    pub fn annotate_frame(&mut self, rgba: &ImageView<'_>) -> Result<Image, BridgeError> {
        // Detectors and drawing work on three channels.
        let mut rgb = rgba_to_rgb(rgba)?;
        let gray = rgb_to_gray(&rgb.view())?;
        let detections = self
            .backend
            .detect_markers(&gray.view(), self.config.dictionary)?;
        if detections.is_empty() {
            return Ok(rgb);
        }

        self.backend
            .draw_detected_markers(&mut rgb, &detections.markers);

        let Some(intrinsics) = self.intrinsics.as_ref().filter(|_| self.calibrated) else {
            log::trace!("{} markers, no calibration yet", detections.len());
            return Ok(rgb);
        };
        let poses =
            self.backend
                .estimate_poses(&detections.markers, self.config.marker_length, intrinsics)?;
        if poses.len() != detections.len() {
            return Err(crate::VisionError::PoseCountMismatch {
                expected: detections.len(),
                got: poses.len(),
            }
            .into());
        }
        for pose in &poses {
            self.backend
                .draw_frame_axes(&mut rgb, intrinsics, pose, self.config.axis_length);
        }
        Ok(rgb)
    }

    /// [`annotate_frame`](Self::annotate_frame) into a caller-owned RGB
    /// buffer of the same size.
    pub fn annotate_frame_into(
        &mut self,
        rgba: &ImageView<'_>,
        out: &mut ImageViewMut<'_>,
    ) -> Result<(), BridgeError> {
        out_matches(rgba, out)?;
        let annotated = self.annotate_frame(rgba)?;
        copy_rows(&annotated.view(), out)?;
        Ok(())
    }
}

fn out_matches(src: &ImageView<'_>, out: &ImageViewMut<'_>) -> Result<(), crate::core::ImageError> {
    if out.format != PixelFormat::Rgb8 {
        return Err(crate::core::ImageError::UnexpectedFormat {
            expected: PixelFormat::Rgb8,
            got: out.format,
        });
    }
    if (out.width, out.height) != (src.width, src.height) {
        return Err(crate::core::ImageError::SizeMismatch(
            src.width, src.height, out.width, out.height,
        ));
    }
    Ok(())
}
