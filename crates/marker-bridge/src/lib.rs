//! Camera-frame marker bridge.
//!
//! Glue between a mobile camera pipeline and a vision library: frames come
//! in as raw buffers, markers are detected and annotated, the first marker's
//! pose is handed back as a renderer-ready model-view matrix, calibration
//! frames are accumulated and solved, and YUV previews are pushed onto a
//! window surface.
//!
//! All detection, PnP and calibration math is delegated to a
//! [`VisionBackend`]. Enable the `opencv` feature for [`OpenCvBackend`].
//!
//! ## Quickstart
//!
//! ```no_run
//! # #[cfg(feature = "opencv")]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use marker_bridge::{BridgeConfig, BridgeContext, OpenCvBackend, PoseOutcome};
//! use marker_bridge::core::{ImageView, PixelFormat};
//!
//! let mut ctx = BridgeContext::new(OpenCvBackend::new(), BridgeConfig::default())?;
//! let pixels = vec![0u8; 640 * 480];
//! let gray = ImageView::new(640, 480, PixelFormat::Gray8, &pixels)?;
//! if let PoseOutcome::Found { model_view, .. } = ctx.estimate_marker_pose(&gray)? {
//!     println!("{model_view:?}");
//! }
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "opencv"))]
//! # fn main() {}
//! ```
//!
//! ## API map
//! - `marker_bridge::core`: frames, colour conversion, transforms, drawing, intrinsics.
//! - `marker_bridge::aruco`: dictionaries, observations, the calibration board.
//! - [`BridgeContext`]: the entry points and their state.
//! - [`calibration_file`]: `calibration.yml` persistence.
//! - [`present_yuv_frame`] / [`WindowSurface`]: preview presentation.

pub use marker_bridge_aruco as aruco;
pub use marker_bridge_core as core;

mod annotate;
mod backend;
mod calibration;
pub mod calibration_file;
mod config;
mod context;
mod error;
#[cfg(feature = "opencv")]
mod opencv_backend;
mod pose;
mod present;
mod preview;

pub use backend::{CalibrationFlags, CalibrationInput, CalibrationSolution, VisionBackend};
pub use calibration::{
    CalibrationError, CalibrationReport, CalibrationSample, CalibrationSamples, FlattenedSamples,
};
pub use calibration_file::CalibrationFileError;
pub use config::{BridgeConfig, ConfigError, DebugDumpConfig, DebugRect};
pub use context::BridgeContext;
pub use error::{BridgeError, VisionError};
#[cfg(feature = "opencv")]
pub use opencv_backend::OpenCvBackend;
pub use pose::PoseOutcome;
pub use present::{
    present_yuv_frame, render_preview, PresentError, SurfaceBuffer, SurfaceGuard, WindowSurface,
};
pub use preview::{choose_preview_size, ParseSizeError, Size, ASPECT_TOLERANCE};
