use crate::aruco::PredefinedDictionary;
use crate::calibration::CalibrationError;
use crate::calibration_file::CalibrationFileError;
use crate::config::ConfigError;
use crate::core::ImageError;
use crate::present::PresentError;

/// Failures reported by a [`crate::VisionBackend`].
///
/// `Backend` carries library-internal failures (malformed detection input,
/// solver non-convergence) so callers can tell them apart from an empty
/// detection result.
#[derive(thiserror::Error, Debug)]
pub enum VisionError {
    #[error("invalid frame: {0}")]
    Image(#[from] ImageError),
    #[error("dictionary {0} is not supported by this backend")]
    UnsupportedDictionary(PredefinedDictionary),
    #[error("pose solver returned {got} poses for {expected} markers")]
    PoseCountMismatch { expected: usize, got: usize },
    #[error("vision backend failure: {0}")]
    Backend(String),
}

/// Top-level error of the bridge entry points.
#[derive(thiserror::Error, Debug)]
pub enum BridgeError {
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error(transparent)]
    Vision(#[from] VisionError),
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
    #[error(transparent)]
    CalibrationFile(#[from] CalibrationFileError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Present(#[from] PresentError),
}
