use crate::aruco::GridBoard;
use crate::calibration::CalibrationSamples;
use crate::calibration_file::{self, CalibrationFileError};
use crate::core::CameraIntrinsics;
use crate::{BridgeConfig, BridgeError};

/// Explicitly owned bridge state.
///
/// Holds the vision backend, the active intrinsics and the calibration
/// sample set. Every entry point takes `&mut self`, so a context is used
/// from one thread at a time; the caller owns that guarantee across the
/// foreign boundary.
pub struct BridgeContext<B> {
    pub(crate) backend: B,
    pub(crate) config: BridgeConfig,
    pub(crate) board: GridBoard,
    pub(crate) intrinsics: Option<CameraIntrinsics>,
    pub(crate) calibrated: bool,
    pub(crate) samples: CalibrationSamples,
}

impl<B> BridgeContext<B> {
    /// Validate `config` and build a context.
    ///
    /// With `load_saved_calibration` set, an existing calibration file is
    /// picked up. A missing file is normal on first start; an unreadable
    /// one is logged and ignored.
    pub fn new(backend: B, config: BridgeConfig) -> Result<Self, BridgeError> {
        let board = config.validate()?;
        let mut ctx = Self {
            backend,
            config,
            board,
            intrinsics: None,
            calibrated: false,
            samples: CalibrationSamples::default(),
        };
        if ctx.config.load_saved_calibration {
            if let Err(e) = ctx.load_saved_calibration() {
                log::warn!(
                    "ignoring calibration file {}: {e}",
                    ctx.config.calibration_path.display()
                );
            }
        }
        Ok(ctx)
    }

    /// Reload intrinsics from the configured calibration file.
    ///
    /// Returns `Ok(false)` when the file does not exist.
    pub fn load_saved_calibration(&mut self) -> Result<bool, CalibrationFileError> {
        let path = &self.config.calibration_path;
        match calibration_file::try_load(path)? {
            Some(k) => {
                log::info!("loaded calibration from {}", path.display());
                self.set_intrinsics(k);
                Ok(true)
            }
            None => {
                log::debug!("no saved calibration at {}", path.display());
                Ok(false)
            }
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn board(&self) -> &GridBoard {
        &self.board
    }

    /// Current intrinsics, if any were set, loaded or lazily defaulted.
    pub fn intrinsics(&self) -> Option<&CameraIntrinsics> {
        self.intrinsics.as_ref()
    }

    /// True once real intrinsics exist (solved, loaded or set by the caller).
    /// The lazily created placeholder does not count.
    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    /// Install intrinsics obtained elsewhere.
    pub fn set_intrinsics(&mut self, intrinsics: CameraIntrinsics) {
        self.intrinsics = Some(intrinsics);
        self.calibrated = true;
    }

    /// Intrinsics to use right now, falling back to the placeholder the
    /// first time nothing better exists.
    pub fn active_intrinsics(&mut self) -> &CameraIntrinsics {
        self.intrinsics.get_or_insert_with(|| {
            log::debug!("no intrinsics yet, using placeholder camera matrix");
            CameraIntrinsics::placeholder()
        })
    }

    pub fn samples(&self) -> &CalibrationSamples {
        &self.samples
    }

    /// Drop every accumulated calibration frame. Intrinsics are kept.
    pub fn reset_calibration_samples(&mut self) {
        log::info!("discarding {} calibration samples", self.samples.len());
        self.samples.clear();
    }
}
