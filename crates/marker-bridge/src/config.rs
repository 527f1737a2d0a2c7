//! JSON configuration for a bridge context.

use crate::aruco::{GridBoard, GridBoardError, GridBoardSpec, PredefinedDictionary};
use crate::core::{Color, Rect, BLUE, YELLOW};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Board(#[from] GridBoardError),
    #[error("{name} must be a positive finite length (got {value})")]
    InvalidLength { name: &'static str, value: f64 },
    #[error("max_samples must be >= 1")]
    ZeroSampleCap,
}

fn default_marker_length() -> f64 {
    0.05
}

fn default_axis_length() -> f64 {
    0.1
}

fn default_aspect_ratio() -> f64 {
    1.0
}

fn default_calibration_path() -> PathBuf {
    PathBuf::from("calibration.yml")
}

fn default_true() -> bool {
    true
}

fn default_dump_dir() -> PathBuf {
    PathBuf::from(".")
}

/// A rectangle painted over every presented frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugRect {
    pub rect: Rect,
    pub color: Color,
    #[serde(default = "default_thickness")]
    pub thickness: u32,
}

fn default_thickness() -> u32 {
    2
}

fn default_debug_rects() -> Vec<DebugRect> {
    vec![
        DebugRect {
            rect: Rect::new(20, 20, 120, 120),
            color: YELLOW,
            thickness: 2,
        },
        DebugRect {
            rect: Rect::new(160, 20, 60, 60),
            color: BLUE,
            thickness: 2,
        },
    ]
}

/// Where calibration captures dump their debug PNGs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DebugDumpConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_dump_dir")]
    pub dir: PathBuf,
}

impl Default for DebugDumpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_dump_dir(),
        }
    }
}

impl DebugDumpConfig {
    pub fn original_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("calib_cap_orig{index:03}.png"))
    }

    pub fn markers_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("calib_cap_markers{index:03}.png"))
    }
}

/// Everything a [`crate::BridgeContext`] needs besides its backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub dictionary: PredefinedDictionary,
    /// Physical marker edge used for pose estimation.
    #[serde(default = "default_marker_length")]
    pub marker_length: f64,
    /// Length of the drawn axis gizmo, same unit as `marker_length`.
    #[serde(default = "default_axis_length")]
    pub axis_length: f64,
    /// Reference layout for calibration refinement.
    #[serde(default)]
    pub board: GridBoardSpec,
    /// `fx / fy` held fixed during calibration.
    #[serde(default = "default_aspect_ratio")]
    pub calibration_aspect_ratio: f64,
    #[serde(default = "default_calibration_path")]
    pub calibration_path: PathBuf,
    /// Load `calibration_path` when the context is created.
    #[serde(default = "default_true")]
    pub load_saved_calibration: bool,
    #[serde(default)]
    pub debug_dumps: DebugDumpConfig,
    #[serde(default = "default_debug_rects")]
    pub debug_rects: Vec<DebugRect>,
    /// Optional cap on accumulated calibration frames. `None` keeps growing.
    #[serde(default)]
    pub max_samples: Option<usize>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            dictionary: PredefinedDictionary::default(),
            marker_length: default_marker_length(),
            axis_length: default_axis_length(),
            board: GridBoardSpec::default(),
            calibration_aspect_ratio: default_aspect_ratio(),
            calibration_path: default_calibration_path(),
            load_saved_calibration: true,
            debug_dumps: DebugDumpConfig::default(),
            debug_rects: default_debug_rects(),
            max_samples: None,
        }
    }
}

impl BridgeConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Check lengths and build the calibration board.
    pub fn validate(&self) -> Result<GridBoard, ConfigError> {
        for (name, value) in [
            ("marker_length", self.marker_length),
            ("axis_length", self.axis_length),
            ("calibration_aspect_ratio", self.calibration_aspect_ratio),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidLength { name, value });
            }
        }
        if self.max_samples == Some(0) {
            return Err(ConfigError::ZeroSampleCap);
        }
        Ok(GridBoard::new(self.board)?)
    }
}
