//! `calibration.yml` in OpenCV `FileStorage` YAML.
//!
//! Two matrices are stored, `cameraMatrix` (3x3) and `distCoeffs` (1xN),
//! each as an `!!opencv-matrix` node with `rows`, `cols`, `dt` and a flat
//! row-major `data` list. Files written by OpenCV on the device load here and
//! vice versa.

use crate::core::CameraIntrinsics;
use nalgebra::Matrix3;
use std::{fmt::Write as _, fs, path::Path};

pub const CAMERA_MATRIX_KEY: &str = "cameraMatrix";
pub const DIST_COEFFS_KEY: &str = "distCoeffs";

#[derive(thiserror::Error, Debug)]
pub enum CalibrationFileError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("missing `{0}` in calibration file")]
    MissingKey(&'static str),
    #[error("malformed `{key}`: {reason}")]
    Malformed { key: &'static str, reason: String },
    #[error("`{key}` must be {expected}, got {rows}x{cols}")]
    Shape {
        key: &'static str,
        expected: &'static str,
        rows: usize,
        cols: usize,
    },
}

/// Write `intrinsics` to `path`, replacing any existing file.
pub fn save(path: impl AsRef<Path>, intrinsics: &CameraIntrinsics) -> Result<(), CalibrationFileError> {
    fs::write(path, to_yaml_string(intrinsics))?;
    Ok(())
}

/// Read intrinsics back from `path`.
pub fn load(path: impl AsRef<Path>) -> Result<CameraIntrinsics, CalibrationFileError> {
    let raw = fs::read_to_string(path)?;
    from_yaml_str(&raw)
}

/// Like [`load`], but a missing file is `Ok(None)`.
pub fn try_load(path: impl AsRef<Path>) -> Result<Option<CameraIntrinsics>, CalibrationFileError> {
    match load(path) {
        Ok(k) => Ok(Some(k)),
        Err(CalibrationFileError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn to_yaml_string(intrinsics: &CameraIntrinsics) -> String {
    let k = &intrinsics.camera_matrix;
    // FileStorage data is row-major.
    let mut camera = Vec::with_capacity(9);
    for r in 0..3 {
        for c in 0..3 {
            camera.push(k[(r, c)]);
        }
    }

    let mut out = String::from("%YAML:1.0\n---\n");
    write_matrix(&mut out, CAMERA_MATRIX_KEY, 3, 3, &camera);
    write_matrix(
        &mut out,
        DIST_COEFFS_KEY,
        1,
        intrinsics.dist_coeffs.len(),
        &intrinsics.dist_coeffs,
    );
    out
}

fn write_matrix(out: &mut String, key: &str, rows: usize, cols: usize, data: &[f64]) {
    let values: Vec<String> = data.iter().map(|v| format!("{v:?}")).collect();
    // Writing into a String cannot fail.
    let _ = writeln!(out, "{key}: !!opencv-matrix");
    let _ = writeln!(out, "   rows: {rows}");
    let _ = writeln!(out, "   cols: {cols}");
    let _ = writeln!(out, "   dt: d");
    let _ = writeln!(out, "   data: [ {} ]", values.join(", "));
}

pub fn from_yaml_str(raw: &str) -> Result<CameraIntrinsics, CalibrationFileError> {
    let camera = parse_matrix(raw, CAMERA_MATRIX_KEY)?;
    if camera.rows != 3 || camera.cols != 3 {
        return Err(CalibrationFileError::Shape {
            key: CAMERA_MATRIX_KEY,
            expected: "3x3",
            rows: camera.rows,
            cols: camera.cols,
        });
    }
    let dist = parse_matrix(raw, DIST_COEFFS_KEY)?;
    if dist.rows != 1 && dist.cols != 1 {
        return Err(CalibrationFileError::Shape {
            key: DIST_COEFFS_KEY,
            expected: "a row or column vector",
            rows: dist.rows,
            cols: dist.cols,
        });
    }

    Ok(CameraIntrinsics {
        camera_matrix: Matrix3::from_row_slice(&camera.data),
        dist_coeffs: dist.data,
    })
}

struct RawMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

fn parse_matrix(raw: &str, key: &'static str) -> Result<RawMatrix, CalibrationFileError> {
    let malformed = |reason: &str| CalibrationFileError::Malformed {
        key,
        reason: reason.to_owned(),
    };

    let header = format!("{key}:");
    let mut lines = raw.lines().skip_while(|l| !l.starts_with(&header));
    let first = lines.next().ok_or(CalibrationFileError::MissingKey(key))?;
    if !first.contains("!!opencv-matrix") {
        return Err(malformed("not an !!opencv-matrix node"));
    }

    let mut rows = None;
    let mut cols = None;
    let mut data_text = None::<String>;
    for line in lines {
        // Body lines are indented; the next top-level key ends the node.
        if !line.starts_with(char::is_whitespace) && !line.trim().is_empty() && data_text.is_none() {
            break;
        }
        let trimmed = line.trim();
        if let Some(text) = data_text.as_mut() {
            text.push(' ');
            text.push_str(trimmed);
            if trimmed.ends_with(']') {
                break;
            }
            continue;
        }
        if let Some(v) = trimmed.strip_prefix("rows:") {
            rows = Some(parse_usize(v).ok_or_else(|| malformed("bad rows"))?);
        } else if let Some(v) = trimmed.strip_prefix("cols:") {
            cols = Some(parse_usize(v).ok_or_else(|| malformed("bad cols"))?);
        } else if let Some(v) = trimmed.strip_prefix("dt:") {
            if !matches!(v.trim(), "d" | "f") {
                return Err(malformed("dt must be `d` or `f`"));
            }
        } else if let Some(v) = trimmed.strip_prefix("data:") {
            let v = v.trim().to_owned();
            let closed = v.ends_with(']');
            data_text = Some(v);
            if closed {
                break;
            }
        }
    }

    let rows = rows.ok_or_else(|| malformed("missing rows"))?;
    let cols = cols.ok_or_else(|| malformed("missing cols"))?;
    let text = data_text.ok_or_else(|| malformed("missing data"))?;
    let inner = text
        .trim()
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .ok_or_else(|| malformed("data must be a [ ... ] list"))?;

    let data = inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| malformed(&e.to_string()))?;
    if data.len() != rows * cols {
        return Err(malformed(&format!(
            "{} values for a {rows}x{cols} matrix",
            data.len()
        )));
    }
    Ok(RawMatrix { rows, cols, data })
}

fn parse_usize(s: &str) -> Option<usize> {
    s.trim().parse().ok()
}
