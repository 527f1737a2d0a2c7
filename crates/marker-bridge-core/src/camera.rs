//! Pinhole intrinsics and marker poses.
//!
//! Poses follow the vision convention (X right, Y down, Z forward). Renderers
//! expect Y up and Z towards the viewer, so [`MarkerPose::model_view`]
//! left-multiplies by [`cv_to_gl`] before handing the matrix out.

use nalgebra::{Matrix3, Matrix4, Point2, Point3, Rotation3, Vector3, Vector4};
use serde::{Deserialize, Serialize};

/// Number of distortion coefficients produced by a default calibration
/// (k1, k2, p1, p2, k3).
pub const DEFAULT_DISTORTION_LEN: usize = 5;

/// Axis flip from vision camera coordinates to OpenGL eye coordinates.
pub fn cv_to_gl() -> Matrix4<f64> {
    Matrix4::from_diagonal(&Vector4::new(1.0, -1.0, -1.0, 1.0))
}

/// Camera matrix plus lens distortion coefficients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    /// `[[fx, 0, cx], [0, fy, cy], [0, 0, 1]]`.
    pub camera_matrix: Matrix3<f64>,
    /// Brown-Conrady coefficients `k1, k2, p1, p2[, k3]`.
    pub dist_coeffs: Vec<f64>,
}

impl CameraIntrinsics {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64, dist_coeffs: Vec<f64>) -> Self {
        Self {
            camera_matrix: Matrix3::new(fx, 0.0, cx, 0.0, fy, cy, 0.0, 0.0, 1.0),
            dist_coeffs,
        }
    }

    /// Stand-in used before any calibration exists: identity camera matrix,
    /// zero distortion.
    pub fn placeholder() -> Self {
        Self {
            camera_matrix: Matrix3::identity(),
            dist_coeffs: vec![0.0; DEFAULT_DISTORTION_LEN],
        }
    }

    /// Initial guess for a solve that keeps `fx / fy` fixed at `aspect_ratio`.
    pub fn with_fixed_aspect(aspect_ratio: f64) -> Self {
        let mut k = Self::placeholder();
        k.camera_matrix[(0, 0)] = aspect_ratio;
        k
    }

    #[inline]
    pub fn fx(&self) -> f64 {
        self.camera_matrix[(0, 0)]
    }

    #[inline]
    pub fn fy(&self) -> f64 {
        self.camera_matrix[(1, 1)]
    }

    #[inline]
    pub fn cx(&self) -> f64 {
        self.camera_matrix[(0, 2)]
    }

    #[inline]
    pub fn cy(&self) -> f64 {
        self.camera_matrix[(1, 2)]
    }

    #[inline]
    fn coeff(&self, i: usize) -> f64 {
        self.dist_coeffs.get(i).copied().unwrap_or(0.0)
    }

    /// Project a point given in camera coordinates. Returns `None` for
    /// points at or behind the camera plane.
    pub fn project_point(&self, p: &Point3<f64>) -> Option<Point2<f32>> {
        if p.z <= f64::EPSILON {
            return None;
        }
        let x = p.x / p.z;
        let y = p.y / p.z;
        let (k1, k2, p1, p2, k3) = (
            self.coeff(0),
            self.coeff(1),
            self.coeff(2),
            self.coeff(3),
            self.coeff(4),
        );
        let r2 = x * x + y * y;
        let radial = 1.0 + r2 * (k1 + r2 * (k2 + r2 * k3));
        let xd = x * radial + 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
        let yd = y * radial + p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;
        let u = self.fx() * xd + self.camera_matrix[(0, 1)] * yd + self.cx();
        let v = self.fy() * yd + self.cy();
        Some(Point2::new(u as f32, v as f32))
    }
}

impl Default for CameraIntrinsics {
    fn default() -> Self {
        Self::placeholder()
    }
}

/// Pose of a marker in camera coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkerPose {
    /// Rotation as an axis-angle (Rodrigues) vector.
    pub rvec: Vector3<f64>,
    pub tvec: Vector3<f64>,
}

impl MarkerPose {
    pub fn new(rvec: Vector3<f64>, tvec: Vector3<f64>) -> Self {
        Self { rvec, tvec }
    }

    pub fn identity() -> Self {
        Self::new(Vector3::zeros(), Vector3::zeros())
    }

    pub fn rotation(&self) -> Rotation3<f64> {
        Rotation3::new(self.rvec)
    }

    /// `[R | t]` as a homogeneous matrix, vision convention.
    pub fn view_matrix(&self) -> Matrix4<f64> {
        let mut m = self.rotation().to_homogeneous();
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.tvec);
        m
    }

    /// Model-view matrix for a Y-up/Z-backward renderer, column-major.
    pub fn model_view(&self) -> [f32; 16] {
        let m = cv_to_gl() * self.view_matrix();
        let mut out = [0.0f32; 16];
        // nalgebra storage is column-major already.
        for (dst, src) in out.iter_mut().zip(m.as_slice()) {
            *dst = *src as f32;
        }
        out
    }

    /// Map a point from marker coordinates into camera coordinates.
    pub fn transform_point(&self, p: &Point3<f64>) -> Point3<f64> {
        self.rotation() * p + self.tvec
    }

    /// Project the origin and the three axis tips of length `length`.
    pub fn project_axes(
        &self,
        intrinsics: &CameraIntrinsics,
        length: f64,
    ) -> Option<[Point2<f32>; 4]> {
        let pts = [
            Point3::origin(),
            Point3::new(length, 0.0, 0.0),
            Point3::new(0.0, length, 0.0),
            Point3::new(0.0, 0.0, length),
        ];
        let mut out = [Point2::origin(); 4];
        for (dst, p) in out.iter_mut().zip(pts.iter()) {
            *dst = intrinsics.project_point(&self.transform_point(p))?;
        }
        Some(out)
    }
}

/// Column-major 4x4 identity after the axis flip; what `model_view` yields
/// for the identity pose.
pub fn gl_axis_flip() -> [f32; 16] {
    let flip = cv_to_gl();
    let mut out = [0.0f32; 16];
    for (dst, src) in out.iter_mut().zip(flip.as_slice()) {
        *dst = *src as f32;
    }
    out
}
