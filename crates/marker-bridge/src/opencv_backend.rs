//! [`VisionBackend`] over OpenCV's `objdetect` and `calib3d` modules.

use crate::aruco::{GridBoard, MarkerCorners, MarkerDetections, MarkerObservation, PredefinedDictionary};
use crate::backend::{CalibrationInput, CalibrationSolution};
use crate::core::{CameraIntrinsics, ImageView, MarkerPose, PixelFormat};
use crate::{VisionBackend, VisionError};
use nalgebra::{Matrix3, Point2, Vector3};
use opencv::{
    calib3d,
    core::{self as cv, Mat, Point2f, Point3f, TermCriteria, TermCriteria_Type, Vector},
    objdetect,
    prelude::*,
};

impl From<opencv::Error> for VisionError {
    fn from(e: opencv::Error) -> Self {
        VisionError::Backend(e.to_string())
    }
}

/// OpenCV-backed detector, pose solver and calibrator.
///
/// The ArUco detector is rebuilt only when the requested dictionary changes.
pub struct OpenCvBackend {
    detector: Option<(PredefinedDictionary, objdetect::ArucoDetector)>,
    /// Iteration cap of the calibration solver.
    pub max_calibration_iterations: i32,
}

impl Default for OpenCvBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenCvBackend {
    pub fn new() -> Self {
        Self {
            detector: None,
            max_calibration_iterations: 30,
        }
    }

    fn detector(
        &mut self,
        dictionary: PredefinedDictionary,
    ) -> Result<&objdetect::ArucoDetector, VisionError> {
        let cached = self.detector.as_ref().map(|(d, _)| *d);
        if cached != Some(dictionary) {
            log::debug!("building ArUco detector for {dictionary}");
            let dict = objdetect::get_predefined_dictionary_i32(dictionary.opencv_id())?;
            let detector = objdetect::ArucoDetector::new(
                &dict,
                &objdetect::DetectorParameters::default()?,
                objdetect::RefineParameters::new(10.0, 3.0, true)?,
            )?;
            self.detector = Some((dictionary, detector));
        }
        self.detector
            .as_ref()
            .map(|(_, d)| d)
            .ok_or_else(|| VisionError::Backend("ArUco detector unavailable".into()))
    }
}

fn gray_mat(gray: &ImageView<'_>) -> Result<Mat, VisionError> {
    gray.expect_format(PixelFormat::Gray8)?;
    let packed = gray.to_owned_image();
    // The borrowed Mat points into `packed`, so take an owned copy.
    Ok(Mat::from_slice_rows_cols(&packed.data, gray.height, gray.width)?.try_clone()?)
}

fn camera_mat(k: &CameraIntrinsics) -> Result<Mat, VisionError> {
    let m = &k.camera_matrix;
    let rows = [
        [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
        [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
        [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
    ];
    Ok(Mat::from_slice_2d(&rows)?)
}

fn dist_mat(k: &CameraIntrinsics) -> Result<Mat, VisionError> {
    if k.dist_coeffs.is_empty() {
        return Ok(Mat::default());
    }
    Ok(Mat::from_slice_rows_cols(&k.dist_coeffs, 1, k.dist_coeffs.len())?.try_clone()?)
}

fn to_cv_quad(c: &MarkerCorners) -> Vector<Point2f> {
    c.iter().map(|p| Point2f::new(p.x, p.y)).collect()
}

fn from_cv_quad(q: &Vector<Point2f>) -> Option<MarkerCorners> {
    if q.len() != 4 {
        return None;
    }
    let mut out = [Point2::origin(); 4];
    for (dst, p) in out.iter_mut().zip(q.iter()) {
        *dst = Point2::new(p.x, p.y);
    }
    Some(out)
}

fn from_cv_detections(
    corners: &Vector<Vector<Point2f>>,
    ids: &Vector<i32>,
    rejected: &Vector<Vector<Point2f>>,
) -> MarkerDetections {
    let markers = corners
        .iter()
        .zip(ids.iter())
        .filter_map(|(q, id)| from_cv_quad(&q).map(|c| MarkerObservation::new(id, c)))
        .collect();
    MarkerDetections {
        markers,
        rejected: rejected.iter().filter_map(|q| from_cv_quad(&q)).collect(),
    }
}

fn vec3(m: &Mat) -> Result<Vector3<f64>, VisionError> {
    Ok(Vector3::new(*m.at::<f64>(0)?, *m.at::<f64>(1)?, *m.at::<f64>(2)?))
}

fn cv_board(board: &GridBoard) -> Result<objdetect::GridBoard, VisionError> {
    let spec = board.spec();
    let dict = objdetect::get_predefined_dictionary_i32(spec.dictionary.opencv_id())?;
    let ids: Vector<i32> = board.marker_ids().into_iter().collect();
    Ok(objdetect::GridBoard::new(
        cv::Size::new(spec.markers_x as i32, spec.markers_y as i32),
        spec.marker_length,
        spec.marker_separation,
        &dict,
        &ids,
    )?)
}

impl VisionBackend for OpenCvBackend {
    fn detect_markers(
        &mut self,
        gray: &ImageView<'_>,
        dictionary: PredefinedDictionary,
    ) -> Result<MarkerDetections, VisionError> {
        let image = gray_mat(gray)?;
        let detector = self.detector(dictionary)?;
        let mut corners = Vector::<Vector<Point2f>>::new();
        let mut ids = Vector::<i32>::new();
        let mut rejected = Vector::<Vector<Point2f>>::new();
        detector.detect_markers(&image, &mut corners, &mut ids, &mut rejected)?;
        Ok(from_cv_detections(&corners, &ids, &rejected))
    }

    fn refine_detected_markers(
        &mut self,
        gray: &ImageView<'_>,
        board: &GridBoard,
        detections: &mut MarkerDetections,
        intrinsics: Option<&CameraIntrinsics>,
    ) -> Result<(), VisionError> {
        let image = gray_mat(gray)?;
        let cv_board = cv_board(board)?;
        let (k, d) = match intrinsics {
            Some(k) => (camera_mat(k)?, dist_mat(k)?),
            None => (Mat::default(), Mat::default()),
        };

        let mut corners: Vector<Vector<Point2f>> =
            detections.markers.iter().map(|m| to_cv_quad(&m.corners)).collect();
        let mut ids: Vector<i32> = detections.markers.iter().map(|m| m.id).collect();
        let mut rejected: Vector<Vector<Point2f>> = detections.rejected.iter().map(to_cv_quad).collect();
        let mut recovered = Vector::<i32>::new();

        let before = ids.len();
        let detector = self.detector(board.dictionary())?;
        detector.refine_detected_markers(
            &image,
            &cv_board,
            &mut corners,
            &mut ids,
            &mut rejected,
            &k,
            &d,
            &mut recovered,
        )?;
        log::debug!("refinement recovered {} markers", ids.len().saturating_sub(before));
        *detections = from_cv_detections(&corners, &ids, &rejected);
        Ok(())
    }

    fn estimate_poses(
        &mut self,
        markers: &[MarkerObservation],
        marker_length: f64,
        intrinsics: &CameraIntrinsics,
    ) -> Result<Vec<MarkerPose>, VisionError> {
        let k = camera_mat(intrinsics)?;
        let d = dist_mat(intrinsics)?;
        // IPPE_SQUARE object points: centred marker, TL, TR, BR, BL.
        let h = (marker_length / 2.0) as f32;
        let object: Vector<Point3f> = [(-h, h), (h, h), (h, -h), (-h, -h)]
            .into_iter()
            .map(|(x, y)| Point3f::new(x, y, 0.0))
            .collect();

        let mut poses = Vec::with_capacity(markers.len());
        for marker in markers {
            let image = to_cv_quad(&marker.corners);
            let mut rvec = Mat::default();
            let mut tvec = Mat::default();
            let ok = calib3d::solve_pnp(
                &object,
                &image,
                &k,
                &d,
                &mut rvec,
                &mut tvec,
                false,
                calib3d::SOLVEPNP_IPPE_SQUARE,
            )?;
            if !ok {
                return Err(VisionError::Backend(format!(
                    "solvePnP failed for marker {}",
                    marker.id
                )));
            }
            poses.push(MarkerPose::new(vec3(&rvec)?, vec3(&tvec)?));
        }
        Ok(poses)
    }

    fn calibrate(&mut self, input: &CalibrationInput<'_>) -> Result<CalibrationSolution, VisionError> {
        let mut object_points = Vector::<Vector<Point3f>>::new();
        let mut image_points = Vector::<Vector<Point2f>>::new();
        for i in 0..input.marker_counts.len() {
            let Some((corners, ids)) = input.frame(i) else {
                break;
            };
            let mut obj = Vector::<Point3f>::new();
            let mut img = Vector::<Point2f>::new();
            for (quad, &id) in corners.iter().zip(ids) {
                let Some(board_quad) = input.board.marker_object_corners(id) else {
                    log::debug!("frame {i}: marker {id} is not on the board");
                    continue;
                };
                for (o, p) in board_quad.iter().zip(quad.iter()) {
                    obj.push(Point3f::new(o.x, o.y, o.z));
                    img.push(Point2f::new(p.x, p.y));
                }
            }
            if !obj.is_empty() {
                object_points.push(obj);
                image_points.push(img);
            }
        }
        if object_points.is_empty() {
            return Err(VisionError::Backend("no board markers in any calibration frame".into()));
        }

        let (w, h) = input.image_size;
        let mut k = camera_mat(input.initial_guess)?;
        let mut dist = Mat::default();
        let mut rvecs = Vector::<Mat>::new();
        let mut tvecs = Vector::<Mat>::new();
        let flags = if input.flags.fix_aspect_ratio {
            calib3d::CALIB_FIX_ASPECT_RATIO
        } else {
            0
        };
        let criteria = TermCriteria::new(
            TermCriteria_Type::COUNT as i32 + TermCriteria_Type::EPS as i32,
            self.max_calibration_iterations,
            f64::EPSILON,
        )?;
        let rms = calib3d::calibrate_camera(
            &object_points,
            &image_points,
            cv::Size::new(w as i32, h as i32),
            &mut k,
            &mut dist,
            &mut rvecs,
            &mut tvecs,
            flags,
            criteria,
        )?;

        let mut camera_matrix = Matrix3::zeros();
        for r in 0..3 {
            for c in 0..3 {
                camera_matrix[(r, c)] = *k.at_2d::<f64>(r as i32, c as i32)?;
            }
        }
        let mut dist_coeffs = Vec::with_capacity(dist.total());
        for i in 0..dist.total() {
            dist_coeffs.push(*dist.at::<f64>(i as i32)?);
        }

        Ok(CalibrationSolution {
            reprojection_error: rms,
            intrinsics: CameraIntrinsics {
                camera_matrix,
                dist_coeffs,
            },
        })
    }
}
