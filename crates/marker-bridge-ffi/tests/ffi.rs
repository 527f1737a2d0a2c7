use std::ffi::{c_void, CStr};
use std::ptr;

use marker_bridge::aruco::{GridBoard, MarkerDetections, MarkerObservation, PredefinedDictionary};
use marker_bridge::core::{gl_axis_flip, CameraIntrinsics, ImageView, MarkerPose};
use marker_bridge::{
    BridgeConfig, CalibrationInput, CalibrationSolution, DebugDumpConfig, VisionBackend,
    VisionError,
};
use marker_bridge_ffi::*;
use nalgebra::Point2;

struct OneMarker {
    id: Option<i32>,
}

impl VisionBackend for OneMarker {
    fn detect_markers(
        &mut self,
        _gray: &ImageView<'_>,
        _dictionary: PredefinedDictionary,
    ) -> Result<MarkerDetections, VisionError> {
        let markers = self
            .id
            .map(|id| {
                MarkerObservation::new(
                    id,
                    [
                        Point2::new(1.0, 1.0),
                        Point2::new(5.0, 1.0),
                        Point2::new(5.0, 5.0),
                        Point2::new(1.0, 5.0),
                    ],
                )
            })
            .into_iter()
            .collect();
        Ok(MarkerDetections::new(markers))
    }

    fn refine_detected_markers(
        &mut self,
        _gray: &ImageView<'_>,
        _board: &GridBoard,
        _detections: &mut MarkerDetections,
        _intrinsics: Option<&CameraIntrinsics>,
    ) -> Result<(), VisionError> {
        Ok(())
    }

    fn estimate_poses(
        &mut self,
        markers: &[MarkerObservation],
        _marker_length: f64,
        _intrinsics: &CameraIntrinsics,
    ) -> Result<Vec<MarkerPose>, VisionError> {
        Ok(vec![MarkerPose::identity(); markers.len()])
    }

    fn calibrate(&mut self, _input: &CalibrationInput<'_>) -> Result<CalibrationSolution, VisionError> {
        Ok(CalibrationSolution {
            reprojection_error: 0.25,
            intrinsics: CameraIntrinsics::new(500.0, 500.0, 4.0, 3.0, vec![0.1, 0.2, 0.0, 0.0, 0.3]),
        })
    }
}

fn handle(dir: &std::path::Path, id: Option<i32>) -> *mut MbContext {
    let config = BridgeConfig {
        calibration_path: dir.join("calibration.yml"),
        load_saved_calibration: false,
        debug_dumps: DebugDumpConfig {
            enabled: false,
            dir: dir.to_path_buf(),
        },
        ..BridgeConfig::default()
    };
    MbContext::with_backend(OneMarker { id }, config)
        .unwrap()
        .into_raw()
}

#[test]
fn null_handles_are_rejected() {
    let pixels = [0u8; 16];
    let mut out = [0u8; 12];
    let mut mv = [0f32; 16];
    unsafe {
        assert_eq!(
            mb_annotate_frame(ptr::null_mut(), pixels.as_ptr(), 2, 2, 0, out.as_mut_ptr(), 0),
            MbStatus::NullPointer
        );
        assert!(!mb_estimate_marker_pose(
            ptr::null_mut(),
            pixels.as_ptr(),
            4,
            4,
            0,
            mv.as_mut_ptr(),
            ptr::null_mut()
        ));
        assert_eq!(
            mb_capture_calibration_frame(ptr::null_mut(), pixels.as_ptr(), 4, 4, 0),
            -(MbStatus::NullPointer as i32)
        );
        assert_eq!(mb_calibrate(ptr::null_mut(), ptr::null_mut()), MbStatus::NullPointer);
        assert_eq!(mb_calibration_sample_count(ptr::null()), 0);
        mb_reset_calibration_samples(ptr::null_mut());
        mb_context_free(ptr::null_mut());

        let message = mb_last_error_message();
        assert!(!message.is_null());
        assert!(CStr::from_ptr(message).to_str().unwrap().contains("null"));
    }
}

#[test]
fn pose_is_written_column_major() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = handle(dir.path(), Some(17));
    let gray = vec![10u8; 8 * 8];
    let mut mv = [0f32; 16];
    let mut id = -1;

    let found = unsafe {
        mb_estimate_marker_pose(ctx, gray.as_ptr(), 8, 8, 0, mv.as_mut_ptr(), &mut id)
    };

    assert!(found);
    assert_eq!(id, 17);
    assert_eq!(mv, gl_axis_flip());
    unsafe { mb_context_free(ctx) };
}

#[test]
fn pose_without_markers_returns_false() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = handle(dir.path(), None);
    let gray = vec![10u8; 8 * 8];
    let mut mv = [7f32; 16];

    let found = unsafe {
        mb_estimate_marker_pose(ctx, gray.as_ptr(), 8, 8, 0, mv.as_mut_ptr(), ptr::null_mut())
    };

    assert!(!found);
    assert_eq!(mv, [7f32; 16]);
    unsafe { mb_context_free(ctx) };
}

#[test]
fn annotate_writes_rgb_with_caller_stride() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = handle(dir.path(), None);
    let rgba: Vec<u8> = (0..2 * 2 * 4).map(|i| i as u8).collect();
    let mut out = vec![0xEEu8; 8 + 6];

    let status = unsafe { mb_annotate_frame(ctx, rgba.as_ptr(), 2, 2, 0, out.as_mut_ptr(), 8) };

    assert_eq!(status, MbStatus::Ok);
    assert_eq!(&out[..6], &[0, 1, 2, 4, 5, 6]);
    assert_eq!(&out[6..8], &[0xEE, 0xEE]);
    assert_eq!(&out[8..14], &[8, 9, 10, 12, 13, 14]);
    unsafe { mb_context_free(ctx) };
}

#[test]
fn annotate_rejects_short_stride() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = handle(dir.path(), None);
    let rgba = vec![0u8; 16];
    let mut out = vec![0u8; 12];

    let status = unsafe { mb_annotate_frame(ctx, rgba.as_ptr(), 2, 2, 4, out.as_mut_ptr(), 0) };

    assert_eq!(status, MbStatus::InvalidImage);
    unsafe { mb_context_free(ctx) };
}

#[test]
fn rotate_twice_restores_buffer() {
    let original: Vec<u8> = (0..2 * 3 * 2).map(|i| i as u8).collect();
    let mut data = original.clone();

    unsafe { mb_rotate_180(data.as_mut_ptr(), 2, 3, 2) };
    assert_eq!(&data[..2], &original[10..12]);
    unsafe { mb_rotate_180(data.as_mut_ptr(), 2, 3, 2) };

    assert_eq!(data, original);
}

#[test]
fn rotate_with_zero_pixel_size_is_a_no_op() {
    let mut data = vec![1u8, 2, 3, 4];
    unsafe { mb_rotate_180(data.as_mut_ptr(), 2, 2, 0) };
    assert_eq!(data, vec![1, 2, 3, 4]);
}

#[test]
fn capture_and_calibrate_through_the_handle() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = handle(dir.path(), Some(0));
    let gray = vec![50u8; 8 * 6];

    unsafe {
        assert_eq!(mb_capture_calibration_frame(ctx, gray.as_ptr(), 8, 6, 0), 1);
        assert_eq!(mb_capture_calibration_frame(ctx, gray.as_ptr(), 8, 6, 0), 2);
        assert_eq!(
            mb_capture_calibration_frame(ctx, gray.as_ptr(), 6, 8, 0),
            -(MbStatus::Calibration as i32)
        );
        assert_eq!(mb_calibration_sample_count(ctx), 2);

        let mut result = MbCalibrationResult::default();
        assert_eq!(mb_calibrate(ctx, &mut result), MbStatus::Ok);
        assert_eq!(result.frames_used, 2);
        assert_eq!(result.markers_used, 2);
        assert_eq!(result.reprojection_error, 0.25);
        assert_eq!(result.camera_matrix, [500.0, 0.0, 4.0, 0.0, 500.0, 3.0, 0.0, 0.0, 1.0]);
        assert_eq!(result.dist_coeffs_len, 5);
        assert_eq!(&result.dist_coeffs[..5], &[0.1, 0.2, 0.0, 0.0, 0.3]);
        assert!(dir.path().join("calibration.yml").is_file());

        mb_reset_calibration_samples(ctx);
        assert_eq!(mb_calibration_sample_count(ctx), 0);
        assert_eq!(mb_calibrate(ctx, ptr::null_mut()), MbStatus::Calibration);
        mb_context_free(ctx);
    }
}

#[derive(Default)]
struct FakeWindow {
    width: u32,
    height: u32,
    stride: u32,
    format: i32,
    bits: Vec<u8>,
    acquired: usize,
    locked: usize,
    posted: usize,
    released: usize,
}

unsafe extern "C" fn acquire(user_data: *mut c_void) -> bool {
    let w = unsafe { &mut *(user_data as *mut FakeWindow) };
    w.acquired += 1;
    true
}

unsafe extern "C" fn lock(user_data: *mut c_void, out: *mut MbWindowBuffer) -> bool {
    let w = unsafe { &mut *(user_data as *mut FakeWindow) };
    w.locked += 1;
    unsafe {
        *out = MbWindowBuffer {
            width: w.width,
            height: w.height,
            stride: w.stride,
            format: w.format,
            bits: w.bits.as_mut_ptr(),
        };
    }
    true
}

unsafe extern "C" fn unlock_and_post(user_data: *mut c_void) {
    let w = unsafe { &mut *(user_data as *mut FakeWindow) };
    w.posted += 1;
}

unsafe extern "C" fn release(user_data: *mut c_void) {
    let w = unsafe { &mut *(user_data as *mut FakeWindow) };
    w.released += 1;
}

fn callbacks(window: &mut FakeWindow) -> MbWindowCallbacks {
    MbWindowCallbacks {
        user_data: window as *mut FakeWindow as *mut c_void,
        acquire: Some(acquire),
        lock: Some(lock),
        unlock_and_post: Some(unlock_and_post),
        release: Some(release),
    }
}

fn planar_frame(y: &[u8], u: &[u8], v: &[u8]) -> MbYuvFrame {
    MbYuvFrame {
        width: 4,
        height: 2,
        y: y.as_ptr(),
        y_len: y.len(),
        y_stride: 4,
        u: u.as_ptr(),
        u_len: u.len(),
        v: v.as_ptr(),
        v_len: v.len(),
        uv_stride: 2,
        uv_pixel_stride: 1,
    }
}

#[test]
fn present_rotates_into_window_and_posts_once() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = handle(dir.path(), None);
    let (y, u, v) = ([128u8; 8], [128u8; 2], [128u8; 2]);
    let frame = planar_frame(&y, &u, &v);
    let mut window = FakeWindow {
        width: 2,
        height: 4,
        stride: 3,
        format: MB_WINDOW_FORMAT_RGBA_8888,
        bits: vec![0; 3 * 4 * 4],
        ..FakeWindow::default()
    };
    let cb = callbacks(&mut window);

    let status = unsafe { mb_present_yuv_frame(ctx, &frame, &cb) };

    assert_eq!(status, MbStatus::Ok);
    assert_eq!((window.acquired, window.locked, window.posted, window.released), (1, 1, 1, 1));
    for row in 0..4 {
        let start = row * 12;
        assert_eq!(window.bits[start + 3], 255, "row {row} alpha");
        assert_eq!(window.bits[start + 7], 255, "row {row} alpha");
        assert_eq!(&window.bits[start + 8..start + 12], &[0, 0, 0, 0], "row {row} padding");
    }
    unsafe { mb_context_free(ctx) };
}

#[test]
fn present_with_wrong_window_format_still_unlocks_and_releases() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = handle(dir.path(), None);
    let (y, u, v) = ([128u8; 8], [128u8; 2], [128u8; 2]);
    let frame = planar_frame(&y, &u, &v);
    let mut window = FakeWindow {
        width: 2,
        height: 4,
        stride: 2,
        format: 4,
        bits: vec![0; 2 * 4 * 4],
        ..FakeWindow::default()
    };
    let cb = callbacks(&mut window);

    let status = unsafe { mb_present_yuv_frame(ctx, &frame, &cb) };

    assert_eq!(status, MbStatus::Present);
    assert_eq!((window.locked, window.posted, window.released), (1, 1, 1));
    assert!(window.bits.iter().all(|&b| b == 0));
    unsafe { mb_context_free(ctx) };
}

#[test]
fn present_skips_window_when_frame_is_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = handle(dir.path(), None);
    let (y, u, v) = ([128u8; 3], [128u8; 2], [128u8; 2]);
    let frame = planar_frame(&y, &u, &v);
    let mut window = FakeWindow::default();
    let cb = callbacks(&mut window);

    let status = unsafe { mb_present_yuv_frame(ctx, &frame, &cb) };

    assert_eq!(status, MbStatus::Present);
    assert_eq!(window.acquired, 0);
    unsafe { mb_context_free(ctx) };
}
