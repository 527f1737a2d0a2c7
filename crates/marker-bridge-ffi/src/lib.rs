//! C ABI over [`marker_bridge`].
//!
//! The mobile side holds an opaque [`MbContext`] handle from
//! [`mb_context_new`] (or a Rust embedder's [`MbContext::into_raw`]) and
//! frees it with [`mb_context_free`]. Output buffers are always supplied by
//! the caller, so nothing allocated here needs a matching release except
//! the context itself.
//!
//! Failures return an [`MbStatus`] (or a negative status for count-returning
//! calls); the message of the last failure on the calling thread is
//! available from [`mb_last_error_message`].

use std::cell::RefCell;
use std::ffi::{c_char, c_void, CString};
use std::fmt::Display;
use std::slice;

use log::{error, info, warn};
use marker_bridge::core::{
    init_with_level, level_from_verbosity, required_len, rotate_180_in_place, ImageError,
    ImageView, ImageViewMut, PixelFormat, YuvFrame,
};
use marker_bridge::{
    BridgeConfig, BridgeContext, BridgeError, PresentError, SurfaceBuffer, VisionBackend,
    WindowSurface,
};

/// Android `WINDOW_FORMAT_RGBA_8888`.
pub const MB_WINDOW_FORMAT_RGBA_8888: i32 = 1;

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MbStatus {
    Ok = 0,
    NullPointer = 1,
    InvalidImage = 2,
    InvalidConfig = 3,
    Vision = 4,
    Calibration = 5,
    CalibrationFile = 6,
    Present = 7,
}

impl MbStatus {
    fn of(err: &BridgeError) -> Self {
        match err {
            BridgeError::Image(_) => MbStatus::InvalidImage,
            BridgeError::Vision(_) => MbStatus::Vision,
            BridgeError::Calibration(_) => MbStatus::Calibration,
            BridgeError::CalibrationFile(_) => MbStatus::CalibrationFile,
            BridgeError::Config(_) => MbStatus::InvalidConfig,
            BridgeError::Present(_) => MbStatus::Present,
        }
    }
}

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(message: String) {
    let message = CString::new(message)
        .unwrap_or_else(|_| c"error message contained a NUL byte".to_owned());
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(message));
}

fn fail(status: MbStatus, err: impl Display) -> MbStatus {
    error!("{status:?}: {err}");
    set_last_error(err.to_string());
    status
}

/// Opaque bridge handle.
pub struct MbContext {
    inner: BridgeContext<Box<dyn VisionBackend>>,
}

impl MbContext {
    pub fn from_context(inner: BridgeContext<Box<dyn VisionBackend>>) -> Self {
        Self { inner }
    }

    /// Wrap any backend for use through the C ABI.
    pub fn with_backend<B: VisionBackend + 'static>(
        backend: B,
        config: BridgeConfig,
    ) -> Result<Self, BridgeError> {
        let backend: Box<dyn VisionBackend> = Box::new(backend);
        Ok(Self::from_context(BridgeContext::new(backend, config)?))
    }

    /// Hand ownership to a foreign caller; release with [`mb_context_free`].
    pub fn into_raw(self) -> *mut MbContext {
        Box::into_raw(Box::new(self))
    }

    pub fn context(&self) -> &BridgeContext<Box<dyn VisionBackend>> {
        &self.inner
    }
}

/// Build a context over the OpenCV backend.
///
/// `config_json` may be null for defaults. Returns null on failure.
///
/// # Safety
/// `config_json` must be null or a valid NUL-terminated string.
#[cfg(feature = "opencv")]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mb_context_new(config_json: *const c_char) -> *mut MbContext {
    let config = if config_json.is_null() {
        BridgeConfig::default()
    } else {
        let raw = unsafe { std::ffi::CStr::from_ptr(config_json) };
        match raw
            .to_str()
            .map_err(|e| e.to_string())
            .and_then(|s| BridgeConfig::from_json_str(s).map_err(|e| e.to_string()))
        {
            Ok(config) => config,
            Err(e) => {
                fail(MbStatus::InvalidConfig, e);
                return std::ptr::null_mut();
            }
        }
    };
    match MbContext::with_backend(marker_bridge::OpenCvBackend::new(), config) {
        Ok(ctx) => ctx.into_raw(),
        Err(e) => {
            fail(MbStatus::of(&e), e);
            std::ptr::null_mut()
        }
    }
}

/// # Safety
/// `handle` must be null or come from [`mb_context_new`] /
/// [`MbContext::into_raw`], and must not be used afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mb_context_free(handle: *mut MbContext) {
    if handle.is_null() {
        return;
    }

    unsafe {
        drop(Box::from_raw(handle));
    }
}

/// Install the bridge logger. `verbosity` 0 silences, 1 error .. 5 trace.
#[unsafe(no_mangle)]
pub extern "C" fn mb_init_logging(verbosity: u32) {
    if init_with_level(level_from_verbosity(verbosity)).is_ok() {
        info!("marker bridge logging initialized");
    }
}

/// Message of the last failure on this thread, or null.
///
/// The pointer stays valid until the next failing call on the same thread.
#[unsafe(no_mangle)]
pub extern "C" fn mb_last_error_message() -> *const c_char {
    LAST_ERROR.with(|slot| {
        slot.borrow()
            .as_ref()
            .map_or(std::ptr::null(), |s| s.as_ptr())
    })
}

/// Borrow a caller buffer. A zero `stride` means tightly packed.
unsafe fn borrow_view<'a>(
    data: *const u8,
    width: u32,
    height: u32,
    stride: u32,
    format: PixelFormat,
) -> Result<ImageView<'a>, ImageError> {
    let (w, h) = (width as usize, height as usize);
    let stride = packed_or(stride, w, format);
    let len = required_len(w, h, stride, format.channels())?;
    let data = unsafe { slice::from_raw_parts(data, len) };
    ImageView::with_stride(w, h, stride, format, data)
}

unsafe fn borrow_view_mut<'a>(
    data: *mut u8,
    width: u32,
    height: u32,
    stride: u32,
    format: PixelFormat,
) -> Result<ImageViewMut<'a>, ImageError> {
    let (w, h) = (width as usize, height as usize);
    let stride = packed_or(stride, w, format);
    let len = required_len(w, h, stride, format.channels())?;
    let data = unsafe { slice::from_raw_parts_mut(data, len) };
    ImageViewMut::with_stride(w, h, stride, format, data)
}

fn packed_or(stride: u32, width: usize, format: PixelFormat) -> usize {
    if stride == 0 {
        width * format.channels()
    } else {
        stride as usize
    }
}

/// Annotate an RGBA frame into a caller-provided RGB buffer of the same size.
///
/// # Safety
/// `handle` must be a live context; `rgba` must hold `height` rows of
/// `rgba_stride` bytes and `out_rgb` `height` rows of `out_stride` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mb_annotate_frame(
    handle: *mut MbContext,
    rgba: *const u8,
    width: u32,
    height: u32,
    rgba_stride: u32,
    out_rgb: *mut u8,
    out_stride: u32,
) -> MbStatus {
    if handle.is_null() || rgba.is_null() || out_rgb.is_null() {
        return fail(MbStatus::NullPointer, "null argument to mb_annotate_frame");
    }

    let context = unsafe { &mut (*handle).inner };
    let src = match unsafe { borrow_view(rgba, width, height, rgba_stride, PixelFormat::Rgba8) } {
        Ok(v) => v,
        Err(e) => return fail(MbStatus::InvalidImage, e),
    };
    let mut dst =
        match unsafe { borrow_view_mut(out_rgb, width, height, out_stride, PixelFormat::Rgb8) } {
            Ok(v) => v,
            Err(e) => return fail(MbStatus::InvalidImage, e),
        };

    match context.annotate_frame_into(&src, &mut dst) {
        Ok(()) => MbStatus::Ok,
        Err(e) => fail(MbStatus::of(&e), e),
    }
}

/// Model-view matrix of the first marker in a grayscale frame.
///
/// Writes 16 column-major floats to `out_model_view` and the marker id to
/// `out_marker_id` (may be null). Returns false when no marker was found or
/// the backend failed; failures are logged.
///
/// # Safety
/// `handle` must be a live context, `gray` must hold `height` rows of
/// `stride` bytes, `out_model_view` must have room for 16 floats.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mb_estimate_marker_pose(
    handle: *mut MbContext,
    gray: *const u8,
    width: u32,
    height: u32,
    stride: u32,
    out_model_view: *mut f32,
    out_marker_id: *mut i32,
) -> bool {
    if handle.is_null() || gray.is_null() || out_model_view.is_null() {
        fail(MbStatus::NullPointer, "null argument to mb_estimate_marker_pose");
        return false;
    }

    let context = unsafe { &mut (*handle).inner };
    let view = match unsafe { borrow_view(gray, width, height, stride, PixelFormat::Gray8) } {
        Ok(v) => v,
        Err(e) => {
            fail(MbStatus::InvalidImage, e);
            return false;
        }
    };

    match context.estimate_marker_pose(&view) {
        Ok(marker_bridge::PoseOutcome::Found {
            marker_id,
            model_view,
        }) => {
            let out = unsafe { slice::from_raw_parts_mut(out_model_view, 16) };
            out.copy_from_slice(&model_view);
            if !out_marker_id.is_null() {
                unsafe { *out_marker_id = marker_id };
            }
            true
        }
        Ok(marker_bridge::PoseOutcome::NoMarkers) => false,
        Err(e) => {
            fail(MbStatus::Vision, e);
            false
        }
    }
}

/// Rotate a packed buffer by 180 degrees in place.
///
/// `bytes_per_pixel` is the element size of one pixel. Invalid arguments
/// leave the buffer untouched and are only logged.
///
/// # Safety
/// `data` must point to `width * height * bytes_per_pixel` writable bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mb_rotate_180(data: *mut u8, width: u32, height: u32, bytes_per_pixel: u32) {
    if data.is_null() {
        fail(MbStatus::NullPointer, "null buffer passed to mb_rotate_180");
        return;
    }
    let (w, h, bpp) = (width as usize, height as usize, bytes_per_pixel as usize);
    let Some(len) = w.checked_mul(h).and_then(|n| n.checked_mul(bpp)) else {
        fail(MbStatus::InvalidImage, "mb_rotate_180 size overflow");
        return;
    };
    let buf = unsafe { slice::from_raw_parts_mut(data, len) };
    if let Err(e) = rotate_180_in_place(buf, w, h, bpp) {
        fail(MbStatus::InvalidImage, e);
    }
}

/// Capture a grayscale calibration frame.
///
/// Returns the new sample count, or a negated [`MbStatus`] on failure.
///
/// # Safety
/// `handle` must be a live context and `gray` must hold `height` rows of
/// `stride` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mb_capture_calibration_frame(
    handle: *mut MbContext,
    gray: *const u8,
    width: u32,
    height: u32,
    stride: u32,
) -> i32 {
    if handle.is_null() || gray.is_null() {
        return -(fail(MbStatus::NullPointer, "null argument to mb_capture_calibration_frame") as i32);
    }

    let context = unsafe { &mut (*handle).inner };
    let view = match unsafe { borrow_view(gray, width, height, stride, PixelFormat::Gray8) } {
        Ok(v) => v,
        Err(e) => return -(fail(MbStatus::InvalidImage, e) as i32),
    };
    match context.capture_calibration_frame(&view) {
        Ok(count) => i32::try_from(count).unwrap_or(i32::MAX),
        Err(e) => -(fail(MbStatus::of(&e), e) as i32),
    }
}

/// Number of accumulated calibration frames.
///
/// # Safety
/// `handle` must be null or a live context.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mb_calibration_sample_count(handle: *const MbContext) -> u32 {
    if handle.is_null() {
        return 0;
    }
    let context = unsafe { &(*handle).inner };
    context.samples().len() as u32
}

/// Drop every accumulated calibration frame.
///
/// # Safety
/// `handle` must be null or a live context.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mb_reset_calibration_samples(handle: *mut MbContext) {
    if handle.is_null() {
        return;
    }
    unsafe { (*handle).inner.reset_calibration_samples() };
}

pub const MB_MAX_DIST_COEFFS: usize = 14;

/// Calibration solve output.
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct MbCalibrationResult {
    /// Row-major 3x3 camera matrix.
    pub camera_matrix: [f64; 9],
    pub dist_coeffs: [f64; MB_MAX_DIST_COEFFS],
    pub dist_coeffs_len: u32,
    pub reprojection_error: f64,
    pub frames_used: u32,
    pub markers_used: u32,
}

impl Default for MbCalibrationResult {
    fn default() -> Self {
        Self {
            camera_matrix: [0.0; 9],
            dist_coeffs: [0.0; MB_MAX_DIST_COEFFS],
            dist_coeffs_len: 0,
            reprojection_error: 0.0,
            frames_used: 0,
            markers_used: 0,
        }
    }
}

/// Solve for intrinsics over all captured frames and persist them.
///
/// # Safety
/// `handle` must be a live context; `out` may be null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mb_calibrate(handle: *mut MbContext, out: *mut MbCalibrationResult) -> MbStatus {
    if handle.is_null() {
        return fail(MbStatus::NullPointer, "null context passed to mb_calibrate");
    }

    let context = unsafe { &mut (*handle).inner };
    let report = match context.calibrate() {
        Ok(r) => r,
        Err(e) => return fail(MbStatus::of(&e), e),
    };
    if out.is_null() {
        return MbStatus::Ok;
    }

    let mut result = MbCalibrationResult {
        reprojection_error: report.reprojection_error,
        frames_used: report.frames_used as u32,
        markers_used: report.markers_used as u32,
        ..MbCalibrationResult::default()
    };
    let k = &report.intrinsics.camera_matrix;
    for r in 0..3 {
        for c in 0..3 {
            result.camera_matrix[r * 3 + c] = k[(r, c)];
        }
    }
    let dist = &report.intrinsics.dist_coeffs;
    if dist.len() > MB_MAX_DIST_COEFFS {
        warn!("truncating {} distortion coefficients", dist.len());
    }
    let n = dist.len().min(MB_MAX_DIST_COEFFS);
    result.dist_coeffs[..n].copy_from_slice(&dist[..n]);
    result.dist_coeffs_len = n as u32;
    unsafe { *out = result };
    MbStatus::Ok
}

/// YUV 4:2:0 planes as delivered by an `ImageReader` image.
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct MbYuvFrame {
    pub width: u32,
    pub height: u32,
    pub y: *const u8,
    pub y_len: usize,
    pub y_stride: u32,
    pub u: *const u8,
    pub u_len: usize,
    pub v: *const u8,
    pub v_len: usize,
    pub uv_stride: u32,
    pub uv_pixel_stride: u32,
}

/// A locked window buffer, filled by [`MbWindowCallbacks::lock`].
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct MbWindowBuffer {
    pub width: u32,
    pub height: u32,
    /// Row stride in pixels.
    pub stride: u32,
    pub format: i32,
    pub bits: *mut u8,
}

/// Platform window primitives, typically thin wrappers over `ANativeWindow`.
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct MbWindowCallbacks {
    pub user_data: *mut c_void,
    pub acquire: Option<unsafe extern "C" fn(user_data: *mut c_void) -> bool>,
    pub lock: Option<unsafe extern "C" fn(user_data: *mut c_void, out: *mut MbWindowBuffer) -> bool>,
    pub unlock_and_post: Option<unsafe extern "C" fn(user_data: *mut c_void)>,
    pub release: Option<unsafe extern "C" fn(user_data: *mut c_void)>,
}

struct CallbackSurface<'a> {
    callbacks: &'a MbWindowCallbacks,
}

impl WindowSurface for CallbackSurface<'_> {
    fn acquire(&mut self) -> Result<(), PresentError> {
        let Some(acquire) = self.callbacks.acquire else {
            return Err(PresentError::Acquire("no acquire callback".into()));
        };
        if unsafe { acquire(self.callbacks.user_data) } {
            Ok(())
        } else {
            Err(PresentError::Acquire("acquire callback failed".into()))
        }
    }

    fn lock(&mut self) -> Result<SurfaceBuffer<'_>, PresentError> {
        let Some(lock) = self.callbacks.lock else {
            return Err(PresentError::Lock("no lock callback".into()));
        };
        let mut raw = MbWindowBuffer {
            width: 0,
            height: 0,
            stride: 0,
            format: 0,
            bits: std::ptr::null_mut(),
        };
        if !unsafe { lock(self.callbacks.user_data, &mut raw) } || raw.bits.is_null() {
            return Err(PresentError::Lock("lock callback failed".into()));
        }
        if raw.format != MB_WINDOW_FORMAT_RGBA_8888 {
            self.unlock_and_post();
            return Err(PresentError::Lock(format!(
                "window buffer format {} is not RGBA_8888",
                raw.format
            )));
        }
        let len = raw.stride as usize * raw.height as usize * 4;
        let bits = unsafe { slice::from_raw_parts_mut(raw.bits, len) };
        Ok(SurfaceBuffer {
            width: raw.width as usize,
            height: raw.height as usize,
            stride: raw.stride as usize,
            format: PixelFormat::Rgba8,
            bits,
        })
    }

    fn unlock_and_post(&mut self) {
        if let Some(unlock) = self.callbacks.unlock_and_post {
            unsafe { unlock(self.callbacks.user_data) };
        }
    }

    fn release(&mut self) {
        if let Some(release) = self.callbacks.release {
            unsafe { release(self.callbacks.user_data) };
        }
    }
}

/// Convert a YUV frame, orient it for display and copy it into a window.
///
/// # Safety
/// `handle` must be a live context; the plane pointers in `frame` must be
/// valid for their stated lengths; the callbacks must honour the
/// [`MbWindowCallbacks`] contract and a locked buffer must hold
/// `stride * height` RGBA pixels.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mb_present_yuv_frame(
    handle: *const MbContext,
    frame: *const MbYuvFrame,
    window: *const MbWindowCallbacks,
) -> MbStatus {
    if handle.is_null() || frame.is_null() || window.is_null() {
        return fail(MbStatus::NullPointer, "null argument to mb_present_yuv_frame");
    }
    let context = unsafe { &(*handle).inner };
    let frame = unsafe { &*frame };
    let callbacks = unsafe { &*window };
    if frame.y.is_null() || frame.u.is_null() || frame.v.is_null() {
        return fail(MbStatus::NullPointer, "null YUV plane");
    }

    let yuv = YuvFrame {
        width: frame.width as usize,
        height: frame.height as usize,
        y: unsafe { slice::from_raw_parts(frame.y, frame.y_len) },
        y_stride: frame.y_stride as usize,
        u: unsafe { slice::from_raw_parts(frame.u, frame.u_len) },
        v: unsafe { slice::from_raw_parts(frame.v, frame.v_len) },
        uv_stride: frame.uv_stride as usize,
        uv_pixel_stride: frame.uv_pixel_stride as usize,
    };
    let mut surface = CallbackSurface { callbacks };
    match context.present_yuv_frame(&yuv, &mut surface) {
        Ok(()) => MbStatus::Ok,
        Err(e) => fail(MbStatus::Present, e),
    }
}
