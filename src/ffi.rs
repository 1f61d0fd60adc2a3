//! FFI bindings for Synheart Motion
//!
//! This module provides C-compatible functions for calling Motion from other languages.
//! All functions use C strings (null-terminated) and return allocated memory that
//! must be freed by the caller using `motion_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::calibration::CalibrationStep;
use crate::config::EngineConfig;
use crate::pipeline::{frames_to_session_summary, MotionProcessor};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Replay recorded frames (NDJSON or JSON array) and return the session summary JSON.
///
/// # Safety
/// - `frames` and `exercise_id` must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `motion_free_string`.
/// - Returns NULL on error; call `motion_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn motion_frames_to_session_summary(
    frames: *const c_char,
    exercise_id: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let frames_str = match cstr_to_string(frames) {
        Some(s) => s,
        None => {
            set_last_error("Invalid frames string pointer");
            return ptr::null_mut();
        }
    };

    let exercise_str = match cstr_to_string(exercise_id) {
        Some(s) => s,
        None => {
            set_last_error("Invalid exercise_id string pointer");
            return ptr::null_mut();
        }
    };

    match frames_to_session_summary(frames_str, exercise_str) {
        Ok(summary) => string_to_cstr(&summary),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateful Processor API
// ============================================================================

/// Opaque handle to a MotionProcessor
pub struct MotionProcessorHandle {
    processor: MotionProcessor,
}

/// Create a new MotionProcessor.
///
/// # Safety
/// - `config_json` may be NULL for defaults, otherwise a valid null-terminated C string.
/// - Returns a pointer to a newly allocated MotionProcessor.
/// - Must be freed with `motion_processor_free`.
/// - Returns NULL on error.
#[no_mangle]
pub unsafe extern "C" fn motion_processor_new(
    config_json: *const c_char,
) -> *mut MotionProcessorHandle {
    clear_last_error();

    let processor = if config_json.is_null() {
        MotionProcessor::new()
    } else {
        let json = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        };
        match EngineConfig::from_json(&json).and_then(MotionProcessor::with_config) {
            Ok(processor) => processor,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    let handle = Box::new(MotionProcessorHandle { processor });
    Box::into_raw(handle)
}

/// Free a MotionProcessor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `motion_processor_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn motion_processor_free(processor: *mut MotionProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Select the active exercise by id or alias.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `motion_processor_new`.
/// - `exercise_id` must be a valid null-terminated C string.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn motion_processor_select_exercise(
    processor: *mut MotionProcessorHandle,
    exercise_id: *const c_char,
) -> i32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }

    let handle = &mut *processor;

    let exercise_str = match cstr_to_string(exercise_id) {
        Some(s) => s,
        None => {
            set_last_error("Invalid exercise_id string pointer");
            return -1;
        }
    };

    match handle.processor.select_exercise(&exercise_str) {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Process one pose.frame.v1 JSON frame and return the frame report JSON.
///
/// Skipped frames (duplicate or out-of-order timestamps) return `{}`.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `motion_processor_new`.
/// - `frame_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `motion_free_string`.
/// - Returns NULL on error; call `motion_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn motion_processor_process_frame(
    processor: *mut MotionProcessorHandle,
    frame_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &mut *processor;

    let json_str = match cstr_to_string(frame_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid frame string pointer");
            return ptr::null_mut();
        }
    };

    let report = match handle.processor.process_frame_json(&json_str) {
        Ok(report) => report,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let encoded = match report {
        Some(report) => serde_json::to_string(&report),
        None => Ok("{}".to_string()),
    };
    match encoded {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Capture a calibration extreme (0 = first step, 1 = second) from the latest frame.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `motion_processor_new`.
/// - Returns a newly allocated event JSON string that must be freed with `motion_free_string`.
/// - Returns NULL on error; call `motion_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn motion_processor_capture_calibration(
    processor: *mut MotionProcessorHandle,
    step: i32,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &mut *processor;

    let step = match usize::try_from(step).ok().and_then(CalibrationStep::from_index) {
        Some(step) => step,
        None => {
            set_last_error("Calibration step must be 0 or 1");
            return ptr::null_mut();
        }
    };

    match handle
        .processor
        .capture_calibration(step)
        .and_then(|event| serde_json::to_string(&event).map_err(Into::into))
    {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Save calibration profiles to JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `motion_processor_new`.
/// - Returns a newly allocated string that must be freed with `motion_free_string`.
/// - Returns NULL on error; call `motion_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn motion_processor_save_calibrations(
    processor: *mut MotionProcessorHandle,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &*processor;

    match handle.processor.save_calibrations() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Load calibration profiles from JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `motion_processor_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns 0 on success, non-zero on error.
/// - On error, call `motion_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn motion_processor_load_calibrations(
    processor: *mut MotionProcessorHandle,
    json: *const c_char,
) -> i32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }

    let handle = &mut *processor;

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return -1;
        }
    };

    match handle.processor.load_calibrations(&json_str) {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Finish the session and return its summary JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `motion_processor_new`.
/// - Returns a newly allocated string that must be freed with `motion_free_string`.
/// - Returns NULL on error; call `motion_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn motion_processor_finish_session(
    processor: *mut MotionProcessorHandle,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &mut *processor;

    match handle.processor.finish_session_json() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Motion functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Motion function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn motion_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Motion function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn motion_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Motion library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn motion_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
