mod types;
mod error;
mod context;

pub use types::*;
pub use error::*;
pub use context::*;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use nr_device::{EmulatedDevice, IoKind, PMU_EVENT_SLOTS};
use nr_interp::{Interpreter, InterpreterOptions, DEFAULT_TIMEOUT};
use nr_model::TensorInfo;
use nr_tensor::TensorView;

/// Execute a closure that returns an `NpuStatus`, catching any panics
/// and converting them into `NpuStatus::ErrorInternal`.
fn catch_panic<F: FnOnce() -> NpuStatus>(f: F) -> NpuStatus {
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
        Ok(status) => status,
        Err(_) => {
            set_last_error("internal panic".to_string());
            NpuStatus::ErrorInternal
        }
    }
}

/// Look up one input or output descriptor, reporting `ErrorIndex` when the
/// index is past the model's tensor count.
fn descriptor(interp: &NpuInterpreter, kind: IoKind, index: u32) -> Result<&TensorInfo, NpuStatus> {
    let infos = match kind {
        IoKind::Input => interp.inner.input_info(),
        IoKind::Output => interp.inner.output_info(),
    };
    infos.get(index as usize).ok_or_else(|| {
        set_last_error(format!(
            "{kind} tensor index {index} out of range ({} available)",
            infos.len()
        ));
        NpuStatus::ErrorIndex
    })
}

/// Create an interpreter for the model at `model_path`.
///
/// A null `options` selects the defaults. On success, writes a
/// heap-allocated `NpuInterpreter` pointer into `*out` and returns
/// `NpuStatus::Ok`. The caller must later call `npu_interpreter_destroy`
/// to free the handle and release the network.
#[no_mangle]
pub unsafe extern "C" fn npu_interpreter_create(
    model_path: *const c_char,
    options: *const NpuOptions,
    out: *mut *mut NpuInterpreter,
) -> NpuStatus {
    catch_panic(|| {
        if model_path.is_null() || out.is_null() {
            set_last_error("null argument".to_string());
            return NpuStatus::ErrorInvalidArgument;
        }
        let path_str = match unsafe { CStr::from_ptr(model_path) }.to_str() {
            Ok(s) => s,
            Err(e) => {
                set_last_error(format!("invalid path: {}", e));
                return NpuStatus::ErrorInvalidArgument;
            }
        };
        let options = if options.is_null() {
            NpuOptions::default()
        } else {
            unsafe { (*options).clone() }
        };

        let timeout = if options.timeout_nanos > 0 {
            Duration::from_nanos(options.timeout_nanos as u64)
        } else {
            DEFAULT_TIMEOUT
        };
        let interp_options = InterpreterOptions {
            timeout,
            pmu_events: options.pmu_events,
            cycle_counter: options.enable_cycle_counter,
        };

        let device = Arc::new(EmulatedDevice::with_seed(options.seed));
        let inner = match Interpreter::with_options(device, Path::new(path_str), interp_options) {
            Ok(i) => i,
            Err(e) => {
                set_last_error(e.to_string());
                return status_for(&e);
            }
        };
        unsafe {
            *out = Box::into_raw(Box::new(NpuInterpreter { inner }));
        }
        NpuStatus::Ok
    })
}

/// Destroy an interpreter previously created by `npu_interpreter_create`.
///
/// Passing a null pointer is a no-op and returns `NpuStatus::Ok`.
#[no_mangle]
pub unsafe extern "C" fn npu_interpreter_destroy(interp: *mut NpuInterpreter) -> NpuStatus {
    if interp.is_null() {
        return NpuStatus::Ok;
    }
    drop(Box::from_raw(interp));
    NpuStatus::Ok
}

fn count_impl(interp: *const NpuInterpreter, kind: IoKind, count_out: *mut u32) -> NpuStatus {
    catch_panic(|| {
        if interp.is_null() || count_out.is_null() {
            set_last_error("null argument".to_string());
            return NpuStatus::ErrorInvalidArgument;
        }
        let interp = unsafe { &*interp };
        let infos = match kind {
            IoKind::Input => interp.inner.input_info(),
            IoKind::Output => interp.inner.output_info(),
        };
        unsafe { *count_out = infos.len() as u32 };
        NpuStatus::Ok
    })
}

/// Number of input tensors in the loaded model.
#[no_mangle]
pub unsafe extern "C" fn npu_interpreter_input_count(
    interp: *const NpuInterpreter,
    count_out: *mut u32,
) -> NpuStatus {
    count_impl(interp, IoKind::Input, count_out)
}

/// Number of output tensors in the loaded model.
#[no_mangle]
pub unsafe extern "C" fn npu_interpreter_output_count(
    interp: *const NpuInterpreter,
    count_out: *mut u32,
) -> NpuStatus {
    count_impl(interp, IoKind::Output, count_out)
}

fn rank_impl(
    interp: *const NpuInterpreter,
    kind: IoKind,
    index: u32,
    rank_out: *mut u32,
) -> NpuStatus {
    catch_panic(|| {
        if interp.is_null() || rank_out.is_null() {
            set_last_error("null argument".to_string());
            return NpuStatus::ErrorInvalidArgument;
        }
        let interp = unsafe { &*interp };
        match descriptor(interp, kind, index) {
            Ok(info) => {
                unsafe { *rank_out = info.shape.ndim() as u32 };
                NpuStatus::Ok
            }
            Err(status) => status,
        }
    })
}

/// Number of dimensions of one input tensor.
#[no_mangle]
pub unsafe extern "C" fn npu_interpreter_input_rank(
    interp: *const NpuInterpreter,
    index: u32,
    rank_out: *mut u32,
) -> NpuStatus {
    rank_impl(interp, IoKind::Input, index, rank_out)
}

/// Number of dimensions of one output tensor.
#[no_mangle]
pub unsafe extern "C" fn npu_interpreter_output_rank(
    interp: *const NpuInterpreter,
    index: u32,
    rank_out: *mut u32,
) -> NpuStatus {
    rank_impl(interp, IoKind::Output, index, rank_out)
}

fn dims_impl(
    interp: *const NpuInterpreter,
    kind: IoKind,
    index: u32,
    dims_out: *mut u64,
    capacity: u32,
) -> NpuStatus {
    catch_panic(|| {
        if interp.is_null() || dims_out.is_null() {
            set_last_error("null argument".to_string());
            return NpuStatus::ErrorInvalidArgument;
        }
        let interp = unsafe { &*interp };
        let info = match descriptor(interp, kind, index) {
            Ok(info) => info,
            Err(status) => return status,
        };
        let dims = info.shape.dims();
        if (capacity as usize) < dims.len() {
            set_last_error(format!(
                "dims buffer too small: need {} entries, have {capacity}",
                dims.len()
            ));
            return NpuStatus::ErrorInvalidArgument;
        }
        for (i, &d) in dims.iter().enumerate() {
            unsafe { *dims_out.add(i) = d as u64 };
        }
        NpuStatus::Ok
    })
}

/// Dimension sizes of one input tensor, written into `dims_out`.
///
/// `capacity` is the number of entries `dims_out` can hold; query the
/// required count with `npu_interpreter_input_rank`.
#[no_mangle]
pub unsafe extern "C" fn npu_interpreter_input_dims(
    interp: *const NpuInterpreter,
    index: u32,
    dims_out: *mut u64,
    capacity: u32,
) -> NpuStatus {
    dims_impl(interp, IoKind::Input, index, dims_out, capacity)
}

/// Dimension sizes of one output tensor, written into `dims_out`.
#[no_mangle]
pub unsafe extern "C" fn npu_interpreter_output_dims(
    interp: *const NpuInterpreter,
    index: u32,
    dims_out: *mut u64,
    capacity: u32,
) -> NpuStatus {
    dims_impl(interp, IoKind::Output, index, dims_out, capacity)
}

fn type_impl(
    interp: *const NpuInterpreter,
    kind: IoKind,
    index: u32,
    code_out: *mut i8,
) -> NpuStatus {
    catch_panic(|| {
        if interp.is_null() || code_out.is_null() {
            set_last_error("null argument".to_string());
            return NpuStatus::ErrorInvalidArgument;
        }
        let interp = unsafe { &*interp };
        match descriptor(interp, kind, index) {
            Ok(info) => {
                unsafe { *code_out = info.elem_type.type_code() };
                NpuStatus::Ok
            }
            Err(status) => status,
        }
    })
}

/// Container type code of one input tensor.
#[no_mangle]
pub unsafe extern "C" fn npu_interpreter_input_type(
    interp: *const NpuInterpreter,
    index: u32,
    code_out: *mut i8,
) -> NpuStatus {
    type_impl(interp, IoKind::Input, index, code_out)
}

/// Container type code of one output tensor.
#[no_mangle]
pub unsafe extern "C" fn npu_interpreter_output_type(
    interp: *const NpuInterpreter,
    index: u32,
    code_out: *mut i8,
) -> NpuStatus {
    type_impl(interp, IoKind::Output, index, code_out)
}

fn elem_size_impl(
    interp: *const NpuInterpreter,
    kind: IoKind,
    index: u32,
    size_out: *mut usize,
) -> NpuStatus {
    catch_panic(|| {
        if interp.is_null() || size_out.is_null() {
            set_last_error("null argument".to_string());
            return NpuStatus::ErrorInvalidArgument;
        }
        let interp = unsafe { &*interp };
        match descriptor(interp, kind, index) {
            Ok(info) => {
                unsafe { *size_out = info.elem_type.size_in_bytes() };
                NpuStatus::Ok
            }
            Err(status) => status,
        }
    })
}

/// Size in bytes of a single element of one input tensor.
#[no_mangle]
pub unsafe extern "C" fn npu_interpreter_input_elem_size(
    interp: *const NpuInterpreter,
    index: u32,
    size_out: *mut usize,
) -> NpuStatus {
    elem_size_impl(interp, IoKind::Input, index, size_out)
}

/// Size in bytes of a single element of one output tensor.
#[no_mangle]
pub unsafe extern "C" fn npu_interpreter_output_elem_size(
    interp: *const NpuInterpreter,
    index: u32,
    size_out: *mut usize,
) -> NpuStatus {
    elem_size_impl(interp, IoKind::Output, index, size_out)
}

fn quant_impl(
    interp: *const NpuInterpreter,
    kind: IoKind,
    index: u32,
    scale_out: *mut f32,
    zero_point_out: *mut i64,
) -> NpuStatus {
    catch_panic(|| {
        if interp.is_null() || scale_out.is_null() || zero_point_out.is_null() {
            set_last_error("null argument".to_string());
            return NpuStatus::ErrorInvalidArgument;
        }
        let interp = unsafe { &*interp };
        match descriptor(interp, kind, index) {
            Ok(info) => {
                // Unquantized tensors report the identity mapping.
                let (scale, zero_point) = match info.quant {
                    Some(q) => (q.scale, q.zero_point),
                    None => (1.0, 0),
                };
                unsafe {
                    *scale_out = scale;
                    *zero_point_out = zero_point;
                }
                NpuStatus::Ok
            }
            Err(status) => status,
        }
    })
}

/// Quantization parameters of one input tensor.
#[no_mangle]
pub unsafe extern "C" fn npu_interpreter_input_quant(
    interp: *const NpuInterpreter,
    index: u32,
    scale_out: *mut f32,
    zero_point_out: *mut i64,
) -> NpuStatus {
    quant_impl(interp, IoKind::Input, index, scale_out, zero_point_out)
}

/// Quantization parameters of one output tensor.
#[no_mangle]
pub unsafe extern "C" fn npu_interpreter_output_quant(
    interp: *const NpuInterpreter,
    index: u32,
    scale_out: *mut f32,
    zero_point_out: *mut i64,
) -> NpuStatus {
    quant_impl(interp, IoKind::Output, index, scale_out, zero_point_out)
}

/// Bind input data for the next invoke.
///
/// `len` must equal the input's descriptor byte size exactly; the bytes
/// are copied, so the caller may reuse `data` immediately.
#[no_mangle]
pub unsafe extern "C" fn npu_interpreter_set_input(
    interp: *mut NpuInterpreter,
    index: u32,
    data: *const u8,
    len: usize,
) -> NpuStatus {
    catch_panic(|| {
        if interp.is_null() || data.is_null() {
            set_last_error("null argument".to_string());
            return NpuStatus::ErrorInvalidArgument;
        }
        let interp = unsafe { &mut *interp };
        let (elem_type, shape, expected) = match descriptor(interp, IoKind::Input, index) {
            Ok(info) => (info.elem_type, info.shape.clone(), info.byte_size()),
            Err(status) => return status,
        };
        if len != expected {
            set_last_error(format!("input {index} expects {expected} bytes, got {len}"));
            return NpuStatus::ErrorShape;
        }
        let bytes = unsafe { std::slice::from_raw_parts(data, len) };
        let view = match TensorView::new(elem_type, shape, None, bytes) {
            Ok(v) => v,
            Err(e) => {
                set_last_error(format!("invalid input view: {}", e));
                return NpuStatus::ErrorInternal;
            }
        };
        match interp.inner.set_input(index as usize, &view) {
            Ok(()) => NpuStatus::Ok,
            Err(e) => {
                set_last_error(e.to_string());
                status_for(&e)
            }
        }
    })
}

/// Run one inference. Every input must have been set since the previous
/// invoke.
#[no_mangle]
pub unsafe extern "C" fn npu_interpreter_invoke(interp: *mut NpuInterpreter) -> NpuStatus {
    catch_panic(|| {
        if interp.is_null() {
            set_last_error("null argument".to_string());
            return NpuStatus::ErrorInvalidArgument;
        }
        let interp = unsafe { &mut *interp };
        match interp.inner.invoke() {
            Ok(()) => NpuStatus::Ok,
            Err(e) => {
                set_last_error(e.to_string());
                status_for(&e)
            }
        }
    })
}

/// Byte size of one output tensor, valid before any invoke.
#[no_mangle]
pub unsafe extern "C" fn npu_interpreter_output_len(
    interp: *const NpuInterpreter,
    index: u32,
    len_out: *mut usize,
) -> NpuStatus {
    catch_panic(|| {
        if interp.is_null() || len_out.is_null() {
            set_last_error("null argument".to_string());
            return NpuStatus::ErrorInvalidArgument;
        }
        let interp = unsafe { &*interp };
        match descriptor(interp, IoKind::Output, index) {
            Ok(info) => {
                unsafe { *len_out = info.byte_size() };
                NpuStatus::Ok
            }
            Err(status) => status,
        }
    })
}

/// Copy the raw bytes of one output of the last completed invoke.
///
/// Writes the copied byte count into `*written_out`. Fails with
/// `NpuStatus::ErrorState` if no invoke has completed.
#[no_mangle]
pub unsafe extern "C" fn npu_interpreter_get_output(
    interp: *const NpuInterpreter,
    index: u32,
    buf: *mut u8,
    capacity: usize,
    written_out: *mut usize,
) -> NpuStatus {
    catch_panic(|| {
        if interp.is_null() || buf.is_null() || written_out.is_null() {
            set_last_error("null argument".to_string());
            return NpuStatus::ErrorInvalidArgument;
        }
        let interp = unsafe { &*interp };
        let view = match interp.inner.output(index as usize) {
            Ok(v) => v,
            Err(e) => {
                set_last_error(e.to_string());
                return status_for(&e);
            }
        };
        let bytes = view.bytes();
        if capacity < bytes.len() {
            set_last_error(format!(
                "output buffer too small: need {} bytes, have {capacity}",
                bytes.len()
            ));
            return NpuStatus::ErrorInvalidArgument;
        }
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), buf, bytes.len());
            *written_out = bytes.len();
        }
        NpuStatus::Ok
    })
}

/// Performance counter values of the last completed invoke.
///
/// `counters_out` must hold four entries, one per counter slot;
/// unconfigured slots read as zero.
#[no_mangle]
pub unsafe extern "C" fn npu_interpreter_pmu_counters(
    interp: *const NpuInterpreter,
    counters_out: *mut u32,
) -> NpuStatus {
    catch_panic(|| {
        if interp.is_null() || counters_out.is_null() {
            set_last_error("null argument".to_string());
            return NpuStatus::ErrorInvalidArgument;
        }
        let interp = unsafe { &*interp };
        match interp.inner.pmu_counters() {
            Ok(counters) => {
                unsafe {
                    std::ptr::copy_nonoverlapping(
                        counters.as_ptr(),
                        counters_out,
                        PMU_EVENT_SLOTS,
                    );
                }
                NpuStatus::Ok
            }
            Err(e) => {
                set_last_error(e.to_string());
                status_for(&e)
            }
        }
    })
}

/// Cycle count of the last completed invoke; zero unless the cycle
/// counter was enabled in the creation options.
#[no_mangle]
pub unsafe extern "C" fn npu_interpreter_cycle_count(
    interp: *const NpuInterpreter,
    cycles_out: *mut u64,
) -> NpuStatus {
    catch_panic(|| {
        if interp.is_null() || cycles_out.is_null() {
            set_last_error("null argument".to_string());
            return NpuStatus::ErrorInvalidArgument;
        }
        let interp = unsafe { &*interp };
        match interp.inner.cycle_counter() {
            Ok(cycles) => {
                unsafe { *cycles_out = cycles };
                NpuStatus::Ok
            }
            Err(e) => {
                set_last_error(e.to_string());
                status_for(&e)
            }
        }
    })
}

/// Hardware and driver capabilities of the device backing the interpreter.
#[no_mangle]
pub unsafe extern "C" fn npu_interpreter_capabilities(
    interp: *const NpuInterpreter,
    caps_out: *mut NpuCapabilities,
) -> NpuStatus {
    catch_panic(|| {
        if interp.is_null() || caps_out.is_null() {
            set_last_error("null argument".to_string());
            return NpuStatus::ErrorInvalidArgument;
        }
        let interp = unsafe { &*interp };
        match interp.inner.device_capabilities() {
            Ok(caps) => {
                unsafe { *caps_out = NpuCapabilities::from(&caps) };
                NpuStatus::Ok
            }
            Err(e) => {
                set_last_error(e.to_string());
                status_for(&e)
            }
        }
    })
}

/// Retrieve the last error message.
///
/// Returns a pointer to a C string describing the most recent error, or
/// null if no error has occurred. The caller must free the returned string
/// with `npu_free_string`.
#[no_mangle]
pub extern "C" fn npu_last_error() -> *const c_char {
    match error::take_last_error() {
        Some(e) => e.into_raw(),
        None => std::ptr::null(),
    }
}

/// Free a string previously returned by `npu_last_error`.
#[no_mangle]
pub unsafe extern "C" fn npu_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}
