use std::cell::RefCell;
use std::ffi::CString;

use nr_interp::InterpreterError;

use crate::types::NpuStatus;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Store an error message for later retrieval via `npu_last_error`.
pub fn set_last_error(msg: String) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Take the last error message, leaving `None` in its place.
pub fn take_last_error() -> Option<CString> {
    LAST_ERROR.with(|e| e.borrow_mut().take())
}

/// Map an interpreter error to the status code reported over the boundary.
pub fn status_for(err: &InterpreterError) -> NpuStatus {
    match err {
        InterpreterError::Load(_) | InterpreterError::Rejected(_) => NpuStatus::ErrorModelLoad,
        InterpreterError::IndexOutOfRange { .. } => NpuStatus::ErrorIndex,
        InterpreterError::ElemTypeMismatch { .. } | InterpreterError::ShapeMismatch { .. } => {
            NpuStatus::ErrorShape
        }
        InterpreterError::InputNotSet { .. } | InterpreterError::Execution(_) => {
            NpuStatus::ErrorExecution
        }
        InterpreterError::NotInvoked => NpuStatus::ErrorState,
        InterpreterError::Tensor(_) => NpuStatus::ErrorInternal,
    }
}
