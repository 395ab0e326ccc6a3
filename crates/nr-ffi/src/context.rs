use nr_interp::Interpreter;

/// Opaque handle that owns the device and a loaded interpreter.
///
/// Created by `npu_interpreter_create` and freed by
/// `npu_interpreter_destroy`; the network registration is released when
/// the handle is destroyed.
pub struct NpuInterpreter {
    pub(crate) inner: Interpreter,
}
