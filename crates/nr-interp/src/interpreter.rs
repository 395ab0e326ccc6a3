use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use nr_device::{
    Capabilities, Device, InferenceReport, IoKind, NetworkHandle, PmuConfig, PMU_EVENT_SLOTS,
};
use nr_model::{ModelFile, TensorInfo};
use nr_tensor::{HostBuffer, TensorView};

use crate::error::{InterpreterError, Result};

/// Deadline applied to `invoke` when the caller does not set one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Construction-time knobs for an `Interpreter`.
#[derive(Debug, Clone)]
pub struct InterpreterOptions {
    /// Wall-clock deadline for a single `invoke`.
    pub timeout: Duration,
    /// Performance monitor events to count during each `invoke`.
    pub pmu_events: [u32; PMU_EVENT_SLOTS],
    /// Capture the cycle counter during each `invoke`.
    pub cycle_counter: bool,
}

impl Default for InterpreterOptions {
    fn default() -> Self {
        InterpreterOptions {
            timeout: DEFAULT_TIMEOUT,
            pmu_events: [0; PMU_EVENT_SLOTS],
            cycle_counter: false,
        }
    }
}

/// Runs a compiled model on a device.
///
/// The lifecycle is load, bind inputs, `invoke`, read outputs. Input and
/// output feature map buffers are allocated once at construction from the
/// model's descriptors and reused across runs. A run consumes its input
/// bindings, so every input must be set again before the next `invoke`.
pub struct Interpreter {
    device: Arc<dyn Device>,
    model: ModelFile,
    network: NetworkHandle,
    ifm: Vec<HostBuffer>,
    ifm_bound: Vec<bool>,
    ofm: Vec<HostBuffer>,
    /// Counters from the last completed run; `None` until an `invoke`
    /// succeeds, and cleared again the moment the next one starts.
    report: Option<InferenceReport>,
    timeout: Duration,
    pmu: PmuConfig,
}

impl std::fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("ifm_bound", &self.ifm_bound)
            .field("report", &self.report)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Interpreter {
    /// Load a model and register it with `device`, using default options.
    pub fn from_file(device: Arc<dyn Device>, path: &Path) -> Result<Interpreter> {
        Self::with_options(device, path, InterpreterOptions::default())
    }

    /// Load a model and register it with `device`.
    ///
    /// Parses the container, uploads it to the device, and allocates one
    /// host buffer per input and output descriptor.
    pub fn with_options(
        device: Arc<dyn Device>,
        path: &Path,
        options: InterpreterOptions,
    ) -> Result<Interpreter> {
        let model = ModelFile::open(path)?;
        let network = device
            .register_network(model.bytes())
            .map_err(InterpreterError::Rejected)?;

        let ifm: Vec<HostBuffer> = model
            .input_info()
            .iter()
            .map(|info| HostBuffer::with_capacity(info.byte_size()))
            .collect();
        let ifm_bound = vec![false; ifm.len()];
        let ofm: Vec<HostBuffer> = model
            .output_info()
            .iter()
            .map(|info| HostBuffer::with_capacity(info.byte_size()))
            .collect();

        info!(
            path = %path.display(),
            device = device.name(),
            inputs = ifm.len(),
            outputs = ofm.len(),
            npu_ops = model.npu_op_count(),
            "loaded model"
        );

        Ok(Interpreter {
            device,
            model,
            network,
            ifm,
            ifm_bound,
            ofm,
            report: None,
            timeout: options.timeout,
            pmu: PmuConfig {
                events: options.pmu_events,
                cycle_counter: options.cycle_counter,
            },
        })
    }

    /// Descriptors for the model's input tensors.
    pub fn input_info(&self) -> &[TensorInfo] {
        self.model.input_info()
    }

    /// Descriptors for the model's output tensors.
    pub fn output_info(&self) -> &[TensorInfo] {
        self.model.output_info()
    }

    /// Hardware and driver capabilities reported by the device.
    pub fn device_capabilities(&self) -> Result<Capabilities> {
        Ok(self.device.capabilities()?)
    }

    /// Bind input data for the next `invoke`.
    ///
    /// The view must match the descriptor's element type and shape exactly;
    /// its bytes are copied into the input feature map buffer.
    pub fn set_input(&mut self, index: usize, view: &TensorView) -> Result<()> {
        let count = self.model.input_info().len();
        let info = self
            .model
            .input_info()
            .get(index)
            .ok_or(InterpreterError::IndexOutOfRange {
                kind: IoKind::Input,
                index,
                count,
            })?;
        if view.elem_type() != info.elem_type {
            return Err(InterpreterError::ElemTypeMismatch {
                index,
                expected: info.elem_type,
                got: view.elem_type(),
            });
        }
        if view.shape() != &info.shape {
            return Err(InterpreterError::ShapeMismatch {
                index,
                expected: info.shape.clone(),
                got: view.shape().clone(),
            });
        }
        self.ifm[index].write(view.bytes())?;
        self.ifm_bound[index] = true;
        Ok(())
    }

    /// Run one inference.
    ///
    /// Every input must have been set since the previous run. On success
    /// the outputs and counters become readable; on any failure they stay
    /// invalid until a later `invoke` succeeds.
    pub fn invoke(&mut self) -> Result<()> {
        // Starting a run invalidates whatever the previous one produced.
        self.report = None;

        if let Some(index) = self.ifm_bound.iter().position(|bound| !bound) {
            return Err(InterpreterError::InputNotSet { index });
        }

        let ifm_refs: Vec<&[u8]> = self.ifm.iter().map(|buf| buf.as_slice()).collect();
        let report = self.device.run_inference(
            self.network,
            &ifm_refs,
            &mut self.ofm,
            &self.pmu,
            self.timeout,
        )?;

        // The run consumed the bindings.
        for bound in &mut self.ifm_bound {
            *bound = false;
        }
        self.report = Some(report);
        Ok(())
    }

    /// Borrow an output of the last completed run as a typed view.
    pub fn output(&self, index: usize) -> Result<TensorView<'_>> {
        if self.report.is_none() {
            return Err(InterpreterError::NotInvoked);
        }
        let infos = self.model.output_info();
        let info = infos.get(index).ok_or(InterpreterError::IndexOutOfRange {
            kind: IoKind::Output,
            index,
            count: infos.len(),
        })?;
        let view = TensorView::new(
            info.elem_type,
            info.shape.clone(),
            info.quant,
            self.ofm[index].as_slice(),
        )?;
        Ok(view)
    }

    /// Event counts from the last completed run, slot for slot with the
    /// configured `pmu_events`. Unconfigured slots read as zero.
    pub fn pmu_counters(&self) -> Result<[u32; PMU_EVENT_SLOTS]> {
        self.report
            .map(|r| r.pmu_counters)
            .ok_or(InterpreterError::NotInvoked)
    }

    /// Cycle count from the last completed run, zero unless enabled.
    pub fn cycle_counter(&self) -> Result<u64> {
        self.report
            .map(|r| r.cycle_count)
            .ok_or(InterpreterError::NotInvoked)
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        self.device.release_network(self.network);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use nr_device::{DeviceError, EmulatedDevice};
    use nr_model::{quantized_classifier, ModelError};
    use nr_tensor::{ElemType, Shape};

    fn write_model(classes: usize) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&quantized_classifier(classes)).unwrap();
        f.flush().unwrap();
        f
    }

    fn input_view(bytes: &[u8]) -> TensorView<'_> {
        TensorView::from_u8(Shape::from_slice(&[1, 224, 224, 3]), None, bytes).unwrap()
    }

    fn ready_interpreter(seed: u64) -> (Arc<EmulatedDevice>, Interpreter) {
        let f = write_model(10);
        let device = Arc::new(EmulatedDevice::with_seed(seed));
        let interp = Interpreter::from_file(device.clone(), f.path()).unwrap();
        (device, interp)
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let device = Arc::new(EmulatedDevice::new());
        let err = Interpreter::from_file(device, Path::new("/no/such/model.tflite")).unwrap_err();
        assert!(matches!(err, InterpreterError::Load(ModelError::Io(_))));
    }

    #[test]
    fn test_rejecting_device_fails_construction() {
        let f = write_model(10);
        let device = Arc::new(EmulatedDevice::new().reject_networks());
        let err = Interpreter::from_file(device, f.path()).unwrap_err();
        assert!(matches!(
            err,
            InterpreterError::Rejected(DeviceError::InvalidNetwork(_))
        ));
    }

    #[test]
    fn test_descriptors_come_from_model() {
        let (_device, interp) = ready_interpreter(0);
        assert_eq!(interp.input_info().len(), 1);
        assert_eq!(interp.input_info()[0].elem_type, ElemType::U8);
        assert_eq!(interp.input_info()[0].shape.dims(), &[1, 224, 224, 3]);
        assert_eq!(interp.output_info().len(), 1);
        assert_eq!(interp.output_info()[0].shape.dims(), &[1, 10]);
        assert!(interp.output_info()[0].quant.is_some());
    }

    #[test]
    fn test_set_input_index_out_of_range() {
        let (_device, mut interp) = ready_interpreter(0);
        let data = vec![0u8; 150_528];
        let err = interp.set_input(1, &input_view(&data)).unwrap_err();
        match err {
            InterpreterError::IndexOutOfRange { kind, index, count } => {
                assert_eq!(kind, IoKind::Input);
                assert_eq!(index, 1);
                assert_eq!(count, 1);
            }
            other => panic!("expected IndexOutOfRange, got {other:?}"),
        }
    }

    #[test]
    fn test_set_input_elem_type_mismatch() {
        let (_device, mut interp) = ready_interpreter(0);
        let data = vec![0u8; 150_528];
        let view = TensorView::new(
            ElemType::I8,
            Shape::from_slice(&[1, 224, 224, 3]),
            None,
            &data,
        )
        .unwrap();
        let err = interp.set_input(0, &view).unwrap_err();
        assert!(matches!(
            err,
            InterpreterError::ElemTypeMismatch {
                index: 0,
                expected: ElemType::U8,
                got: ElemType::I8,
            }
        ));
    }

    #[test]
    fn test_set_input_shape_mismatch() {
        let (_device, mut interp) = ready_interpreter(0);
        let data = vec![0u8; 224 * 224 * 3];
        let view =
            TensorView::from_u8(Shape::from_slice(&[224, 224, 3]), None, &data).unwrap();
        let err = interp.set_input(0, &view).unwrap_err();
        match err {
            InterpreterError::ShapeMismatch { index, expected, got } => {
                assert_eq!(index, 0);
                assert_eq!(expected.dims(), &[1, 224, 224, 3]);
                assert_eq!(got.dims(), &[224, 224, 3]);
            }
            other => panic!("expected ShapeMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_invoke_without_input() {
        let (_device, mut interp) = ready_interpreter(0);
        let err = interp.invoke().unwrap_err();
        assert!(matches!(err, InterpreterError::InputNotSet { index: 0 }));
    }

    #[test]
    fn test_invoke_and_read_output() {
        let data = vec![7u8; 150_528];

        let (_da, mut a) = ready_interpreter(42);
        a.set_input(0, &input_view(&data)).unwrap();
        a.invoke().unwrap();
        let out_a = a.output(0).unwrap();
        assert_eq!(out_a.elem_type(), ElemType::U8);
        assert_eq!(out_a.shape().dims(), &[1, 10]);
        assert_eq!(out_a.bytes().len(), 10);
        let scores_a = out_a.to_f32();
        assert_eq!(scores_a.len(), 10);
        // Dequantized through scale 1/255, zero point 0.
        assert!(scores_a.iter().all(|&s| (0.0..=1.0).contains(&s)));

        // A second interpreter on a same-seed device reproduces the run.
        let (_db, mut b) = ready_interpreter(42);
        b.set_input(0, &input_view(&data)).unwrap();
        b.invoke().unwrap();
        assert_eq!(a.output(0).unwrap().bytes(), b.output(0).unwrap().bytes());
    }

    #[test]
    fn test_output_index_out_of_range() {
        let (_device, mut interp) = ready_interpreter(0);
        let data = vec![0u8; 150_528];
        interp.set_input(0, &input_view(&data)).unwrap();
        interp.invoke().unwrap();
        let err = interp.output(3).unwrap_err();
        assert!(matches!(
            err,
            InterpreterError::IndexOutOfRange {
                kind: IoKind::Output,
                index: 3,
                count: 1,
            }
        ));
    }

    #[test]
    fn test_output_before_invoke() {
        let (_device, interp) = ready_interpreter(0);
        assert!(matches!(
            interp.output(0).unwrap_err(),
            InterpreterError::NotInvoked
        ));
        assert!(matches!(
            interp.pmu_counters().unwrap_err(),
            InterpreterError::NotInvoked
        ));
        assert!(matches!(
            interp.cycle_counter().unwrap_err(),
            InterpreterError::NotInvoked
        ));
    }

    #[test]
    fn test_reinvoke_requires_rebinding() {
        let (_device, mut interp) = ready_interpreter(0);
        let data = vec![1u8; 150_528];
        interp.set_input(0, &input_view(&data)).unwrap();
        interp.invoke().unwrap();

        // The first run consumed the binding.
        let err = interp.invoke().unwrap_err();
        assert!(matches!(err, InterpreterError::InputNotSet { index: 0 }));
        // And the failed attempt invalidated the earlier results.
        assert!(matches!(
            interp.output(0).unwrap_err(),
            InterpreterError::NotInvoked
        ));

        interp.set_input(0, &input_view(&data)).unwrap();
        interp.invoke().unwrap();
        assert!(interp.output(0).is_ok());
    }

    #[test]
    fn test_fault_invalidates_outputs() {
        let (device, mut interp) = ready_interpreter(0);
        let data = vec![2u8; 150_528];
        interp.set_input(0, &input_view(&data)).unwrap();
        interp.invoke().unwrap();
        assert!(interp.output(0).is_ok());

        device.inject_fault("watchdog reset");
        interp.set_input(0, &input_view(&data)).unwrap();
        let err = interp.invoke().unwrap_err();
        assert!(matches!(
            err,
            InterpreterError::Execution(DeviceError::Fault(_))
        ));
        assert!(matches!(
            interp.output(0).unwrap_err(),
            InterpreterError::NotInvoked
        ));
    }

    #[test]
    fn test_timeout_maps_to_execution() {
        let f = write_model(10);
        let device = Arc::new(EmulatedDevice::new().latency(Duration::from_secs(5)));
        let options = InterpreterOptions {
            timeout: Duration::from_millis(20),
            ..InterpreterOptions::default()
        };
        let mut interp = Interpreter::with_options(device, f.path(), options).unwrap();
        let data = vec![0u8; 150_528];
        interp.set_input(0, &input_view(&data)).unwrap();
        let err = interp.invoke().unwrap_err();
        assert!(matches!(
            err,
            InterpreterError::Execution(DeviceError::Timeout { .. })
        ));
    }

    #[test]
    fn test_device_capabilities_passthrough() {
        let (_device, interp) = ready_interpreter(0);
        let caps = interp.device_capabilities().unwrap();
        assert_eq!(caps.hw_cfg.macs_per_cc, 128);
        assert_eq!(caps.driver_major_rev, 1);
    }

    #[test]
    fn test_drop_releases_network() {
        let f = write_model(10);
        let device = Arc::new(EmulatedDevice::new());
        let interp = Interpreter::from_file(device.clone(), f.path()).unwrap();
        assert_eq!(device.registered_count(), 1);
        drop(interp);
        assert_eq!(device.registered_count(), 0);
    }

    #[test]
    fn test_pmu_counters_follow_options() {
        let f = write_model(10);
        let device = Arc::new(EmulatedDevice::with_seed(9));
        let options = InterpreterOptions {
            pmu_events: [3, 0, 0, 0],
            cycle_counter: true,
            ..InterpreterOptions::default()
        };
        let mut interp = Interpreter::with_options(device, f.path(), options).unwrap();
        let data = vec![5u8; 150_528];
        interp.set_input(0, &input_view(&data)).unwrap();
        interp.invoke().unwrap();

        let counters = interp.pmu_counters().unwrap();
        assert_ne!(counters[0], 0);
        assert_eq!(&counters[1..], &[0, 0, 0]);
        assert!(interp.cycle_counter().unwrap() > 0);
    }
}
