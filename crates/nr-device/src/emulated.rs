use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::debug;

use nr_tensor::HostBuffer;

use crate::capabilities::{Capabilities, HardwareConfig, HardwareId};
use crate::device::{
    Device, InferenceReport, IoKind, NetworkHandle, PmuConfig, MAX_IO_BUFFERS,
};
use crate::error::{DeviceError, Result};

/// Software stand-in for an accelerator.
///
/// Output bytes are a pure function of the device seed, the network
/// handle, and the input feature maps, so runs are reproducible and
/// sensitive to their inputs. Latency, registration refusal, and one-shot
/// faults can be injected to exercise failure paths.
pub struct EmulatedDevice {
    seed: u64,
    latency: Duration,
    capabilities: Capabilities,
    reject: bool,
    state: Mutex<EmulatedState>,
}

#[derive(Default)]
struct EmulatedState {
    /// Registered networks, handle to blob length.
    networks: HashMap<u64, usize>,
    next_handle: u64,
    pending_fault: Option<String>,
}

impl EmulatedDevice {
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Create a device whose synthetic outputs derive from `seed`.
    pub fn with_seed(seed: u64) -> Self {
        EmulatedDevice {
            seed,
            latency: Duration::ZERO,
            capabilities: default_capabilities(),
            reject: false,
            state: Mutex::new(EmulatedState::default()),
        }
    }

    /// Make every inference take `latency` of wall-clock time.
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Override the reported hardware capabilities.
    pub fn hardware(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Refuse all network registrations.
    pub fn reject_networks(mut self) -> Self {
        self.reject = true;
        self
    }

    /// Make the next inference fail with a device fault.
    pub fn inject_fault(&self, message: &str) {
        self.state().pending_fault = Some(message.to_string());
    }

    /// Number of networks currently registered.
    pub fn registered_count(&self) -> usize {
        self.state().networks.len()
    }

    fn state(&self) -> MutexGuard<'_, EmulatedState> {
        // A panicking caller only poisons emulator bookkeeping; recover it.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Device for EmulatedDevice {
    fn name(&self) -> &str {
        "emulated"
    }

    fn capabilities(&self) -> Result<Capabilities> {
        Ok(self.capabilities)
    }

    fn register_network(&self, network: &[u8]) -> Result<NetworkHandle> {
        if self.reject {
            return Err(DeviceError::InvalidNetwork(
                "device refused the network".into(),
            ));
        }
        if network.len() < 8 {
            return Err(DeviceError::InvalidNetwork(format!(
                "network blob too short: {} bytes",
                network.len()
            )));
        }
        let mut state = self.state();
        state.next_handle += 1;
        let handle = state.next_handle;
        state.networks.insert(handle, network.len());
        debug!(handle, bytes = network.len(), "registered network");
        Ok(NetworkHandle(handle))
    }

    fn release_network(&self, handle: NetworkHandle) {
        if self.state().networks.remove(&handle.0).is_some() {
            debug!(handle = handle.0, "released network");
        }
    }

    fn run_inference(
        &self,
        handle: NetworkHandle,
        ifm: &[&[u8]],
        ofm: &mut [HostBuffer],
        pmu: &PmuConfig,
        timeout: Duration,
    ) -> Result<InferenceReport> {
        let network_len = *self
            .state()
            .networks
            .get(&handle.0)
            .ok_or(DeviceError::UnknownNetwork(handle.0))?;

        if ifm.len() > MAX_IO_BUFFERS {
            return Err(DeviceError::TooManyBuffers {
                kind: IoKind::Input,
                count: ifm.len(),
                limit: MAX_IO_BUFFERS,
            });
        }
        if ofm.len() > MAX_IO_BUFFERS {
            return Err(DeviceError::TooManyBuffers {
                kind: IoKind::Output,
                count: ofm.len(),
                limit: MAX_IO_BUFFERS,
            });
        }

        if let Some(message) = self.state().pending_fault.take() {
            return Err(DeviceError::Fault(message));
        }

        if self.latency > timeout {
            return Err(DeviceError::Timeout { waited: timeout });
        }
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }

        debug!(
            handle = handle.0,
            inputs = ifm.len(),
            outputs = ofm.len(),
            "running inference"
        );

        // FNV-1a over the concatenated inputs keeps the output a stable
        // function of what was actually fed in.
        let mut input_hash: u64 = 0xcbf2_9ce4_8422_2325;
        for buf in ifm {
            for &b in *buf {
                input_hash ^= u64::from(b);
                input_hash = input_hash.wrapping_mul(0x0100_0000_01b3);
            }
        }

        let mut rng = StdRng::seed_from_u64(self.seed ^ handle.0.rotate_left(17) ^ input_hash);
        let mut bytes_moved = network_len as u64;
        for buf in ifm {
            bytes_moved += buf.len() as u64;
        }
        for buf in ofm.iter_mut() {
            bytes_moved += buf.size() as u64;
            rng.fill_bytes(buf.as_mut_slice());
        }

        let mut report = InferenceReport::default();
        for (slot, &event) in pmu.events.iter().enumerate() {
            if event != 0 {
                report.pmu_counters[slot] = event_count(bytes_moved, event);
            }
        }
        if pmu.cycle_counter {
            let macs = u64::from(self.capabilities.hw_cfg.macs_per_cc.max(1));
            report.cycle_count = bytes_moved * 128 / macs + 1000;
        }
        Ok(report)
    }
}

fn default_capabilities() -> Capabilities {
    Capabilities {
        hw_id: HardwareId {
            version_status: 1,
            version_major: 1,
            version_minor: 0,
            product_major: 0,
            arch_major_rev: 1,
            arch_minor_rev: 0,
            arch_patch_rev: 6,
        },
        hw_cfg: HardwareConfig {
            macs_per_cc: 128,
            cmd_stream_version: 0,
            custom_dma: false,
        },
        driver_major_rev: 1,
        driver_minor_rev: 0,
        driver_patch_rev: 0,
    }
}

/// Synthetic but deterministic count for one configured event.
fn event_count(bytes_moved: u64, event: u32) -> u32 {
    let mixed = (bytes_moved ^ u64::from(event)).wrapping_mul(0x9e37_79b9_7f4a_7c15);
    (mixed >> 32) as u32
}
