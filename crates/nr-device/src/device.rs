use std::fmt;
use std::time::Duration;

use nr_tensor::HostBuffer;

use crate::capabilities::Capabilities;
use crate::error::Result;

/// Number of event counter slots in the device performance monitor.
pub const PMU_EVENT_SLOTS: usize = 4;

/// Upper bound on input or output buffers attached to one inference.
pub const MAX_IO_BUFFERS: usize = 16;

/// Performance monitor setup for a single inference.
///
/// Each slot names an event type to count; a zero event leaves the slot
/// disabled and its counter reads back as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PmuConfig {
    pub events: [u32; PMU_EVENT_SLOTS],
    /// Also capture the free-running cycle counter.
    pub cycle_counter: bool,
}

/// Counter values captured while an inference ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InferenceReport {
    /// Event counts, slot for slot with the configured events.
    pub pmu_counters: [u32; PMU_EVENT_SLOTS],
    /// Cycle count, zero unless the cycle counter was enabled.
    pub cycle_count: u64,
}

/// Identifier for a network registered with a device.
///
/// Valid only against the device that issued it, and only until the
/// network is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkHandle(pub u64);

/// Whether a buffer feeds an inference or receives its results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoKind {
    Input,
    Output,
}

impl fmt::Display for IoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoKind::Input => write!(f, "input"),
            IoKind::Output => write!(f, "output"),
        }
    }
}

/// Dispatch interface to an inference accelerator.
///
/// A network is registered once and may then back any number of
/// inferences. Implementations are shared across threads, so every
/// operation takes `&self`.
pub trait Device: Send + Sync {
    /// Short backend name for logs and diagnostics.
    fn name(&self) -> &str;

    /// Query hardware identity, configuration, and driver revision.
    fn capabilities(&self) -> Result<Capabilities>;

    /// Upload a compiled network, returning a handle for inferences.
    fn register_network(&self, network: &[u8]) -> Result<NetworkHandle>;

    /// Drop a registered network. Unknown handles are ignored.
    fn release_network(&self, handle: NetworkHandle);

    /// Run one inference: consume the input feature maps, fill the output
    /// feature map buffers, and report the configured counters.
    ///
    /// Fails with `Timeout` if the inference does not complete within
    /// `timeout`; the output buffers hold no meaningful data after any
    /// failure.
    fn run_inference(
        &self,
        handle: NetworkHandle,
        ifm: &[&[u8]],
        ofm: &mut [HostBuffer],
        pmu: &PmuConfig,
        timeout: Duration,
    ) -> Result<InferenceReport>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_kind_display() {
        assert_eq!(IoKind::Input.to_string(), "input");
        assert_eq!(IoKind::Output.to_string(), "output");
    }

    #[test]
    fn test_pmu_config_default_is_disabled() {
        let pmu = PmuConfig::default();
        assert_eq!(pmu.events, [0; PMU_EVENT_SLOTS]);
        assert!(!pmu.cycle_counter);
    }
}
