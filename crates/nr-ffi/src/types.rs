use nr_device::Capabilities;

/// Status codes returned by all FFI functions.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NpuStatus {
    Ok = 0,
    ErrorInvalidArgument = 1,
    ErrorModelLoad = 2,
    ErrorIndex = 3,
    ErrorShape = 4,
    ErrorExecution = 5,
    ErrorState = 6,
    ErrorInternal = 7,
}

/// Options for interpreter creation.
#[repr(C)]
#[derive(Debug, Clone)]
pub struct NpuOptions {
    /// Invoke deadline in nanoseconds; zero or negative selects the
    /// default of 60 seconds.
    pub timeout_nanos: i64,
    /// Seed for the emulated device's deterministic outputs.
    pub seed: u64,
    /// Performance monitor event per counter slot; zero disables a slot.
    pub pmu_events: [u32; 4],
    /// Capture the cycle counter during each invoke.
    pub enable_cycle_counter: bool,
}

impl Default for NpuOptions {
    fn default() -> Self {
        Self {
            timeout_nanos: 60_000_000_000,
            seed: 0,
            pmu_events: [0; 4],
            enable_cycle_counter: false,
        }
    }
}

/// Hardware and driver capability report, flattened for C consumers.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NpuCapabilities {
    pub version_status: u32,
    pub version_major: u32,
    pub version_minor: u32,
    pub product_major: u32,
    pub arch_major_rev: u32,
    pub arch_minor_rev: u32,
    pub arch_patch_rev: u32,
    pub macs_per_cc: u32,
    pub cmd_stream_version: u32,
    pub custom_dma: bool,
    pub driver_major_rev: u32,
    pub driver_minor_rev: u32,
    pub driver_patch_rev: u32,
}

impl From<&Capabilities> for NpuCapabilities {
    fn from(caps: &Capabilities) -> Self {
        Self {
            version_status: caps.hw_id.version_status,
            version_major: caps.hw_id.version_major,
            version_minor: caps.hw_id.version_minor,
            product_major: caps.hw_id.product_major,
            arch_major_rev: caps.hw_id.arch_major_rev,
            arch_minor_rev: caps.hw_id.arch_minor_rev,
            arch_patch_rev: caps.hw_id.arch_patch_rev,
            macs_per_cc: caps.hw_cfg.macs_per_cc,
            cmd_stream_version: caps.hw_cfg.cmd_stream_version,
            custom_dma: caps.hw_cfg.custom_dma,
            driver_major_rev: caps.driver_major_rev,
            driver_minor_rev: caps.driver_minor_rev,
            driver_patch_rev: caps.driver_patch_rev,
        }
    }
}
