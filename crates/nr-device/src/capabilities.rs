use std::fmt;

/// Hardware identity registers reported by the accelerator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwareId {
    pub version_status: u32,
    pub version_major: u32,
    pub version_minor: u32,
    /// Product family discriminator.
    pub product_major: u32,
    pub arch_major_rev: u32,
    pub arch_minor_rev: u32,
    pub arch_patch_rev: u32,
}

/// Build-time hardware configuration of the accelerator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwareConfig {
    /// Multiply-accumulate units per clock cycle.
    pub macs_per_cc: u32,
    /// Highest command stream version the device executes.
    pub cmd_stream_version: u32,
    /// Whether the device has its own DMA engine.
    pub custom_dma: bool,
}

/// Capability report for a device: hardware identity and configuration
/// plus the revision of the driver stack answering for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub hw_id: HardwareId,
    pub hw_cfg: HardwareConfig,
    pub driver_major_rev: u32,
    pub driver_minor_rev: u32,
    pub driver_patch_rev: u32,
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arch {}.{}.{}, {} MACs/cc, cmd stream v{}, driver {}.{}.{}",
            self.hw_id.arch_major_rev,
            self.hw_id.arch_minor_rev,
            self.hw_id.arch_patch_rev,
            self.hw_cfg.macs_per_cc,
            self.hw_cfg.cmd_stream_version,
            self.driver_major_rev,
            self.driver_minor_rev,
            self.driver_patch_rev,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let caps = Capabilities {
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
        };
        assert_eq!(
            caps.to_string(),
            "arch 1.0.6, 128 MACs/cc, cmd stream v0, driver 1.0.0"
        );
    }
}
