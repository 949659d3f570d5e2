//! Constants and configuration values for the Legion EC stack
//!
//! Centralizes all magic numbers, paths, and configuration defaults.
//! This is the SINGLE SOURCE OF TRUTH for all configuration values.
//! Never use magic numbers in other files - add them here first.

use std::time::Duration;

/// EC bus addresses and protocol bytes
pub mod ec {
    /// Command/status port of the embedded controller
    pub const PORT_CMD: u16 = 0x66;

    /// Data port of the embedded controller
    pub const PORT_DATA: u16 = 0x62;

    /// Command byte: read one register
    pub const CMD_READ: u8 = 0x80;

    /// Command byte: write one register
    pub const CMD_WRITE: u8 = 0x81;

    /// Status bit that is set while the EC input buffer is full.
    /// The bus is idle when this bit reads 0.
    pub const STATUS_BUSY: u8 = 0x02;

    /// Maximum poll iterations per wait-for-idle phase
    pub const WAIT_ITERATIONS: u32 = 1000;

    /// Delay between idle polls. The wait is a busy-wait with short sleeps
    /// because the bus has no completion interrupt.
    pub const WAIT_POLL_DELAY: super::Duration = super::Duration::from_micros(10);

    /// Extra transaction attempts after the first failure
    pub const RETRY_LIMIT: u32 = 3;

    /// Backoff between transaction retries
    pub const RETRY_BACKOFF: super::Duration = super::Duration::from_millis(1);
}

/// Hardware-safe input ranges for tunable values
pub mod limits {
    /// CPU base power limit (PL1), watts
    pub const CPU_PL1_MIN: u8 = 15;
    pub const CPU_PL1_MAX: u8 = 55;

    /// CPU turbo power limit (PL2), watts
    pub const CPU_PL2_MIN: u8 = 55;
    pub const CPU_PL2_MAX: u8 = 140;

    /// GPU total graphics power, watts
    pub const GPU_TGP_MIN: u8 = 60;
    pub const GPU_TGP_MAX: u8 = 140;

    /// Fan target, percent of maximum speed
    pub const FAN_TARGET_MAX: u8 = 100;

    /// RGB brightness, percent
    pub const RGB_BRIGHTNESS_MAX: u8 = 100;
}

/// Monitor loop defaults
pub mod monitor {
    /// Interval between telemetry ticks
    pub const POLL_INTERVAL: super::Duration = super::Duration::from_secs(2);

    /// Sleep slice while waiting for the next tick, so a stop request is
    /// honored promptly instead of after a full interval.
    pub const STOP_POLL_SLICE: super::Duration = super::Duration::from_millis(50);

    /// CPU package temperature that triggers emergency cooling, °C
    pub const CPU_CRITICAL_C: i16 = 85;

    /// GPU core temperature that triggers emergency cooling, °C
    pub const GPU_CRITICAL_C: i16 = 80;
}

/// System paths
pub mod paths {
    /// Raw port I/O device used for EC bus access
    pub const DEV_PORT: &str = "/dev/port";

    /// acpi_call interface for firmware method invocation
    pub const ACPI_CALL: &str = "/proc/acpi/call";

    /// DMI product identification
    pub const DMI_PRODUCT_NAME: &str = "/sys/class/dmi/id/product_name";
    pub const DMI_PRODUCT_VERSION: &str = "/sys/class/dmi/id/product_version";

    /// Daemon configuration file
    pub const CONFIG_FILE: &str = "/etc/legiond/config.json";
}

/// ACPI namespace prefixes for the EC device node, per platform layout
pub mod acpi {
    /// Gen 6/7 boards expose the EC under PCI0
    pub const EC_NODE_LEGACY: &str = "\\_SB.PCI0.LPC0.EC0";

    /// Gen 8/9 boards renamed the root bridge to PC00
    pub const EC_NODE_MODERN: &str = "\\_SB.PC00.LPC0.EC0";
}
