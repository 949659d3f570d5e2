//! Legion EC control core
//!
//! Library behind `legiond`: exposes Lenovo Legion laptop hardware (thermal
//! modes, fan control, power limits, RGB lighting) through the two
//! low-bandwidth channels the platform offers, a polled two-port EC bus and
//! firmware method calls.
//!
//! # Module structure
//!
//! - `ec/` - port I/O primitive, polled bus protocol, exclusive session,
//!   register tables, simulated EC
//! - `acpi` - firmware method invocation (`acpi_call`), simulated firmware
//! - `generation` / `capability` - board classification and per-generation
//!   feature resolution with runtime probing
//! - `device` / `modes` - owned device handle, cached state, gated mode
//!   operations with their write cascades
//! - `monitor` - background telemetry loop with emergency cooling
//! - `attrs` / `config` - attribute surface for external glue, daemon
//!   configuration
//!
//! # Example
//!
//! ```no_run
//! use lgn_core::{LegionDevice, PerformanceMode};
//!
//! let device = LegionDevice::attach_host().unwrap();
//! device.modes().set_performance_mode(PerformanceMode::Balanced).unwrap();
//! ```

pub mod acpi;
pub mod attrs;
pub mod capability;
pub mod config;
pub mod constants;
pub mod device;
pub mod ec;
pub mod generation;
pub mod modes;
pub mod monitor;

#[cfg(test)]
pub mod test_utils;

// Re-export primary types
pub use acpi::{AcpiCallInvoker, MethodInvoker, SimulatedFirmware, QUERY_ARG};
pub use capability::{Backend, CapabilitySet, Feature, MethodTable};
pub use config::DaemonConfig;
pub use device::{DeviceState, DeviceStatus, LegionDevice, Telemetry};
pub use ec::{DevPortIo, EcSession, EcStatistics, PortIo, PortTransport, Register, RegisterMap, SimulatedPort, ValueDomain};
pub use generation::Generation;
pub use modes::{Fan, ModeController, PerformanceMode, RgbColor, RgbMode, ThermalMode};
pub use monitor::{MonitorConfig, MonitorHandle};

// Re-export error types
pub use lgn_error::{LegionError, Result};
