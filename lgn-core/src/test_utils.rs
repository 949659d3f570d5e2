//! Shared test helpers
//!
//! Builders for simulated devices used across the unit tests. The simulated
//! port and firmware are `Clone` handles over shared state, so tests keep
//! one handle for scripting/assertions while the device owns the other.

use crate::acpi::SimulatedFirmware;
use crate::capability::{Backend, Feature, MethodTable};
use crate::device::LegionDevice;
use crate::ec::sim::SimulatedPort;
use crate::generation::Generation;

/// Firmware exposing every method the generation's table lists, each with
/// an initial value of 0.
pub fn firmware_for(gen: Generation) -> SimulatedFirmware {
    let fw = SimulatedFirmware::new();
    let table = MethodTable::for_generation(gen);
    for feature in Feature::ALL {
        if let Backend::Method(name) = table.backend(feature) {
            fw.provide(name, 0);
        }
    }
    fw
}

/// Fully wired simulated device: returns scripting handles plus the
/// attached device.
pub fn sim_device(gen: Generation) -> (SimulatedPort, SimulatedFirmware, LegionDevice) {
    let sim = SimulatedPort::new();
    let fw = firmware_for(gen);
    let device = LegionDevice::attach(Box::new(sim.clone()), Box::new(fw.clone()), gen);
    (sim, fw, device)
}
