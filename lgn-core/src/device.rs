//! Owned device handle and cached state
//!
//! `LegionDevice` is an explicitly owned handle passed to every operation:
//! no process-wide singleton, so teardown ordering is a visible contract
//! (stop the monitor, then drop the device). It bundles the EC session, the
//! firmware invoker, the generation's register/method tables and the
//! resolved capability set, all fixed at attach time, plus the mutable
//! cached state shared with the background monitor.
//!
//! Cached fields are best-effort telemetry: they are written under the
//! state lock by whoever just completed the corresponding EC transaction,
//! and readers of the status surface accept values that are stale between
//! monitor ticks.

use std::time::SystemTime;

use lgn_error::{LegionError, Result};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use crate::acpi::{AcpiCallInvoker, MethodInvoker, QUERY_ARG};
use crate::capability::{self, Backend, CapabilitySet, Feature, MethodTable};
use crate::ec::portio::{DevPortIo, PortIo};
use crate::ec::registers::{canonical_name, decode_fan_rpm, decode_temp, Register, RegisterMap};
use crate::ec::session::{EcSession, EcStatistics};
use crate::generation::{self, Generation};
use crate::modes::{ModeController, PerformanceMode, RgbMode, ThermalMode};

/// Mutable per-device record. Last-known-good cache, possibly stale
/// relative to hardware until the next read-back.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeviceState {
    pub performance_mode: Option<PerformanceMode>,
    pub thermal_mode: Option<ThermalMode>,
    pub rgb_mode: Option<RgbMode>,
    pub rgb_brightness: Option<u8>,
    pub cpu_temp_c: Option<i16>,
    pub gpu_temp_c: Option<i16>,
    pub fan1_rpm: Option<u32>,
    pub fan2_rpm: Option<u32>,
    pub cpu_pl1_w: Option<u8>,
    pub cpu_pl2_w: Option<u8>,
    pub gpu_tgp_w: Option<u8>,
    pub battery_conservation: Option<bool>,
    pub rapid_charge: Option<bool>,
    pub fn_lock: Option<bool>,
    pub last_update: Option<SystemTime>,
}

/// One telemetry sample, as returned to the monitor.
#[derive(Debug, Clone, Copy, Default)]
pub struct Telemetry {
    pub cpu_temp_c: Option<i16>,
    pub gpu_temp_c: Option<i16>,
    pub fan1_rpm: Option<u32>,
    pub fan2_rpm: Option<u32>,
}

/// Read-only status snapshot for external reporting.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceStatus {
    pub generation: Generation,
    pub capabilities: String,
    pub ec: EcStatistics,
    pub state: DeviceState,
}

pub struct LegionDevice {
    generation: Generation,
    registers: RegisterMap,
    table: MethodTable,
    caps: CapabilitySet,
    session: EcSession,
    invoker: Box<dyn MethodInvoker>,
    state: Mutex<DeviceState>,
}

impl LegionDevice {
    /// Attach to a device over the given transports. Resolves capabilities
    /// once, then reads the initial hardware state into the cache
    /// (tolerating individual read failures, as not every register answers
    /// on every board).
    pub fn attach(
        io: Box<dyn PortIo>,
        invoker: Box<dyn MethodInvoker>,
        generation: Generation,
    ) -> Self {
        let registers = RegisterMap::for_generation(generation);
        let table = MethodTable::for_generation(generation);
        let caps = capability::resolve(generation, &table, &registers, invoker.as_ref());

        let device = Self {
            generation,
            registers,
            table,
            caps,
            session: EcSession::new(io),
            invoker,
            state: Mutex::new(DeviceState::default()),
        };
        info!(
            generation = %generation,
            caps = %device.caps.summary(),
            "legion device attached"
        );
        device.read_back_initial_state();
        device
    }

    /// Attach to the running machine: DMI classification, `/dev/port` EC
    /// access, `acpi_call` firmware access. Requires root.
    pub fn attach_host() -> Result<Self> {
        let generation = generation::detect();
        let io = DevPortIo::open().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LegionError::DeviceNotReady
            } else {
                LegionError::Io(e)
            }
        })?;
        let invoker = AcpiCallInvoker::new(generation.acpi_ec_node());
        Ok(Self::attach(Box::new(io), Box::new(invoker), generation))
    }

    fn read_back_initial_state(&self) {
        let modes = self.modes();
        let perf = modes.performance_mode().ok();
        let thermal = modes.thermal_mode().ok();
        let rgb = modes.rgb_mode().ok();
        let pl1 = self.read_register(Register::CpuPl1).ok();
        let pl2 = self.read_register(Register::CpuPl2).ok();
        let tgp = self.read_register(Register::GpuTgp).ok();

        let mut state = self.state.lock();
        state.performance_mode = perf;
        state.thermal_mode = thermal;
        state.rgb_mode = rgb;
        state.cpu_pl1_w = pl1;
        state.cpu_pl2_w = pl2;
        state.gpu_tgp_w = tgp;
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.caps
    }

    pub fn registers(&self) -> &RegisterMap {
        &self.registers
    }

    pub fn modes(&self) -> ModeController<'_> {
        ModeController::new(self)
    }

    /// Gate: reject with zero hardware access when the feature is off.
    pub fn require(&self, feature: Feature) -> Result<()> {
        if self.caps.has(feature) {
            Ok(())
        } else {
            Err(LegionError::CapabilityUnavailable(feature.name().to_string()))
        }
    }

    /// Read one logical register through the session. A register outside
    /// this generation's map rejects without touching hardware.
    pub fn read_register(&self, register: Register) -> Result<u8> {
        let info = self
            .registers
            .lookup(register)
            .ok_or_else(|| LegionError::capability(canonical_name(register)))?;
        self.session.read(info.addr, info.name)
    }

    /// Write one logical register through the session.
    pub fn write_register(&self, register: Register, value: u8) -> Result<()> {
        let info = self
            .registers
            .lookup(register)
            .ok_or_else(|| LegionError::capability(canonical_name(register)))?;
        self.session.write(info.addr, value, info.name)
    }

    /// Backend-dispatched feature access: firmware method on boards that
    /// route the feature through ACPI, EC register where it is
    /// register-backed. Callers gate with `require` first.
    pub fn feature_read(&self, feature: Feature) -> Result<i64> {
        match self.table.backend(feature) {
            Backend::Method(name) => self.invoker.invoke(name, QUERY_ARG),
            Backend::Register(reg) => self.read_register(reg).map(i64::from),
            Backend::Absent => Err(LegionError::CapabilityUnavailable(
                feature.name().to_string(),
            )),
        }
    }

    pub fn feature_write(&self, feature: Feature, value: i64) -> Result<()> {
        match self.table.backend(feature) {
            Backend::Method(name) => self.invoker.invoke(name, value).map(|_| ()),
            Backend::Register(reg) => self.write_register(reg, value as u8),
            Backend::Absent => Err(LegionError::CapabilityUnavailable(
                feature.name().to_string(),
            )),
        }
    }

    /// Update cached fields under the state lock.
    pub fn update_state(&self, apply: impl FnOnce(&mut DeviceState)) {
        let mut state = self.state.lock();
        apply(&mut state);
    }

    pub fn state_snapshot(&self) -> DeviceState {
        self.state.lock().clone()
    }

    /// Read temperatures and fan speeds, refreshing the cache and the
    /// last-update timestamp. Individual register failures leave the
    /// affected field untouched rather than failing the whole sample.
    pub fn sample_telemetry(&self) -> Telemetry {
        let sample = Telemetry {
            cpu_temp_c: self.read_register(Register::CpuPackageTemp).ok().map(decode_temp),
            gpu_temp_c: self.read_register(Register::GpuTemp).ok().map(decode_temp),
            fan1_rpm: self.read_register(Register::Fan1Speed).ok().map(decode_fan_rpm),
            fan2_rpm: self.read_register(Register::Fan2Speed).ok().map(decode_fan_rpm),
        };

        let mut state = self.state.lock();
        if sample.cpu_temp_c.is_some() {
            state.cpu_temp_c = sample.cpu_temp_c;
        }
        if sample.gpu_temp_c.is_some() {
            state.gpu_temp_c = sample.gpu_temp_c;
        }
        if sample.fan1_rpm.is_some() {
            state.fan1_rpm = sample.fan1_rpm;
        }
        if sample.fan2_rpm.is_some() {
            state.fan2_rpm = sample.fan2_rpm;
        }
        state.last_update = Some(SystemTime::now());
        drop(state);

        debug!(?sample, "telemetry sampled");
        sample
    }

    /// Read-only status surface: counters, capabilities, cached state.
    pub fn status(&self) -> DeviceStatus {
        DeviceStatus {
            generation: self.generation,
            capabilities: self.caps.summary(),
            ec: self.session.stats(),
            state: self.state_snapshot(),
        }
    }

    pub fn ec_stats(&self) -> EcStatistics {
        self.session.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{firmware_for, sim_device};

    #[test]
    fn attach_reads_back_initial_state() {
        let sim = crate::ec::sim::SimulatedPort::new();
        sim.preload(0xA0, 1); // balanced
        sim.preload(0xC0, 45);
        sim.preload(0xC1, 115);
        let device = LegionDevice::attach(
            Box::new(sim.clone()),
            Box::new(firmware_for(Generation::Gen9)),
            Generation::Gen9,
        );
        let state = device.state_snapshot();
        assert_eq!(state.performance_mode, Some(PerformanceMode::Balanced));
        assert_eq!(state.cpu_pl1_w, Some(45));
        assert_eq!(state.cpu_pl2_w, Some(115));
    }

    #[test]
    fn unknown_generation_attaches_for_telemetry_only() {
        let fw = firmware_for(Generation::Gen9);
        let sim = crate::ec::sim::SimulatedPort::new();
        sim.preload(0xE0, 70);
        let device = LegionDevice::attach(
            Box::new(sim.clone()),
            Box::new(fw),
            Generation::Unknown,
        );
        assert!(device.require(Feature::LegionMode).is_err());
        let sample = device.sample_telemetry();
        assert_eq!(sample.cpu_temp_c, Some(70));
        assert!(device.state_snapshot().last_update.is_some());
    }

    #[test]
    fn status_reports_counters_and_capabilities() {
        let (sim, _fw, device) = sim_device(Generation::Gen9);
        sim.preload(0xE0, 65);
        device.sample_telemetry();
        let status = device.status();
        assert!(status.ec.reads > 0);
        assert!(status.capabilities.contains("legion_mode:1"));
        assert_eq!(status.state.cpu_temp_c, Some(65));
    }
}
