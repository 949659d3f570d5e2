//! Generation capability resolution
//!
//! One table keyed by generation maps each logical feature to its backend:
//! a firmware method name, an EC register, or absent. Gen 6/7 boards route
//! mode selectors through firmware methods; Gen 8/9 moved them into the EC
//! register file and kept methods for the battery, charge and fn-lock
//! switches.
//!
//! A feature is usable only if the table lists a backend AND the backend was
//! confirmed on the live device: method backends are existence-probed
//! through the invoker, register backends are chip-bus-resident and assumed
//! present when the generation's register map carries them. Resolution runs
//! exactly once per attach; probing firmware on every access would be
//! prohibitively slow on this bus.

use serde::Serialize;
use tracing::{debug, warn};

use crate::acpi::MethodInvoker;
use crate::ec::registers::{Register, RegisterMap};
use crate::generation::Generation;

/// Logical features the driver can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    ThermalMode,
    LegionMode,
    BatteryConservation,
    RapidCharge,
    FnLock,
    RgbControl,
    FanCurve,
    Overclock,
}

impl Feature {
    pub const ALL: [Feature; 8] = [
        Feature::ThermalMode,
        Feature::LegionMode,
        Feature::BatteryConservation,
        Feature::RapidCharge,
        Feature::FnLock,
        Feature::RgbControl,
        Feature::FanCurve,
        Feature::Overclock,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Feature::ThermalMode => "thermal_mode",
            Feature::LegionMode => "legion_mode",
            Feature::BatteryConservation => "battery_conservation",
            Feature::RapidCharge => "rapid_charge",
            Feature::FnLock => "fn_lock",
            Feature::RgbControl => "rgb_control",
            Feature::FanCurve => "fan_curve",
            Feature::Overclock => "overclock",
        }
    }
}

/// What implements a feature on a given generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Method(&'static str),
    Register(Register),
    Absent,
}

/// Per-generation feature table. Absent entries are an expected state,
/// not an error.
#[derive(Debug, Clone, Copy)]
pub struct MethodTable {
    entries: [(Feature, Backend); 8],
}

impl MethodTable {
    pub fn for_generation(gen: Generation) -> Self {
        use Backend::{Absent, Method, Register as Reg};
        let entries = match gen {
            Generation::Gen6 => [
                (Feature::ThermalMode, Method("SPMO")),
                (Feature::LegionMode, Method("SLMO")),
                (Feature::BatteryConservation, Method("SBCM")),
                (Feature::RapidCharge, Method("QCHO")),
                (Feature::FnLock, Method("SFLM")),
                (Feature::RgbControl, Method("WMI1")),
                (Feature::FanCurve, Method("GFAN")),
                (Feature::Overclock, Absent),
            ],
            Generation::Gen7 => [
                (Feature::ThermalMode, Method("SPMO")),
                (Feature::LegionMode, Method("SLMO")),
                (Feature::BatteryConservation, Method("SBCM")),
                (Feature::RapidCharge, Method("QCHO")),
                (Feature::FnLock, Method("SFLM")),
                (Feature::RgbControl, Method("WMI2")),
                (Feature::FanCurve, Method("GFAN")),
                (Feature::Overclock, Method("OCGS")),
            ],
            Generation::Gen8 | Generation::Gen9 => [
                (Feature::ThermalMode, Reg(Register::ThermalMode)),
                (Feature::LegionMode, Reg(Register::PerformanceMode)),
                (Feature::BatteryConservation, Method("SBCM")),
                (Feature::RapidCharge, Method("QCHO")),
                (Feature::FnLock, Method("SFLM")),
                (Feature::RgbControl, Reg(Register::RgbMode)),
                (Feature::FanCurve, Reg(Register::FanCurveCpu)),
                (Feature::Overclock, Method("OCGS")),
            ],
            Generation::Unknown => [
                (Feature::ThermalMode, Absent),
                (Feature::LegionMode, Absent),
                (Feature::BatteryConservation, Absent),
                (Feature::RapidCharge, Absent),
                (Feature::FnLock, Absent),
                (Feature::RgbControl, Absent),
                (Feature::FanCurve, Absent),
                (Feature::Overclock, Absent),
            ],
        };
        Self { entries }
    }

    pub fn backend(&self, feature: Feature) -> Backend {
        self.entries
            .iter()
            .find(|(f, _)| *f == feature)
            .map(|(_, b)| *b)
            .unwrap_or(Backend::Absent)
    }
}

/// Boolean per feature, derived from the table plus runtime probing.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CapabilitySet {
    flags: [bool; 8],
}

impl CapabilitySet {
    pub fn has(&self, feature: Feature) -> bool {
        self.flags[feature as usize]
    }

    fn set(&mut self, feature: Feature, value: bool) {
        self.flags[feature as usize] = value;
    }

    /// `name:0/1` pairs for the status surface.
    pub fn summary(&self) -> String {
        Feature::ALL
            .iter()
            .map(|f| format!("{}:{}", f.name(), u8::from(self.has(*f))))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Resolve the capability set for a device. Runs once at attach.
pub fn resolve(
    gen: Generation,
    table: &MethodTable,
    registers: &RegisterMap,
    invoker: &dyn MethodInvoker,
) -> CapabilitySet {
    if gen == Generation::Unknown {
        warn!("unrecognized board: all feature capabilities disabled, telemetry only");
        return CapabilitySet::default();
    }

    let mut caps = CapabilitySet::default();
    for feature in Feature::ALL {
        let usable = match table.backend(feature) {
            Backend::Absent => false,
            Backend::Register(reg) => registers.contains(reg),
            Backend::Method(name) => {
                let present = invoker.exists(name);
                if !present {
                    debug!(feature = feature.name(), method = name, "firmware method missing, feature disabled");
                }
                present
            }
        };
        caps.set(feature, usable);
    }
    debug!(generation = %gen, caps = %caps.summary(), "capabilities resolved");
    caps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acpi::MockMethodInvoker;

    fn resolve_for(gen: Generation, invoker: &dyn MethodInvoker) -> CapabilitySet {
        let table = MethodTable::for_generation(gen);
        let registers = RegisterMap::for_generation(gen);
        resolve(gen, &table, &registers, invoker)
    }

    #[test]
    fn absent_table_entries_never_become_capabilities() {
        // Firmware that happily reports every method as present must not
        // resurrect a feature the generation table does not list.
        let mut invoker = MockMethodInvoker::new();
        invoker.expect_exists().return_const(true);
        let caps = resolve_for(Generation::Gen6, &invoker);
        assert!(!caps.has(Feature::Overclock));
        assert!(caps.has(Feature::ThermalMode));
    }

    #[test]
    fn failed_probe_disables_the_feature() {
        let mut invoker = MockMethodInvoker::new();
        invoker
            .expect_exists()
            .returning(|method| method != "SFLM");
        let caps = resolve_for(Generation::Gen7, &invoker);
        assert!(!caps.has(Feature::FnLock));
        assert!(caps.has(Feature::RapidCharge));
    }

    #[test]
    fn register_backends_skip_probing() {
        // Gen 9 mode selectors are register-backed: no exists() call may be
        // issued for them, only for the method-backed switches.
        let mut invoker = MockMethodInvoker::new();
        invoker
            .expect_exists()
            .withf(|m| matches!(m, "SBCM" | "QCHO" | "SFLM" | "OCGS"))
            .return_const(true);
        let caps = resolve_for(Generation::Gen9, &invoker);
        assert!(caps.has(Feature::LegionMode));
        assert!(caps.has(Feature::RgbControl));
        assert!(caps.has(Feature::FanCurve));
    }

    #[test]
    fn unknown_generation_disables_everything_without_probing() {
        let invoker = MockMethodInvoker::new();
        let caps = resolve_for(Generation::Unknown, &invoker);
        for feature in Feature::ALL {
            assert!(!caps.has(feature), "{} leaked through", feature.name());
        }
    }

    #[test]
    fn summary_lists_all_features() {
        let caps = CapabilitySet::default();
        let summary = caps.summary();
        for feature in Feature::ALL {
            assert!(summary.contains(feature.name()));
        }
    }
}
