//! Static logical register table
//!
//! Maps logical register names to EC addresses and value domains. The table
//! is compiled in and never mutated; which slice of it applies to a device
//! is decided once per attach by generation. Addresses follow the Gen 9 EC
//! layout; older boards expose only the sensor and power-limit portion and
//! route mode selectors through firmware methods instead.

use crate::generation::Generation;

/// Logical EC registers used by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    PerformanceMode,
    ThermalMode,
    Fan1Speed,
    Fan2Speed,
    Fan1Target,
    Fan2Target,
    FanCurveCpu,
    CpuPl1,
    CpuPl2,
    GpuTgp,
    VaporChamberMode,
    CpuPackageTemp,
    GpuTemp,
    GpuHotspot,
    RgbMode,
    RgbBrightness,
    RgbZone1Color,
    RgbZone2Color,
    RgbZone3Color,
    RgbZone4Color,
}

/// How the byte in a register is to be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueDomain {
    /// Plain unsigned byte (watts, percent, aggressiveness level)
    RawByte,
    /// Signed degrees Celsius
    SignedTemp,
    /// Zone color latch: accepts three sequential byte writes (r, g, b)
    PackedRgb,
    /// Small enumerated selector
    EnumMode,
}

#[derive(Debug, Clone, Copy)]
pub struct RegisterInfo {
    pub register: Register,
    pub name: &'static str,
    pub addr: u8,
    pub domain: ValueDomain,
}

const fn info(register: Register, name: &'static str, addr: u8, domain: ValueDomain) -> RegisterInfo {
    RegisterInfo { register, name, addr, domain }
}

/// Sensors present on every supported board, including ones we cannot
/// otherwise identify: reads are harmless and telemetry should keep working.
const SENSOR_REGISTERS: &[RegisterInfo] = &[
    info(Register::Fan1Speed, "fan1_speed", 0xB0, ValueDomain::RawByte),
    info(Register::Fan2Speed, "fan2_speed", 0xB1, ValueDomain::RawByte),
    info(Register::CpuPackageTemp, "cpu_temp", 0xE0, ValueDomain::SignedTemp),
    info(Register::GpuTemp, "gpu_temp", 0xE2, ValueDomain::SignedTemp),
    info(Register::GpuHotspot, "gpu_hotspot", 0xE3, ValueDomain::SignedTemp),
];

/// Actuators shared by all identified generations.
const ACTUATOR_REGISTERS: &[RegisterInfo] = &[
    info(Register::Fan1Target, "fan1_target", 0xB2, ValueDomain::RawByte),
    info(Register::Fan2Target, "fan2_target", 0xB3, ValueDomain::RawByte),
    info(Register::CpuPl1, "cpu_pl1", 0xC0, ValueDomain::RawByte),
    info(Register::CpuPl2, "cpu_pl2", 0xC1, ValueDomain::RawByte),
    info(Register::GpuTgp, "gpu_tgp", 0xC4, ValueDomain::RawByte),
];

/// Mode selectors and RGB moved into the EC register file with Gen 8.
const MODERN_REGISTERS: &[RegisterInfo] = &[
    info(Register::PerformanceMode, "performance_mode", 0xA0, ValueDomain::EnumMode),
    info(Register::ThermalMode, "thermal_mode", 0xA2, ValueDomain::EnumMode),
    info(Register::FanCurveCpu, "fan_curve_cpu", 0xB4, ValueDomain::RawByte),
    info(Register::RgbMode, "rgb_mode", 0xF0, ValueDomain::EnumMode),
    info(Register::RgbBrightness, "rgb_brightness", 0xF1, ValueDomain::RawByte),
    info(Register::RgbZone1Color, "rgb_zone1_color", 0xF3, ValueDomain::PackedRgb),
    info(Register::RgbZone2Color, "rgb_zone2_color", 0xF4, ValueDomain::PackedRgb),
    info(Register::RgbZone3Color, "rgb_zone3_color", 0xF5, ValueDomain::PackedRgb),
    info(Register::RgbZone4Color, "rgb_zone4_color", 0xF6, ValueDomain::PackedRgb),
];

/// Gen 9 vapor-chamber control hint.
const GEN9_REGISTERS: &[RegisterInfo] = &[
    info(Register::VaporChamberMode, "vapor_chamber_mode", 0xD3, ValueDomain::RawByte),
];

/// The register subset visible to one device, selected by generation.
#[derive(Debug, Clone, Copy)]
pub struct RegisterMap {
    slices: &'static [&'static [RegisterInfo]],
}

impl RegisterMap {
    pub fn for_generation(gen: Generation) -> Self {
        let slices: &'static [&'static [RegisterInfo]] = match gen {
            Generation::Unknown => &[SENSOR_REGISTERS],
            Generation::Gen6 | Generation::Gen7 => &[SENSOR_REGISTERS, ACTUATOR_REGISTERS],
            Generation::Gen8 => &[SENSOR_REGISTERS, ACTUATOR_REGISTERS, MODERN_REGISTERS],
            Generation::Gen9 => &[
                SENSOR_REGISTERS,
                ACTUATOR_REGISTERS,
                MODERN_REGISTERS,
                GEN9_REGISTERS,
            ],
        };
        Self { slices }
    }

    pub fn lookup(&self, register: Register) -> Option<&'static RegisterInfo> {
        self.slices
            .iter()
            .flat_map(|s| s.iter())
            .find(|i| i.register == register)
    }

    pub fn addr(&self, register: Register) -> Option<u8> {
        self.lookup(register).map(|i| i.addr)
    }

    pub fn contains(&self, register: Register) -> bool {
        self.lookup(register).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static RegisterInfo> + '_ {
        self.slices.iter().flat_map(|s| s.iter())
    }
}

/// Canonical name of a register, independent of any generation's subset.
pub fn canonical_name(register: Register) -> &'static str {
    [SENSOR_REGISTERS, ACTUATOR_REGISTERS, MODERN_REGISTERS, GEN9_REGISTERS]
        .iter()
        .flat_map(|s| s.iter())
        .find(|i| i.register == register)
        .map(|i| i.name)
        .unwrap_or("unknown_register")
}

/// Temperature registers hold signed degrees Celsius in one byte.
pub fn decode_temp(raw: u8) -> i16 {
    i16::from(raw as i8)
}

/// Fan tachometer registers hold speed in units of 100 RPM.
pub fn decode_fan_rpm(raw: u8) -> u32 {
    u32::from(raw) * 100
}
