//! Attribute surface
//!
//! The boundary external glue (sysfs shims, IPC, CLI) consumes: per logical
//! feature a readable current value and, where writable, a setter taking a
//! bounded numeric or enumerated token. Input is validated before any
//! hardware call, and the error distinguishes invalid input from hardware
//! failure from unsupported-on-this-device.

use lgn_error::{LegionError, Result};

use crate::capability::Feature;
use crate::device::LegionDevice;
use crate::ec::registers::{decode_fan_rpm, decode_temp, Register};
use crate::modes::{Fan, PerformanceMode, RgbColor, RgbMode, ThermalMode};

/// Attribute names exposed to external glue.
pub const ATTRIBUTES: &[&str] = &[
    "performance_mode",
    "thermal_mode",
    "cpu_temp",
    "gpu_temp",
    "gpu_hotspot",
    "fan1_speed",
    "fan2_speed",
    "fan1_target",
    "fan2_target",
    "cpu_pl1",
    "cpu_pl2",
    "gpu_tgp",
    "rgb_mode",
    "rgb_brightness",
    "rgb_zone1_color",
    "rgb_zone2_color",
    "rgb_zone3_color",
    "rgb_zone4_color",
    "battery_conservation",
    "rapid_charge",
    "fn_lock",
    "generation",
    "capabilities",
    "ec_statistics",
];

fn parse_u8(what: &'static str, token: &str) -> Result<u8> {
    token.trim().parse::<u8>().map_err(|_| LegionError::UnsupportedValue {
        what,
        token: token.to_string(),
    })
}

fn parse_bool(what: &'static str, token: &str) -> Result<bool> {
    match token.trim() {
        "1" | "on" | "true" => Ok(true),
        "0" | "off" | "false" => Ok(false),
        other => Err(LegionError::UnsupportedValue {
            what,
            token: other.to_string(),
        }),
    }
}

fn read_temp_attr(device: &LegionDevice, register: Register) -> Result<String> {
    device
        .read_register(register)
        .map(|raw| decode_temp(raw).to_string())
}

fn read_fan_attr(device: &LegionDevice, register: Register) -> Result<String> {
    device
        .read_register(register)
        .map(|raw| decode_fan_rpm(raw).to_string())
}

fn read_bool_attr(device: &LegionDevice, feature: Feature) -> Result<String> {
    device
        .modes()
        .boolean_feature(feature)
        .map(|v| u8::from(v).to_string())
}

/// Read one attribute's current value as text.
pub fn read(device: &LegionDevice, name: &str) -> Result<String> {
    let modes = device.modes();
    match name {
        "performance_mode" => match modes.performance_mode() {
            Ok(mode) => Ok(mode.token().to_string()),
            Err(LegionError::UnexpectedHardwareValue { .. }) => Ok("unknown".to_string()),
            Err(e) => Err(e),
        },
        "thermal_mode" => match modes.thermal_mode() {
            Ok(mode) => Ok(mode.token().to_string()),
            Err(LegionError::UnexpectedHardwareValue { .. }) => Ok("unknown".to_string()),
            Err(e) => Err(e),
        },
        "cpu_temp" => read_temp_attr(device, Register::CpuPackageTemp),
        "gpu_temp" => read_temp_attr(device, Register::GpuTemp),
        "gpu_hotspot" => read_temp_attr(device, Register::GpuHotspot),
        "fan1_speed" => read_fan_attr(device, Register::Fan1Speed),
        "fan2_speed" => read_fan_attr(device, Register::Fan2Speed),
        "fan1_target" => device.read_register(Register::Fan1Target).map(|v| v.to_string()),
        "fan2_target" => device.read_register(Register::Fan2Target).map(|v| v.to_string()),
        "cpu_pl1" => device.read_register(Register::CpuPl1).map(|v| v.to_string()),
        "cpu_pl2" => device.read_register(Register::CpuPl2).map(|v| v.to_string()),
        "gpu_tgp" => device.read_register(Register::GpuTgp).map(|v| v.to_string()),
        "rgb_mode" => match modes.rgb_mode() {
            Ok(mode) => Ok(mode.token().to_string()),
            Err(LegionError::UnexpectedHardwareValue { .. }) => Ok("unknown".to_string()),
            Err(e) => Err(e),
        },
        "rgb_brightness" => {
            device.require(Feature::RgbControl)?;
            device.read_register(Register::RgbBrightness).map(|v| v.to_string())
        }
        "rgb_zone1_color" | "rgb_zone2_color" | "rgb_zone3_color" | "rgb_zone4_color" => {
            Err(LegionError::config("attribute is write-only"))
        }
        "battery_conservation" => read_bool_attr(device, Feature::BatteryConservation),
        "rapid_charge" => read_bool_attr(device, Feature::RapidCharge),
        "fn_lock" => read_bool_attr(device, Feature::FnLock),
        "generation" => Ok(device.generation().to_string()),
        "capabilities" => Ok(device.capabilities().summary()),
        "ec_statistics" => {
            let stats = device.ec_stats();
            Ok(format!(
                "reads: {}\nwrites: {}\nerrors: {}",
                stats.reads, stats.writes, stats.errors
            ))
        }
        other => Err(LegionError::UnsupportedValue {
            what: "attribute",
            token: other.to_string(),
        }),
    }
}

/// Write one attribute from its textual token.
pub fn write(device: &LegionDevice, name: &str, token: &str) -> Result<()> {
    let modes = device.modes();
    let token = token.trim();
    match name {
        "performance_mode" => {
            let mode = PerformanceMode::from_token(token).ok_or(LegionError::UnsupportedValue {
                what: "performance_mode",
                token: token.to_string(),
            })?;
            modes.set_performance_mode(mode)
        }
        "thermal_mode" => {
            let mode = ThermalMode::from_token(token).ok_or(LegionError::UnsupportedValue {
                what: "thermal_mode",
                token: token.to_string(),
            })?;
            modes.set_thermal_mode(mode)
        }
        "fan1_target" => modes.set_fan_target(Fan::Fan1, parse_u8("fan1_target", token)?),
        "fan2_target" => modes.set_fan_target(Fan::Fan2, parse_u8("fan2_target", token)?),
        "cpu_pl1" => modes.set_cpu_pl1(parse_u8("cpu_pl1", token)?),
        "cpu_pl2" => modes.set_cpu_pl2(parse_u8("cpu_pl2", token)?),
        "gpu_tgp" => modes.set_gpu_tgp(parse_u8("gpu_tgp", token)?),
        "rgb_mode" => {
            let mode = RgbMode::from_token(token).ok_or(LegionError::UnsupportedValue {
                what: "rgb_mode",
                token: token.to_string(),
            })?;
            modes.set_rgb_mode(mode)
        }
        "rgb_brightness" => modes.set_rgb_brightness(parse_u8("rgb_brightness", token)?),
        "rgb_zone1_color" => write_zone(device, 1, token),
        "rgb_zone2_color" => write_zone(device, 2, token),
        "rgb_zone3_color" => write_zone(device, 3, token),
        "rgb_zone4_color" => write_zone(device, 4, token),
        "battery_conservation" => {
            modes.set_battery_conservation(parse_bool("battery_conservation", token)?)
        }
        "rapid_charge" => modes.set_rapid_charge(parse_bool("rapid_charge", token)?),
        "fn_lock" => modes.set_fn_lock(parse_bool("fn_lock", token)?),
        "cpu_temp" | "gpu_temp" | "gpu_hotspot" | "fan1_speed" | "fan2_speed" | "generation"
        | "capabilities" | "ec_statistics" => Err(LegionError::config("read-only attribute")),
        other => Err(LegionError::UnsupportedValue {
            what: "attribute",
            token: other.to_string(),
        }),
    }
}

fn write_zone(device: &LegionDevice, zone: u8, token: &str) -> Result<()> {
    let color = RgbColor::parse(token).ok_or(LegionError::UnsupportedValue {
        what: "rgb_zone_color",
        token: token.to_string(),
    })?;
    device.modes().set_rgb_zone_color(zone, color)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::Generation;
    use crate::test_utils::sim_device;

    #[test]
    fn enumerated_token_round_trip() {
        let (_sim, _fw, device) = sim_device(Generation::Gen9);
        write(&device, "performance_mode", "performance").unwrap();
        assert_eq!(read(&device, "performance_mode").unwrap(), "performance");
    }

    #[test]
    fn bad_token_is_rejected_before_hardware() {
        let (sim, fw, device) = sim_device(Generation::Gen9);
        let port_calls = sim.call_count();
        let fw_calls = fw.call_count();
        let err = write(&device, "performance_mode", "ludicrous").unwrap_err();
        assert!(matches!(err, LegionError::UnsupportedValue { .. }));
        assert!(err.rejected_before_hardware());
        assert_eq!(sim.call_count(), port_calls);
        assert_eq!(fw.call_count(), fw_calls);
    }

    #[test]
    fn numeric_attribute_parses_and_ranges() {
        let (sim, _fw, device) = sim_device(Generation::Gen9);
        write(&device, "cpu_pl1", "45").unwrap();
        assert_eq!(sim.register(0xC0), 45);

        assert!(matches!(
            write(&device, "cpu_pl1", "forty"),
            Err(LegionError::UnsupportedValue { .. })
        ));
        assert!(matches!(
            write(&device, "cpu_pl1", "56"),
            Err(LegionError::InvalidInput { .. })
        ));
    }

    #[test]
    fn boolean_attribute_accepts_common_tokens() {
        let (_sim, fw, device) = sim_device(Generation::Gen9);
        write(&device, "battery_conservation", "on").unwrap();
        assert_eq!(fw.value("SBCM"), Some(1));
        write(&device, "battery_conservation", "0").unwrap();
        assert_eq!(fw.value("SBCM"), Some(0));
        assert_eq!(read(&device, "battery_conservation").unwrap(), "0");
    }

    #[test]
    fn read_only_attributes_refuse_writes() {
        let (_sim, _fw, device) = sim_device(Generation::Gen9);
        assert!(matches!(
            write(&device, "cpu_temp", "50"),
            Err(LegionError::Config(_))
        ));
    }

    #[test]
    fn unknown_attribute_is_reported_as_such() {
        let (_sim, _fw, device) = sim_device(Generation::Gen9);
        assert!(matches!(
            read(&device, "warp_factor"),
            Err(LegionError::UnsupportedValue { what: "attribute", .. })
        ));
    }

    #[test]
    fn unsupported_feature_reads_as_capability_error() {
        // Gen 6 routes RGB through firmware; the brightness register
        // does not exist there.
        let (_sim, _fw, device) = sim_device(Generation::Gen6);
        assert!(matches!(
            write(&device, "rgb_brightness", "50"),
            Err(LegionError::CapabilityUnavailable(_))
        ));
    }

    #[test]
    fn zone_color_writes_parse_hex() {
        let (sim, _fw, device) = sim_device(Generation::Gen9);
        write(&device, "rgb_zone1_color", "ff0080").unwrap();
        assert_eq!(sim.register(0xF3), 0x80);
        assert!(matches!(
            write(&device, "rgb_zone1_color", "red"),
            Err(LegionError::UnsupportedValue { .. })
        ));
    }
}
