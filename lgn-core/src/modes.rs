//! Logical mode operations
//!
//! Every operation here is a short ordered sequence of register writes or
//! method calls, never a single atomic step. The contract, in order:
//! capability gate, then input range check (both reject with zero hardware
//! access), then the primary write, then best-effort secondaries.
//!
//! A secondary failure after a successful primary is reported to the caller
//! with the failing step named, and the primary state change is NOT rolled
//! back: the device is left in a mixed state. Staging cannot be made
//! transactional against a live EC, so the hazard is documented instead of
//! papered over.

use lgn_error::{LegionError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::capability::Feature;
use crate::constants::limits;
use crate::device::LegionDevice;
use crate::ec::registers::Register;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceMode {
    Quiet = 0,
    Balanced = 1,
    Performance = 2,
    Custom = 3,
}

impl PerformanceMode {
    pub fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            0 => Some(Self::Quiet),
            1 => Some(Self::Balanced),
            2 => Some(Self::Performance),
            3 => Some(Self::Custom),
            _ => None,
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "quiet" => Some(Self::Quiet),
            "balanced" => Some(Self::Balanced),
            "performance" => Some(Self::Performance),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            Self::Quiet => "quiet",
            Self::Balanced => "balanced",
            Self::Performance => "performance",
            Self::Custom => "custom",
        }
    }

    /// Secondary writes cascaded after the primary selector, fixed order.
    /// Custom applies the primary only and leaves tuning to the caller.
    fn cascade(self) -> Option<CascadePlan> {
        match self {
            Self::Quiet => Some(CascadePlan {
                cpu_pl2_w: 90,
                gpu_tgp_w: 80,
                fan_curve: 0x20,
                vapor_chamber: false,
            }),
            Self::Balanced => Some(CascadePlan {
                cpu_pl2_w: 115,
                gpu_tgp_w: 115,
                fan_curve: 0x30,
                vapor_chamber: false,
            }),
            Self::Performance => Some(CascadePlan {
                cpu_pl2_w: 140,
                gpu_tgp_w: 140,
                fan_curve: 0x40,
                vapor_chamber: true,
            }),
            Self::Custom => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CascadePlan {
    cpu_pl2_w: u8,
    gpu_tgp_w: u8,
    fan_curve: u8,
    vapor_chamber: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThermalMode {
    Quiet = 0,
    Balanced = 1,
    Performance = 2,
    Custom = 3,
}

impl ThermalMode {
    pub fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            0 => Some(Self::Quiet),
            1 => Some(Self::Balanced),
            2 => Some(Self::Performance),
            3 => Some(Self::Custom),
            _ => None,
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "quiet" => Some(Self::Quiet),
            "balanced" => Some(Self::Balanced),
            "performance" => Some(Self::Performance),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            Self::Quiet => "quiet",
            Self::Balanced => "balanced",
            Self::Performance => "performance",
            Self::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RgbMode {
    Off = 0,
    Static = 1,
    Breathing = 2,
    Rainbow = 3,
    Wave = 4,
    Custom = 5,
}

impl RgbMode {
    pub fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            0 => Some(Self::Off),
            1 => Some(Self::Static),
            2 => Some(Self::Breathing),
            3 => Some(Self::Rainbow),
            4 => Some(Self::Wave),
            5 => Some(Self::Custom),
            _ => None,
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "off" => Some(Self::Off),
            "static" => Some(Self::Static),
            "breathing" => Some(Self::Breathing),
            "rainbow" => Some(Self::Rainbow),
            "wave" => Some(Self::Wave),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Static => "static",
            Self::Breathing => "breathing",
            Self::Rainbow => "rainbow",
            Self::Wave => "wave",
            Self::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fan {
    Fan1,
    Fan2,
}

impl Fan {
    fn target_register(self) -> Register {
        match self {
            Fan::Fan1 => Register::Fan1Target,
            Fan::Fan2 => Register::Fan2Target,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    /// Parse "RRGGBB" hex.
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.strip_prefix("0x").unwrap_or(token);
        if token.len() != 6 {
            return None;
        }
        let packed = u32::from_str_radix(token, 16).ok()?;
        Some(Self {
            r: (packed >> 16) as u8,
            g: (packed >> 8) as u8,
            b: packed as u8,
        })
    }
}

fn range_check(what: &'static str, value: i64, min: i64, max: i64) -> Result<()> {
    if value < min || value > max {
        return Err(LegionError::InvalidInput { what, value, min, max });
    }
    Ok(())
}

/// Logical operations over one device. Cheap to construct; borrow it per
/// call site via `LegionDevice::modes()`.
pub struct ModeController<'a> {
    dev: &'a LegionDevice,
}

impl<'a> ModeController<'a> {
    pub(crate) fn new(dev: &'a LegionDevice) -> Self {
        Self { dev }
    }

    /// Select a performance tier. After the primary selector succeeds the
    /// tier's secondary writes are applied in fixed order: turbo power
    /// ceiling, GPU power ceiling, fan-curve aggressiveness, and on the
    /// highest tier a vapor-chamber hint where the board has one. A failed
    /// secondary is reported (the error names the step) and the primary is
    /// left applied.
    pub fn set_performance_mode(&self, mode: PerformanceMode) -> Result<()> {
        self.dev.require(Feature::LegionMode)?;

        self.dev.feature_write(Feature::LegionMode, mode as i64)?;
        self.dev.update_state(|s| s.performance_mode = Some(mode));
        debug!(mode = mode.token(), "performance mode selected");

        let Some(plan) = mode.cascade() else {
            return Ok(());
        };

        self.dev.write_register(Register::CpuPl2, plan.cpu_pl2_w)?;
        self.dev.update_state(|s| s.cpu_pl2_w = Some(plan.cpu_pl2_w));

        self.dev.write_register(Register::GpuTgp, plan.gpu_tgp_w)?;
        self.dev.update_state(|s| s.gpu_tgp_w = Some(plan.gpu_tgp_w));

        if self.dev.capabilities().has(Feature::FanCurve) {
            self.dev.feature_write(Feature::FanCurve, i64::from(plan.fan_curve))?;
        } else {
            debug!("fan curve not available, cascade step skipped");
        }

        if plan.vapor_chamber && self.dev.registers().contains(Register::VaporChamberMode) {
            self.dev.write_register(Register::VaporChamberMode, 0x02)?;
        }

        Ok(())
    }

    pub fn performance_mode(&self) -> Result<PerformanceMode> {
        self.dev.require(Feature::LegionMode)?;
        let raw = self.dev.feature_read(Feature::LegionMode)?;
        PerformanceMode::from_raw(raw).ok_or(LegionError::UnexpectedHardwareValue {
            what: "performance_mode",
            raw,
        })
    }

    pub fn set_thermal_mode(&self, mode: ThermalMode) -> Result<()> {
        self.dev.require(Feature::ThermalMode)?;
        self.dev.feature_write(Feature::ThermalMode, mode as i64)?;
        self.dev.update_state(|s| s.thermal_mode = Some(mode));
        Ok(())
    }

    pub fn thermal_mode(&self) -> Result<ThermalMode> {
        self.dev.require(Feature::ThermalMode)?;
        let raw = self.dev.feature_read(Feature::ThermalMode)?;
        ThermalMode::from_raw(raw).ok_or(LegionError::UnexpectedHardwareValue {
            what: "thermal_mode",
            raw,
        })
    }

    /// Set one fan's target duty, percent. Plain register write, no
    /// cascade. Boards we cannot identify have no writable fan registers.
    pub fn set_fan_target(&self, fan: Fan, percent: u8) -> Result<()> {
        let register = fan.target_register();
        if !self.dev.registers().contains(register) {
            return Err(LegionError::capability("fan_control"));
        }
        range_check(
            "fan_target",
            i64::from(percent),
            0,
            i64::from(limits::FAN_TARGET_MAX),
        )?;
        self.dev.write_register(register, percent)
    }

    /// Emergency cooling: both fans to maximum, bypassing the mode cascade.
    /// Used by the monitor when a critical temperature is crossed.
    pub fn set_max_cooling(&self) -> Result<()> {
        self.set_fan_target(Fan::Fan1, limits::FAN_TARGET_MAX)?;
        self.set_fan_target(Fan::Fan2, limits::FAN_TARGET_MAX)
    }

    pub fn fan_speed_rpm(&self, fan: Fan) -> Result<u32> {
        let register = match fan {
            Fan::Fan1 => Register::Fan1Speed,
            Fan::Fan2 => Register::Fan2Speed,
        };
        self.dev
            .read_register(register)
            .map(crate::ec::registers::decode_fan_rpm)
    }

    pub fn set_rgb_mode(&self, mode: RgbMode) -> Result<()> {
        self.dev.require(Feature::RgbControl)?;
        self.dev.feature_write(Feature::RgbControl, mode as i64)?;
        self.dev.update_state(|s| s.rgb_mode = Some(mode));
        Ok(())
    }

    pub fn rgb_mode(&self) -> Result<RgbMode> {
        self.dev.require(Feature::RgbControl)?;
        let raw = self.dev.feature_read(Feature::RgbControl)?;
        RgbMode::from_raw(raw).ok_or(LegionError::UnexpectedHardwareValue {
            what: "rgb_mode",
            raw,
        })
    }

    /// Global lighting brightness, percent. Register-backed only: older
    /// boards drive brightness inside their WMI effect payloads, which this
    /// driver does not synthesize.
    pub fn set_rgb_brightness(&self, percent: u8) -> Result<()> {
        self.dev.require(Feature::RgbControl)?;
        if !self.dev.registers().contains(Register::RgbBrightness) {
            return Err(LegionError::capability("rgb_brightness"));
        }
        range_check(
            "rgb_brightness",
            i64::from(percent),
            0,
            i64::from(limits::RGB_BRIGHTNESS_MAX),
        )?;
        self.dev.write_register(Register::RgbBrightness, percent)?;
        self.dev.update_state(|s| s.rgb_brightness = Some(percent));
        Ok(())
    }

    /// Set one lighting zone's color. The zone register latches three
    /// sequential byte writes: r, g, b.
    pub fn set_rgb_zone_color(&self, zone: u8, color: RgbColor) -> Result<()> {
        self.dev.require(Feature::RgbControl)?;
        let register = match zone {
            1 => Register::RgbZone1Color,
            2 => Register::RgbZone2Color,
            3 => Register::RgbZone3Color,
            4 => Register::RgbZone4Color,
            _ => {
                return Err(LegionError::InvalidInput {
                    what: "rgb_zone",
                    value: i64::from(zone),
                    min: 1,
                    max: 4,
                })
            }
        };
        if !self.dev.registers().contains(register) {
            return Err(LegionError::capability("rgb_zones"));
        }
        self.dev.write_register(register, color.r)?;
        self.dev.write_register(register, color.g)?;
        self.dev.write_register(register, color.b)
    }

    pub fn set_cpu_pl1(&self, watts: u8) -> Result<()> {
        self.dev.require(Feature::Overclock)?;
        range_check(
            "cpu_pl1",
            i64::from(watts),
            i64::from(limits::CPU_PL1_MIN),
            i64::from(limits::CPU_PL1_MAX),
        )?;
        self.dev.write_register(Register::CpuPl1, watts)?;
        self.dev.update_state(|s| s.cpu_pl1_w = Some(watts));
        Ok(())
    }

    pub fn set_cpu_pl2(&self, watts: u8) -> Result<()> {
        self.dev.require(Feature::Overclock)?;
        range_check(
            "cpu_pl2",
            i64::from(watts),
            i64::from(limits::CPU_PL2_MIN),
            i64::from(limits::CPU_PL2_MAX),
        )?;
        self.dev.write_register(Register::CpuPl2, watts)?;
        self.dev.update_state(|s| s.cpu_pl2_w = Some(watts));
        Ok(())
    }

    pub fn set_gpu_tgp(&self, watts: u8) -> Result<()> {
        self.dev.require(Feature::Overclock)?;
        range_check(
            "gpu_tgp",
            i64::from(watts),
            i64::from(limits::GPU_TGP_MIN),
            i64::from(limits::GPU_TGP_MAX),
        )?;
        self.dev.write_register(Register::GpuTgp, watts)?;
        self.dev.update_state(|s| s.gpu_tgp_w = Some(watts));
        Ok(())
    }

    pub fn set_battery_conservation(&self, enable: bool) -> Result<()> {
        self.dev.require(Feature::BatteryConservation)?;
        self.dev
            .feature_write(Feature::BatteryConservation, i64::from(enable))?;
        self.dev.update_state(|s| s.battery_conservation = Some(enable));
        Ok(())
    }

    pub fn set_rapid_charge(&self, enable: bool) -> Result<()> {
        self.dev.require(Feature::RapidCharge)?;
        self.dev.feature_write(Feature::RapidCharge, i64::from(enable))?;
        self.dev.update_state(|s| s.rapid_charge = Some(enable));
        Ok(())
    }

    pub fn set_fn_lock(&self, enable: bool) -> Result<()> {
        self.dev.require(Feature::FnLock)?;
        self.dev.feature_write(Feature::FnLock, i64::from(enable))?;
        self.dev.update_state(|s| s.fn_lock = Some(enable));
        Ok(())
    }

    pub fn boolean_feature(&self, feature: Feature) -> Result<bool> {
        self.dev.require(feature)?;
        let raw = self.dev.feature_read(feature)?;
        match raw {
            0 => Ok(false),
            1 => Ok(true),
            _ => {
                warn!(feature = feature.name(), raw, "boolean feature returned non-boolean");
                Ok(raw != 0)
            }
        }
    }
}
