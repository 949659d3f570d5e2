//! Daemon configuration
//!
//! JSON file at /etc/legiond/config.json with compiled-in defaults. A
//! missing file is not an error; a malformed or out-of-range file is,
//! loudly, so a typo cannot silently disable thermal protection.

use std::fs;
use std::path::{Path, PathBuf};

use lgn_error::{LegionError, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{monitor, paths};
use crate::monitor::MonitorConfig;

fn default_monitor_enabled() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    monitor::POLL_INTERVAL.as_millis() as u64
}

fn default_cpu_critical_c() -> i16 {
    monitor::CPU_CRITICAL_C
}

fn default_gpu_critical_c() -> i16 {
    monitor::GPU_CRITICAL_C
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_monitor_enabled")]
    pub monitor_enabled: bool,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_cpu_critical_c")]
    pub cpu_critical_c: i16,
    #[serde(default = "default_gpu_critical_c")]
    pub gpu_critical_c: i16,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            monitor_enabled: default_monitor_enabled(),
            poll_interval_ms: default_poll_interval_ms(),
            cpu_critical_c: default_cpu_critical_c(),
            gpu_critical_c: default_gpu_critical_c(),
        }
    }
}

impl DaemonConfig {
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            interval: std::time::Duration::from_millis(self.poll_interval_ms),
            cpu_critical_c: self.cpu_critical_c,
            gpu_critical_c: self.gpu_critical_c,
        }
    }
}

pub fn config_path() -> PathBuf {
    PathBuf::from(paths::CONFIG_FILE)
}

pub fn validate(cfg: &DaemonConfig) -> Result<()> {
    if !(250..=60_000).contains(&cfg.poll_interval_ms) {
        return Err(LegionError::config(format!(
            "poll_interval_ms {} out of range 250..=60000",
            cfg.poll_interval_ms
        )));
    }
    if !(40..=110).contains(&cfg.cpu_critical_c) {
        return Err(LegionError::config(format!(
            "cpu_critical_c {} out of range 40..=110",
            cfg.cpu_critical_c
        )));
    }
    if !(40..=110).contains(&cfg.gpu_critical_c) {
        return Err(LegionError::config(format!(
            "gpu_critical_c {} out of range 40..=110",
            cfg.gpu_critical_c
        )));
    }
    Ok(())
}

pub fn load_from(path: &Path) -> Result<DaemonConfig> {
    if !path.exists() {
        return Ok(DaemonConfig::default());
    }
    let data = fs::read_to_string(path)?;
    let cfg: DaemonConfig = serde_json::from_str(&data)?;
    validate(&cfg)?;
    Ok(cfg)
}

pub fn load() -> Result<DaemonConfig> {
    load_from(&config_path())
}

pub fn save_to(cfg: &DaemonConfig, path: &Path) -> Result<()> {
    validate(cfg)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(cfg)?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = load_from(&dir.path().join("nope.json")).unwrap();
        assert_eq!(cfg, DaemonConfig::default());
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let cfg = DaemonConfig {
            monitor_enabled: false,
            poll_interval_ms: 5000,
            cpu_critical_c: 90,
            gpu_critical_c: 85,
        };
        save_to(&cfg, &path).unwrap();
        assert_eq!(load_from(&path).unwrap(), cfg);
    }

    #[test]
    fn partial_files_fill_in_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"poll_interval_ms": 1000}"#).unwrap();
        let cfg = load_from(&path).unwrap();
        assert_eq!(cfg.poll_interval_ms, 1000);
        assert!(cfg.monitor_enabled);
        assert_eq!(cfg.cpu_critical_c, 85);
    }

    #[test]
    fn malformed_json_is_an_error_not_a_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_from(&path), Err(LegionError::JsonParse(_))));
    }

    #[test]
    fn out_of_range_interval_is_rejected() {
        let cfg = DaemonConfig {
            poll_interval_ms: 10,
            ..DaemonConfig::default()
        };
        assert!(matches!(validate(&cfg), Err(LegionError::Config(_))));
    }
}
