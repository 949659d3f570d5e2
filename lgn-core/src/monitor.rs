//! Background hardware monitor
//!
//! A plain thread (no coroutines) that periodically samples temperatures
//! and fan speeds through the EC session, refreshes the cached state, and
//! applies an emergency-cooling override when a critical threshold is
//! crossed: both fans to maximum, bypassing the normal mode cascade.
//!
//! Teardown contract: `stop()` sets the stop flag and JOINS the thread, so
//! it blocks until any in-flight iteration has fully finished. No register
//! access happens after `stop` returns. The interval sleep is sliced so a
//! stop request does not wait out a whole period.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::constants::monitor;
use crate::device::LegionDevice;

#[derive(Debug, Clone, Copy)]
pub struct MonitorConfig {
    pub interval: Duration,
    pub cpu_critical_c: i16,
    pub gpu_critical_c: i16,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: monitor::POLL_INTERVAL,
            cpu_critical_c: monitor::CPU_CRITICAL_C,
            gpu_critical_c: monitor::GPU_CRITICAL_C,
        }
    }
}

pub struct MonitorHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    /// Start the monitor over a shared device handle.
    pub fn spawn(device: Arc<LegionDevice>, config: MonitorConfig) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let thread = thread::spawn(move || run_loop(device, config, stop_flag));
        Self {
            stop,
            thread: Some(thread),
        }
    }

    /// Stop the monitor and wait for any in-flight iteration to finish.
    /// After this returns the monitor issues no further register access.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop(device: Arc<LegionDevice>, config: MonitorConfig, stop: Arc<AtomicBool>) {
    info!(
        interval_ms = config.interval.as_millis() as u64,
        cpu_critical = config.cpu_critical_c,
        gpu_critical = config.gpu_critical_c,
        "monitor started"
    );
    while !stop.load(Ordering::SeqCst) {
        run_iteration(&device, &config);

        let deadline = Instant::now() + config.interval;
        loop {
            if stop.load(Ordering::SeqCst) {
                info!("monitor stopped");
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(monitor::STOP_POLL_SLICE));
        }
    }
    info!("monitor stopped");
}

fn run_iteration(device: &LegionDevice, config: &MonitorConfig) {
    let sample = device.sample_telemetry();

    let cpu_hot = sample.cpu_temp_c.is_some_and(|t| t > config.cpu_critical_c);
    let gpu_hot = sample.gpu_temp_c.is_some_and(|t| t > config.gpu_critical_c);
    if cpu_hot || gpu_hot {
        warn!(
            cpu = ?sample.cpu_temp_c,
            gpu = ?sample.gpu_temp_c,
            "critical temperature, forcing both fans to maximum"
        );
        if let Err(e) = device.modes().set_max_cooling() {
            warn!(error = %e, "emergency cooling override failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::Generation;
    use crate::test_utils::sim_device;
    use serial_test::serial;

    fn fast_config() -> MonitorConfig {
        MonitorConfig {
            interval: Duration::from_millis(10),
            ..MonitorConfig::default()
        }
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    #[serial]
    fn monitor_refreshes_cached_telemetry() {
        let (sim, _fw, device) = sim_device(Generation::Gen9);
        sim.preload(0xE0, 62);
        sim.preload(0xB0, 20);
        let device = Arc::new(device);

        let mut handle = MonitorHandle::spawn(Arc::clone(&device), fast_config());
        assert!(wait_until(|| {
            device.state_snapshot().cpu_temp_c == Some(62)
        }));
        assert!(wait_until(|| {
            device.state_snapshot().fan1_rpm == Some(2000)
        }));
        handle.stop();
    }

    #[test]
    #[serial]
    fn critical_cpu_temperature_forces_fans_to_maximum() {
        let (sim, _fw, device) = sim_device(Generation::Gen9);
        sim.preload(0xE0, 92);
        let device = Arc::new(device);

        let mut handle = MonitorHandle::spawn(Arc::clone(&device), fast_config());
        assert!(wait_until(|| sim.register(0xB2) == 100 && sim.register(0xB3) == 100));
        handle.stop();
    }

    #[test]
    #[serial]
    fn below_threshold_no_override_is_issued() {
        let (sim, _fw, device) = sim_device(Generation::Gen9);
        sim.preload(0xE0, 70);
        sim.preload(0xE2, 65);
        let device = Arc::new(device);

        let mut handle = MonitorHandle::spawn(Arc::clone(&device), fast_config());
        assert!(wait_until(|| device.state_snapshot().cpu_temp_c == Some(70)));
        handle.stop();
        assert_eq!(sim.register(0xB2), 0);
        assert_eq!(sim.register(0xB3), 0);
    }

    #[test]
    #[serial]
    fn stop_blocks_until_no_further_register_access() {
        let (sim, _fw, device) = sim_device(Generation::Gen9);
        let device = Arc::new(device);

        let mut handle = MonitorHandle::spawn(Arc::clone(&device), fast_config());
        assert!(wait_until(|| sim.call_count() > 0));
        handle.stop();

        let after_stop = sim.call_count();
        thread::sleep(Duration::from_millis(100));
        assert_eq!(sim.call_count(), after_stop);
    }

    #[test]
    #[serial]
    fn dropping_the_handle_stops_the_monitor() {
        let (sim, _fw, device) = sim_device(Generation::Gen9);
        let device = Arc::new(device);

        {
            let _handle = MonitorHandle::spawn(Arc::clone(&device), fast_config());
            assert!(wait_until(|| sim.call_count() > 0));
        }
        let after_drop = sim.call_count();
        thread::sleep(Duration::from_millis(100));
        assert_eq!(sim.call_count(), after_drop);
    }
}
