/*
 * Integration tests for the Legion EC control core
 *
 * These tests verify the interaction between the transaction engine,
 * capability resolution and the mode controller, running the real code
 * paths over the simulated EC and firmware.
 */

use std::sync::Arc;
use std::thread;

use lgn_core::ec::sim::PortCall;
use lgn_core::{
    Backend, Feature, Generation, LegionDevice, LegionError, MethodTable, PerformanceMode,
    SimulatedFirmware, SimulatedPort,
};

// Test utilities
fn firmware_for(gen: Generation) -> SimulatedFirmware {
    let fw = SimulatedFirmware::new();
    let table = MethodTable::for_generation(gen);
    for feature in Feature::ALL {
        if let Backend::Method(name) = table.backend(feature) {
            fw.provide(name, 0);
        }
    }
    fw
}

fn attach(gen: Generation) -> (SimulatedPort, SimulatedFirmware, LegionDevice) {
    let sim = SimulatedPort::new();
    let fw = firmware_for(gen);
    let device = LegionDevice::attach(Box::new(sim.clone()), Box::new(fw.clone()), gen);
    (sim, fw, device)
}

/// Data-port writes observed after `mark`, in order.
fn data_writes_since(sim: &SimulatedPort, mark: usize) -> Vec<u8> {
    sim.call_log()
        .lock()
        .iter()
        .skip(mark)
        .filter_map(|c| match *c {
            PortCall::Out(0x62, value) => Some(value),
            _ => None,
        })
        .collect()
}

#[test]
fn no_generation_reports_a_capability_its_table_lacks() {
    // Firmware that answers every probe cannot create capabilities.
    for gen in [
        Generation::Unknown,
        Generation::Gen6,
        Generation::Gen7,
        Generation::Gen8,
        Generation::Gen9,
    ] {
        let fw = SimulatedFirmware::new();
        for m in ["SPMO", "SLMO", "SBCM", "QCHO", "SFLM", "WMI1", "WMI2", "GFAN", "OCGS"] {
            fw.provide(m, 0);
        }
        let device = LegionDevice::attach(
            Box::new(SimulatedPort::new()),
            Box::new(fw),
            gen,
        );
        let table = MethodTable::for_generation(gen);
        for feature in Feature::ALL {
            if table.backend(feature) == Backend::Absent {
                assert!(
                    device.require(feature).is_err(),
                    "{gen}: {} has no backend but resolved as available",
                    feature.name()
                );
            }
        }
    }
}

#[test]
fn transient_bus_timeouts_are_absorbed_by_the_retry_budget() {
    let (sim, _fw, device) = attach(Generation::Gen9);
    sim.preload(0xE0, 77);

    let baseline_errors = device.ec_stats().errors;
    sim.fail_attempts(3);
    let value = device
        .read_register(lgn_core::Register::CpuPackageTemp)
        .unwrap();
    assert_eq!(value, 77);
    assert_eq!(device.ec_stats().errors, baseline_errors);
}

#[test]
fn a_dead_bus_fails_each_transaction_once() {
    let (sim, _fw, device) = attach(Generation::Gen9);
    sim.stick_busy();

    let baseline = device.ec_stats();
    for _ in 0..3 {
        let err = device
            .read_register(lgn_core::Register::CpuPackageTemp)
            .unwrap_err();
        assert!(matches!(err, LegionError::TransactionFailed { .. }));
    }
    let stats = device.ec_stats();
    assert_eq!(stats.errors, baseline.errors + 3);
    assert_eq!(stats.reads, baseline.reads);
}

#[test]
fn out_of_range_input_performs_zero_hardware_calls() {
    let (sim, fw, device) = attach(Generation::Gen9);
    let port_calls = sim.call_count();
    let fw_calls = fw.call_count();

    let err = lgn_core::attrs::write(&device, "cpu_pl1", "200").unwrap_err();
    assert!(matches!(err, LegionError::InvalidInput { .. }));
    assert_eq!(sim.call_count(), port_calls);
    assert_eq!(fw.call_count(), fw_calls);
}

#[test]
fn concurrent_readers_never_observe_a_torn_value() {
    let (sim, _fw, device) = attach(Generation::Gen9);
    sim.preload(0xE0, 0xAA);
    sim.preload(0xE2, 0xBB);
    let device = Arc::new(device);

    let mut handles = Vec::new();
    for (register, expected) in [
        (lgn_core::Register::CpuPackageTemp, 0xAAu8),
        (lgn_core::Register::GpuTemp, 0xBBu8),
    ] {
        for _ in 0..4 {
            let device = Arc::clone(&device);
            handles.push(thread::spawn(move || {
                for _ in 0..200 {
                    let value = device.read_register(register).unwrap();
                    assert_eq!(
                        value, expected,
                        "byte from another transaction's phase leaked through"
                    );
                }
            }));
        }
    }
    for h in handles {
        h.join().unwrap();
    }
}

#[test]
fn performance_mode_cascade_end_to_end_on_gen9() {
    let (sim, _fw, device) = attach(Generation::Gen9);
    let mark = sim.call_log().lock().len();

    device
        .modes()
        .set_performance_mode(PerformanceMode::Performance)
        .unwrap();

    // Each EC write pushes address then value to the data port: primary
    // selector first, then the documented secondaries in fixed order.
    let writes = data_writes_since(&sim, mark);
    assert_eq!(
        writes,
        vec![
            0xA0, 2,    // performance mode selector
            0xC1, 140,  // turbo power ceiling
            0xC4, 140,  // GPU power ceiling
            0xB4, 0x40, // fan curve aggressiveness
            0xD3, 0x02, // vapor chamber hint
        ]
    );
}

#[test]
fn gated_off_performance_mode_issues_zero_writes() {
    // Gen 6 board whose firmware lost the SLMO method: capability resolves
    // false, and the setter must reject before touching hardware.
    let sim = SimulatedPort::new();
    let fw = firmware_for(Generation::Gen6);
    let broken = SimulatedFirmware::new();
    for m in ["SPMO", "SBCM", "QCHO", "SFLM", "WMI1", "GFAN"] {
        broken.provide(m, fw.value(m).unwrap_or(0));
    }
    let device = LegionDevice::attach(
        Box::new(sim.clone()),
        Box::new(broken.clone()),
        Generation::Gen6,
    );

    let port_calls = sim.call_count();
    let fw_calls = broken.call_count();
    let err = device
        .modes()
        .set_performance_mode(PerformanceMode::Performance)
        .unwrap_err();
    assert!(matches!(err, LegionError::CapabilityUnavailable(_)));
    assert_eq!(sim.call_count(), port_calls);
    assert_eq!(broken.call_count(), fw_calls);
}

#[test]
fn mixed_state_after_secondary_failure_is_reported_not_rolled_back() {
    let (sim, fw, device) = attach(Generation::Gen7);
    // Gen 7 cascade: SLMO method primary, then PL2/TGP registers, then the
    // GFAN method. Break the fan-curve step only.
    fw.break_method("GFAN");

    let err = device
        .modes()
        .set_performance_mode(PerformanceMode::Quiet)
        .unwrap_err();
    assert!(matches!(err, LegionError::MethodCallFailed { .. }));

    // Primary and earlier secondaries stand.
    assert_eq!(fw.value("SLMO"), Some(0));
    assert_eq!(sim.register(0xC1), 90);
    assert_eq!(sim.register(0xC4), 80);
}

#[test]
fn status_surface_reflects_traffic_and_stays_readable_under_load() {
    let (sim, _fw, device) = attach(Generation::Gen9);
    sim.preload(0xE0, 71);
    let device = Arc::new(device);

    let reader = {
        let device = Arc::clone(&device);
        thread::spawn(move || {
            for _ in 0..100 {
                let _ = device.status();
            }
        })
    };
    for _ in 0..50 {
        device.sample_telemetry();
    }
    reader.join().unwrap();

    let status = device.status();
    assert!(status.ec.reads >= 50);
    assert_eq!(status.state.cpu_temp_c, Some(71));
    assert!(status.state.last_update.is_some());
}
