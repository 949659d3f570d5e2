//! Firmware method invocation
//!
//! Mode selectors on older boards and the battery/charge/fn-lock switches on
//! every board live behind ACPI methods on the EC device node rather than EC
//! registers. This is a separate error domain from the port bus: "the method
//! does not exist on this firmware" and "the method exists but the call
//! failed" are distinct outcomes, and the capability resolver depends on
//! that distinction.
//!
//! The production implementation drives the `acpi_call` kernel interface:
//! write `\_SB...EC0.NAME arg` to `/proc/acpi/call`, read back an integer
//! or an `Error: ...` reply.

use std::collections::{HashMap, HashSet};
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use lgn_error::{LegionError, Result};
use parking_lot::Mutex;
use tracing::trace;

use crate::constants::paths;

/// Argument meaning "query the current value" on getter/setter methods.
pub const QUERY_ARG: i64 = -1;

#[cfg_attr(test, mockall::automock)]
pub trait MethodInvoker: Send + Sync {
    /// Call a firmware method with one integer argument.
    fn invoke(&self, method: &str, arg: i64) -> Result<i64>;

    /// Existence probe used by capability resolution.
    fn exists(&self, method: &str) -> bool;
}

/// `acpi_call`-backed invoker. `node` is the ACPI path of the EC device,
/// which differs between board layouts (see `Generation::acpi_ec_node`).
pub struct AcpiCallInvoker {
    node: &'static str,
}

impl AcpiCallInvoker {
    pub fn new(node: &'static str) -> Self {
        Self { node }
    }

    fn exchange(&self, command: &str) -> Result<String> {
        let mut f = OpenOptions::new()
            .read(true)
            .write(true)
            .open(paths::ACPI_CALL)?;
        f.write_all(command.as_bytes())?;
        f.seek(SeekFrom::Start(0))?;
        let mut reply = String::new();
        f.read_to_string(&mut reply)?;
        Ok(reply.trim_end_matches('\0').trim().to_string())
    }
}

impl MethodInvoker for AcpiCallInvoker {
    fn invoke(&self, method: &str, arg: i64) -> Result<i64> {
        let command = format!("{}.{} {:#x}", self.node, method, arg);
        let reply = self.exchange(&command)?;
        trace!(method, arg, %reply, "acpi_call");

        if let Some(err) = reply.strip_prefix("Error:") {
            let err = err.trim();
            if err.contains("AE_NOT_FOUND") {
                return Err(LegionError::MethodNotFound(method.to_string()));
            }
            return Err(LegionError::MethodCallFailed {
                method: method.to_string(),
                arg,
                reason: err.to_string(),
            });
        }

        let parsed = if let Some(hex) = reply.strip_prefix("0x") {
            i64::from_str_radix(hex, 16).ok()
        } else {
            reply.parse::<i64>().ok()
        };
        parsed.ok_or_else(|| LegionError::MethodCallFailed {
            method: method.to_string(),
            arg,
            reason: format!("unparseable reply {:?}", reply),
        })
    }

    fn exists(&self, method: &str) -> bool {
        match self.invoke(method, QUERY_ARG) {
            Ok(_) => true,
            // Present but unhappy still counts as present.
            Err(LegionError::MethodCallFailed { .. }) => true,
            Err(_) => false,
        }
    }
}

/// In-memory firmware for `legiond --simulate` and tests. Methods hold one
/// integer value; `QUERY_ARG` reads it back, anything else stores it.
#[derive(Clone, Default)]
pub struct SimulatedFirmware {
    values: Arc<Mutex<HashMap<String, i64>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    calls: Arc<Mutex<Vec<(String, i64)>>>,
}

impl SimulatedFirmware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a method as present with an initial value.
    pub fn provide(&self, method: &str, value: i64) {
        self.values.lock().insert(method.to_string(), value);
    }

    /// Make a present method fail every call.
    pub fn break_method(&self, method: &str) {
        self.failing.lock().insert(method.to_string());
    }

    pub fn value(&self, method: &str) -> Option<i64> {
        self.values.lock().get(method).copied()
    }

    pub fn calls(&self) -> Vec<(String, i64)> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl MethodInvoker for SimulatedFirmware {
    fn invoke(&self, method: &str, arg: i64) -> Result<i64> {
        self.calls.lock().push((method.to_string(), arg));
        if self.failing.lock().contains(method) {
            return Err(LegionError::MethodCallFailed {
                method: method.to_string(),
                arg,
                reason: "simulated failure".to_string(),
            });
        }
        let mut values = self.values.lock();
        match values.get_mut(method) {
            None => Err(LegionError::MethodNotFound(method.to_string())),
            Some(slot) => {
                if arg == QUERY_ARG {
                    Ok(*slot)
                } else {
                    *slot = arg;
                    Ok(0)
                }
            }
        }
    }

    fn exists(&self, method: &str) -> bool {
        self.values.lock().contains_key(method) || self.failing.lock().contains(method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_firmware_get_set_round_trip() {
        let fw = SimulatedFirmware::new();
        fw.provide("SPMO", 1);
        assert_eq!(fw.invoke("SPMO", QUERY_ARG).unwrap(), 1);
        fw.invoke("SPMO", 2).unwrap();
        assert_eq!(fw.invoke("SPMO", QUERY_ARG).unwrap(), 2);
    }

    #[test]
    fn missing_method_is_not_found_not_call_failed() {
        let fw = SimulatedFirmware::new();
        match fw.invoke("OCGS", 0) {
            Err(LegionError::MethodNotFound(name)) => assert_eq!(name, "OCGS"),
            other => panic!("expected MethodNotFound, got {:?}", other),
        }
        assert!(!fw.exists("OCGS"));
    }

    #[test]
    fn broken_method_reports_call_failed_but_exists() {
        let fw = SimulatedFirmware::new();
        fw.provide("SBCM", 0);
        fw.break_method("SBCM");
        assert!(fw.exists("SBCM"));
        assert!(matches!(
            fw.invoke("SBCM", 1),
            Err(LegionError::MethodCallFailed { .. })
        ));
    }
}
