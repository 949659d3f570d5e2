//! In-memory embedded controller
//!
//! Emulates the two-port command protocol against a 256-byte register file,
//! including the busy-flag handshake. Used by `legiond --simulate` for
//! bring-up on machines without the EC, and by tests that need to script
//! bus behavior (stuck busy bits, transient timeouts) or assert on the
//! exact port traffic.

use std::sync::Arc;

use parking_lot::Mutex;

use super::portio::PortIo;
use crate::constants::ec;

/// One observed port access, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortCall {
    In(u16),
    Out(u16, u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Idle,
    AwaitReadAddr,
    ReadReady(u8),
    AwaitWriteAddr,
    AwaitWriteValue(u8),
}

struct SimState {
    regs: [u8; 256],
    pending: Pending,
    /// Status polls left that report busy before the bus goes idle again.
    busy_polls_remaining: u64,
    stuck_busy: bool,
}

/// Shareable simulated EC port. Clones share the same register file and log.
#[derive(Clone)]
pub struct SimulatedPort {
    state: Arc<Mutex<SimState>>,
    log: Arc<Mutex<Vec<PortCall>>>,
}

impl SimulatedPort {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                regs: [0u8; 256],
                pending: Pending::Idle,
                busy_polls_remaining: 0,
                stuck_busy: false,
            })),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Seed a register value without going through the protocol.
    pub fn preload(&self, addr: u8, value: u8) {
        self.state.lock().regs[addr as usize] = value;
    }

    /// Read a register value without going through the protocol.
    pub fn register(&self, addr: u8) -> u8 {
        self.state.lock().regs[addr as usize]
    }

    /// Make the busy bit stay set forever: every transaction times out.
    pub fn stick_busy(&self) {
        self.state.lock().stuck_busy = true;
    }

    /// Make the next `n` transaction attempts time out at their first
    /// wait-for-idle phase, then behave normally.
    pub fn fail_attempts(&self, n: u32) {
        self.state.lock().busy_polls_remaining =
            u64::from(n) * u64::from(ec::WAIT_ITERATIONS);
    }

    /// Shared, ordered log of every port access.
    pub fn call_log(&self) -> Arc<Mutex<Vec<PortCall>>> {
        Arc::clone(&self.log)
    }

    /// Number of port accesses seen so far.
    pub fn call_count(&self) -> usize {
        self.log.lock().len()
    }
}

impl Default for SimulatedPort {
    fn default() -> Self {
        Self::new()
    }
}

impl PortIo for SimulatedPort {
    fn inb(&self, port: u16) -> std::io::Result<u8> {
        self.log.lock().push(PortCall::In(port));
        let mut st = self.state.lock();
        match port {
            ec::PORT_CMD => {
                if st.stuck_busy {
                    return Ok(ec::STATUS_BUSY);
                }
                if st.busy_polls_remaining > 0 {
                    st.busy_polls_remaining -= 1;
                    return Ok(ec::STATUS_BUSY);
                }
                Ok(0)
            }
            ec::PORT_DATA => match st.pending {
                Pending::ReadReady(addr) => {
                    st.pending = Pending::Idle;
                    Ok(st.regs[addr as usize])
                }
                _ => Ok(0),
            },
            _ => Ok(0),
        }
    }

    fn outb(&self, port: u16, value: u8) -> std::io::Result<()> {
        self.log.lock().push(PortCall::Out(port, value));
        let mut st = self.state.lock();
        match port {
            ec::PORT_CMD => {
                st.pending = match value {
                    ec::CMD_READ => Pending::AwaitReadAddr,
                    ec::CMD_WRITE => Pending::AwaitWriteAddr,
                    _ => Pending::Idle,
                };
            }
            ec::PORT_DATA => {
                st.pending = match st.pending {
                    Pending::AwaitReadAddr => Pending::ReadReady(value),
                    Pending::AwaitWriteAddr => Pending::AwaitWriteValue(value),
                    Pending::AwaitWriteValue(addr) => {
                        st.regs[addr as usize] = value;
                        Pending::Idle
                    }
                    other => other,
                };
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fail_attempts_budget_is_consumed_by_status_polls() {
        let sim = SimulatedPort::new();
        sim.fail_attempts(1);
        for _ in 0..ec::WAIT_ITERATIONS {
            assert_eq!(sim.inb(ec::PORT_CMD).unwrap(), ec::STATUS_BUSY);
        }
        assert_eq!(sim.inb(ec::PORT_CMD).unwrap(), 0);
    }

    #[test]
    fn protocol_state_machine_stores_writes() {
        let sim = SimulatedPort::new();
        sim.outb(ec::PORT_CMD, ec::CMD_WRITE).unwrap();
        sim.outb(ec::PORT_DATA, 0xF1).unwrap();
        sim.outb(ec::PORT_DATA, 80).unwrap();
        assert_eq!(sim.register(0xF1), 80);
    }
}
