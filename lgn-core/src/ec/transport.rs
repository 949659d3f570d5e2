//! Four-phase polled EC command protocol
//!
//! The bus is shared, unbuffered and has no completion interrupt, so every
//! phase waits for the controller's busy bit to clear by polling the status
//! port. A register read is: idle, command 0x80, idle, address, idle, collect
//! the data byte. A write pushes a value byte instead of collecting one and
//! waits for the final ack. Exceeding the poll bound at any phase aborts the
//! transaction with a timeout; a timed-out transaction never surfaces a data
//! byte.

use std::thread;

use lgn_error::{LegionError, Result};
use tracing::trace;

use super::portio::PortIo;
use crate::constants::ec;

pub struct PortTransport<P: PortIo> {
    io: P,
}

impl<P: PortIo> PortTransport<P> {
    pub fn new(io: P) -> Self {
        Self { io }
    }

    /// Poll the status port until the busy bit clears.
    ///
    /// Bounded busy-wait: `WAIT_ITERATIONS` polls with a short fixed delay.
    /// The caller holds the session lock for the whole transaction, so this
    /// delay is the unit that caps how long other hardware users block.
    fn wait_idle(&self, phase: &'static str) -> Result<()> {
        for _ in 0..ec::WAIT_ITERATIONS {
            let status = self.io.inb(ec::PORT_CMD)?;
            if status & ec::STATUS_BUSY == 0 {
                return Ok(());
            }
            thread::sleep(ec::WAIT_POLL_DELAY);
        }
        trace!(phase, "EC busy bit never cleared");
        Err(LegionError::BusTimeout { phase })
    }

    /// Read one register. All phases complete or the call fails.
    pub fn read(&self, addr: u8) -> Result<u8> {
        self.wait_idle("read-idle")?;
        self.io.outb(ec::PORT_CMD, ec::CMD_READ)?;
        self.wait_idle("read-command")?;
        self.io.outb(ec::PORT_DATA, addr)?;
        self.wait_idle("read-address")?;
        let value = self.io.inb(ec::PORT_DATA)?;
        Ok(value)
    }

    /// Write one register. All phases complete or the call fails.
    pub fn write(&self, addr: u8, value: u8) -> Result<()> {
        self.wait_idle("write-idle")?;
        self.io.outb(ec::PORT_CMD, ec::CMD_WRITE)?;
        self.wait_idle("write-command")?;
        self.io.outb(ec::PORT_DATA, addr)?;
        self.wait_idle("write-address")?;
        self.io.outb(ec::PORT_DATA, value)?;
        self.wait_idle("write-value")?;
        Ok(())
    }
}
