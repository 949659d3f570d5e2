//! Exclusive-access EC transaction layer
//!
//! Serializes all transport calls under one lock so concurrent callers can
//! never interleave phases of two transactions and corrupt the bus protocol.
//! The lock is held for every attempt of one logical read or write,
//! including the retry backoff sleeps; the poll bound in the transport is
//! what caps the blocking window.
//!
//! Retry policy: a phase timeout restarts the whole transaction after a
//! short sleep, up to `RETRY_LIMIT` extra attempts. Exhausting the budget
//! returns `TransactionFailed` and bumps the error counter exactly once.
//! A failed call never surfaces a partially-read value.

use std::sync::atomic::{AtomicU64, Ordering};

use lgn_error::{LegionError, Result};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use super::portio::PortIo;
use super::transport::PortTransport;
use crate::constants::ec;

/// Cumulative transaction counters, readable through the status surface.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct EcStatistics {
    pub reads: u64,
    pub writes: u64,
    pub errors: u64,
}

pub struct EcSession {
    transport: Mutex<PortTransport<Box<dyn PortIo>>>,
    reads: AtomicU64,
    writes: AtomicU64,
    errors: AtomicU64,
}

impl EcSession {
    pub fn new(io: Box<dyn PortIo>) -> Self {
        Self {
            transport: Mutex::new(PortTransport::new(io)),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    pub fn read(&self, addr: u8, register: &'static str) -> Result<u8> {
        let value = self.transact("read", register, |t| t.read(addr))?;
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(value)
    }

    pub fn write(&self, addr: u8, value: u8, register: &'static str) -> Result<()> {
        self.transact("write", register, |t| t.write(addr, value))?;
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn transact<T>(
        &self,
        op: &'static str,
        register: &'static str,
        body: impl Fn(&PortTransport<Box<dyn PortIo>>) -> Result<T>,
    ) -> Result<T> {
        let transport = self.transport.lock();
        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            match body(&transport) {
                Ok(v) => return Ok(v),
                Err(LegionError::BusTimeout { phase }) if attempts <= ec::RETRY_LIMIT => {
                    debug!(op, register, phase, attempt = attempts, "EC timeout, retrying");
                    std::thread::sleep(ec::RETRY_BACKOFF);
                }
                Err(LegionError::BusTimeout { .. }) => {
                    self.errors.fetch_add(1, Ordering::Relaxed);
                    return Err(LegionError::TransactionFailed {
                        op,
                        register: register.to_string(),
                        attempts,
                    });
                }
                Err(e) => {
                    self.errors.fetch_add(1, Ordering::Relaxed);
                    return Err(e);
                }
            }
        }
    }

    pub fn stats(&self) -> EcStatistics {
        EcStatistics {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}
