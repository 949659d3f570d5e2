//! Embedded-controller bus access
//!
//! Layered bottom-up: `portio` is the raw byte primitive, `transport`
//! implements the four-phase polled command protocol on top of it,
//! `session` adds exclusive locking, retries and transaction counters.
//! `registers` is the static logical register table shared by all layers
//! above. `sim` provides an in-memory EC for bring-up and tests.

pub mod portio;
pub mod registers;
pub mod session;
pub mod sim;
pub mod transport;

pub use portio::{DevPortIo, PortIo};
pub use registers::{Register, RegisterMap, ValueDomain};
pub use session::{EcSession, EcStatistics};
pub use sim::SimulatedPort;
pub use transport::PortTransport;
