//! Driver for the serial power-line bridge.
//!
//! Layered from the wire up:
//!
//! - [`transport`]: one open port, timeout-bounded cancellable I/O,
//!   and the ring-indicator watcher that surfaces unsolicited status
//!   bytes.
//! - [`engine`]: the checksummed frame exchange with retries, clock
//!   recovery, and poll draining, all serialized on the bus lock.
//! - [`registry`]: shares one engine per port between callers and
//!   closes the port when the last share is returned.
//! - [`controller`]: the [`X10Controller`] facade and the [`Backend`]
//!   selection between serial and radio.

pub mod controller;
pub mod engine;
pub mod radio;
pub mod registry;
pub mod transport;

pub use controller::{Backend, X10Controller};
pub use engine::ProtocolEngine;
pub use radio::RadioController;
pub use registry::{DeviceHandle, DeviceRegistry};
pub use transport::{MockPortHandle, Transport};
