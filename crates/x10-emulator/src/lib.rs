//! In-memory stand-in for the power-line bridge.
//!
//! [`BridgeEmulator`] speaks the bridge's side of the serial
//! conversation over any byte stream: it echoes frame checksums,
//! answers host acknowledgements with the ready byte, accepts clock
//! frames, and serves buffered power-line data when polled. Faults can
//! be scripted ahead of time to exercise the driver's retry and
//! recovery paths without hardware on the bench.
//!
//! The emulator records everything it observes as an ordered
//! [`EmulatorEvent`] log and hands the log back when the peer hangs up.

pub mod bridge;
pub mod script;

pub use bridge::{BridgeEmulator, EmulatorError};
pub use script::{EmulatorEvent, Fault};
