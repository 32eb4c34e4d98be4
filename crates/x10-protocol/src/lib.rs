//! Wire protocol for the power-line bridge.
//!
//! Everything the bridge understands travels as short binary frames over
//! a half-duplex serial link. This crate builds those frames and
//! classifies the status bytes the bridge sends back; it performs no I/O
//! of its own.
//!
//! # Frame Format
//!
//! ```text
//! Address frame (select a device):
//! +--------+-----------------+
//! | 0x04   | house | unit    |   payload packs two 4-bit wire codes,
//! +--------+-----------------+   house in the high nibble
//!
//! Function frame (act on the selected devices):
//! +--------+-----------------+
//! | header | house | command |   header = 0x06, with the scaled dim
//! +--------+-----------------+   amount in bits 3-7 for dim/bright
//! ```
//!
//! After each frame the bridge echoes the 8-bit sum of both bytes. The
//! host acknowledges a matching echo with `0x00` and the bridge answers
//! `0x55` when it is ready for the next frame. A non-matching echo is a
//! status byte; see [`BridgeSignal`].

pub mod clock;
pub mod frame;
pub mod signal;

pub use clock::encode_clock;
pub use frame::{Frame, encode_address, encode_function};
pub use signal::BridgeSignal;
