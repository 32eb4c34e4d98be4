//! Core constants for the CM11A bridge protocol implementation.
//!
//! This module defines all protocol-level constants used throughout the
//! X10 bridge driver. These constants ensure consistent protocol compliance
//! and provide centralized configuration for protocol behavior.
//!
//! # Protocol Structure
//!
//! The bridge is half duplex: the host writes a 2-byte frame, the bridge
//! echoes the frame checksum, the host confirms with an acknowledge byte,
//! and the bridge finishes with its interface-ready byte.
//!
//! ```text
//! Host                          Bridge
//!  |------ 0x04 0x66 ----------->|    address frame (house A, unit 1)
//!  |<----------- 0x6A -----------|    checksum echo
//!  |------ 0x00 ---------------->|    acknowledge
//!  |<----------- 0x55 -----------|    interface ready
//! ```
//!
//! A function frame follows the same exchange with [`FUNCTION_HEADER`] in
//! place of [`ADDRESS_HEADER`]. Outside of host-initiated exchanges the
//! bridge can interject a single signal byte: [`POLL_SIGNAL`] when it holds
//! queued power-line data, or [`POWER_FAILURE`] when its clock was lost.
//!
//! # Usage
//!
//! ```
//! use x10_core::constants::*;
//!
//! // Checksum the bridge echoes for a frame
//! let frame = [ADDRESS_HEADER, 0x66];
//! let checksum = (u16::from(frame[0]) + u16::from(frame[1])) as u8;
//! assert_eq!(checksum, 0x6A);
//!
//! // Timeout configuration
//! use std::time::Duration;
//! let deadline = Duration::from_millis(READ_TIMEOUT_MS);
//! assert_eq!(deadline.as_millis(), 2500);
//! ```
//!
//! # Protocol Compliance
//!
//! These values are fixed by the CM11A-class bridge's documented command
//! set. Modifying them will break communication with real hardware.

// ============================================================================
// Wire Bytes
// ============================================================================

/// Header byte of an address frame.
///
/// The first byte of the 2-byte frame that selects a device on the power
/// line. The second byte packs the house code nibble over the unit code
/// nibble.
///
/// # Examples
///
/// ```
/// use x10_core::constants::ADDRESS_HEADER;
///
/// let frame = [ADDRESS_HEADER, 0x66];
/// assert_eq!(frame[0], 0x04);
/// ```
pub const ADDRESS_HEADER: u8 = 0x04;

/// Base header byte of a function frame.
///
/// The first byte of the 2-byte frame that carries the command for the
/// previously addressed device. For dim and bright commands the scaled
/// dim value is OR'd into bits 3-7 of this byte; all other commands send
/// it unmodified.
///
/// # Examples
///
/// ```
/// use x10_core::constants::FUNCTION_HEADER;
///
/// // Plain command
/// assert_eq!(FUNCTION_HEADER, 0x06);
///
/// // Dim command at full scale (22 << 3 | 0x06)
/// let header = (22u8 << 3) | FUNCTION_HEADER;
/// assert_eq!(header, 0xB6);
/// ```
pub const FUNCTION_HEADER: u8 = 0x06;

/// Acknowledge byte the host sends after a matching checksum echo.
pub const ACKNOWLEDGE: u8 = 0x00;

/// Ready byte the bridge returns after each acknowledge.
///
/// The driver reads and discards one byte at this point of the exchange;
/// a healthy bridge sends this value.
pub const INTERFACE_READY: u8 = 0x55;

/// Signal byte meaning the bridge holds queued power-line data.
///
/// The bridge repeats this value until the host starts the drain exchange
/// with [`POLL_ACKNOWLEDGE`].
pub const POLL_SIGNAL: u8 = 0x5A;

/// Byte the host writes to start draining queued bridge data.
pub const POLL_ACKNOWLEDGE: u8 = 0xC3;

/// Signal byte meaning the bridge lost power and its clock needs to be set.
pub const POWER_FAILURE: u8 = 0xA5;

/// Header byte of the 7-byte clock synchronization frame.
pub const CLOCK_HEADER: u8 = 0x9B;

/// Total length of the clock synchronization frame, header included.
pub const CLOCK_FRAME_LEN: usize = 7;

// ============================================================================
// Addressing Limits
// ============================================================================

/// Minimum valid unit code.
///
/// # Value: 1
pub const MIN_UNIT_CODE: u8 = 1;

/// Maximum valid unit code.
///
/// Sixteen devices can share one house code.
///
/// # Value: 16
pub const MAX_UNIT_CODE: u8 = 16;

// ============================================================================
// Dim Scaling
// ============================================================================

/// Minimum dim/bright percentage accepted by the driver.
///
/// # Value: 1
pub const MIN_DIM_PERCENT: u8 = 1;

/// Maximum dim/bright percentage accepted by the driver.
///
/// # Value: 100
pub const MAX_DIM_PERCENT: u8 = 100;

/// Ceiling of the 5-bit wire scale a dim percentage maps onto.
///
/// A percentage `p` is transmitted as `floor(p * 0.01 * 22)`, so 100%
/// scales to 22 and 1% scales to 0.
///
/// # Examples
///
/// ```
/// use x10_core::constants::DIM_SCALE_MAX;
///
/// let scaled = u32::from(100u8) * u32::from(DIM_SCALE_MAX) / 100;
/// assert_eq!(scaled, 22);
/// ```
pub const DIM_SCALE_MAX: u8 = 22;

/// Dim/bright percentage used when the caller does not supply one.
///
/// # Value: 50 (mid-range)
pub const DEFAULT_DIM_PERCENT: u8 = 50;

// ============================================================================
// Retry and Drain Policy
// ============================================================================

/// Maximum number of attempts for one command transaction.
///
/// One attempt covers the full address-then-function exchange; a failed
/// attempt restarts from the address frame.
///
/// # Value: 10
pub const MAX_SEND_ATTEMPTS: u32 = 10;

/// Maximum poll-acknowledge rounds before the drain gives up.
///
/// A misbehaving bridge that answers every [`POLL_ACKNOWLEDGE`] with
/// another [`POLL_SIGNAL`] would otherwise hold the bus lock forever.
/// Exceeding this cap raises a fatal error distinct from a timeout.
///
/// # Value: 16
pub const MAX_POLL_ROUNDS: u32 = 16;

/// Capacity of the drained-data buffer, in bytes.
///
/// Power-line bytes drained from the bridge are kept in a FIFO of this
/// size; the oldest bytes are dropped once it is full.
///
/// # Value: 256
pub const DRAINED_BUFFER_CAPACITY: usize = 256;

// ============================================================================
// Serial Link Configuration
// ============================================================================

/// Serial baud rate. The bridge only speaks 4800.
pub const SERIAL_BAUD_RATE: u32 = 4800;

/// Read deadline for one serial exchange (milliseconds).
///
/// # Value: 2500ms
///
/// # Examples
///
/// ```
/// use x10_core::constants::READ_TIMEOUT_MS;
/// use std::time::Duration;
///
/// let timeout = Duration::from_millis(READ_TIMEOUT_MS);
/// assert_eq!(timeout.as_secs(), 2);
/// ```
pub const READ_TIMEOUT_MS: u64 = 2500;

/// Write deadline for one serial exchange (milliseconds).
///
/// # Value: 2500ms
pub const WRITE_TIMEOUT_MS: u64 = 2500;

/// Upper bound of one read chunk, in bytes.
///
/// A single receive returns at most this many bytes; protocol steps
/// consume the chunked stream one byte at a time.
///
/// # Value: 1024
pub const READ_CHUNK_SIZE: usize = 1024;

/// Interval between ring-indicator line checks (milliseconds).
///
/// The watcher task polls the serial control line at this rate to notice
/// the bridge's out-of-band data-ready assertion.
///
/// # Value: 100ms
pub const RING_POLL_INTERVAL_MS: u64 = 100;

/// Capacity of the out-of-band signal channel.
///
/// Each entry is one byte the transport drained after a ring-indicator
/// assertion.
///
/// # Value: 32
pub const SIGNAL_CHANNEL_CAPACITY: usize = 32;
