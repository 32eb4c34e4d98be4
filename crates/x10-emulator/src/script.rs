//! Scripted faults and the observable event log.

use x10_core::constants::CLOCK_FRAME_LEN;

/// A single misbehavior the emulator plays back in place of a normal
/// checksum echo.
///
/// Faults queue in order and each incoming two-byte frame consumes one,
/// so a script of two faults makes the first two frames fail and lets
/// every later frame through clean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Echo a deliberately wrong checksum.
    WrongChecksum,
    /// Report a power failure instead of the checksum.
    PowerFailure,
    /// Answer this frame, and every poll acknowledge after it, with the
    /// poll signal. The host's drain loop never reaches data.
    PollForever,
    /// Send nothing at all and let the host time out.
    Silent,
}

/// One observed step of the serial conversation, in arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmulatorEvent {
    /// A two-byte frame arrived (address or function).
    FrameReceived([u8; 2]),
    /// A scripted fault fired for the frame just received.
    FaultInjected(Fault),
    /// The host acknowledged a checksum echo.
    HostAcknowledged,
    /// A full seven-byte clock frame arrived.
    ClockSet([u8; CLOCK_FRAME_LEN]),
    /// The host acknowledged a poll signal and asked for buffered data.
    PollAcknowledged,
}

impl EmulatorEvent {
    /// `true` for events that record a two-byte frame arrival.
    #[must_use]
    pub fn is_frame(&self) -> bool {
        matches!(self, EmulatorEvent::FrameReceived(_))
    }
}
