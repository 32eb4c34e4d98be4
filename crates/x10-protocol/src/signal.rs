//! Classification of bridge status bytes.

use x10_core::constants::{POLL_SIGNAL, POWER_FAILURE};

/// A status byte the bridge sends in place of a checksum echo, or
/// delivers out of band via the ring-indicator line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeSignal {
    /// The battery-backed clock lost power and wants a fresh setting.
    PowerFailure,
    /// Received power-line data is waiting in the bridge's buffer.
    Poll,
    /// Any other byte; carries no defined meaning for the host.
    Other(u8),
}

impl BridgeSignal {
    /// Classify a byte read where a checksum echo was expected.
    #[must_use]
    pub fn classify(byte: u8) -> Self {
        match byte {
            POWER_FAILURE => BridgeSignal::PowerFailure,
            POLL_SIGNAL => BridgeSignal::Poll,
            other => BridgeSignal::Other(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0xA5, BridgeSignal::PowerFailure)]
    #[case(0x5A, BridgeSignal::Poll)]
    #[case(0x00, BridgeSignal::Other(0x00))]
    #[case(0x55, BridgeSignal::Other(0x55))]
    #[case(0xFF, BridgeSignal::Other(0xFF))]
    fn test_classify(#[case] byte: u8, #[case] expected: BridgeSignal) {
        assert_eq!(BridgeSignal::classify(byte), expected);
    }
}
