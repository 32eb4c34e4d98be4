//! Two-byte frame construction and checksum arithmetic.

use x10_core::constants::{ADDRESS_HEADER, FUNCTION_HEADER};
use x10_core::{CommandCode, DimAmount, HouseCode, UnitCode};

/// A two-byte frame as written to the bridge.
///
/// Both frame kinds share the same shape: a header byte identifying the
/// frame type, followed by a payload byte packing two 4-bit wire codes.
///
/// # Examples
///
/// ```
/// use x10_core::{CommandCode, DimAmount, HouseCode, UnitCode};
/// use x10_protocol::{encode_address, encode_function};
///
/// let address = encode_address(HouseCode::A, UnitCode::new(1)?);
/// assert_eq!(address.as_bytes(), &[0x04, 0x66]);
///
/// let function = encode_function(HouseCode::A, CommandCode::On, DimAmount::new(50)?);
/// assert_eq!(function.as_bytes(), &[0x06, 0x62]);
/// # Ok::<(), x10_core::Error>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    bytes: [u8; 2],
}

impl Frame {
    /// Construct a frame from raw header and payload bytes.
    #[must_use]
    pub const fn from_parts(header: u8, payload: u8) -> Self {
        Frame {
            bytes: [header, payload],
        }
    }

    /// The frame's header byte.
    #[inline]
    #[must_use]
    pub const fn header(&self) -> u8 {
        self.bytes[0]
    }

    /// The frame's payload byte.
    #[inline]
    #[must_use]
    pub const fn payload(&self) -> u8 {
        self.bytes[1]
    }

    /// The frame as a slice, ready for the transport.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Sum of both frame bytes, truncated to eight bits.
    ///
    /// The bridge echoes this value after receiving a frame; the host
    /// only acknowledges when the echo matches.
    #[inline]
    #[must_use]
    pub fn checksum(&self) -> u8 {
        self.bytes[0].wrapping_add(self.bytes[1])
    }
}

/// Encode an address frame selecting one unit within a house.
#[must_use]
pub fn encode_address(house: HouseCode, unit: UnitCode) -> Frame {
    Frame::from_parts(
        ADDRESS_HEADER,
        house.wire_nibble() << 4 | unit.wire_nibble(),
    )
}

/// Encode a function frame carrying a command for a house.
///
/// For [`CommandCode::Dim`] and [`CommandCode::Bright`] the scaled
/// amount rides in bits 3-7 of the header byte; every other command
/// ignores `dim` and leaves the header untouched.
#[must_use]
pub fn encode_function(house: HouseCode, command: CommandCode, dim: DimAmount) -> Frame {
    let mut header = FUNCTION_HEADER;
    if command.is_dim_or_bright() {
        header |= dim.scale() << 3;
    }
    Frame::from_parts(header, house.wire_nibble() << 4 | command.to_u8())
}
