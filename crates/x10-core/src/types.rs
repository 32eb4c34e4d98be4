use crate::{
    Result,
    constants::{MAX_DIM_PERCENT, MAX_UNIT_CODE, MIN_DIM_PERCENT, MIN_UNIT_CODE},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Power-line code table shared by house letters and unit numbers.
///
/// The bridge does not transmit addresses in alphabetical or numeric
/// order; each of the sixteen positions has a fixed 4-bit pattern from
/// the device's documented command set. Index 0 is house A / unit 1.
const DEVICE_CODE_TABLE: [u8; 16] = [
    0x6, 0xE, 0x2, 0xA, 0x1, 0x9, 0x5, 0xD, 0x7, 0xF, 0x3, 0xB, 0x0, 0x8, 0x4, 0xC,
];

/// House code A-P identifying a logical group of devices.
///
/// The discriminant of each variant is its 4-bit wire pattern, not the
/// letter's position in the alphabet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum HouseCode {
    A = 0x6,
    B = 0xE,
    C = 0x2,
    D = 0xA,
    E = 0x1,
    F = 0x9,
    G = 0x5,
    H = 0xD,
    I = 0x7,
    J = 0xF,
    K = 0x3,
    L = 0xB,
    M = 0x0,
    N = 0x8,
    O = 0x4,
    P = 0xC,
}

impl HouseCode {
    /// Create a house code from its letter, case-insensitive.
    ///
    /// # Errors
    /// Returns `Error::InvalidArgument` if the character is outside A-P.
    pub fn from_char(c: char) -> Result<Self> {
        match c.to_ascii_uppercase() {
            'A' => Ok(HouseCode::A),
            'B' => Ok(HouseCode::B),
            'C' => Ok(HouseCode::C),
            'D' => Ok(HouseCode::D),
            'E' => Ok(HouseCode::E),
            'F' => Ok(HouseCode::F),
            'G' => Ok(HouseCode::G),
            'H' => Ok(HouseCode::H),
            'I' => Ok(HouseCode::I),
            'J' => Ok(HouseCode::J),
            'K' => Ok(HouseCode::K),
            'L' => Ok(HouseCode::L),
            'M' => Ok(HouseCode::M),
            'N' => Ok(HouseCode::N),
            'O' => Ok(HouseCode::O),
            'P' => Ok(HouseCode::P),
            _ => Err(Error::InvalidArgument(format!(
                "House code must be a letter A-P, got '{c}'"
            ))),
        }
    }

    /// The 4-bit pattern this house occupies on the wire.
    #[inline]
    #[must_use]
    pub fn wire_nibble(self) -> u8 {
        self as u8
    }

    /// The house letter.
    #[must_use]
    pub fn to_char(self) -> char {
        match self {
            HouseCode::A => 'A',
            HouseCode::B => 'B',
            HouseCode::C => 'C',
            HouseCode::D => 'D',
            HouseCode::E => 'E',
            HouseCode::F => 'F',
            HouseCode::G => 'G',
            HouseCode::H => 'H',
            HouseCode::I => 'I',
            HouseCode::J => 'J',
            HouseCode::K => 'K',
            HouseCode::L => 'L',
            HouseCode::M => 'M',
            HouseCode::N => 'N',
            HouseCode::O => 'O',
            HouseCode::P => 'P',
        }
    }
}

impl fmt::Display for HouseCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

impl std::str::FromStr for HouseCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => HouseCode::from_char(c),
            _ => Err(Error::InvalidArgument(format!(
                "House code must be a single letter A-P, got '{s}'"
            ))),
        }
    }
}

/// Unit number 1-16 identifying a device within a house code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8")]
pub struct UnitCode(u8);

impl UnitCode {
    /// Create a unit code with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidArgument` if the unit is outside the valid
    /// range (1-16).
    pub fn new(unit: u8) -> Result<Self> {
        if !(MIN_UNIT_CODE..=MAX_UNIT_CODE).contains(&unit) {
            return Err(Error::InvalidArgument(format!(
                "Unit code must be {MIN_UNIT_CODE}-{MAX_UNIT_CODE}, got {unit}"
            )));
        }
        Ok(UnitCode(unit))
    }

    /// Get the raw unit number as u8.
    #[inline]
    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }

    /// The 4-bit pattern this unit occupies on the wire.
    ///
    /// Units use the same scrambled code table as house letters, so unit
    /// 16 fits in four bits rather than overflowing into the house nibble.
    #[inline]
    #[must_use]
    pub fn wire_nibble(&self) -> u8 {
        DEVICE_CODE_TABLE[usize::from(self.0 - 1)]
    }
}

impl fmt::Display for UnitCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UnitCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let unit: u8 = s.trim().parse().map_err(|_| {
            Error::InvalidArgument(format!("Invalid unit code: {s}"))
        })?;
        UnitCode::new(unit)
    }
}

impl TryFrom<u8> for UnitCode {
    type Error = Error;

    fn try_from(unit: u8) -> Result<Self> {
        UnitCode::new(unit)
    }
}

/// Device command carried by a function frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CommandCode {
    AllUnitsOff = 0x0,
    AllLightsOn = 0x1,
    On = 0x2,
    Off = 0x3,
    Dim = 0x4,
    Bright = 0x5,
    AllLightsOff = 0x6,
    ExtendedCode = 0x7,
    HailRequest = 0x8,
    HailAcknowledge = 0x9,
    PresetDim1 = 0xA,
    PresetDim2 = 0xB,
    ExtendedDataTransfer = 0xC,
    StatusOn = 0xD,
    StatusOff = 0xE,
    StatusRequest = 0xF,
}

impl CommandCode {
    /// Create a command code from its 4-bit wire value.
    ///
    /// # Errors
    /// Returns `Error::InvalidArgument` if the value does not fit in
    /// four bits.
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0x0 => Ok(CommandCode::AllUnitsOff),
            0x1 => Ok(CommandCode::AllLightsOn),
            0x2 => Ok(CommandCode::On),
            0x3 => Ok(CommandCode::Off),
            0x4 => Ok(CommandCode::Dim),
            0x5 => Ok(CommandCode::Bright),
            0x6 => Ok(CommandCode::AllLightsOff),
            0x7 => Ok(CommandCode::ExtendedCode),
            0x8 => Ok(CommandCode::HailRequest),
            0x9 => Ok(CommandCode::HailAcknowledge),
            0xA => Ok(CommandCode::PresetDim1),
            0xB => Ok(CommandCode::PresetDim2),
            0xC => Ok(CommandCode::ExtendedDataTransfer),
            0xD => Ok(CommandCode::StatusOn),
            0xE => Ok(CommandCode::StatusOff),
            0xF => Ok(CommandCode::StatusRequest),
            _ => Err(Error::InvalidArgument(format!(
                "Command code must be 0-15, got {value}"
            ))),
        }
    }

    /// Convert the command to its 4-bit wire value.
    #[inline]
    #[must_use]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Returns `true` for the two commands that carry a dim scale in
    /// their function frame header.
    #[inline]
    #[must_use]
    pub fn is_dim_or_bright(self) -> bool {
        matches!(self, CommandCode::Dim | CommandCode::Bright)
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            CommandCode::AllUnitsOff => "AllUnitsOff",
            CommandCode::AllLightsOn => "AllLightsOn",
            CommandCode::On => "On",
            CommandCode::Off => "Off",
            CommandCode::Dim => "Dim",
            CommandCode::Bright => "Bright",
            CommandCode::AllLightsOff => "AllLightsOff",
            CommandCode::ExtendedCode => "ExtendedCode",
            CommandCode::HailRequest => "HailRequest",
            CommandCode::HailAcknowledge => "HailAcknowledge",
            CommandCode::PresetDim1 => "PresetDim1",
            CommandCode::PresetDim2 => "PresetDim2",
            CommandCode::ExtendedDataTransfer => "ExtendedDataTransfer",
            CommandCode::StatusOn => "StatusOn",
            CommandCode::StatusOff => "StatusOff",
            CommandCode::StatusRequest => "StatusRequest",
        };
        write!(f, "{name}")
    }
}

/// Dim or bright strength as a percentage, 1-100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8")]
pub struct DimAmount(u8);

impl DimAmount {
    /// Create a dim amount with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidArgument` if the percentage is outside the
    /// valid range (1-100).
    pub fn new(amount: u8) -> Result<Self> {
        if !(MIN_DIM_PERCENT..=MAX_DIM_PERCENT).contains(&amount) {
            return Err(Error::InvalidArgument(format!(
                "Dim amount must be {MIN_DIM_PERCENT}-{MAX_DIM_PERCENT}, got {amount}"
            )));
        }
        Ok(DimAmount(amount))
    }

    /// Get the raw percentage as u8.
    #[inline]
    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }

    /// Scale the percentage onto the bridge's 5-bit range.
    ///
    /// `floor(percent * 0.01 * 22)` in integer form: 1 maps to 0 and 100
    /// maps to 22, monotonically.
    #[inline]
    #[must_use]
    pub fn scale(&self) -> u8 {
        (u32::from(self.0) * u32::from(crate::constants::DIM_SCALE_MAX) / 100) as u8
    }
}

impl fmt::Display for DimAmount {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl TryFrom<u8> for DimAmount {
    type Error = Error;

    fn try_from(amount: u8) -> Result<Self> {
        DimAmount::new(amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case('A', HouseCode::A, 0x6)]
    #[case('a', HouseCode::A, 0x6)]
    #[case('E', HouseCode::E, 0x1)]
    #[case('m', HouseCode::M, 0x0)]
    #[case('P', HouseCode::P, 0xC)]
    fn test_house_code_valid(
        #[case] input: char,
        #[case] expected: HouseCode,
        #[case] nibble: u8,
    ) {
        let house = HouseCode::from_char(input).unwrap();
        assert_eq!(house, expected);
        assert_eq!(house.wire_nibble(), nibble);
    }

    #[rstest]
    #[case('Q')]
    #[case('1')]
    #[case('@')]
    fn test_house_code_invalid(#[case] input: char) {
        assert!(HouseCode::from_char(input).is_err());
    }

    #[test]
    fn test_house_code_from_str() {
        let house: HouseCode = "c".parse().unwrap();
        assert_eq!(house, HouseCode::C);
        assert!("AB".parse::<HouseCode>().is_err());
        assert!("".parse::<HouseCode>().is_err());
    }

    #[test]
    fn test_house_codes_cover_the_table() {
        let letters = [
            HouseCode::A,
            HouseCode::B,
            HouseCode::C,
            HouseCode::D,
            HouseCode::E,
            HouseCode::F,
            HouseCode::G,
            HouseCode::H,
            HouseCode::I,
            HouseCode::J,
            HouseCode::K,
            HouseCode::L,
            HouseCode::M,
            HouseCode::N,
            HouseCode::O,
            HouseCode::P,
        ];
        for (i, house) in letters.iter().enumerate() {
            assert_eq!(house.wire_nibble(), DEVICE_CODE_TABLE[i]);
        }
    }

    #[rstest]
    #[case(1, 0x6)]
    #[case(2, 0xE)]
    #[case(13, 0x0)]
    #[case(16, 0xC)]
    fn test_unit_code_valid(#[case] unit: u8, #[case] nibble: u8) {
        let code = UnitCode::new(unit).unwrap();
        assert_eq!(code.as_u8(), unit);
        assert_eq!(code.wire_nibble(), nibble);
    }

    #[rstest]
    #[case(0)]
    #[case(17)]
    #[case(255)]
    fn test_unit_code_invalid(#[case] unit: u8) {
        assert!(UnitCode::new(unit).is_err());
    }

    #[test]
    fn test_unit_code_shares_house_table() {
        // Unit 1 and house A occupy the same wire pattern
        assert_eq!(
            UnitCode::new(1).unwrap().wire_nibble(),
            HouseCode::A.wire_nibble()
        );
        assert_eq!(
            UnitCode::new(16).unwrap().wire_nibble(),
            HouseCode::P.wire_nibble()
        );
    }

    #[test]
    fn test_unit_code_from_str() {
        let unit: UnitCode = "15".parse().unwrap();
        assert_eq!(unit.as_u8(), 15);
        assert!("0".parse::<UnitCode>().is_err());
        assert!("abc".parse::<UnitCode>().is_err());
    }

    #[rstest]
    #[case("0")]
    #[case("17")]
    #[case("255")]
    fn test_unit_code_deserialization_rejects_out_of_range(#[case] json: &str) {
        assert!(serde_json::from_str::<UnitCode>(json).is_err());
    }

    #[test]
    fn test_unit_code_deserialization_validates() {
        let unit: UnitCode = serde_json::from_str("16").unwrap();
        assert_eq!(unit.wire_nibble(), HouseCode::P.wire_nibble());
    }

    #[test]
    fn test_command_code_round_trip() {
        for value in 0x0..=0xF {
            let command = CommandCode::from_u8(value).unwrap();
            assert_eq!(command.to_u8(), value);
        }
        assert!(CommandCode::from_u8(16).is_err());
    }

    #[test]
    fn test_command_dim_or_bright() {
        assert!(CommandCode::Dim.is_dim_or_bright());
        assert!(CommandCode::Bright.is_dim_or_bright());
        assert!(!CommandCode::On.is_dim_or_bright());
        assert!(!CommandCode::StatusRequest.is_dim_or_bright());
    }

    #[rstest]
    #[case(1, 0)]
    #[case(4, 0)]
    #[case(5, 1)]
    #[case(50, 11)]
    #[case(99, 21)]
    #[case(100, 22)]
    fn test_dim_amount_scale(#[case] percent: u8, #[case] scaled: u8) {
        let dim = DimAmount::new(percent).unwrap();
        assert_eq!(dim.scale(), scaled);
    }

    #[rstest]
    #[case(0)]
    #[case(101)]
    fn test_dim_amount_invalid(#[case] percent: u8) {
        assert!(DimAmount::new(percent).is_err());
    }

    #[rstest]
    #[case("0")]
    #[case("101")]
    fn test_dim_amount_deserialization_rejects_out_of_range(#[case] json: &str) {
        assert!(serde_json::from_str::<DimAmount>(json).is_err());
    }

    #[test]
    fn test_dim_scale_monotonic() {
        let mut previous = 0;
        for percent in 1..=100 {
            let scaled = DimAmount::new(percent).unwrap().scale();
            assert!(scaled >= previous, "scale({percent}) went backwards");
            previous = scaled;
        }
    }
}
