//! Clock frame encoding for power-failure recovery.

use chrono::{DateTime, Datelike, TimeZone, Timelike};
use x10_core::HouseCode;
use x10_core::constants::{CLOCK_FRAME_LEN, CLOCK_HEADER};

/// Encode a seven-byte clock frame for the given wall-clock time.
///
/// The bridge keeps a battery-backed clock and asks for a fresh setting
/// by signalling a power failure. The layout splits the time across
/// five data bytes:
///
/// ```text
/// [0] 0x9B            frame header
/// [1] seconds         0-59
/// [2] minutes         0-119, counted within the current two-hour block
/// [3] hour / 2        0-11
/// [4] day of year     low eight bits
/// [5] weekday         2 XOR days-from-Sunday; bit 7 set when the day
///                     of year exceeds 255
/// [6] house << 4      house code the bridge monitors for incoming data
/// ```
#[must_use]
pub fn encode_clock<Tz: TimeZone>(
    now: &DateTime<Tz>,
    monitored_house: HouseCode,
) -> [u8; CLOCK_FRAME_LEN] {
    let hour = now.hour();
    let minute = now.minute();
    let day_of_year = now.ordinal();

    let mut weekday = 2 ^ (now.weekday().num_days_from_sunday() as u8);
    if day_of_year > 255 {
        weekday |= 0x80;
    }

    [
        CLOCK_HEADER,
        now.second() as u8,
        ((hour * 60 + minute) % 120) as u8,
        (hour / 2) as u8,
        (day_of_year & 0xFF) as u8,
        weekday,
        monitored_house.wire_nibble() << 4,
    ]
}
