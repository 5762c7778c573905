//! MT position extraction from IDA messages
//!
//! Some paging and hello packets embed the terminal's Earth-centered
//! position as three 12-bit two's-complement coordinates packed into five
//! bytes, in units of roughly 4 km. Positions whose Earth-center radius
//! falls outside 5000..7000 km are bogus fixes and are rejected.

use crate::frame::Direction;
use crate::ida::IdaMessage;

/// Mean Earth radius used for the altitude estimate, km
const EARTH_RADIUS_KM: f64 = 6371.0;
/// Plausibility window on the Earth-center distance, km
const RADIUS_MIN_KM: f64 = 5000.0;
const RADIUS_MAX_KM: f64 = 7000.0;

/// A decoded terminal position
#[derive(Debug, Clone, Copy)]
pub struct MtPosition {
    pub lat: f64,
    pub lon: f64,
    /// Height over the mean Earth radius, km
    pub alt_km: i32,
    /// Packet type word the position came from
    pub msg_type: u16,
    pub timestamp: u64,
    pub frequency: f64,
}

/// Unpack three 12-bit signed coordinates from 5 bytes, skipping `skip`
/// low bits of the 40-bit word.
fn xyz(bytes: &[u8], skip: u32) -> Option<(f64, f64, i32)> {
    let mut val = 0u64;
    for &b in &bytes[..5] {
        val = (val << 8) | b as u64;
    }

    let sb = 4 - skip;
    let mut x = ((val >> (24 + sb)) & 0xFFF) as i32;
    let mut y = ((val >> (12 + sb)) & 0xFFF) as i32;
    let mut z = ((val >> sb) & 0xFFF) as i32;

    if x > 0x7FF {
        x -= 0x1000;
    }
    if y > 0x7FF {
        y -= 0x1000;
    }
    if z > 0x7FF {
        z -= 0x1000;
    }

    if x == 0 && y == 0 && z == 0 {
        return None;
    }

    let (xf, yf, zf) = (x as f64, y as f64, z as f64);
    let lat = zf.atan2((xf * xf + yf * yf).sqrt()).to_degrees();
    let lon = yf.atan2(xf).to_degrees();

    let radius_km = (xf * xf + yf * yf + zf * zf).sqrt() * 4.0;
    let alt_km = (radius_km - EARTH_RADIUS_KM) as i32;

    if !(-90.0..=90.0).contains(&lat) {
        return None;
    }
    if !(RADIUS_MIN_KM..=RADIUS_MAX_KM).contains(&radius_km) {
        return None;
    }
    Some((lat, lon, alt_km))
}

/// Scan a reassembled IDA message for an embedded position.
pub fn extract(msg: &IdaMessage) -> Option<MtPosition> {
    let data = msg.data.as_slice();
    if data.len() < 5 {
        return None;
    }
    let msg_type = u16::from_be_bytes([data[0], data[1]]);

    let pos = match msg_type {
        // GSM paging: marker 0x1b then the packed position
        0x0605 => {
            if data.len() >= 42 && data[36] == 0x1B {
                xyz(&data[37..42], 0)
            } else {
                None
            }
        }
        // SBD paging with position
        0x7605 => {
            if data.len() >= 8 && data[2] == 0x00 && data[3] & 0xF0 == 0x40 {
                xyz(&data[3..8], 4)
            } else {
                None
            }
        }
        // Uplink hello with position
        0x0600 => {
            if msg.direction == Direction::Uplink
                && data.len() >= 24
                && matches!(data[2], 0x10 | 0x40 | 0x70)
                && data[18] == 0x01
            {
                xyz(&data[19..24], 0)
            } else {
                None
            }
        }
        _ => None,
    }?;

    Some(MtPosition {
        lat: pos.0,
        lon: pos.1,
        alt_km: pos.2,
        msg_type,
        timestamp: msg.timestamp,
        frequency: msg.frequency,
    })
}
