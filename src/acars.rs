//! ACARS message parsing out of SBD payloads
//!
//! An SBD payload starting with SOH (0x01) carries an ACARS block. The
//! parser strips the optional CRC suffix (two bytes followed by DEL), the
//! optional opaque 8-byte header, verifies per-byte odd parity and the
//! CRC-16/Kermit, then slices the fixed field layout: mode, registration,
//! technical ack, label, block id, and the STX-framed text with the uplink
//! sequence/flight prefix.

use crc::{Algorithm, Crc};
use tracing::trace;

use crate::frame::Direction;
use crate::sbd::SbdPacket;

/// ASCII control characters used by the block framing
pub const SOH: u8 = 0x01;
pub const STX: u8 = 0x02;
pub const ETX: u8 = 0x03;
pub const NAK: u8 = 0x15;
pub const ETB: u8 = 0x17;
pub const DEL: u8 = 0x7F;

/// CRC-16/Kermit: reflected 0x1021 (0x8408), init 0
const CRC_16_KERMIT: Algorithm<u16> = Algorithm {
    width: 16,
    poly: 0x1021,
    init: 0x0000,
    refin: true,
    refout: true,
    xorout: 0x0000,
    check: 0x2189,
    residue: 0x0000,
};

const ACARS_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_KERMIT);

/// A parsed ACARS message
#[derive(Debug, Clone)]
pub struct AcarsRecord {
    pub timestamp: u64,
    pub frequency: f64,
    pub magnitude: f32,
    pub direction: Direction,
    /// Mode character
    pub mode: u8,
    /// Aircraft registration with the leading '.' filler removed
    pub registration: String,
    /// Technical acknowledgement byte; NAK renders specially downstream
    pub ack: u8,
    /// Two raw label bytes; `_` + DEL is the "no label" convention
    pub label: [u8; 2],
    pub block_id: u8,
    /// Uplink message sequence number, when the STX section carries one
    pub sequence: Option<String>,
    /// Uplink flight number
    pub flight: Option<String>,
    /// Free text after STX (and after sequence/flight on uplink)
    pub text: Option<Vec<u8>>,
    /// Block ended with ETB: more blocks follow
    pub continuation: bool,
    /// Parity violations plus CRC failure
    pub errors: u32,
    /// Opaque 8-byte header when the block carried one
    pub header: Option<[u8; 8]>,
}

impl AcarsRecord {
    pub fn is_nak(&self) -> bool {
        self.ack == NAK
    }

    /// Label with the `_` + DEL pair remapped to `_d`
    pub fn label_string(&self) -> String {
        if self.label == [b'_', DEL] {
            "_d".to_string()
        } else {
            self.label.iter().map(|&b| char::from(b)).collect()
        }
    }
}

/// Parse an SBD payload as an ACARS block.
///
/// Returns `None` when the payload is not ACARS or too short to carry the
/// fixed field layout. Parity and CRC problems do not reject; they are
/// counted in `errors` and the output policy decides.
pub fn parse(packet: &SbdPacket) -> Option<AcarsRecord> {
    let data = packet.data.as_slice();
    if data.first() != Some(&SOH) {
        return None;
    }
    if data.len() <= 3 {
        return None;
    }
    let mut data = &data[1..];

    // CRC suffix: two checksum bytes then DEL
    let mut stored_crc = None;
    if data.len() >= 3 && data[data.len() - 1] == DEL {
        stored_crc = Some([data[data.len() - 3], data[data.len() - 2]]);
        data = &data[..data.len() - 3];
    }

    // Opaque header
    let mut header = None;
    if data.first() == Some(&0x03) && data.len() >= 8 {
        let mut h = [0u8; 8];
        h.copy_from_slice(&data[..8]);
        header = Some(h);
        data = &data[8..];
    }

    if data.len() < 13 {
        trace!(len = data.len(), "ACARS block too short");
        return None;
    }

    // Odd parity on every byte; strip bit 7
    let mut parity_errors = 0u32;
    let stripped: Vec<u8> = data
        .iter()
        .map(|&b| {
            if b.count_ones() % 2 == 0 {
                parity_errors += 1;
            }
            b & 0x7F
        })
        .collect();

    // CRC over the stripped block plus the stored checksum; zero residual
    // means the CRC holds. A missing checksum always counts as one error.
    let crc_error = match stored_crc {
        Some(csum) => {
            let mut digest = ACARS_CRC.digest();
            digest.update(&stripped);
            digest.update(&csum);
            (digest.finalize() != 0) as u32
        }
        None => 1,
    };

    let errors = parity_errors + crc_error;

    let mode = stripped[0];

    let reg_start = 1 + stripped[1..8].iter().take_while(|&&b| b == b'.').count();
    let registration: String = stripped[reg_start..8].iter().map(|&b| char::from(b)).collect();

    let ack = stripped[8];
    let label = [stripped[9], stripped[10]];
    let block_id = stripped[11];

    let mut rest = &stripped[12..];
    let mut continuation = false;
    match rest.last() {
        Some(&ETX) => rest = &rest[..rest.len() - 1],
        Some(&ETB) => {
            continuation = true;
            rest = &rest[..rest.len() - 1];
        }
        _ => {}
    }

    let mut sequence = None;
    let mut flight = None;
    let mut text = None;
    if rest.first() == Some(&STX) {
        let body = &rest[1..];
        if packet.direction == Direction::Uplink && rest.len() >= 11 {
            sequence = Some(body[..4].iter().map(|&b| char::from(b)).collect());
            flight = Some(body[4..10].iter().map(|&b| char::from(b)).collect());
            text = Some(body[10..].to_vec());
        } else {
            text = Some(body.to_vec());
        }
    }

    Some(AcarsRecord {
        timestamp: packet.timestamp,
        frequency: packet.frequency,
        magnitude: packet.magnitude,
        direction: packet.direction,
        mode,
        registration,
        ack,
        label,
        block_id,
        sequence,
        flight,
        text,
        continuation,
        errors,
        header,
    })
}
