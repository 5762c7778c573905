//! IDA (Iridium Data) burst decoding
//!
//! A demodulated frame becomes an `IdaBurst` when its LCW decodes with
//! `ft == 2` and the descrambled BCH stream carries a plausible header:
//! 20 header bits, 160 payload bits and a 16-bit CRC-CCITT. The burst keeps
//! the full decoded stream and the preformatted LCW header so the line
//! serializers can render every field the way downstream scrapers expect.

use bitvec::prelude::*;
use crc::{Algorithm, Crc};
use tracing::trace;

use crate::bits::{bits_to_bytes, bits_to_u32};
use crate::frame::{DemodFrame, Direction};
use crate::lcw::{self, Lcw, LCW_BITS};

pub mod descramble;
pub mod reassemble;

pub use reassemble::{IdaMessage, IdaReassembler};

/// Burst preamble (unique word) length in bits
pub const PREAMBLE_BITS: usize = 24;
/// Minimum decoded stream for a complete burst: header + payload + CRC
const MIN_BCH_BITS: usize = 196;

/// CRC-CCITT-FALSE: poly 0x1021, init 0xFFFF, no reflection
const CRC_CCITT_FALSE: Algorithm<u16> = Algorithm {
    width: 16,
    poly: 0x1021,
    init: 0xFFFF,
    refin: false,
    refout: false,
    xorout: 0x0000,
    check: 0x29B1,
    residue: 0x0000,
};

const IDA_CRC: Crc<u16> = Crc::<u16>::new(&CRC_CCITT_FALSE);

/// One decoded IDA burst, before reassembly
#[derive(Debug, Clone)]
pub struct IdaBurst {
    pub timestamp: u64,
    pub frequency: f64,
    pub direction: Direction,
    pub magnitude: f32,
    pub noise: f32,
    pub level: f32,
    pub confidence: u8,
    pub n_symbols: i32,
    /// Sequence counter, 0..=7
    pub da_ctr: u8,
    /// Payload length in bytes, 0..=20
    pub da_len: usize,
    /// Continuation burst expected
    pub cont: bool,
    pub payload: [u8; 20],
    pub payload_len: usize,
    pub crc_ok: bool,
    pub stored_crc: u16,
    /// CCITT residual over the checked stream; zero when the CRC holds
    pub computed_crc: u16,
    /// BCH codewords that applied a correction
    pub fixed_errs: usize,
    /// Full decoded stream, kept for the parsed line output
    pub bch_stream: BitVec<u8, Msb0>,
    pub lcw: Lcw,
    /// Preformatted 111-character LCW header
    pub lcw_header: String,
}

/// Header and CRC fields recovered from a decoded BCH stream
#[derive(Debug, Clone)]
struct StreamFields {
    cont: bool,
    da_ctr: u8,
    da_len: usize,
    payload: [u8; 20],
    crc_ok: bool,
    stored_crc: u16,
    computed_crc: u16,
}

/// Parse the fixed layout of a >=196-bit BCH stream: 20 header bits,
/// 20 payload bytes, 16-bit CRC. Rejects a nonzero reserved field and
/// out-of-range lengths.
fn parse_stream(bch: &BitSlice<u8, Msb0>) -> Option<StreamFields> {
    if bch.len() < MIN_BCH_BITS {
        return None;
    }

    let cont = bch[3];
    let da_ctr = bits_to_u32(&bch[5..8]) as u8;
    let da_len = bits_to_u32(&bch[11..16]) as usize;
    let zero1 = bits_to_u32(&bch[17..20]);

    if zero1 != 0 {
        return None;
    }
    if da_len > 20 {
        return None;
    }

    let mut payload = [0u8; 20];
    for (i, b) in payload.iter_mut().enumerate() {
        *b = bits_to_u32(&bch[20 + i * 8..28 + i * 8]) as u8;
    }

    let mut crc_ok = false;
    let mut stored_crc = 0u16;
    let mut computed_crc = 0u16;
    if da_len > 0 {
        stored_crc = bits_to_u32(&bch[180..196]) as u16;

        // Checked stream: header, 12 pad zeros, then payload + stored CRC
        // (everything up to the final 4 flush bits). A zero residual means
        // the CRC holds.
        let mut checked: BitVec<u8, Msb0> = BitVec::with_capacity(bch.len() + 12);
        checked.extend_from_bitslice(&bch[..20]);
        checked.resize(32, false);
        checked.extend_from_bitslice(&bch[20..bch.len() - 4]);

        computed_crc = IDA_CRC.checksum(&bits_to_bytes(&checked));
        crc_ok = computed_crc == 0;
    }

    Some(StreamFields { cont, da_ctr, da_len, payload, crc_ok, stored_crc, computed_crc })
}

/// Try to decode a demodulated frame as an IDA burst.
///
/// Every reject path is silent (`None`): wrong frame type, unresolvable
/// FEC, malformed header. A CRC mismatch is not a reject; the burst is
/// returned with `crc_ok == false` and reassembly refuses it later.
pub fn decode(frame: &DemodFrame) -> Option<IdaBurst> {
    if frame.bits.len() < PREAMBLE_BITS + LCW_BITS + descramble::BLOCK_BITS {
        return None;
    }
    if !frame.direction.is_link() {
        return None;
    }
    debug_assert!(frame.llr_aligned());

    let data = &frame.bits[PREAMBLE_BITS..];
    let lcw = lcw::decode(data)?;
    if lcw.ft != 2 {
        return None;
    }

    let payload = &data[LCW_BITS..];
    let payload_llr = frame
        .llr
        .as_deref()
        .filter(|l| l.len() == frame.bits.len())
        .map(|l| &l[PREAMBLE_BITS + LCW_BITS..]);
    if payload.len() < descramble::BLOCK_BITS {
        return None;
    }

    let stream = descramble::descramble(payload, payload_llr);
    if stream.bch.len() < MIN_BCH_BITS {
        trace!(id = frame.id, bch_len = stream.bch.len(), "short BCH stream");
        return None;
    }

    let bch = stream.bch;
    let fields = parse_stream(&bch)?;

    Some(IdaBurst {
        timestamp: frame.timestamp,
        frequency: frame.center_frequency,
        direction: frame.direction,
        magnitude: frame.magnitude,
        noise: frame.noise,
        level: frame.level,
        confidence: frame.confidence,
        n_symbols: frame.n_payload_symbols,
        da_ctr: fields.da_ctr,
        da_len: fields.da_len,
        cont: fields.cont,
        payload: fields.payload,
        payload_len: if fields.da_len > 0 { fields.da_len } else { 20 },
        crc_ok: fields.crc_ok,
        stored_crc: fields.stored_crc,
        computed_crc: fields.computed_crc,
        fixed_errs: stream.fixed_errs,
        bch_stream: bch,
        lcw,
        lcw_header: lcw.header(),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::bits::push_uint;

    /// Build a 200-bit BCH stream with a valid header and CRC.
    pub(crate) fn build_bch_stream(
        cont: bool,
        da_ctr: u8,
        da_len: usize,
        payload: &[u8],
    ) -> BitVec<u8, Msb0> {
        let mut bch = bitvec![u8, Msb0; 0; 20];
        bch.set(3, cont);
        for i in 0..3 {
            bch.set(5 + i, (da_ctr >> (2 - i)) & 1 != 0);
        }
        for i in 0..5 {
            bch.set(11 + i, (da_len >> (4 - i)) & 1 != 0);
        }

        let mut bytes = [0u8; 20];
        bytes[..payload.len()].copy_from_slice(payload);
        for b in bytes {
            push_uint(&mut bch, b as u32, 8);
        }

        // CRC over header + 12 pad zeros + payload, appended as bits 180..196
        let mut checked: BitVec<u8, Msb0> = BitVec::new();
        checked.extend_from_bitslice(&bch[..20]);
        checked.resize(32, false);
        checked.extend_from_bitslice(&bch[20..180]);
        let crc = IDA_CRC.checksum(&crate::bits::bits_to_bytes(&checked));
        push_uint(&mut bch, crc as u32, 16);

        // flush bits
        bch.resize(200, false);
        bch
    }

    #[test]
    fn test_crc_algorithm_check_value() {
        assert_eq!(IDA_CRC.checksum(b"123456789"), 0x29B1);
    }

    #[test]
    fn test_stream_round_trip_crc_ok() {
        let bch = build_bch_stream(false, 0, 2, b"AB");
        let f = parse_stream(&bch).unwrap();
        assert!(!f.cont);
        assert_eq!(f.da_ctr, 0);
        assert_eq!(f.da_len, 2);
        assert_eq!(&f.payload[..2], b"AB");
        assert!(f.crc_ok);
        assert_eq!(f.computed_crc, 0);
    }

    #[test]
    fn test_corrupted_payload_fails_crc() {
        let mut bch = build_bch_stream(false, 0, 4, b"WXYZ");
        let v = !bch[42];
        bch.set(42, v);
        let f = parse_stream(&bch).unwrap();
        assert!(!f.crc_ok);
        assert_ne!(f.computed_crc, 0);
    }

    #[test]
    fn test_zero_length_burst_skips_crc() {
        let bch = build_bch_stream(false, 3, 0, b"");
        let f = parse_stream(&bch).unwrap();
        assert_eq!(f.da_len, 0);
        assert!(!f.crc_ok);
        assert_eq!(f.da_ctr, 3);
    }

    #[test]
    fn test_nonzero_reserved_field_rejects() {
        let mut bch = build_bch_stream(false, 0, 2, b"AB");
        bch.set(18, true);
        assert!(parse_stream(&bch).is_none());
    }

    #[test]
    fn test_da_len_over_limit_rejects() {
        let mut bch = build_bch_stream(false, 0, 0, b"");
        // force da_len = 21
        for (i, bit) in [1u8, 0, 1, 0, 1].iter().enumerate() {
            bch.set(11 + i, *bit != 0);
        }
        assert!(parse_stream(&bch).is_none());
    }

    #[test]
    fn test_short_stream_rejects() {
        let bch = bitvec![u8, Msb0; 0; 195];
        assert!(parse_stream(&bch).is_none());
    }
}
