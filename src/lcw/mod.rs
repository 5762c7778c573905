//! Link Control Word extraction
//!
//! The 46 bits after the 24-bit burst preamble carry three interleaved BCH
//! codewords. The upstream demodulator emits symbols in reversed pair order,
//! so the bits are pair-swapped before the fixed de-interleave permutation
//! is applied. Any component whose syndrome cannot be resolved rejects the
//! whole LCW.

use bitvec::prelude::*;

use crate::bch::{LCW1_TABLE, LCW2_TABLE, LCW3_TABLE};
use crate::bits::bits_to_u32;

mod format;

/// Number of LCW bits following the burst preamble
pub const LCW_BITS: usize = 46;

/// De-interleave permutation, 1-indexed as published
const LCW_PERM: [usize; LCW_BITS] = [
    40, 39, 36, 35, 32, 31, 28, 27, 24, 23, //
    20, 19, 16, 15, 12, 11, 8, 7, 4, 3, //
    41, 38, 37, 34, 33, 30, 29, 26, 25, 22, //
    21, 18, 17, 14, 13, 10, 9, 6, 5, 2, //
    1, 46, 45, 44, 43, 42,
];

/// Decoded Link Control Word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lcw {
    /// Frame type; only `ft == 2` carries IDA payload
    pub ft: u8,
    /// 2-bit type from the second component
    pub lcw_ft: u8,
    /// 4-bit code from the second component
    pub lcw_code: u8,
    /// 21 data bits from the third component
    pub lcw3: u32,
    /// How many of the three components needed a correction
    pub fixed_errs: u8,
}

/// Decode the LCW from the bits following the preamble.
///
/// Returns `None` when fewer than 46 bits are available or any component
/// syndrome is unresolvable.
pub fn decode(data: &BitSlice<u8, Msb0>) -> Option<Lcw> {
    if data.len() < LCW_BITS {
        return None;
    }

    // Pair-swap, then the published permutation
    let mut lcw_bits = bitarr![u8, Msb0; 0; 46];
    for i in 0..LCW_BITS {
        let src = LCW_PERM[i] - 1;
        lcw_bits.set(i, data[src ^ 1]);
    }
    let lcw_bits = &lcw_bits[..LCW_BITS];

    // lcw1: 7 bits, top 3 are data
    let v1 = bits_to_u32(&lcw_bits[0..7]);
    let (v1, e1) = LCW1_TABLE.correct(v1)?;

    // lcw2: 13 bits plus a trailing pad zero, top 6 are data
    let v2 = bits_to_u32(&lcw_bits[7..20]) << 1;
    let (v2, e2) = LCW2_TABLE.correct(v2)?;

    // lcw3: 26 bits, top 21 are data
    let v3 = bits_to_u32(&lcw_bits[20..46]);
    let (v3, e3) = LCW3_TABLE.correct(v3)?;

    let lcw2_data = (v2 >> 8) & 0x3F;

    Some(Lcw {
        ft: ((v1 >> 4) & 0x7) as u8,
        lcw_ft: ((lcw2_data >> 4) & 0x3) as u8,
        lcw_code: (lcw2_data & 0xF) as u8,
        lcw3: v3 >> 5,
        fixed_errs: (e1 > 0) as u8 + (e2 > 0) as u8 + (e3 > 0) as u8,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bch;

    /// Build the 46 on-air bits for given component codewords by running the
    /// pair-swap + permutation backwards.
    fn encode_lcw_bits(cw1: u32, cw2: u32, cw3: u32) -> BitVec<u8, Msb0> {
        let mut lcw_bits = bitarr![u8, Msb0; 0; 46];
        for i in 0..7 {
            lcw_bits.set(i, (cw1 >> (6 - i)) & 1 != 0);
        }
        // only the top 13 bits of the padded 14-bit codeword are transmitted
        for i in 0..13 {
            lcw_bits.set(7 + i, (cw2 >> (13 - i)) & 1 != 0);
        }
        for i in 0..26 {
            lcw_bits.set(20 + i, (cw3 >> (25 - i)) & 1 != 0);
        }

        let mut wire = bitvec![u8, Msb0; 0; LCW_BITS];
        for i in 0..LCW_BITS {
            let src = LCW_PERM[i] - 1;
            wire.set(src ^ 1, lcw_bits[i]);
        }
        wire
    }

    /// Component codewords for an IDA LCW (`ft == 2`) with the given
    /// second/third component payloads.
    fn ida_lcw_codewords(lcw2_data: u32, lcw3_data: u32) -> (u32, u32, u32) {
        let cw1 = bch::encode(bch::LCW1_POLY, 2, 3);
        let cw2 = bch::encode(bch::LCW2_POLY, lcw2_data, 6);
        let cw3 = bch::encode(bch::LCW3_POLY, lcw3_data, 21);
        (cw1, cw2, cw3)
    }

    #[test]
    fn test_decode_clean_ida_lcw() {
        let (cw1, cw2, cw3) = ida_lcw_codewords(0, 0x0A5A5A);
        assert_eq!(cw2 & 1, 0, "transmitted lcw2 codeword must end in the pad zero");
        let wire = encode_lcw_bits(cw1, cw2, cw3);

        let lcw = decode(&wire).expect("clean LCW must decode");
        assert_eq!(lcw.ft, 2);
        assert_eq!(lcw.lcw_ft, 0);
        assert_eq!(lcw.lcw_code, 0);
        assert_eq!(lcw.lcw3, 0x0A5A5A);
        assert_eq!(lcw.fixed_errs, 0);
    }

    #[test]
    fn test_decode_corrects_single_bit_errors() {
        let (cw1, cw2, cw3) = ida_lcw_codewords(0, 0x155555);
        let mut wire = encode_lcw_bits(cw1, cw2, cw3);
        let flipped = !wire[11];
        wire.set(11, flipped);

        let lcw = decode(&wire).expect("single bit error must be corrected");
        assert_eq!(lcw.ft, 2);
        assert_eq!(lcw.lcw3, 0x155555);
        assert_eq!(lcw.fixed_errs, 1);
    }

    #[test]
    fn test_decode_rejects_unresolvable_component() {
        let (cw1, cw2, cw3) = ida_lcw_codewords(0, 0);
        let mut wire = encode_lcw_bits(cw1, cw2, cw3);
        // Wire positions 38 and 39 both land in the first component, which
        // corrects a single error only: a double error there has an
        // even-parity syndrome no single-bit entry can resolve.
        for i in [38usize, 39] {
            let v = !wire[i];
            wire.set(i, v);
        }
        assert!(decode(&wire).is_none());
    }

    #[test]
    fn test_decode_short_input() {
        let wire = bitvec![u8, Msb0; 0; 45];
        assert!(decode(&wire).is_none());
    }
}
