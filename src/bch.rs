//! BCH syndrome tables and Chase-5 soft-decision decoding
//!
//! The IDA payload uses BCH(31,20) with generator polynomial 3545 (t = 2);
//! the three LCW components use their own short polynomials. Correction is
//! table-driven: each table maps a syndrome to the error pattern that
//! produced it, built once at startup by enumerating all one- and (where the
//! code allows) two-bit errors.
//!
//! When the hard decision fails and soft values are available, `decode_block`
//! retries with a Chase-5 search: flip every nonzero subset of the five
//! least-reliable bit positions and accept the first pattern the table
//! resolves.

use once_cell::sync::Lazy;

use crate::bits::gf2_remainder;

/// BCH(31,20) generator for IDA/ACCH payload blocks, t = 2
pub const IDA_POLY: u32 = 3545;
/// LCW component generators
pub const LCW1_POLY: u32 = 29;
pub const LCW2_POLY: u32 = 465;
pub const LCW3_POLY: u32 = 41;

/// Codeword / data widths for the payload code
pub const IDA_BLOCK_BITS: usize = 31;
pub const IDA_DATA_BITS: usize = 20;
const IDA_SYNDROME_BITS: u32 = 11;

/// Chase-5: number of least-reliable positions eligible for flipping
const CHASE_FLIP_BITS: usize = 5;

#[derive(Debug, Clone, Copy)]
pub struct Correction {
    /// Number of bit errors this syndrome maps to (1 or 2)
    pub errs: u8,
    /// XOR mask that removes the error pattern
    pub locator: u32,
}

/// Syndrome-to-error-locator table for one generator polynomial
pub struct SyndromeTable {
    poly: u32,
    entries: Vec<Option<Correction>>,
}

impl SyndromeTable {
    /// Enumerate all 1-bit (and optionally 2-bit) error patterns over
    /// `nbits` positions. Single-bit entries are written first and two-bit
    /// patterns never overwrite them.
    fn build(poly: u32, nbits: usize, max_errors: u8) -> Self {
        let deg = 31 - poly.leading_zeros();
        let mut entries: Vec<Option<Correction>> = vec![None; 1 << deg];

        for b in 0..nbits {
            let e = 1u32 << b;
            let r = gf2_remainder(poly, e) as usize;
            entries[r] = Some(Correction { errs: 1, locator: e });
        }

        if max_errors >= 2 {
            for b1 in 0..nbits {
                for b2 in b1 + 1..nbits {
                    let e = (1u32 << b1) | (1u32 << b2);
                    let r = gf2_remainder(poly, e) as usize;
                    if entries[r].is_none() {
                        entries[r] = Some(Correction { errs: 2, locator: e });
                    }
                }
            }
        }

        SyndromeTable { poly, entries }
    }

    /// Syndrome of `value` under this table's generator
    pub fn syndrome(&self, value: u32) -> u32 {
        gf2_remainder(self.poly, value)
    }

    /// Correct `value` if its syndrome is zero or resolvable.
    ///
    /// Returns the corrected codeword and the number of bits flipped;
    /// `None` means the syndrome is absent from the table.
    pub fn correct(&self, value: u32) -> Option<(u32, u8)> {
        let s = self.syndrome(value);
        if s == 0 {
            return Some((value, 0));
        }
        self.entries[s as usize].map(|c| (value ^ c.locator, c.errs))
    }
}

pub static IDA_TABLE: Lazy<SyndromeTable> =
    Lazy::new(|| SyndromeTable::build(IDA_POLY, IDA_BLOCK_BITS, 2));
pub static LCW1_TABLE: Lazy<SyndromeTable> = Lazy::new(|| SyndromeTable::build(LCW1_POLY, 7, 1));
pub static LCW2_TABLE: Lazy<SyndromeTable> = Lazy::new(|| SyndromeTable::build(LCW2_POLY, 14, 1));
pub static LCW3_TABLE: Lazy<SyndromeTable> = Lazy::new(|| SyndromeTable::build(LCW3_POLY, 26, 2));

/// Result of decoding one 31-bit payload block
#[derive(Debug, Clone, Copy)]
pub struct BlockDecode {
    /// The 20 recovered data bits
    pub data: u32,
    /// Bit errors resolved by the syndrome table (0 when Chase found an
    /// exact codeword)
    pub errs: u8,
    /// Whether any correction was applied, table-hit or Chase
    pub corrected: bool,
}

/// Decode a 31-bit BCH block given as a packed codeword, hard decision first,
/// Chase-5 on the soft values if that fails.
///
/// `llr[i]` is the reliability of bit `i` (MSB first, same order as the
/// codeword); higher means more confident. Returns `None` when the block is
/// uncorrectable.
pub fn decode_block(codeword: u32, llr: Option<&[f32]>) -> Option<BlockDecode> {
    if let Some((fixed, errs)) = IDA_TABLE.correct(codeword) {
        return Some(BlockDecode {
            data: fixed >> IDA_SYNDROME_BITS,
            errs,
            corrected: errs > 0,
        });
    }

    // Hard decision failed; without soft values the block is lost
    let llr = llr?;
    debug_assert_eq!(llr.len(), IDA_BLOCK_BITS);

    // Partial selection sort: the CHASE_FLIP_BITS least-reliable positions.
    // Ties keep the lower index so candidate order is stable.
    let mut pos: [usize; IDA_BLOCK_BITS] = core::array::from_fn(|i| i);
    for i in 0..CHASE_FLIP_BITS {
        let mut min_idx = i;
        for j in i + 1..IDA_BLOCK_BITS {
            if llr[pos[j]] < llr[pos[min_idx]] {
                min_idx = j;
            }
        }
        pos.swap(i, min_idx);
    }

    let mut flip_mask = [0u32; CHASE_FLIP_BITS];
    for i in 0..CHASE_FLIP_BITS {
        flip_mask[i] = 1 << (IDA_BLOCK_BITS - 1 - pos[i]);
    }

    for mask in 1u32..(1 << CHASE_FLIP_BITS) {
        let mut flipped = codeword;
        for (b, m) in flip_mask.iter().enumerate() {
            if mask & (1 << b) != 0 {
                flipped ^= m;
            }
        }
        if let Some((fixed, errs)) = IDA_TABLE.correct(flipped) {
            return Some(BlockDecode {
                data: fixed >> IDA_SYNDROME_BITS,
                errs,
                corrected: true,
            });
        }
    }

    None
}

/// Systematic BCH encode: append the remainder as check bits.
///
/// Used by the LCW encoder path of the test tooling and kept here next to
/// the decoder so the pair stays in sync.
pub fn encode(poly: u32, data: u32, data_bits: usize) -> u32 {
    let deg = 31 - poly.leading_zeros();
    debug_assert!(data >> data_bits == 0);
    let shifted = data << deg;
    shifted ^ gf2_remainder(poly, shifted)
}
