//! Payload descrambling: two-way de-interleave plus chunked BCH decode
//!
//! The payload after the LCW is scrambled in 124-bit blocks. Each block
//! de-interleaves into two 62-bit halves; their concatenation splits into
//! four 31-bit BCH codewords taken in the fixed chunk order `[3, 1, 2, 0]`.
//! A trailing partial block drops the first bit of each half and is decoded
//! in as many 31-bit windows as fit. Soft values ride along through the
//! identical permutation so the Chase stage sees reliabilities in codeword
//! order.

use bitvec::prelude::*;

use crate::bch::{self, IDA_DATA_BITS};
use crate::bits::bits_to_u32;

/// Bits per interleave block
pub const BLOCK_BITS: usize = 124;
/// Codeword positions within the combined 124-bit stream
const CHUNK_ORDER: [usize; 4] = [3, 1, 2, 0];
/// Upper bound on the decoded stream, bounding per-burst work
const MAX_BCH_BITS: usize = 512;

/// Result of descrambling one burst payload
#[derive(Debug, Clone)]
pub struct Descrambled {
    /// Concatenated 20-bit data groups from every decoded codeword
    pub bch: BitVec<u8, Msb0>,
    /// Number of codewords that needed a correction
    pub fixed_errs: usize,
}

/// Walk symbols top-down in steps of two, emitting both bits per symbol.
/// `out1` takes the odd-indexed start, `out2` the even one.
fn de_interleave(block: &BitSlice<u8, Msb0>, n_sym: usize) -> (BitVec<u8, Msb0>, BitVec<u8, Msb0>) {
    let mut out1: BitVec<u8, Msb0> = BitVec::with_capacity(n_sym);
    let mut out2: BitVec<u8, Msb0> = BitVec::with_capacity(n_sym);

    let mut s = n_sym as isize - 1;
    while s >= 1 {
        out1.push(block[2 * s as usize]);
        out1.push(block[2 * s as usize + 1]);
        s -= 2;
    }
    let mut s = n_sym as isize - 2;
    while s >= 0 {
        out2.push(block[2 * s as usize]);
        out2.push(block[2 * s as usize + 1]);
        s -= 2;
    }
    (out1, out2)
}

/// Soft values follow the same permutation as the bits
fn de_interleave_llr(llr: &[f32], n_sym: usize) -> (Vec<f32>, Vec<f32>) {
    let mut out1 = Vec::with_capacity(n_sym);
    let mut out2 = Vec::with_capacity(n_sym);

    let mut s = n_sym as isize - 1;
    while s >= 1 {
        out1.push(llr[2 * s as usize]);
        out1.push(llr[2 * s as usize + 1]);
        s -= 2;
    }
    let mut s = n_sym as isize - 2;
    while s >= 0 {
        out2.push(llr[2 * s as usize]);
        out2.push(llr[2 * s as usize + 1]);
        s -= 2;
    }
    (out1, out2)
}

fn decode_chunk(
    bits: &BitSlice<u8, Msb0>,
    llr: Option<&[f32]>,
    out: &mut Descrambled,
) -> bool {
    let codeword = bits_to_u32(bits);
    match bch::decode_block(codeword, llr) {
        Some(d) => {
            if d.corrected {
                out.fixed_errs += 1;
            }
            crate::bits::push_uint(&mut out.bch, d.data, IDA_DATA_BITS);
            true
        }
        None => false,
    }
}

/// Descramble and BCH-decode a burst payload.
///
/// Decoding stops at the first uncorrectable codeword; everything decoded so
/// far is returned.
pub fn descramble(bits: &BitSlice<u8, Msb0>, llr: Option<&[f32]>) -> Descrambled {
    let mut out = Descrambled { bch: BitVec::with_capacity(MAX_BCH_BITS), fixed_errs: 0 };

    let n_full = bits.len() / BLOCK_BITS;
    let remain = bits.len() % BLOCK_BITS;

    for blk in 0..n_full {
        let block = &bits[blk * BLOCK_BITS..(blk + 1) * BLOCK_BITS];
        let block_llr = llr.map(|l| &l[blk * BLOCK_BITS..(blk + 1) * BLOCK_BITS]);

        let (half1, half2) = de_interleave(block, BLOCK_BITS / 2);
        let mut combined = half1;
        combined.extend_from_bitslice(&half2);

        let soft = block_llr.map(|l| {
            let (mut l1, l2) = de_interleave_llr(l, BLOCK_BITS / 2);
            l1.extend_from_slice(&l2);
            l1
        });

        for c in CHUNK_ORDER {
            if out.bch.len() + IDA_DATA_BITS > MAX_BCH_BITS {
                break;
            }
            let off = c * 31;
            let chunk_llr = soft.as_deref().map(|l| &l[off..off + 31]);
            if !decode_chunk(&combined[off..off + 31], chunk_llr, &mut out) {
                // Uncorrectable codeword ends the burst, partial tail included
                return out;
            }
        }
    }

    // Trailing partial block: de-interleave what is left, drop the first bit
    // of each half, decode 31-bit windows over half2 then half1.
    if remain >= 4 {
        let n_sym_last = remain / 2;
        let tail = &bits[n_full * BLOCK_BITS..n_full * BLOCK_BITS + 2 * n_sym_last];
        let tail_llr = llr.map(|l| &l[n_full * BLOCK_BITS..n_full * BLOCK_BITS + 2 * n_sym_last]);

        let (h1, h2) = de_interleave(tail, n_sym_last);
        if h1.len() > 1 && h2.len() > 1 {
            let mut combined: BitVec<u8, Msb0> = BitVec::with_capacity(remain);
            combined.extend_from_bitslice(&h2[1..]);
            combined.extend_from_bitslice(&h1[1..]);

            let soft = tail_llr.map(|l| {
                let (l1, l2) = de_interleave_llr(l, n_sym_last);
                let mut s: Vec<f32> = l2[1..].to_vec();
                s.extend_from_slice(&l1[1..]);
                s
            });

            let mut pos = 0;
            while pos + 31 <= combined.len() && out.bch.len() + IDA_DATA_BITS <= MAX_BCH_BITS {
                let chunk_llr = soft.as_deref().map(|l| &l[pos..pos + 31]);
                if !decode_chunk(&combined[pos..pos + 31], chunk_llr, &mut out) {
                    break;
                }
                pos += 31;
            }
        }
    }

    out
}
