//! Input records delivered by the demodulator front-end
//!
//! The QPSK front-end is an external collaborator: it detects the unique
//! word, classifies the link direction from which access code matched, and
//! hands the core one `DemodFrame` per burst. Soft values, when present,
//! align one-to-one with the hard bits.

use bitvec::prelude::*;

/// Link direction, classified by the front-end from the 12-symbol access code
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Unknown,
    Uplink,
    Downlink,
}

impl Direction {
    /// Two-letter tag used throughout the line output
    pub fn tag(self) -> &'static str {
        match self {
            Direction::Uplink => "UL",
            Direction::Downlink => "DL",
            Direction::Unknown => "??",
        }
    }

    /// Whether the front-end resolved a direction at all
    pub fn is_link(self) -> bool {
        !matches!(self, Direction::Unknown)
    }
}

/// Raw sample encoding used by SDR backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    Int8,
    Float,
}

/// One buffer of raw I/Q samples from an SDR backend.
///
/// The core never interprets samples; this type only pins down the producer
/// contract so a substitute front-end can be slotted in.
#[derive(Debug, Clone)]
pub struct SampleBuf {
    /// Number of complex samples in `data`
    pub num: usize,
    pub format: SampleFormat,
    /// Hardware timestamp in ns; `None` when the radio provides none
    pub hw_timestamp: Option<u64>,
    pub data: Vec<u8>,
}

/// A single demodulated burst
#[derive(Debug, Clone)]
pub struct DemodFrame {
    /// Monotonic frame counter assigned by the front-end
    pub id: u64,
    /// Monotonic sample-clock timestamp in nanoseconds
    pub timestamp: u64,
    /// Burst center frequency in Hz
    pub center_frequency: f64,
    pub direction: Direction,
    pub magnitude: f32,
    pub noise: f32,
    pub level: f32,
    /// Demodulator confidence, 0..=100
    pub confidence: u8,
    /// Payload symbols after the unique word
    pub n_payload_symbols: i32,
    /// Hard bits, preamble first
    pub bits: BitVec<u8, Msb0>,
    /// Per-bit reliability, aligned with `bits`; higher is more confident
    pub llr: Option<Vec<f32>>,
}

impl DemodFrame {
    /// Check the soft-value alignment invariant.
    pub fn llr_aligned(&self) -> bool {
        self.llr.as_ref().map_or(true, |l| l.len() == self.bits.len())
    }
}
