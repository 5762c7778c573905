//! RAW frame lines
//!
//! One line per demodulated burst, in the widely-scraped capture format:
//!
//! ```text
//! RAW: {file_info} {ts_ms:012.4} {freq:010} N:{mag:05.2}{noise:+06.2} I:{id:011} {conf:3}% {level:.5} {syms:3} {bits}
//! ```
//!
//! The parser is the exact inverse and doubles as the offline front-end:
//! replayed captures re-enter the pipeline as `DemodFrame`s. The format has
//! no direction field. On a live radio the demodulator classifies the link
//! from which unique word opened the burst; those bits still lead every
//! captured line, but the patterns themselves are front-end configuration,
//! not something this crate knows. A replay that wants direction back
//! supplies the capturing radio's patterns as `AccessCodes`; without them
//! frames come back `Unknown` and only the RAW passthrough is useful.

use bitvec::prelude::*;
use snafu::{OptionExt, ResultExt, Snafu};

use crate::frame::{DemodFrame, Direction};

#[derive(Debug, Snafu)]
pub enum RawParseError {
    /// Line does not start with the RAW tag
    #[snafu(display("not a RAW line"))]
    NotRaw,

    /// A fixed field is missing
    #[snafu(display("missing field {}", field))]
    MissingField { field: &'static str },

    /// A numeric field failed to parse
    #[snafu(display("bad value in field {}", field))]
    BadValue {
        field: &'static str,
        source: std::num::ParseFloatError,
    },

    /// An integer field failed to parse
    #[snafu(display("bad integer in field {}", field))]
    BadInt {
        field: &'static str,
        source: std::num::ParseIntError,
    },

    /// The bit string contains something other than 0/1
    #[snafu(display("bit string is not binary"))]
    BadBits,

    /// An access-code pattern is empty or not binary
    #[snafu(display("access codes must be two non-empty bit strings"))]
    BadAccessCode,
}

fn parse_bits(s: &str) -> Option<BitVec<u8, Msb0>> {
    let mut bits: BitVec<u8, Msb0> = BitVec::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '0' => bits.push(false),
            '1' => bits.push(true),
            _ => return None,
        }
    }
    Some(bits)
}

/// The unique-word bit patterns a capturing radio matched at burst start.
///
/// Direction classification belongs to the demodulator front-end, so the
/// values are its configuration; a capture replay has to be told which
/// patterns were in use to recover the link direction from the leading
/// bits of each line.
#[derive(Debug, Clone)]
pub struct AccessCodes {
    downlink: BitVec<u8, Msb0>,
    uplink: BitVec<u8, Msb0>,
}

impl AccessCodes {
    pub fn new(downlink: &str, uplink: &str) -> Result<Self, RawParseError> {
        let downlink = parse_bits(downlink).context(BadAccessCodeSnafu)?;
        let uplink = parse_bits(uplink).context(BadAccessCodeSnafu)?;
        if downlink.is_empty() || uplink.is_empty() {
            return Err(RawParseError::BadAccessCode);
        }
        Ok(AccessCodes { downlink, uplink })
    }

    /// Parse the `downlink,uplink` command-line form.
    pub fn from_spec(spec: &str) -> Result<Self, RawParseError> {
        let (dl, ul) = spec.split_once(',').context(BadAccessCodeSnafu)?;
        Self::new(dl, ul)
    }

    /// Which unique word opens this bit sequence.
    pub fn classify(&self, bits: &BitSlice<u8, Msb0>) -> Direction {
        if bits.len() >= self.downlink.len() && bits[..self.downlink.len()] == self.downlink[..] {
            Direction::Downlink
        } else if bits.len() >= self.uplink.len() && bits[..self.uplink.len()] == self.uplink[..] {
            Direction::Uplink
        } else {
            Direction::Unknown
        }
    }
}

/// Format one RAW line, without the trailing newline.
pub fn format_raw(frame: &DemodFrame, file_info: &str, t0_ns: u64) -> String {
    let ts_ms = (frame.timestamp.saturating_sub(t0_ns)) as f64 / 1e6;
    let freq_hz = (frame.center_frequency + 0.5) as i64;
    let syms = frame.n_payload_symbols.max(0);

    let mut line = format!(
        "RAW: {} {:012.4} {:010} N:{:05.2}{:+06.2} I:{:011} {:3}% {:.5} {:3} ",
        file_info,
        ts_ms,
        freq_hz,
        frame.magnitude,
        frame.noise,
        frame.id,
        frame.confidence,
        frame.level,
        syms,
    );
    line.reserve(frame.bits.len());
    for bit in frame.bits.iter() {
        line.push(if *bit { '1' } else { '0' });
    }
    line
}

/// Parse a RAW line back into a frame. Timestamps come back relative to the
/// capture start; soft values are not carried by the format. The direction
/// is recovered by matching `codes` against the leading bits, `Unknown`
/// when no patterns are supplied.
pub fn parse_raw_line(
    line: &str,
    codes: Option<&AccessCodes>,
) -> Result<DemodFrame, RawParseError> {
    let mut fields = line.split_whitespace();
    if fields.next() != Some("RAW:") {
        return Err(RawParseError::NotRaw);
    }

    let _file_info = fields.next().context(MissingFieldSnafu { field: "file_info" })?;
    let ts_ms: f64 = fields
        .next()
        .context(MissingFieldSnafu { field: "timestamp" })?
        .parse()
        .context(BadValueSnafu { field: "timestamp" })?;
    let freq: f64 = fields
        .next()
        .context(MissingFieldSnafu { field: "frequency" })?
        .parse()
        .context(BadValueSnafu { field: "frequency" })?;

    let noise_field = fields.next().context(MissingFieldSnafu { field: "noise" })?;
    let nf = noise_field.strip_prefix("N:").context(MissingFieldSnafu { field: "noise" })?;
    // magnitude runs up to the sign that opens the noise value
    let split = nf[1..]
        .find(&['+', '-'][..])
        .map(|p| p + 1)
        .context(MissingFieldSnafu { field: "noise" })?;
    let magnitude: f32 = nf[..split].parse().context(BadValueSnafu { field: "magnitude" })?;
    let noise: f32 = nf[split..].parse().context(BadValueSnafu { field: "noise" })?;

    let id_field = fields.next().context(MissingFieldSnafu { field: "id" })?;
    let id: u64 = id_field
        .strip_prefix("I:")
        .context(MissingFieldSnafu { field: "id" })?
        .parse()
        .context(BadIntSnafu { field: "id" })?;

    let conf_field = fields.next().context(MissingFieldSnafu { field: "confidence" })?;
    let confidence: u8 = conf_field
        .strip_suffix('%')
        .context(MissingFieldSnafu { field: "confidence" })?
        .parse()
        .context(BadIntSnafu { field: "confidence" })?;

    let level: f32 = fields
        .next()
        .context(MissingFieldSnafu { field: "level" })?
        .parse()
        .context(BadValueSnafu { field: "level" })?;
    let n_payload_symbols: i32 = fields
        .next()
        .context(MissingFieldSnafu { field: "symbols" })?
        .parse()
        .context(BadIntSnafu { field: "symbols" })?;

    let bit_str = fields.next().context(MissingFieldSnafu { field: "bits" })?;
    let bits = parse_bits(bit_str).context(BadBitsSnafu)?;

    let direction = codes.map_or(Direction::Unknown, |c| c.classify(&bits));

    Ok(DemodFrame {
        id,
        timestamp: (ts_ms * 1e6).round() as u64,
        center_frequency: freq,
        direction,
        magnitude,
        noise,
        level,
        confidence,
        n_payload_symbols,
        bits,
        llr: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fixture patterns; a real radio configures its own.
    fn codes() -> AccessCodes {
        AccessCodes::new("000111000111", "111000111000").unwrap()
    }

    fn frame(bits: &str) -> DemodFrame {
        let mut bv: BitVec<u8, Msb0> = BitVec::new();
        for c in bits.chars() {
            bv.push(c == '1');
        }
        DemodFrame {
            id: 42,
            timestamp: 123_456_700_000,
            center_frequency: 1_626_270_800.0,
            direction: Direction::Downlink,
            magnitude: 23.45,
            noise: -80.12,
            level: 0.01234,
            confidence: 95,
            n_payload_symbols: 101,
            bits: bv,
            llr: None,
        }
    }

    #[test]
    fn test_format_raw_layout() {
        let f = frame("0110");
        let line = format_raw(&f, "i-1659-t1", 0);
        assert_eq!(
            line,
            "RAW: i-1659-t1 0123456.7000 1626270800 N:23.45-80.12 I:00000000042  95% 0.01234 101 0110"
        );
    }

    #[test]
    fn test_round_trip() {
        let f = frame("0001110001110110100101");
        let line = format_raw(&f, "i-0-t1", 0);
        let back = parse_raw_line(&line, Some(&codes())).expect("round trip");

        assert_eq!(back.id, f.id);
        assert_eq!(back.timestamp, f.timestamp);
        assert_eq!(back.center_frequency, f.center_frequency);
        assert_eq!(back.direction, Direction::Downlink);
        assert_eq!(back.confidence, f.confidence);
        assert_eq!(back.n_payload_symbols, f.n_payload_symbols);
        assert_eq!(back.bits, f.bits);
    }

    #[test]
    fn test_classify_uplink() {
        let f = frame("11100011100011");
        let back = parse_raw_line(&format_raw(&f, "x", 0), Some(&codes())).unwrap();
        assert_eq!(back.direction, Direction::Uplink);
    }

    #[test]
    fn test_classify_no_match() {
        let f = frame("0101010101010101");
        let back = parse_raw_line(&format_raw(&f, "x", 0), Some(&codes())).unwrap();
        assert_eq!(back.direction, Direction::Unknown);
    }

    #[test]
    fn test_direction_unknown_without_codes() {
        let f = frame("0001110001110110");
        let back = parse_raw_line(&format_raw(&f, "x", 0), None).unwrap();
        assert_eq!(back.direction, Direction::Unknown);
    }

    #[test]
    fn test_access_code_spec_form() {
        let c = AccessCodes::from_spec("0011,1100").unwrap();
        let mut bv: BitVec<u8, Msb0> = BitVec::new();
        for b in [false, false, true, true, true] {
            bv.push(b);
        }
        assert_eq!(c.classify(&bv), Direction::Downlink);
    }

    #[test]
    fn test_access_code_spec_rejects_garbage() {
        assert!(matches!(AccessCodes::from_spec("0011"), Err(RawParseError::BadAccessCode)));
        assert!(matches!(AccessCodes::from_spec("01,0x"), Err(RawParseError::BadAccessCode)));
        assert!(matches!(AccessCodes::from_spec(",01"), Err(RawParseError::BadAccessCode)));
    }

    #[test]
    fn test_parse_rejects_non_raw() {
        assert!(matches!(parse_raw_line("IDA: foo", None), Err(RawParseError::NotRaw)));
    }

    #[test]
    fn test_parse_rejects_bad_bits() {
        let line = "RAW: x 0.0 1626000000 N:01.00-80.00 I:00000000001 100% 0.1 10 01x0";
        assert!(matches!(parse_raw_line(line, None), Err(RawParseError::BadBits)));
    }
}
