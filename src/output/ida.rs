//! Parsed IDA lines
//!
//! Fixed-width rendering of a decoded burst: signal metadata, the padded
//! LCW header, the raw header bits around the `cont`/`ctr`/`len` fields,
//! the payload hex (padded to a 60-character field, with a `!` marking the
//! length boundary when trailing bytes are nonzero), the CRC section, any
//! trailing bits after the CRC, and a printable preview of the payload.

use std::fmt::Write;

use crate::ida::IdaBurst;

/// Column width of the hex payload field, closing bracket included
const HEX_FIELD_WIDTH: usize = 60;

fn bit_char(b: bool) -> char {
    if b {
        '1'
    } else {
        '0'
    }
}

/// Format one parsed IDA line, without the trailing newline.
pub fn format_ida(burst: &IdaBurst, parsed_info: &str, t0_ns: u64) -> String {
    let ts_ms = (burst.timestamp.saturating_sub(t0_ns)) as f64 / 1e6;
    let freq_hz = (burst.frequency + 0.5) as i64;
    let level_db = if burst.level > 0.0 {
        20.0 * (burst.level as f64).log10()
    } else {
        -99.99
    };
    let syms = burst.n_symbols.max(0);

    let mut line = format!(
        "IDA: {} {:014.4} {:010} {:3}% {:06.2}|{:+07.2}|{:05.2} {:3} {} ",
        parsed_info,
        ts_ms,
        freq_hz,
        burst.confidence,
        level_db,
        burst.noise as f64,
        burst.magnitude as f64,
        syms,
        burst.direction.tag(),
    );
    line.push_str(&burst.lcw_header);

    let bs = &burst.bch_stream;
    if bs.len() < 20 {
        return line;
    }

    // Header bits around the decoded fields, in transmission order
    write!(
        line,
        "{}{}{} cont={} {} ctr={}{}{} {}{}{} len={:02} 0:{}{}{}{}",
        bit_char(bs[0]),
        bit_char(bs[1]),
        bit_char(bs[2]),
        bit_char(bs[3]),
        bit_char(bs[4]),
        bit_char(bs[5]),
        bit_char(bs[6]),
        bit_char(bs[7]),
        bit_char(bs[8]),
        bit_char(bs[9]),
        bit_char(bs[10]),
        burst.da_len,
        bit_char(bs[16]),
        bit_char(bs[17]),
        bit_char(bs[18]),
        bit_char(bs[19]),
    )
    .unwrap();

    // Payload hex. With a length, trailing zero bytes are elided; nonzero
    // trailing bytes force the full dump with a '!' at the length boundary.
    let all_trailing_zero = burst.da_len == 0
        || burst.payload.get(burst.da_len + 1..).map_or(true, |tail| tail.iter().all(|&b| b == 0));
    let nbytes = if burst.da_len > 0 && all_trailing_zero { burst.da_len } else { 20 };

    line.push_str(" [");
    for i in 0..nbytes {
        if i > 0 {
            if i == burst.da_len && burst.da_len > 0 && burst.da_len < 20 && !all_trailing_zero {
                line.push('!');
            } else {
                line.push('.');
            }
        }
        write!(line, "{:02x}", burst.payload[i]).unwrap();
    }
    line.push(']');
    let hex_len = nbytes * 3 - 1 + 1;
    for _ in hex_len..HEX_FIELD_WIDTH {
        line.push(' ');
    }

    // CRC section
    if burst.da_len > 0 {
        write!(line, " {:04x}/{:04x}", burst.stored_crc, burst.computed_crc).unwrap();
        if burst.crc_ok {
            line.push_str(" CRC:OK");
        } else {
            line.push_str(" CRC:no");
        }
    } else {
        line.push_str("  ---   ");
    }

    // Bits after the CRC
    if bs.len() > 196 {
        line.push(' ');
        for bit in bs[196..].iter() {
            line.push(bit_char(*bit));
        }
    } else {
        line.push_str(" 0000");
    }

    // Printable preview of the payload bytes
    if burst.da_len > 0 && bs.len() >= 180 {
        line.push_str(" SBD: ");
        for i in 0..20 {
            let byte = crate::bits::bits_to_u32(&bs[20 + i * 8..28 + i * 8]) as u8;
            line.push(if (0x20..0x7F).contains(&byte) { char::from(byte) } else { '.' });
        }
    }

    line
}
