//! ACARS record rendering: one-line text and the JSON feed format
//!
//! JSON timestamps are wall-clock ISO-8601. The sample clock is monotonic
//! but not wall-anchored, so the first record pins the anchor (wall "now"
//! against its sample timestamp) and later records project forward by their
//! nanosecond deltas. With a fixed anchor the output is fully deterministic.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::Serialize;

use crate::acars::AcarsRecord;
use crate::frame::Direction;

/// Application tag carried in every JSON record
const APP_NAME: &str = "iridiumrx";
const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Wall-clock anchor for projecting sample timestamps
pub struct TimestampAnchor {
    anchor: Option<(DateTime<Utc>, u64)>,
}

impl Default for TimestampAnchor {
    fn default() -> Self {
        Self::new()
    }
}

impl TimestampAnchor {
    /// Anchor to the wall clock at the first formatted record.
    pub fn new() -> Self {
        TimestampAnchor { anchor: None }
    }

    /// Anchor to a fixed instant; used where determinism matters.
    pub fn fixed(wall: DateTime<Utc>, first_ns: u64) -> Self {
        TimestampAnchor { anchor: Some((wall, first_ns)) }
    }

    /// ISO-8601 wall-clock form of a sample timestamp.
    pub fn format(&mut self, ts_ns: u64) -> String {
        let (wall0, first_ns) = *self.anchor.get_or_insert_with(|| (Utc::now(), ts_ns));
        let elapsed_s = ts_ns.saturating_sub(first_ns) / 1_000_000_000;
        let wall = wall0 + chrono::Duration::seconds(elapsed_s as i64);
        wall.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

#[derive(Serialize)]
struct AppInfo {
    name: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct SourceInfo<'a> {
    transport: &'static str,
    protocol: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    station_id: Option<&'a str>,
}

#[derive(Serialize)]
struct AcarsBody {
    timestamp: String,
    errors: u32,
    link_direction: &'static str,
    block_end: bool,
    mode: String,
    tail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    ack: Option<String>,
    label: String,
    block_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    flight: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Serialize)]
struct AcarsJson<'a> {
    app: AppInfo,
    source: SourceInfo<'a>,
    acars: AcarsBody,
    freq: u64,
    level: f64,
    header: String,
}

/// Render the JSON feed line for a record, without the trailing newline.
pub fn format_json(
    rec: &AcarsRecord,
    anchor: &mut TimestampAnchor,
    station: Option<&str>,
) -> String {
    let uplink = rec.direction == Direction::Uplink;

    let ack = if rec.ack == 0 {
        None
    } else if rec.is_nak() {
        Some("!".to_string())
    } else {
        Some(char::from(rec.ack).to_string())
    };

    let text = rec
        .text
        .as_ref()
        .filter(|t| !t.is_empty())
        .map(|t| t.iter().map(|&b| char::from(b)).collect());

    let json = AcarsJson {
        app: AppInfo { name: APP_NAME, version: APP_VERSION },
        source: SourceInfo { transport: "iridium", protocol: "acars", station_id: station },
        acars: AcarsBody {
            timestamp: anchor.format(rec.timestamp),
            errors: rec.errors,
            link_direction: if uplink { "uplink" } else { "downlink" },
            block_end: !rec.continuation,
            mode: char::from(rec.mode).to_string(),
            tail: rec.registration.clone(),
            ack,
            label: rec.label_string(),
            block_id: char::from(rec.block_id).to_string(),
            message_number: if uplink { rec.sequence.clone() } else { None },
            flight: if uplink { rec.flight.clone() } else { None },
            text,
        },
        freq: (rec.frequency + 0.5) as u64,
        level: (rec.magnitude as f64 * 100.0).round() / 100.0,
        header: rec.header.map_or_else(String::new, |h| {
            h.iter().map(|b| format!("{:02x}", b)).collect()
        }),
    };

    serde_json::to_string(&json).expect("ACARS record serializes")
}

fn push_printable(out: &mut String, bytes: &[u8]) {
    for &b in bytes {
        out.push(if (0x20..0x7F).contains(&b) { char::from(b) } else { '.' });
    }
}

/// Render the one-line text form, without the trailing newline.
pub fn format_text(rec: &AcarsRecord, anchor: &mut TimestampAnchor) -> String {
    let mut line = format!(
        "ACARS: {} {} Mode:{} REG:{:<7} ",
        anchor.format(rec.timestamp),
        rec.direction.tag(),
        char::from(rec.mode),
        rec.registration,
    );

    if rec.is_nak() {
        line.push_str("NAK  ");
    } else {
        line.push_str(&format!("ACK:{} ", char::from(rec.ack)));
    }

    line.push_str(&format!("Label:{} bID:{} ", rec.label_string(), char::from(rec.block_id)));

    if let (Some(seq), Some(fno)) = (&rec.sequence, &rec.flight) {
        line.push_str(&format!("SEQ:{} FNO:{} ", seq, fno));
        if let Some(text) = rec.text.as_ref().filter(|t| !t.is_empty()) {
            line.push('[');
            push_printable(&mut line, text);
            line.push(']');
        }
    } else if let Some(text) = rec.text.as_ref().filter(|t| !t.is_empty()) {
        line.push('[');
        push_printable(&mut line, text);
        line.push(']');
    }

    if rec.continuation {
        line.push_str(" CONT'd");
    }
    if rec.errors > 0 {
        line.push_str(" ERRORS");
    }

    line
}
