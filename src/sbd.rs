//! SBD (Short Burst Data) extraction from reassembled IDA messages
//!
//! IDA messages carrying SBD are recognized by their first bytes: the
//! `0x76xx` data packets (downlink types 0x08..=0x0B, uplink 0x0C..=0x0E)
//! and the `0x0600` hello packets. A transfer may span several SBD packets;
//! `msgcnt`/`msgno` drive an 8-slot reassembly table with a 5-second
//! timeout. The dispatched payload feeds the ACARS parser.

use tracing::{debug, trace};

use crate::frame::Direction;
use crate::ida::IdaMessage;

/// SBD reassembly table size
pub const MAX_SLOTS: usize = 8;
/// Accumulated payload cap per transfer
const DATA_CAP: usize = 1024;
/// Slot expiry relative to the last fragment
const TIMEOUT_NS: u64 = 5_000_000_000;

/// One complete SBD payload
#[derive(Debug, Clone)]
pub struct SbdPacket {
    pub data: Vec<u8>,
    pub timestamp: u64,
    pub frequency: f64,
    pub direction: Direction,
    pub magnitude: f32,
}

#[derive(Debug, Default)]
struct Slot {
    active: bool,
    /// Last accepted message number
    msgno: u8,
    /// Total expected messages
    msgcnt: u8,
    uplink: bool,
    timestamp: u64,
    frequency: f64,
    magnitude: f32,
    data: Vec<u8>,
}

/// Fixed-size SBD multi-packet reassembly table
pub struct SbdExtractor {
    slots: [Slot; MAX_SLOTS],
}

impl Default for SbdExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Split of one IDA message into SBD framing
struct SbdFraming<'a> {
    msgno: u8,
    /// `None` when the packet variant does not carry a count
    msgcnt: Option<u8>,
    payload: &'a [u8],
}

fn is_sbd(data: &[u8], uplink: bool) -> bool {
    if data[0] == 0x76 && data[1] != 5 {
        if uplink {
            (0x0C..=0x0E).contains(&data[1])
        } else {
            (0x08..=0x0B).contains(&data[1])
        }
    } else if data[0] == 0x06 && data[1] == 0x00 {
        matches!(data[2], 0x00 | 0x10 | 0x20 | 0x40 | 0x50 | 0x70)
    } else {
        false
    }
}

/// Strip the type word and the variant-specific pre-headers.
fn parse_framing(data: &[u8], uplink: bool) -> Option<SbdFraming<'_>> {
    let typ0 = data[0];
    let typ1 = data[1];
    let mut rest = &data[2..];

    if typ0 == 0x06 && typ1 == 0x00 {
        // Hello packet: fixed 29-byte pre-header, count at offset 15
        if rest.len() < 30 || rest[0] != 0x20 {
            return None;
        }
        let msgcnt = rest[15];
        return Some(SbdFraming {
            msgno: if msgcnt == 0 { 0 } else { 1 },
            msgcnt: Some(msgcnt),
            payload: &rest[29..],
        });
    }

    let mut msgcnt = None;
    if typ1 == 0x08 {
        // Downlink data packet: variable pre-header, count at offset 3
        if rest.len() < 5 {
            return None;
        }
        let prehdr_len = if rest[0] == 0x20 { 5 } else { 7 };
        if rest.len() < prehdr_len {
            return None;
        }
        msgcnt = Some(rest[3]);
        rest = &rest[prehdr_len..];
    }

    // Uplink ack/nak marker
    if uplink && rest.len() >= 3 && (rest[0] == 0x50 || rest[0] == 0x51) {
        rest = &rest[3..];
    }

    // Data header: 0x10 <len> <msgno>
    if rest.is_empty() {
        return Some(SbdFraming { msgno: 0, msgcnt, payload: rest });
    }
    if rest.len() > 3 && rest[0] == 0x10 {
        let pkt_len = rest[1] as usize;
        let msgno = rest[2];
        let body = &rest[3..];
        if body.len() < pkt_len {
            return None;
        }
        return Some(SbdFraming { msgno, msgcnt, payload: &body[..pkt_len] });
    }

    Some(SbdFraming { msgno: 0, msgcnt, payload: rest })
}

impl SbdExtractor {
    pub fn new() -> Self {
        SbdExtractor { slots: std::array::from_fn(|_| Slot::default()) }
    }

    /// Feed one reassembled IDA message; returns a complete SBD payload
    /// when the message finishes (or wholly contains) a transfer.
    pub fn push(&mut self, msg: &IdaMessage) -> Option<SbdPacket> {
        if msg.data.len() < 5 {
            return None;
        }
        let uplink = msg.direction == Direction::Uplink;
        if !is_sbd(&msg.data, uplink) {
            return None;
        }

        let framing = parse_framing(&msg.data, uplink)?;
        self.expire(msg.timestamp);

        match (framing.msgno, framing.msgcnt) {
            // Short / mailbox-check message
            (0, _) => {
                if framing.payload.is_empty() {
                    return None;
                }
                Some(self.packet(framing.payload.to_vec(), msg))
            }
            // Single complete packet
            (1, Some(1)) => Some(self.packet(framing.payload.to_vec(), msg)),
            // Leading fragment of a multi-packet transfer
            (no, Some(cnt)) if cnt > 1 => {
                let idx = self.allocate();
                let slot = &mut self.slots[idx];
                slot.active = true;
                slot.msgno = no;
                slot.msgcnt = cnt;
                slot.uplink = uplink;
                slot.timestamp = msg.timestamp;
                slot.frequency = msg.frequency;
                slot.magnitude = msg.magnitude;
                slot.data.clear();
                let take = framing.payload.len().min(DATA_CAP);
                slot.data.extend_from_slice(&framing.payload[..take]);
                trace!(msgcnt = cnt, "multi-packet transfer started");
                None
            }
            // Continuation fragment
            (no, _) if no > 1 => {
                for slot in self.slots.iter_mut().rev() {
                    if !slot.active || slot.uplink != uplink || no != slot.msgno + 1 {
                        continue;
                    }
                    let space = DATA_CAP - slot.data.len();
                    let take = framing.payload.len().min(space);
                    slot.data.extend_from_slice(&framing.payload[..take]);
                    slot.msgno = no;
                    slot.timestamp = msg.timestamp;

                    if no == slot.msgcnt {
                        slot.active = false;
                        let data = std::mem::take(&mut slot.data);
                        return Some(SbdPacket {
                            data,
                            timestamp: msg.timestamp,
                            frequency: slot.frequency,
                            direction: msg.direction,
                            magnitude: slot.magnitude,
                        });
                    }
                    return None;
                }
                trace!(msgno = no, "orphan SBD fragment dropped");
                None
            }
            _ => None,
        }
    }

    fn packet(&self, data: Vec<u8>, msg: &IdaMessage) -> SbdPacket {
        SbdPacket {
            data,
            timestamp: msg.timestamp,
            frequency: msg.frequency,
            direction: msg.direction,
            magnitude: msg.magnitude,
        }
    }

    /// Drop transfers whose last fragment is older than the timeout.
    fn expire(&mut self, now_ns: u64) {
        for slot in self.slots.iter_mut() {
            if slot.active && now_ns > slot.timestamp + TIMEOUT_NS {
                debug!(len = slot.data.len(), "SBD transfer timed out");
                slot.active = false;
                slot.data.clear();
            }
        }
    }

    /// First free slot, or the one with the oldest fragment.
    fn allocate(&self) -> usize {
        let mut idx = 0;
        let mut oldest = u64::MAX;
        for (i, slot) in self.slots.iter().enumerate() {
            if !slot.active {
                return i;
            }
            if slot.timestamp < oldest {
                oldest = slot.timestamp;
                idx = i;
            }
        }
        idx
    }

    #[cfg(test)]
    fn active_slots(&self) -> usize {
        self.slots.iter().filter(|s| s.active).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(ts_s: u64, dir: Direction, data: Vec<u8>) -> IdaMessage {
        IdaMessage {
            data,
            timestamp: ts_s * 1_000_000_000,
            frequency: 1_626_000_000.0,
            direction: dir,
            magnitude: 25.0,
        }
    }

    /// A `0x0600` hello packet: type word, 0x20 pre-header with `msgcnt` at
    /// offset 15, payload after 29 pre-header bytes.
    fn hello(msgcnt: u8, payload: &[u8]) -> Vec<u8> {
        let mut d = vec![0x06, 0x00];
        let mut prehdr = [0u8; 29];
        prehdr[0] = 0x20;
        prehdr[15] = msgcnt;
        d.extend_from_slice(&prehdr);
        d.extend_from_slice(payload);
        d
    }

    /// A downlink `0x7608` data packet with a 0x20 5-byte pre-header and a
    /// `0x10 len msgno` data header.
    fn dl_data(msgcnt: u8, msgno: u8, payload: &[u8]) -> Vec<u8> {
        let mut d = vec![0x76, 0x08, 0x20, 0x00, 0x00, msgcnt, 0x00];
        d.push(0x10);
        d.push(payload.len() as u8);
        d.push(msgno);
        d.extend_from_slice(payload);
        d
    }

    /// A downlink `0x7609` continuation: no pre-header, so the packet count
    /// is unknown and only the data-header `msgno` steers reassembly.
    fn dl_cont(msgno: u8, payload: &[u8]) -> Vec<u8> {
        let mut d = vec![0x76, 0x09];
        d.push(0x10);
        d.push(payload.len() as u8);
        d.push(msgno);
        d.extend_from_slice(payload);
        d
    }

    #[test]
    fn test_non_sbd_ignored() {
        let mut x = SbdExtractor::new();
        assert!(x.push(&msg(0, Direction::Downlink, vec![0x12, 0x34, 0x56, 0x78, 0x9A])).is_none());
    }

    #[test]
    fn test_hello_single_packet() {
        let mut x = SbdExtractor::new();
        let p = x
            .push(&msg(0, Direction::Downlink, hello(1, b"\x01payload")))
            .expect("msgcnt=1 hello must dispatch");
        assert_eq!(p.data, b"\x01payload");
    }

    #[test]
    fn test_hello_mailbox_check() {
        // msgcnt == 0 means msgno == 0: one-shot dispatch of the remainder
        let mut x = SbdExtractor::new();
        let p = x.push(&msg(0, Direction::Downlink, hello(0, b"mbox"))).unwrap();
        assert_eq!(p.data, b"mbox");
    }

    #[test]
    fn test_hello_empty_payload_dropped() {
        let mut x = SbdExtractor::new();
        assert!(x.push(&msg(0, Direction::Downlink, hello(0, b""))).is_none());
    }

    #[test]
    fn test_hello_requires_0x20_marker() {
        let mut x = SbdExtractor::new();
        let mut d = hello(1, b"payload");
        d[2] = 0x21;
        assert!(x.push(&msg(0, Direction::Downlink, d)).is_none());
    }

    #[test]
    fn test_two_packet_reassembly() {
        let mut x = SbdExtractor::new();
        assert!(x.push(&msg(0, Direction::Downlink, hello(2, b"first-"))).is_none());
        let p = x
            .push(&msg(2, Direction::Downlink, dl_cont(2, b"second")))
            .expect("final fragment must dispatch");
        assert_eq!(p.data, b"first-second");
        assert_eq!(x.active_slots(), 0);
    }

    #[test]
    fn test_skipped_msgno_leaves_slot_pending() {
        let mut x = SbdExtractor::new();
        assert!(x.push(&msg(0, Direction::Downlink, hello(3, b"one"))).is_none());
        // msgno 3 without msgno 2: no match, fragment dropped
        assert!(x.push(&msg(1, Direction::Downlink, dl_cont(3, b"three"))).is_none());
        assert_eq!(x.active_slots(), 1);
        // msgno 2 then 3 completes
        assert!(x.push(&msg(2, Direction::Downlink, dl_cont(2, b"two"))).is_none());
        let p = x.push(&msg(3, Direction::Downlink, dl_cont(3, b"three"))).unwrap();
        assert_eq!(p.data, b"onetwothree");
    }

    #[test]
    fn test_timeout_expires_transfer() {
        let mut x = SbdExtractor::new();
        assert!(x.push(&msg(0, Direction::Downlink, hello(2, b"first-"))).is_none());
        // 6 seconds later the slot is gone and the continuation is an orphan
        assert!(x.push(&msg(6, Direction::Downlink, dl_cont(2, b"second"))).is_none());
        assert_eq!(x.active_slots(), 0);
    }

    #[test]
    fn test_direction_separation() {
        let mut x = SbdExtractor::new();
        assert!(x.push(&msg(0, Direction::Downlink, hello(2, b"dl"))).is_none());
        // an uplink continuation must not splice into the downlink transfer
        let mut ul = vec![0x76, 0x0C];
        ul.extend_from_slice(&[0x10, 4, 2]);
        ul.extend_from_slice(b"ulps");
        assert!(x.push(&msg(1, Direction::Uplink, ul)).is_none());
        assert_eq!(x.active_slots(), 1);
    }

    #[test]
    fn test_uplink_ack_marker_skipped() {
        let mut x = SbdExtractor::new();
        // 0x760C uplink, ack marker 0x50 xx xx, then bare payload
        let mut d = vec![0x76, 0x0C, 0x50, 0x00, 0x00];
        d.extend_from_slice(b"\x01acars");
        let p = x.push(&msg(0, Direction::Uplink, d)).unwrap();
        assert_eq!(p.data, b"\x01acars");
    }

    #[test]
    fn test_data_header_truncates_to_length() {
        let mut x = SbdExtractor::new();
        let mut d = dl_data(1, 1, b"keep");
        d.extend_from_slice(b"tail");
        let p = x.push(&msg(0, Direction::Downlink, d)).unwrap();
        assert_eq!(p.data, b"keep");
    }

    #[test]
    fn test_payload_cap() {
        let mut x = SbdExtractor::new();
        let big = vec![0x55u8; 900];
        let mut first = hello(2, &big);
        first.truncate(2 + 29 + 900);
        assert!(x.push(&msg(0, Direction::Downlink, first)).is_none());
        let p = x.push(&msg(1, Direction::Downlink, dl_cont(2, &vec![0xAAu8; 200]))).unwrap();
        assert_eq!(p.data.len(), DATA_CAP.min(900 + 200).min(1024));
    }
}
