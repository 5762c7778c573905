//! Multi-burst IDA reassembly
//!
//! A data transfer longer than one burst arrives as a chain of bursts with
//! consecutive `da_ctr` values on the same link. The reassembler keys chains
//! on (direction, frequency window, timestamp window, counter): a burst
//! continues a slot when it lands within 260 Hz and 280 ms of the previous
//! fragment and its counter is the successor mod 8. Only CRC-verified bursts
//! with payload are admitted.

use tracing::{debug, trace};

use crate::frame::Direction;
use crate::ida::IdaBurst;

/// Reassembly table size
pub const MAX_SLOTS: usize = 16;
/// Accumulated payload cap: eight full 20-byte bursts
const SLOT_CAP: usize = 160;
/// Maximum gap between chained bursts
const WINDOW_NS: u64 = 280_000_000;
/// Frequency drift tolerance between chained bursts
const FREQ_TOL_HZ: f64 = 260.0;

/// A reassembled IDA message, ready for SBD extraction
#[derive(Debug, Clone)]
pub struct IdaMessage {
    pub data: Vec<u8>,
    /// Timestamp of the final fragment
    pub timestamp: u64,
    /// Frequency of the first fragment
    pub frequency: f64,
    pub direction: Direction,
    pub magnitude: f32,
}

#[derive(Debug, Default)]
struct Slot {
    active: bool,
    direction: Direction,
    frequency: f64,
    last_timestamp: u64,
    last_ctr: u8,
    data: Vec<u8>,
}

/// Fixed-size multi-burst reassembly table
pub struct IdaReassembler {
    slots: [Slot; MAX_SLOTS],
}

impl Default for IdaReassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl IdaReassembler {
    pub fn new() -> Self {
        IdaReassembler { slots: std::array::from_fn(|_| Slot::default()) }
    }

    /// Feed one decoded burst; returns a completed message when the burst
    /// finishes a chain or stands alone.
    pub fn push(&mut self, burst: &IdaBurst) -> Option<IdaMessage> {
        if !burst.crc_ok || burst.da_len == 0 {
            return None;
        }

        // Continuation of an existing chain?
        for slot in self.slots.iter_mut() {
            if !slot.active || slot.direction != burst.direction {
                continue;
            }
            if (slot.frequency - burst.frequency).abs() > FREQ_TOL_HZ {
                continue;
            }
            if burst.timestamp < slot.last_timestamp
                || burst.timestamp - slot.last_timestamp > WINDOW_NS
            {
                continue;
            }
            if (slot.last_ctr + 1) % 8 != burst.da_ctr {
                continue;
            }

            if slot.data.len() + burst.da_len <= SLOT_CAP {
                slot.data.extend_from_slice(&burst.payload[..burst.da_len]);
            }
            slot.last_timestamp = burst.timestamp;
            slot.last_ctr = burst.da_ctr;

            if !burst.cont {
                slot.active = false;
                trace!(len = slot.data.len(), "chain complete");
                return Some(IdaMessage {
                    data: std::mem::take(&mut slot.data),
                    timestamp: burst.timestamp,
                    frequency: slot.frequency,
                    direction: slot.direction,
                    magnitude: burst.magnitude,
                });
            }
            return None;
        }

        // Complete in a single burst
        if burst.da_ctr == 0 && !burst.cont {
            return Some(IdaMessage {
                data: burst.payload[..burst.da_len].to_vec(),
                timestamp: burst.timestamp,
                frequency: burst.frequency,
                direction: burst.direction,
                magnitude: burst.magnitude,
            });
        }

        // Head of a new chain
        if burst.da_ctr == 0 && burst.cont {
            let idx = self.allocate(burst.timestamp);
            let slot = &mut self.slots[idx];
            slot.active = true;
            slot.direction = burst.direction;
            slot.frequency = burst.frequency;
            slot.last_timestamp = burst.timestamp;
            slot.last_ctr = burst.da_ctr;
            slot.data.clear();
            slot.data.extend_from_slice(&burst.payload[..burst.da_len]);
            return None;
        }

        // Mid-chain fragment with no matching slot
        trace!(ctr = burst.da_ctr, "orphan fragment dropped");
        None
    }

    /// Drop chains whose last fragment is older than the chain window.
    pub fn flush(&mut self, now_ns: u64) {
        for slot in self.slots.iter_mut() {
            if slot.active && now_ns > slot.last_timestamp + WINDOW_NS {
                debug!(len = slot.data.len(), "chain timed out");
                slot.active = false;
                slot.data.clear();
            }
        }
    }

    /// First free slot, or the least recently used one.
    fn allocate(&self, timestamp: u64) -> usize {
        let mut idx = 0;
        let mut oldest = u64::MAX;
        for (i, slot) in self.slots.iter().enumerate() {
            if !slot.active {
                return i;
            }
            if slot.last_timestamp < oldest {
                oldest = slot.last_timestamp;
                idx = i;
            }
        }
        debug!(slot = idx, evicted_ts = timestamp, "reassembly table full, evicting LRU");
        idx
    }

    #[cfg(test)]
    fn active_slots(&self) -> usize {
        self.slots.iter().filter(|s| s.active).count()
    }
}
