//! Pipeline control plane
//!
//! `Decoder` owns every piece of per-process decode state (the two
//! reassembly tables) and turns one input frame into at most one record per
//! stage. `Pipeline` wraps it with output routing: RAW lines for every
//! frame, parsed IDA lines, ACARS text or JSON, all fanned out through a
//! `Sink`. The run loop drains a bounded channel fed by the front-end and
//! observes a shared running flag at every queue wait, so cancellation
//! never lands mid-burst.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use tracing::{debug, info};

use crate::acars::{self, AcarsRecord};
use crate::frame::DemodFrame;
use crate::ida::{self, IdaBurst, IdaMessage, IdaReassembler};
use crate::mtpos::{self, MtPosition};
use crate::output::{self, Sink, TimestampAnchor};
use crate::sbd::{SbdExtractor, SbdPacket};

/// Output routing configuration
#[derive(Debug, Clone, Default)]
pub struct DecoderConfig {
    /// Emit parsed IDA lines
    pub parsed: bool,
    /// Emit ACARS text lines
    pub acars: bool,
    /// Emit ACARS JSON records (strict mode: errored records are dropped)
    pub acars_json: bool,
    /// Suppress console frame output
    pub diagnostic: bool,
    /// Station identifier carried in JSON records
    pub station: Option<String>,
    /// Capture tag for RAW lines; derived from the first timestamp if unset
    pub file_info: Option<String>,
}

/// Everything one frame produced, at most one record per stage
#[derive(Debug, Default)]
pub struct FrameOutput {
    pub burst: Option<IdaBurst>,
    pub message: Option<IdaMessage>,
    pub sbd: Option<SbdPacket>,
    pub acars: Option<AcarsRecord>,
    pub position: Option<MtPosition>,
}

/// The decode core: stateless stages plus the two reassembly tables
#[derive(Default)]
pub struct Decoder {
    ida: IdaReassembler,
    sbd: SbdExtractor,
}

impl Decoder {
    pub fn new() -> Self {
        Decoder { ida: IdaReassembler::new(), sbd: SbdExtractor::new() }
    }

    /// Run one frame through every stage.
    ///
    /// Reassembly timeouts are evaluated against the frame's own timestamp,
    /// so replayed captures expire state at capture speed, not wall speed.
    pub fn process(&mut self, frame: &DemodFrame) -> FrameOutput {
        let mut out = FrameOutput::default();

        self.ida.flush(frame.timestamp);

        let Some(burst) = ida::decode(frame) else {
            return out;
        };

        if let Some(message) = self.ida.push(&burst) {
            out.position = mtpos::extract(&message);
            if let Some(packet) = self.sbd.push(&message) {
                out.acars = acars::parse(&packet);
                out.sbd = Some(packet);
            }
            out.message = Some(message);
        }

        out.burst = Some(burst);
        out
    }

    /// Drop all in-flight reassembly state.
    pub fn reset(&mut self) {
        self.ida = IdaReassembler::new();
        self.sbd = SbdExtractor::new();
    }
}

/// Output-side capture identity, fixed at the first frame
struct CaptureInfo {
    t0_ns: u64,
    file_info: String,
    parsed_info: String,
}

/// Frame-to-line pipeline with output routing
pub struct Pipeline {
    config: DecoderConfig,
    decoder: Decoder,
    sink: Sink,
    anchor: TimestampAnchor,
    capture: Option<CaptureInfo>,
}

impl Pipeline {
    pub fn new(config: DecoderConfig, sink: Sink) -> Self {
        Pipeline {
            config,
            decoder: Decoder::new(),
            sink,
            anchor: TimestampAnchor::new(),
            capture: None,
        }
    }

    /// Deterministic wall anchor for ACARS timestamps.
    pub fn with_anchor(mut self, anchor: TimestampAnchor) -> Self {
        self.anchor = anchor;
        self
    }

    fn capture(&mut self, timestamp: u64) -> &CaptureInfo {
        let file_info = self.config.file_info.clone();
        self.capture.get_or_insert_with(|| {
            let t0_ns = timestamp / 1_000_000_000 * 1_000_000_000;
            let start_s = t0_ns / 1_000_000_000;
            CaptureInfo {
                t0_ns,
                file_info: file_info.unwrap_or_else(|| format!("i-{}-t1", start_s)),
                parsed_info: format!("p-{}", start_s),
            }
        })
    }

    /// Feed one frame: emit its lines and return the decoded records.
    pub fn handle_frame(&mut self, frame: &DemodFrame) -> FrameOutput {
        let raw_to_stdout =
            !(self.config.diagnostic || self.config.acars || self.config.acars_json);

        if (raw_to_stdout || self.sink.has_publish()) && self.sink.is_active() {
            let info = self.capture(frame.timestamp);
            let line = output::format_raw(frame, &info.file_info, info.t0_ns);
            self.sink.emit(&line, raw_to_stdout);
        }

        let out = self.decoder.process(frame);

        if self.config.parsed {
            if let Some(burst) = &out.burst {
                let to_stdout = !self.config.diagnostic;
                if (to_stdout || self.sink.has_publish()) && self.sink.is_active() {
                    let info = self.capture(burst.timestamp);
                    let line = output::format_ida(burst, &info.parsed_info, info.t0_ns);
                    self.sink.emit(&line, to_stdout);
                }
            }
        }

        if let Some(rec) = &out.acars {
            if self.config.acars_json {
                // strict mode: only clean records enter the feed
                if rec.errors == 0 {
                    let line =
                        output::format_json(rec, &mut self.anchor, self.config.station.as_deref());
                    self.sink.emit(&line, true);
                }
            } else if self.config.acars {
                let line = output::format_text(rec, &mut self.anchor);
                self.sink.emit(&line, true);
            }
        }

        out
    }

    /// Drain frames until the flag drops or the producer hangs up.
    /// In-flight reassembly state is discarded on exit.
    pub fn run(&mut self, frames: Receiver<DemodFrame>, running: &AtomicBool) {
        info!("pipeline started");
        let mut processed = 0u64;
        while running.load(Ordering::Relaxed) {
            match frames.recv_timeout(Duration::from_millis(100)) {
                Ok(frame) => {
                    self.handle_frame(&frame);
                    processed += 1;
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.decoder.reset();
        debug!(processed, "pipeline stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Direction;

    fn frame(ts_ms: u64, bits: usize) -> DemodFrame {
        DemodFrame {
            id: 1,
            timestamp: ts_ms * 1_000_000,
            center_frequency: 1_626_000_000.0,
            direction: Direction::Downlink,
            magnitude: 10.0,
            noise: -80.0,
            level: 0.01,
            confidence: 90,
            n_payload_symbols: 10,
            bits: bitvec::bitvec![u8, bitvec::order::Msb0; 0; bits],
            llr: None,
        }
    }

    #[test]
    fn test_short_frame_produces_nothing() {
        let mut d = Decoder::new();
        let out = d.process(&frame(0, 100));
        assert!(out.burst.is_none());
        assert!(out.message.is_none());
        assert!(out.acars.is_none());
    }

    #[test]
    fn test_all_zero_frame_rejected_by_lcw() {
        // 24 + 46 + 124 zero bits: the zero LCW decodes but ft == 0, so the
        // IDA stage never starts
        let mut d = Decoder::new();
        let out = d.process(&frame(0, 24 + 46 + 124));
        assert!(out.burst.is_none());
    }

    #[test]
    fn test_run_stops_on_disconnect() {
        use std::sync::mpsc::sync_channel;

        crate::tracing_init::init_test_tracing();
        let mut p = Pipeline::new(DecoderConfig::default(), Sink::silent());
        let running = AtomicBool::new(true);
        let (tx, rx) = sync_channel::<DemodFrame>(4);
        tx.send(frame(0, 10)).unwrap();
        drop(tx);
        // returns once the channel disconnects
        p.run(rx, &running);
    }

    #[test]
    fn test_run_observes_cancellation() {
        use std::sync::mpsc::sync_channel;

        let mut p = Pipeline::new(DecoderConfig::default(), Sink::silent());
        let running = AtomicBool::new(false);
        let (_tx, rx) = sync_channel::<DemodFrame>(4);
        p.run(rx, &running);
    }

    #[test]
    fn test_capture_info_derived_from_first_frame() {
        let mut p = Pipeline::new(DecoderConfig::default(), Sink::silent());
        let info = p.capture(12_345_678_912_345);
        assert_eq!(info.t0_ns, 12_345_000_000_000);
        assert_eq!(info.file_info, "i-12345-t1");
        assert_eq!(info.parsed_info, "p-12345");
    }
}
