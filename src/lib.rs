//! Iridium L-band data-channel decoder
//!
//! Takes demodulated bursts from the Iridium downlink/uplink (1616-1626 MHz)
//! and extracts the application layer: IDA data bursts, SBD packets, ACARS
//! messages and embedded terminal positions.
//!
//! The pipeline is a one-way chain, each stage yielding at most one record
//! per input:
//!
//! ```text
//! DemodFrame -> IdaBurst -> IdaMessage -> SbdPacket -> AcarsRecord
//! ```
//!
//! LCW classification and the payload FEC live in `lcw` and `bch`, the
//! burst/reassembly stages in `ida` and `sbd`, and the line/JSON renderers
//! in `output`. `pipeline::Decoder` wires the stages together with their
//! reassembly state; `pipeline::Pipeline` adds output routing.

pub mod acars;
pub mod bch;
pub mod bits;
pub mod frame;
pub mod ida;
pub mod lcw;
pub mod mtpos;
pub mod output;
pub mod pipeline;
pub mod sbd;
pub mod tracing_init;

pub use frame::{DemodFrame, Direction, SampleBuf, SampleFormat};
pub use pipeline::{Decoder, DecoderConfig, FrameOutput, Pipeline};
