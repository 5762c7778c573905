//! Record serialization and sink fan-out
//!
//! Each serializer turns a pipeline record into a line without a trailing
//! newline. `Sink` fans lines out to stdout and, when configured, to a
//! publish channel carrying the identical bytes; publishing never blocks
//! the pipeline, a full channel simply drops the line like a pub socket
//! with no subscribers.

use std::io::Write;
use std::sync::mpsc::{SyncSender, TrySendError};

use tracing::trace;

pub mod acars;
pub mod ida;
pub mod raw;

pub use acars::{format_json, format_text, TimestampAnchor};
pub use ida::format_ida;
pub use raw::{format_raw, parse_raw_line, AccessCodes, RawParseError};

/// Line sink: stdout plus an optional publish channel
pub struct Sink {
    stdout: bool,
    publish: Option<SyncSender<String>>,
}

impl Sink {
    pub fn stdout() -> Self {
        Sink { stdout: true, publish: None }
    }

    /// A sink that only publishes; used when stdout carries another format.
    pub fn silent() -> Self {
        Sink { stdout: false, publish: None }
    }

    pub fn with_publish(mut self, tx: SyncSender<String>) -> Self {
        self.publish = Some(tx);
        self
    }

    /// Whether emitting to this sink can have any effect at all.
    pub fn is_active(&self) -> bool {
        self.stdout || self.publish.is_some()
    }

    pub fn has_publish(&self) -> bool {
        self.publish.is_some()
    }

    /// Write one line. `to_stdout` gates the console copy per line, so a
    /// diagnostic or ACARS-only run still feeds subscribers.
    pub fn emit(&self, line: &str, to_stdout: bool) {
        if self.stdout && to_stdout {
            let out = std::io::stdout();
            let mut lock = out.lock();
            let _ = writeln!(lock, "{}", line);
            let _ = lock.flush();
        }
        if let Some(tx) = &self.publish {
            match tx.try_send(line.to_string()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => trace!("publish queue full, line dropped"),
                Err(TrySendError::Disconnected(_)) => {}
            }
        }
    }
}
