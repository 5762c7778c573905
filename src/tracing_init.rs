//! Diagnostics setup
//!
//! Everything the pipeline has to say about itself goes through `tracing`:
//! silent record drops and Chase failures at `trace!`, reassembly timeouts
//! and evictions at `debug!`, lifecycle at `info!`. Stdout is reserved for
//! RAW/IDA/ACARS record lines, so the subscriber always writes to stderr.
//!
//! Filtering is `RUST_LOG`-driven. The defaults keep the per-burst paths
//! quiet; pin a single stage when chasing a decode problem, e.g.
//! `RUST_LOG=iridiumrx::ida=trace` to see why chains fail to close or
//! `RUST_LOG=iridiumrx::sbd=debug` for transfer expiry.

use tracing_subscriber::EnvFilter;

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Install the process-wide subscriber for the replay binary.
///
/// Call before the pipeline starts; record lines own stdout, diagnostics
/// go to stderr.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter("iridiumrx=info"))
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Subscriber for tests, installed at most once and captured per test.
///
/// Defaults to warnings so reassembly-heavy tests stay readable; raise it
/// through `RUST_LOG` when a specific stage is under investigation.
#[cfg(test)]
pub fn init_test_tracing() {
    use std::sync::Once;

    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter("iridiumrx=warn"))
            .with_test_writer()
            .init();
    });
}
