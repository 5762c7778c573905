//! Iridium RAW capture replay
//!
//! Reads captured RAW frame lines from a file (or stdin) and runs them
//! through the decode pipeline.
//!
//! **Usage**:
//! ```bash
//! iridiumrx --parsed capture.raw
//! iridium-extractor ... | iridiumrx --acars-json -
//! ```
//!
//! **Output**:
//! RAW lines pass through by default; `--parsed` adds decoded IDA lines,
//! `--acars`/`--acars-json` switch the sink to ACARS records.

use std::env;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::sync_channel;
use std::sync::Arc;
use std::thread;

use tracing::{debug, warn};

use iridiumrx::output::{parse_raw_line, AccessCodes, Sink};
use iridiumrx::{DecoderConfig, Pipeline};

/// Bound on the front-end queue; one entry per demodulated burst
const FRAME_QUEUE_DEPTH: usize = 256;

fn usage(program: &str) -> ! {
    eprintln!("Usage: {} [OPTIONS] [capture.raw]", program);
    eprintln!();
    eprintln!("Replays an iridium RAW capture through the IDA/SBD/ACARS decoder.");
    eprintln!("Reads from stdin when no file (or '-') is given.");
    eprintln!();
    eprintln!("The RAW format carries no direction field; the capturing radio's");
    eprintln!("unique-word patterns are needed to recover it from the leading bits.");
    eprintln!("Without --access-codes every frame replays direction-unknown and only");
    eprintln!("the RAW passthrough is useful.");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --parsed                Emit parsed IDA lines");
    eprintln!("  --acars                 Emit ACARS messages as text");
    eprintln!("  --acars-json            Emit ACARS messages as JSON (drops errored ones)");
    eprintln!("  --access-codes <dl,ul>  Unique-word bit patterns of the capturing radio");
    eprintln!("  --station <id>          Station identifier for the JSON feed");
    eprintln!("  --file-info <tag>       Capture tag for RAW lines");
    eprintln!("  --diagnostic            Suppress console frame output");
    process::exit(1);
}

fn main() {
    iridiumrx::tracing_init::init_tracing();

    let args: Vec<String> = env::args().collect();
    let mut config = DecoderConfig::default();
    let mut input_path: Option<String> = None;
    let mut access_codes: Option<AccessCodes> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--parsed" => config.parsed = true,
            "--acars" => config.acars = true,
            "--acars-json" => config.acars_json = true,
            "--diagnostic" => config.diagnostic = true,
            "--access-codes" => {
                i += 1;
                let spec = args.get(i).cloned().unwrap_or_else(|| usage(&args[0]));
                match AccessCodes::from_spec(&spec) {
                    Ok(codes) => access_codes = Some(codes),
                    Err(e) => {
                        eprintln!("Bad --access-codes: {}", e);
                        process::exit(1);
                    }
                }
            }
            "--station" => {
                i += 1;
                config.station = Some(args.get(i).cloned().unwrap_or_else(|| usage(&args[0])));
            }
            "--file-info" => {
                i += 1;
                config.file_info = Some(args.get(i).cloned().unwrap_or_else(|| usage(&args[0])));
            }
            "-h" | "--help" => usage(&args[0]),
            arg if !arg.starts_with("--") => input_path = Some(arg.to_string()),
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                usage(&args[0]);
            }
        }
        i += 1;
    }

    let reader: Box<dyn BufRead + Send> = match input_path.as_deref() {
        None | Some("-") => Box::new(BufReader::new(io::stdin())),
        Some(path) => match File::open(path) {
            Ok(f) => Box::new(BufReader::new(f)),
            Err(e) => {
                eprintln!("Failed to open '{}': {}", path, e);
                process::exit(1);
            }
        },
    };

    let running = Arc::new(AtomicBool::new(true));
    let (tx, rx) = sync_channel(FRAME_QUEUE_DEPTH);

    // Front-end stage: RAW lines -> frames
    let producer_running = Arc::clone(&running);
    let producer = thread::spawn(move || {
        let mut lines = 0u64;
        let mut bad = 0u64;
        for line in reader.lines() {
            if !producer_running.load(Ordering::Relaxed) {
                break;
            }
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    warn!("read error: {}", e);
                    break;
                }
            };
            if line.is_empty() {
                continue;
            }
            lines += 1;
            match parse_raw_line(&line, access_codes.as_ref()) {
                Ok(frame) => {
                    if tx.send(frame).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    bad += 1;
                    debug!("skipping line {}: {}", lines, e);
                }
            }
        }
        debug!(lines, bad, "input exhausted");
    });

    let mut pipeline = Pipeline::new(config, Sink::stdout());
    pipeline.run(rx, &running);

    running.store(false, Ordering::Relaxed);
    let _ = producer.join();
}
