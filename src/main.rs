//! # tracelens - Main Entry Point
//!
//! Drives a recorded capture stream through the full ingestion path:
//! parse the recording, start a session, fold every event into the
//! timeline, then report statistics and write the capture file.

#![allow(clippy::cast_precision_loss)]

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracelens::capture::resolver::select_functions;
use tracelens::capture::{read_event_stream, CaptureClient, CaptureSession, ReplayTransport};
use tracelens::cli::Args;
use tracelens::domain::Pid;
use tracelens::export::{default_capture_file_name, save_capture};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.to_string().to_lowercase().contains("missing required argument") {
        EXIT_USAGE
    } else {
        EXIT_ERROR
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    let Some(ref replay_path) = args.replay else {
        bail!(
            "Missing required argument: --replay\n\n\
             Usage:\n  \
             tracelens --replay capture.events              Replay a recorded stream\n  \
             tracelens --replay capture.events -o out.json  Choose the output file\n\n\
             Run 'tracelens --help' for more options"
        );
    };

    let (mut request, events) = read_event_stream(replay_path)?;
    if let Some(pid) = args.pid {
        if request.process.pid != Pid(pid) {
            bail!(
                "Recorded stream is for {}, not PID:{pid}",
                request.process.pid
            );
        }
    }
    // Narrow the hooked set when filters are given; the recording's own
    // selection stands otherwise.
    if !args.hook.is_empty() {
        request.selected_functions = select_functions(&request.process, &args.hook);
    }

    if !args.quiet {
        println!("tracelens v{}", env!("CARGO_PKG_VERSION"));
        println!("replay: {}", replay_path.display());
        println!("process: {} ({})", request.process.name, request.process.pid);
        println!("hooked functions: {}", request.selected_functions.len());
    }

    let session = Arc::new(CaptureSession::new());
    session.time_graph().set_thread_filter(args.thread_filter.clone());
    let client = CaptureClient::new(ReplayTransport::new(events), Arc::clone(&session));
    let time_client_initialised = Instant::now();

    let time_capture_requested = Instant::now();
    client.start_capture(request)?;
    info!(
        "Capture started {:?} after the request ({:?} after client init)",
        time_capture_requested.elapsed(),
        time_client_initialised.elapsed()
    );

    wait_for_session_end(&session, &client, args.duration)?;
    info!("Session ended {:?} after client init", time_client_initialised.elapsed());

    // Build the display ordering once the stream has settled.
    session.time_graph().sort_tracks();

    if !args.quiet {
        print_statistics(&session);
    }

    let output: PathBuf = args.output.clone().unwrap_or_else(|| {
        let process_name = session.capture_data().lock().unwrap().process_name().to_string();
        PathBuf::from(default_capture_file_name(&process_name))
    });
    save_capture(&session, &output)
        .with_context(|| format!("Failed to save capture to {}", output.display()))?;
    if !args.quiet {
        println!("capture saved: {}", output.display());
    }
    Ok(())
}

/// Wait for a terminal state, stopping early when a duration limit is
/// set. Stop is request/acknowledge, so returning means the ingestion
/// thread has drained out.
fn wait_for_session_end(
    session: &CaptureSession,
    client: &CaptureClient,
    duration_secs: u64,
) -> Result<()> {
    let limit = (duration_secs > 0).then(|| Duration::from_secs(duration_secs));
    let started = Instant::now();
    while !session.state().is_terminal() {
        if let Some(limit) = limit {
            if started.elapsed() >= limit {
                info!("Duration limit reached, stopping capture");
                break;
            }
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    client.stop_capture()?;
    Ok(())
}

fn print_statistics(session: &CaptureSession) {
    let time_graph = session.time_graph();
    println!(
        "timers: {}  threads: {}  cores: {}  span: {:.3} ms",
        time_graph.num_timers(),
        time_graph.thread_count_map().len(),
        time_graph.num_cores(),
        time_graph.capture_time_span_us() / 1000.0
    );

    let capture_data = session.capture_data().lock().unwrap();
    let mut stats: Vec<_> = capture_data.all_function_stats().iter().collect();
    stats.sort_by(|a, b| b.1.total_time_ticks.cmp(&a.1.total_time_ticks));
    for (address, stat) in stats.iter().take(5) {
        let name = capture_data
            .find_function_by_address(**address)
            .map_or("?", |f| f.pretty_name.as_str());
        println!(
            "  {name}: {} calls, avg {:.3} us, total {:.3} ms",
            stat.count,
            stat.average_ticks() as f64 / 1000.0,
            stat.total_time_ticks as f64 / 1_000_000.0
        );
    }
    drop(capture_data);

    if let Some(report) = session.sampling_report() {
        println!("samples: {} over {} threads", report.num_samples(), report.threads.len());
        if let Some(summary) = report.summary {
            for function in summary.functions.iter().take(5) {
                println!(
                    "  {}: {} inclusive ({:.1}%), {} exclusive",
                    function.name,
                    function.inclusive,
                    function.inclusive_percent,
                    function.exclusive
                );
            }
        }
    }
}
