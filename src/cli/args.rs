//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tracelens",
    about = "Ingest and analyze instrumented capture streams",
    after_help = "\
EXAMPLES:
    tracelens --pid 1234 --hook RenderFrame              Hook one function
    tracelens --pid 1234 --hook Render --hook Physics    Multiple filters
    tracelens --replay capture.events -o capture.json    Replay a recorded stream"
)]
pub struct Args {
    /// Replay a recorded event stream instead of connecting to a service
    #[arg(long, value_name = "FILE")]
    pub replay: Option<PathBuf>,

    /// Process ID to capture
    #[arg(short, long)]
    pub pid: Option<i32>,

    /// Hook functions whose pretty name contains this substring (repeatable)
    #[arg(long, value_name = "FILTER")]
    pub hook: Vec<String>,

    /// Stop the capture after N seconds (0 = until the stream ends)
    #[arg(long, default_value = "0")]
    pub duration: u64,

    /// Write the capture file here (defaults to a name derived from the process)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Space-separated thread-name tokens; threads matching no token are hidden
    #[arg(long, default_value = "")]
    pub thread_filter: String,

    /// Suppress the end-of-capture statistics summary
    #[arg(short, long)]
    pub quiet: bool,
}
