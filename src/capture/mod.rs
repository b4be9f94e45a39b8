//! Capture ingestion: session state machine, event stream client and
//! target-process resolution.

pub mod client;
pub mod data;
pub mod listener;
pub mod replay;
pub mod resolver;

pub use client::{CaptureClient, CaptureTransport, StartCaptureRequest};
pub use data::{CaptureData, FunctionInfo, FunctionStats, ModuleData, ProcessData};
pub use listener::{CaptureEvent, CaptureSession, ListenerState};
pub use replay::{read_event_stream, ReplayTransport};
pub use resolver::{resolve_target_process, select_functions, ProcessResolver, TargetProcess};
