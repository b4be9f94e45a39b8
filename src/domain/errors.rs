//! Structured error types for tracelens
//!
//! Using thiserror for automatic Display implementation and error chaining.

use super::types::Pid;
use thiserror::Error;

/// Protocol and consistency errors raised while folding the event stream.
///
/// `UnknownTimerFunction` is the contract-breach case: the remote service
/// must only emit timers for addresses registered at capture start, so an
/// unknown address aborts the session rather than corrupting statistics.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Capture already started; OnCaptureStarted is valid at most once per session")]
    AlreadyStarted,

    #[error("Event {0} received before the capture was started")]
    NotStarted(&'static str),

    #[error("Event {0} received after the capture reached a terminal state")]
    Terminated(&'static str),

    #[error("Timer references function address {0:#x} absent from the resolved function set")]
    UnknownTimerFunction(u64),

    #[error("Timer interval inverted: end tick {end_tick} precedes start tick {start_tick}")]
    InvertedTimer { start_tick: u64, end_tick: u64 },

    #[error("Capture failed: {0}")]
    Failed(String),
}

/// Fatal session-establishment errors. A start failure means no session
/// was established and no callbacks will be delivered.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to retrieve process list: {0}")]
    ProcessListFailed(String),

    #[error("Process {0} not found")]
    ProcessNotFound(Pid),

    #[error("Module corresponding to process binary {path} not found")]
    MainModuleNotFound { path: String },

    #[error("Failed to load module list for {0}: {1}")]
    ModuleListFailed(Pid, String),

    #[error("Failed to load symbols for {path}: {reason}")]
    SymbolsFailed { path: String, reason: String },

    #[error("Failed to establish control channel: {0}")]
    ControlChannel(String),

    #[error("Capture could not be started: {0}")]
    StartRejected(String),

    #[error("Capture could not be stopped: {0}")]
    StopRejected(String),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to serialize capture data: {0}")]
    SerializationFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
