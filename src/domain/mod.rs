//! Domain model for tracelens
//!
//! This module contains core domain types and errors that provide:
//! - Compile-time safety via newtype pattern
//! - Self-documenting function signatures
//! - Structured error handling

pub mod errors;
pub mod types;

// Re-export common types for convenience
pub use types::{
    micros_from_ticks, thread_color, ticks_from_micros, CallstackId, Color, Pid, TickType, Tid,
    TimelineHash, INTROSPECTION_GREEN, THREAD_COLORS, TICKS_PER_US,
};

pub use errors::{CaptureError, ExportError, SessionError};
