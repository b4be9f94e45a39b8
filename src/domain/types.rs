//! Core domain newtypes
//!
//! Small id wrappers give compile-time safety and self-documenting
//! signatures: a `Tid` can never be passed where a `Pid` is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Monotonic hardware timestamp. Not wall-clock; only meaningful relative
/// to the capture's own min timestamp.
pub type TickType = u64;

/// Ticks per microsecond for the capture clock.
pub const TICKS_PER_US: f64 = 1000.0;

/// Microseconds elapsed between two ticks.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn micros_from_ticks(start: TickType, end: TickType) -> f64 {
    (end.saturating_sub(start)) as f64 / TICKS_PER_US
}

/// Tick offset equivalent to the given microseconds.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
#[must_use]
pub fn ticks_from_micros(micros: f64) -> TickType {
    (micros.max(0.0) * TICKS_PER_US) as TickType
}

/// Process ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pid(pub i32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PID:{}", self.0)
    }
}

impl Default for Pid {
    /// -1 means "no process selected".
    fn default() -> Self {
        Pid(-1)
    }
}

/// Thread ID. `Tid::ALL` (0) is reserved for the whole-process aggregate,
/// and doubles as the default.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Tid(pub i32);

impl Tid {
    /// Synthetic id holding all-threads/process-wide data.
    pub const ALL: Tid = Tid(0);
}

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TID:{}", self.0)
    }
}

/// Hash identifying one GPU timeline ("sw queue", "hw execution", ...).
/// Doubles as a StringManager key for the timeline's display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimelineHash(pub u64);

/// Id of a deduplicated callstack, assigned by the remote side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallstackId(pub u64);

/// RGBA track color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color(pub u8, pub u8, pub u8, pub u8);

/// Fixed palette so the same thread keeps the same color for a session.
pub const THREAD_COLORS: [Color; 6] = [
    Color(231, 68, 53, 255),   // red
    Color(43, 145, 175, 255),  // blue
    Color(185, 117, 181, 255), // purple
    Color(87, 166, 74, 255),   // green
    Color(215, 171, 105, 255), // beige
    Color(248, 101, 22, 255),  // orange
];

/// Color used for introspection timers and the tracks carrying them.
pub const INTROSPECTION_GREEN: Color = Color(87, 166, 74, 255);

/// Deterministic per-thread color: `tid mod palette_size`.
#[allow(clippy::cast_sign_loss)]
#[must_use]
pub fn thread_color(tid: Tid) -> Color {
    THREAD_COLORS[(tid.0 as u32 as usize) % THREAD_COLORS.len()]
}
