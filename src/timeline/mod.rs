//! Timeline indexing core
//!
//! This module contains the time-ordered storage and query structures:
//! - `chain`: chunked append-only timer storage with range-bounded queries
//! - `track`: per-thread/GPU/scheduler timer streams with aggregates
//! - `time_graph`: track registry, time window, sorting and navigation

pub mod chain;
pub mod time_graph;
pub mod track;

pub use chain::{ChainSnapshot, TimerBlock, TimerChain, BLOCK_CAPACITY};
pub use time_graph::{JumpDirection, JumpScope, TimeGraph};
pub use track::{Track, TrackKind};

use crate::domain::{TickType, Tid, TimelineHash};
use serde::{Deserialize, Serialize};

/// Kind of activity a timer records. GPU activity timers carry a timeline
/// name key in `user_data[1]` instead of thread-id semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerType {
    CoreActivity,
    GpuActivity,
    Introspection,
    Other,
}

/// One recorded begin/end interval: an instrumented function call, a GPU
/// submission stage, or a core-activity slice. Immutable once ingested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timer {
    pub start_tick: TickType,
    pub end_tick: TickType,
    pub tid: Tid,
    /// CPU core the slice ran on; meaningful for `CoreActivity`.
    pub processor: i32,
    /// Nesting depth within the owning track.
    pub depth: u32,
    /// Address of the instrumented function, 0 if not function-bound.
    pub function_address: u64,
    pub timer_type: TimerType,
    pub user_data: [u64; 2],
}

impl Timer {
    #[must_use]
    pub fn elapsed_ticks(&self) -> TickType {
        self.end_tick - self.start_tick
    }

    /// Timeline hash of a GPU activity timer.
    #[must_use]
    pub fn gpu_timeline_hash(&self) -> TimelineHash {
        TimelineHash(self.user_data[1])
    }
}
