//! Tracks: named, time-indexed timer streams
//!
//! One track per thread, GPU timeline, the scheduler, and the synthetic
//! whole-process aggregate (thread id 0). A track owns one `TimerChain`
//! per nesting depth and maintains its own extent aggregates so the
//! registry can sort and cull tracks without touching the chains.

use super::chain::TimerChain;
use super::Timer;
use crate::domain::{thread_color, Color, TickType, Tid, TimelineHash};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// What a track represents. Enum instead of a class hierarchy; all kinds
/// share the same "receives timer, reports extent" surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Scheduler,
    Thread(Tid),
    /// Special thread track of id 0 aggregating the whole process.
    Process,
    Gpu(TimelineHash),
}

#[derive(Debug)]
pub struct Track {
    kind: TrackKind,
    chains: Mutex<BTreeMap<u32, Arc<TimerChain>>>,
    num_timers: AtomicUsize,
    min_tick: AtomicU64,
    max_tick: AtomicU64,
    name: Mutex<String>,
    color: Mutex<Color>,
}

impl Track {
    #[must_use]
    pub fn new(kind: TrackKind) -> Self {
        let color = match kind {
            TrackKind::Thread(tid) => thread_color(tid),
            TrackKind::Process => thread_color(Tid::ALL),
            // Scheduler and GPU slices are colored by submitter downstream.
            TrackKind::Scheduler | TrackKind::Gpu(_) => Color(100, 100, 100, 255),
        };
        Self {
            kind,
            chains: Mutex::new(BTreeMap::new()),
            num_timers: AtomicUsize::new(0),
            min_tick: AtomicU64::new(TickType::MAX),
            max_tick: AtomicU64::new(0),
            name: Mutex::new(String::new()),
            color: Mutex::new(color),
        }
    }

    #[must_use]
    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    /// Thread id for thread-like tracks (`Tid::ALL` for the process track).
    #[must_use]
    pub fn tid(&self) -> Option<Tid> {
        match self.kind {
            TrackKind::Thread(tid) => Some(tid),
            TrackKind::Process => Some(Tid::ALL),
            TrackKind::Scheduler | TrackKind::Gpu(_) => None,
        }
    }

    /// Append one timer at its depth, updating the track extent.
    pub fn on_timer(&self, timer: &Timer) {
        let chain = self.chain_at_depth_or_create(timer.depth);
        chain.push(*timer);
        self.num_timers.fetch_add(1, Ordering::Relaxed);
        self.min_tick.fetch_min(timer.start_tick, Ordering::Relaxed);
        self.max_tick.fetch_max(timer.end_tick, Ordering::Relaxed);
    }

    fn chain_at_depth_or_create(&self, depth: u32) -> Arc<TimerChain> {
        let mut chains = self.chains.lock().unwrap();
        Arc::clone(chains.entry(depth).or_insert_with(|| Arc::new(TimerChain::new())))
    }

    #[must_use]
    pub fn chain_at_depth(&self, depth: u32) -> Option<Arc<TimerChain>> {
        self.chains.lock().unwrap().get(&depth).map(Arc::clone)
    }

    /// All chains, ordered by depth.
    #[must_use]
    pub fn all_chains(&self) -> Vec<Arc<TimerChain>> {
        self.chains.lock().unwrap().values().map(Arc::clone).collect()
    }

    #[must_use]
    pub fn num_timers(&self) -> usize {
        self.num_timers.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_timers() == 0
    }

    /// Smallest start tick in the track, or None if empty.
    #[must_use]
    pub fn min_time(&self) -> Option<TickType> {
        if self.is_empty() {
            return None;
        }
        Some(self.min_tick.load(Ordering::Relaxed))
    }

    /// Largest end tick in the track, or None if empty.
    #[must_use]
    pub fn max_time(&self) -> Option<TickType> {
        if self.is_empty() {
            return None;
        }
        Some(self.max_tick.load(Ordering::Relaxed))
    }

    /// Timers with start strictly inside `(min, max)` across all depths.
    #[must_use]
    pub fn timers_in_range(&self, min: TickType, max: TickType) -> Vec<Timer> {
        let mut out = Vec::new();
        for chain in self.all_chains() {
            out.extend(chain.timers_in_range(min, max));
        }
        out
    }

    // Neighbor lookups used by same-thread navigation. All return owned
    // copies; there are no references into the mutable chains.

    /// Predecessor of `reference` in append order at the same depth.
    #[must_use]
    pub fn left_of(&self, reference: &Timer) -> Option<Timer> {
        self.chain_at_depth(reference.depth)?.snapshot().element_before(reference)
    }

    /// Successor of `reference` in append order at the same depth.
    #[must_use]
    pub fn right_of(&self, reference: &Timer) -> Option<Timer> {
        self.chain_at_depth(reference.depth)?.snapshot().element_after(reference)
    }

    /// Enclosing-level timer: last one at `depth - 1` starting at or
    /// before the reference start.
    #[must_use]
    pub fn up_of(&self, reference: &Timer) -> Option<Timer> {
        let depth = reference.depth.checked_sub(1)?;
        self.chain_at_depth(depth)?.snapshot().first_before_time(reference.start_tick)
    }

    /// Nested-level timer: first one at `depth + 1` starting after the
    /// reference start.
    #[must_use]
    pub fn down_of(&self, reference: &Timer) -> Option<Timer> {
        self.chain_at_depth(reference.depth + 1)?.snapshot().first_after_time(reference.start_tick)
    }

    #[must_use]
    pub fn name(&self) -> String {
        self.name.lock().unwrap().clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        *self.name.lock().unwrap() = name.into();
    }

    #[must_use]
    pub fn color(&self) -> Color {
        *self.color.lock().unwrap()
    }

    pub fn set_color(&self, color: Color) {
        *self.color.lock().unwrap() = color;
    }
}
