//! Chunked append-only timer storage
//!
//! A `TimerChain` is an ordered sequence of fixed-capacity `TimerBlock`s.
//! Each block tracks its own `[min_tick, max_tick]` bound, so a range
//! query can reject a whole block with one comparison and only scans the
//! blocks whose bound intersects the query. Blocks are filled strictly in
//! arrival order; a full block is sealed behind an `Arc` and never touched
//! again, so snapshots taken by the query thread stay valid while the
//! ingestion thread keeps appending.

use super::Timer;
use crate::domain::TickType;
use std::sync::{Arc, Mutex};

/// Timers per block. Exceeding it seals the block and opens a new one
/// rather than resizing, keeping sealed blocks stable for readers.
pub const BLOCK_CAPACITY: usize = 1024;

/// Fixed-capacity, append-only run of timers with a time bound.
#[derive(Debug, Clone)]
pub struct TimerBlock {
    timers: Vec<Timer>,
    min_tick: TickType,
    max_tick: TickType,
}

impl TimerBlock {
    fn new() -> Self {
        Self { timers: Vec::with_capacity(BLOCK_CAPACITY), min_tick: TickType::MAX, max_tick: 0 }
    }

    fn push(&mut self, timer: Timer) {
        self.min_tick = self.min_tick.min(timer.start_tick);
        self.max_tick = self.max_tick.max(timer.end_tick);
        self.timers.push(timer);
    }

    /// Whether this block's time bound overlaps `[min, max]`.
    #[must_use]
    pub fn intersects(&self, min: TickType, max: TickType) -> bool {
        !self.timers.is_empty() && self.min_tick <= max && self.max_tick >= min
    }

    #[must_use]
    pub fn timers(&self) -> &[Timer] {
        &self.timers
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    #[must_use]
    pub fn min_tick(&self) -> TickType {
        self.min_tick
    }

    #[must_use]
    pub fn max_tick(&self) -> TickType {
        self.max_tick
    }

    fn is_full(&self) -> bool {
        self.timers.len() >= BLOCK_CAPACITY
    }
}

#[derive(Debug)]
struct ChainInner {
    sealed: Vec<Arc<TimerBlock>>,
    open: TimerBlock,
    num_timers: usize,
    min_tick: TickType,
    max_tick: TickType,
}

/// Append-only, time-ordered sequence of timer blocks for one track depth.
///
/// Appends come from the single ingestion actor; queries may run
/// concurrently from the consumer actor and observe the chain at any
/// point-in-time length. The lock is held only for a bounded scan.
#[derive(Debug)]
pub struct TimerChain {
    inner: Mutex<ChainInner>,
}

impl Default for TimerChain {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerChain {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ChainInner {
                sealed: Vec::new(),
                open: TimerBlock::new(),
                num_timers: 0,
                min_tick: TickType::MAX,
                max_tick: 0,
            }),
        }
    }

    /// Append a timer. O(1) amortized; seals the open block when full.
    pub fn push(&self, timer: Timer) {
        let mut inner = self.inner.lock().unwrap();
        if inner.open.is_full() {
            let full = std::mem::replace(&mut inner.open, TimerBlock::new());
            inner.sealed.push(Arc::new(full));
        }
        inner.min_tick = inner.min_tick.min(timer.start_tick);
        inner.max_tick = inner.max_tick.max(timer.end_tick);
        inner.open.push(timer);
        inner.num_timers += 1;
    }

    /// Timers whose start tick lies strictly inside `(min, max)`.
    /// Blocks whose bound misses the range are skipped without a scan.
    #[must_use]
    pub fn timers_in_range(&self, min: TickType, max: TickType) -> Vec<Timer> {
        let mut out = Vec::new();
        let inner = self.inner.lock().unwrap();
        let blocks = inner.sealed.iter().map(|b| b.as_ref()).chain(std::iter::once(&inner.open));
        for block in blocks {
            if !block.intersects(min, max) {
                continue;
            }
            for timer in block.timers() {
                if timer.start_tick > min && timer.start_tick < max {
                    out.push(*timer);
                }
            }
        }
        out
    }

    /// Point-in-time copy of the block sequence. Sealed blocks are shared,
    /// the open block is copied, so the snapshot never tears.
    #[must_use]
    pub fn snapshot(&self) -> ChainSnapshot {
        let inner = self.inner.lock().unwrap();
        let mut blocks = inner.sealed.clone();
        if !inner.open.is_empty() {
            blocks.push(Arc::new(inner.open.clone()));
        }
        ChainSnapshot { blocks }
    }

    #[must_use]
    pub fn num_timers(&self) -> usize {
        self.inner.lock().unwrap().num_timers
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_timers() == 0
    }

    /// Smallest start tick seen, or None if empty.
    #[must_use]
    pub fn min_tick(&self) -> Option<TickType> {
        let inner = self.inner.lock().unwrap();
        (inner.num_timers > 0).then_some(inner.min_tick)
    }

    /// Largest end tick seen, or None if empty.
    #[must_use]
    pub fn max_tick(&self) -> Option<TickType> {
        let inner = self.inner.lock().unwrap();
        (inner.num_timers > 0).then_some(inner.max_tick)
    }
}

/// Immutable view over a chain's blocks taken at one instant.
#[derive(Debug, Clone, Default)]
pub struct ChainSnapshot {
    blocks: Vec<Arc<TimerBlock>>,
}

impl ChainSnapshot {
    #[must_use]
    pub fn blocks(&self) -> &[Arc<TimerBlock>] {
        &self.blocks
    }

    pub fn iter_timers(&self) -> impl Iterator<Item = &Timer> {
        self.blocks.iter().flat_map(|b| b.timers().iter())
    }

    /// Position-wise predecessor of `reference` in append order.
    #[must_use]
    pub fn element_before(&self, reference: &Timer) -> Option<Timer> {
        let mut previous: Option<Timer> = None;
        for timer in self.iter_timers() {
            if timer == reference {
                return previous;
            }
            previous = Some(*timer);
        }
        None
    }

    /// Position-wise successor of `reference` in append order.
    #[must_use]
    pub fn element_after(&self, reference: &Timer) -> Option<Timer> {
        let mut take_next = false;
        for timer in self.iter_timers() {
            if take_next {
                return Some(*timer);
            }
            if timer == reference {
                take_next = true;
            }
        }
        None
    }

    /// First timer starting strictly after `time`.
    #[must_use]
    pub fn first_after_time(&self, time: TickType) -> Option<Timer> {
        self.iter_timers().find(|t| t.start_tick > time).copied()
    }

    /// Last timer starting at or before `time`.
    #[must_use]
    pub fn first_before_time(&self, time: TickType) -> Option<Timer> {
        let mut candidate: Option<Timer> = None;
        for timer in self.iter_timers() {
            if timer.start_tick > time {
                break;
            }
            candidate = Some(*timer);
        }
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Tid;
    use crate::timeline::TimerType;

    fn timer(start: TickType, end: TickType) -> Timer {
        Timer {
            start_tick: start,
            end_tick: end,
            tid: Tid(1),
            processor: 0,
            depth: 0,
            function_address: 0,
            timer_type: TimerType::Other,
            user_data: [0, 0],
        }
    }

    #[test]
    fn test_range_query_is_strict_and_exact() {
        let chain = TimerChain::new();
        for start in [10, 20, 30, 40, 50] {
            chain.push(timer(start, start + 5));
        }
        let hits = chain.timers_in_range(20, 50);
        let starts: Vec<_> = hits.iter().map(|t| t.start_tick).collect();
        // Strict bounds: 20 and 50 themselves are excluded.
        assert_eq!(starts, vec![30, 40]);
    }

    #[test]
    fn test_blocks_seal_at_capacity() {
        let chain = TimerChain::new();
        let total = BLOCK_CAPACITY + 10;
        for i in 0..total {
            let start = i as TickType;
            chain.push(timer(start, start + 1));
        }
        assert_eq!(chain.num_timers(), total);
        let snapshot = chain.snapshot();
        assert_eq!(snapshot.blocks().len(), 2);
        assert_eq!(snapshot.blocks()[0].len(), BLOCK_CAPACITY);
        assert_eq!(snapshot.blocks()[1].len(), 10);
        // The query still sees every timer across the block boundary.
        let hits = chain.timers_in_range(0, total as TickType + 1);
        assert_eq!(hits.len(), total - 1); // start 0 excluded by strict lower bound
    }

    #[test]
    fn test_block_bounds_skip_disjoint_blocks() {
        let chain = TimerChain::new();
        chain.push(timer(100, 200));
        chain.push(timer(300, 400));
        let snapshot = chain.snapshot();
        let block = &snapshot.blocks()[0];
        assert!(block.intersects(150, 160));
        assert!(!block.intersects(500, 600));
        assert_eq!(block.min_tick(), 100);
        assert_eq!(block.max_tick(), 400);
    }

    #[test]
    fn test_snapshot_unaffected_by_later_appends() {
        let chain = TimerChain::new();
        chain.push(timer(1, 2));
        let snapshot = chain.snapshot();
        chain.push(timer(3, 4));
        assert_eq!(snapshot.iter_timers().count(), 1);
        assert_eq!(chain.num_timers(), 2);
    }

    #[test]
    fn test_neighbor_lookups() {
        let chain = TimerChain::new();
        let a = timer(10, 15);
        let b = timer(20, 25);
        let c = timer(30, 35);
        chain.push(a);
        chain.push(b);
        chain.push(c);
        let snap = chain.snapshot();
        assert_eq!(snap.element_before(&b), Some(a));
        assert_eq!(snap.element_after(&b), Some(c));
        assert_eq!(snap.element_before(&a), None);
        assert_eq!(snap.element_after(&c), None);
        assert_eq!(snap.first_after_time(20).map(|t| t.start_tick), Some(30));
        assert_eq!(snap.first_before_time(20).map(|t| t.start_tick), Some(20));
        assert_eq!(snap.first_before_time(5), None);
    }

    #[test]
    fn test_min_max_aggregates() {
        let chain = TimerChain::new();
        assert_eq!(chain.min_tick(), None);
        chain.push(timer(50, 80));
        chain.push(timer(10, 20));
        assert_eq!(chain.min_tick(), Some(10));
        assert_eq!(chain.max_tick(), Some(80));
    }
}
