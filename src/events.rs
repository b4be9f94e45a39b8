//! Sampled-callstack event store
//!
//! Sampling produces a `CallstackEvent` per hit: a point in time, a thread
//! and a reference into the deduplicated callstack table. The buffer
//! indexes events per thread and additionally under the synthetic
//! all-threads bucket (`Tid::ALL`) so whole-process selections need no
//! merge step. One injectable instance per session, guarded internally.

use crate::domain::{CallstackId, TickType, Tid};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// A single sampled stack occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallstackEvent {
    pub time_tick: TickType,
    pub tid: Tid,
    pub callstack_id: CallstackId,
}

/// One unique call stack: return addresses ordered from innermost frame
/// outwards. Identical stacks recur across samples, hence the dedup table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Callstack {
    pub addresses: Vec<u64>,
}

type EventMap = BTreeMap<(TickType, Tid), CallstackEvent>;

/// Mutex-guarded store of callstack events, keyed by thread id and time.
#[derive(Debug, Default)]
pub struct EventBuffer {
    events: Mutex<BTreeMap<Tid, EventMap>>,
    min_time: AtomicU64,
    max_time: AtomicU64,
    num_events: AtomicU64,
}

impl EventBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: Mutex::new(BTreeMap::new()),
            min_time: AtomicU64::new(TickType::MAX),
            max_time: AtomicU64::new(0),
            num_events: AtomicU64::new(0),
        }
    }

    /// Record an event under its thread and under the all-threads bucket.
    pub fn add_event(&self, event: CallstackEvent) {
        let key = (event.time_tick, event.tid);
        {
            let mut events = self.events.lock().unwrap();
            events.entry(event.tid).or_default().insert(key, event);
            if event.tid != Tid::ALL {
                events.entry(Tid::ALL).or_default().insert(key, event);
            }
        }
        self.min_time.fetch_min(event.time_tick, Ordering::Relaxed);
        self.max_time.fetch_max(event.time_tick, Ordering::Relaxed);
        self.num_events.fetch_add(1, Ordering::Relaxed);
    }

    /// Events for `tid` with time in `[time_begin, time_end]`, time order.
    /// `Tid::ALL` queries the whole-process bucket.
    #[must_use]
    pub fn callstack_events(
        &self,
        time_begin: TickType,
        time_end: TickType,
        tid: Tid,
    ) -> Vec<CallstackEvent> {
        let events = self.events.lock().unwrap();
        let Some(per_thread) = events.get(&tid) else {
            return Vec::new();
        };
        per_thread
            .range((time_begin, Tid(i32::MIN))..=(time_end, Tid(i32::MAX)))
            .map(|(_, event)| *event)
            .collect()
    }

    /// Per-thread event counts (the all-threads bucket included under
    /// `Tid::ALL`), used by the track reorder heuristic.
    #[must_use]
    pub fn event_counts(&self) -> HashMap<Tid, usize> {
        self.events.lock().unwrap().iter().map(|(tid, map)| (*tid, map.len())).collect()
    }

    #[must_use]
    pub fn has_events(&self) -> bool {
        self.num_events.load(Ordering::Relaxed) > 0
    }

    #[must_use]
    pub fn num_events(&self) -> u64 {
        self.num_events.load(Ordering::Relaxed)
    }

    /// Earliest event tick, or None while empty.
    #[must_use]
    pub fn min_time(&self) -> Option<TickType> {
        self.has_events().then(|| self.min_time.load(Ordering::Relaxed))
    }

    /// Latest event tick, or None while empty.
    #[must_use]
    pub fn max_time(&self) -> Option<TickType> {
        self.has_events().then(|| self.max_time.load(Ordering::Relaxed))
    }

    /// Whole-capture reset, called when a new session replaces the old.
    pub fn reset(&self) {
        self.events.lock().unwrap().clear();
        self.min_time.store(TickType::MAX, Ordering::Relaxed);
        self.max_time.store(0, Ordering::Relaxed);
        self.num_events.store(0, Ordering::Relaxed);
    }
}
