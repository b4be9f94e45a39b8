//! Offline sampling analysis
//!
//! A `SamplingProfiler` consumes a set of collected callstacks (the whole
//! capture on completion, or just the current selection) and produces
//! per-thread and per-function sample-count summaries for reporting. It
//! runs on the consumer side over a snapshot; ingestion never waits on it.

use crate::capture::data::CaptureData;
use crate::domain::Tid;
use crate::events::Callstack;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Sample counts for one function within one thread (or the summary).
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSampleCount {
    pub address: u64,
    pub name: String,
    /// Samples with this function on top of the stack.
    pub exclusive: u64,
    /// Samples with this function anywhere on the stack.
    pub inclusive: u64,
    /// Inclusive share of the thread's samples, 0.0 - 100.0.
    pub inclusive_percent: f64,
}

/// Per-thread sample aggregation, functions sorted by inclusive count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThreadSampleReport {
    pub tid: Tid,
    pub num_samples: u64,
    pub functions: Vec<FunctionSampleCount>,
}

/// Output of one sampling pass.
#[derive(Debug, Clone, Default)]
pub struct SamplingReport {
    pub threads: Vec<ThreadSampleReport>,
    /// Whole-process aggregation; only present when the profiler was asked
    /// to generate a summary (all-threads selection).
    pub summary: Option<ThreadSampleReport>,
}

impl SamplingReport {
    #[must_use]
    pub fn num_samples(&self) -> u64 {
        self.threads.iter().map(|t| t.num_samples).sum()
    }

    #[must_use]
    pub fn thread(&self, tid: Tid) -> Option<&ThreadSampleReport> {
        self.threads.iter().find(|t| t.tid == tid)
    }
}

#[derive(Debug, Default)]
struct ThreadSampleData {
    num_samples: u64,
    exclusive: HashMap<u64, u64>,
    inclusive: HashMap<u64, u64>,
}

impl ThreadSampleData {
    fn add(&mut self, callstack: &Callstack) {
        self.num_samples += 1;
        if let Some(top) = callstack.addresses.first() {
            *self.exclusive.entry(*top).or_default() += 1;
        }
        // Recursion: count each address once per sample.
        let unique: HashSet<u64> = callstack.addresses.iter().copied().collect();
        for address in unique {
            *self.inclusive.entry(address).or_default() += 1;
        }
    }
}

/// Folds callstacks into per-thread counters, then resolves names and
/// sorts on `process`.
#[derive(Debug, Default)]
pub struct SamplingProfiler {
    generate_summary: bool,
    per_thread: HashMap<Tid, ThreadSampleData>,
}

impl SamplingProfiler {
    /// `generate_summary` adds the whole-process aggregation; callers pass
    /// true only for all-threads selections.
    #[must_use]
    pub fn new(generate_summary: bool) -> Self {
        Self { generate_summary, per_thread: HashMap::new() }
    }

    pub fn add_callstack(&mut self, tid: Tid, callstack: Arc<Callstack>) {
        self.per_thread.entry(tid).or_default().add(&callstack);
        if self.generate_summary && tid != Tid::ALL {
            self.per_thread.entry(Tid::ALL).or_default().add(&callstack);
        }
    }

    #[must_use]
    pub fn num_samples(&self) -> u64 {
        self.per_thread
            .iter()
            .filter(|(tid, _)| **tid != Tid::ALL)
            .map(|(_, data)| data.num_samples)
            .sum()
    }

    /// Resolve names via the capture data and produce the sorted report.
    #[must_use]
    pub fn process(self, capture_data: &CaptureData) -> SamplingReport {
        let mut threads = Vec::new();
        let mut summary = None;
        for (tid, data) in self.per_thread {
            let report = build_thread_report(tid, &data, capture_data);
            if tid == Tid::ALL && self.generate_summary {
                summary = Some(report);
            } else {
                threads.push(report);
            }
        }
        // Busiest threads first; deterministic for equal counts.
        threads.sort_by(|a, b| b.num_samples.cmp(&a.num_samples).then(a.tid.cmp(&b.tid)));
        SamplingReport { threads, summary }
    }
}

#[allow(clippy::cast_precision_loss)]
fn build_thread_report(
    tid: Tid,
    data: &ThreadSampleData,
    capture_data: &CaptureData,
) -> ThreadSampleReport {
    let mut functions: Vec<FunctionSampleCount> = data
        .inclusive
        .iter()
        .map(|(address, inclusive)| FunctionSampleCount {
            address: *address,
            name: capture_data.function_name_for_sampled_address(*address),
            exclusive: data.exclusive.get(address).copied().unwrap_or(0),
            inclusive: *inclusive,
            inclusive_percent: if data.num_samples == 0 {
                0.0
            } else {
                *inclusive as f64 / data.num_samples as f64 * 100.0
            },
        })
        .collect();
    functions.sort_by(|a, b| b.inclusive.cmp(&a.inclusive).then(a.address.cmp(&b.address)));
    ThreadSampleReport { tid, num_samples: data.num_samples, functions }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::data::{CaptureData, FunctionInfo, ProcessData};
    use std::collections::HashMap as Map;

    fn capture_data() -> CaptureData {
        let mut selected = Map::new();
        selected.insert(
            0xa,
            FunctionInfo {
                pretty_name: "Render".to_string(),
                module_path: "/opt/game".to_string(),
                address: 0xa,
                size: 32,
            },
        );
        CaptureData::new(ProcessData::default(), Map::new(), selected, Map::new())
    }

    fn stack(addresses: &[u64]) -> Arc<Callstack> {
        Arc::new(Callstack { addresses: addresses.to_vec() })
    }

    #[test]
    fn test_exclusive_vs_inclusive() {
        let mut profiler = SamplingProfiler::new(false);
        profiler.add_callstack(Tid(1), stack(&[0xa, 0xb]));
        profiler.add_callstack(Tid(1), stack(&[0xb, 0xa]));
        let report = profiler.process(&capture_data());
        let thread = report.thread(Tid(1)).unwrap();
        assert_eq!(thread.num_samples, 2);
        let render = thread.functions.iter().find(|f| f.address == 0xa).unwrap();
        assert_eq!(render.name, "Render");
        assert_eq!(render.exclusive, 1);
        assert_eq!(render.inclusive, 2);
        assert!((render.inclusive_percent - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_recursive_frames_count_once_per_sample() {
        let mut profiler = SamplingProfiler::new(false);
        profiler.add_callstack(Tid(1), stack(&[0xa, 0xa, 0xa]));
        let report = profiler.process(&capture_data());
        let render = report.thread(Tid(1)).unwrap().functions.first().unwrap();
        assert_eq!(render.inclusive, 1);
        assert_eq!(render.exclusive, 1);
    }

    #[test]
    fn test_summary_only_when_requested() {
        let mut profiler = SamplingProfiler::new(false);
        profiler.add_callstack(Tid(1), stack(&[0xa]));
        assert!(profiler.process(&capture_data()).summary.is_none());

        let mut profiler = SamplingProfiler::new(true);
        profiler.add_callstack(Tid(1), stack(&[0xa]));
        profiler.add_callstack(Tid(2), stack(&[0xb]));
        let report = profiler.process(&capture_data());
        assert_eq!(report.num_samples(), 2);
        let summary = report.summary.as_ref().unwrap();
        assert_eq!(summary.num_samples, 2);
    }
}
