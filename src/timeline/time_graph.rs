//! Track registry, time window and navigation
//!
//! The `TimeGraph` owns every track of the session, the capture-wide
//! timestamp extrema and the visible time window. The ingestion actor
//! routes timers into it on every event; the consumer actor re-sorts it
//! at most once per second and runs the interactive queries (zoom, pan,
//! range selection, nearest-event jumps). Locks are per-structure and
//! held only for a lookup or a bounded scan.

use super::chain::ChainSnapshot;
use super::track::{Track, TrackKind};
use super::{Timer, TimerType};
use crate::capture::data::CaptureData;
use crate::domain::{
    micros_from_ticks, ticks_from_micros, TickType, Tid, TimelineHash, INTROSPECTION_GREEN,
};
use crate::events::{CallstackEvent, EventBuffer};
use crate::sampling::{SamplingProfiler, SamplingReport};
use crate::strings::StringManager;
use log::debug;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Windows narrower than this are rejected by `zoom_time` to prevent
/// degenerate division (1 ns expressed in microseconds).
const MIN_TIME_WINDOW_US: f64 = 0.001;

/// Cursor zoom step per wheel notch.
const ZOOM_INCREMENT_RATIO: f64 = 0.1;

/// Tracks are reordered at most this often while capturing.
const THREAD_REORDER_PERIOD: Duration = Duration::from_millis(1000);

/// Seconds of history `zoom_all` keeps in view.
const NUM_HISTORY_SECONDS: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpDirection {
    Previous,
    Next,
    Top,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpScope {
    SameThread,
    SameFunction,
}

#[derive(Debug, Default)]
struct TrackRegistry {
    /// All tracks in creation order.
    all: Vec<Arc<Track>>,
    scheduler: Option<Arc<Track>>,
    /// Thread tracks keyed by tid; tid 0 is the process track.
    thread_tracks: HashMap<Tid, Arc<Track>>,
    /// Ordered map so GPU tracks list deterministically.
    gpu_tracks: BTreeMap<TimelineHash, Arc<Track>>,
    /// Tids in first-seen order, the sort tie-break.
    first_seen: Vec<Tid>,
    cores_seen: HashSet<i32>,
    /// Instrumented-function timer count per thread.
    thread_count: HashMap<Tid, u64>,
}

#[derive(Debug)]
struct TimeWindow {
    min_time_us: f64,
    max_time_us: f64,
    /// Pixel-space extent the renderer mapped the window onto.
    world_start_x: f64,
    world_width: f64,
}

impl Default for TimeWindow {
    fn default() -> Self {
        Self { min_time_us: 0.0, max_time_us: 0.0, world_start_x: 0.0, world_width: 0.0 }
    }
}

#[derive(Debug)]
struct SortState {
    sorted: Vec<Arc<Track>>,
    last_reorder: Instant,
    thread_filter: String,
    /// Sample-event count per thread from the last sort pass.
    event_count: HashMap<Tid, usize>,
}

impl Default for SortState {
    fn default() -> Self {
        Self {
            sorted: Vec::new(),
            // Allow the first sort to reorder immediately.
            last_reorder: Instant::now()
                .checked_sub(THREAD_REORDER_PERIOD)
                .unwrap_or_else(Instant::now),
            thread_filter: String::new(),
            event_count: HashMap::new(),
        }
    }
}

pub struct TimeGraph {
    strings: Arc<StringManager>,
    event_buffer: Arc<EventBuffer>,
    registry: Mutex<TrackRegistry>,
    capture_min_timestamp: AtomicU64,
    capture_max_timestamp: AtomicU64,
    window: Mutex<TimeWindow>,
    sort_state: Mutex<SortState>,
    selected_events: Mutex<HashMap<Tid, Vec<CallstackEvent>>>,
    selection_report: Mutex<Option<SamplingReport>>,
    capturing: AtomicBool,
}

impl TimeGraph {
    #[must_use]
    pub fn new(strings: Arc<StringManager>, event_buffer: Arc<EventBuffer>) -> Self {
        let graph = Self {
            strings,
            event_buffer,
            registry: Mutex::new(TrackRegistry::default()),
            capture_min_timestamp: AtomicU64::new(TickType::MAX),
            capture_max_timestamp: AtomicU64::new(0),
            window: Mutex::new(TimeWindow::default()),
            sort_state: Mutex::new(SortState::default()),
            selected_events: Mutex::new(HashMap::new()),
            selection_report: Mutex::new(None),
            capturing: AtomicBool::new(false),
        };
        graph.get_or_create_scheduler_track();
        // The process track is a special thread track of id 0.
        graph.get_or_create_thread_track(Tid::ALL);
        graph
    }

    /// Reset all session state: tracks, extrema, selection, event buffer.
    pub fn clear(&self) {
        {
            let mut registry = self.registry.lock().unwrap();
            *registry = TrackRegistry::default();
        }
        self.capture_min_timestamp.store(TickType::MAX, Ordering::Relaxed);
        self.capture_max_timestamp.store(0, Ordering::Relaxed);
        *self.window.lock().unwrap() = TimeWindow::default();
        *self.sort_state.lock().unwrap() = SortState::default();
        self.selected_events.lock().unwrap().clear();
        *self.selection_report.lock().unwrap() = None;
        self.event_buffer.reset();
        self.get_or_create_scheduler_track();
        self.get_or_create_thread_track(Tid::ALL);
    }

    pub fn set_capturing(&self, capturing: bool) {
        self.capturing.store(capturing, Ordering::Relaxed);
    }

    // ── Track registry ──────────────────────────────────────────────────

    /// Find-or-insert; idempotent and safe from both actors.
    pub fn get_or_create_scheduler_track(&self) -> Arc<Track> {
        let mut registry = self.registry.lock().unwrap();
        if let Some(track) = &registry.scheduler {
            return Arc::clone(track);
        }
        let track = Arc::new(Track::new(TrackKind::Scheduler));
        registry.all.push(Arc::clone(&track));
        registry.scheduler = Some(Arc::clone(&track));
        track
    }

    pub fn get_or_create_thread_track(&self, tid: Tid) -> Arc<Track> {
        let mut registry = self.registry.lock().unwrap();
        if let Some(track) = registry.thread_tracks.get(&tid) {
            return Arc::clone(track);
        }
        let kind = if tid == Tid::ALL { TrackKind::Process } else { TrackKind::Thread(tid) };
        let track = Arc::new(Track::new(kind));
        registry.all.push(Arc::clone(&track));
        registry.thread_tracks.insert(tid, Arc::clone(&track));
        registry.first_seen.push(tid);
        track
    }

    pub fn get_or_create_gpu_track(&self, timeline_hash: TimelineHash) -> Arc<Track> {
        let mut registry = self.registry.lock().unwrap();
        if let Some(track) = registry.gpu_tracks.get(&timeline_hash) {
            return Arc::clone(track);
        }
        let track = Arc::new(Track::new(TrackKind::Gpu(timeline_hash)));
        registry.all.push(Arc::clone(&track));
        registry.gpu_tracks.insert(timeline_hash, Arc::clone(&track));
        track
    }

    #[must_use]
    pub fn thread_track(&self, tid: Tid) -> Option<Arc<Track>> {
        self.registry.lock().unwrap().thread_tracks.get(&tid).map(Arc::clone)
    }

    #[must_use]
    pub fn all_tracks(&self) -> Vec<Arc<Track>> {
        self.registry.lock().unwrap().all.clone()
    }

    #[must_use]
    pub fn num_cores(&self) -> usize {
        self.registry.lock().unwrap().cores_seen.len()
    }

    #[must_use]
    pub fn num_timers(&self) -> usize {
        self.registry.lock().unwrap().all.iter().map(|t| t.num_timers()).sum()
    }

    /// Instrumented-timer count per thread, as used by the sort heuristic.
    #[must_use]
    pub fn thread_count_map(&self) -> HashMap<Tid, u64> {
        self.registry.lock().unwrap().thread_count.clone()
    }

    // ── Timer routing ───────────────────────────────────────────────────

    /// Route one ingested timer to its track and update the extrema.
    /// Called from the ingestion actor only.
    pub fn process_timer(&self, timer: &Timer) {
        self.capture_max_timestamp.fetch_max(timer.end_tick, Ordering::Relaxed);

        match timer.timer_type {
            TimerType::GpuActivity => {
                let hash = timer.gpu_timeline_hash();
                let track = self.get_or_create_gpu_track(hash);
                if track.name().is_empty() {
                    track.set_name(self.strings.get(hash.0).unwrap_or_default());
                }
                track.on_timer(timer);
            }
            TimerType::CoreActivity => {
                let track = self.get_or_create_scheduler_track();
                track.on_timer(timer);
                self.registry.lock().unwrap().cores_seen.insert(timer.processor);
            }
            TimerType::Introspection | TimerType::Other => {
                let track = self.get_or_create_thread_track(timer.tid);
                if timer.timer_type == TimerType::Introspection {
                    track.set_color(INTROSPECTION_GREEN);
                }
                track.on_timer(timer);
                if timer.function_address > 0 {
                    *self.registry.lock().unwrap().thread_count.entry(timer.tid).or_default() += 1;
                }
            }
        }
    }

    // ── Capture extrema ─────────────────────────────────────────────────

    /// Recompute the capture-wide min timestamp from all tracks and the
    /// event buffer; returns false while nothing has arrived yet.
    pub fn update_capture_min_max_timestamps(&self) -> bool {
        let mut min = TickType::MAX;
        for track in self.all_tracks() {
            if let Some(track_min) = track.min_time() {
                if track_min > 0 {
                    min = min.min(track_min);
                }
            }
        }
        if let Some(event_min) = self.event_buffer.min_time() {
            min = min.min(event_min);
        }
        if let Some(event_max) = self.event_buffer.max_time() {
            self.capture_max_timestamp.fetch_max(event_max, Ordering::Relaxed);
        }
        self.capture_min_timestamp.store(min, Ordering::Relaxed);
        min != TickType::MAX
    }

    #[must_use]
    pub fn capture_min_timestamp(&self) -> TickType {
        let min = self.capture_min_timestamp.load(Ordering::Relaxed);
        if min == TickType::MAX {
            0
        } else {
            min
        }
    }

    #[must_use]
    pub fn capture_max_timestamp(&self) -> TickType {
        self.capture_max_timestamp.load(Ordering::Relaxed)
    }

    /// Full capture span in microseconds.
    pub fn capture_time_span_us(&self) -> f64 {
        if self.update_capture_min_max_timestamps() {
            micros_from_ticks(
                self.capture_min_timestamp.load(Ordering::Relaxed),
                self.capture_max_timestamp.load(Ordering::Relaxed),
            )
        } else {
            0.0
        }
    }

    // ── Time window ─────────────────────────────────────────────────────

    #[must_use]
    pub fn min_time_us(&self) -> f64 {
        self.window.lock().unwrap().min_time_us
    }

    #[must_use]
    pub fn max_time_us(&self) -> f64 {
        self.window.lock().unwrap().max_time_us
    }

    #[must_use]
    pub fn current_time_span_us(&self) -> f64 {
        let window = self.window.lock().unwrap();
        window.max_time_us - window.min_time_us
    }

    /// Clamp the requested window into `[0, capture_span]`, preserving the
    /// requested width by shifting at the upper bound when possible.
    pub fn set_min_max(&self, min_time_us: f64, max_time_us: f64) {
        let span = self.capture_time_span_us();
        let desired_width = (max_time_us - min_time_us).min(span);
        let mut min = min_time_us.max(0.0);
        if min + desired_width > span {
            min = (span - desired_width).max(0.0);
        }
        let mut window = self.window.lock().unwrap();
        window.min_time_us = min;
        window.max_time_us = min + desired_width;
    }

    /// Frame `[min_tick, max_tick]` with 10% padding around the midpoint.
    pub fn zoom(&self, min_tick: TickType, max_tick: TickType) {
        let capture_min = self.capture_min_timestamp();
        let start = micros_from_ticks(capture_min, min_tick);
        let end = micros_from_ticks(capture_min, max_tick);
        let mid = start + (end - start) / 2.0;
        let extent = 1.1 * (end - start) / 2.0;
        self.set_min_max(mid - extent, mid + extent);
    }

    /// Frame a single timer.
    pub fn zoom_timer(&self, timer: &Timer) {
        self.zoom(timer.start_tick, timer.end_tick);
    }

    /// Pin the window to the trailing history of the capture.
    pub fn zoom_all(&self) {
        if self.update_capture_min_max_timestamps() {
            let max_us = micros_from_ticks(
                self.capture_min_timestamp.load(Ordering::Relaxed),
                self.capture_max_timestamp.load(Ordering::Relaxed),
            );
            let min_us = (max_us - NUM_HISTORY_SECONDS * 1_000_000.0).max(0.0);
            self.set_min_max(min_us, max_us);
        }
    }

    /// Cursor-anchored zoom: the time under `mouse_ratio` stays fixed,
    /// distances to both window edges scale by `1 ± 0.1`. A result
    /// narrower than 1 ns is rejected as a no-op.
    pub fn zoom_time(&self, zoom_value: f64, mouse_ratio: f64) {
        let (min_time_us, max_time_us) = {
            let window = self.window.lock().unwrap();
            (window.min_time_us, window.max_time_us)
        };
        let scale = if zoom_value > 0.0 {
            1.0 + ZOOM_INCREMENT_RATIO
        } else {
            1.0 - ZOOM_INCREMENT_RATIO
        };
        let current_width = max_time_us - min_time_us;
        let ref_time_us = min_time_us + mouse_ratio * current_width;

        let time_left = (ref_time_us - min_time_us).max(0.0);
        let time_right = (max_time_us - ref_time_us).max(0.0);
        let new_min = ref_time_us - scale * time_left;
        let new_max = ref_time_us + scale * time_right;

        if new_max - new_min < MIN_TIME_WINDOW_US {
            return;
        }
        self.set_min_max(new_min, new_max);
    }

    /// Translate the window by a pixel delta at the current ratio,
    /// clamped so the window stays inside the capture span.
    pub fn pan_time(&self, initial_x: i32, current_x: i32, width: i32, initial_time_us: f64) {
        if width <= 0 {
            return;
        }
        let time_window_us = self.current_time_span_us();
        let initial_local_time = f64::from(initial_x) / f64::from(width) * time_window_us;
        let dt = f64::from(current_x - initial_x) / f64::from(width) * time_window_us;
        let current_time = initial_time_us - dt;
        let span = self.capture_time_span_us();
        let min =
            (current_time - initial_local_time).clamp(0.0, (span - time_window_us).max(0.0));
        let mut window = self.window.lock().unwrap();
        window.min_time_us = min;
        window.max_time_us = min + time_window_us;
    }

    /// Time at `ratio` through the current window.
    #[must_use]
    pub fn time_at_ratio(&self, ratio: f64) -> f64 {
        let window = self.window.lock().unwrap();
        window.min_time_us + ratio * (window.max_time_us - window.min_time_us)
    }

    // ── Pixel/time mapping (consumed by the renderer) ───────────────────

    /// Tell the graph what pixel extent the window maps onto.
    pub fn set_world(&self, world_start_x: f64, world_width: f64) {
        let mut window = self.window.lock().unwrap();
        window.world_start_x = world_start_x;
        window.world_width = world_width;
    }

    #[must_use]
    pub fn world_from_tick(&self, tick: TickType) -> f64 {
        let capture_min = self.capture_min_timestamp();
        let window = self.window.lock().unwrap();
        let time_window_us = window.max_time_us - window.min_time_us;
        if time_window_us <= 0.0 {
            return 0.0;
        }
        let start = micros_from_ticks(capture_min, tick) - window.min_time_us;
        window.world_start_x + start / time_window_us * window.world_width
    }

    #[must_use]
    pub fn tick_from_world(&self, world_x: f64) -> TickType {
        let ratio = {
            let window = self.window.lock().unwrap();
            if window.world_width == 0.0 {
                0.0
            } else {
                (world_x - window.world_start_x) / window.world_width
            }
        };
        self.tick_from_us(self.time_at_ratio(ratio))
    }

    #[must_use]
    pub fn tick_from_us(&self, micros: f64) -> TickType {
        self.capture_min_timestamp() + ticks_from_micros(micros)
    }

    /// Whether any part of the timer lies inside the current window.
    #[must_use]
    pub fn is_visible(&self, timer: &Timer) -> bool {
        let capture_min = self.capture_min_timestamp();
        let start = micros_from_ticks(capture_min, timer.start_tick);
        let end = micros_from_ticks(capture_min, timer.end_tick);
        let window = self.window.lock().unwrap();
        !(window.min_time_us > end || window.max_time_us < start)
    }

    /// Shift the window horizontally so `timer` becomes visible, its
    /// midpoint placed at `distance` (in `[0, 1]`) from the near border.
    /// No-op when the timer is already in view.
    pub fn horizontally_move_into_view(&self, timer: &Timer, distance: f64) {
        if self.is_visible(timer) {
            return;
        }
        let capture_min = self.capture_min_timestamp();
        let start = micros_from_ticks(capture_min, timer.start_tick);
        let end = micros_from_ticks(capture_min, timer.end_tick);
        let mid = start + (end - start) / 2.0;

        let (min_time_us, width) = {
            let window = self.window.lock().unwrap();
            (window.min_time_us, window.max_time_us - window.min_time_us)
        };
        // Mirror the final center position if we have to move left.
        let distance = if start < min_time_us { 1.0 - distance } else { distance };
        self.set_min_max(mid - width * (1.0 - distance), mid + width * distance);
    }

    // ── Sorting ─────────────────────────────────────────────────────────

    pub fn set_thread_filter(&self, filter: impl Into<String>) {
        self.sort_state.lock().unwrap().thread_filter = filter.into();
    }

    /// Rebuild the displayed track order. While a capture is running the
    /// reorder happens at most once per second; otherwise always. Order:
    /// scheduler, GPU tracks, process track, then thread tracks by
    /// descending instrumented-timer count, then remaining threads by
    /// descending sample count, ties broken by first-seen order. Empty
    /// tracks are dropped from the view but stay in the registry.
    pub fn sort_tracks(&self) {
        // Make sure a track exists for every sampled thread.
        let event_count = self.event_buffer.event_counts();
        for tid in event_count.keys() {
            self.get_or_create_thread_track(*tid);
        }

        let mut sort_state = self.sort_state.lock().unwrap();
        sort_state.event_count = event_count;

        let capturing = self.capturing.load(Ordering::Relaxed);
        if capturing && sort_state.last_reorder.elapsed() < THREAD_REORDER_PERIOD {
            return;
        }

        let registry = self.registry.lock().unwrap();
        let sorted_tids =
            sorted_thread_ids(&registry, &sort_state.event_count, &sort_state.thread_filter);

        let mut sorted: Vec<Arc<Track>> = Vec::new();
        if let Some(scheduler) = &registry.scheduler {
            if !scheduler.is_empty() {
                sorted.push(Arc::clone(scheduler));
            }
        }
        for track in registry.gpu_tracks.values() {
            sorted.push(Arc::clone(track));
        }
        if let Some(process) = registry.thread_tracks.get(&Tid::ALL) {
            if !process.is_empty() {
                sorted.push(Arc::clone(process));
            }
        }
        for tid in sorted_tids {
            if let Some(track) = registry.thread_tracks.get(&tid) {
                if !track.is_empty() {
                    sorted.push(Arc::clone(track));
                }
            }
        }
        drop(registry);

        debug!("Sorted {} visible tracks", sorted.len());
        sort_state.sorted = sorted;
        sort_state.last_reorder = Instant::now();
    }

    /// Last computed display order.
    #[must_use]
    pub fn sorted_tracks(&self) -> Vec<Arc<Track>> {
        self.sort_state.lock().unwrap().sorted.clone()
    }

    // ── Selection & navigation ──────────────────────────────────────────

    /// Select all callstack events in a screen-space range, optionally
    /// restricted to one thread (`Tid::ALL` selects every thread). The
    /// drag direction must not affect the result, so inverted ranges are
    /// swapped. A sampling summary is generated only for the
    /// whole-process bucket.
    pub fn select_events(
        &self,
        world_start: f64,
        world_end: f64,
        tid: Tid,
        capture_data: &CaptureData,
    ) -> Vec<CallstackEvent> {
        let (world_start, world_end) =
            if world_start > world_end { (world_end, world_start) } else { (world_start, world_end) };

        let t0 = self.tick_from_world(world_start);
        let t1 = self.tick_from_world(world_end);

        let selected = self.event_buffer.callstack_events(t0, t1, tid);

        {
            let mut per_thread = self.selected_events.lock().unwrap();
            per_thread.clear();
            for event in &selected {
                per_thread.entry(event.tid).or_default().push(*event);
                // The all-threads bucket only reflects whole-process
                // selections; a thread-restricted one must not pose as one.
                if tid == Tid::ALL {
                    per_thread.entry(Tid::ALL).or_default().push(*event);
                }
            }
        }

        let mut profiler = SamplingProfiler::new(tid == Tid::ALL);
        for event in &selected {
            if let Some(callstack) = capture_data.callstack(event.callstack_id) {
                profiler.add_callstack(event.tid, callstack);
            }
        }
        let report = profiler.process(capture_data);
        *self.selection_report.lock().unwrap() =
            (report.num_samples() > 0).then_some(report);

        selected
    }

    /// Selected events recorded for `tid` by the last `select_events`.
    #[must_use]
    pub fn selected_callstack_events(&self, tid: Tid) -> Vec<CallstackEvent> {
        self.selected_events.lock().unwrap().get(&tid).cloned().unwrap_or_default()
    }

    /// Sampling report of the last selection, if it had any samples.
    #[must_use]
    pub fn selection_report(&self) -> Option<SamplingReport> {
        self.selection_report.lock().unwrap().clone()
    }

    fn all_thread_track_chain_snapshots(&self) -> Vec<ChainSnapshot> {
        let tracks: Vec<Arc<Track>> = {
            let registry = self.registry.lock().unwrap();
            registry.thread_tracks.values().map(Arc::clone).collect()
        };
        let mut snapshots = Vec::new();
        for track in tracks {
            for chain in track.all_chains() {
                snapshots.push(chain.snapshot());
            }
        }
        snapshots
    }

    /// Latest call of `function_address` ending strictly before
    /// `current_time`, across all thread tracks.
    #[must_use]
    pub fn find_previous_function_call(
        &self,
        function_address: u64,
        current_time: TickType,
    ) -> Option<Timer> {
        let mut best: Option<Timer> = None;
        let mut best_time: TickType = 0;
        for snapshot in self.all_thread_track_chain_snapshots() {
            for block in snapshot.blocks() {
                if !block.intersects(best_time, current_time) {
                    continue;
                }
                for timer in block.timers() {
                    if timer.function_address == function_address
                        && timer.end_tick < current_time
                        && (best.is_none() || best_time < timer.end_tick)
                    {
                        best = Some(*timer);
                        best_time = timer.end_tick;
                    }
                }
            }
        }
        best
    }

    /// Earliest call of `function_address` ending strictly after
    /// `current_time`, across all thread tracks.
    #[must_use]
    pub fn find_next_function_call(
        &self,
        function_address: u64,
        current_time: TickType,
    ) -> Option<Timer> {
        let mut best: Option<Timer> = None;
        let mut best_time: TickType = TickType::MAX;
        for snapshot in self.all_thread_track_chain_snapshots() {
            for block in snapshot.blocks() {
                if !block.intersects(current_time, best_time) {
                    continue;
                }
                for timer in block.timers() {
                    if timer.function_address == function_address
                        && timer.end_tick > current_time
                        && best_time > timer.end_tick
                    {
                        best = Some(*timer);
                        best_time = timer.end_tick;
                    }
                }
            }
        }
        best
    }

    fn track_for_timer(&self, timer: &Timer) -> Arc<Track> {
        if timer.timer_type == TimerType::GpuActivity {
            self.get_or_create_gpu_track(timer.gpu_timeline_hash())
        } else {
            self.get_or_create_thread_track(timer.tid)
        }
    }

    /// Nearest-neighbor navigation from a reference timer. `SameThread`
    /// walks the originating track's own structure; `SameFunction` scans
    /// all thread tracks for the closest call of the same function.
    /// Top/Down always navigate within the originating track.
    #[must_use]
    pub fn jump_to_neighbor(
        &self,
        from: &Timer,
        direction: JumpDirection,
        scope: JumpScope,
    ) -> Option<Timer> {
        match direction {
            JumpDirection::Previous => match scope {
                JumpScope::SameThread => self.track_for_timer(from).left_of(from),
                JumpScope::SameFunction => {
                    self.find_previous_function_call(from.function_address, from.end_tick)
                }
            },
            JumpDirection::Next => match scope {
                JumpScope::SameThread => self.track_for_timer(from).right_of(from),
                JumpScope::SameFunction => {
                    self.find_next_function_call(from.function_address, from.end_tick)
                }
            },
            JumpDirection::Top => self.track_for_timer(from).up_of(from),
            JumpDirection::Down => self.track_for_timer(from).down_of(from),
        }
    }

    /// Jump and bring the result into view.
    pub fn select_neighbor(
        &self,
        from: &Timer,
        direction: JumpDirection,
        scope: JumpScope,
    ) -> Option<Timer> {
        let goal = self.jump_to_neighbor(from, direction, scope)?;
        self.horizontally_move_into_view(&goal, 0.5);
        Some(goal)
    }
}

/// Thread ordering: instrumented-count descending, then event-count
/// descending for threads with no instrumented timers, first-seen order as
/// the tie-break, optional name filter (space-separated tokens, OR).
fn sorted_thread_ids(
    registry: &TrackRegistry,
    event_count: &HashMap<Tid, usize>,
    thread_filter: &str,
) -> Vec<Tid> {
    let first_seen_rank: HashMap<Tid, usize> =
        registry.first_seen.iter().enumerate().map(|(i, tid)| (*tid, i)).collect();
    let rank = |tid: &Tid| first_seen_rank.get(tid).copied().unwrap_or(usize::MAX);

    // Threads with instrumented functions come first.
    let mut with_timers: Vec<(Tid, u64)> = registry
        .thread_count
        .iter()
        .filter(|(tid, _)| **tid != Tid::ALL)
        .map(|(tid, count)| (*tid, *count))
        .collect();
    with_timers.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| rank(&a.0).cmp(&rank(&b.0))));

    let mut sorted_tids: Vec<Tid> = with_timers.into_iter().map(|(tid, _)| tid).collect();

    // Then threads sorted by number of sampled events.
    let mut by_events: Vec<(Tid, usize)> = event_count
        .iter()
        .filter(|(tid, _)| **tid != Tid::ALL && !registry.thread_count.contains_key(tid))
        .map(|(tid, count)| (*tid, *count))
        .collect();
    by_events.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| rank(&a.0).cmp(&rank(&b.0))));
    sorted_tids.extend(by_events.into_iter().map(|(tid, _)| tid));

    // Any remaining thread with timers but neither instrumented calls nor
    // samples keeps its first-seen position at the end.
    for tid in &registry.first_seen {
        if *tid != Tid::ALL && !sorted_tids.contains(tid) {
            sorted_tids.push(*tid);
        }
    }

    if thread_filter.is_empty() {
        return sorted_tids;
    }
    let filters: Vec<&str> = thread_filter.split(' ').filter(|f| !f.is_empty()).collect();
    sorted_tids
        .into_iter()
        .filter(|tid| {
            registry.thread_tracks.get(tid).is_some_and(|track| {
                let name = track.name();
                filters.iter().any(|f| name.contains(f))
            })
        })
        .collect()
}
