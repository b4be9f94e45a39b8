//! Ingestion protocol: the capture listener contract
//!
//! The remote capture service delivers an ordered stream of typed events.
//! Instead of a callback base class, the contract is a `CaptureEvent`
//! tagged union folded by `CaptureSession::apply`, which also enforces the
//! `Idle → Started → Receiving → terminal` state machine. All mutation of
//! session state funnels through `apply`, so each underlying structure
//! needs only its own lock and the ingestion thread never blocks on
//! query-side work.

use super::data::{
    AddressInfo, CaptureData, FunctionInfo, ModuleData, ProcessData, TracepointEvent,
    TracepointInfo,
};
use crate::domain::{CallstackId, CaptureError, Pid, TickType, Tid};
use crate::events::{Callstack, CallstackEvent, EventBuffer};
use crate::sampling::{SamplingProfiler, SamplingReport};
use crate::strings::StringManager;
use crate::timeline::{TimeGraph, Timer};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// One message of the ingestion stream. Self-contained payloads; delivery
/// is ordered and at-most-once per unique id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CaptureEvent {
    CaptureStarted {
        process: ProcessData,
        module_map: HashMap<String, ModuleData>,
        selected_functions: HashMap<u64, FunctionInfo>,
        selected_tracepoints: HashMap<u64, TracepointInfo>,
    },
    Timer(Timer),
    KeyAndString {
        key: u64,
        string: String,
    },
    UniqueCallstack {
        id: CallstackId,
        callstack: Callstack,
    },
    CallstackEvent(CallstackEvent),
    ThreadName {
        tid: Tid,
        name: String,
    },
    AddressInfo(AddressInfo),
    UniqueTracepointInfo {
        key: u64,
        info: TracepointInfo,
    },
    TracepointEvent {
        time_tick: TickType,
        tracepoint_key: u64,
        pid: Pid,
        tid: Tid,
        processor: i32,
    },
    CaptureComplete,
    CaptureCancelled,
    CaptureFailed {
        reason: String,
    },
}

impl CaptureEvent {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            CaptureEvent::CaptureStarted { .. } => "CaptureStarted",
            CaptureEvent::Timer(_) => "Timer",
            CaptureEvent::KeyAndString { .. } => "KeyAndString",
            CaptureEvent::UniqueCallstack { .. } => "UniqueCallstack",
            CaptureEvent::CallstackEvent(_) => "CallstackEvent",
            CaptureEvent::ThreadName { .. } => "ThreadName",
            CaptureEvent::AddressInfo(_) => "AddressInfo",
            CaptureEvent::UniqueTracepointInfo { .. } => "UniqueTracepointInfo",
            CaptureEvent::TracepointEvent { .. } => "TracepointEvent",
            CaptureEvent::CaptureComplete => "CaptureComplete",
            CaptureEvent::CaptureCancelled => "CaptureCancelled",
            CaptureEvent::CaptureFailed { .. } => "CaptureFailed",
        }
    }
}

/// Listener state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Idle,
    Started,
    Receiving,
    Completed,
    Cancelled,
    Failed,
}

impl ListenerState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, ListenerState::Completed | ListenerState::Cancelled | ListenerState::Failed)
    }
}

/// Everything one capture session owns. Replaces the process-wide mutable
/// singletons of older profilers: constructed per session and handed by
/// reference to whichever component needs it.
pub struct CaptureSession {
    strings: Arc<StringManager>,
    event_buffer: Arc<EventBuffer>,
    time_graph: Arc<TimeGraph>,
    capture_data: Arc<Mutex<CaptureData>>,
    state: Mutex<ListenerState>,
    /// Built over all collected callstacks when the capture completes.
    sampling_report: Mutex<Option<SamplingReport>>,
}

impl CaptureSession {
    #[must_use]
    pub fn new() -> Self {
        let strings = Arc::new(StringManager::new());
        let event_buffer = Arc::new(EventBuffer::new());
        let time_graph = Arc::new(TimeGraph::new(Arc::clone(&strings), Arc::clone(&event_buffer)));
        Self {
            strings,
            event_buffer,
            time_graph,
            capture_data: Arc::new(Mutex::new(CaptureData::default())),
            state: Mutex::new(ListenerState::Idle),
            sampling_report: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn strings(&self) -> &Arc<StringManager> {
        &self.strings
    }

    #[must_use]
    pub fn event_buffer(&self) -> &Arc<EventBuffer> {
        &self.event_buffer
    }

    #[must_use]
    pub fn time_graph(&self) -> &Arc<TimeGraph> {
        &self.time_graph
    }

    #[must_use]
    pub fn capture_data(&self) -> &Arc<Mutex<CaptureData>> {
        &self.capture_data
    }

    #[must_use]
    pub fn state(&self) -> ListenerState {
        *self.state.lock().unwrap()
    }

    /// Per-capture sampling summary, available after `CaptureComplete`.
    #[must_use]
    pub fn sampling_report(&self) -> Option<SamplingReport> {
        self.sampling_report.lock().unwrap().clone()
    }

    /// Fold one stream event into the session. Errors are protocol
    /// violations; `UnknownTimerFunction` additionally moves the session
    /// to `Failed` since continuing would corrupt statistics.
    pub fn apply(&self, event: CaptureEvent) -> Result<(), CaptureError> {
        {
            let state = self.state.lock().unwrap();
            if state.is_terminal() {
                return Err(CaptureError::Terminated(event.name()));
            }
            match (&event, *state) {
                (CaptureEvent::CaptureStarted { .. }, ListenerState::Idle) => {}
                (CaptureEvent::CaptureStarted { .. }, _) => {
                    return Err(CaptureError::AlreadyStarted);
                }
                (_, ListenerState::Idle) => {
                    return Err(CaptureError::NotStarted(event.name()));
                }
                _ => {}
            }
        }

        match event {
            CaptureEvent::CaptureStarted {
                process,
                module_map,
                selected_functions,
                selected_tracepoints,
            } => {
                self.time_graph.clear();
                self.time_graph.set_capturing(true);
                *self.capture_data.lock().unwrap() =
                    CaptureData::new(process, module_map, selected_functions, selected_tracepoints);
                *self.sampling_report.lock().unwrap() = None;
                *self.state.lock().unwrap() = ListenerState::Started;
                info!("Capture started");
            }
            CaptureEvent::Timer(timer) => {
                self.mark_receiving();
                self.on_timer(&timer)?;
            }
            CaptureEvent::KeyAndString { key, string } => {
                self.mark_receiving();
                self.strings.add_if_not_present(key, string);
            }
            CaptureEvent::UniqueCallstack { id, callstack } => {
                self.mark_receiving();
                self.capture_data.lock().unwrap().add_unique_callstack(id, callstack);
            }
            CaptureEvent::CallstackEvent(callstack_event) => {
                self.mark_receiving();
                self.event_buffer.add_event(callstack_event);
            }
            CaptureEvent::ThreadName { tid, name } => {
                self.mark_receiving();
                self.capture_data.lock().unwrap().add_or_assign_thread_name(tid, name.clone());
                self.time_graph.get_or_create_thread_track(tid).set_name(name);
            }
            CaptureEvent::AddressInfo(info) => {
                self.mark_receiving();
                self.capture_data.lock().unwrap().insert_address_info(info);
            }
            CaptureEvent::UniqueTracepointInfo { key, info } => {
                self.mark_receiving();
                self.capture_data.lock().unwrap().add_unique_tracepoint_info(key, info);
            }
            CaptureEvent::TracepointEvent { time_tick, tracepoint_key, pid, tid, processor } => {
                self.mark_receiving();
                let mut capture_data = self.capture_data.lock().unwrap();
                let is_same_pid_as_target = capture_data.process_id() == pid;
                capture_data.add_tracepoint_event(TracepointEvent {
                    time_tick,
                    tracepoint_key,
                    pid,
                    tid,
                    processor,
                    is_same_pid_as_target,
                });
            }
            CaptureEvent::CaptureComplete => {
                self.on_capture_complete();
            }
            CaptureEvent::CaptureCancelled => {
                *self.state.lock().unwrap() = ListenerState::Cancelled;
                self.time_graph.set_capturing(false);
                warn!("Capture cancelled");
            }
            CaptureEvent::CaptureFailed { reason } => {
                *self.state.lock().unwrap() = ListenerState::Failed;
                self.time_graph.set_capturing(false);
                error!("Capture failed: {reason}");
                return Err(CaptureError::Failed(reason));
            }
        }
        Ok(())
    }

    fn mark_receiving(&self) {
        let mut state = self.state.lock().unwrap();
        if *state == ListenerState::Started {
            *state = ListenerState::Receiving;
        }
    }

    fn on_timer(&self, timer: &Timer) -> Result<(), CaptureError> {
        // An inverted interval would wrap elapsed_ticks and poison the
        // accumulated statistics.
        if timer.end_tick < timer.start_tick {
            *self.state.lock().unwrap() = ListenerState::Failed;
            self.time_graph.set_capturing(false);
            return Err(CaptureError::InvertedTimer {
                start_tick: timer.start_tick,
                end_tick: timer.end_tick,
            });
        }
        if timer.function_address > 0 {
            let mut capture_data = self.capture_data.lock().unwrap();
            // For timers the function must be known: only explicitly
            // hooked addresses may appear, unlike unrestricted samples.
            if capture_data.find_function_by_address(timer.function_address).is_none() {
                drop(capture_data);
                *self.state.lock().unwrap() = ListenerState::Failed;
                self.time_graph.set_capturing(false);
                return Err(CaptureError::UnknownTimerFunction(timer.function_address));
            }
            capture_data.update_function_stats(timer.function_address, timer.elapsed_ticks());
        }
        self.time_graph.process_timer(timer);
        Ok(())
    }

    fn on_capture_complete(&self) {
        *self.state.lock().unwrap() = ListenerState::Completed;
        self.time_graph.set_capturing(false);

        // Snapshot pass over everything collected so far.
        let capture_data = self.capture_data.lock().unwrap();
        let mut profiler = SamplingProfiler::new(true);
        let events = self.event_buffer.callstack_events(0, TickType::MAX, Tid::ALL);
        for event in &events {
            if let Some(callstack) = capture_data.callstack(event.callstack_id) {
                profiler.add_callstack(event.tid, callstack);
            }
        }
        let report = profiler.process(&capture_data);
        info!("Capture completed: {} samples over {} threads", report.num_samples(),
            report.threads.len());
        *self.sampling_report.lock().unwrap() = Some(report);
    }
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new()
    }
}
