//! Capture client: control worker and ingestion thread
//!
//! The client sits between the consumer side and the remote capture
//! service. Start/stop requests go through a single control worker so the
//! synchronous round trip never blocks the caller's thread; the event
//! stream is drained by a dedicated ingestion thread that folds every
//! event into the session. Failure and cancellation are terminal: the
//! client never retries, that decision belongs to the orchestration layer.

use super::data::{FunctionInfo, ModuleData, ProcessData, TracepointInfo};
use super::listener::{CaptureEvent, CaptureSession};
use crate::domain::{CaptureError, SessionError};
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Snapshot handed to the remote side when a capture starts; the same
/// data seeds the fresh `CaptureData`.
#[derive(Debug, Clone)]
pub struct StartCaptureRequest {
    pub process: ProcessData,
    pub module_map: HashMap<String, ModuleData>,
    pub selected_functions: HashMap<u64, FunctionInfo>,
    pub selected_tracepoints: HashMap<u64, TracepointInfo>,
}

/// Wire transport to the remote capture service. `start_capture` returns
/// the channel the service streams events on; `stop_capture` blocks until
/// the remote side confirms the capture has ended.
pub trait CaptureTransport: Send + 'static {
    fn start_capture(
        &mut self,
        request: &StartCaptureRequest,
    ) -> Result<Receiver<CaptureEvent>, String>;

    fn stop_capture(&mut self) -> Result<(), String>;
}

enum ControlRequest {
    Start(Box<StartCaptureRequest>, Sender<Result<(), String>>),
    Stop(Sender<Result<(), String>>),
}

/// Client-side driver for one capture session.
pub struct CaptureClient {
    session: Arc<CaptureSession>,
    control_tx: Option<Sender<ControlRequest>>,
    worker: Option<JoinHandle<()>>,
}

impl CaptureClient {
    /// Spawn the control worker owning the transport.
    pub fn new(transport: impl CaptureTransport, session: Arc<CaptureSession>) -> Self {
        let (control_tx, control_rx) = bounded::<ControlRequest>(2);
        let worker_session = Arc::clone(&session);
        let worker = std::thread::spawn(move || {
            control_worker(transport, &worker_session, &control_rx);
        });
        Self { session, control_tx: Some(control_tx), worker: Some(worker) }
    }

    #[must_use]
    pub fn session(&self) -> &Arc<CaptureSession> {
        &self.session
    }

    /// Request capture start. The session transitions to `Started`
    /// immediately from the local snapshot; the network round trip and
    /// stream attachment happen on the control worker. A start failure
    /// means no session was established.
    pub fn start_capture(&self, request: StartCaptureRequest) -> Result<(), SessionError> {
        self.session
            .apply(CaptureEvent::CaptureStarted {
                process: request.process.clone(),
                module_map: request.module_map.clone(),
                selected_functions: request.selected_functions.clone(),
                selected_tracepoints: request.selected_tracepoints.clone(),
            })
            .map_err(|e| SessionError::StartRejected(e.to_string()))?;

        let (reply_tx, reply_rx) = bounded(1);
        self.control_tx
            .as_ref()
            .ok_or_else(|| SessionError::ControlChannel("client shut down".to_string()))?
            .send(ControlRequest::Start(Box::new(request), reply_tx))
            .map_err(|e| SessionError::ControlChannel(e.to_string()))?;
        reply_rx
            .recv()
            .map_err(|e| SessionError::ControlChannel(e.to_string()))?
            .map_err(SessionError::StartRejected)
    }

    /// Request capture stop and block until the remote side confirms.
    pub fn stop_capture(&self) -> Result<(), SessionError> {
        let (reply_tx, reply_rx) = bounded(1);
        self.control_tx
            .as_ref()
            .ok_or_else(|| SessionError::ControlChannel("client shut down".to_string()))?
            .send(ControlRequest::Stop(reply_tx))
            .map_err(|e| SessionError::ControlChannel(e.to_string()))?;
        reply_rx
            .recv()
            .map_err(|e| SessionError::ControlChannel(e.to_string()))?
            .map_err(SessionError::StopRejected)
    }
}

impl Drop for CaptureClient {
    fn drop(&mut self) {
        // Closing the control channel lets the worker drain and exit.
        self.control_tx.take();
        if let Some(worker) = self.worker.take() {
            worker.join().ok();
        }
    }
}

fn control_worker(
    mut transport: impl CaptureTransport,
    session: &Arc<CaptureSession>,
    control_rx: &Receiver<ControlRequest>,
) {
    let mut ingestion: Option<JoinHandle<()>> = None;

    for request in control_rx {
        match request {
            ControlRequest::Start(start, reply) => {
                match transport.start_capture(&start) {
                    Ok(events) => {
                        let ingest_session = Arc::clone(session);
                        ingestion = Some(std::thread::spawn(move || {
                            ingestion_loop(&ingest_session, &events);
                        }));
                        reply.send(Ok(())).ok();
                    }
                    Err(reason) => {
                        // No stream was established; mark the session.
                        session
                            .apply(CaptureEvent::CaptureFailed { reason: reason.clone() })
                            .ok();
                        reply.send(Err(reason)).ok();
                    }
                }
            }
            ControlRequest::Stop(reply) => {
                let result = transport.stop_capture();
                // The remote confirmed (or refused); either way the
                // stream ends and the ingestion thread drains out.
                if let Some(handle) = ingestion.take() {
                    handle.join().ok();
                }
                reply.send(result).ok();
            }
        }
    }

    if let Some(handle) = ingestion.take() {
        handle.join().ok();
    }
}

/// Drain the event stream into the session until the channel closes or
/// the session reaches a terminal state.
fn ingestion_loop(session: &Arc<CaptureSession>, events: &Receiver<CaptureEvent>) {
    let mut applied: u64 = 0;
    for event in events {
        match session.apply(event) {
            Ok(()) => applied += 1,
            Err(CaptureError::Failed(reason)) => {
                error!("Remote capture failure after {applied} events: {reason}");
                break;
            }
            Err(err) => {
                error!("Aborting ingestion after {applied} events: {err}");
                break;
            }
        }
        if session.state().is_terminal() {
            break;
        }
    }
    if session.state().is_terminal() {
        info!("Ingestion finished after {applied} events");
    } else {
        warn!("Event stream closed without a terminal event ({applied} events applied)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::listener::ListenerState;
    use crate::domain::{Pid, Tid};
    use crate::timeline::{Timer, TimerType};
    use std::time::Duration;

    struct ScriptedTransport {
        events: Vec<CaptureEvent>,
        started: bool,
    }

    impl CaptureTransport for ScriptedTransport {
        fn start_capture(
            &mut self,
            _request: &StartCaptureRequest,
        ) -> Result<Receiver<CaptureEvent>, String> {
            self.started = true;
            let (tx, rx) = bounded(self.events.len().max(1));
            for event in self.events.drain(..) {
                tx.send(event).map_err(|e| e.to_string())?;
            }
            Ok(rx)
        }

        fn stop_capture(&mut self) -> Result<(), String> {
            if self.started {
                Ok(())
            } else {
                Err("no capture in progress".to_string())
            }
        }
    }

    struct RefusingTransport;

    impl CaptureTransport for RefusingTransport {
        fn start_capture(
            &mut self,
            _request: &StartCaptureRequest,
        ) -> Result<Receiver<CaptureEvent>, String> {
            Err("service unavailable".to_string())
        }

        fn stop_capture(&mut self) -> Result<(), String> {
            Err("no capture in progress".to_string())
        }
    }

    fn request() -> StartCaptureRequest {
        let mut selected = HashMap::new();
        selected.insert(
            0xa,
            FunctionInfo {
                pretty_name: "Render".to_string(),
                module_path: "/opt/game".to_string(),
                address: 0xa,
                size: 64,
            },
        );
        StartCaptureRequest {
            process: ProcessData {
                pid: Pid(42),
                name: "game".to_string(),
                full_path: "/opt/game".to_string(),
                is_64_bit: true,
                functions: Vec::new(),
            },
            module_map: HashMap::new(),
            selected_functions: selected,
            selected_tracepoints: HashMap::new(),
        }
    }

    fn timer_event(start: u64, end: u64) -> CaptureEvent {
        CaptureEvent::Timer(Timer {
            start_tick: start,
            end_tick: end,
            tid: Tid(1),
            processor: 0,
            depth: 0,
            function_address: 0xa,
            timer_type: TimerType::Other,
            user_data: [0, 0],
        })
    }

    #[test]
    fn test_full_capture_flow() {
        let transport = ScriptedTransport {
            events: vec![timer_event(100, 150), timer_event(200, 260), CaptureEvent::CaptureComplete],
            started: false,
        };
        let session = Arc::new(CaptureSession::new());
        let client = CaptureClient::new(transport, Arc::clone(&session));

        client.start_capture(request()).unwrap();
        client.stop_capture().unwrap();

        assert_eq!(session.state(), ListenerState::Completed);
        let capture_data = session.capture_data().lock().unwrap();
        assert_eq!(capture_data.function_stats(0xa).unwrap().count, 2);
        assert_eq!(session.time_graph().num_timers(), 2);
    }

    #[test]
    fn test_start_failure_means_no_session() {
        let session = Arc::new(CaptureSession::new());
        let client = CaptureClient::new(RefusingTransport, Arc::clone(&session));
        let err = client.start_capture(request()).unwrap_err();
        assert!(matches!(err, SessionError::StartRejected(_)));
        assert_eq!(session.state(), ListenerState::Failed);
    }

    #[test]
    fn test_stream_end_without_terminal_event() {
        let transport = ScriptedTransport { events: vec![timer_event(1, 2)], started: false };
        let session = Arc::new(CaptureSession::new());
        let client = CaptureClient::new(transport, Arc::clone(&session));
        client.start_capture(request()).unwrap();
        // Channel closes after the single event; ingestion drains out.
        std::thread::sleep(Duration::from_millis(50));
        client.stop_capture().unwrap();
        assert_eq!(session.state(), ListenerState::Receiving);
        assert_eq!(session.time_graph().num_timers(), 1);
    }
}
