//! Recorded event stream replay
//!
//! A recorded stream is a JSON-lines file of `CaptureEvent` values, one
//! per line. `ReplayTransport` feeds such a recording through the regular
//! client path, so replayed captures exercise the same state machine and
//! indexing as live ones.

use super::client::{CaptureTransport, StartCaptureRequest};
use super::listener::CaptureEvent;
use anyhow::{bail, Context, Result};
use crossbeam_channel::{bounded, Receiver};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Backpressure depth of the replayed stream.
const STREAM_DEPTH: usize = 256;

/// Parse a recorded stream file. The first event must be
/// `CaptureStarted`; it is returned separately as the start request, with
/// the remaining events in recorded order.
pub fn read_event_stream(path: &Path) -> Result<(StartCaptureRequest, Vec<CaptureEvent>)> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open recorded stream {}", path.display()))?;
    let mut events = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event: CaptureEvent = serde_json::from_str(&line)
            .with_context(|| format!("Malformed event on line {}", index + 1))?;
        events.push(event);
    }

    if events.is_empty() {
        bail!("Recorded stream {} contains no events", path.display());
    }
    match events.remove(0) {
        CaptureEvent::CaptureStarted {
            process,
            module_map,
            selected_functions,
            selected_tracepoints,
        } => Ok((
            StartCaptureRequest { process, module_map, selected_functions, selected_tracepoints },
            events,
        )),
        other => bail!("Recorded stream must begin with CaptureStarted, found {}", other.name()),
    }
}

/// Streams a recorded event list as if it came from a remote service. A
/// recording without a terminal event gets `CaptureComplete` appended so
/// replayed sessions always finish.
pub struct ReplayTransport {
    events: Vec<CaptureEvent>,
    stop: Arc<AtomicBool>,
    done_rx: Option<Receiver<()>>,
}

impl ReplayTransport {
    #[must_use]
    pub fn new(events: Vec<CaptureEvent>) -> Self {
        Self { events, stop: Arc::new(AtomicBool::new(false)), done_rx: None }
    }
}

impl CaptureTransport for ReplayTransport {
    fn start_capture(
        &mut self,
        _request: &StartCaptureRequest,
    ) -> Result<Receiver<CaptureEvent>, String> {
        if self.done_rx.is_some() {
            return Err("replay already in progress".to_string());
        }
        let events = std::mem::take(&mut self.events);
        let stop = Arc::clone(&self.stop);
        let (tx, rx) = bounded(STREAM_DEPTH);
        let (done_tx, done_rx) = bounded(1);
        self.done_rx = Some(done_rx);

        std::thread::spawn(move || {
            let mut sent_terminal = false;
            for event in events {
                if stop.load(Ordering::Relaxed) {
                    break;
                }
                let terminal = matches!(
                    event,
                    CaptureEvent::CaptureComplete
                        | CaptureEvent::CaptureCancelled
                        | CaptureEvent::CaptureFailed { .. }
                );
                if tx.send(event).is_err() {
                    return;
                }
                if terminal {
                    sent_terminal = true;
                    break;
                }
            }
            if !sent_terminal {
                tx.send(CaptureEvent::CaptureComplete).ok();
            }
            done_tx.send(()).ok();
        });
        Ok(rx)
    }

    fn stop_capture(&mut self) -> Result<(), String> {
        self.stop.store(true, Ordering::Relaxed);
        match self.done_rx.take() {
            Some(done) => {
                // Sender closes its end when the stream is flushed out.
                done.recv().ok();
                Ok(())
            }
            None => Err("no replay in progress".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::data::ProcessData;
    use crate::capture::listener::{CaptureSession, ListenerState};
    use crate::capture::CaptureClient;
    use crate::domain::{Pid, Tid};
    use crate::timeline::{Timer, TimerType};
    use std::collections::HashMap;
    use std::io::Write;

    fn started_event() -> CaptureEvent {
        CaptureEvent::CaptureStarted {
            process: ProcessData {
                pid: Pid(42),
                name: "game".to_string(),
                full_path: "/opt/game".to_string(),
                is_64_bit: true,
                functions: Vec::new(),
            },
            module_map: HashMap::new(),
            selected_functions: HashMap::new(),
            selected_tracepoints: HashMap::new(),
        }
    }

    fn timer_event() -> CaptureEvent {
        CaptureEvent::Timer(Timer {
            start_tick: 100,
            end_tick: 200,
            tid: Tid(1),
            processor: 0,
            depth: 0,
            function_address: 0,
            timer_type: TimerType::Other,
            user_data: [0, 0],
        })
    }

    fn write_stream(events: &[CaptureEvent]) -> Result<tempfile::NamedTempFile> {
        let mut file = tempfile::NamedTempFile::new()?;
        for event in events {
            writeln!(file, "{}", serde_json::to_string(event)?)?;
        }
        Ok(file)
    }

    #[test]
    fn test_read_event_stream_splits_start() -> Result<()> {
        let file = write_stream(&[started_event(), timer_event()])?;
        let (request, events) = read_event_stream(file.path())?;
        assert_eq!(request.process.pid, Pid(42));
        assert_eq!(events.len(), 1);
        Ok(())
    }

    #[test]
    fn test_stream_must_begin_with_start() -> Result<()> {
        let file = write_stream(&[timer_event()])?;
        assert!(read_event_stream(file.path()).is_err());
        Ok(())
    }

    #[test]
    fn test_replay_completes_session() -> Result<()> {
        let file = write_stream(&[started_event(), timer_event()])?;
        let (request, events) = read_event_stream(file.path())?;
        let session = Arc::new(CaptureSession::new());
        let client = CaptureClient::new(ReplayTransport::new(events), Arc::clone(&session));
        client.start_capture(request).map_err(anyhow::Error::from)?;
        client.stop_capture().map_err(anyhow::Error::from)?;
        // The transport appends the terminal event the recording lacked.
        assert_eq!(session.state(), ListenerState::Completed);
        assert_eq!(session.time_graph().num_timers(), 1);
        Ok(())
    }
}
