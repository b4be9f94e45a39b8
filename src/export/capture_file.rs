//! Capture file writer
//!
//! Serializes a completed session to a single JSON document: process
//! identity, the string table, thread names, per-function statistics and
//! every ingested timer in start-tick order. The write is whole-or-
//! nothing: the document goes to a temporary file in the target directory
//! first and is renamed over the destination only after a successful
//! flush, so a crash mid-write never leaves a truncated capture behind.

use crate::capture::listener::CaptureSession;
use crate::domain::{ExportError, Tid};
use crate::timeline::Timer;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// On-disk capture document.
#[derive(Debug, Serialize, Deserialize)]
pub struct CaptureFile {
    pub process_name: String,
    pub process_id: i32,
    /// Timeline-name keys resolved during the capture.
    pub string_table: BTreeMap<u64, String>,
    pub thread_names: BTreeMap<i32, String>,
    pub function_stats: Vec<FunctionStatsRecord>,
    /// All timers across all tracks, ordered by start tick.
    pub timers: Vec<Timer>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FunctionStatsRecord {
    pub address: u64,
    pub name: String,
    pub count: u64,
    pub total_time_ticks: u64,
    pub min_ticks: u64,
    pub max_ticks: u64,
    pub average_ticks: u64,
}

impl CaptureFile {
    /// Snapshot the session into a serializable document.
    #[must_use]
    pub fn from_session(session: &CaptureSession) -> Self {
        let capture_data = session.capture_data().lock().unwrap();

        let mut function_stats: Vec<FunctionStatsRecord> = capture_data
            .all_function_stats()
            .iter()
            .map(|(address, stats)| FunctionStatsRecord {
                address: *address,
                name: capture_data
                    .find_function_by_address(*address)
                    .map_or_else(String::new, |f| f.pretty_name.clone()),
                count: stats.count,
                total_time_ticks: stats.total_time_ticks,
                min_ticks: stats.min_ticks,
                max_ticks: stats.max_ticks,
                average_ticks: stats.average_ticks(),
            })
            .collect();
        function_stats.sort_by_key(|record| record.address);

        let mut timers: Vec<Timer> = session
            .time_graph()
            .all_tracks()
            .iter()
            .flat_map(|track| {
                track.all_chains().into_iter().flat_map(|chain| {
                    chain.snapshot().iter_timers().copied().collect::<Vec<_>>()
                })
            })
            .collect();
        timers.sort_by_key(|timer| (timer.start_tick, timer.end_tick, timer.tid));

        let thread_names: BTreeMap<i32, String> = capture_data
            .thread_names()
            .iter()
            .map(|(tid, name)| (tid.0, name.clone()))
            .collect();

        Self {
            process_name: capture_data.process_name().to_string(),
            process_id: capture_data.process_id().0,
            string_table: session.strings().key_to_string_map().into_iter().collect(),
            thread_names,
            function_stats,
            timers,
        }
    }

    #[must_use]
    pub fn thread_name(&self, tid: Tid) -> Option<&str> {
        self.thread_names.get(&tid.0).map(String::as_str)
    }
}

/// Write the capture document to `path` atomically.
pub fn save_capture(session: &CaptureSession, path: &Path) -> Result<(), ExportError> {
    let document = CaptureFile::from_session(session);

    let mut tmp_path: PathBuf = path.to_path_buf();
    let mut tmp_name = path
        .file_name()
        .map_or_else(|| "capture".to_string(), |n| n.to_string_lossy().into_owned());
    tmp_name.push_str(".tmp");
    tmp_path.set_file_name(tmp_name);

    let result = (|| -> Result<(), ExportError> {
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &document)?;
        writer.flush()?;
        Ok(())
    })();
    if let Err(err) = result {
        std::fs::remove_file(&tmp_path).ok();
        return Err(err);
    }
    std::fs::rename(&tmp_path, path)?;

    info!(
        "Saved capture for {} ({} timers, {} functions) to {}",
        document.process_name,
        document.timers.len(),
        document.function_stats.len(),
        path.display()
    );
    Ok(())
}

/// Default capture file name: process name plus capture epoch seconds.
#[must_use]
pub fn default_capture_file_name(process_name: &str) -> String {
    let seconds =
        SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |elapsed| elapsed.as_secs());
    format!("tracelens_{process_name}_{seconds}.json")
}
