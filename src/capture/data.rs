//! Session capture data
//!
//! `CaptureData` is the landing zone for everything the ingestion
//! protocol delivers: process metadata, the hooked-function selection,
//! per-function timing statistics, deduplicated callstacks, tracepoints,
//! thread names and sampled-address symbol info. It is replaced wholesale
//! when a new capture starts and outlives the stream that filled it.

use crate::domain::{CallstackId, Pid, TickType, Tid};
use crate::events::Callstack;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// One module mapped into the target process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleData {
    pub name: String,
    pub file_path: String,
    pub file_size: u64,
    pub address_start: u64,
    pub address_end: u64,
    pub build_id: String,
}

/// Target process description plus its resolved function symbols.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessData {
    pub pid: Pid,
    pub name: String,
    pub full_path: String,
    pub is_64_bit: bool,
    /// Symbols of the main module, filled by the resolver at session init.
    pub functions: Vec<FunctionInfo>,
}

/// A function explicitly chosen for instrumentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub pretty_name: String,
    pub module_path: String,
    /// Absolute address in the target process.
    pub address: u64,
    pub size: u64,
}

/// Incrementally updated elapsed-time statistics for one hooked function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionStats {
    pub count: u64,
    pub total_time_ticks: u64,
    pub min_ticks: u64,
    pub max_ticks: u64,
}

impl FunctionStats {
    fn record(&mut self, elapsed_ticks: TickType) {
        if self.count == 0 {
            self.min_ticks = elapsed_ticks;
        } else {
            self.min_ticks = self.min_ticks.min(elapsed_ticks);
        }
        self.max_ticks = self.max_ticks.max(elapsed_ticks);
        self.count += 1;
        self.total_time_ticks += elapsed_ticks;
    }

    #[must_use]
    pub fn average_ticks(&self) -> u64 {
        if self.count == 0 {
            0
        } else {
            self.total_time_ticks / self.count
        }
    }
}

/// Symbol info for a sampled address, as resolved on the remote side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInfo {
    pub absolute_address: u64,
    pub function_name: String,
    pub offset_in_function: u64,
    pub module_path: String,
}

/// Static description of one tracepoint (category + name).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracepointInfo {
    pub category: String,
    pub name: String,
}

/// One tracepoint hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracepointEvent {
    pub time_tick: TickType,
    pub tracepoint_key: u64,
    pub pid: Pid,
    pub tid: Tid,
    pub processor: i32,
    /// Whether the hit came from the capture's target process; used
    /// downstream to filter foreign-process tracepoints.
    pub is_same_pid_as_target: bool,
}

/// Placeholder for sampled addresses with no symbol information. Sampling
/// is unrestricted, so unknown addresses are expected there; timers are
/// held to the stricter contract in the listener.
pub const UNRESOLVED_FUNCTION_NAME: &str = "[unknown]";

/// Aggregate of everything one capture session collects.
#[derive(Debug, Default)]
pub struct CaptureData {
    process: ProcessData,
    module_map: HashMap<String, ModuleData>,
    selected_functions: HashMap<u64, FunctionInfo>,
    function_stats: HashMap<u64, FunctionStats>,
    callstacks: HashMap<CallstackId, Arc<Callstack>>,
    tracepoint_infos: HashMap<u64, TracepointInfo>,
    tracepoint_events: Vec<TracepointEvent>,
    thread_names: HashMap<Tid, String>,
    address_infos: HashMap<u64, AddressInfo>,
}

impl CaptureData {
    #[must_use]
    pub fn new(
        process: ProcessData,
        module_map: HashMap<String, ModuleData>,
        selected_functions: HashMap<u64, FunctionInfo>,
        selected_tracepoints: HashMap<u64, TracepointInfo>,
    ) -> Self {
        Self {
            process,
            module_map,
            selected_functions,
            tracepoint_infos: selected_tracepoints,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn process_id(&self) -> Pid {
        self.process.pid
    }

    #[must_use]
    pub fn process_name(&self) -> &str {
        &self.process.name
    }

    #[must_use]
    pub fn process(&self) -> &ProcessData {
        &self.process
    }

    #[must_use]
    pub fn module_map(&self) -> &HashMap<String, ModuleData> {
        &self.module_map
    }

    #[must_use]
    pub fn selected_functions(&self) -> &HashMap<u64, FunctionInfo> {
        &self.selected_functions
    }

    #[must_use]
    pub fn find_function_by_address(&self, address: u64) -> Option<&FunctionInfo> {
        self.selected_functions.get(&address)
    }

    /// Fold one completed timer into the function's elapsed-time stats.
    pub fn update_function_stats(&mut self, address: u64, elapsed_ticks: TickType) {
        self.function_stats.entry(address).or_default().record(elapsed_ticks);
    }

    #[must_use]
    pub fn function_stats(&self, address: u64) -> Option<&FunctionStats> {
        self.function_stats.get(&address)
    }

    #[must_use]
    pub fn all_function_stats(&self) -> &HashMap<u64, FunctionStats> {
        &self.function_stats
    }

    /// Dedup-table insert; the id was assigned by the remote side and a
    /// repeat insert keeps the first stack.
    pub fn add_unique_callstack(&mut self, id: CallstackId, callstack: Callstack) {
        self.callstacks.entry(id).or_insert_with(|| Arc::new(callstack));
    }

    #[must_use]
    pub fn callstack(&self, id: CallstackId) -> Option<Arc<Callstack>> {
        self.callstacks.get(&id).map(Arc::clone)
    }

    #[must_use]
    pub fn callstack_count(&self) -> usize {
        self.callstacks.len()
    }

    pub fn add_or_assign_thread_name(&mut self, tid: Tid, name: String) {
        self.thread_names.insert(tid, name);
    }

    #[must_use]
    pub fn thread_name(&self, tid: Tid) -> Option<&str> {
        self.thread_names.get(&tid).map(String::as_str)
    }

    #[must_use]
    pub fn thread_names(&self) -> &HashMap<Tid, String> {
        &self.thread_names
    }

    pub fn insert_address_info(&mut self, info: AddressInfo) {
        self.address_infos.insert(info.absolute_address, info);
    }

    #[must_use]
    pub fn address_info(&self, address: u64) -> Option<&AddressInfo> {
        self.address_infos.get(&address)
    }

    pub fn add_unique_tracepoint_info(&mut self, key: u64, info: TracepointInfo) {
        self.tracepoint_infos.entry(key).or_insert(info);
    }

    #[must_use]
    pub fn tracepoint_info(&self, key: u64) -> Option<&TracepointInfo> {
        self.tracepoint_infos.get(&key)
    }

    pub fn add_tracepoint_event(&mut self, event: TracepointEvent) {
        self.tracepoint_events.push(event);
    }

    #[must_use]
    pub fn tracepoint_events(&self) -> &[TracepointEvent] {
        &self.tracepoint_events
    }

    /// Display name for a sampled address: hooked function name first,
    /// then remote-resolved symbol info, then the unresolved placeholder.
    #[must_use]
    pub fn function_name_for_sampled_address(&self, address: u64) -> String {
        if let Some(func) = self.selected_functions.get(&address) {
            return func.pretty_name.clone();
        }
        if let Some(info) = self.address_infos.get(&address) {
            return info.function_name.clone();
        }
        UNRESOLVED_FUNCTION_NAME.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function(address: u64, name: &str) -> FunctionInfo {
        FunctionInfo {
            pretty_name: name.to_string(),
            module_path: "/opt/game/bin/game".to_string(),
            address,
            size: 64,
        }
    }

    fn data_with_function(address: u64, name: &str) -> CaptureData {
        let mut selected = HashMap::new();
        selected.insert(address, function(address, name));
        CaptureData::new(ProcessData::default(), HashMap::new(), selected, HashMap::new())
    }

    #[test]
    fn test_function_stats_accumulate() {
        let mut data = data_with_function(0xa, "Render");
        data.update_function_stats(0xa, 50);
        data.update_function_stats(0xa, 60);
        let stats = data.function_stats(0xa).unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.total_time_ticks, 110);
        assert_eq!(stats.min_ticks, 50);
        assert_eq!(stats.max_ticks, 60);
        assert_eq!(stats.average_ticks(), 55);
    }

    #[test]
    fn test_unique_callstack_keeps_first() {
        let mut data = data_with_function(0xa, "Render");
        data.add_unique_callstack(CallstackId(1), Callstack { addresses: vec![0xa, 0xb] });
        data.add_unique_callstack(CallstackId(1), Callstack { addresses: vec![0xc] });
        assert_eq!(data.callstack(CallstackId(1)).unwrap().addresses, vec![0xa, 0xb]);
        assert_eq!(data.callstack_count(), 1);
    }

    #[test]
    fn test_sampled_name_fallback_chain() {
        let mut data = data_with_function(0xa, "Render");
        data.insert_address_info(AddressInfo {
            absolute_address: 0xb,
            function_name: "memcpy".to_string(),
            offset_in_function: 4,
            module_path: "/lib/libc.so".to_string(),
        });
        assert_eq!(data.function_name_for_sampled_address(0xa), "Render");
        assert_eq!(data.function_name_for_sampled_address(0xb), "memcpy");
        assert_eq!(data.function_name_for_sampled_address(0xdead), UNRESOLVED_FUNCTION_NAME);
    }

    #[test]
    fn test_thread_name_upsert() {
        let mut data = data_with_function(0xa, "Render");
        data.add_or_assign_thread_name(Tid(5), "worker-0".to_string());
        data.add_or_assign_thread_name(Tid(5), "worker-renamed".to_string());
        assert_eq!(data.thread_name(Tid(5)), Some("worker-renamed"));
    }
}
