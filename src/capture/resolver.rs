//! Process, module and symbol resolution boundary
//!
//! Discovery and debug-info loading live outside this crate; the session
//! only consumes their results through `ProcessResolver`. Any resolution
//! failure is fatal for session establishment: either every step succeeds
//! and a capture can start, or a typed error names the failed operation.

use super::data::{FunctionInfo, ModuleData, ProcessData};
use crate::domain::{Pid, SessionError};
use log::{error, info};
use std::collections::{HashMap, HashSet};

/// External resolution service. Errors are human-readable messages from
/// the collaborator; the session wraps them into `SessionError`.
pub trait ProcessResolver {
    fn process_list(&self) -> Result<Vec<ProcessData>, String>;
    fn load_module_list(&self, pid: Pid) -> Result<Vec<ModuleData>, String>;
    fn find_debug_info_file(&self, module_path: &str) -> Result<String, String>;
    fn load_symbols(&self, debug_info_file: &str) -> Result<Vec<FunctionInfo>, String>;
}

/// Fully resolved capture target: the process, its modules keyed by path,
/// and the module matching the process's own binary.
#[derive(Debug, Clone)]
pub struct TargetProcess {
    pub process: ProcessData,
    pub module_map: HashMap<String, ModuleData>,
    pub main_module: ModuleData,
}

/// Resolve the capture target for `pid`: find the process, load its
/// module list, locate the main module by binary path and load its
/// symbols. Each failure aborts with the matching `SessionError`.
pub fn resolve_target_process(
    resolver: &dyn ProcessResolver,
    pid: Pid,
) -> Result<TargetProcess, SessionError> {
    let processes = resolver.process_list().map_err(SessionError::ProcessListFailed)?;
    let mut process = processes
        .into_iter()
        .find(|p| p.pid == pid)
        .ok_or(SessionError::ProcessNotFound(pid))?;
    info!(
        "Found target process: pid:{}, name:{}, path:{}, is64:{}",
        process.pid.0, process.name, process.full_path, process.is_64_bit
    );

    let modules = resolver
        .load_module_list(pid)
        .map_err(|e| SessionError::ModuleListFailed(pid, e))?;
    let mut module_map = HashMap::new();
    for module in modules {
        info!(
            "Module name:{}, path:{}, size:{}, build_id:{}",
            module.name, module.file_path, module.file_size, module.build_id
        );
        module_map.insert(module.file_path.clone(), module);
    }

    // The process name can be arbitrary; the binary path identifies the
    // main module.
    let main_module = module_map
        .get(&process.full_path)
        .cloned()
        .ok_or_else(|| SessionError::MainModuleNotFound { path: process.full_path.clone() })?;

    let debug_info_file = resolver.find_debug_info_file(&main_module.file_path).map_err(|e| {
        SessionError::SymbolsFailed { path: main_module.file_path.clone(), reason: e }
    })?;
    info!("Loading symbols from {debug_info_file}");
    let symbols = resolver.load_symbols(&debug_info_file).map_err(|e| {
        SessionError::SymbolsFailed { path: main_module.file_path.clone(), reason: e }
    })?;
    info!("Loaded {} symbols for main module", symbols.len());
    process.functions = symbols;

    Ok(TargetProcess { process, module_map, main_module })
}

/// Match user-provided filter substrings against the main module's
/// function names, producing the address-keyed hook selection. A filter
/// that matches nothing is reported individually and the capture proceeds
/// with the remaining matches (possibly zero hooked functions).
#[must_use]
pub fn select_functions(
    process: &ProcessData,
    filters: &[String],
) -> HashMap<u64, FunctionInfo> {
    let mut selected = HashMap::new();
    let mut filters_used: HashSet<&str> = HashSet::new();
    for function in &process.functions {
        for filter in filters {
            if function.pretty_name.contains(filter.as_str()) {
                selected.insert(function.address, function.clone());
                filters_used.insert(filter.as_str());
                break;
            }
        }
    }

    if filters_used.len() == filters.len() {
        if !filters.is_empty() {
            info!("All function filters had at least one match");
        }
    } else {
        for filter in filters {
            if !filters_used.contains(filter.as_str()) {
                error!("Function matching {filter} not found; will not be hooked in the capture");
            }
        }
    }
    if selected.is_empty() && !filters.is_empty() {
        error!("No function filter matched; capture proceeds with no hooked functions");
    }
    selected
}
