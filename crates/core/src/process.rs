//! Process-wide state (§3): the file-index table, debug-info side table,
//! FFI library registry, default float precision, and trace verbosity.
//!
//! This state is read-mostly after start-up. §5 says to protect it if
//! multiple VMs run on separate OS threads, so it's guarded by an
//! `RwLock` behind a `OnceLock` rather than left as bare process globals —
//! cheap insurance that costs nothing in the common single-VM case since
//! reads vastly outnumber writes.

use crate::operation::ExpressionList;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{OnceLock, RwLock};

/// A 1-based source location, matching the debug-info record in §6.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceLocation {
    pub file_index: u32,
    pub line: u32,
    pub column: u32,
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}:{}:{}", self.file_index, self.line, self.column)
    }
}

/// A debug-info site key: which expression list, and which index within
/// it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SiteKey {
    pub list_id: u64,
    pub node_index: usize,
}

#[derive(Default)]
struct Inner {
    files: Vec<PathBuf>,
    debug_info: HashMap<SiteKey, SourceLocation>,
    ffi_libraries: HashMap<String, usize>,
    default_precision: u32,
    trace_level: u32,
    trace_stack: bool,
}

pub struct ProcessState {
    inner: RwLock<Inner>,
}

static PROCESS: OnceLock<ProcessState> = OnceLock::new();

impl ProcessState {
    fn global() -> &'static ProcessState {
        PROCESS.get_or_init(|| ProcessState {
            inner: RwLock::new(Inner {
                default_precision: crate::vm::DEFAULT_FLOAT_PRECISION,
                ..Inner::default()
            }),
        })
    }

    /// Register a source file, returning its index for use in
    /// `SourceLocation::file_index`.
    pub fn register_file(path: PathBuf) -> u32 {
        let mut inner = Self::global().inner.write().expect("process state poisoned");
        inner.files.push(path);
        (inner.files.len() - 1) as u32
    }

    pub fn file_name(file_index: u32) -> Option<PathBuf> {
        let inner = Self::global().inner.read().expect("process state poisoned");
        inner.files.get(file_index as usize).cloned()
    }

    pub fn record_debug_info(key: SiteKey, location: SourceLocation) {
        let mut inner = Self::global().inner.write().expect("process state poisoned");
        inner.debug_info.insert(key, location);
    }

    pub fn debug_info(key: SiteKey) -> Option<SourceLocation> {
        let inner = Self::global().inner.read().expect("process state poisoned");
        inner.debug_info.get(&key).copied()
    }

    pub fn register_ffi_library(alias: String, handle: usize) {
        let mut inner = Self::global().inner.write().expect("process state poisoned");
        inner.ffi_libraries.insert(alias, handle);
    }

    pub fn ffi_library(alias: &str) -> Option<usize> {
        let inner = Self::global().inner.read().expect("process state poisoned");
        inner.ffi_libraries.get(alias).copied()
    }

    pub fn set_default_precision(bits: u32) {
        let mut inner = Self::global().inner.write().expect("process state poisoned");
        inner.default_precision = bits;
    }

    pub fn default_precision() -> u32 {
        let inner = Self::global().inner.read().expect("process state poisoned");
        inner.default_precision
    }

    pub fn set_trace_level(level: u32) {
        let mut inner = Self::global().inner.write().expect("process state poisoned");
        inner.trace_level = level;
    }

    pub fn trace_level() -> u32 {
        let inner = Self::global().inner.read().expect("process state poisoned");
        inner.trace_level
    }

    /// `--tracestack`: whether the evaluator should log the active stack's
    /// contents alongside each traced node.
    pub fn set_trace_stack(enabled: bool) {
        let mut inner = Self::global().inner.write().expect("process state poisoned");
        inner.trace_stack = enabled;
    }

    pub fn trace_stack() -> bool {
        let inner = Self::global().inner.read().expect("process state poisoned");
        inner.trace_stack
    }

    /// Test-only: reset process state between `#[serial]` tests so one
    /// test's registered files don't bleed into another's assertions.
    #[cfg(test)]
    pub fn reset_for_test() {
        let mut inner = Self::global().inner.write().expect("process state poisoned");
        *inner = Inner {
            default_precision: crate::vm::DEFAULT_FLOAT_PRECISION,
            ..Inner::default()
        };
    }
}

/// Record debug info for a node at parse time, keyed by the owning
/// expression list's identity and the node's index within it.
pub fn record_node_site(list: &ExpressionList, node_index: usize, location: SourceLocation) {
    ProcessState::record_debug_info(
        SiteKey {
            list_id: list.id,
            node_index,
        },
        location,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn file_registration_round_trips() {
        ProcessState::reset_for_test();
        let idx = ProcessState::register_file(PathBuf::from("a.loom"));
        assert_eq!(ProcessState::file_name(idx), Some(PathBuf::from("a.loom")));
    }

    #[test]
    #[serial]
    fn debug_info_round_trips() {
        ProcessState::reset_for_test();
        let key = SiteKey {
            list_id: 1,
            node_index: 0,
        };
        let loc = SourceLocation {
            file_index: 0,
            line: 3,
            column: 5,
        };
        ProcessState::record_debug_info(key, loc);
        assert_eq!(ProcessState::debug_info(key), Some(loc));
    }
}
