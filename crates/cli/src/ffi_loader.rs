//! Dynamic-library `FfiBackend` (§6, §9) built on `libc::dlopen`/`dlsym`.
//!
//! Calling-convention dispatch — actually invoking a resolved symbol with
//! the right argument widths and ABI — is platform glue the VM contract
//! deliberately leaves unspecified (§1); `call` always fails with
//! `UnsupportedAbi` until a real libffi-style invoker backs it.

use loom_runtime::{FfiArg, FfiBackend};
use loom_core::FfiType;
use std::collections::HashMap;
use std::ffi::CString;
use std::sync::Mutex;

/// Extension appended to a bare library name if it doesn't already carry
/// one, matching the source loader's per-platform convention.
#[cfg(target_os = "macos")]
const LIB_EXT: &str = ".dylib";
#[cfg(all(unix, not(target_os = "macos")))]
const LIB_EXT: &str = ".so";
#[cfg(windows)]
const LIB_EXT: &str = ".dll";

/// Loads and caches dynamic libraries by resolved path, mirroring the
/// source `ModuleLoader`'s handle cache.
pub struct DlFfiBackend {
    handles: Mutex<HashMap<String, usize>>,
}

impl Default for DlFfiBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DlFfiBackend {
    pub fn new() -> Self {
        DlFfiBackend {
            handles: Mutex::new(HashMap::new()),
        }
    }
}

fn with_extension(path: &str) -> String {
    if path.is_empty() || path.ends_with(LIB_EXT) {
        path.to_string()
    } else {
        format!("{path}{LIB_EXT}")
    }
}

impl FfiBackend for DlFfiBackend {
    fn open(&self, path: &str) -> Result<usize, String> {
        let resolved = with_extension(path);
        let mut handles = self.handles.lock().expect("ffi handle cache poisoned");
        if let Some(handle) = handles.get(&resolved) {
            return Ok(*handle);
        }

        // Empty string maps to the current process, matching `dlopen(NULL, ...)`.
        let c_path = if resolved.is_empty() {
            None
        } else {
            Some(CString::new(resolved.clone()).map_err(|e| e.to_string())?)
        };
        let raw_path = c_path.as_ref().map(|p| p.as_ptr()).unwrap_or(std::ptr::null());

        // SAFETY: `raw_path` is either null (current process) or a valid
        // NUL-terminated C string owned by `c_path` for the call's duration.
        let handle = unsafe { libc::dlopen(raw_path, libc::RTLD_LAZY) };
        if handle.is_null() {
            return Err(dlerror_message(&resolved));
        }

        let address = handle as usize;
        handles.insert(resolved, address);
        Ok(address)
    }

    fn resolve(&self, lib: usize, name: &str) -> Result<usize, String> {
        let c_name = CString::new(name).map_err(|e| e.to_string())?;
        // SAFETY: `lib` was returned by a prior successful `dlopen` call
        // and is never closed while the backend is alive.
        let symbol = unsafe { libc::dlsym(lib as *mut libc::c_void, c_name.as_ptr()) };
        if symbol.is_null() {
            return Err(format!("symbol '{name}' not found"));
        }
        Ok(symbol as usize)
    }

    fn call(&self, _addr: usize, _args: &[FfiArg], _ret: FfiType) -> Result<FfiArg, String> {
        Err("ffi call: no calling-convention dispatcher is wired up for this platform".into())
    }
}

fn dlerror_message(path: &str) -> String {
    // SAFETY: `dlerror` returns either null or a static/thread-local
    // NUL-terminated string owned by libc; we copy it before returning.
    let raw = unsafe { libc::dlerror() };
    if raw.is_null() {
        return format!("failed to open '{path}'");
    }
    let msg = unsafe { std::ffi::CStr::from_ptr(raw) };
    format!("failed to open '{path}': {}", msg.to_string_lossy())
}

impl Drop for DlFfiBackend {
    fn drop(&mut self) {
        let handles = self.handles.lock().expect("ffi handle cache poisoned");
        for handle in handles.values() {
            // SAFETY: each handle was returned by a successful `dlopen`
            // and is closed exactly once, here, at backend teardown.
            unsafe {
                libc::dlclose(*handle as *mut libc::c_void);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_platform_extension_when_missing() {
        let resolved = with_extension("libm");
        assert!(resolved.starts_with("libm"));
        assert!(resolved.ends_with(LIB_EXT));
    }

    #[test]
    fn leaves_an_already_qualified_path_alone() {
        let already = format!("libm{LIB_EXT}");
        assert_eq!(with_extension(&already), already);
    }

    #[test]
    fn opening_the_current_process_succeeds() {
        let backend = DlFfiBackend::new();
        assert!(backend.open("").is_ok());
    }
}
