//! FFI opcodes (§4.2, §6): `ffi lib`, `ffi sym`, `ffi call`, `ffi struct`.
//!
//! Only the opcode *contract* lives here — resolving a library path to an
//! address, a symbol to a callable pointer, and actually invoking it
//! through a calling convention is platform glue that belongs to whatever
//! process hosts the VM. `loom-cli` installs a [`FfiBackend`] at start-up
//! via [`install_backend`]; without one, every `ffi` opcode fails with
//! `EvalErrorKind::Ffi`.

use crate::error::{EvalError, EvalErrorKind};
use crate::signal::EvalSignal;
use loom_core::{FfiOp, FfiStructDescriptor, FfiSymbolHandle, FfiType, ObjectData, Vm};
use std::sync::OnceLock;

type Result<T> = std::result::Result<T, EvalError>;

/// A foreign scalar, already converted out of/into a loom `Object`.
#[derive(Clone, Copy, Debug)]
pub enum FfiArg {
    Int(i64),
    Float(f64),
    Ptr(usize),
}

/// The calling-convention and dynamic-loading backend. Implemented by
/// `loom-cli`'s `ffi_loader` module on top of `libc::dlopen`/`dlsym`.
pub trait FfiBackend: Send + Sync {
    fn open(&self, path: &str) -> std::result::Result<usize, String>;
    fn resolve(&self, lib: usize, name: &str) -> std::result::Result<usize, String>;
    fn call(
        &self,
        addr: usize,
        args: &[FfiArg],
        ret: FfiType,
    ) -> std::result::Result<FfiArg, String>;
}

static BACKEND: OnceLock<Box<dyn FfiBackend>> = OnceLock::new();

/// Installs the process-wide FFI backend. Only the first call has any
/// effect; later calls are ignored (mirrors `ProcessState`'s
/// once-per-process initialization).
pub fn install_backend(backend: Box<dyn FfiBackend>) {
    let _ = BACKEND.set(backend);
}

fn backend() -> Result<&'static dyn FfiBackend> {
    BACKEND
        .get()
        .map(|b| b.as_ref())
        .ok_or_else(|| EvalError::new(EvalErrorKind::Ffi("no FFI backend installed".into())))
}

pub fn eval(vm: &mut Vm, op: &FfiOp) -> Result<EvalSignal> {
    match op {
        FfiOp::Lib { alias, path } => lib(vm, alias, path),
        FfiOp::Sym { alias, name } => sym(vm, alias, name),
        FfiOp::Call { argc, ret } => call(vm, *argc, *ret),
        FfiOp::Struct { name, fields } => struct_decl(vm, name, fields),
    }
}

fn lib(vm: &mut Vm, alias: &str, path: &str) -> Result<EvalSignal> {
    let handle = backend()?
        .open(path)
        .map_err(|e| EvalError::new(EvalErrorKind::Ffi(e)))?;
    loom_core::ProcessState::register_ffi_library(alias.to_string(), handle);
    Ok(EvalSignal::Value(vm.heap.bool_value(true)))
}

fn sym(vm: &mut Vm, alias: &str, name: &str) -> Result<EvalSignal> {
    let lib_handle = loom_core::ProcessState::ffi_library(alias).ok_or_else(|| {
        EvalError::new(EvalErrorKind::Ffi(format!("ffi lib '{alias}' not loaded")))
    })?;
    let address = backend()?
        .resolve(lib_handle, name)
        .map_err(|e| EvalError::new(EvalErrorKind::Ffi(e)))?;
    let obj = vm.heap.alloc(ObjectData::FfiSymbol(FfiSymbolHandle {
        library_alias: alias.to_string(),
        symbol_name: name.to_string(),
        address,
    }));
    vm.heap.track(obj)?;
    Ok(EvalSignal::Value(obj))
}

fn call(vm: &mut Vm, argc: u32, ret: FfiType) -> Result<EvalSignal> {
    let sym_obj = vm.active_stack_mut().pop()?;
    let address = match vm.heap.get(sym_obj)? {
        ObjectData::FfiSymbol(handle) => handle.address,
        other => {
            return Err(EvalError::new(EvalErrorKind::TypeMismatch {
                expected: "ffi-symbol".into(),
                found: other.type_name().into(),
            }));
        }
    };
    let mut args = Vec::with_capacity(argc as usize);
    for _ in 0..argc {
        let obj = vm.active_stack_mut().pop()?;
        args.push(to_ffi_arg(vm, obj)?);
    }
    args.reverse();
    let result = backend()?
        .call(address, &args, ret)
        .map_err(|e| EvalError::new(EvalErrorKind::Ffi(e)))?;
    Ok(EvalSignal::Value(from_ffi_arg(vm, result, ret)?))
}

fn to_ffi_arg(vm: &Vm, obj: loom_core::Object) -> Result<FfiArg> {
    match vm.heap.get(obj)? {
        ObjectData::Int(i) => Ok(FfiArg::Int(i.to_i64().unwrap_or(0))),
        ObjectData::Float(f) => Ok(FfiArg::Float(f.to_f64())),
        ObjectData::Pointer { address, .. } => Ok(FfiArg::Ptr(*address)),
        other => Err(EvalError::new(EvalErrorKind::TypeMismatch {
            expected: "ffi-compatible scalar".into(),
            found: other.type_name().into(),
        })),
    }
}

fn from_ffi_arg(vm: &mut Vm, arg: FfiArg, ret: FfiType) -> Result<loom_core::Object> {
    if ret == FfiType::Void {
        return Ok(vm.heap.null_value(loom_core::NullKind::Pointer));
    }
    Ok(match arg {
        FfiArg::Int(i) => vm.heap.make_int(rug::Integer::from(i)),
        FfiArg::Float(f) => {
            let obj = vm
                .heap
                .alloc(ObjectData::Float(rug::Float::with_val(vm.float_precision, f)));
            vm.heap.track(obj)?;
            obj
        }
        FfiArg::Ptr(address) => {
            let obj = vm.heap.alloc(ObjectData::Pointer {
                address,
                foreign_owned: true,
            });
            vm.heap.track(obj)?;
            obj
        }
    })
}

fn struct_decl(
    vm: &mut Vm,
    name: &str,
    fields: &[(String, FfiType)],
) -> Result<EvalSignal> {
    let mut offset = 0usize;
    let descriptors = fields
        .iter()
        .map(|(field_name, ty)| {
            let field = loom_core::FfiFieldDescriptor {
                name: field_name.clone(),
                ty: *ty,
                offset,
            };
            offset += ty.size_of();
            field
        })
        .collect();
    let obj = vm.heap.alloc(ObjectData::FfiStruct(FfiStructDescriptor {
        name: name.to_string(),
        fields: descriptors,
    }));
    vm.heap.track(obj)?;
    Ok(EvalSignal::Value(obj))
}
