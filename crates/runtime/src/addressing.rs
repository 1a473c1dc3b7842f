//! `load`/`store` addressing modes and commit/revert (§4.2, §4.5).

use crate::error::{EvalError, EvalErrorKind};
use crate::signal::EvalSignal;
use loom_core::{AddressMode, NullKind, Object, Vm};

type Result<T> = std::result::Result<T, EvalError>;

fn resolve_index(vm: &mut Vm, mode: AddressMode, index: i64) -> Result<(TargetStack, usize)> {
    Ok(match mode {
        AddressMode::Abs => (TargetStack::Active, index.max(0) as usize),
        AddressMode::Rel => {
            let abs = vm.active_stack().rel_to_abs(index)?;
            (TargetStack::Active, abs)
        }
        AddressMode::TopRelative => {
            let abs = vm.active_stack().top_relative_to_abs(index)?;
            (TargetStack::Active, abs)
        }
        AddressMode::Commit => {
            let base = vm.active_stack().commit_index();
            let abs = base + index;
            if abs < 0 {
                return Err(EvalError::new(EvalErrorKind::IndexOutOfRange { index }));
            }
            (TargetStack::Active, abs as usize)
        }
        AddressMode::Root => (TargetStack::Root, index.max(0) as usize),
        AddressMode::Parent(n) => (TargetStack::Parent(n), index.max(0) as usize),
        AddressMode::Local => {
            let func = vm.active_stack_mut().pop()?;
            (TargetStack::FunctionLocal(func), index.max(0) as usize)
        }
        AddressMode::Arg => {
            let func = vm.active_stack_mut().pop()?;
            (TargetStack::FunctionArg(func), index.max(0) as usize)
        }
    })
}

enum TargetStack {
    Active,
    Root,
    Parent(u32),
    FunctionLocal(Object),
    FunctionArg(Object),
}

pub fn load(vm: &mut Vm, mode: AddressMode, index: i64) -> Result<EvalSignal> {
    let (target, abs) = resolve_index(vm, mode, index)?;
    let value = match target {
        TargetStack::Active => vm.active_stack().peek_at(abs)?,
        TargetStack::Root => vm.root_stack().peek_at(abs)?,
        TargetStack::Parent(n) => vm.parent_stack(n)?.peek_at(abs)?,
        TargetStack::FunctionLocal(func) => read_function_slot(vm, func, abs, true)?,
        TargetStack::FunctionArg(func) => read_function_slot(vm, func, abs, false)?,
    };
    Ok(EvalSignal::Value(value))
}

pub fn store(vm: &mut Vm, mode: AddressMode, index: i64) -> Result<EvalSignal> {
    let value = vm.active_stack_mut().pop()?;
    let (target, abs) = resolve_index(vm, mode, index)?;
    match target {
        TargetStack::Active => vm.active_stack_mut().set_at(abs, value)?,
        TargetStack::Root => vm.root_stack_mut().set_at(abs, value)?,
        TargetStack::Parent(n) => vm.parent_stack_mut(n)?.set_at(abs, value)?,
        TargetStack::FunctionLocal(func) => write_function_slot(vm, func, abs, true, value)?,
        TargetStack::FunctionArg(func) => write_function_slot(vm, func, abs, false, value)?,
    }
    Ok(EvalSignal::Value(vm.heap.null_value(NullKind::Pointer)))
}

fn read_function_slot(vm: &mut Vm, func: Object, index: usize, local: bool) -> Result<Object> {
    let loom_core::ObjectData::Function(data) = vm.heap.get(func)? else {
        return Err(EvalError::new(EvalErrorKind::TypeMismatch {
            expected: "function".into(),
            found: vm.heap.get(func)?.type_name().into(),
        }));
    };
    let slots = if local { &data.locals } else { &data.args };
    slots
        .get(index)
        .copied()
        .ok_or(EvalError::new(EvalErrorKind::IndexOutOfRange {
            index: index as i64,
        }))
}

fn write_function_slot(
    vm: &mut Vm,
    func: Object,
    index: usize,
    local: bool,
    value: Object,
) -> Result<()> {
    if vm.heap.flags(func)?.is_const {
        return Err(EvalError::new(EvalErrorKind::ConstViolation));
    }
    let loom_core::ObjectData::Function(data) = vm.heap.get_mut(func)? else {
        return Err(EvalError::new(EvalErrorKind::TypeMismatch {
            expected: "function".into(),
            found: "non-function".into(),
        }));
    };
    let slots = if local {
        &mut data.locals
    } else {
        &mut data.args
    };
    let slot = slots
        .get_mut(index)
        .ok_or(EvalError::new(EvalErrorKind::IndexOutOfRange {
            index: index as i64,
        }))?;
    *slot = value;
    Ok(())
}

pub fn commit(vm: &mut Vm) -> Result<EvalSignal> {
    vm.active_stack_mut().commit();
    Ok(EvalSignal::Value(vm.heap.null_value(NullKind::Pointer)))
}

pub fn commit_index(vm: &mut Vm) -> Result<EvalSignal> {
    let idx = vm.active_stack().commit_index();
    let obj = vm.heap.make_int(rug::Integer::from(idx));
    Ok(EvalSignal::Value(obj))
}

pub fn revert(vm: &mut Vm) -> Result<EvalSignal> {
    vm.active_stack_mut().revert()?;
    Ok(EvalSignal::Value(vm.heap.null_value(NullKind::Pointer)))
}
