//! Stack-manipulation opcodes (§4.2): `push pop dup copy swap lift sink
//! squash reserve clear size frame`.

use crate::error::{EvalError, EvalErrorKind};
use crate::signal::EvalSignal;
use loom_core::{ClearKind, Literal, NullKind, ObjectData, TypeTag, Vm};

type Result<T> = std::result::Result<T, EvalError>;

/// Materialize a fresh `Object` from a parsed literal and push it.
pub fn push(vm: &mut Vm, tag: TypeTag, literal: &Literal) -> Result<EvalSignal> {
    let obj = match (tag, literal) {
        (TypeTag::Int, Literal::Int(n)) => vm.heap.make_int(n.clone()),
        (TypeTag::Float, Literal::Float(f)) => {
            let obj = vm.heap.alloc(ObjectData::Float(f.clone()));
            vm.heap.track(obj)?;
            obj
        }
        (TypeTag::String, Literal::String(s)) => {
            let obj = vm.heap.alloc(ObjectData::String(s.clone()));
            vm.heap.track(obj)?;
            obj
        }
        (TypeTag::Char, Literal::Char(c)) => {
            let obj = vm.heap.alloc(ObjectData::Char(*c));
            vm.heap.track(obj)?;
            obj
        }
        (TypeTag::Bool, Literal::Bool(b)) => vm.heap.bool_value(*b),
        (_, Literal::Null) => vm.heap.null_value(null_kind_for_tag(tag)),
        (_, Literal::Define(obj)) => *obj,
        (TypeTag::Object, Literal::Sentinel(kind)) => vm.heap.sentinel(*kind),
        (TypeTag::Array, _) => {
            let obj = vm.heap.alloc(ObjectData::Array(Vec::new()));
            vm.heap.track(obj)?;
            obj
        }
        (TypeTag::Umap, _) => {
            let obj = vm.heap.alloc(ObjectData::UnorderedMap(Vec::new()));
            vm.heap.track(obj)?;
            obj
        }
        (TypeTag::Uset, _) => {
            let obj = vm.heap.alloc(ObjectData::UnorderedSet(Vec::new()));
            vm.heap.track(obj)?;
            obj
        }
        (TypeTag::Function, Literal::Function(func_lit)) => {
            crate::function_ops::make_function(vm, func_lit)?
        }
        _ => {
            return Err(EvalError::new(EvalErrorKind::Other(format!(
                "push: literal does not match type tag {tag:?}"
            ))));
        }
    };
    Ok(EvalSignal::Value(obj))
}

fn null_kind_for_tag(tag: TypeTag) -> NullKind {
    match tag {
        TypeTag::Int => NullKind::Int,
        TypeTag::Float => NullKind::Float,
        TypeTag::Bool => NullKind::Bool,
        TypeTag::Char => NullKind::Char,
        TypeTag::String => NullKind::String,
        TypeTag::Pair => NullKind::Pair,
        TypeTag::Array => NullKind::Array,
        // `uset null` mis-tags as a map/set null, faithfully (see
        // `loom_core::NullKind::MapOrSet`).
        TypeTag::Umap | TypeTag::Uset => NullKind::MapOrSet,
        TypeTag::Function => NullKind::Function,
        TypeTag::Ptr => NullKind::Pointer,
        TypeTag::Object | TypeTag::Exprlist | TypeTag::FfiStruct => NullKind::Pointer,
    }
}

pub fn pop_n(vm: &mut Vm, n: i64) -> Result<EvalSignal> {
    vm.active_stack_mut().drop_n(n.max(0) as usize)?;
    Ok(EvalSignal::Value(vm.heap.null_value(NullKind::Pointer)))
}

/// `remove N` — same as `pop N` but only valid for tracked values; the
/// collector reclaims them on its own schedule, so this is observably
/// identical to `pop` except that it rejects pinned/untracked operands.
pub fn remove_n(vm: &mut Vm, n: i64) -> Result<EvalSignal> {
    let count = n.max(0) as usize;
    let stack = vm.active_stack();
    let len = stack.len();
    if count > len {
        return Err(EvalError::new(EvalErrorKind::StackUnderflow));
    }
    for i in (len - count)..len {
        let obj = stack.peek_at(i)?;
        if !vm.heap.flags(obj)?.tracked {
            return Err(EvalError::new(EvalErrorKind::UntrackedObjectMisuse));
        }
    }
    vm.active_stack_mut().drop_n(count)?;
    Ok(EvalSignal::Value(vm.heap.null_value(NullKind::Pointer)))
}

pub fn dup(vm: &mut Vm) -> Result<EvalSignal> {
    vm.active_stack_mut().dup()?;
    Ok(EvalSignal::Value(vm.active_stack().peek()?))
}

pub fn copy(vm: &mut Vm) -> Result<EvalSignal> {
    vm.active_stack_mut().copy_top()?;
    Ok(EvalSignal::Value(vm.active_stack().peek()?))
}

pub fn swap(vm: &mut Vm) -> Result<EvalSignal> {
    vm.active_stack_mut().swap()?;
    Ok(EvalSignal::Value(vm.active_stack().peek()?))
}

pub fn squash(vm: &mut Vm, n: i64) -> Result<EvalSignal> {
    vm.active_stack_mut().squash(n)?;
    Ok(EvalSignal::Value(vm.active_stack().peek()?))
}

pub fn reserve(vm: &mut Vm, n: i64) -> Result<EvalSignal> {
    let null = vm.heap.null_value(NullKind::Pointer);
    vm.active_stack_mut().reserve(n.max(0) as usize, null);
    Ok(EvalSignal::Value(null))
}

pub fn clear(vm: &mut Vm, kind: ClearKind) -> Result<EvalSignal> {
    match kind {
        ClearKind::Stack => vm.active_stack_mut().clear(),
        ClearKind::Frame => vm.active_stack_mut().clear_frame()?,
    }
    Ok(EvalSignal::Value(vm.heap.null_value(NullKind::Pointer)))
}

pub fn stack_size(vm: &mut Vm) -> Result<EvalSignal> {
    let len = vm.active_stack().len() as i64;
    let obj = vm.heap.make_int(rug::Integer::from(len));
    Ok(EvalSignal::Value(obj))
}

/// `lift N` — move N values from the stack below into the active stack,
/// preserving order.
pub fn lift(vm: &mut Vm, n: i64) -> Result<EvalSignal> {
    if vm.stack_depth() < 2 {
        return Err(EvalError::new(EvalErrorKind::Other(
            "lift: no stack below the active stack".into(),
        )));
    }
    let mut below = vm.pop_stack()?;
    let result = vm.active_stack_mut().lift_from(&mut below, n.max(0) as usize);
    vm.push_stack(below);
    result?;
    Ok(EvalSignal::Value(vm.heap.null_value(NullKind::Pointer)))
}

/// `sink N` — inverse of `lift`.
pub fn sink(vm: &mut Vm, n: i64) -> Result<EvalSignal> {
    if vm.stack_depth() < 2 {
        return Err(EvalError::new(EvalErrorKind::Other(
            "sink: no stack below the active stack".into(),
        )));
    }
    let mut below = vm.pop_stack()?;
    let result = vm.active_stack_mut().sink_into(&mut below, n.max(0) as usize);
    vm.push_stack(below);
    result?;
    Ok(EvalSignal::Value(vm.heap.null_value(NullKind::Pointer)))
}
