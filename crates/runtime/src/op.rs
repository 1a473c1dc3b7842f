//! The opcode dispatcher: one match arm per [`Operation`] variant,
//! delegating to the module that owns that opcode family.

use crate::error::{EvalError, EvalErrorKind};
use crate::signal::EvalSignal;
use crate::{accumulate, addressing, arithmetic, casts, collections, control, ffi, function_ops, stackops};
use loom_core::{NullKind, Object, ObjectData, Operation, SentinelKind, Vm};

type Result<T> = std::result::Result<T, EvalError>;

pub fn eval_operation(vm: &mut Vm, op: &Operation) -> Result<EvalSignal> {
    vm.maybe_collect(false);
    match op {
        Operation::Push(tag, literal) => stackops::push(vm, *tag, literal),
        Operation::Pop(n) => stackops::pop_n(vm, *n),
        Operation::Remove(n) => stackops::remove_n(vm, *n),
        Operation::Dup => stackops::dup(vm),
        Operation::Copy => stackops::copy(vm),
        Operation::Swap => stackops::swap(vm),
        Operation::Lift(n) => stackops::lift(vm, *n),
        Operation::Sink(n) => stackops::sink(vm, *n),
        Operation::Squash(n) => stackops::squash(vm, *n),
        Operation::Reserve(n) => stackops::reserve(vm, *n),
        Operation::Clear(kind) => stackops::clear(vm, *kind),
        Operation::StackSize => stackops::stack_size(vm),

        Operation::Load(mode, idx) => addressing::load(vm, *mode, *idx),
        Operation::Store(mode, idx) => addressing::store(vm, *mode, *idx),
        Operation::Commit => addressing::commit(vm),
        Operation::CommitIndex => addressing::commit_index(vm),
        Operation::Revert => addressing::revert(vm),

        Operation::Arith(kind) => arithmetic::eval(vm, *kind),
        Operation::Accumulate => accumulate::eval(vm),

        Operation::Coll(kind) => collections::eval(vm, kind),

        Operation::If(links) => control::eval_if(vm, links),
        Operation::Invoke => invoke_or_signal(vm, false),
        Operation::InvokeTail => invoke_or_signal(vm, true),
        Operation::Unwind => control::unwind(vm),
        Operation::Checkpoint => control::checkpoint(vm),
        Operation::Halt => control::halt(vm),

        Operation::SetCreator => function_ops::set_creator(vm),
        Operation::SaveArgs => stack_int_then(vm, function_ops::save_args),
        Operation::Current => function_ops::current(vm),
        Operation::Dtor => function_ops::dtor(vm),

        Operation::Cast(tag) => casts::eval(vm, *tag),

        Operation::SetPrecision => set_precision(vm),
        Operation::SetEpsilon => set_epsilon(vm),

        Operation::Ffi(kind) => ffi::eval(vm, kind),

        Operation::Define(_, tag, literal) => stackops::push(vm, *tag, literal),
        Operation::PushDefine(name) => push_define(vm, name),
        Operation::Nop => Ok(EvalSignal::Value(vm.heap.null_value(NullKind::Pointer))),
        Operation::Module(_) => Ok(EvalSignal::Value(vm.heap.null_value(NullKind::Pointer))),
        Operation::Dump(inner) => dump(vm, inner.as_deref()),
        Operation::Assert => assert_op(vm),
        Operation::Gc => {
            vm.maybe_collect(true);
            Ok(EvalSignal::Value(vm.heap.null_value(NullKind::Pointer)))
        }
    }
}

/// `invoke`/`invoke-tail` double as the trigger for the control-flow
/// sentinels (§3, §9): invoking a `Sentinel` object converts it straight
/// into the matching `EvalSignal` rather than attempting a function call.
fn invoke_or_signal(vm: &mut Vm, tail: bool) -> Result<EvalSignal> {
    let top = vm.active_stack().peek()?;
    if let ObjectData::Sentinel(kind) = vm.heap.get(top)? {
        let kind = *kind;
        vm.active_stack_mut().pop()?;
        return Ok(sentinel_signal(kind));
    }
    function_ops::invoke(vm, tail)
}

fn sentinel_signal(kind: SentinelKind) -> EvalSignal {
    match kind {
        SentinelKind::ExitScope => EvalSignal::ExitScope,
        SentinelKind::Repeat => EvalSignal::Repeat,
        SentinelKind::RepeatIfTrue => EvalSignal::RepeatIfTrue,
        SentinelKind::RepeatIfFalse => EvalSignal::RepeatIfFalse,
        SentinelKind::TailcallRequest => EvalSignal::TailcallRequest,
        SentinelKind::ExitRequest => EvalSignal::ExitRequest,
        SentinelKind::RaiseRequest => EvalSignal::RaiseRequest,
        SentinelKind::ErrorLabel => EvalSignal::ErrorLabel,
    }
}

fn stack_int_then(vm: &mut Vm, f: fn(&mut Vm, i64) -> Result<EvalSignal>) -> Result<EvalSignal> {
    let count_obj = vm.active_stack_mut().pop()?;
    let n = match vm.heap.get(count_obj)? {
        ObjectData::Int(i) => i.to_i64().unwrap_or(0),
        other => {
            return Err(EvalError::new(EvalErrorKind::TypeMismatch {
                expected: "int".into(),
                found: other.type_name().into(),
            }));
        }
    };
    f(vm, n)
}

fn push_define(vm: &mut Vm, name: &str) -> Result<EvalSignal> {
    // Definitions are parsed as `Literal::Define(Object)` and baked into
    // `Push` nodes directly; a bare `push-define` by name falls back to
    // the symbol table for forward references the parser couldn't
    // resolve against an already-seen `define`.
    Ok(EvalSignal::Value(vm.heap.intern_symbol(name)))
}

fn dump(vm: &mut Vm, inner: Option<&Operation>) -> Result<EvalSignal> {
    let value = match inner {
        Some(op) => match eval_operation(vm, op)? {
            EvalSignal::Value(obj) => obj,
            other => return Ok(other),
        },
        None => vm.active_stack().peek()?,
    };
    let rendered = describe(vm, value, 0);
    println!("{rendered}");
    tracing::trace!(object = %rendered, "dump");
    Ok(EvalSignal::Value(value))
}

/// Renders a value's display form for `dump` (§8's scenarios print bare
/// `28`, `true`, `255`, not a type name). Depth-limited since functions can
/// form creator cycles (§9).
fn describe(vm: &Vm, obj: Object, depth: usize) -> String {
    if depth > 8 {
        return "...".to_string();
    }
    match vm.heap.get(obj) {
        Ok(ObjectData::Int(i)) => i.to_string(),
        Ok(ObjectData::Float(f)) => f.to_string(),
        Ok(ObjectData::Bool(b)) => b.to_string(),
        Ok(ObjectData::Char(c)) => c.to_string(),
        Ok(ObjectData::String(s)) => s.clone(),
        Ok(ObjectData::Symbol(s)) => s.clone(),
        Ok(ObjectData::Null(_)) => "null".to_string(),
        Ok(ObjectData::Sentinel(kind)) => format!("<{kind:?}>"),
        Ok(ObjectData::Pair(a, b)) => {
            format!("({}, {})", describe(vm, *a, depth + 1), describe(vm, *b, depth + 1))
        }
        Ok(ObjectData::Array(items)) => {
            let parts: Vec<String> = items.iter().map(|o| describe(vm, *o, depth + 1)).collect();
            format!("[{}]", parts.join(", "))
        }
        Ok(ObjectData::UnorderedMap(entries)) => {
            let parts: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("{}: {}", describe(vm, *k, depth + 1), describe(vm, *v, depth + 1)))
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
        Ok(ObjectData::UnorderedSet(items)) => {
            let parts: Vec<String> = items.iter().map(|o| describe(vm, *o, depth + 1)).collect();
            format!("{{{}}}", parts.join(", "))
        }
        Ok(ObjectData::Projection(_)) => "<projection>".to_string(),
        Ok(ObjectData::Function(_)) => "<function>".to_string(),
        Ok(ObjectData::Pointer { address, .. }) => format!("<ptr {address:#x}>"),
        Ok(ObjectData::FfiStruct(desc)) => format!("<ffi-struct {}>", desc.name),
        Ok(ObjectData::FfiSymbol(handle)) => format!("<ffi-sym {}>", handle.symbol_name),
        Err(_) => "<stale>".to_string(),
    }
}

/// `assert` — pops a bool, raises if it's `false`.
fn assert_op(vm: &mut Vm) -> Result<EvalSignal> {
    let top = vm.active_stack_mut().pop()?;
    match vm.heap.get(top)? {
        ObjectData::Bool(true) => Ok(EvalSignal::Value(vm.heap.bool_value(true))),
        ObjectData::Bool(false) => Err(EvalError::new(EvalErrorKind::Other(
            "assert: condition was false".into(),
        ))),
        other => Err(EvalError::new(EvalErrorKind::TypeMismatch {
            expected: "bool".into(),
            found: other.type_name().into(),
        })),
    }
}

fn set_precision(vm: &mut Vm) -> Result<EvalSignal> {
    let top = vm.active_stack_mut().pop()?;
    let bits = match vm.heap.get(top)? {
        ObjectData::Int(i) => i
            .to_u32()
            .ok_or(EvalError::new(EvalErrorKind::Other("precision out of range".into())))?,
        other => {
            return Err(EvalError::new(EvalErrorKind::TypeMismatch {
                expected: "int".into(),
                found: other.type_name().into(),
            }));
        }
    };
    vm.float_precision = bits;
    Ok(EvalSignal::Value(vm.heap.null_value(NullKind::Pointer)))
}

fn set_epsilon(vm: &mut Vm) -> Result<EvalSignal> {
    let top = vm.active_stack_mut().pop()?;
    let epsilon = match vm.heap.get(top)? {
        ObjectData::Float(f) => f.to_f64(),
        other => {
            return Err(EvalError::new(EvalErrorKind::TypeMismatch {
                expected: "float".into(),
                found: other.type_name().into(),
            }));
        }
    };
    vm.float_epsilon = epsilon;
    Ok(EvalSignal::Value(vm.heap.null_value(NullKind::Pointer)))
}
