//! Function literals and the invocation protocol (§4.4).
//!
//! A non-tail `invoke` recurses one native Rust stack frame per nested
//! call, same as any tree-walking evaluator. `invoke tail` does not: it
//! only records the target on `Vm::pending_tailcall` and returns
//! `EvalSignal::TailcallRequest`, which `eval_expression_list` consumes in
//! place by adopting the target's body and restarting at index 0 (§4.3),
//! so a self- or mutually-tail-recursive program runs in constant native
//! call stack depth without ever unwinding back to `run_invocation`.

use crate::error::{EvalError, EvalErrorKind};
use crate::exprlist::eval_expression_list;
use crate::signal::EvalSignal;
use loom_core::{ExpressionList, FunctionLiteral, NullKind, Object, ObjectData, Stack, Vm};

type Result<T> = std::result::Result<T, EvalError>;

pub fn make_function(vm: &mut Vm, lit: &FunctionLiteral) -> Result<Object> {
    let data = loom_core::FunctionData::new(lit.name.clone(), lit.body.clone(), lit.own_stack);
    let obj = vm.heap.alloc(ObjectData::Function(data));
    vm.heap.track(obj)?;
    Ok(obj)
}

pub(crate) fn function_body(vm: &Vm, func: Object) -> Result<(ExpressionList, bool)> {
    match vm.heap.get(func)? {
        ObjectData::Function(f) => Ok((f.body.clone(), f.own_stack)),
        other => Err(EvalError::new(EvalErrorKind::TypeMismatch {
            expected: "function".into(),
            found: other.type_name().into(),
        })),
    }
}

fn take_own_stack(vm: &mut Vm, func: Object) -> Result<Stack> {
    match vm.heap.get_mut(func)? {
        ObjectData::Function(f) => Ok(f.own_stack_value.take().unwrap_or_default()),
        other => Err(EvalError::new(EvalErrorKind::TypeMismatch {
            expected: "function".into(),
            found: other.type_name().into(),
        })),
    }
}

fn restore_own_stack(vm: &mut Vm, func: Object, stack: Stack) -> Result<()> {
    match vm.heap.get_mut(func)? {
        ObjectData::Function(f) => {
            f.own_stack_value = Some(stack);
            Ok(())
        }
        other => Err(EvalError::new(EvalErrorKind::TypeMismatch {
            expected: "function".into(),
            found: other.type_name().into(),
        })),
    }
}

/// `invoke` / `invoke-tail` (§4.2, §4.4). Pops the function from the top
/// of the active stack.
pub fn invoke(vm: &mut Vm, tail: bool) -> Result<EvalSignal> {
    let func = vm.active_stack_mut().pop()?;
    if tail {
        vm.pending_tailcall = Some(func);
        return Ok(EvalSignal::TailcallRequest);
    }
    run_invocation(vm, func)
}

/// Invokes `func` directly, without popping it from the active stack
/// first. Used by opcodes that already hold the function object (e.g.
/// `accumulate`'s fold callback).
pub fn invoke_object(vm: &mut Vm, func: Object) -> Result<EvalSignal> {
    run_invocation(vm, func)
}

/// Runs `func`'s body to completion (§4.4 steps 1-2: pin, establish the
/// frame or own stack, run the body, tear down). Any chain of tail calls
/// the body makes is absorbed entirely inside that one `eval_expression_list`
/// call (§4.3) — this function never loops or re-establishes invocation
/// state itself, matching the one-pin-one-frame-one-`eval()` shape of the
/// source's `FunctionData::evaluateBody`.
fn run_invocation(vm: &mut Vm, func: Object) -> Result<EvalSignal> {
    let (body, own_stack) = function_body(vm, func)?;

    // Tracked-and-pinned is the transient invocation state (§3): the
    // function is pinned for the duration of the call so a GC cycle
    // triggered from inside its own body can't reclaim it out from
    // under the evaluator.
    vm.heap.pin(func)?;
    if own_stack {
        let stack = take_own_stack(vm, func)?;
        vm.push_stack(stack);
    } else {
        vm.active_stack_mut().push_frame();
    }

    let previous = vm.current_function.replace(func);
    let result = eval_expression_list(vm, &body);
    vm.current_function = previous;

    if own_stack {
        let stack = vm.pop_stack()?;
        restore_own_stack(vm, func, stack)?;
    } else {
        vm.active_stack_mut().pop_frame()?;
    }
    vm.heap.unpin(func)?;

    result
}

/// `setcreator` — `(function creator) -> function`, links a closure to
/// its lexical parent for `parent N` addressing and free-variable lookup.
pub fn set_creator(vm: &mut Vm) -> Result<EvalSignal> {
    let creator = vm.active_stack_mut().pop()?;
    let func = vm.active_stack_mut().pop()?;
    if vm.heap.flags(func)?.is_const {
        return Err(EvalError::new(EvalErrorKind::ConstViolation));
    }
    match vm.heap.get_mut(func)? {
        ObjectData::Function(f) => f.creator = Some(creator),
        other => {
            return Err(EvalError::new(EvalErrorKind::TypeMismatch {
                expected: "function".into(),
                found: other.type_name().into(),
            }));
        }
    }
    Ok(EvalSignal::Value(func))
}

/// `saveargs N` — captures the top N values of the active stack into the
/// currently-executing function's `args` vector, for closure-style
/// lexical capture.
pub fn save_args(vm: &mut Vm, n: i64) -> Result<EvalSignal> {
    let func = vm
        .current_function
        .ok_or(EvalError::new(EvalErrorKind::Other(
            "saveargs: no function is currently executing".into(),
        )))?;
    let count = n.max(0) as usize;
    let len = vm.active_stack().len();
    if count > len {
        return Err(EvalError::new(EvalErrorKind::StackUnderflow));
    }
    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        args.push(vm.active_stack_mut().pop()?);
    }
    args.reverse();
    match vm.heap.get_mut(func)? {
        ObjectData::Function(f) => f.args = args,
        other => {
            return Err(EvalError::new(EvalErrorKind::TypeMismatch {
                expected: "function".into(),
                found: other.type_name().into(),
            }));
        }
    }
    Ok(EvalSignal::Value(func))
}

/// `current` — push the function object currently executing, or a
/// pointer-kind `null` at the top level.
pub fn current(vm: &mut Vm) -> Result<EvalSignal> {
    let value = vm
        .current_function
        .unwrap_or_else(|| vm.heap.null_value(NullKind::Function));
    Ok(EvalSignal::Value(value))
}

/// `dtor` — flags the top function as a destructor; the collector runs
/// flagged destructors on whatever object they're attached to before
/// reclaiming it (§4.1).
pub fn dtor(vm: &mut Vm) -> Result<EvalSignal> {
    let func = vm.active_stack_mut().pop()?;
    match vm.heap.get_mut(func)? {
        ObjectData::Function(f) => f.is_destructor = true,
        other => {
            return Err(EvalError::new(EvalErrorKind::TypeMismatch {
                expected: "function".into(),
                found: other.type_name().into(),
            }));
        }
    }
    vm.heap.flags_mut(func)?.destructor = true;
    Ok(EvalSignal::Value(func))
}
