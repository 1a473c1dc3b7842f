//! Conditional chains, checkpoints, and `halt` (§4.2, §4.3).

use crate::error::{EvalError, EvalErrorKind};
use crate::exprlist::eval_expression_list;
use crate::signal::EvalSignal;
use loom_core::{ConditionalLink, ObjectData, Vm};

type Result<T> = std::result::Result<T, EvalError>;

/// `if`/`else if`/`else` (§4.2). Each link's guard is evaluated in order;
/// the first link whose guard pops `true` (or that has no guard at all —
/// a terminal `else`) has its body evaluated and becomes the result. A
/// chain with no terminal `else` and no guard matching is an error.
pub fn eval_if(vm: &mut Vm, links: &[ConditionalLink]) -> Result<EvalSignal> {
    for link in links {
        let matched = match &link.guard {
            None => true,
            Some(guard) => {
                let signal = eval_expression_list(vm, guard)?;
                match signal {
                    EvalSignal::Value(obj) => as_bool(vm, obj)?,
                    other => return Ok(other),
                }
            }
        };
        if matched {
            return eval_expression_list(vm, &link.body);
        }
    }
    Err(EvalError::new(EvalErrorKind::NoMatchingPredicate))
}

fn as_bool(vm: &Vm, obj: loom_core::Object) -> Result<bool> {
    match vm.heap.get(obj)? {
        ObjectData::Bool(b) => Ok(*b),
        other => Err(EvalError::new(EvalErrorKind::TypeMismatch {
            expected: "bool".into(),
            found: other.type_name().into(),
        })),
    }
}

/// `checkpoint` — a label node. Ordinary (non-raising) execution just
/// steps over it; it only matters as a jump target for `raise` (§4.3).
pub fn checkpoint(_vm: &mut Vm) -> Result<EvalSignal> {
    Ok(EvalSignal::ErrorLabel)
}

/// `unwind` — raise. The error payload is left on the active stack for
/// whichever checkpoint catches it; this opcode only sets the signal in
/// motion.
pub fn unwind(_vm: &mut Vm) -> Result<EvalSignal> {
    Ok(EvalSignal::RaiseRequest)
}

/// `halt N` — pops an exit code and terminates the whole program. Routed
/// through the error channel (`EvalErrorKind::Halt`) since, unlike every
/// other control-flow opcode, it is never caught by a checkpoint.
pub fn halt(vm: &mut Vm) -> Result<EvalSignal> {
    let code_obj = vm.active_stack_mut().pop()?;
    let code = match vm.heap.get(code_obj)? {
        ObjectData::Int(i) => i.to_i32().unwrap_or(0),
        _ => 0,
    };
    Err(EvalError::new(EvalErrorKind::Halt(code)))
}
