//! `accumulate` (§4.2): pops a function, an initial value, a count, and
//! that many collections/values, flattens them recursively through
//! array/set/projection, and folds the function across every flattened
//! element in order. `(coll_1 .. coll_n count init function) -> result`,
//! where `function` is invoked as `(elem acc) -> acc'` once per element —
//! element pushed first, accumulator on top, so non-commutative folds
//! (subtraction, string concatenation) come out in the right order.

use crate::error::{EvalError, EvalErrorKind};
use crate::function_ops::invoke_object;
use crate::signal::EvalSignal;
use loom_core::{Object, ObjectData, Projection, Vm};

type Result<T> = std::result::Result<T, EvalError>;

fn type_mismatch(found: &ObjectData) -> EvalError {
    EvalError::new(EvalErrorKind::TypeMismatch {
        expected: "array, uset, or projection".into(),
        found: found.type_name().into(),
    })
}

/// Recursively expands `obj` through nested arrays, sets, and projections,
/// pushing every non-container leaf onto `out` in order (mirrors the
/// source's `recursiveIterator`).
fn flatten(vm: &Vm, obj: Object, out: &mut Vec<Object>) -> Result<()> {
    match vm.heap.get(obj)? {
        ObjectData::Array(items) | ObjectData::UnorderedSet(items) => {
            let items = items.clone();
            for item in items {
                flatten(vm, item, out)?;
            }
        }
        ObjectData::Projection(Projection { target, start, end }) => {
            let (target, start, end) = (*target, *start, *end);
            match vm.heap.get(target)? {
                ObjectData::Array(items) => {
                    let slice = items[start..end].to_vec();
                    for item in slice {
                        flatten(vm, item, out)?;
                    }
                }
                other => return Err(type_mismatch(other)),
            }
        }
        _ => out.push(obj),
    }
    Ok(())
}

fn pop_count(vm: &mut Vm) -> Result<usize> {
    let count_obj = vm.active_stack_mut().pop()?;
    match vm.heap.get(count_obj)? {
        ObjectData::Int(i) => Ok(i.to_usize().unwrap_or(0)),
        other => Err(EvalError::new(EvalErrorKind::TypeMismatch {
            expected: "int".into(),
            found: other.type_name().into(),
        })),
    }
}

pub fn eval(vm: &mut Vm) -> Result<EvalSignal> {
    let function = vm.active_stack_mut().pop()?;
    let init = vm.active_stack_mut().pop()?;
    let count = pop_count(vm)?;

    // Collections are popped one at a time, same order as the source: the
    // one pushed last onto the stack is flattened first.
    let mut flat = Vec::new();
    for _ in 0..count {
        let coll = vm.active_stack_mut().pop()?;
        flatten(vm, coll, &mut flat)?;
    }

    let mut acc = init;
    for elem in flat {
        vm.active_stack_mut().push(elem);
        vm.active_stack_mut().push(acc);
        acc = invoke_object(vm, function)?
            .value()
            .ok_or(EvalError::new(EvalErrorKind::Other(
                "accumulate: folding function produced a control-flow signal instead of a value"
                    .into(),
            )))?;
    }
    Ok(EvalSignal::Value(acc))
}
