//! The expression-list evaluator (§4.3): walks one `ExpressionList`'s
//! nodes in order, reacting to the control-flow signals its nodes can
//! produce instead of just returning a value.

use crate::error::{EvalError, EvalErrorKind};
use crate::function_ops::function_body;
use crate::op::eval_operation;
use crate::signal::EvalSignal;
use loom_core::{ExpressionList, NullKind, ObjectData, ProcessState, Vm};
use tracing::{debug, trace};

type Result<T> = std::result::Result<T, EvalError>;

/// Evaluate every node of `list` in order, honoring `repeat`,
/// `repeat-if-true`, `repeat-if-false`, and `raise`/`checkpoint` along the
/// way (§4.3). A `tailcall-request` reaching a function-body list is
/// consumed right here: the pending target's body is adopted as the list
/// being walked and evaluation restarts at index 0 in place, without
/// returning to the caller — the single frame/pin established around the
/// *original* call (§4.4 steps 1-2) covers every bounce. A non-function-body
/// list (an `if` branch, a `foreach` body, ...) just propagates the signal
/// up so the enclosing function body can adopt it instead.
///
/// Returns the last node's value, or whatever terminal signal escaped the
/// list.
pub fn eval_expression_list(vm: &mut Vm, list: &ExpressionList) -> Result<EvalSignal> {
    let mut current = list.clone();
    let mut last = vm.heap.null_value(NullKind::Pointer);
    let mut index = 0usize;
    let mut bounces: u64 = 0;

    loop {
        if index >= current.ops.len() {
            return Ok(EvalSignal::Value(last));
        }

        if ProcessState::trace_level() > 0 {
            trace!(list = current.id, index, op = ?current.ops[index], "eval op");
            if ProcessState::trace_stack() {
                let depth = vm.active_stack().len();
                trace!(depth, "active stack depth");
            }
        }

        let result = match eval_operation(vm, &current.ops[index]) {
            Ok(signal) => signal,
            Err(e) => return Err(e.enrich(debug_location(&current, index))),
        };

        match result {
            EvalSignal::Value(obj) => {
                last = obj;
                index += 1;
            }
            EvalSignal::ErrorLabel => {
                // A `checkpoint` node reached by ordinary flow is just a
                // label; step over it.
                index += 1;
            }
            EvalSignal::Repeat => {
                index = 0;
            }
            EvalSignal::RepeatIfTrue | EvalSignal::RepeatIfFalse => {
                let cond = vm.active_stack_mut().pop()?;
                let matches_true = matches!(result, EvalSignal::RepeatIfTrue);
                let value = match vm.heap.get(cond)? {
                    ObjectData::Bool(b) => *b,
                    _ => false,
                };
                if value == matches_true {
                    index = 0;
                } else {
                    index += 1;
                }
            }
            EvalSignal::TailcallRequest if current.is_function_body => {
                let target = vm.pending_tailcall.take().ok_or(EvalError::new(
                    EvalErrorKind::Other("invoke-tail: no pending tailcall target".into()),
                ))?;
                let (body, _own_stack) = function_body(vm, target)?;
                current = body;
                index = 0;
                bounces += 1;
                if ProcessState::trace_level() >= 2 {
                    debug!(bounces, "tailcall trampoline bounce");
                }
            }
            EvalSignal::RaiseRequest => {
                if let Some(checkpoint_index) = current.error_label_index {
                    index = checkpoint_index;
                } else {
                    return Ok(EvalSignal::RaiseRequest);
                }
            }
            other @ (EvalSignal::ExitScope
            | EvalSignal::TailcallRequest
            | EvalSignal::ExitRequest) => {
                return Ok(other);
            }
        }
    }
}

fn debug_location(
    list: &ExpressionList,
    index: usize,
) -> loom_core::SourceLocation {
    loom_core::ProcessState::debug_info(loom_core::SiteKey {
        list_id: list.id,
        node_index: index,
    })
    .unwrap_or(loom_core::SourceLocation {
        file_index: 0,
        line: 0,
        column: 0,
    })
}
