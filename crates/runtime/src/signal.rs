//! `EvalSignal` — the tagged return-channel that replaces the source VM's
//! pointer-identity sentinels (§9's suggested refactor).
//!
//! Every opcode's `eval` returns `Result<EvalSignal, EvalError>`.
//! `EvalSignal::Value` is the ordinary case (an object was produced, or no
//! object was produced but nothing unusual happened); every other variant
//! is a control-flow transfer the expression-list evaluator has to notice
//! and act on (§4.3).

use loom_core::Object;

#[derive(Clone, Copy, Debug)]
pub enum EvalSignal {
    /// Ordinary completion. `Object` is the node's result (the last node's
    /// result is what an expression list returns).
    Value(Object),
    /// Terminate the enclosing list, propagating upward.
    ExitScope,
    /// Restart the enclosing list from index 0.
    Repeat,
    /// Pop a boolean; restart if it matches `true`/`false` respectively.
    RepeatIfTrue,
    RepeatIfFalse,
    /// Adopt the VM's pending tail-call target and restart from index 0,
    /// if the enclosing list is a function body; otherwise propagate.
    TailcallRequest,
    /// A `raise` is in flight; jump to the nearest enclosing checkpoint or
    /// propagate.
    RaiseRequest,
    /// Marks the position of a `checkpoint` node; skipped silently when
    /// reached by ordinary execution.
    ErrorLabel,
    /// Terminate the list and propagate (distinct from `ExitScope`: used
    /// by `halt` unwinding all the way out, see `loom_runtime::Halt`).
    ExitRequest,
}

impl EvalSignal {
    pub fn value(self) -> Option<Object> {
        match self {
            EvalSignal::Value(obj) => Some(obj),
            _ => None,
        }
    }
}
