//! `FunctionData` — the record behind a `Function` value (§3, §4.4).

use crate::object::Object;
use crate::operation::ExpressionList;
use crate::stack::Stack;

/// A function (or closure). Lives in the heap like any other container; a
/// `Function` `Object` is a handle to one of these.
#[derive(Clone, Debug)]
pub struct FunctionData {
    pub name: Option<String>,
    pub body: ExpressionList,
    /// When set, invocation pushes `own_stack_value` onto the stack-of-
    /// stacks instead of establishing a frame on the caller's stack
    /// (§4.4 step 1).
    pub own_stack: bool,
    /// The function's private stack, present only when `own_stack` is set.
    pub own_stack_value: Option<Stack>,
    /// Lexical parent, for free-variable resolution via `parent N`
    /// (§4.4's "creator chain").
    pub creator: Option<Object>,
    /// Populated by `saveargs` for closure-style lexical capture; empty
    /// otherwise.
    pub args: Vec<Object>,
    pub locals: Vec<Object>,
    /// Set by the `dtor` opcode. Currently inert: nothing reads this flag
    /// at sweep time, mirroring the source VM's own unconsumed `FLAG_DTOR`.
    pub is_destructor: bool,
}

impl FunctionData {
    pub fn new(name: Option<String>, body: ExpressionList, own_stack: bool) -> Self {
        FunctionData {
            name,
            body,
            own_stack,
            own_stack_value: if own_stack {
                Some(Stack::new())
            } else {
                None
            },
            creator: None,
            args: Vec::new(),
            locals: Vec::new(),
            is_destructor: false,
        }
    }

    /// Copying a function clones `args`/`locals` and, if `own_stack` is
    /// set, starts the copy with a fresh empty stack rather than sharing
    /// the original's (§3: "Copying a function value clones the
    /// args/locals vectors and creates a fresh empty stack if own-stack is
    /// set").
    pub fn copy_for_value(&self) -> Self {
        FunctionData {
            name: self.name.clone(),
            body: self.body.clone(),
            own_stack: self.own_stack,
            own_stack_value: if self.own_stack {
                Some(Stack::new())
            } else {
                None
            },
            creator: self.creator,
            args: self.args.clone(),
            locals: self.locals.clone(),
            is_destructor: self.is_destructor,
        }
    }
}
