//! Opcode nodes — the expression tree the lexer/parser build and the
//! evaluator (in `loom-runtime`) walks.
//!
//! `Operation` only carries *data*: which opcode, its operands, and (for the
//! control-flow and function opcodes) the nested expression lists it owns.
//! Evaluating an `Operation` is `loom-runtime`'s job; this crate only needs
//! to know the shape well enough to allocate it and to let the collector's
//! mark phase walk into it (see `Heap::mark_operation`).

use crate::object::{FfiType, Object};

/// One of the literal type tags from §6's `push <type> <literal>` /
/// `cast <type>` surface.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TypeTag {
    Int,
    Float,
    String,
    Char,
    Bool,
    Object,
    Ptr,
    Umap,
    Uset,
    Array,
    Pair,
    Function,
    Exprlist,
    FfiStruct,
}

/// A literal payload attached to a `push` node. Parsed once, at parse time;
/// `push` just needs to materialize a fresh `Object` from it on every
/// evaluation (so re-entering a loop body doesn't share mutable state
/// between iterations the way reusing one `Object` handle would).
#[derive(Clone, Debug)]
pub enum Literal {
    /// Parsed once at parse time (radix auto-detection happens there); the
    /// `push` opcode just materializes a fresh `Object` from this value on
    /// every evaluation.
    Int(rug::Integer),
    Float(rug::Float),
    String(String),
    Char(char),
    Bool(bool),
    Null,
    /// `push define <name>` — looked up in the parser's define table and
    /// baked in as the resolved object at parse time (definitions are
    /// pinned and shared, never copied).
    Define(Object),
    /// A nested function literal (`function ... end`), with its own body.
    Function(Box<FunctionLiteral>),
    /// `push object <sentinel-name>` — one of the named sentinels.
    Sentinel(crate::object::SentinelKind),
}

/// The body of a `function` literal as written in source, before it becomes
/// a heap-resident `FunctionData`.
#[derive(Clone, Debug)]
pub struct FunctionLiteral {
    pub name: Option<String>,
    pub own_stack: bool,
    pub body: ExpressionList,
}

/// Addressing modes for `load`/`store` (§4.2).
#[derive(Clone, Copy, Debug)]
pub enum AddressMode {
    /// Absolute index into the active stack.
    Abs,
    /// Frame-base-relative: -1 is the first argument, 0 is the frame base
    /// cell, +1 the first local.
    Rel,
    /// Index into the root function's own stack.
    Root,
    /// Index into the N-th parent stack in the stack-of-stacks.
    Parent(u32),
    /// Index into the current function's `locals` vector (consumes the
    /// function handle from the top of stack first).
    Local,
    /// Index into the current function's `args` vector (same consuming
    /// convention as `Local`).
    Arg,
    /// Index relative to the top of the active commit.
    Commit,
    /// A bare integer-literal mode: top-relative, index must be <= 0.
    TopRelative,
}

/// Binary/unary arithmetic and comparison opcodes.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Inc,
    Dec,
    Neg,
    Not,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    And,
    Or,
    Same,
    Is,
}

/// Collection opcodes, dispatched on the top value's variant at eval time.
#[derive(Clone, Debug)]
pub enum CollOp {
    Get,
    Put,
    Append,
    Insert,
    Del,
    Contains,
    Reverse,
    Size,
    Clear,
    Projection,
    Spread,
    RSpread,
    Foreach(ExpressionList),
}

/// FFI opcodes (§6). Only the opcode contract is specified; calling-
/// convention dispatch lives in `loom-cli`'s FFI loader.
#[derive(Clone, Debug)]
pub enum FfiOp {
    /// `ffi lib <alias> <path>`
    Lib { alias: String, path: String },
    /// `ffi sym <alias> <name>`
    Sym { alias: String, name: String },
    /// `ffi call <argc> <ret-type>`
    Call { argc: u32, ret: FfiType },
    /// `ffi struct <name> <field-type>*`
    Struct {
        name: String,
        fields: Vec<(String, FfiType)>,
    },
}

#[derive(Clone, Copy, Debug)]
pub enum ClearKind {
    Stack,
    Frame,
}

/// One `(guard) { body }` link of an `if`/`else if`/`else` chain.
/// `guard == None` marks the unconditional terminal link (a plain `else`).
#[derive(Clone, Debug)]
pub struct ConditionalLink {
    pub guard: Option<ExpressionList>,
    pub body: ExpressionList,
}

/// An opcode node.
#[derive(Clone, Debug)]
pub enum Operation {
    // --- stack manipulation ---
    Push(TypeTag, Literal),
    Pop(i64),
    Remove(i64),
    Dup,
    Copy,
    Swap,
    Lift(i64),
    Sink(i64),
    Squash(i64),
    Reserve(i64),
    Clear(ClearKind),
    StackSize,

    // --- addressing ---
    Load(AddressMode, i64),
    Store(AddressMode, i64),
    Commit,
    CommitIndex,
    Revert,

    // --- arithmetic & logic ---
    Arith(ArithOp),
    Accumulate,

    // --- collections ---
    Coll(CollOp),

    // --- control flow ---
    If(Vec<ConditionalLink>),
    Invoke,
    InvokeTail,
    Unwind,
    Checkpoint,
    Halt,

    // --- functions ---
    SetCreator,
    SaveArgs,
    Current,
    Dtor,

    // --- casts ---
    Cast(TypeTag),

    // --- numerics config ---
    SetPrecision,
    SetEpsilon,

    // --- ffi ---
    Ffi(FfiOp),

    // --- misc ---
    Define(String, TypeTag, Literal),
    PushDefine(String),
    Nop,
    Module(String),
    /// `dump` optionally carries an inline operand to evaluate first,
    /// printing its result without disturbing the surrounding stack
    /// (mirrors the mark phase's mention of "dump-with-operand" as an
    /// op that owns a sub-expression).
    Dump(Option<Box<Operation>>),
    Assert,
    Gc,
}

/// An ordered list of opcode nodes with checkpoint/trampoline bookkeeping
/// (§4.3).
#[derive(Clone, Debug, Default)]
pub struct ExpressionList {
    pub ops: Vec<Operation>,
    /// Index of the `checkpoint` node in `ops`, if this list is
    /// checkpointed (§3: "An expression list with a non-negative
    /// `error-label-index` is a checkpointed scope").
    pub error_label_index: Option<usize>,
    /// True when this list is directly a function body — only then does a
    /// `tailcall-request` get trampolined here rather than propagated.
    pub is_function_body: bool,
    /// A unique identity for this list, used as half of the debug-info
    /// site key (`(list_id, node_index)`).
    pub id: u64,
}

impl ExpressionList {
    pub fn new(id: u64) -> Self {
        ExpressionList {
            ops: Vec::new(),
            error_label_index: None,
            is_function_body: false,
            id,
        }
    }
}
