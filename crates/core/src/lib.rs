//! loom-core: the value model, garbage collector, and stack subsystem
//! shared by the loom compiler, runtime, and CLI.
//!
//! # Modules
//!
//! - `handle`: opaque arena references.
//! - `object`: the `Object`/`ObjectData` value model.
//! - `operation`: opcode nodes (the expression tree).
//! - `function`: `FunctionData`, the record behind a `Function` value.
//! - `heap`: the mark-sweep collector.
//! - `stack`: per-invocation value stacks with frames and commits.
//! - `vm`: the root function, stack-of-stacks, and per-VM evaluation state.
//! - `process`: process-wide, read-mostly state (file index, debug info,
//!   FFI registry, default precision, trace level).
//! - `numeric`: bignum float equality and literal-parsing helpers.

pub mod function;
pub mod handle;
pub mod heap;
pub mod numeric;
pub mod object;
pub mod operation;
pub mod process;
pub mod stack;
pub mod vm;

pub use function::FunctionData;
pub use handle::Handle;
pub use heap::{Heap, HeapError};
pub use object::{
    FfiFieldDescriptor, FfiStructDescriptor, FfiSymbolHandle, FfiType, Flags, NullKind, Object,
    ObjectData, Projection, SentinelKind,
};
pub use operation::{
    AddressMode, ArithOp, ClearKind, CollOp, ConditionalLink, ExpressionList, FfiOp,
    FunctionLiteral, Literal, Operation, TypeTag,
};
pub use process::{ProcessState, SiteKey, SourceLocation};
pub use stack::{Stack, StackError};
pub use vm::{Vm, VmError, DEFAULT_EPSILON, DEFAULT_FLOAT_PRECISION};
