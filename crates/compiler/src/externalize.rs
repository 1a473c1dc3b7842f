//! Canonical text re-emission (§4.8): turns a parsed [`ExpressionList`] back
//! into loom source. `parse(externalize(parse(src)))` is a fixed point —
//! externalizing never needs to reproduce the original formatting, only an
//! equivalent program the parser accepts and re-parses to the same tree.

use loom_core::{
    AddressMode, ArithOp, ClearKind, CollOp, ConditionalLink, ExpressionList, FfiOp, FfiType,
    Literal, Operation, SentinelKind, TypeTag,
};
use std::fmt::Write;

pub fn externalize(list: &ExpressionList) -> String {
    let mut out = String::new();
    write_list(&mut out, list, 0);
    out
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn write_list(out: &mut String, list: &ExpressionList, depth: usize) {
    // `error_label_index` always points at the `Operation::Checkpoint` node
    // already in `ops` (the parser sets both together), so no separate
    // handling is needed here beyond that node's own `write_op` arm.
    for op in &list.ops {
        indent(out, depth);
        write_op(out, op, depth);
        out.push('\n');
    }
}

fn write_op(out: &mut String, op: &Operation, depth: usize) {
    match op {
        Operation::Push(tag, literal) => {
            // A resolved `push define NAME` has no name to round-trip to
            // (the define table only exists at parse time); it externalizes
            // as the equivalent `push <tag> null` instead.
            write!(out, "push {} {}", type_tag_text(*tag), literal_text(literal, depth)).unwrap();
        }
        Operation::Pop(n) => write!(out, "pop {n}").unwrap(),
        Operation::Remove(n) => write!(out, "remove {n}").unwrap(),
        Operation::Dup => out.push_str("dup"),
        Operation::Copy => out.push_str("copy"),
        Operation::Swap => out.push_str("swap"),
        Operation::Lift(n) => write!(out, "lift {n}").unwrap(),
        Operation::Sink(n) => write!(out, "sink {n}").unwrap(),
        Operation::Squash(n) => write!(out, "squash {n}").unwrap(),
        Operation::Reserve(n) => write!(out, "reserve {n}").unwrap(),
        Operation::Clear(ClearKind::Stack) => out.push_str("clear"),
        Operation::Clear(ClearKind::Frame) => out.push_str("clear frame"),
        Operation::StackSize => out.push_str("size"),

        Operation::Load(mode, idx) => write!(out, "load {}", address_text(*mode, *idx)).unwrap(),
        Operation::Store(mode, idx) => write!(out, "store {}", address_text(*mode, *idx)).unwrap(),
        Operation::Commit => out.push_str("commit"),
        Operation::CommitIndex => out.push_str("commitindex"),
        Operation::Revert => out.push_str("revert"),

        Operation::Arith(kind) => out.push_str(arith_text(*kind)),
        Operation::Accumulate => out.push_str("accumulate"),

        Operation::Coll(kind) => write_coll(out, kind, depth),

        Operation::If(links) => write_if(out, links, depth),
        Operation::Invoke => out.push_str("invoke"),
        Operation::InvokeTail => out.push_str("invoke tail"),
        Operation::Unwind => out.push_str("unwind"),
        Operation::Checkpoint => out.push_str("checkpoint"),
        Operation::Halt => out.push_str("halt"),

        Operation::SetCreator => out.push_str("setcreator"),
        Operation::SaveArgs => out.push_str("saveargs"),
        Operation::Current => out.push_str("current"),
        Operation::Dtor => out.push_str("dtor"),

        Operation::Cast(tag) => write!(out, "cast {}", type_tag_text(*tag)).unwrap(),

        Operation::SetPrecision => out.push_str("precision"),
        Operation::SetEpsilon => out.push_str("epsilon"),

        Operation::Ffi(kind) => write_ffi(out, kind),

        Operation::Define(name, tag, literal) => {
            write!(out, "define {name} {} {}", type_tag_text(*tag), literal_text(literal, depth)).unwrap();
        }
        Operation::PushDefine(name) => write!(out, "push define {name}").unwrap(),
        Operation::Nop => out.push_str("nop"),
        Operation::Module(name) => write!(out, "module {}", quote(name)).unwrap(),
        Operation::Dump(None) => out.push_str("dump"),
        Operation::Dump(Some(inner)) => {
            out.push_str("dump (");
            write_op(out, inner, depth);
            out.push(')');
        }
        Operation::Assert => out.push_str("assert"),
        Operation::Gc => out.push_str("gc"),
    }
}

fn write_if(out: &mut String, links: &[ConditionalLink], depth: usize) {
    for (i, link) in links.iter().enumerate() {
        match (&link.guard, i) {
            (Some(guard), 0) => {
                out.push_str("if (");
                write_inline_list(out, guard);
                out.push_str(") {\n");
            }
            (Some(guard), _) => {
                out.push_str("\n");
                indent(out, depth);
                out.push_str("else if (");
                write_inline_list(out, guard);
                out.push_str(") {\n");
            }
            (None, _) => {
                out.push('\n');
                indent(out, depth);
                out.push_str("else {\n");
            }
        }
        write_list(out, &link.body, depth + 1);
        indent(out, depth);
        out.push('}');
    }
}

/// Guards are short boolean expressions; keep them on one line rather than
/// indenting a whole nested block for a handful of stack ops.
fn write_inline_list(out: &mut String, list: &ExpressionList) {
    let mut parts = Vec::with_capacity(list.ops.len());
    for op in &list.ops {
        let mut piece = String::new();
        write_op(&mut piece, op, 0);
        parts.push(piece);
    }
    out.push_str(&parts.join("; "));
}

fn write_coll(out: &mut String, kind: &CollOp, depth: usize) {
    match kind {
        CollOp::Get => out.push_str("coll get"),
        CollOp::Put => out.push_str("coll put"),
        CollOp::Append => out.push_str("coll append"),
        CollOp::Insert => out.push_str("coll insert"),
        CollOp::Del => out.push_str("coll del"),
        CollOp::Contains => out.push_str("coll contains"),
        CollOp::Reverse => out.push_str("coll reverse"),
        CollOp::Size => out.push_str("coll size"),
        CollOp::Clear => out.push_str("coll clear"),
        CollOp::Projection => out.push_str("coll projection"),
        CollOp::Spread => out.push_str("coll spread"),
        CollOp::RSpread => out.push_str("coll rspread"),
        CollOp::Foreach(body) => {
            out.push_str("coll foreach {\n");
            write_list(out, body, depth + 1);
            indent(out, depth);
            out.push('}');
        }
    }
}

fn write_ffi(out: &mut String, kind: &FfiOp) {
    match kind {
        FfiOp::Lib { alias, path } => write!(out, "ffi lib {alias} {}", quote(path)).unwrap(),
        FfiOp::Sym { alias, name } => write!(out, "ffi sym {alias} {name}").unwrap(),
        FfiOp::Call { argc, ret } => write!(out, "ffi call {argc} {}", ffi_type_text(*ret)).unwrap(),
        FfiOp::Struct { name, fields } => {
            write!(out, "ffi struct {name}").unwrap();
            for (fname, fty) in fields {
                write!(out, " {fname} {}", ffi_type_text(*fty)).unwrap();
            }
        }
    }
}

fn type_tag_text(tag: TypeTag) -> &'static str {
    match tag {
        TypeTag::Int => "int",
        TypeTag::Float => "float",
        TypeTag::String => "string",
        TypeTag::Char => "char",
        TypeTag::Bool => "bool",
        TypeTag::Object => "object",
        TypeTag::Ptr => "ptr",
        TypeTag::Umap => "umap",
        TypeTag::Uset => "uset",
        TypeTag::Array => "array",
        TypeTag::Pair => "pair",
        TypeTag::Function => "function",
        TypeTag::Exprlist => "exprlist",
        TypeTag::FfiStruct => "ffi-struct",
    }
}

fn arith_text(kind: ArithOp) -> &'static str {
    match kind {
        ArithOp::Add => "add",
        ArithOp::Sub => "sub",
        ArithOp::Mul => "mul",
        ArithOp::Div => "div",
        ArithOp::Inc => "inc",
        ArithOp::Dec => "dec",
        ArithOp::Neg => "neg",
        ArithOp::Not => "not",
        ArithOp::Lt => "lt",
        ArithOp::Gt => "gt",
        ArithOp::Le => "le",
        ArithOp::Ge => "ge",
        ArithOp::Eq => "eq",
        ArithOp::Ne => "ne",
        ArithOp::And => "and",
        ArithOp::Or => "or",
        ArithOp::Same => "same",
        ArithOp::Is => "is",
    }
}

fn address_text(mode: AddressMode, idx: i64) -> String {
    match mode {
        AddressMode::Abs => format!("abs {idx}"),
        AddressMode::Rel => format!("rel {idx}"),
        AddressMode::Root => format!("root {idx}"),
        AddressMode::Parent(n) => format!("parent {n} {idx}"),
        AddressMode::Local => format!("local {idx}"),
        AddressMode::Arg => format!("arg {idx}"),
        AddressMode::Commit => format!("commit {idx}"),
        AddressMode::TopRelative => format!("{idx}"),
    }
}

fn ffi_type_text(ty: FfiType) -> &'static str {
    match ty {
        FfiType::Void => "_void",
        FfiType::U8 => "_uint8",
        FfiType::U16 => "_uint16",
        FfiType::U32 => "_uint32",
        FfiType::U64 => "_uint64",
        FfiType::I8 => "_sint8",
        FfiType::I16 => "_sint16",
        FfiType::I32 => "_sint32",
        FfiType::I64 => "_sint64",
        FfiType::UChar => "_uchar",
        FfiType::UShort => "_ushort",
        FfiType::UInt => "_uint",
        FfiType::ULong => "_ulong",
        FfiType::SChar => "_schar",
        FfiType::SShort => "_sshort",
        FfiType::SInt => "_sint",
        FfiType::SLong => "_slong",
        FfiType::F32 => "_float",
        FfiType::F64 => "_double",
        FfiType::Ptr => "_ptr",
    }
}

fn sentinel_text(kind: SentinelKind) -> &'static str {
    match kind {
        SentinelKind::ExitScope => "exit-scope",
        SentinelKind::Repeat => "repeat",
        SentinelKind::RepeatIfTrue => "repeat-if-true",
        SentinelKind::RepeatIfFalse => "repeat-if-false",
        SentinelKind::TailcallRequest => "tailcall-request",
        SentinelKind::ExitRequest => "exit-request",
        SentinelKind::RaiseRequest => "raise-request",
        SentinelKind::ErrorLabel => "error-label",
    }
}

fn literal_text(literal: &Literal, depth: usize) -> String {
    match literal {
        Literal::Int(n) => n.to_string(),
        Literal::Float(f) => f.to_string(),
        Literal::String(s) => quote(s),
        Literal::Char(c) => format!("'{c}'"),
        Literal::Bool(b) => b.to_string(),
        Literal::Null => "null".to_string(),
        Literal::Define(_) => "null".to_string(),
        Literal::Sentinel(kind) => sentinel_text(*kind).to_string(),
        Literal::Function(lit) => {
            let mut s = String::new();
            if let Some(name) = &lit.name {
                write!(s, "{name} ").unwrap();
            }
            if lit.own_stack {
                s.push_str("withstack ");
            }
            s.push_str("{\n");
            write_list(&mut s, &lit.body, depth + 1);
            indent(&mut s, depth);
            s.push('}');
            s
        }
    }
}

fn quote(s: &str) -> String {
    format!("\"{s}\"")
}
