//! Arithmetic, comparison, and identity opcodes (§4.2).
//!
//! Mixed int/float operands are a hard error (§3: "arithmetic between an
//! `int` and a `float` requires an explicit `cast`; the VM never performs
//! implicit numeric promotion").

use crate::error::{EvalError, EvalErrorKind};
use crate::signal::EvalSignal;
use loom_core::{ArithOp, ObjectData, Vm};
use std::cmp::Ordering;

type Result<T> = std::result::Result<T, EvalError>;

#[derive(Clone)]
enum Num {
    Int(rug::Integer),
    Float(rug::Float),
}

fn as_num(data: &ObjectData) -> Result<Num> {
    match data {
        ObjectData::Int(i) => Ok(Num::Int(i.clone())),
        ObjectData::Float(f) => Ok(Num::Float(f.clone())),
        other => Err(EvalError::new(EvalErrorKind::TypeMismatch {
            expected: "numeric".into(),
            found: other.type_name().into(),
        })),
    }
}

fn binary_numeric(vm: &mut Vm, op: ArithOp) -> Result<EvalSignal> {
    let rhs = vm.active_stack_mut().pop()?;
    let lhs = vm.active_stack_mut().pop()?;
    let lnum = as_num(vm.heap.get(lhs)?)?;
    let rnum = as_num(vm.heap.get(rhs)?)?;

    let result = match (lnum, rnum) {
        (Num::Int(a), Num::Int(b)) => Num::Int(apply_int(op, a, b)?),
        (Num::Float(a), Num::Float(b)) => Num::Float(apply_float(op, a, b)?),
        _ => return Err(EvalError::new(EvalErrorKind::MixedNumericTypes)),
    };
    let obj = match result {
        Num::Int(i) => vm.heap.make_int(i),
        Num::Float(f) => {
            let obj = vm.heap.alloc(ObjectData::Float(f));
            vm.heap.track(obj)?;
            obj
        }
    };
    Ok(EvalSignal::Value(obj))
}

fn apply_int(op: ArithOp, a: rug::Integer, b: rug::Integer) -> Result<rug::Integer> {
    Ok(match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div => {
            if b == 0 {
                return Err(EvalError::new(EvalErrorKind::DivisionByZero));
            }
            a / b
        }
        _ => unreachable!("apply_int only called for binary arithmetic ops"),
    })
}

fn apply_float(op: ArithOp, a: rug::Float, b: rug::Float) -> Result<rug::Float> {
    Ok(match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div => {
            if b.is_zero() {
                return Err(EvalError::new(EvalErrorKind::DivisionByZero));
            }
            a / b
        }
        _ => unreachable!("apply_float only called for binary arithmetic ops"),
    })
}

fn unary_numeric(vm: &mut Vm, op: ArithOp) -> Result<EvalSignal> {
    let top = vm.active_stack_mut().pop()?;
    let num = as_num(vm.heap.get(top)?)?;
    let result = match (op, num) {
        (ArithOp::Inc, Num::Int(i)) => Num::Int(i + 1),
        (ArithOp::Inc, Num::Float(f)) => Num::Float(f + 1),
        (ArithOp::Dec, Num::Int(i)) => Num::Int(i - 1),
        (ArithOp::Dec, Num::Float(f)) => Num::Float(f - 1),
        (ArithOp::Neg, Num::Int(i)) => Num::Int(-i),
        (ArithOp::Neg, Num::Float(f)) => Num::Float(-f),
        _ => {
            return Err(EvalError::new(EvalErrorKind::Other(
                "unary_numeric: unsupported opcode".into(),
            )));
        }
    };
    let obj = match result {
        Num::Int(i) => vm.heap.make_int(i),
        Num::Float(f) => {
            let obj = vm.heap.alloc(ObjectData::Float(f));
            vm.heap.track(obj)?;
            obj
        }
    };
    Ok(EvalSignal::Value(obj))
}

fn compare_numeric(vm: &mut Vm, op: ArithOp) -> Result<EvalSignal> {
    let rhs = vm.active_stack_mut().pop()?;
    let lhs = vm.active_stack_mut().pop()?;
    let lnum = as_num(vm.heap.get(lhs)?)?;
    let rnum = as_num(vm.heap.get(rhs)?)?;

    let ordering = match (lnum, rnum) {
        (Num::Int(a), Num::Int(b)) => a.cmp(&b),
        (Num::Float(a), Num::Float(b)) => {
            if loom_core::numeric::float_approx_eq(&a, &b, vm.float_epsilon) {
                Ordering::Equal
            } else {
                a.partial_cmp(&b).unwrap_or(Ordering::Equal)
            }
        }
        _ => return Err(EvalError::new(EvalErrorKind::MixedNumericTypes)),
    };
    let result = match op {
        ArithOp::Lt => ordering == Ordering::Less,
        ArithOp::Gt => ordering == Ordering::Greater,
        ArithOp::Le => ordering != Ordering::Greater,
        ArithOp::Ge => ordering != Ordering::Less,
        ArithOp::Eq => ordering == Ordering::Equal,
        ArithOp::Ne => ordering != Ordering::Equal,
        _ => unreachable!("compare_numeric only called for comparison ops"),
    };
    Ok(EvalSignal::Value(vm.heap.bool_value(result)))
}

fn logical_binary(vm: &mut Vm, op: ArithOp) -> Result<EvalSignal> {
    let rhs = vm.active_stack_mut().pop()?;
    let lhs = vm.active_stack_mut().pop()?;
    let a = as_bool(vm, lhs)?;
    let b = as_bool(vm, rhs)?;
    let result = match op {
        ArithOp::And => a && b,
        ArithOp::Or => a || b,
        _ => unreachable!("logical_binary only called for and/or"),
    };
    Ok(EvalSignal::Value(vm.heap.bool_value(result)))
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

fn not(vm: &mut Vm) -> Result<EvalSignal> {
    let top = vm.active_stack_mut().pop()?;
    let b = as_bool(vm, top)?;
    Ok(EvalSignal::Value(vm.heap.bool_value(!b)))
}

/// `same` — pointer-identity comparison (§3: "pointer equality for
/// singleton-shared values doubles as value equality for small ints, bool,
/// and null").
fn same(vm: &mut Vm) -> Result<EvalSignal> {
    let rhs = vm.active_stack_mut().pop()?;
    let lhs = vm.active_stack_mut().pop()?;
    Ok(EvalSignal::Value(vm.heap.bool_value(lhs == rhs)))
}

/// `is` — structural/runtime-type check: pops a type-tag operand pushed
/// just before it and reports whether the value beneath matches.
fn is(vm: &mut Vm) -> Result<EvalSignal> {
    let tag_obj = vm.active_stack_mut().pop()?;
    let value_obj = vm.active_stack_mut().pop()?;
    let tag_name = match vm.heap.get(tag_obj)? {
        ObjectData::Symbol(s) | ObjectData::String(s) => s.clone(),
        other => {
            return Err(EvalError::new(EvalErrorKind::TypeMismatch {
                expected: "symbol".into(),
                found: other.type_name().into(),
            }));
        }
    };
    let actual = vm.heap.get(value_obj)?.type_name();
    Ok(EvalSignal::Value(vm.heap.bool_value(actual == tag_name)))
}

pub fn eval(vm: &mut Vm, op: ArithOp) -> Result<EvalSignal> {
    match op {
        ArithOp::Add | ArithOp::Sub | ArithOp::Mul | ArithOp::Div => binary_numeric(vm, op),
        ArithOp::Inc | ArithOp::Dec | ArithOp::Neg => unary_numeric(vm, op),
        ArithOp::Not => not(vm),
        ArithOp::Lt | ArithOp::Gt | ArithOp::Le | ArithOp::Ge | ArithOp::Eq | ArithOp::Ne => {
            compare_numeric(vm, op)
        }
        ArithOp::And | ArithOp::Or => logical_binary(vm, op),
        ArithOp::Same => same(vm),
        ArithOp::Is => is(vm),
    }
}
