//! Collection opcodes (§4.2): dispatched on the top value's runtime variant
//! across `pair array umap uset string projection`.

use crate::error::{EvalError, EvalErrorKind};
use crate::exprlist::eval_expression_list;
use crate::signal::EvalSignal;
use loom_core::{CollOp, ExpressionList, NullKind, Object, ObjectData, Projection, Vm};

type Result<T> = std::result::Result<T, EvalError>;

fn type_mismatch(found: &ObjectData) -> EvalError {
    EvalError::new(EvalErrorKind::TypeMismatch {
        expected: "collection".into(),
        found: found.type_name().into(),
    })
}

pub fn eval(vm: &mut Vm, op: &CollOp) -> Result<EvalSignal> {
    match op {
        CollOp::Get => get(vm),
        CollOp::Put => put(vm),
        CollOp::Append => append(vm),
        CollOp::Insert => insert(vm),
        CollOp::Del => del(vm),
        CollOp::Contains => contains(vm),
        CollOp::Reverse => reverse(vm),
        CollOp::Size => size(vm),
        CollOp::Clear => clear(vm),
        CollOp::Projection => projection(vm),
        CollOp::Spread => spread(vm),
        CollOp::RSpread => rspread(vm),
        CollOp::Foreach(body) => foreach(vm, body),
    }
}

fn require_not_const(vm: &Vm, obj: Object) -> Result<()> {
    if vm.heap.flags(obj)?.is_const {
        return Err(EvalError::new(EvalErrorKind::ConstViolation));
    }
    Ok(())
}

fn resolve_map_entry<'a>(entries: &'a [(Object, Object)], vm: &Vm, key: Object) -> Option<usize> {
    entries
        .iter()
        .position(|(k, _)| keys_equal(vm, *k, key))
}

fn keys_equal(vm: &Vm, a: Object, b: Object) -> bool {
    if a == b {
        return true;
    }
    match (vm.heap.get(a), vm.heap.get(b)) {
        (Ok(ObjectData::String(x)), Ok(ObjectData::String(y))) => x == y,
        (Ok(ObjectData::Symbol(x)), Ok(ObjectData::Symbol(y))) => x == y,
        (Ok(ObjectData::Int(x)), Ok(ObjectData::Int(y))) => x == y,
        (Ok(ObjectData::Char(x)), Ok(ObjectData::Char(y))) => x == y,
        _ => false,
    }
}

/// `get` — `(coll key|index) -> value`. For `pair`, index 0/1 select
/// first/second.
fn get(vm: &mut Vm) -> Result<EvalSignal> {
    let key = vm.active_stack_mut().pop()?;
    let coll = vm.active_stack_mut().pop()?;
    let value = match vm.heap.get(coll)? {
        ObjectData::Pair(a, b) => {
            let (a, b) = (*a, *b);
            let idx = int_index(vm, key)?;
            match idx {
                0 => a,
                1 => b,
                _ => return Err(EvalError::new(EvalErrorKind::IndexOutOfRange { index: idx })),
            }
        }
        ObjectData::Array(items) => {
            let idx = int_index(vm, key)?;
            *items
                .get(idx.max(0) as usize)
                .filter(|_| idx >= 0)
                .ok_or(EvalError::new(EvalErrorKind::IndexOutOfRange { index: idx }))?
        }
        ObjectData::UnorderedMap(entries) => {
            let entries = entries.clone();
            match resolve_map_entry(&entries, vm, key) {
                Some(i) => entries[i].1,
                None => vm.heap.null_value(NullKind::MapOrSet),
            }
        }
        ObjectData::String(s) => {
            let idx = int_index(vm, key)?;
            let ch = s
                .chars()
                .nth(idx.max(0) as usize)
                .filter(|_| idx >= 0)
                .ok_or(EvalError::new(EvalErrorKind::IndexOutOfRange { index: idx }))?;
            let obj = vm.heap.alloc(ObjectData::Char(ch));
            vm.heap.track(obj)?;
            obj
        }
        ObjectData::Projection(p) => {
            let (target, start, end) = (p.target, p.start, p.end);
            let idx = int_index(vm, key)?;
            let abs = start as i64 + idx;
            if abs < start as i64 || abs >= end as i64 {
                return Err(EvalError::new(EvalErrorKind::IndexOutOfRange { index: idx }));
            }
            match vm.heap.get(target)? {
                ObjectData::Array(items) => items[abs as usize],
                other => return Err(type_mismatch(other)),
            }
        }
        other => return Err(type_mismatch(other)),
    };
    Ok(EvalSignal::Value(value))
}

fn int_index(vm: &Vm, obj: Object) -> Result<i64> {
    match vm.heap.get(obj)? {
        ObjectData::Int(i) => i
            .to_i64()
            .ok_or(EvalError::new(EvalErrorKind::Other("index too large".into()))),
        other => Err(EvalError::new(EvalErrorKind::TypeMismatch {
            expected: "int".into(),
            found: other.type_name().into(),
        })),
    }
}

enum PutPlan {
    Pair(i64),
    Array(i64),
    Map(Option<usize>),
}

/// `put` — `(coll key|index value) -> coll`, mutates in place.
///
/// The match key/index is resolved against an immutable read of `coll`
/// first, then applied via a second, mutable lookup — `resolve_map_entry`
/// needs `&Vm` to compare keys structurally, which would conflict with an
/// already-mutable borrow of the same heap slot.
fn put(vm: &mut Vm) -> Result<EvalSignal> {
    let value = vm.active_stack_mut().pop()?;
    let key = vm.active_stack_mut().pop()?;
    let coll = vm.active_stack_mut().pop()?;
    require_not_const(vm, coll)?;

    let plan = match vm.heap.get(coll)? {
        ObjectData::Pair(..) => PutPlan::Pair(int_index(vm, key)?),
        ObjectData::Array(_) => PutPlan::Array(int_index(vm, key)?),
        ObjectData::UnorderedMap(entries) => PutPlan::Map(resolve_map_entry(entries, vm, key)),
        other => return Err(type_mismatch(other)),
    };

    match (plan, vm.heap.get_mut(coll)?) {
        (PutPlan::Pair(idx), ObjectData::Pair(a, b)) => match idx {
            0 => *a = value,
            1 => *b = value,
            _ => return Err(EvalError::new(EvalErrorKind::IndexOutOfRange { index: idx })),
        },
        (PutPlan::Array(idx), ObjectData::Array(items)) => {
            let slot = items
                .get_mut(idx.max(0) as usize)
                .filter(|_| idx >= 0)
                .ok_or(EvalError::new(EvalErrorKind::IndexOutOfRange { index: idx }))?;
            *slot = value;
        }
        (PutPlan::Map(Some(i)), ObjectData::UnorderedMap(entries)) => entries[i].1 = value,
        (PutPlan::Map(None), ObjectData::UnorderedMap(entries)) => entries.push((key, value)),
        _ => unreachable!("plan was computed from this same object's variant"),
    }
    Ok(EvalSignal::Value(coll))
}

enum AppendPlan {
    Array,
    SetInsert(bool),
}

/// `append` — push a value onto an array, or insert into a set if absent.
fn append(vm: &mut Vm) -> Result<EvalSignal> {
    let value = vm.active_stack_mut().pop()?;
    let coll = vm.active_stack_mut().pop()?;
    require_not_const(vm, coll)?;

    let plan = match vm.heap.get(coll)? {
        ObjectData::Array(_) => AppendPlan::Array,
        ObjectData::UnorderedSet(items) => {
            AppendPlan::SetInsert(!items.iter().any(|i| keys_equal(vm, *i, value)))
        }
        other => return Err(type_mismatch(other)),
    };

    match (plan, vm.heap.get_mut(coll)?) {
        (AppendPlan::Array, ObjectData::Array(items)) => items.push(value),
        (AppendPlan::SetInsert(should_insert), ObjectData::UnorderedSet(items)) => {
            if should_insert {
                items.push(value);
            }
        }
        _ => unreachable!("plan was computed from this same object's variant"),
    }
    Ok(EvalSignal::Value(coll))
}

/// `insert` — `(coll index value) -> coll`, shifting later elements right.
fn insert(vm: &mut Vm) -> Result<EvalSignal> {
    let value = vm.active_stack_mut().pop()?;
    let idx_obj = vm.active_stack_mut().pop()?;
    let coll = vm.active_stack_mut().pop()?;
    require_not_const(vm, coll)?;
    let idx = int_index(vm, idx_obj)?;
    match vm.heap.get_mut(coll)? {
        ObjectData::Array(items) => {
            if idx < 0 || idx as usize > items.len() {
                return Err(EvalError::new(EvalErrorKind::IndexOutOfRange { index: idx }));
            }
            items.insert(idx as usize, value);
        }
        other => return Err(type_mismatch(other)),
    }
    Ok(EvalSignal::Value(coll))
}

enum DelPlan {
    Array(i64),
    Map(Option<usize>),
    Set(Option<usize>),
}

/// `del` — remove a key/index from a collection.
fn del(vm: &mut Vm) -> Result<EvalSignal> {
    let key = vm.active_stack_mut().pop()?;
    let coll = vm.active_stack_mut().pop()?;
    require_not_const(vm, coll)?;

    let plan = match vm.heap.get(coll)? {
        ObjectData::Array(_) => DelPlan::Array(int_index(vm, key)?),
        ObjectData::UnorderedMap(entries) => DelPlan::Map(resolve_map_entry(entries, vm, key)),
        ObjectData::UnorderedSet(items) => {
            DelPlan::Set(items.iter().position(|i| keys_equal(vm, *i, key)))
        }
        other => return Err(type_mismatch(other)),
    };

    match (plan, vm.heap.get_mut(coll)?) {
        (DelPlan::Array(idx), ObjectData::Array(items)) => {
            if idx < 0 || idx as usize >= items.len() {
                return Err(EvalError::new(EvalErrorKind::IndexOutOfRange { index: idx }));
            }
            items.remove(idx as usize);
        }
        (DelPlan::Map(Some(i)), ObjectData::UnorderedMap(entries)) => {
            entries.remove(i);
        }
        (DelPlan::Map(None), ObjectData::UnorderedMap(_)) => {}
        (DelPlan::Set(Some(i)), ObjectData::UnorderedSet(items)) => {
            items.remove(i);
        }
        (DelPlan::Set(None), ObjectData::UnorderedSet(_)) => {}
        _ => unreachable!("plan was computed from this same object's variant"),
    }
    Ok(EvalSignal::Value(coll))
}

fn contains(vm: &mut Vm) -> Result<EvalSignal> {
    let key = vm.active_stack_mut().pop()?;
    let coll = vm.active_stack_mut().pop()?;
    let found = match vm.heap.get(coll)? {
        ObjectData::Array(items) => items.clone().iter().any(|i| keys_equal(vm, *i, key)),
        ObjectData::UnorderedMap(entries) => resolve_map_entry(entries, vm, key).is_some(),
        ObjectData::UnorderedSet(items) => items.clone().iter().any(|i| keys_equal(vm, *i, key)),
        ObjectData::String(s) => {
            let s = s.clone();
            match vm.heap.get(key)? {
                ObjectData::Char(c) => s.contains(*c),
                ObjectData::String(sub) => s.contains(sub.as_str()),
                other => return Err(type_mismatch(other)),
            }
        }
        other => return Err(type_mismatch(other)),
    };
    Ok(EvalSignal::Value(vm.heap.bool_value(found)))
}

fn reverse(vm: &mut Vm) -> Result<EvalSignal> {
    let coll = vm.active_stack_mut().pop()?;
    require_not_const(vm, coll)?;
    match vm.heap.get_mut(coll)? {
        ObjectData::Array(items) => items.reverse(),
        ObjectData::String(s) => *s = s.chars().rev().collect(),
        other => return Err(type_mismatch(other)),
    }
    Ok(EvalSignal::Value(coll))
}

fn size(vm: &mut Vm) -> Result<EvalSignal> {
    let coll = vm.active_stack_mut().pop()?;
    let n: i64 = match vm.heap.get(coll)? {
        ObjectData::Array(items) => items.len() as i64,
        ObjectData::UnorderedMap(entries) => entries.len() as i64,
        ObjectData::UnorderedSet(items) => items.len() as i64,
        ObjectData::String(s) => s.chars().count() as i64,
        ObjectData::Pair(..) => 2,
        ObjectData::Projection(Projection { start, end, .. }) => (*end - *start) as i64,
        other => return Err(type_mismatch(other)),
    };
    let obj = vm.heap.make_int(rug::Integer::from(n));
    Ok(EvalSignal::Value(obj))
}

fn clear(vm: &mut Vm) -> Result<EvalSignal> {
    let coll = vm.active_stack_mut().pop()?;
    require_not_const(vm, coll)?;
    match vm.heap.get_mut(coll)? {
        ObjectData::Array(items) => items.clear(),
        ObjectData::UnorderedMap(entries) => entries.clear(),
        ObjectData::UnorderedSet(items) => items.clear(),
        ObjectData::String(s) => s.clear(),
        other => return Err(type_mismatch(other)),
    }
    Ok(EvalSignal::Value(coll))
}

/// `projection` — `(array start end) -> projection`, a read-only window.
fn projection(vm: &mut Vm) -> Result<EvalSignal> {
    let end = vm.active_stack_mut().pop()?;
    let start = vm.active_stack_mut().pop()?;
    let array = vm.active_stack_mut().pop()?;
    let start = int_index(vm, start)?.max(0) as usize;
    let end = int_index(vm, end)?.max(0) as usize;
    match vm.heap.get(array)? {
        ObjectData::Array(items) => {
            if start > end || end > items.len() {
                return Err(EvalError::new(EvalErrorKind::IndexOutOfRange {
                    index: end as i64,
                }));
            }
        }
        other => return Err(type_mismatch(other)),
    }
    let obj = vm.heap.alloc(ObjectData::Projection(Projection {
        target: array,
        start,
        end,
    }));
    vm.heap.track(obj)?;
    Ok(EvalSignal::Value(obj))
}

/// `spread` — push every element of an array/pair/projection as
/// individual stack values, in order.
fn spread(vm: &mut Vm) -> Result<EvalSignal> {
    let coll = vm.active_stack_mut().pop()?;
    let items = materialize(vm, coll)?;
    let last = items.last().copied().unwrap_or(vm.heap.null_value(NullKind::Pointer));
    for item in items {
        vm.active_stack_mut().push(item);
    }
    Ok(EvalSignal::Value(last))
}

/// `rspread` — like `spread` but in reverse order (so the first element
/// ends up on top).
fn rspread(vm: &mut Vm) -> Result<EvalSignal> {
    let coll = vm.active_stack_mut().pop()?;
    let mut items = materialize(vm, coll)?;
    items.reverse();
    let last = items.last().copied().unwrap_or(vm.heap.null_value(NullKind::Pointer));
    for item in items {
        vm.active_stack_mut().push(item);
    }
    Ok(EvalSignal::Value(last))
}

fn materialize(vm: &Vm, coll: Object) -> Result<Vec<Object>> {
    match vm.heap.get(coll)? {
        ObjectData::Array(items) => Ok(items.clone()),
        ObjectData::Pair(a, b) => Ok(vec![*a, *b]),
        ObjectData::UnorderedSet(items) => Ok(items.clone()),
        ObjectData::Projection(Projection { target, start, end }) => match vm.heap.get(*target)? {
            ObjectData::Array(items) => Ok(items[*start..*end].to_vec()),
            other => Err(type_mismatch(other)),
        },
        other => Err(type_mismatch(other)),
    }
}

/// `foreach` — run `body` once per element, with the element pushed as
/// the sole argument to each iteration (§4.2: "`foreach` does not push a
/// frame; the element is simply on top of the active stack for the
/// duration of the body").
fn foreach(vm: &mut Vm, body: &ExpressionList) -> Result<EvalSignal> {
    let coll = vm.active_stack_mut().pop()?;
    let items = materialize(vm, coll)?;
    let mut last = vm.heap.null_value(NullKind::Pointer);
    for item in items {
        vm.active_stack_mut().push(item);
        match eval_expression_list(vm, body)? {
            EvalSignal::Value(v) => last = v,
            EvalSignal::ExitScope => break,
            other => return Ok(other),
        }
    }
    Ok(EvalSignal::Value(last))
}
