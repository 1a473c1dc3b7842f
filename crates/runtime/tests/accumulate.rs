//! `accumulate` (§4.2): fold order, flattening through array/set, and
//! multi-collection counts.

use loom_core::{
    AddressMode::Rel, ArithOp, ExpressionList, FunctionLiteral, Heap, NullKind, Object, ObjectData,
    Operation, Vm,
};

fn new_vm() -> Vm {
    let mut heap = Heap::new();
    let root = heap.alloc(ObjectData::Null(NullKind::Pointer));
    Vm::new(heap, root)
}

fn list(ops: Vec<Operation>) -> ExpressionList {
    let mut list = ExpressionList::new(1);
    list.ops = ops;
    list
}

fn as_int(vm: &Vm, obj: Object) -> i64 {
    match vm.heap.get(obj).unwrap() {
        ObjectData::Int(i) => i.to_i64().unwrap(),
        other => panic!("expected int, found {}", other.type_name()),
    }
}

/// `function(elem, acc) { acc - elem }` — `acc` is `Rel -1` (pushed last,
/// on top), `elem` is `Rel -2` (pushed first), matching accumulate's
/// "push elem then push acc" call order.
fn make_sub_fold(vm: &mut Vm) -> Object {
    let mut body = list(vec![
        Operation::Load(Rel, -1),
        Operation::Load(Rel, -2),
        Operation::Arith(ArithOp::Sub),
    ]);
    body.is_function_body = true;
    let literal = FunctionLiteral { name: Some("subfold".into()), own_stack: false, body };
    loom_runtime::make_function(vm, &literal).unwrap()
}

fn array_of(vm: &mut Vm, values: &[i64]) -> Object {
    let items: Vec<Object> = values.iter().map(|n| vm.heap.make_int(rug::Integer::from(*n))).collect();
    let obj = vm.heap.alloc(ObjectData::Array(items));
    vm.heap.track(obj).unwrap();
    obj
}

/// A non-commutative fold must see each element in push order, not
/// reversed: `((10 - 1) - 2) - 3 == 4`.
#[test]
fn accumulate_preserves_non_commutative_order() {
    let mut vm = new_vm();
    let fold = make_sub_fold(&mut vm);
    let coll = array_of(&mut vm, &[1, 2, 3]);
    let init = vm.heap.make_int(rug::Integer::from(10));
    let count = vm.heap.make_int(rug::Integer::from(1));

    vm.active_stack_mut().push(coll);
    vm.active_stack_mut().push(count);
    vm.active_stack_mut().push(init);
    vm.active_stack_mut().push(fold);

    let result = loom_runtime::eval_operation(&mut vm, &Operation::Accumulate)
        .expect("accumulate should evaluate")
        .value()
        .expect("accumulate should leave a value");
    assert_eq!(as_int(&vm, result), 4);
}

/// `accumulate` flattens a nested array one level deep (and further)
/// before folding: `[[1, 2], 3]` folds the same as `[1, 2, 3]`.
#[test]
fn accumulate_flattens_nested_arrays() {
    let mut vm = new_vm();
    let fold = make_sub_fold(&mut vm);
    let inner = array_of(&mut vm, &[1, 2]);
    let three = vm.heap.make_int(rug::Integer::from(3));
    let outer = vm.heap.alloc(ObjectData::Array(vec![inner, three]));
    vm.heap.track(outer).unwrap();
    let init = vm.heap.make_int(rug::Integer::from(10));
    let count = vm.heap.make_int(rug::Integer::from(1));

    vm.active_stack_mut().push(outer);
    vm.active_stack_mut().push(count);
    vm.active_stack_mut().push(init);
    vm.active_stack_mut().push(fold);

    let result = loom_runtime::eval_operation(&mut vm, &Operation::Accumulate)
        .expect("accumulate should evaluate")
        .value()
        .expect("accumulate should leave a value");
    assert_eq!(as_int(&vm, result), 4);
}

/// `accumulate` pops `count` collections, flattening each; the
/// stack-adjacent one (pushed last) is folded first.
#[test]
fn accumulate_folds_multiple_collections() {
    let mut vm = new_vm();
    let fold = make_sub_fold(&mut vm);
    let first = array_of(&mut vm, &[1, 2]);
    let second = array_of(&mut vm, &[3]);
    let init = vm.heap.make_int(rug::Integer::from(10));
    let count = vm.heap.make_int(rug::Integer::from(2));

    vm.active_stack_mut().push(first);
    vm.active_stack_mut().push(second);
    vm.active_stack_mut().push(count);
    vm.active_stack_mut().push(init);
    vm.active_stack_mut().push(fold);

    let result = loom_runtime::eval_operation(&mut vm, &Operation::Accumulate)
        .expect("accumulate should evaluate")
        .value()
        .expect("accumulate should leave a value");
    // `second` ([3]) is popped (and flattened) first, then `first` ([1, 2]):
    // ((10 - 3) - 1) - 2 == 4
    assert_eq!(as_int(&vm, result), 4);
}
