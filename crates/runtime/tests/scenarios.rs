//! The six concrete end-to-end scenarios from §8, driven directly through
//! `Operation`/`ExpressionList` trees (no parser yet) straight into
//! `eval_expression_list`.

use loom_core::{
    ArithOp, CollOp, ExpressionList, Heap, Literal, NullKind, ObjectData, Operation, TypeTag, Vm,
};
use loom_runtime::eval_expression_list;

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

fn push_int(n: i64) -> Operation {
    Operation::Push(TypeTag::Int, Literal::Int(rug::Integer::from(n)))
}

fn run(vm: &mut Vm, ops: Vec<Operation>) -> loom_core::Object {
    eval_expression_list(vm, &list(ops))
        .expect("scenario should evaluate without error")
        .value()
        .expect("scenario's last op should leave a value")
}

fn as_int(vm: &Vm, obj: loom_core::Object) -> i64 {
    match vm.heap.get(obj).unwrap() {
        ObjectData::Int(i) => i.to_i64().unwrap(),
        other => panic!("expected int, found {}", other.type_name()),
    }
}

/// 1. `push int 21; push int 7; add; dump` -> 28
#[test]
fn scenario_add() {
    let mut vm = new_vm();
    let result = run(
        &mut vm,
        vec![push_int(21), push_int(7), Operation::Arith(ArithOp::Add), Operation::Dump(None)],
    );
    assert_eq!(as_int(&vm, result), 28);
}

/// 2. `push int 4; push int 5; mul; push int 6; push int 2; div; add; dump` -> 23
#[test]
fn scenario_mul_div_add() {
    let mut vm = new_vm();
    let result = run(
        &mut vm,
        vec![
            push_int(4),
            push_int(5),
            Operation::Arith(ArithOp::Mul),
            push_int(6),
            push_int(2),
            Operation::Arith(ArithOp::Div),
            Operation::Arith(ArithOp::Add),
            Operation::Dump(None),
        ],
    );
    assert_eq!(as_int(&vm, result), 23);
}

/// 3. `push int 2; push int 3; lt; push int 4; push int 5; eq; or; dump` -> true
#[test]
fn scenario_lt_eq_or() {
    let mut vm = new_vm();
    let result = run(
        &mut vm,
        vec![
            push_int(2),
            push_int(3),
            Operation::Arith(ArithOp::Lt),
            push_int(4),
            push_int(5),
            Operation::Arith(ArithOp::Eq),
            Operation::Arith(ArithOp::Or),
            Operation::Dump(None),
        ],
    );
    match vm.heap.get(result).unwrap() {
        ObjectData::Bool(b) => assert!(*b),
        other => panic!("expected bool, found {}", other.type_name()),
    }
}

/// 4. Factorial of 6 via tail-free recursion -> 720.
///
/// `function(n) { n 2 lt if { 1 } else { n n 1 sub current invoke mul } }`
/// — `current` pushes the executing function itself, so the body recurses
/// without needing a define-table lookup.
#[test]
fn scenario_factorial() {
    use loom_core::{ConditionalLink, FunctionLiteral};

    let mut vm = new_vm();

    // n < 2 -> push 1 ; else -> n * fact(n - 1)
    let base_case = list(vec![push_int(1)]);
    let recursive_case = list(vec![
        Operation::Load(loom_core::AddressMode::Rel, -1),
        Operation::Load(loom_core::AddressMode::Rel, -1),
        push_int(1),
        Operation::Arith(ArithOp::Sub),
        Operation::Current,
        Operation::Invoke,
        Operation::Arith(ArithOp::Mul),
    ]);
    let guard = list(vec![
        Operation::Load(loom_core::AddressMode::Rel, -1),
        push_int(2),
        Operation::Arith(ArithOp::Lt),
    ]);

    let mut body = list(vec![Operation::If(vec![
        ConditionalLink { guard: Some(guard), body: base_case },
        ConditionalLink { guard: None, body: recursive_case },
    ])]);
    body.is_function_body = true;

    let fact_literal = FunctionLiteral { name: Some("fact".into()), own_stack: false, body };
    let fact = loom_runtime::make_function(&mut vm, &fact_literal).unwrap();

    let result = push_arg_and_call(&mut vm, fact, 6);
    assert_eq!(as_int(&vm, result), 720);
}

fn push_arg_and_call(vm: &mut Vm, fact: loom_core::Object, n: i64) -> loom_core::Object {
    let arg = vm.heap.make_int(rug::Integer::from(n));
    vm.active_stack_mut().push(arg);
    vm.active_stack_mut().push(fact);
    loom_runtime::eval_operation(vm, &Operation::Invoke)
        .expect("factorial invocation")
        .value()
        .expect("factorial should return a value")
}

/// 5. `push array 0; push int 1; coll append; push int 2; coll append; coll size; dump` -> 2
#[test]
fn scenario_array_append_size() {
    let mut vm = new_vm();
    let result = run(
        &mut vm,
        vec![
            Operation::Push(TypeTag::Array, Literal::Null),
            push_int(1),
            Operation::Coll(CollOp::Append),
            push_int(2),
            Operation::Coll(CollOp::Append),
            Operation::Coll(CollOp::Size),
            Operation::Dump(None),
        ],
    );
    assert_eq!(as_int(&vm, result), 2);
}

/// 6. `define X int 0xFF` then `push define X; cast string; dump` -> "255"
///
/// The parser resolves a `push define X` against its define table at parse
/// time and bakes in the resolved object directly (`Literal::Define`); this
/// drives the already-resolved node the way the parser would emit it.
#[test]
fn scenario_define_and_cast() {
    let mut vm = new_vm();
    let defined = vm.heap.make_int(rug::Integer::from(0xFFi64));
    let result = run(
        &mut vm,
        vec![
            Operation::Push(TypeTag::Int, Literal::Define(defined)),
            Operation::Cast(TypeTag::String),
            Operation::Dump(None),
        ],
    );
    match vm.heap.get(result).unwrap() {
        ObjectData::String(s) => assert_eq!(s, "255"),
        other => panic!("expected string, found {}", other.type_name()),
    }
}
