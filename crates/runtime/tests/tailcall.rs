//! Tail-call property (§8): a self-recursive function driven entirely
//! through `invoke tail` must not grow the native Rust call stack. We can't
//! measure stack frames directly (platform-fragile), so instead we run a
//! recursion count deep enough that naive native recursion would overflow
//! a default thread stack, and check it completes and returns the right
//! value — proving `run_invocation`'s trampoline loop, not the Rust call
//! stack, is what absorbs the recursion.

use loom_core::{
    ArithOp, ConditionalLink, ExpressionList, FunctionLiteral, Heap, NullKind, Object, ObjectData,
    Operation, TypeTag, Vm,
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

fn push_int(n: i64) -> Operation {
    Operation::Push(TypeTag::Int, loom_core::Literal::Int(rug::Integer::from(n)))
}

/// `countdown(n, acc)`: `n == 0 -> acc`, else `countdown(n - 1, acc + 1)`
/// via `invoke tail` — never via plain `invoke`.
fn make_countdown(vm: &mut Vm) -> Object {
    use loom_core::AddressMode::Rel;

    let guard = list(vec![Operation::Load(Rel, -2), push_int(0), Operation::Arith(ArithOp::Eq)]);
    let base_case = list(vec![Operation::Load(Rel, -1)]);
    let recursive_case = list(vec![
        Operation::Load(Rel, -2),
        push_int(1),
        Operation::Arith(ArithOp::Sub),
        Operation::Load(Rel, -1),
        push_int(1),
        Operation::Arith(ArithOp::Add),
        Operation::Current,
        Operation::InvokeTail,
    ]);

    let mut body = list(vec![Operation::If(vec![
        ConditionalLink { guard: Some(guard), body: base_case },
        ConditionalLink { guard: None, body: recursive_case },
    ])]);
    body.is_function_body = true;

    let literal = FunctionLiteral { name: Some("countdown".into()), own_stack: false, body };
    loom_runtime::make_function(vm, &literal).unwrap()
}

#[test]
fn tail_recursion_runs_at_constant_native_stack_depth() {
    let mut vm = new_vm();
    let countdown = make_countdown(&mut vm);

    // Deep enough that naive native recursion (one Rust frame per call)
    // would overflow a default 8MB thread stack; the trampoline absorbs it
    // in a flat loop instead.
    const DEPTH: i64 = 200_000;

    let n = vm.heap.make_int(rug::Integer::from(DEPTH));
    let acc0 = vm.heap.make_int(rug::Integer::from(0i64));
    vm.active_stack_mut().push(n);
    vm.active_stack_mut().push(acc0);
    vm.active_stack_mut().push(countdown);

    let result = loom_runtime::eval_operation(&mut vm, &Operation::Invoke)
        .expect("tail-recursive countdown should not overflow the native stack")
        .value()
        .expect("countdown should return a value");

    match vm.heap.get(result).unwrap() {
        ObjectData::Int(i) => assert_eq!(i.to_i64().unwrap(), DEPTH),
        other => panic!("expected int, found {}", other.type_name()),
    }
}
