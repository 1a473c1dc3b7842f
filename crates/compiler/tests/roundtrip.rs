//! End-to-end: lex+parse real loom source, evaluate it, and check the
//! parse -> externalize -> reparse round trip reaches a fixed point (§4.8,
//! §8).

use loom_core::{Heap, NullKind, ObjectData, Vm};
use loom_compiler::{externalize, parse};

fn eval_source(src: &str) -> (Vm, loom_core::Object) {
    let mut heap = Heap::new();
    let root = heap.alloc(ObjectData::Null(NullKind::Pointer));
    let list = parse(src, &mut heap, 0, false).expect("parse should succeed");
    let mut vm = Vm::new(heap, root);
    let result = loom_runtime::eval_expression_list(&mut vm, &list)
        .expect("evaluation should succeed")
        .value()
        .expect("program should leave a value");
    (vm, result)
}

fn as_int(vm: &Vm, obj: loom_core::Object) -> i64 {
    match vm.heap.get(obj).unwrap() {
        ObjectData::Int(i) => i.to_i64().unwrap(),
        other => panic!("expected int, found {}", other.type_name()),
    }
}

#[test]
fn parses_and_evaluates_arithmetic() {
    let (vm, result) = eval_source("push int 21\npush int 7\nadd\ndump\n");
    assert_eq!(as_int(&vm, result), 28);
}

#[test]
fn parses_and_evaluates_mixed_operators() {
    let (vm, result) =
        eval_source("push int 4; push int 5; mul; push int 6; push int 2; div; add; dump");
    assert_eq!(as_int(&vm, result), 23);
}

#[test]
fn parses_comparison_chain() {
    let (vm, result) = eval_source(
        "push int 2; push int 3; lt\npush int 4; push int 5; eq\nor\ndump",
    );
    match vm.heap.get(result).unwrap() {
        ObjectData::Bool(b) => assert!(*b),
        other => panic!("expected bool, found {}", other.type_name()),
    }
}

#[test]
fn parses_recursive_function_with_if_else() {
    // factorial(6) == 720, driven entirely through source text: an `if`
    // guard, a recursive `current; invoke` call, and `rel` addressing.
    let src = r#"
        function fact {
            if (load rel -1; push int 2; lt) {
                push int 1
            } else {
                load rel -1
                load rel -1
                push int 1
                sub
                current
                invoke
                mul
            }
        }
        push int 6
        swap
        invoke
        dump
    "#;
    let (vm, result) = eval_source(src);
    assert_eq!(as_int(&vm, result), 720);
}

#[test]
fn parses_define_and_cast() {
    let (vm, result) = eval_source("define X int 0xFF\npush define X\ncast string\ndump");
    match vm.heap.get(result).unwrap() {
        ObjectData::String(s) => assert_eq!(s, "255"),
        other => panic!("expected string, found {}", other.type_name()),
    }
}

#[test]
fn parses_array_collection_ops() {
    let (vm, result) = eval_source(
        "push array 0\npush int 1\ncoll append\npush int 2\ncoll append\ncoll size\ndump",
    );
    assert_eq!(as_int(&vm, result), 2);
}

#[test]
fn externalize_reaches_a_fixed_point() {
    let src = r#"
        function fact {
            if (load rel -1; push int 2; lt) {
                push int 1
            } else {
                load rel -1
                load rel -1
                push int 1
                sub
                current
                invoke
                mul
            }
        }
        push int 6
        swap
        invoke
        dump
    "#;
    let mut heap = Heap::new();
    let first_tree = parse(src, &mut heap, 0, false).unwrap();
    let first_text = externalize(&first_tree);

    let mut heap2 = Heap::new();
    let second_tree = parse(&first_text, &mut heap2, 0, false).unwrap();
    let second_text = externalize(&second_tree);

    assert_eq!(first_text, second_text);
}

#[test]
fn externalized_source_still_evaluates_to_the_same_answer() {
    let src = "push int 4; push int 5; mul; push int 6; push int 2; div; add; dump";
    let mut heap = Heap::new();
    let tree = parse(src, &mut heap, 0, false).unwrap();
    let text = externalize(&tree);

    let (vm, result) = eval_source(&text);
    assert_eq!(as_int(&vm, result), 23);
}

#[test]
#[serial_test::serial]
fn debug_info_is_recorded_when_requested() {
    loom_core::ProcessState::reset_for_test();
    let mut heap = Heap::new();
    let list = parse("push int 1\ndump", &mut heap, 3, true).unwrap();
    let site = loom_core::SiteKey { list_id: list.id, node_index: 0 };
    let location = loom_core::ProcessState::debug_info(site).expect("debug info recorded");
    assert_eq!(location.file_index, 3);
    assert_eq!(location.line, 1);
}
