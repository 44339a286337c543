// End-to-end coverage of the public embedding surface: parse a
// program through the bundled S-expression reader, compile, lower,
// and invoke functions against a fresh Context.

use microscript::interp::Value;
use microscript::loc::SourceLoc;
use microscript::program::{FunctionId, Program};
use microscript::sexpr::read_program;
use microscript::sim::SimProgram;
use microscript::types::{Base, TypeDecl};
use microscript::{compile, new_context, simulate};

fn int_ty() -> TypeDecl {
    TypeDecl::simple(Base::Int, SourceLoc::synthetic())
}

fn build(src: &str) -> (Program, SimProgram) {
    let root = read_program(src, "test").expect("parse");
    let program = compile(&root).expect("compile");
    let sim = simulate(&program);
    (program, sim)
}

fn only_overload(program: &Program, name: &str) -> FunctionId {
    let overloads = program.overloads(name);
    assert_eq!(overloads.len(), 1, "expected exactly one overload of '{}'", name);
    overloads[0]
}

#[test]
fn arithmetic_and_return() {
    let (program, sim) = build("(defun (int add) (int a) (int b) (return (+ a b)))");
    let mut ctx = new_context(&program, &sim).unwrap();
    let add = only_overload(&program, "add");
    let result = ctx.invoke(add, &[Value::Int(2), Value::Int(3)]).unwrap();
    assert!(matches!(result, Value::Int(5)));
}

#[test]
fn structure_field_access_through_pointer() {
    let src = "
        (struct Sphere (float3 xyz) (float radius))
        (defun (float r_of) (Sphere * p) (return (. (=> p) radius)))
        (defun (float fresh_sphere_radius) (r_of (new Sphere)))
    ";
    let (program, sim) = build(src);
    let mut ctx = new_context(&program, &sim).unwrap();
    let f = only_overload(&program, "fresh_sphere_radius");
    let result = ctx.invoke(f, &[]).unwrap();
    match result {
        Value::Float(v) => assert_eq!(v, 0.0),
        other => panic!("expected Float(0.0), got {:?}", other),
    }
}

#[test]
fn let_shadowing_resolves_inner_binding() {
    let (program, sim) = build("(defun (int shadowed) (let ((int x 1)) (let ((int x 2)) x)))");
    let mut ctx = new_context(&program, &sim).unwrap();
    let f = only_overload(&program, "shadowed");
    let result = ctx.invoke(f, &[]).unwrap();
    assert!(matches!(result, Value::Int(2)));
}

#[test]
fn array_indexing_reads_every_element() {
    let (program, sim) = build("(defun (int elem_sum) (int 3 a) (+ (at a 0) (+ (at a 1) (at a 2))))");
    let mut ctx = new_context(&program, &sim).unwrap();
    let f = only_overload(&program, "elem_sum");
    let place = ctx.stage(&int_ty(), vec![Value::Int(10), Value::Int(20), Value::Int(30)]);
    let result = ctx.invoke(f, &[Value::Ref(place)]).unwrap();
    assert!(matches!(result, Value::Int(60)));
}

#[test]
fn foreach_breaks_on_early_return() {
    let (program, sim) = build("(defun (int first_of) (int 3 a) (foreach a i (return i)))");
    let mut ctx = new_context(&program, &sim).unwrap();
    let f = only_overload(&program, "first_of");
    let place = ctx.stage(&int_ty(), vec![Value::Int(10), Value::Int(20), Value::Int(30)]);
    let result = ctx.invoke(f, &[Value::Ref(place)]).unwrap();
    assert!(matches!(result, Value::Int(10)));
}

#[test]
fn overload_ambiguity_on_result_type_alone_is_rejected() {
    let src = "
        (defun (int g) (int x) (return x))
        (defun (float g) (int x) (return 0.0))
    ";
    let root = read_program(src, "test").expect("parse");
    let err = compile(&root).expect_err("two overloads differing only in result type must be rejected");
    assert!(matches!(err, microscript::Error::Semantic(_)));
}

#[test]
fn try_catch_recovers_from_index_out_of_range() {
    let (program, sim) = build("(defun (int safe_at) (int 3 a) (try (at a 99) 0))");
    let mut ctx = new_context(&program, &sim).unwrap();
    let f = only_overload(&program, "safe_at");
    let place = ctx.stage(&int_ty(), vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    let result = ctx.invoke(f, &[Value::Ref(place)]).unwrap();
    assert!(matches!(result, Value::Int(0)));
}

#[test]
fn globals_are_initialized_before_first_invoke() {
    let src = "
        (let int counter_seed 7)
        (defun (int read_seed) counter_seed)
    ";
    let (program, sim) = build(src);
    let mut ctx = new_context(&program, &sim).unwrap();
    let f = only_overload(&program, "read_seed");
    let result = ctx.invoke(f, &[]).unwrap();
    assert!(matches!(result, Value::Int(7)));
}
