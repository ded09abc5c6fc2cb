//! Classes: methods, fields, initializers, inheritance, bound methods.

mod common;

use common::{run_ok, runtime_error};
use rill_runtime::RuntimeError;

#[test]
fn methods_bind_this() {
    let out = run_ok(
        "class Speaker {\n\
           say() { print this.word; }\n\
         }\n\
         var s = Speaker();\n\
         s.word = \"hi\";\n\
         s.say();",
    );
    assert_eq!(out, "hi\n");
}

#[test]
fn bound_methods_remember_their_receiver() {
    let out = run_ok(
        "class Speaker {\n\
           say() { print this.word; }\n\
         }\n\
         var s = Speaker();\n\
         s.word = \"still here\";\n\
         var m = s.say;\n\
         m();",
    );
    assert_eq!(out, "still here\n");
}

#[test]
fn fields_shadow_methods() {
    let out = run_ok(
        "class Box { f() { print \"method\"; } }\n\
         fun shadow() { print \"field\"; }\n\
         var b = Box();\n\
         b.f = shadow;\n\
         b.f();",
    );
    assert_eq!(out, "field\n");
}

#[test]
fn initializer_runs_on_construction() {
    let out = run_ok(
        "class Point {\n\
           init(x, y) { this.x = x; this.y = y; }\n\
         }\n\
         var p = Point(3, 4);\n\
         print p.x + p.y;",
    );
    assert_eq!(out, "7\n");
}

#[test]
fn calling_init_directly_returns_the_instance() {
    let out = run_ok(
        "class C { init() { this.v = 1; } }\n\
         var c = C();\n\
         print c.init();",
    );
    assert_eq!(out, "C instance\n");
}

#[test]
fn default_constructor_takes_no_arguments() {
    let (error, _) = runtime_error("class Empty {} Empty(1, 2);");
    assert_eq!(
        error,
        RuntimeError::ArityMismatch {
            expected: 0,
            got: 2
        }
    );
    assert_eq!(error.to_string(), "Expected 0 arguments but got 2.");
}

#[test]
fn initializer_arity_is_checked() {
    let (error, _) = runtime_error("class P { init(x) {} } P();");
    assert_eq!(
        error,
        RuntimeError::ArityMismatch {
            expected: 1,
            got: 0
        }
    );
}

#[test]
fn subclass_overrides_and_calls_super() {
    let out = run_ok(
        "class A { m() { return \"A\"; } }\n\
         class B < A { m() { return \"B+\" + super.m(); } }\n\
         print B().m();",
    );
    assert_eq!(out, "B+A\n");
}

#[test]
fn super_invoke_passes_arguments() {
    let out = run_ok(
        "class A { add(a, b) { return a + b; } }\n\
         class B < A { add(a, b) { return super.add(a, b) + 1; } }\n\
         print B().add(1, 2);",
    );
    assert_eq!(out, "4\n");
}

#[test]
fn inherited_initializer_runs_for_the_subclass() {
    let out = run_ok(
        "class A { init() { this.kind = \"A-made\"; } }\n\
         class B < A {}\n\
         print B().kind;",
    );
    assert_eq!(out, "A-made\n");
}

#[test]
fn methods_resolve_without_a_superclass_walk() {
    // Copy-down inheritance: redefining the parent's method after the
    // subclass declaration must not change the subclass.
    let out = run_ok(
        "class A { m() { return \"original\"; } }\n\
         class B < A {}\n\
         class C { m() { return \"unrelated\"; } }\n\
         print B().m();",
    );
    assert_eq!(out, "original\n");
}

#[test]
fn inheriting_from_a_non_class_is_an_error() {
    let (error, _) = runtime_error("var NotClass = 1; class Sub < NotClass {}");
    assert_eq!(error, RuntimeError::SuperclassNotClass);
    assert_eq!(error.to_string(), "Superclass must be a class.");
}

#[test]
fn property_access_requires_an_instance() {
    let (error, _) = runtime_error("var x = 1; print x.y;");
    assert_eq!(error, RuntimeError::PropertyOnNonInstance);
    let (error, _) = runtime_error("var x = 1; x.y = 2;");
    assert_eq!(error, RuntimeError::FieldOnNonInstance);
    let (error, _) = runtime_error("var x = \"s\"; x.m();");
    assert_eq!(error, RuntimeError::MethodOnNonInstance);
}

#[test]
fn missing_property_is_reported_by_name() {
    let (error, _) = runtime_error("class A {} print A().missing;");
    assert_eq!(
        error,
        RuntimeError::UndefinedProperty("missing".to_string())
    );
    assert_eq!(error.to_string(), "Undefined property 'missing'.");
}

#[test]
fn field_assignment_evaluates_to_the_value() {
    let out = run_ok(
        "class A {}\n\
         var a = A();\n\
         print a.field = \"assigned\";",
    );
    assert_eq!(out, "assigned\n");
}

#[test]
fn invoke_on_missing_method_names_the_property() {
    let (error, _) = runtime_error("class A {} A().nope();");
    assert_eq!(error, RuntimeError::UndefinedProperty("nope".to_string()));
}
