//! End-to-end behavior: source in, printed output out.

mod common;

use common::run_ok;
use rstest::rstest;

#[rstest]
#[case::precedence("print 1 + 2 * 3;", "7\n")]
#[case::grouping("print (1 + 2) * 3;", "9\n")]
#[case::string_concat("var a = \"hi\"; var b = \"!\"; print a + b;", "hi!\n")]
#[case::closure_capture(
    "fun make(x){ fun inner(){ return x; } return inner; } var f = make(42); print f();",
    "42\n"
)]
#[case::inherited_method(
    "class A { greet() { print \"hi\"; } } class B < A {} B().greet();",
    "hi\n"
)]
#[case::initializer_and_state(
    "class Counter { init(n){ this.n = n; } bump(){ this.n = this.n + 1; return this.n; } } \
     var c = Counter(10); print c.bump(); print c.bump();",
    "11\n12\n"
)]
#[case::for_loop("for (var i = 0; i < 3; i = i + 1) print i;", "0\n1\n2\n")]
fn core_scenarios(#[case] source: &str, #[case] expected: &str) {
    assert_eq!(run_ok(source), expected);
}

#[rstest]
#[case::nil_literal("print nil;", "nil\n")]
#[case::booleans("print true; print false;", "true\nfalse\n")]
#[case::number_formatting("print 2.5; print 7.0; print -0.125;", "2.5\n7\n-0.125\n")]
#[case::not_operator("print !true; print !nil; print !\"text\";", "false\ntrue\nfalse\n")]
#[case::equality("print 1 == 1; print 1 == \"1\"; print nil == nil;", "true\nfalse\ntrue\n")]
#[case::comparison_chain("print 1 < 2 == true;", "true\n")]
#[case::unary_nesting("print --3;", "3\n")]
fn values_and_operators(#[case] source: &str, #[case] expected: &str) {
    assert_eq!(run_ok(source), expected);
}

#[rstest]
#[case::if_else("if (false) print \"then\"; else print \"else\";", "else\n")]
#[case::if_without_else("if (false) print \"skipped\"; print \"after\";", "after\n")]
#[case::and_short_circuit("print nil and missing_is_never_read;", "nil\n")]
#[case::or_short_circuit("print \"first\" or missing_is_never_read;", "first\n")]
#[case::while_loop("var i = 3; while (i > 0) { print i; i = i - 1; }", "3\n2\n1\n")]
#[case::for_with_existing_variable("var i = 5; for (i = 0; i < 2; i = i + 1) print i;", "0\n1\n")]
#[case::nested_loops(
    "for (var i = 0; i < 2; i = i + 1) for (var j = 0; j < 2; j = j + 1) print i + j;",
    "0\n1\n1\n2\n"
)]
fn control_flow(#[case] source: &str, #[case] expected: &str) {
    assert_eq!(run_ok(source), expected);
}

#[test]
fn for_loop_with_empty_clauses_runs_until_a_runtime_error() {
    let (result, out, _) = common::run(
        "var i = 0; for (;;) { print i; i = i + 1; if (i == 2) undefined_name; }",
    );
    assert!(result.is_err());
    assert_eq!(out, "0\n1\n");
}

#[rstest]
#[case::chained_assignment("var a; var b; a = b = 3; print a; print b;", "3\n3\n")]
#[case::assignment_is_an_expression("var a; print a = 5;", "5\n")]
#[case::global_redefinition("var a = 1; var a = 2; print a;", "2\n")]
#[case::nested_scopes(
    "var a = \"outer\"; { var a = \"inner\"; { var a = \"innermost\"; print a; } print a; } print a;",
    "innermost\ninner\nouter\n"
)]
fn variables(#[case] source: &str, #[case] expected: &str) {
    assert_eq!(run_ok(source), expected);
}

#[rstest]
#[case::recursion(
    "fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); } print fib(10);",
    "55\n"
)]
#[case::mutual_recursion_via_globals(
    "fun even(n) { if (n == 0) return true; return odd(n - 1); } \
     fun odd(n) { if (n == 0) return false; return even(n - 1); } \
     print even(10); print odd(10);",
    "true\nfalse\n"
)]
#[case::functions_are_values(
    "fun twice(f, x) { return f(f(x)); } fun inc(n) { return n + 1; } print twice(inc, 5);",
    "7\n"
)]
#[case::implicit_nil_return("fun noop() { 1 + 1; } print noop();", "nil\n")]
fn functions(#[case] source: &str, #[case] expected: &str) {
    assert_eq!(run_ok(source), expected);
}

#[test]
fn fibonacci_loop_matches_recursive_version() {
    let looped = run_ok(
        "var a = 0; var b = 1; for (var i = 0; i < 10; i = i + 1) { var t = a + b; a = b; b = t; } print a;",
    );
    assert_eq!(looped, "55\n");
}

#[test]
fn print_representations() {
    assert_eq!(run_ok("fun f() {} print f;"), "<fn f>\n");
    assert_eq!(run_ok("print clock;"), "<native fn>\n");
    assert_eq!(run_ok("class C {} print C;"), "C\n");
    assert_eq!(run_ok("class C {} print C();"), "C instance\n");
    assert_eq!(run_ok("class C { m() {} } print C().m;"), "<fn m>\n");
}
