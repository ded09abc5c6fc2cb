//! Compile-time diagnostics: messages, locations, and panic-mode recovery.

mod common;

use common::compile_errors;

#[test]
fn invalid_assignment_target() {
    assert_eq!(
        compile_errors("a * b = c;"),
        vec!["[line 1] Error at '=': Invalid assignment target."]
    );
    assert_eq!(
        compile_errors("var a; var b; a + b = 1;"),
        vec!["[line 1] Error at '=': Invalid assignment target."]
    );
    assert_eq!(
        compile_errors("var a; !a = 1;"),
        vec!["[line 1] Error at '=': Invalid assignment target."]
    );
}

#[test]
fn duplicate_declaration_in_one_scope() {
    assert_eq!(
        compile_errors("{ var a = 1; var a = 2; }"),
        vec!["[line 1] Error at 'a': Already a variable with this name in this scope."]
    );
}

#[test]
fn own_initializer_read() {
    assert_eq!(
        compile_errors("{ var a = a; }"),
        vec!["[line 1] Error at 'a': Can't read local variable in its own initializer."]
    );
}

#[test]
fn top_level_return() {
    assert_eq!(
        compile_errors("return;"),
        vec!["[line 1] Error at 'return': Can't return from top-level code."]
    );
}

#[test]
fn this_and_super_placement() {
    assert_eq!(
        compile_errors("print this;"),
        vec!["[line 1] Error at 'this': Can't use 'this' outside of a class."]
    );
    assert_eq!(
        compile_errors("fun f() { return this; }"),
        vec!["[line 1] Error at 'this': Can't use 'this' outside of a class."]
    );
    assert_eq!(
        compile_errors("print super.x;"),
        vec!["[line 1] Error at 'super': Can't use 'super' outside of a class."]
    );
    assert_eq!(
        compile_errors("class A { m() { return super.m(); } }"),
        vec!["[line 1] Error at 'super': Can't use 'super' in a class with no superclass."]
    );
}

#[test]
fn self_inheritance() {
    assert_eq!(
        compile_errors("class A < A {}"),
        vec!["[line 1] Error at 'A': A class can't inherit from itself."]
    );
}

#[test]
fn initializer_with_return_value() {
    assert_eq!(
        compile_errors("class A { init() { return nil; } }"),
        vec!["[line 1] Error at 'return': Can't return a value from an initializer."]
    );
}

#[test]
fn expected_expression() {
    assert_eq!(
        compile_errors("print + ;"),
        vec!["[line 1] Error at '+': Expect expression."]
    );
}

#[test]
fn unterminated_string() {
    assert_eq!(
        compile_errors("var s = \"oops;"),
        vec!["[line 1] Error: Unterminated string."]
    );
}

#[test]
fn unexpected_character() {
    // Panic mode swallows the follow-on ';' complaint.
    assert_eq!(
        compile_errors("var a = 1 # 2;"),
        vec!["[line 1] Error: Unexpected character."]
    );
}

#[test]
fn one_diagnostic_per_statement_then_recovery() {
    let diagnostics = compile_errors("var 1;\nvar 2;\nvar ok = 3;");
    assert_eq!(
        diagnostics,
        vec![
            "[line 1] Error at '1': Expect variable name.",
            "[line 2] Error at '2': Expect variable name.",
        ]
    );
}

#[test]
fn errors_after_a_valid_prefix_are_still_reported() {
    let diagnostics = compile_errors("print 1;\nprint ;\nprint 2;");
    assert_eq!(
        diagnostics,
        vec!["[line 2] Error at ';': Expect expression."]
    );
}

#[test]
fn line_numbers_track_newlines() {
    assert_eq!(
        compile_errors("var a = 1;\n\n\na * a = 2;"),
        vec!["[line 4] Error at '=': Invalid assignment target."]
    );
}

#[test]
fn missing_closing_brace_reports_at_end() {
    assert_eq!(
        compile_errors("{ print 1;"),
        vec!["[line 1] Error at end: Expect '}' after block."]
    );
}

#[test]
fn keywords_are_not_identifiers() {
    assert_eq!(
        compile_errors("var class = 1;"),
        vec!["[line 1] Error at 'class': Expect variable name."]
    );
}
