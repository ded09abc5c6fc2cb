//! Binary-level behavior: exit codes and output streams.

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::NamedTempFile;

fn script(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    write!(file, "{contents}").expect("write script");
    file
}

fn rill() -> Command {
    Command::cargo_bin("rill").expect("binary builds")
}

#[test]
fn runs_a_script_and_exits_zero() {
    let file = script("print 1 + 2;");
    rill()
        .arg(file.path())
        .assert()
        .success()
        .stdout("3\n");
}

#[test]
fn compile_errors_exit_65() {
    let file = script("var 1;");
    rill()
        .arg(file.path())
        .assert()
        .code(65)
        .stderr(predicate::str::contains("Expect variable name."));
}

#[test]
fn runtime_errors_exit_70_with_a_trace() {
    let file = script("print missing;");
    rill()
        .arg(file.path())
        .assert()
        .code(70)
        .stderr(predicate::str::contains("Undefined variable 'missing'."))
        .stderr(predicate::str::contains("[line 1] in script"));
}

#[test]
fn unreadable_script_exits_74() {
    rill()
        .arg("definitely/not/a/real/script.rill")
        .assert()
        .code(74)
        .stderr(predicate::str::contains("could not read script"));
}

#[test]
fn scripts_can_span_multiple_statements() {
    let file = script(
        "fun greet(name) { return \"hello, \" + name; }\n\
         print greet(\"world\");\n\
         for (var i = 0; i < 2; i = i + 1) print i;\n",
    );
    rill()
        .arg(file.path())
        .assert()
        .success()
        .stdout("hello, world\n0\n1\n");
}

#[test]
fn version_flag_prints_and_exits_zero() {
    rill()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("rill"));
}
