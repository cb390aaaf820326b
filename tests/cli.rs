use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;

fn mdcite_cmd() -> Command {
    Command::cargo_bin("mdcite").expect("binary should build")
}

#[test]
fn numbers_equations_from_stdin() {
    mdcite_cmd()
        .write_stdin("# A\n$$x = 1$$\n## B\n$$y = 2$$\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("\\tag{1.1}"))
        .stdout(predicate::str::contains("\\tag{1.1.1}"));
}

#[test]
fn renders_html_from_stdin() {
    mdcite_cmd()
        .arg("--render")
        .write_stdin("see $\\ref{eq:1.1}$\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("<span class=\"mdcite-tag\">Eq. 1.1</span>"));
}

#[test]
fn rewrites_file_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("note.md");
    fs::write(&file, "# A\n$$x \\tag{9}$$\n").unwrap();

    mdcite_cmd()
        .arg("--in-place")
        .arg(&file)
        .assert()
        .success();

    let out = fs::read_to_string(&file).unwrap();
    assert!(out.contains("\\tag{1.1}"));
    assert!(!out.contains("\\tag{9}"));
}

#[test]
fn vault_mode_propagates_renames_to_backlinks() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("source.md"),
        "# A\n$$x \\tag{9.9}$$\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("citing.md"),
        "see $\\ref{eq:3^9.9}$\n\n[^3]: [[source]]\n",
    )
    .unwrap();

    mdcite_cmd()
        .arg("--vault")
        .arg(dir.path())
        .arg(dir.path().join("source.md"))
        .assert()
        .success()
        .stdout(predicate::str::contains("1 citations updated"));

    let citing = fs::read_to_string(dir.path().join("citing.md")).unwrap();
    assert!(citing.contains("$\\ref{eq:3^1.1}$"));
}

#[test]
fn illegal_nesting_fails_with_line_number() {
    mdcite_cmd()
        .write_stdin("$$a$$b$$c$$\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("line 1"));
}

#[test]
fn typst_flag_switches_annotation_syntax() {
    mdcite_cmd()
        .arg("--typst")
        .write_stdin("# A\n$$x$$\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("#label(\"1.1\")"));
}
