use std::{fs, path::Path, process::Command};

fn polylife() -> Command {
    Command::new(env!("CARGO_BIN_EXE_polylife"))
}

fn run_small(args: &[&str], input: &Path, output: &Path, generations: &str) -> std::process::Output {
    polylife()
        .args(args)
        .args(["--rows", "5", "--cols", "5"])
        .arg(input)
        .arg(output)
        .arg(generations)
        .output()
        .unwrap()
}

const BLINKER: &str = ".....\n.....\n.***.\n.....\n.....\n";
const BLINKER_NEXT: &str = ".....\n..*..\n..*..\n..*..\n.....\n";

#[test]
fn missing_arguments_print_usage() {
    let output = polylife().arg("input.txt").output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("too few arguments"), "{stderr}");
    assert!(stderr.contains("Usage:"), "{stderr}");
}

#[test]
fn invalid_generation_count_fails() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.txt");
    fs::write(&input, BLINKER).unwrap();
    let output = run_small(&[], &input, &dir.path().join("out.txt"), "many");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("error: invalid number of generations"), "{stderr}");
}

#[test]
fn zero_generations_reproduce_input() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.txt");
    let output = dir.path().join("out.txt");
    fs::write(&input, BLINKER).unwrap();
    let result = run_small(&[], &input, &output, "0");
    assert!(result.status.success());
    assert_eq!(fs::read_to_string(&output).unwrap(), BLINKER);
}

#[test]
fn all_counters_advance_blinker() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.txt");
    fs::write(&input, BLINKER).unwrap();
    for counter in ["--native", "--inplace", "--tree"] {
        let output = dir.path().join("out.txt");
        let result = run_small(&[counter], &input, &output, "1");
        assert!(result.status.success(), "{counter}");
        assert_eq!(fs::read_to_string(&output).unwrap(), BLINKER_NEXT, "{counter}");
    }
}

#[test]
fn custom_script_is_used() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.txt");
    let output = dir.path().join("out.txt");
    let script = dir.path().join("three.js");
    fs::write(&input, BLINKER).unwrap();
    fs::write(&script, "function three(g, r, c) { return 3; }\nthree\n").unwrap();
    let result = run_small(&["-s", script.to_str().unwrap()], &input, &output, "1");
    assert!(result.status.success());
    assert_eq!(fs::read_to_string(&output).unwrap(), "*****\n".repeat(5));
}

#[test]
fn missing_input_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("missing.txt");
    let output = run_small(&[], &input, &dir.path().join("out.txt"), "1");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.starts_with("error: failed to access"), "{stderr}");
}

#[test]
fn short_input_fails() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.txt");
    fs::write(&input, ".....\n.....\n").unwrap();
    let output = run_small(&[], &input, &dir.path().join("out.txt"), "1");
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn surplus_arguments_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.txt");
    let output = dir.path().join("out.txt");
    fs::write(&input, BLINKER).unwrap();
    let result = polylife()
        .args(["--rows", "5", "--cols", "5"])
        .arg(&input)
        .arg(&output)
        .args(["1", "extra"])
        .output()
        .unwrap();
    assert!(result.status.success());
    let stderr = String::from_utf8(result.stderr).unwrap();
    assert!(stderr.contains("extra: ignoring surplus argument"), "{stderr}");
    assert_eq!(fs::read_to_string(&output).unwrap(), BLINKER_NEXT);
}

#[test]
fn oversized_grid_fails() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.txt");
    fs::write(&input, BLINKER).unwrap();
    let result = polylife()
        .args(["--rows", &usize::MAX.to_string(), "--cols", "2"])
        .arg(&input)
        .arg(dir.path().join("out.txt"))
        .arg("1")
        .output()
        .unwrap();
    assert_eq!(result.status.code(), Some(1));
    let stderr = String::from_utf8(result.stderr).unwrap();
    assert!(stderr.starts_with("error: grid of"), "{stderr}");
}

#[test]
fn non_utf8_input_is_read() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.txt");
    let output = dir.path().join("out.txt");
    fs::write(&input, b".....\n.....\n.***\xff\n.....\n.....\n").unwrap();
    let result = run_small(&[], &input, &output, "1");
    assert!(result.status.success());
    assert_eq!(fs::read_to_string(&output).unwrap(), BLINKER_NEXT);
}

#[test]
fn stats_are_printed() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.txt");
    fs::write(&input, BLINKER).unwrap();
    let output = run_small(&["--stats"], &input, &dir.path().join("out.txt"), "2");
    assert!(output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("generations: 2"), "{stderr}");
    assert!(stderr.contains("live cells:  3"), "{stderr}");
}
