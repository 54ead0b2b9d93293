use std::{
    path::PathBuf,
    process::{Command, Stdio},
};

fn bin_path() -> &'static str {
    env!("CARGO_BIN_EXE_result-plan")
}

fn demo(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("demos")
        .join(name)
}

fn run(args: &[&str]) -> std::process::Output {
    Command::new(bin_path())
        .args(args)
        .env_remove("RESULT_PLAN_ADDRESS_ONLY")
        .env_remove("RESULT_PLAN_TRIVIAL")
        .env_remove("RESULT_PLAN_LOG")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("failed to run result-plan")
}

#[test]
fn run_prints_plan_and_listing() {
    let path = demo("pair.toml");
    let output = run(&["run", path.to_str().expect("utf-8 path")]);
    assert!(
        output.status.success(),
        "result-plan failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("scenario: pair"), "{stdout}");
    assert!(stdout.contains("TupleValue of 2"), "{stdout}");
    assert!(stdout.contains("fn @pair {"), "{stdout}");
}

#[test]
fn explain_skips_the_call() {
    let path = demo("scalar.toml");
    let output = run(&["explain", path.to_str().expect("utf-8 path")]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Scalar <- direct at Int -> value"), "{stdout}");
    assert!(!stdout.contains("apply"), "{stdout}");
}

#[test]
fn usage_errors_exit_with_status_two() {
    let output = run(&["frobnicate"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Usage: result-plan"));
}

#[test]
fn missing_scenario_exits_with_status_one() {
    let output = run(&["run", "/nonexistent/scenario.toml"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to read"));
}

#[test]
fn env_override_changes_the_plan() {
    let path = demo("store_whole.toml");
    let output = Command::new(bin_path())
        .args(["explain", path.to_str().expect("utf-8 path")])
        .env("RESULT_PLAN_ADDRESS_ONLY", "Int")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("failed to run result-plan");
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("IndirectStoreFromTemporary"), "{stdout}");
}
