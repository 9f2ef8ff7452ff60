use std::process::Command;

#[test]
fn cli_mode_with_config_and_dry_run_works() {
    let binary_path = env!("CARGO_BIN_EXE_tailpane");
    let config_path = format!("{}/demos/tailpane.yaml", env!("CARGO_MANIFEST_DIR"));

    let output = Command::new(binary_path)
        .arg("--config")
        .arg(config_path)
        .arg("--source")
        .arg("build")
        .arg("--dry-run")
        .arg("--log-level")
        .arg("error")
        .output()
        .expect("Failed to start tailpane binary");

    assert!(
        output.status.success(),
        "Process exited with non-zero status: {}\nStdout: {}\nStderr: {}",
        output.status,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn cli_mode_accepts_ad_hoc_command() {
    let output = Command::new(env!("CARGO_BIN_EXE_tailpane"))
        .args(["--dry-run", "--log-level", "error", "--", "echo", "hello"])
        .output()
        .expect("Failed to start tailpane binary");
    assert!(output.status.success());
}

#[test]
fn cli_mode_rejects_unknown_source() {
    let config_path = format!("{}/demos/tailpane.yaml", env!("CARGO_MANIFEST_DIR"));
    let output = Command::new(env!("CARGO_BIN_EXE_tailpane"))
        .args(["--config", &config_path, "--source", "nope", "--dry-run"])
        .args(["--log-level", "error"])
        .output()
        .expect("Failed to start tailpane binary");
    assert!(!output.status.success());
}

#[test]
fn cli_mode_without_sources_fails() {
    let output = Command::new(env!("CARGO_BIN_EXE_tailpane"))
        .args(["--dry-run", "--log-level", "error"])
        .output()
        .expect("Failed to start tailpane binary");
    assert!(!output.status.success());
}

#[test]
fn cli_mode_dump_prints_command_output() {
    let output = Command::new(env!("CARGO_BIN_EXE_tailpane"))
        .args(["--dump", "--log-level", "error", "--"])
        .args(["sh", "-c", "echo one; echo two >&2"])
        .output()
        .expect("Failed to start tailpane binary");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut lines = stdout.lines();
    let mut dumped = [lines.next(), lines.next()];
    dumped.sort();
    assert_eq!(dumped, [Some("one"), Some("two")]);
    assert!(stdout.contains("Press enter to return"));
}
