//! Smoke tests for the hwforge binary
//!
//! Runs the compiled CLI in a scratch directory. Pipeline runs use the
//! scripted provider (`--script`), so no API keys or network are needed.

mod test_support;

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

use test_support::*;

/// Command for the hwforge binary, isolated from any user configuration.
fn hwforge_in(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_hwforge"));
    cmd.current_dir(dir)
        .env("HWFORGE_HOME", dir)
        .env_remove("HWFORGE_LLM_PROVIDER")
        .env_remove("RUST_LOG")
        .write_stdin("");
    cmd
}

fn write_script(dir: &Path, responses: &[String]) -> std::path::PathBuf {
    let path = dir.join("responses.json");
    std::fs::write(&path, serde_json::to_string(responses).unwrap()).unwrap();
    path
}

fn run_args<'a>(script: &'a str, extra: &[&'a str]) -> Vec<&'a str> {
    let mut args = vec![
        "run",
        "--project-id",
        "desk-clock",
        "--description",
        "A desk clock with a temperature display",
        "--script",
        script,
    ];
    args.extend_from_slice(extra);
    args
}

#[test]
fn test_help_lists_commands() {
    let temp = TempDir::new().unwrap();
    hwforge_in(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("drc"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_config_shows_defaults_with_sources() {
    let temp = TempDir::new().unwrap();
    hwforge_in(temp.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("accept_threshold = 85  [default]"))
        .stdout(predicate::str::contains("max_loop_attempts = 3"))
        .stdout(predicate::str::contains("auto_answer_modes = [vibe_it]"));
}

#[test]
fn test_config_reports_file_and_cli_sources() {
    let temp = TempDir::new().unwrap();
    let config_dir = temp.path().join(".hwforge");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("config.toml"),
        "[orchestrator]\naccept_threshold = 90\n",
    )
    .unwrap();

    hwforge_in(temp.path())
        .args(["config", "--llm-provider", "openrouter"])
        .assert()
        .success()
        .stdout(predicate::str::contains("accept_threshold = 90  [config file"))
        .stdout(predicate::str::contains("llm_provider = openrouter  [cli]"));
}

#[test]
fn test_missing_config_file_is_an_argument_error() {
    let temp = TempDir::new().unwrap();
    hwforge_in(temp.path())
        .args(["--config", "does-not-exist.toml", "config"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_drc_passes_valid_combination() {
    let temp = TempDir::new().unwrap();
    hwforge_in(temp.path())
        .args(["drc", "esp32-devkit", "usb-c-power", "ssd1306-oled"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3 blocks pass DRC"));
}

#[test]
fn test_drc_errors_exit_with_rejected_code() {
    let temp = TempDir::new().unwrap();
    hwforge_in(temp.path())
        .args(["drc", "ssd1306-oled", "--json"])
        .assert()
        .code(3)
        .stdout(predicate::str::contains("NO_MCU"))
        .stdout(predicate::str::contains("MISSING_POWER_RAIL"));
}

#[test]
fn test_drc_unknown_block_is_an_argument_error() {
    let temp = TempDir::new().unwrap();
    hwforge_in(temp.path())
        .args(["drc", "esp32-devkit", "flux-capacitor"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("flux-capacitor"));
}

#[test]
fn test_scripted_run_completes_and_writes_snapshot() {
    let temp = TempDir::new().unwrap();
    let script = write_script(temp.path(), &happy_path());
    let script = script.to_str().unwrap();

    let output = hwforge_in(temp.path())
        .args(run_args(script, &["--snapshot", "clock.json", "--json-events"]))
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8(output.stdout).unwrap();
    let events: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    let last = events.last().unwrap();
    assert_eq!(last["type"], "complete");
    assert_eq!(last["data"]["status"], "completed");
    assert_eq!(last["data"]["productName"], "Tickle");

    let snapshot: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(temp.path().join("clock.json")).unwrap())
            .unwrap();
    assert_eq!(snapshot["stages"]["export"]["status"], "complete");
    assert_eq!(snapshot["productName"], "Tickle");
}

#[test]
fn test_scripted_run_reads_description_from_stdin() {
    let temp = TempDir::new().unwrap();
    let script = write_script(temp.path(), &happy_path());

    hwforge_in(temp.path())
        .args(["run", "--project-id", "desk-clock", "--script"])
        .arg(&script)
        .write_stdin("A desk clock with a temperature display\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ Completed: Tickle"));
}

#[test]
fn test_empty_stdin_is_an_argument_error() {
    let temp = TempDir::new().unwrap();
    let script = write_script(temp.path(), &happy_path());

    hwforge_in(temp.path())
        .args(["run", "--project-id", "desk-clock", "--script"])
        .arg(&script)
        .write_stdin("")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no description"));
}

#[test]
fn test_rejected_run_exits_with_rejected_code() {
    let temp = TempDir::new().unwrap();
    let script = write_script(
        temp.path(),
        &[r#"{"manufacturable": false, "rejectionReason": "needs FPGA"}"#.to_string()],
    );
    let script = script.to_str().unwrap();

    hwforge_in(temp.path())
        .args(run_args(script, &[]))
        .assert()
        .code(3)
        .stdout(predicate::str::contains("Rejected: needs FPGA"));
}

#[test]
fn test_paused_run_exits_with_needs_input_code() {
    let temp = TempDir::new().unwrap();
    let script = write_script(temp.path(), &[FEASIBLE_WITH_QUESTION.to_string()]);
    let script = script.to_str().unwrap();

    hwforge_in(temp.path())
        .args(run_args(script, &["--mode", "design_it", "--snapshot", "clock.json"]))
        .assert()
        .code(4)
        .stdout(predicate::str::contains("Needs input at spec (open_questions)"));

    let snapshot: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(temp.path().join("clock.json")).unwrap())
            .unwrap();
    assert_eq!(snapshot["stages"]["spec"]["status"], "in_progress");
    assert!(snapshot["feasibility"]["openQuestions"].is_array());
}

#[test]
fn test_llm_failure_during_run_exits_internal() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("responses.json");
    std::fs::write(&path, r#"[{"error": "connection reset by peer"}]"#).unwrap();

    hwforge_in(temp.path())
        .args(run_args(path.to_str().unwrap(), &[]))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Run failed"));
}

#[test]
fn test_unknown_mode_is_rejected_by_the_parser() {
    let temp = TempDir::new().unwrap();
    hwforge_in(temp.path())
        .args(["run", "--project-id", "p", "--mode", "yolo", "--description", "x"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown mode 'yolo'"));
}
