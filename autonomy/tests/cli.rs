//! CLI tests for `autonomy` subcommands.
//!
//! Spawns the binary against temp fixtures and verifies exit codes and the
//! lines printed for found routes.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use autonomy::exit_codes;

const POSES: &str = r#"{
    "body_sets": [
        {"name": "stand", "transitions": {"sit": {"clip": "stand_to_sit"}}},
        {"name": "sit", "transitions": {"lie": {"clip": "sit_to_lie"}}},
        {"name": "lie", "animations": {"idle": {"clip": "lie_idle", "looping": true}}}
    ]
}"#;

const KITCHEN: &str = r#"{
    "interactions": [
        {"name": "wash", "input": {"require": ["vegetable", "dirty"]},
         "output": {"require": ["vegetable", "clean"]}},
        {"name": "chop", "input": {"require": ["clean"], "forbid": ["chopped"]},
         "output": {"require": ["vegetable", "chopped"]}},
        {"name": "cook", "input": {"require": ["chopped"]}, "secondary": {"require": ["pot"]},
         "output": {"require": ["meal"]}}
    ]
}"#;

fn autonomy(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_autonomy"))
        .current_dir(dir)
        .args(args)
        .output()
        .expect("run autonomy")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn simulate_passing_scenario_exits_ok() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(
        temp.path().join("fetch.toml"),
        r#"
[[task]]
name = "fetch"
start = "queue"
requirements = ["walk"]
succeed_after = 1

[[task]]
name = "walk"
succeed_after = 2

[expect]
succeeded = ["fetch", "walk"]
"#,
    )
    .expect("write scenario");

    let output = autonomy(temp.path(), &["simulate", "fetch.toml", "--transcript"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK), "{:?}", output);
    let printed = stdout(&output);
    assert!(printed.contains("fetch: succeeded"), "{printed}");
    assert!(printed.contains("walk"), "{printed}");
}

#[test]
fn simulate_mismatch_exits_with_mismatch_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(
        temp.path().join("stuck.toml"),
        r#"
max_ticks = 4

[[task]]
name = "wait"
start = "queue"

[expect]
succeeded = ["wait"]
"#,
    )
    .expect("write scenario");

    let output = autonomy(temp.path(), &["simulate", "stuck.toml"]);
    assert_eq!(output.status.code(), Some(exit_codes::EXPECTATION_MISMATCH));
    let errors = String::from_utf8_lossy(&output.stderr);
    assert!(errors.contains("expected 'wait' to succeed"), "{errors}");
}

#[test]
fn simulate_uses_config_from_working_directory() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join("autonomy.toml"), "max_ticks = 3\n").expect("write config");
    fs::write(
        temp.path().join("forever.toml"),
        "[[task]]\nname = \"forever\"\nstart = \"queue\"\n",
    )
    .expect("write scenario");

    let output = autonomy(temp.path(), &["simulate", "forever.toml"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(stdout(&output).contains("ticks: 3"));
}

#[test]
fn path_prints_route_and_animations() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join("poses.json"), POSES).expect("write graph");

    let output = autonomy(
        temp.path(),
        &["path", "--graph", "poses.json", "--from", "stand", "--to", "lie"],
    );
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let printed = stdout(&output);
    let lines: Vec<&str> = printed.lines().collect();
    assert_eq!(lines, vec!["stand -> sit -> lie", "stand_to_sit", "sit_to_lie"]);
}

#[test]
fn path_unreachable_exits_with_no_path_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join("poses.json"), POSES).expect("write graph");

    let output = autonomy(
        temp.path(),
        &["path", "--graph", "poses.json", "--from", "lie", "--to", "stand"],
    );
    assert_eq!(output.status.code(), Some(exit_codes::NO_PATH));
}

#[test]
fn craft_prints_interactions_in_order() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join("kitchen.json"), KITCHEN).expect("write recipes");

    let output = autonomy(
        temp.path(),
        &[
            "craft",
            "--recipes",
            "kitchen.json",
            "--have",
            "vegetable,dirty",
            "--want",
            "meal",
        ],
    );
    assert_eq!(output.status.code(), Some(exit_codes::OK), "{:?}", output);
    let printed = stdout(&output);
    assert_eq!(printed.lines().collect::<Vec<_>>(), vec!["wash", "chop", "cook"]);

    let output = autonomy(
        temp.path(),
        &["craft", "--recipes", "kitchen.json", "--have", "stone", "--want", "meal"],
    );
    assert_eq!(output.status.code(), Some(exit_codes::NO_PATH));
}

#[test]
fn check_rejects_invalid_graph() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(
        temp.path().join("bad.json"),
        r#"{"body_sets": [{"name": "stand", "transitions": {"fly": {"clip": "jump"}}}]}"#,
    )
    .expect("write graph");

    let output = autonomy(temp.path(), &["check", "--graph", "bad.json"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let errors = String::from_utf8_lossy(&output.stderr);
    assert!(errors.contains("unknown body set 'fly'"), "{errors}");
}

#[test]
fn check_accepts_valid_documents() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join("poses.json"), POSES).expect("write graph");
    fs::write(temp.path().join("kitchen.json"), KITCHEN).expect("write recipes");

    let output = autonomy(
        temp.path(),
        &["check", "--graph", "poses.json", "--recipes", "kitchen.json"],
    );
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let printed = stdout(&output);
    assert!(printed.contains("3 body sets, 2 transitions"), "{printed}");
    assert!(printed.contains("3 interactions"), "{printed}");
}
