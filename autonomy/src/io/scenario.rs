//! Scenario documents (TOML) for the simulation runner.
//!
//! A scenario lists tasks by name. Tasks with a `start` mode are top-level;
//! every other task must be claimed by exactly one parent through its
//! `requirements` or `passives` list.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartMode {
    Queue,
    Constant,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScenarioTask {
    pub name: String,
    pub priority: i32,
    pub start: Option<StartMode>,
    /// Tick count after which the task is started (0 = before the first tick).
    pub start_tick: u64,
    pub requirements: Vec<String>,
    pub passives: Vec<String>,
    pub tags: Vec<String>,
    /// Succeed on this many fixed updates since the last registration.
    pub succeed_after: Option<u64>,
    /// Fail on this many fixed updates since the last registration.
    pub fail_after: Option<u64>,
    pub fail_reason: Option<String>,
    /// Ticks a success keeps holding as a requirement before it lapses.
    pub lapse_after: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Expectations {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
    pub interrupted: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Scenario {
    /// Overrides the configured `max_ticks`.
    pub max_ticks: Option<u64>,
    #[serde(rename = "task")]
    pub tasks: Vec<ScenarioTask>,
    pub expect: Option<Expectations>,
}

impl Scenario {
    pub fn task(&self, name: &str) -> Option<&ScenarioTask> {
        self.tasks.iter().find(|task| task.name == name)
    }
}

/// Load and validate a scenario from disk.
pub fn load_scenario(path: &Path) -> Result<Scenario> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("read scenario {}", path.display()))?;
    parse_scenario(&raw).with_context(|| format!("load scenario {}", path.display()))
}

pub fn parse_scenario(raw: &str) -> Result<Scenario> {
    let scenario: Scenario = toml::from_str(raw).context("parse scenario toml")?;
    let errors = scenario_invariants(&scenario);
    if !errors.is_empty() {
        bail!("invariant violations:\n- {}", errors.join("\n- "));
    }
    Ok(scenario)
}

/// Structural checks:
/// - task names are non-empty and unique
/// - referenced children exist, are not top-level, and have one parent
/// - every non-top-level task is claimed by some parent
/// - parent links form no cycle
/// - scripted outcomes are consistent and expectations name known tasks
pub fn scenario_invariants(scenario: &Scenario) -> Vec<String> {
    let mut errors = Vec::new();
    let mut names = HashSet::new();
    for task in &scenario.tasks {
        if task.name.trim().is_empty() {
            errors.push("task with empty name".to_string());
        } else if !names.insert(task.name.as_str()) {
            errors.push(format!("duplicate task '{}'", task.name));
        }
        if task.succeed_after.is_some() && task.fail_after.is_some() {
            errors.push(format!(
                "{}: succeed_after and fail_after are mutually exclusive",
                task.name
            ));
        }
        if task.succeed_after == Some(0) || task.fail_after == Some(0) {
            errors.push(format!("{}: outcome ticks must be > 0", task.name));
        }
        if task.fail_reason.is_some() && task.fail_after.is_none() {
            errors.push(format!("{}: fail_reason requires fail_after", task.name));
        }
        if task.start.is_none() && task.start_tick > 0 {
            errors.push(format!("{}: start_tick requires start", task.name));
        }
    }

    let mut parents: HashMap<&str, &str> = HashMap::new();
    for task in &scenario.tasks {
        for child in task.requirements.iter().chain(task.passives.iter()) {
            match scenario.task(child) {
                None => errors.push(format!("{}: unknown child '{}'", task.name, child)),
                Some(found) if found.start.is_some() => errors.push(format!(
                    "{}: child '{}' is started on its own",
                    task.name, child
                )),
                Some(_) => {
                    if let Some(previous) = parents.insert(child.as_str(), task.name.as_str()) {
                        errors.push(format!(
                            "'{}' is a child of both '{}' and '{}'",
                            child, previous, task.name
                        ));
                    }
                }
            }
        }
    }

    for task in &scenario.tasks {
        if task.start.is_none() && !parents.contains_key(task.name.as_str()) {
            errors.push(format!("{}: never started and has no parent", task.name));
        }
        if task.lapse_after.is_some() && task.succeed_after.is_none() {
            errors.push(format!("{}: lapse_after requires succeed_after", task.name));
        }
        let mut seen = HashSet::from([task.name.as_str()]);
        let mut current = task.name.as_str();
        while let Some(&parent) = parents.get(current) {
            if !seen.insert(parent) {
                errors.push(format!("{}: parent links form a cycle", task.name));
                break;
            }
            current = parent;
        }
    }

    if let Some(expect) = &scenario.expect {
        let listed = expect
            .succeeded
            .iter()
            .chain(expect.failed.iter())
            .chain(expect.interrupted.iter());
        for name in listed {
            if !names.contains(name.as_str()) {
                errors.push(format!("expect: unknown task '{}'", name));
            }
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    const FETCH: &str = r#"
max_ticks = 30

[[task]]
name = "fetch"
priority = 5
start = "queue"
requirements = ["walk"]
passives = ["hum"]

[[task]]
name = "walk"
succeed_after = 2

[[task]]
name = "hum"

[expect]
succeeded = ["walk"]
"#;

    #[test]
    fn parses_scenario() {
        let scenario = parse_scenario(FETCH).expect("parse");
        assert_eq!(scenario.max_ticks, Some(30));
        assert_eq!(scenario.tasks.len(), 3);
        let fetch = scenario.task("fetch").expect("fetch");
        assert_eq!(fetch.start, Some(StartMode::Queue));
        assert_eq!(fetch.requirements, vec!["walk"]);
        assert_eq!(scenario.task("walk").expect("walk").succeed_after, Some(2));
        assert_eq!(
            scenario.expect.as_ref().map(|expect| expect.succeeded.clone()),
            Some(vec!["walk".to_string()])
        );
    }

    #[test]
    fn rejects_unknown_fields() {
        let raw = "[[task]]\nname = \"a\"\nstart = \"queue\"\nretries = 3\n";
        assert!(parse_scenario(raw).is_err());
    }

    #[test]
    fn rejects_orphans_and_double_parents() {
        let raw = r#"
[[task]]
name = "a"
start = "queue"
requirements = ["c"]

[[task]]
name = "b"
start = "queue"
passives = ["c"]

[[task]]
name = "c"

[[task]]
name = "lost"
"#;
        let err = parse_scenario(raw).expect_err("invalid");
        let message = format!("{:#}", err);
        assert!(message.contains("'c' is a child of both 'a' and 'b'"), "{message}");
        assert!(message.contains("lost: never started and has no parent"), "{message}");
    }

    #[test]
    fn rejects_cycles_and_conflicting_outcomes() {
        let raw = r#"
[[task]]
name = "x"
requirements = ["y"]
succeed_after = 1
fail_after = 1

[[task]]
name = "y"
requirements = ["x"]
"#;
        let errors = scenario_invariants(&toml::from_str(raw).expect("toml"));
        assert!(errors.iter().any(|error| error.contains("form a cycle")));
        assert!(errors.iter().any(|error| error.contains("mutually exclusive")));
    }

    #[test]
    fn rejects_unknown_expectations() {
        let raw = r#"
[[task]]
name = "a"
start = "constant"

[expect]
failed = ["b"]
"#;
        let err = parse_scenario(raw).expect_err("invalid");
        assert!(format!("{:#}", err).contains("expect: unknown task 'b'"));
    }
}
