//! Scenario simulation for `autonomy simulate`.
//!
//! Builds the task trees a scenario describes, drives a real scheduler frame
//! by frame, and records every lifecycle event into a transcript.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result, bail};
use tracing::{debug, info, instrument, warn};

use crate::core::attach::Placement;
use crate::core::autonomy::Autonomy;
use crate::core::invariants;
use crate::core::kinds::{Script, scripted_task};
use crate::core::task::{Completion, TaskId};
use crate::io::config::AutonomyConfig;
use crate::io::scenario::{Scenario, StartMode, load_scenario};

/// One lifecycle event seen during a simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Started,
    Registered,
    Unregistered,
    Reset,
    Interrupted,
    Succeeded,
    Failed { reason: String },
    Exited,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Started => write!(f, "started"),
            Event::Registered => write!(f, "registered"),
            Event::Unregistered => write!(f, "unregistered"),
            Event::Reset => write!(f, "reset"),
            Event::Interrupted => write!(f, "interrupted"),
            Event::Succeeded => write!(f, "succeeded"),
            Event::Failed { reason } => write!(f, "failed: {}", reason),
            Event::Exited => write!(f, "exited"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub tick: u64,
    pub task: String,
    pub event: Event,
}

impl fmt::Display for TranscriptEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tick {:>4}  {:<20} {}", self.tick, self.task, self.event)
    }
}

/// Final completion state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed,
    Unfinished,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Outcome::Succeeded => "succeeded",
            Outcome::Failed => "failed",
            Outcome::Unfinished => "is unfinished",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub name: String,
    pub outcome: Outcome,
    pub registrations: usize,
    pub interruptions: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationReport {
    pub ticks: u64,
    pub transcript: Vec<TranscriptEntry>,
    pub tasks: Vec<TaskReport>,
    /// Expectations from the scenario that did not hold.
    pub mismatches: Vec<String>,
    /// Hierarchy invariant violations, prefixed with the tick they appeared on.
    pub violations: Vec<String>,
}

impl SimulationReport {
    pub fn passed(&self) -> bool {
        self.mismatches.is_empty() && self.violations.is_empty()
    }

    pub fn task(&self, name: &str) -> Option<&TaskReport> {
        self.tasks.iter().find(|task| task.name == name)
    }
}

/// Load a scenario from disk and simulate it.
pub fn simulate_file(path: &Path, config: &AutonomyConfig) -> Result<SimulationReport> {
    let scenario = load_scenario(path)?;
    simulate(&scenario, config).with_context(|| format!("simulate {}", path.display()))
}

type Transcript = Rc<RefCell<Vec<TranscriptEntry>>>;

/// Run `scenario` until every started task has left the scheduler or the
/// tick limit is reached.
#[instrument(skip_all, fields(tasks = scenario.tasks.len()))]
pub fn simulate(scenario: &Scenario, config: &AutonomyConfig) -> Result<SimulationReport> {
    config.validate()?;
    let mut autonomy = Autonomy::with_tick_rate("scenario", config.fixed_tick_rate_hz);
    let transcript: Transcript = Rc::default();
    let ids = build_tasks(&mut autonomy, scenario, &transcript)?;

    let max_ticks = scenario.max_ticks.unwrap_or(config.max_ticks);
    let mut starts: Vec<_> = scenario
        .tasks
        .iter()
        .filter_map(|task| task.start.map(|mode| (task, mode)))
        .collect();
    starts.sort_by_key(|(task, _)| task.start_tick);
    let mut next_start = 0;
    let mut violations = Vec::new();

    while autonomy.tick_count() < max_ticks {
        while let Some(&(task, mode)) = starts.get(next_start) {
            if task.start_tick > autonomy.tick_count() {
                break;
            }
            let id = ids[&task.name];
            let started = match mode {
                StartMode::Queue => autonomy.start(id, "scenario", task.name.clone(), task.priority),
                StartMode::Constant => autonomy.start_constant(id, "scenario", task.name.clone()),
            };
            if !started {
                bail!("scheduler refused to start '{}'", task.name);
            }
            push(&transcript, autonomy.tick_count(), &task.name, Event::Started);
            next_start += 1;
        }

        autonomy.tick();

        if violations.is_empty() {
            let tick = autonomy.tick_count();
            violations.extend(
                invariants::check(&autonomy)
                    .into_iter()
                    .map(|violation| format!("tick {tick}: {violation}")),
            );
            if !violations.is_empty() {
                warn!(tick, count = violations.len(), "hierarchy invariants violated");
            }
        }

        let idle = autonomy.queue().is_empty()
            && autonomy.staged().is_empty()
            && autonomy.constants().is_empty();
        if idle && next_start == starts.len() {
            debug!(tick = autonomy.tick_count(), "scheduler idle");
            break;
        }
    }

    let transcript = transcript.take();
    let tasks = scenario
        .tasks
        .iter()
        .map(|task| task_report(&autonomy, ids[&task.name], &task.name, &transcript))
        .collect::<Vec<_>>();
    let mut report = SimulationReport {
        ticks: autonomy.tick_count(),
        transcript,
        tasks,
        mismatches: Vec::new(),
        violations,
    };
    report.mismatches = check_expectations(scenario, &report);
    info!(
        ticks = report.ticks,
        events = report.transcript.len(),
        mismatches = report.mismatches.len(),
        "simulation finished"
    );
    Ok(report)
}

fn build_tasks(
    autonomy: &mut Autonomy,
    scenario: &Scenario,
    transcript: &Transcript,
) -> Result<HashMap<String, TaskId>> {
    let mut ids = HashMap::new();
    for task in &scenario.tasks {
        let script = Script {
            succeed_after: task.succeed_after,
            fail_after: task.fail_after,
            fail_reason: task.fail_reason.clone(),
            lapse_after: task.lapse_after,
        };
        let id = scripted_task(autonomy, task.name.clone(), &script);
        autonomy.set_priority(id, task.priority);
        for tag in &task.tags {
            autonomy.add_tag(id, tag.clone());
        }
        record_lifecycle(autonomy, id, transcript);
        ids.insert(task.name.clone(), id);
    }

    for task in &scenario.tasks {
        let parent = ids[&task.name];
        for child in &task.requirements {
            autonomy
                .try_add_requirement(parent, ids[child], Placement::Last)
                .with_context(|| format!("attach requirement '{}' to '{}'", child, task.name))?;
        }
        for child in &task.passives {
            autonomy
                .try_add_passive(parent, ids[child])
                .with_context(|| format!("attach passive '{}' to '{}'", child, task.name))?;
        }
    }
    Ok(ids)
}

fn push(transcript: &Transcript, tick: u64, task: &str, event: Event) {
    transcript.borrow_mut().push(TranscriptEntry {
        tick,
        task: task.to_string(),
        event,
    });
}

fn record_lifecycle(autonomy: &mut Autonomy, id: TaskId, transcript: &Transcript) {
    fn recorder(
        transcript: &Transcript,
        event: Event,
    ) -> impl Fn(&mut Autonomy, TaskId) + 'static {
        let transcript = Rc::clone(transcript);
        move |autonomy: &mut Autonomy, id: TaskId| {
            let name = autonomy.task(id).map(|task| task.name().to_string());
            push(
                &transcript,
                autonomy.tick_count(),
                &name.unwrap_or_else(|| id.to_string()),
                event.clone(),
            );
        }
    }

    autonomy.on_registered(id, recorder(transcript, Event::Registered));
    autonomy.on_unregistered(id, recorder(transcript, Event::Unregistered));
    autonomy.on_reset(id, recorder(transcript, Event::Reset));
    autonomy.on_interrupted(id, recorder(transcript, Event::Interrupted));
    autonomy.on_success(id, recorder(transcript, Event::Succeeded));
    autonomy.on_autonomy_exit(id, recorder(transcript, Event::Exited));
    let failures = Rc::clone(transcript);
    autonomy.on_fail(id, move |autonomy, id, reason| {
        let name = autonomy.task(id).map(|task| task.name().to_string());
        push(
            &failures,
            autonomy.tick_count(),
            &name.unwrap_or_else(|| id.to_string()),
            Event::Failed {
                reason: reason.to_string(),
            },
        );
    });
}

fn task_report(
    autonomy: &Autonomy,
    id: TaskId,
    name: &str,
    transcript: &[TranscriptEntry],
) -> TaskReport {
    let outcome = match autonomy.task(id).map(|task| task.completion()) {
        Some(Completion::Succeeded { .. }) => Outcome::Succeeded,
        Some(Completion::Failed { .. }) => Outcome::Failed,
        _ => Outcome::Unfinished,
    };
    let count = |wanted: &Event| {
        transcript
            .iter()
            .filter(|entry| entry.task == name && &entry.event == wanted)
            .count()
    };
    TaskReport {
        name: name.to_string(),
        outcome,
        registrations: count(&Event::Registered),
        interruptions: count(&Event::Interrupted),
    }
}

fn check_expectations(scenario: &Scenario, report: &SimulationReport) -> Vec<String> {
    let Some(expect) = &scenario.expect else {
        return Vec::new();
    };
    let mut mismatches = Vec::new();
    let outcome_checks = [
        (&expect.succeeded, Outcome::Succeeded, "succeed"),
        (&expect.failed, Outcome::Failed, "fail"),
    ];
    for (names, wanted, verb) in outcome_checks {
        for name in names {
            match report.task(name) {
                Some(task) if task.outcome == wanted => {}
                Some(task) => mismatches.push(format!(
                    "expected '{}' to {}, but it {}",
                    name, verb, task.outcome
                )),
                None => mismatches.push(format!("expected task '{}' is missing", name)),
            }
        }
    }
    for name in &expect.interrupted {
        let interrupted = report.task(name).is_some_and(|task| task.interruptions > 0);
        if !interrupted {
            mismatches.push(format!("expected '{}' to be interrupted", name));
        }
    }
    mismatches
}
