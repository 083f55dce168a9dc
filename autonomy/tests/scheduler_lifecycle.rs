//! End-to-end scheduler and search scenarios through the public API.
//!
//! These tests drive `Autonomy::validate` across several passes and check
//! the hook traffic recorded for each task: queue ordering, requirement
//! short-circuiting, re-arming, and single-branch registration.

use std::cell::Cell;
use std::rc::Rc;

use autonomy::core::autonomy::Autonomy;
use autonomy::core::invariants;
use autonomy::core::kinds::{condition_task, timer_task};
use autonomy::core::search::{PathSearch, TransitionGraph};
use autonomy::test_support::{Recorder, leaf_task};

/// Adjacency lists; edge payload is `(from, to)`.
struct Adjacency(Vec<Vec<usize>>);

impl TransitionGraph for Adjacency {
    type Node = usize;
    type Edge = (usize, usize);

    fn successors(&self, node: usize, out: &mut Vec<((usize, usize), usize)>) {
        out.extend(self.0[node].iter().map(|&target| ((node, target), target)));
    }
}

/// Single-step scenario: one queued task succeeds on its first fixed update.
///
/// Pass 1 flushes staging into the queue; pass 2 runs the task, which
/// succeeds, leaves the queue, and exits exactly once.
#[test]
fn queued_task_succeeds_and_exits_once() {
    let mut autonomy = Autonomy::new("npc");
    let recorder = Recorder::default();
    let wave = autonomy.create_task("wave");
    recorder.watch(&mut autonomy, wave);
    autonomy.on_fixed_update(wave, |autonomy, id| autonomy.succeed(id));

    assert!(autonomy.start(wave, "test", "wave", 0));
    autonomy.validate();
    assert_eq!(autonomy.queue(), &[wave]);

    autonomy.validate();
    assert!(autonomy.queue().is_empty());
    assert_eq!(recorder.count("wave", "success"), 1);
    assert_eq!(recorder.count("wave", "exit"), 1);
    assert_eq!(recorder.count("wave", "fail"), 0);

    autonomy.validate();
    assert_eq!(recorder.count("wave", "success"), 1);
}

#[test]
fn higher_priority_runs_first_and_alone() {
    let mut autonomy = Autonomy::new("npc");
    let recorder = Recorder::default();
    let a = leaf_task(&mut autonomy, "a");
    let b = leaf_task(&mut autonomy, "b");
    recorder.watch(&mut autonomy, a);
    recorder.watch(&mut autonomy, b);

    autonomy.start(a, "test", "a", 5);
    autonomy.start(b, "test", "b", 10);
    autonomy.validate();
    assert_eq!(autonomy.queue(), &[b, a]);

    autonomy.validate();
    assert_eq!(recorder.count("b", "fixed"), 1);
    assert_eq!(recorder.count("a", "fixed"), 0);
    assert_eq!(autonomy.current(), Some(b));
}

/// Requirement ordering: R1 fails while R2 and R3 are pending, so the parent
/// fails in the same pass and the later requirements never register.
#[test]
fn first_requirement_failure_short_circuits() {
    let mut autonomy = Autonomy::new("npc");
    let recorder = Recorder::default();
    let parent = leaf_task(&mut autonomy, "parent");
    let r1 = autonomy.create_task("r1");
    let r2 = leaf_task(&mut autonomy, "r2");
    let r3 = leaf_task(&mut autonomy, "r3");
    for id in [parent, r1, r2, r3] {
        recorder.watch(&mut autonomy, id);
    }
    autonomy.on_fixed_update(r1, |autonomy, id| autonomy.fail(id, "path blocked"));
    for child in [r1, r2, r3] {
        assert!(autonomy.add_requirement(parent, child));
    }

    autonomy.start(parent, "test", "parent", 0);
    autonomy.validate();
    autonomy.validate();

    let parent_task = autonomy.task(parent).expect("parent");
    assert!(parent_task.completion().failed());
    assert_eq!(
        parent_task.failure_reason(),
        Some("requirement 'r1' failed: path blocked")
    );
    assert_eq!(recorder.names_for("fail"), vec!["r1", "parent"]);
    assert_eq!(recorder.count("r2", "registered"), 0);
    assert_eq!(recorder.count("r3", "registered"), 0);
    assert!(autonomy.queue().is_empty());
}

#[test]
fn last_terminal_call_decides_completion() {
    let mut autonomy = Autonomy::new("npc");
    let task = leaf_task(&mut autonomy, "task");

    autonomy.succeed(task);
    autonomy.fail(task, "changed my mind");
    let completion = autonomy.task(task).expect("task").completion();
    assert!(completion.failed() && !completion.succeeded());

    autonomy.succeed(task);
    let completion = autonomy.task(task).expect("task").completion();
    assert!(completion.succeeded() && !completion.failed());
}

/// Re-arming: a succeeded requirement whose condition lapses returns to
/// unfinished, suspends its parent, and reports success once per episode.
#[test]
fn lapsed_requirement_reruns_without_duplicate_success() {
    let mut autonomy = Autonomy::new("npc");
    let recorder = Recorder::default();
    let near = Rc::new(Cell::new(false));
    let watched = Rc::clone(&near);
    let approach = condition_task(&mut autonomy, "approach", move |_| watched.get());
    let talk = leaf_task(&mut autonomy, "talk");
    recorder.watch(&mut autonomy, approach);
    recorder.watch(&mut autonomy, talk);
    autonomy.add_requirement(talk, approach);
    autonomy.start(talk, "test", "talk", 0);
    autonomy.validate();

    near.set(true);
    autonomy.validate();
    assert_eq!(recorder.count("approach", "success"), 1);
    assert!(autonomy.task(talk).expect("talk").is_registered());

    near.set(false);
    autonomy.validate();
    assert_eq!(recorder.count("approach", "reset"), 1);
    assert_eq!(recorder.count("approach", "success"), 1);
    assert_eq!(recorder.count("talk", "interrupted"), 1);
    assert!(!autonomy.task(talk).expect("talk").is_registered());

    autonomy.validate();
    assert!(autonomy.task(approach).expect("approach").is_registered());
    autonomy.validate();
    assert_eq!(recorder.count("approach", "success"), 1);

    near.set(true);
    autonomy.validate();
    assert_eq!(recorder.count("approach", "success"), 2);
    assert!(autonomy.task(talk).expect("talk").is_registered());
}

/// Single active branch: when the head of the queue changes, the previous
/// branch is unregistered before the new one registers.
#[test]
fn switching_branches_unregisters_previous_first() {
    let mut autonomy = Autonomy::new("npc");
    let recorder = Recorder::default();
    let idle = leaf_task(&mut autonomy, "idle");
    let step = leaf_task(&mut autonomy, "step");
    let flee = timer_task(&mut autonomy, "flee", 2);
    autonomy.add_requirement(idle, step);
    for id in [idle, step, flee] {
        recorder.watch(&mut autonomy, id);
    }

    autonomy.start(idle, "test", "idle", 0);
    autonomy.validate();
    autonomy.validate();
    assert!(autonomy.task(step).expect("step").is_registered());

    autonomy.start(flee, "test", "flee", 9);
    autonomy.validate();
    recorder.clear();
    autonomy.validate();

    let events = recorder.events();
    let unregistered = events
        .iter()
        .position(|(name, event)| name == "step" && event == "unregistered")
        .expect("step unregistered");
    let registered = events
        .iter()
        .position(|(name, event)| name == "flee" && event == "registered")
        .expect("flee registered");
    assert!(unregistered < registered);
    assert_eq!(recorder.count("step", "interrupted"), 1);
    assert!(invariants::check(&autonomy).is_empty());

    autonomy.validate();
    autonomy.validate();
    assert_eq!(recorder.count("flee", "success"), 1);
    assert!(autonomy.task(step).expect("step").is_registered());
    assert!(invariants::check(&autonomy).is_empty());
}

#[test]
fn search_returns_immediately_when_start_matches() {
    let graph = Adjacency(vec![vec![1], vec![0]]);
    let mut search = PathSearch::new();
    let route = search.find_route(&graph, 0, |node| node == 0).expect("route");
    assert!(route.is_empty());
    assert_eq!(route.expanded, 0);
}

#[test]
fn search_follows_single_edge() {
    let graph = Adjacency(vec![vec![1], vec![]]);
    let mut search = PathSearch::new();
    let route = search.find_route(&graph, 0, |node| node == 1).expect("route");
    assert_eq!(route.edges, vec![(0, 1)]);
    assert_eq!(route.destination(), Some(1));
}

#[test]
fn search_terminates_on_cycle_without_goal() {
    let graph = Adjacency(vec![vec![1], vec![0]]);
    let mut search = PathSearch::new();
    let mut tested = Vec::new();
    let route = search.find_route(&graph, 0, |node| {
        tested.push(node);
        false
    });
    assert!(route.is_none());
    // The start is tested once up front and once when popped.
    assert_eq!(tested, vec![0, 0, 1]);
}
