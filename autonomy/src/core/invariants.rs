//! Structural invariants of a scheduler's task hierarchy.

use std::collections::HashSet;

use crate::core::autonomy::Autonomy;
use crate::core::path::task_path;
use crate::core::task::{ParentLink, Slot, TaskId};

/// Check the hierarchy and queue invariants, returning one message per
/// violation:
/// - every child's parent link matches the list that holds it
/// - no task is its own ancestor
/// - active top-level names are unique
/// - the queue is sorted by descending priority and slots match list membership
/// - each anchor's in-progress branch is one of its requirements (or a queued task)
/// - at most one requirement subtree per task holds registered tasks
/// - each registered task holds exactly one subscription per tick channel
pub fn check(autonomy: &Autonomy) -> Vec<String> {
    let mut errors = Vec::new();
    check_links(autonomy, &mut errors);
    check_lists(autonomy, &mut errors);
    check_branches(autonomy, &mut errors);
    check_registrations(autonomy, &mut errors);
    errors
}

fn label(autonomy: &Autonomy, id: TaskId) -> String {
    task_path(autonomy, id).unwrap_or_else(|| id.to_string())
}

fn check_links(autonomy: &Autonomy, errors: &mut Vec<String>) {
    for task in autonomy.tasks() {
        for &child in &task.requirements {
            match autonomy.task(child) {
                Some(found) if found.parent == Some(ParentLink::Requirement(task.id)) => {}
                Some(_) => errors.push(format!(
                    "{}: requirement {} does not link back to its parent",
                    label(autonomy, task.id),
                    label(autonomy, child)
                )),
                None => errors.push(format!(
                    "{}: requirement {} is not in the arena",
                    label(autonomy, task.id),
                    child
                )),
            }
        }
        for &child in &task.passives {
            match autonomy.task(child) {
                Some(found) if found.parent == Some(ParentLink::Passive(task.id)) => {}
                Some(_) => errors.push(format!(
                    "{}: passive {} does not link back to its parent",
                    label(autonomy, task.id),
                    label(autonomy, child)
                )),
                None => errors.push(format!(
                    "{}: passive {} is not in the arena",
                    label(autonomy, task.id),
                    child
                )),
            }
        }

        let mut seen = HashSet::from([task.id]);
        let mut ancestor = task.parent.map(ParentLink::parent);
        while let Some(current) = ancestor {
            if !seen.insert(current) {
                errors.push(format!("{}: task is part of a cycle", task.id));
                break;
            }
            ancestor = autonomy
                .task(current)
                .and_then(|task| task.parent)
                .map(ParentLink::parent);
        }
    }
}

fn check_lists(autonomy: &Autonomy, errors: &mut Vec<String>) {
    let mut names = HashSet::new();
    let lists = [
        (autonomy.staged(), Slot::Staged),
        (autonomy.queue(), Slot::Queued),
        (autonomy.constants(), Slot::Constant),
    ];
    for (list, slot) in lists {
        for &id in list {
            let Some(task) = autonomy.task(id) else {
                errors.push(format!("{id}: listed in {slot:?} but not in the arena"));
                continue;
            };
            if task.slot != slot {
                errors.push(format!(
                    "{}: listed in {:?} but slot is {:?}",
                    task.name, slot, task.slot
                ));
            }
            if !names.insert(task.name.as_str()) {
                errors.push(format!("duplicate active task name '{}'", task.name));
            }
        }
    }

    let ordered = autonomy.queue().windows(2).all(|pair| {
        let priority = |id: TaskId| autonomy.task(id).map_or(0, |task| task.priority);
        priority(pair[0]) >= priority(pair[1])
    });
    if !ordered {
        errors.push("queue must be sorted by descending priority".to_string());
    }
}

fn check_branches(autonomy: &Autonomy, errors: &mut Vec<String>) {
    let root = autonomy.get(autonomy.root());
    if let Some(branch) = root.branch_in_progress {
        if autonomy.task(branch).map(|task| task.slot) != Some(Slot::Queued) {
            errors.push(format!("root branch {branch} is not a queued task"));
        }
    }
    let queued_with_registrations = autonomy
        .queue()
        .iter()
        .filter(|id| subtree_has_registration(autonomy, **id))
        .count();
    if queued_with_registrations > 1 {
        errors.push(format!(
            "{queued_with_registrations} queued tasks hold registrations at once"
        ));
    }

    for task in autonomy.tasks() {
        if let Some(branch) = task.branch_in_progress {
            if !task.requirements.contains(&branch) {
                errors.push(format!(
                    "{}: branch in progress {} is not a requirement",
                    label(autonomy, task.id),
                    branch
                ));
            }
        }
        let active = task
            .requirements
            .iter()
            .filter(|id| subtree_has_registration(autonomy, **id))
            .count();
        if active > 1 {
            errors.push(format!(
                "{}: {} requirement branches are registered at once",
                label(autonomy, task.id),
                active
            ));
        }
    }
}

fn subtree_has_registration(autonomy: &Autonomy, id: TaskId) -> bool {
    let Some(task) = autonomy.task(id) else {
        return false;
    };
    task.registered
        || task
            .requirements
            .iter()
            .chain(task.passives.iter())
            .any(|child| subtree_has_registration(autonomy, *child))
}

fn check_registrations(autonomy: &Autonomy, errors: &mut Vec<String>) {
    let registered = autonomy.tasks().filter(|task| task.registered).count();
    for task in autonomy.tasks() {
        let subscriptions = &task.subscriptions;
        let held = [
            subscriptions.update,
            subscriptions.late_update,
            subscriptions.animation_change,
            subscriptions.gesture,
        ];
        let complete = held.iter().all(Option::is_some);
        let empty = held.iter().all(Option::is_none);
        if task.registered && !complete {
            errors.push(format!(
                "{}: registered without channel subscriptions",
                label(autonomy, task.id)
            ));
        }
        if !task.registered && !empty {
            errors.push(format!(
                "{}: unregistered but still subscribed",
                label(autonomy, task.id)
            ));
        }
    }

    let channels = &autonomy.channels;
    let counts = [
        ("update", channels.update.len()),
        ("late_update", channels.late_update.len()),
        ("animation_change", channels.animation_change.len()),
        ("gesture", channels.gesture.len()),
    ];
    for (channel, count) in counts {
        if count != registered {
            errors.push(format!(
                "{channel} channel has {count} listeners for {registered} registered tasks"
            ));
        }
    }
}
