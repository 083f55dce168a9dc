//! Ready-made tasks built only from the public hook API.

use std::cell::Cell;
use std::rc::Rc;

use crate::core::autonomy::Autonomy;
use crate::core::task::TaskId;

/// Task that succeeds on the first fixed update where `condition` holds.
///
/// Used as a requirement, the same condition is its standing check: once it
/// stops holding the requirement is re-armed and waits again.
pub fn condition_task(
    autonomy: &mut Autonomy,
    name: impl Into<String>,
    condition: impl Fn(&Autonomy) -> bool + 'static,
) -> TaskId {
    let id = autonomy.create_task(name);
    let condition = Rc::new(condition);
    let check = Rc::clone(&condition);
    autonomy.on_fixed_update(id, move |autonomy, id| {
        if check(&*autonomy) {
            autonomy.succeed(id);
        }
    });
    autonomy.set_requirement_validator(id, move |autonomy, id| {
        autonomy
            .task(id)
            .is_some_and(|task| task.completion().succeeded())
            && condition(autonomy)
    });
    id
}

/// Task that succeeds after `ticks` fixed updates while registered.
///
/// The count restarts whenever the task is registered again, so an
/// interrupted timer starts over.
pub fn timer_task(autonomy: &mut Autonomy, name: impl Into<String>, ticks: u64) -> TaskId {
    let script = Script {
        succeed_after: Some(ticks),
        ..Script::default()
    };
    scripted_task(autonomy, name, &script)
}

/// Fixed outcome schedule for a task driven by tick counts alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    /// Succeed on this many fixed updates since the last registration.
    pub succeed_after: Option<u64>,
    /// Fail on this many fixed updates since the last registration.
    pub fail_after: Option<u64>,
    pub fail_reason: Option<String>,
    /// As a requirement, the success stops holding this many ticks after it
    /// was reported.
    pub lapse_after: Option<u64>,
}

/// Task that follows `script`. With no outcome scheduled it runs until it is
/// removed or interrupted.
pub fn scripted_task(autonomy: &mut Autonomy, name: impl Into<String>, script: &Script) -> TaskId {
    let id = autonomy.create_task(name);
    let elapsed = Rc::new(Cell::new(0_u64));
    let restart = Rc::clone(&elapsed);
    autonomy.on_registered(id, move |_, _| restart.set(0));

    let succeed_after = script.succeed_after;
    let fail_after = script.fail_after;
    let reason = script
        .fail_reason
        .clone()
        .unwrap_or_else(|| "scripted failure".to_string());
    autonomy.on_fixed_update(id, move |autonomy, id| {
        elapsed.set(elapsed.get() + 1);
        if fail_after.is_some_and(|ticks| elapsed.get() >= ticks) {
            autonomy.fail(id, reason.clone());
        } else if succeed_after.is_some_and(|ticks| elapsed.get() >= ticks) {
            autonomy.succeed(id);
        }
    });

    if let Some(lapse_after) = script.lapse_after {
        let succeeded_at = Rc::new(Cell::new(0_u64));
        let record = Rc::clone(&succeeded_at);
        autonomy.on_success(id, move |autonomy, _| record.set(autonomy.tick_count()));
        autonomy.set_requirement_validator(id, move |autonomy, id| {
            let still_succeeded = autonomy
                .task(id)
                .is_some_and(|task| task.completion().succeeded());
            still_succeeded && autonomy.tick_count().saturating_sub(succeeded_at.get()) < lapse_after
        });
    }
    id
}

/// Task that succeeds on its first fixed update.
pub fn instant_task(autonomy: &mut Autonomy, name: impl Into<String>) -> TaskId {
    let id = autonomy.create_task(name);
    autonomy.on_fixed_update(id, |autonomy, id| autonomy.succeed(id));
    id
}
