//! Hierarchy validation and registration side effects.
//!
//! A walk visits requirements left to right, then the task itself, then its
//! passives. Requirement and passive lists are read by index on every step so
//! hooks may attach or detach children while the walk is running.

use std::rc::Rc;

use tracing::{debug, trace};

use crate::core::autonomy::Autonomy;
use crate::core::task::{
    Completion, Gesture, ParentLink, Slot, Task, TaskId, Validated, Verdict,
};

impl Autonomy {
    /// Walk the hierarchy rooted at `id` for one tick.
    pub(crate) fn validate_hierarchy(&mut self, id: TaskId) -> Verdict {
        let Some(task) = self.tasks.get(&id) else {
            return Verdict::Pending;
        };
        match task.validated {
            Validated::Failed => return Verdict::Failed,
            Validated::Succeeded => {
                if !matches!(task.parent, Some(ParentLink::Requirement(_))) {
                    return Verdict::Succeeded;
                }
                if self.requirement_holds(id) {
                    return Verdict::Succeeded;
                }
                self.rearm(id);
                return Verdict::Pending;
            }
            Validated::NotEvaluated => {}
        }

        if task.completion.failed() {
            return self.settle(id);
        }

        let mut index = 0;
        while let Some(requirement) = self.child_at(id, index, |task| &task.requirements) {
            match self.validate_hierarchy(requirement) {
                Verdict::Succeeded => index += 1,
                Verdict::Failed => {
                    let child = self.get(requirement);
                    let reason = format!(
                        "requirement '{}' failed: {}",
                        child.name,
                        child.failure_reason().unwrap_or("unknown")
                    );
                    self.fail(id, reason);
                    return self.settle(id);
                }
                Verdict::Pending => {
                    self.suspend(id);
                    return Verdict::Pending;
                }
            }
        }

        if self.get(id).completion.is_terminal() {
            return self.settle(id);
        }

        self.register_in_progress(id);
        self.fire(id, |hooks| &hooks.on_fixed_update);
        if !self.tasks.contains_key(&id) {
            return Verdict::Pending;
        }
        if self.get(id).completion.is_terminal() {
            return self.settle(id);
        }

        let mut index = 0;
        while let Some(passive) = self.child_at(id, index, |task| &task.passives) {
            let task = self.get(id);
            if !task.registered || task.completion.is_terminal() {
                break;
            }
            self.validate_hierarchy(passive);
            index += 1;
        }

        match self.tasks.get(&id) {
            Some(task) if task.completion.is_terminal() => self.settle(id),
            _ => Verdict::Pending,
        }
    }

    fn child_at(
        &self,
        id: TaskId,
        index: usize,
        list: impl Fn(&Task) -> &Vec<TaskId>,
    ) -> Option<TaskId> {
        self.tasks
            .get(&id)
            .and_then(|task| list(task).get(index).copied())
    }

    /// Standing-condition check for a settled requirement.
    fn requirement_holds(&self, id: TaskId) -> bool {
        let task = self.get(id);
        match &task.validator {
            Some(validator) => validator(self, id),
            None => task.completion.succeeded(),
        }
    }

    /// Send a settled requirement back for re-execution.
    fn rearm(&mut self, id: TaskId) {
        let task = self.get_mut(id);
        let (validated, rearmed) = task.validated.rearm();
        if !rearmed {
            return;
        }
        task.validated = validated;
        task.completion = Completion::Unfinished;
        debug!(task = %id, name = %task.name, "requirement no longer holds, re-armed");
        self.fire(id, |hooks| &hooks.on_reset);
    }

    /// Cache the terminal outcome, tear down the subtree, and fire the
    /// completion hook.
    fn settle(&mut self, id: TaskId) -> Verdict {
        let task = self.get_mut(id);
        let succeeded = task.completion.succeeded();
        task.validated = if succeeded {
            Validated::Succeeded
        } else {
            Validated::Failed
        };
        let anchor = self.anchor_of(id);
        self.unregister_branch(id);
        if let Some(anchor) = anchor {
            let anchor = self.get_mut(anchor);
            if anchor.branch_in_progress == Some(id) {
                anchor.branch_in_progress = None;
            }
        }

        if succeeded {
            debug!(task = %id, name = %self.get(id).name, "task settled: succeeded");
            self.fire(id, |hooks| &hooks.on_success);
            Verdict::Succeeded
        } else {
            let reason = self.get(id).failure_reason().unwrap_or_default().to_string();
            debug!(task = %id, name = %self.get(id).name, reason = %reason, "task settled: failed");
            self.fire_text(id, |hooks| &hooks.on_fail, &reason);
            Verdict::Failed
        }
    }

    /// The task whose `branch_in_progress` may point at `id`.
    fn anchor_of(&self, id: TaskId) -> Option<TaskId> {
        let task = self.get(id);
        match task.parent {
            Some(ParentLink::Requirement(parent)) => Some(parent),
            Some(ParentLink::Passive(_)) => None,
            None if task.slot == Slot::Queued => Some(self.root),
            None => None,
        }
    }

    /// Make `id` the in-progress branch of every anchor above it, replacing
    /// whatever branch each anchor had before, then register it.
    fn register_in_progress(&mut self, id: TaskId) {
        let mut child = id;
        while let Some(anchor) = self.anchor_of(child) {
            let previous = self.get(anchor).branch_in_progress;
            if previous != Some(child) {
                if let Some(previous) = previous {
                    trace!(anchor = %anchor, previous = %previous, next = %child, "switching branch");
                    self.unregister_branch(previous);
                }
                self.get_mut(anchor).branch_in_progress = Some(child);
            }
            if self.get(anchor).registered {
                self.suspend(anchor);
            }
            if anchor == self.root {
                break;
            }
            child = anchor;
        }
        self.register(id);
    }

    fn register(&mut self, id: TaskId) {
        if self.get(id).registered {
            return;
        }
        let update = self
            .channels
            .update
            .add(Rc::new(move |autonomy: &mut Autonomy| {
                autonomy.fire(id, |hooks| &hooks.on_update);
            }));
        let late_update = self
            .channels
            .late_update
            .add(Rc::new(move |autonomy: &mut Autonomy| {
                autonomy.fire(id, |hooks| &hooks.on_late_update);
            }));
        let animation_change = self.channels.animation_change.add(Rc::new(
            move |autonomy: &mut Autonomy, animation: &str| {
                autonomy.fire_text(id, |hooks| &hooks.on_animation_change, animation);
            },
        ));
        let gesture = self.channels.gesture.add(Rc::new(
            move |autonomy: &mut Autonomy, gesture: &Gesture| {
                autonomy.fire_gesture(id, gesture);
            },
        ));

        let task = self.get_mut(id);
        task.registered = true;
        task.subscriptions.update = Some(update);
        task.subscriptions.late_update = Some(late_update);
        task.subscriptions.animation_change = Some(animation_change);
        task.subscriptions.gesture = Some(gesture);
        debug!(task = %id, name = %task.name, "task registered");
        self.fire(id, |hooks| &hooks.on_registered);
    }

    fn unregister(&mut self, id: TaskId) {
        let Some(task) = self.tasks.get_mut(&id) else {
            return;
        };
        if !task.registered {
            return;
        }
        task.registered = false;
        let subscriptions = std::mem::take(&mut task.subscriptions);
        let interrupted = !task.completion.is_terminal();
        debug!(task = %id, name = %task.name, interrupted, "task unregistered");

        if let Some(listener) = subscriptions.update {
            self.channels.update.remove(listener);
        }
        if let Some(listener) = subscriptions.late_update {
            self.channels.late_update.remove(listener);
        }
        if let Some(listener) = subscriptions.animation_change {
            self.channels.animation_change.remove(listener);
        }
        if let Some(listener) = subscriptions.gesture {
            self.channels.gesture.remove(listener);
        }

        self.fire(id, |hooks| &hooks.on_unregistered);
        if interrupted {
            self.fire(id, |hooks| &hooks.on_interrupted);
        }
    }

    /// Unregister `id` and its passives while keeping its in-progress branch,
    /// so a pending requirement can run in its place.
    fn suspend(&mut self, id: TaskId) {
        let mut index = 0;
        while let Some(passive) = self.child_at(id, index, |task| &task.passives) {
            self.unregister_branch(passive);
            index += 1;
        }
        self.unregister(id);
    }

    /// Unregister the in-progress branch, the passives, and `id` itself.
    pub(crate) fn unregister_branch(&mut self, id: TaskId) {
        let Some(task) = self.tasks.get_mut(&id) else {
            return;
        };
        if let Some(branch) = task.branch_in_progress.take() {
            self.unregister_branch(branch);
        }
        self.suspend(id);
    }
}
