//! Task data: identity, relationships, completion state, and hooks.
//!
//! Tasks live in the [`Autonomy`](crate::core::autonomy::Autonomy) arena and
//! refer to each other through [`TaskId`] handles. A task never owns its
//! scheduler or its parent; lifetime is controlled by explicit removal.

use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use crate::core::autonomy::Autonomy;
use crate::core::signals::{ListenerId, Listeners};

/// Monotonic task identifier, unique within one scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) u64);

impl TaskId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Scheduler time at which a completion was recorded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timestamp {
    /// Fixed-update tick counter.
    pub tick: u64,
    /// Simulated seconds (`tick / fixed_tick_rate_hz`).
    pub seconds: f64,
}

/// Three-valued completion recorded by `succeed`/`fail`.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Unfinished,
    Succeeded { at: Timestamp },
    Failed { at: Timestamp, reason: String },
}

impl Completion {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Completion::Unfinished)
    }

    pub fn succeeded(&self) -> bool {
        matches!(self, Completion::Succeeded { .. })
    }

    pub fn failed(&self) -> bool {
        matches!(self, Completion::Failed { .. })
    }
}

/// Cached outcome of the last settled validation.
///
/// `NotEvaluated` means the next hierarchy walk must look at the task again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Validated {
    #[default]
    NotEvaluated,
    Succeeded,
    Failed,
}

impl Validated {
    /// Return a settled success to the unknown state so it is executed again.
    ///
    /// Only a cached success can be re-armed; any other state is returned
    /// unchanged together with `false`.
    pub fn rearm(self) -> (Validated, bool) {
        match self {
            Validated::Succeeded => (Validated::NotEvaluated, true),
            other => (other, false),
        }
    }
}

/// Result of walking one task hierarchy for a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Still running, or waiting on a requirement.
    Pending,
    Succeeded,
    Failed,
}

impl Verdict {
    pub fn is_definite(self) -> bool {
        !matches!(self, Verdict::Pending)
    }
}

/// How a child hangs off its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentLink {
    Requirement(TaskId),
    Passive(TaskId),
}

impl ParentLink {
    pub fn parent(self) -> TaskId {
        match self {
            ParentLink::Requirement(id) | ParentLink::Passive(id) => id,
        }
    }
}

/// Where a top-level task sits inside its scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Slot {
    #[default]
    Detached,
    Staged,
    Queued,
    Constant,
}

/// Minimal gesture payload forwarded to registered tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gesture {
    pub name: String,
    pub sender: Option<String>,
}

impl Gesture {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sender: None,
        }
    }

    pub fn from_sender(name: impl Into<String>, sender: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sender: Some(sender.into()),
        }
    }
}

pub type Hook = dyn Fn(&mut Autonomy, TaskId);
pub type ReasonHook = dyn Fn(&mut Autonomy, TaskId, &str);
pub type GestureHook = dyn Fn(&mut Autonomy, TaskId, &Gesture);
pub type RequirementValidator = dyn Fn(&Autonomy, TaskId) -> bool;

/// Lifecycle and per-tick hooks a behavior attaches to a task.
#[derive(Default)]
pub struct TaskHooks {
    pub on_registered: Listeners<Hook>,
    pub on_unregistered: Listeners<Hook>,
    pub on_reset: Listeners<Hook>,
    pub on_interrupted: Listeners<Hook>,
    pub on_success: Listeners<Hook>,
    pub on_fail: Listeners<ReasonHook>,
    pub on_autonomy_exit: Listeners<Hook>,
    pub on_fixed_update: Listeners<Hook>,
    pub on_update: Listeners<Hook>,
    pub on_late_update: Listeners<Hook>,
    pub on_animation_change: Listeners<ReasonHook>,
    pub on_gesture: Listeners<GestureHook>,
}

impl fmt::Debug for TaskHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHooks")
            .field("on_registered", &self.on_registered.len())
            .field("on_success", &self.on_success.len())
            .field("on_fail", &self.on_fail.len())
            .field("on_fixed_update", &self.on_fixed_update.len())
            .finish_non_exhaustive()
    }
}

/// Scheduler-registry subscriptions held while a task is registered.
#[derive(Debug, Default, Clone)]
pub(crate) struct Subscriptions {
    pub update: Option<ListenerId>,
    pub late_update: Option<ListenerId>,
    pub animation_change: Option<ListenerId>,
    pub gesture: Option<ListenerId>,
}

/// One unit of behavior.
pub struct Task {
    pub(crate) id: TaskId,
    pub(crate) name: String,
    pub(crate) source: Option<String>,
    pub(crate) priority: i32,
    pub(crate) tags: BTreeSet<String>,
    pub(crate) parent: Option<ParentLink>,
    pub(crate) requirements: Vec<TaskId>,
    pub(crate) passives: Vec<TaskId>,
    pub(crate) branch_in_progress: Option<TaskId>,
    pub(crate) completion: Completion,
    pub(crate) validated: Validated,
    pub(crate) registered: bool,
    pub(crate) slot: Slot,
    pub(crate) subscriptions: Subscriptions,
    pub(crate) validator: Option<Rc<RequirementValidator>>,
    pub(crate) hooks: TaskHooks,
}

impl Task {
    pub(crate) fn new(id: TaskId, name: String) -> Self {
        Self {
            id,
            name,
            source: None,
            priority: 0,
            tags: BTreeSet::new(),
            parent: None,
            requirements: Vec::new(),
            passives: Vec::new(),
            branch_in_progress: None,
            completion: Completion::Unfinished,
            validated: Validated::NotEvaluated,
            registered: false,
            slot: Slot::Detached,
            subscriptions: Subscriptions::default(),
            validator: None,
            hooks: TaskHooks::default(),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribution token passed to `start`; never used for authorization.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn parent(&self) -> Option<ParentLink> {
        self.parent
    }

    pub fn requirements(&self) -> &[TaskId] {
        &self.requirements
    }

    pub fn passives(&self) -> &[TaskId] {
        &self.passives
    }

    pub fn branch_in_progress(&self) -> Option<TaskId> {
        self.branch_in_progress
    }

    pub fn completion(&self) -> &Completion {
        &self.completion
    }

    pub fn validated(&self) -> Validated {
        self.validated
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }

    /// Staged, queued, constant, or currently registered.
    pub fn is_active(&self) -> bool {
        self.registered || self.slot != Slot::Detached
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.completion {
            Completion::Failed { reason, .. } => Some(reason),
            _ => None,
        }
    }

    pub fn hooks(&self) -> &TaskHooks {
        &self.hooks
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("parent", &self.parent)
            .field("requirements", &self.requirements)
            .field("passives", &self.passives)
            .field("completion", &self.completion)
            .field("validated", &self.validated)
            .field("registered", &self.registered)
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rearm_only_moves_cached_success() {
        assert_eq!(
            Validated::Succeeded.rearm(),
            (Validated::NotEvaluated, true)
        );
        assert_eq!(Validated::Failed.rearm(), (Validated::Failed, false));
        assert_eq!(
            Validated::NotEvaluated.rearm(),
            (Validated::NotEvaluated, false)
        );
    }

    #[test]
    fn completion_flags_are_exclusive() {
        let at = Timestamp {
            tick: 1,
            seconds: 0.02,
        };
        let done = Completion::Succeeded { at };
        let failed = Completion::Failed {
            at,
            reason: "blocked".to_string(),
        };
        assert!(done.succeeded() && !done.failed());
        assert!(failed.failed() && !failed.succeeded());
        assert!(!Completion::Unfinished.is_terminal());
    }
}
