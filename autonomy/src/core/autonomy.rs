//! Per-agent scheduler: task arena, priority queue, constant list.
//!
//! Only the head of the queue is validated each fixed tick; constant tasks are
//! validated independently of the queue and of each other. Tasks started
//! during a tick are staged and only join the queue after the validation pass,
//! so a late arrival can never steal the pass meant for the current task.

use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::{debug, instrument, warn};

use crate::core::error::StartError;
use crate::core::signals::{ListenerId, Listeners};
use crate::core::task::{
    Completion, Gesture, GestureHook, Hook, ReasonHook, Slot, Task, TaskHooks, TaskId, Timestamp,
    Validated,
};

/// Default fixed-update rate used for completion timestamps.
pub const DEFAULT_TICK_RATE_HZ: u32 = 50;

pub(crate) type Channel = dyn Fn(&mut Autonomy);
pub(crate) type TextChannel = dyn Fn(&mut Autonomy, &str);
pub(crate) type GestureChannel = dyn Fn(&mut Autonomy, &Gesture);

/// Tick-channel registries that registered tasks subscribe to.
#[derive(Debug, Default)]
pub(crate) struct Channels {
    pub update: Listeners<Channel>,
    pub late_update: Listeners<Channel>,
    pub animation_change: Listeners<TextChannel>,
    pub gesture: Listeners<GestureChannel>,
}

/// Hierarchical task scheduler for one agent.
#[derive(Debug)]
pub struct Autonomy {
    pub(crate) name: String,
    pub(crate) tasks: BTreeMap<TaskId, Task>,
    next_id: u64,
    pub(crate) root: TaskId,
    pub(crate) queue: Vec<TaskId>,
    pub(crate) to_add: Vec<TaskId>,
    pub(crate) constant: Vec<TaskId>,
    tick: u64,
    tick_rate_hz: u32,
    pub(crate) channels: Channels,
    /// Reused between validation passes; taken while in use so a re-entrant
    /// pass gets its own buffer.
    scratch: Vec<TaskId>,
}

impl Autonomy {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_tick_rate(name, DEFAULT_TICK_RATE_HZ)
    }

    /// Create a scheduler whose timestamps assume `tick_rate_hz` fixed updates
    /// per simulated second. A zero rate is treated as one.
    pub fn with_tick_rate(name: impl Into<String>, tick_rate_hz: u32) -> Self {
        let root = TaskId(0);
        let mut tasks = BTreeMap::new();
        tasks.insert(root, Task::new(root, "root".to_string()));
        Self {
            name: name.into(),
            tasks,
            next_id: 1,
            root,
            queue: Vec::new(),
            to_add: Vec::new(),
            constant: Vec::new(),
            tick: 0,
            tick_rate_hz: tick_rate_hz.max(1),
            channels: Channels::default(),
            scratch: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Construct a detached task owned by this scheduler.
    pub fn create_task(&mut self, name: impl Into<String>) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        let name = name.into();
        debug!(task = %id, name = %name, "task created");
        self.tasks.insert(id, Task::new(id, name));
        id
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    /// Borrow a task that must exist; an unknown id is a programmer error.
    pub(crate) fn get(&self, id: TaskId) -> &Task {
        self.tasks
            .get(&id)
            .unwrap_or_else(|| panic!("task {} does not belong to autonomy '{}'", id, self.name))
    }

    pub(crate) fn get_mut(&mut self, id: TaskId) -> &mut Task {
        let name = &self.name;
        self.tasks
            .get_mut(&id)
            .unwrap_or_else(|| panic!("task {} does not belong to autonomy '{}'", id, name))
    }

    pub(crate) fn slot_of(&self, id: TaskId) -> Option<Slot> {
        self.tasks.get(&id).map(|task| task.slot)
    }

    /// Synthetic anchor for the queue's registered branch.
    pub fn root(&self) -> TaskId {
        self.root
    }

    pub fn queue(&self) -> &[TaskId] {
        &self.queue
    }

    pub fn staged(&self) -> &[TaskId] {
        &self.to_add
    }

    pub fn constants(&self) -> &[TaskId] {
        &self.constant
    }

    /// The queued task eligible to run this tick.
    pub fn current(&self) -> Option<TaskId> {
        self.queue.first().copied()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn tick_rate_hz(&self) -> u32 {
        self.tick_rate_hz
    }

    pub fn now(&self) -> Timestamp {
        Timestamp {
            tick: self.tick,
            seconds: self.tick as f64 / f64::from(self.tick_rate_hz),
        }
    }

    /// All tasks in the arena except the synthetic root, in creation order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values().filter(move |task| task.id != self.root)
    }

    /// First active top-level task with `name` (staged, queued, or constant).
    pub fn find_task(&self, name: &str) -> Option<TaskId> {
        self.to_add
            .iter()
            .chain(self.queue.iter())
            .chain(self.constant.iter())
            .copied()
            .find(|id| self.get(*id).name == name)
    }

    pub fn tasks_with_tag(&self, tag: &str) -> Vec<TaskId> {
        self.tasks()
            .filter(|task| task.has_tag(tag))
            .map(|task| task.id)
            .collect()
    }

    pub fn add_tag(&mut self, id: TaskId, tag: impl Into<String>) {
        self.get_mut(id).tags.insert(tag.into());
    }

    pub fn remove_tag(&mut self, id: TaskId, tag: &str) -> bool {
        self.get_mut(id).tags.remove(tag)
    }

    /// Change a task's priority. A queued task moves to its new place at once.
    pub fn set_priority(&mut self, id: TaskId, priority: i32) {
        let task = self.get_mut(id);
        task.priority = priority;
        if task.slot == Slot::Queued {
            self.sort_queue();
        }
    }

    /// Queue `id` under `name` with `priority`. Returns false (and logs) when
    /// the task is already active, parented, unnamed, or its name is taken.
    pub fn start(
        &mut self,
        id: TaskId,
        source: impl Into<String>,
        name: impl Into<String>,
        priority: i32,
    ) -> bool {
        let result = self.try_start(id, source.into(), name.into(), priority, Slot::Staged);
        self.report_start(id, result)
    }

    /// Like [`start`](Self::start) but into the always-run constant list.
    pub fn start_constant(
        &mut self,
        id: TaskId,
        source: impl Into<String>,
        name: impl Into<String>,
    ) -> bool {
        let result = self.try_start(id, source.into(), name.into(), 0, Slot::Constant);
        self.report_start(id, result)
    }

    pub fn try_start(
        &mut self,
        id: TaskId,
        source: String,
        name: String,
        priority: i32,
        slot: Slot,
    ) -> Result<(), StartError> {
        if name.trim().is_empty() {
            return Err(StartError::MissingName);
        }
        let task = self.get(id);
        if task.is_active() {
            return Err(StartError::AlreadyActive(task.name.clone()));
        }
        if task.parent.is_some() {
            return Err(StartError::HasParent(task.name.clone()));
        }
        if self.name_in_use(&name, id) {
            return Err(StartError::DuplicateName(name));
        }

        let task = self.get_mut(id);
        task.name = name;
        task.source = Some(source);
        task.priority = priority;
        let needs_reset =
            task.completion.is_terminal() || task.validated != Validated::NotEvaluated;
        if needs_reset {
            self.reset(id);
            self.reset_children(id);
        }

        match slot {
            Slot::Constant => {
                self.get_mut(id).slot = Slot::Constant;
                self.constant.push(id);
                debug!(task = %id, name = %self.get(id).name, "constant task started");
                Ok(())
            }
            _ => self.try_stage_task(id),
        }
    }

    /// Stage `id` for insertion into the queue at the next tick boundary.
    pub fn stage_task(&mut self, id: TaskId) -> bool {
        let result = self.try_stage_task(id);
        self.report_start(id, result)
    }

    fn try_stage_task(&mut self, id: TaskId) -> Result<(), StartError> {
        let task = self.get(id);
        if task.slot != Slot::Detached {
            return Err(StartError::AlreadyActive(task.name.clone()));
        }
        if self.name_in_use(&task.name, id) {
            return Err(StartError::DuplicateName(task.name.clone()));
        }
        self.get_mut(id).slot = Slot::Staged;
        self.to_add.push(id);
        debug!(task = %id, name = %self.get(id).name, "task staged");
        Ok(())
    }

    fn report_start(&self, id: TaskId, result: Result<(), StartError>) -> bool {
        match result {
            Ok(()) => true,
            Err(err) => {
                warn!(autonomy = %self.name, task = %id, error = %err, "start rejected");
                false
            }
        }
    }

    fn name_in_use(&self, name: &str, except: TaskId) -> bool {
        self.to_add
            .iter()
            .chain(self.queue.iter())
            .chain(self.constant.iter())
            .any(|other| *other != except && self.get(*other).name == name)
    }

    /// Remove a top-level task from the queue, staging, or constant list.
    ///
    /// Its hierarchy is unregistered (interrupting anything unfinished) and
    /// `on_autonomy_exit` fires.
    pub fn remove_task(&mut self, id: TaskId) -> bool {
        match self.slot_of(id) {
            Some(Slot::Staged) => self.to_add.retain(|other| *other != id),
            Some(Slot::Queued) => self.queue.retain(|other| *other != id),
            Some(Slot::Constant) => self.constant.retain(|other| *other != id),
            Some(Slot::Detached) | None => {
                warn!(autonomy = %self.name, task = %id, "remove_task: task is not active");
                return false;
            }
        }
        self.exit(id);
        true
    }

    pub fn remove_task_by_name(&mut self, name: &str) -> bool {
        match self.find_task(name) {
            Some(id) => self.remove_task(id),
            None => {
                warn!(autonomy = %self.name, name, "remove_task: no active task with that name");
                false
            }
        }
    }

    fn exit(&mut self, id: TaskId) {
        self.get_mut(id).slot = Slot::Detached;
        self.unregister_branch(id);
        let root = self.root;
        if self.get(root).branch_in_progress == Some(id) {
            self.get_mut(root).branch_in_progress = None;
        }
        debug!(task = %id, name = %self.get(id).name, "task left autonomy");
        self.fire(id, |hooks| &hooks.on_autonomy_exit);
    }

    /// Mark `id` succeeded. Hooks fire during the next validation pass.
    pub fn succeed(&mut self, id: TaskId) {
        let at = self.now();
        let task = self.get_mut(id);
        if task.completion.succeeded() {
            return;
        }
        task.completion = Completion::Succeeded { at };
        task.validated = Validated::NotEvaluated;
        debug!(task = %id, name = %task.name, "task succeeded");
    }

    /// Mark `id` failed with `reason`. Hooks fire during the next validation pass.
    pub fn fail(&mut self, id: TaskId, reason: impl Into<String>) {
        let at = self.now();
        let task = self.get_mut(id);
        if task.completion.failed() {
            return;
        }
        let reason = reason.into();
        debug!(task = %id, name = %task.name, reason = %reason, "task failed");
        task.completion = Completion::Failed { at, reason };
        task.validated = Validated::NotEvaluated;
    }

    /// Reset every unregistered descendant of `id` that still holds an outcome
    /// from an earlier run, so a restarted tree runs its children again.
    fn reset_children(&mut self, id: TaskId) {
        let task = self.get(id);
        let children: Vec<TaskId> = task
            .requirements
            .iter()
            .chain(task.passives.iter())
            .copied()
            .collect();
        for child in children {
            let task = self.get(child);
            let stale = !task.registered
                && (task.completion.is_terminal() || task.validated != Validated::NotEvaluated);
            if stale {
                self.reset(child);
            }
            self.reset_children(child);
        }
    }

    /// Return a task to the unfinished state and fire `on_reset`.
    pub(crate) fn reset(&mut self, id: TaskId) {
        let task = self.get_mut(id);
        task.completion = Completion::Unfinished;
        task.validated = Validated::NotEvaluated;
        self.fire(id, |hooks| &hooks.on_reset);
    }

    /// One validation pass: constants, then the head of the queue, then the
    /// staging flush.
    #[instrument(skip_all, fields(autonomy = %self.name, tick = self.tick + 1))]
    pub fn validate(&mut self) {
        self.tick += 1;

        let mut walk = std::mem::take(&mut self.scratch);
        walk.clear();
        walk.extend_from_slice(&self.constant);
        for &id in &walk {
            if self.slot_of(id) != Some(Slot::Constant) {
                continue;
            }
            let verdict = self.validate_hierarchy(id);
            if verdict.is_definite() && self.slot_of(id) == Some(Slot::Constant) {
                self.constant.retain(|other| *other != id);
                debug!(task = %id, ?verdict, "constant task finished");
                self.exit(id);
            }
        }
        walk.clear();
        self.scratch = walk;

        if let Some(current) = self.current() {
            let verdict = self.validate_hierarchy(current);
            if verdict.is_definite() && self.current() == Some(current) {
                self.queue.remove(0);
                debug!(task = %current, ?verdict, "queued task finished");
                self.exit(current);
            }
        }

        self.flush_staged();
    }

    /// Move staged tasks to the front of the queue, then stable-sort the queue
    /// by descending priority.
    fn flush_staged(&mut self) {
        if self.to_add.is_empty() {
            return;
        }
        let staged = std::mem::take(&mut self.to_add);
        for id in &staged {
            self.get_mut(*id).slot = Slot::Queued;
        }
        self.queue.splice(0..0, staged);
        self.sort_queue();
        debug!(queue = ?self.queue, "staged tasks flushed");
    }

    /// Stable sort by descending priority.
    fn sort_queue(&mut self) {
        let tasks = &self.tasks;
        self.queue
            .sort_by(|a, b| tasks[b].priority.cmp(&tasks[a].priority));
    }

    /// Fixed-update tick; drives [`validate`](Self::validate).
    pub fn fixed_update(&mut self) {
        self.validate();
    }

    pub fn update(&mut self) {
        for listener in self.channels.update.snapshot() {
            listener(self);
        }
    }

    pub fn late_update(&mut self) {
        for listener in self.channels.late_update.snapshot() {
            listener(self);
        }
    }

    /// One frame in fixed order: fixed update, update, late update.
    pub fn tick(&mut self) {
        self.fixed_update();
        self.update();
        self.late_update();
    }

    pub fn notify_animation_changed(&mut self, animation: &str) {
        for listener in self.channels.animation_change.snapshot() {
            listener(self, animation);
        }
    }

    pub fn notify_gesture(&mut self, gesture: &Gesture) {
        for listener in self.channels.gesture.snapshot() {
            listener(self, gesture);
        }
    }

    pub fn hooks_mut(&mut self, id: TaskId) -> &mut TaskHooks {
        &mut self.get_mut(id).hooks
    }

    pub fn on_registered(
        &mut self,
        id: TaskId,
        hook: impl Fn(&mut Autonomy, TaskId) + 'static,
    ) -> ListenerId {
        self.hooks_mut(id).on_registered.add(Rc::new(hook))
    }

    pub fn on_unregistered(
        &mut self,
        id: TaskId,
        hook: impl Fn(&mut Autonomy, TaskId) + 'static,
    ) -> ListenerId {
        self.hooks_mut(id).on_unregistered.add(Rc::new(hook))
    }

    pub fn on_reset(
        &mut self,
        id: TaskId,
        hook: impl Fn(&mut Autonomy, TaskId) + 'static,
    ) -> ListenerId {
        self.hooks_mut(id).on_reset.add(Rc::new(hook))
    }

    pub fn on_interrupted(
        &mut self,
        id: TaskId,
        hook: impl Fn(&mut Autonomy, TaskId) + 'static,
    ) -> ListenerId {
        self.hooks_mut(id).on_interrupted.add(Rc::new(hook))
    }

    pub fn on_success(
        &mut self,
        id: TaskId,
        hook: impl Fn(&mut Autonomy, TaskId) + 'static,
    ) -> ListenerId {
        self.hooks_mut(id).on_success.add(Rc::new(hook))
    }

    pub fn on_fail(
        &mut self,
        id: TaskId,
        hook: impl Fn(&mut Autonomy, TaskId, &str) + 'static,
    ) -> ListenerId {
        self.hooks_mut(id).on_fail.add(Rc::new(hook))
    }

    pub fn on_autonomy_exit(
        &mut self,
        id: TaskId,
        hook: impl Fn(&mut Autonomy, TaskId) + 'static,
    ) -> ListenerId {
        self.hooks_mut(id).on_autonomy_exit.add(Rc::new(hook))
    }

    pub fn on_fixed_update(
        &mut self,
        id: TaskId,
        hook: impl Fn(&mut Autonomy, TaskId) + 'static,
    ) -> ListenerId {
        self.hooks_mut(id).on_fixed_update.add(Rc::new(hook))
    }

    pub fn on_update(
        &mut self,
        id: TaskId,
        hook: impl Fn(&mut Autonomy, TaskId) + 'static,
    ) -> ListenerId {
        self.hooks_mut(id).on_update.add(Rc::new(hook))
    }

    pub fn on_late_update(
        &mut self,
        id: TaskId,
        hook: impl Fn(&mut Autonomy, TaskId) + 'static,
    ) -> ListenerId {
        self.hooks_mut(id).on_late_update.add(Rc::new(hook))
    }

    pub fn on_animation_change(
        &mut self,
        id: TaskId,
        hook: impl Fn(&mut Autonomy, TaskId, &str) + 'static,
    ) -> ListenerId {
        self.hooks_mut(id).on_animation_change.add(Rc::new(hook))
    }

    pub fn on_gesture(
        &mut self,
        id: TaskId,
        hook: impl Fn(&mut Autonomy, TaskId, &Gesture) + 'static,
    ) -> ListenerId {
        self.hooks_mut(id).on_gesture.add(Rc::new(hook))
    }

    /// Override the standing-condition check used for succeeded requirements.
    pub fn set_requirement_validator(
        &mut self,
        id: TaskId,
        validator: impl Fn(&Autonomy, TaskId) -> bool + 'static,
    ) {
        self.get_mut(id).validator = Some(Rc::new(validator));
    }

    pub(crate) fn fire(&mut self, id: TaskId, select: impl Fn(&TaskHooks) -> &Listeners<Hook>) {
        let Some(task) = self.tasks.get(&id) else {
            return;
        };
        let hooks = select(&task.hooks).snapshot();
        for hook in hooks {
            hook(self, id);
        }
    }

    pub(crate) fn fire_text(
        &mut self,
        id: TaskId,
        select: impl Fn(&TaskHooks) -> &Listeners<ReasonHook>,
        text: &str,
    ) {
        let Some(task) = self.tasks.get(&id) else {
            return;
        };
        let hooks = select(&task.hooks).snapshot();
        for hook in hooks {
            hook(self, id, text);
        }
    }

    pub(crate) fn fire_gesture(&mut self, id: TaskId, gesture: &Gesture) {
        let Some(task) = self.tasks.get(&id) else {
            return;
        };
        let hooks: Vec<Rc<GestureHook>> = task.hooks.on_gesture.snapshot();
        for hook in hooks {
            hook(self, id, gesture);
        }
    }
}
