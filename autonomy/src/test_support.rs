//! Test-only helpers for building schedulers and recording hook traffic.

use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use tempfile::TempDir;

use crate::core::autonomy::Autonomy;
use crate::core::task::TaskId;

/// Create a task with no behavior; it stays unfinished until told otherwise.
pub fn leaf_task(autonomy: &mut Autonomy, name: &str) -> TaskId {
    autonomy.create_task(name)
}

/// Records `(task name, event)` pairs for every hook of watched tasks.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    events: Rc<RefCell<Vec<(String, String)>>>,
}

impl Recorder {
    /// Attach recording hooks to every lifecycle and tick hook of `id`.
    pub fn watch(&self, autonomy: &mut Autonomy, id: TaskId) {
        autonomy.on_registered(id, self.record("registered"));
        autonomy.on_unregistered(id, self.record("unregistered"));
        autonomy.on_reset(id, self.record("reset"));
        autonomy.on_interrupted(id, self.record("interrupted"));
        autonomy.on_success(id, self.record("success"));
        let fail = self.record("fail");
        autonomy.on_fail(id, move |autonomy, id, _| fail(autonomy, id));
        autonomy.on_autonomy_exit(id, self.record("exit"));
        autonomy.on_fixed_update(id, self.record("fixed"));
        autonomy.on_update(id, self.record("update"));
        autonomy.on_late_update(id, self.record("late_update"));

        let events = Rc::clone(&self.events);
        autonomy.on_animation_change(id, move |autonomy, id, animation| {
            let name = autonomy.task(id).map(|task| task.name().to_string());
            events
                .borrow_mut()
                .push((name.unwrap_or_default(), format!("animation:{animation}")));
        });
        let events = Rc::clone(&self.events);
        autonomy.on_gesture(id, move |autonomy, id, gesture| {
            let name = autonomy.task(id).map(|task| task.name().to_string());
            events
                .borrow_mut()
                .push((name.unwrap_or_default(), format!("gesture:{}", gesture.name)));
        });
    }

    fn record(&self, event: &'static str) -> impl Fn(&mut Autonomy, TaskId) + 'static {
        let events = Rc::clone(&self.events);
        move |autonomy: &mut Autonomy, id: TaskId| {
            let name = autonomy
                .task(id)
                .map_or_else(|| id.to_string(), |task| task.name().to_string());
            events.borrow_mut().push((name, event.to_string()));
        }
    }

    pub fn count(&self, task: &str, event: &str) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|(name, kind)| name == task && kind == event)
            .count()
    }

    /// Task names that fired `event`, in firing order.
    pub fn names_for(&self, event: &str) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter(|(_, kind)| kind == event)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn events(&self) -> Vec<(String, String)> {
        self.events.borrow().clone()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

/// Write `contents` to `name` inside a fresh temp directory.
///
/// The directory is deleted when the returned guard drops.
pub fn fixture_file(name: &str, contents: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("write fixture");
    (dir, path)
}
