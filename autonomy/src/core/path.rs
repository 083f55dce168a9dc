//! Helpers for rendering deterministic task paths.

use crate::core::autonomy::Autonomy;
use crate::core::task::{ParentLink, TaskId};

/// Return the `/`-separated name path from the top-level ancestor down to `id`.
pub fn task_path(autonomy: &Autonomy, id: TaskId) -> Option<String> {
    let mut names = Vec::new();
    let mut current = Some(id);
    while let Some(step) = current {
        let task = autonomy.task(step)?;
        names.push(task.name());
        if names.len() > autonomy.tasks.len() {
            // Cyclic links; the invariant checker reports them.
            break;
        }
        current = task.parent().map(ParentLink::parent);
    }
    names.reverse();
    Some(names.join("/"))
}
