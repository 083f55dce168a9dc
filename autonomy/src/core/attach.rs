//! Requirement and passive composition.
//!
//! Children may only be attached while detached from everything else; removal
//! tears down the child's registered subtree before it is unlinked.

use tracing::{debug, warn};

use crate::core::autonomy::Autonomy;
use crate::core::error::AttachError;
use crate::core::task::{ParentLink, TaskId};

/// Where a new requirement goes in its parent's list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Last,
    First,
    After(TaskId),
}

impl Autonomy {
    pub fn add_requirement(&mut self, parent: TaskId, child: TaskId) -> bool {
        let result = self.try_add_requirement(parent, child, Placement::Last);
        self.report_attach("add_requirement", result)
    }

    pub fn prepend_requirement(&mut self, parent: TaskId, child: TaskId) -> bool {
        let result = self.try_add_requirement(parent, child, Placement::First);
        self.report_attach("prepend_requirement", result)
    }

    /// Insert `child` directly after `existing` in the requirement list.
    pub fn add_requirement_after(&mut self, parent: TaskId, child: TaskId, existing: TaskId) -> bool {
        let result = self.try_add_requirement(parent, child, Placement::After(existing));
        self.report_attach("add_requirement_after", result)
    }

    pub fn try_add_requirement(
        &mut self,
        parent: TaskId,
        child: TaskId,
        placement: Placement,
    ) -> Result<(), AttachError> {
        self.check_attachable(parent, child)?;
        let index = match placement {
            Placement::Last => self.get(parent).requirements.len(),
            Placement::First => 0,
            Placement::After(existing) => {
                let position = self
                    .get(parent)
                    .requirements
                    .iter()
                    .position(|id| *id == existing);
                match position {
                    Some(position) => position + 1,
                    None => {
                        return Err(AttachError::NotARequirement {
                            existing: self.get(existing).name.clone(),
                            parent: self.get(parent).name.clone(),
                        });
                    }
                }
            }
        };
        self.get_mut(parent).requirements.insert(index, child);
        self.get_mut(child).parent = Some(ParentLink::Requirement(parent));
        debug!(parent = %parent, child = %child, index, "requirement attached");
        Ok(())
    }

    pub fn add_passive(&mut self, parent: TaskId, child: TaskId) -> bool {
        let result = self.try_add_passive(parent, child);
        self.report_attach("add_passive", result)
    }

    pub fn try_add_passive(&mut self, parent: TaskId, child: TaskId) -> Result<(), AttachError> {
        self.check_attachable(parent, child)?;
        self.get_mut(parent).passives.push(child);
        self.get_mut(child).parent = Some(ParentLink::Passive(parent));
        debug!(parent = %parent, child = %child, "passive attached");
        Ok(())
    }

    pub fn remove_requirement(&mut self, parent: TaskId, child: TaskId) -> bool {
        let result = self.detach(parent, child, ParentLink::Requirement(parent));
        self.report_attach("remove_requirement", result)
    }

    pub fn remove_passive(&mut self, parent: TaskId, child: TaskId) -> bool {
        let result = self.detach(parent, child, ParentLink::Passive(parent));
        self.report_attach("remove_passive", result)
    }

    /// Detach every requirement and passive of `id`, unregistering each.
    pub fn remove_all_passives_and_requirements(&mut self, id: TaskId) {
        let task = self.get(id);
        let children: Vec<TaskId> = task
            .requirements
            .iter()
            .chain(task.passives.iter())
            .copied()
            .collect();
        for child in children.into_iter().rev() {
            self.unlink(id, child);
        }
    }

    /// Drop an inactive top-level task and all of its children from the arena.
    pub fn discard(&mut self, id: TaskId) -> bool {
        let result = self.try_discard(id);
        self.report_attach("discard", result)
    }

    pub fn try_discard(&mut self, id: TaskId) -> Result<(), AttachError> {
        let task = self.get(id);
        if id == self.root || task.is_active() {
            return Err(AttachError::StillActive(task.name.clone()));
        }
        if let Some(link) = task.parent {
            return Err(AttachError::AlreadyParented {
                child: task.name.clone(),
                parent: self.get(link.parent()).name.clone(),
            });
        }
        self.drop_subtree(id);
        Ok(())
    }

    fn drop_subtree(&mut self, id: TaskId) {
        self.unregister_branch(id);
        let Some(task) = self.tasks.remove(&id) else {
            return;
        };
        debug!(task = %id, name = %task.name, "task discarded");
        for child in task.requirements.into_iter().chain(task.passives) {
            self.drop_subtree(child);
        }
    }

    fn check_attachable(&self, parent: TaskId, child: TaskId) -> Result<(), AttachError> {
        let task = self.get(child);
        if parent == child {
            return Err(AttachError::SelfReference(task.name.clone()));
        }
        if let Some(link) = task.parent {
            return Err(AttachError::AlreadyParented {
                child: task.name.clone(),
                parent: self.get(link.parent()).name.clone(),
            });
        }
        if task.registered {
            return Err(AttachError::Registered(task.name.clone()));
        }
        if child == self.root || task.is_active() {
            return Err(AttachError::Queued(task.name.clone()));
        }
        let mut ancestor = Some(parent);
        while let Some(current) = ancestor {
            if current == child {
                return Err(AttachError::Cycle {
                    child: task.name.clone(),
                    parent: self.get(parent).name.clone(),
                });
            }
            ancestor = self.get(current).parent.map(ParentLink::parent);
        }
        Ok(())
    }

    fn detach(&mut self, parent: TaskId, child: TaskId, link: ParentLink) -> Result<(), AttachError> {
        if self.get(child).parent != Some(link) {
            let kind = match link {
                ParentLink::Requirement(_) => "requirement",
                ParentLink::Passive(_) => "passive",
            };
            return Err(AttachError::NotAChild {
                child: self.get(child).name.clone(),
                parent: self.get(parent).name.clone(),
                kind,
            });
        }
        self.unlink(parent, child);
        Ok(())
    }

    /// Unregister `child`'s subtree and drop it from `parent`'s child lists.
    fn unlink(&mut self, parent: TaskId, child: TaskId) {
        self.unregister_branch(child);
        let owner = self.get_mut(parent);
        if owner.branch_in_progress == Some(child) {
            owner.branch_in_progress = None;
        }
        owner.requirements.retain(|id| *id != child);
        owner.passives.retain(|id| *id != child);
        self.get_mut(child).parent = None;
        debug!(parent = %parent, child = %child, "child detached");
    }

    fn report_attach(&self, operation: &str, result: Result<(), AttachError>) -> bool {
        match result {
            Ok(()) => true,
            Err(err) => {
                warn!(autonomy = %self.name, operation, error = %err, "operation rejected");
                false
            }
        }
    }
}
