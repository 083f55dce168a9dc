//! Typed rejections for scheduler operations.
//!
//! The public scheduler API reports these as a logged warning plus a `false`
//! return and leaves all state untouched; the `try_*` variants surface them
//! directly.

use thiserror::Error;

/// Why `start`/`start_constant`/`stage_task` refused a task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartError {
    #[error("task name is missing")]
    MissingName,

    #[error("task '{0}' is already active")]
    AlreadyActive(String),

    #[error("task '{0}' is attached to a parent and cannot be started on its own")]
    HasParent(String),

    #[error("a task named '{0}' is already active in this autonomy")]
    DuplicateName(String),
}

/// Why a requirement/passive attach or detach was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttachError {
    #[error("task '{0}' cannot be attached to itself")]
    SelfReference(String),

    #[error("task '{child}' already belongs to '{parent}'")]
    AlreadyParented { child: String, parent: String },

    #[error("task '{0}' is registered and cannot be re-parented")]
    Registered(String),

    #[error("task '{0}' is queued in the autonomy and cannot be re-parented")]
    Queued(String),

    #[error("attaching '{child}' under '{parent}' would create a cycle")]
    Cycle { child: String, parent: String },

    #[error("task '{existing}' is not a requirement of '{parent}'")]
    NotARequirement { existing: String, parent: String },

    #[error("task '{child}' is not a {kind} of '{parent}'")]
    NotAChild {
        child: String,
        parent: String,
        kind: &'static str,
    },

    #[error("task '{0}' is still active and cannot be discarded")]
    StillActive(String),
}
