//! Hierarchical task scheduling for autonomous characters.
//!
//! An [`Autonomy`](core::autonomy::Autonomy) owns a priority queue of
//! top-level tasks. Each task may depend on requirement tasks that run first
//! and on passive tasks that run alongside it; one validation pass per fixed
//! update walks the current hierarchy, registers the branch in progress, and
//! settles finished tasks. A best-first transition search plans body set
//! changes and interaction recipes.
//!
//! - **[`core`]**: The scheduler, task model, and graph search. No I/O.
//! - **[`io`]**: Config, scenario, and graph document loading.
//!
//! Orchestration modules ([`simulate`], [`plan`]) combine the two to implement
//! CLI commands.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod plan;
pub mod simulate;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
