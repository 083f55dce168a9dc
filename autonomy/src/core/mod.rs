//! Deterministic, pure logic: the task scheduler and the transition graphs.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod attach;
pub mod autonomy;
pub mod body_set;
pub mod error;
mod hierarchy;
pub mod interaction;
pub mod invariants;
pub mod kinds;
pub mod path;
pub mod search;
pub mod signals;
pub mod task;
