//! Stable exit codes for autonomy CLI commands.

/// Command succeeded: scenario met its expectations, or a route was found.
pub const OK: i32 = 0;
/// Command failed due to an invalid document, config, or other errors.
pub const INVALID: i32 = 1;
/// `autonomy path` or `autonomy craft` found no route to the goal.
pub const NO_PATH: i32 = 2;
/// `autonomy simulate` finished but expectations or invariants did not hold.
pub const EXPECTATION_MISMATCH: i32 = 3;
