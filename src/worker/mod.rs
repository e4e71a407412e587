//! Process side of a generation job.
//!
//! - [`ProcessRunner`]: launches the external generator bound to its GPUs, polls
//!   it, and enforces cancellation and timeout with SIGTERM-then-SIGKILL
//! - [`CommandSpec`] / [`CommandBuilder`]: the argv + environment contract a
//!   caller supplies for the GPUs a job was granted
//! - [`CancelSignal`]: cooperative cancellation, checked on every poll tick
//!
//! # Termination sequence
//!
//! 1. SIGTERM to the child's process group
//! 2. Wait up to the grace period for it to exit
//! 3. SIGKILL the group
//! 4. Reap the child before returning
//!
//! Whatever way the leader ends, workers it left in its group get the same
//! SIGTERM, grace period, SIGKILL sequence before output is collected.

pub mod cancel;
pub mod command;
pub mod runner;

pub use cancel::{CancelSignal, NeverCancel};
pub use command::{visible_devices, CommandBuilder, CommandSpec};
pub use runner::{ProcessRunner, RunState};
