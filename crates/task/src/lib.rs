//! Lifecycle control for the long-running telemetry loops.
//!
//! A [`TaskController`] owns one [`LoopBody`] and drives it on its own tokio
//! task: `Created → Running → Cancelling → Stopped`. Cancellation is a
//! cooperative signal observed between iterations; nothing is ever aborted
//! mid-iteration. [`TaskGroup`] starts, stops and joins several controllers
//! as one unit.

pub mod controller;
pub mod error;
pub mod group;

pub use controller::{Lifecycle, LoopBody, Step, TaskController, TaskState};
pub use error::TaskError;
pub use group::TaskGroup;
