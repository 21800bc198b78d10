//! Task lifecycle error types.

use std::time::Duration;

/// Errors surfaced by [`TaskController::join`](crate::TaskController::join).
///
/// Cloneable so every joiner receives the recorded failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    #[error("task {task} failed: {reason}")]
    Failed { task: String, reason: String },

    #[error("task {task} panicked: {message}")]
    Panicked { task: String, message: String },

    #[error("task {task} did not stop within {timeout:?}")]
    JoinTimeout { task: String, timeout: Duration },
}

impl TaskError {
    /// Name of the task the error belongs to.
    pub fn task(&self) -> &str {
        match self {
            Self::Failed { task, .. } | Self::Panicked { task, .. } | Self::JoinTimeout { task, .. } => {
                task
            }
        }
    }
}
