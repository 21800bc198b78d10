//! Starts, stops and joins a set of controllers together.

use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::select_all;

use crate::{Lifecycle, TaskError, TaskState};

/// A set of loops managed as one pipeline.
///
/// Members are kept behind `Arc` so the owner can retain a typed handle to
/// any of them (e.g. to await the producer alone) while the group drives the
/// rest.
#[derive(Default)]
pub struct TaskGroup {
    tasks: Vec<Arc<dyn Lifecycle>>,
}

impl TaskGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a controller. Members start, stop and join in insertion order.
    pub fn push(&mut self, task: Arc<dyn Lifecycle>) {
        self.tasks.push(task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Starts every member (members already running are left alone).
    pub fn start_all(&self) {
        for task in &self.tasks {
            task.start();
        }
    }

    /// Requests cancellation of every running member.
    pub fn stop_all(&self) {
        for task in &self.tasks {
            task.stop();
        }
    }

    /// Joins every member, even after one has failed.
    ///
    /// Every failure is logged; the first one (in member order) is returned
    /// so the caller can decide whether to restart or shut down.
    pub async fn join_all(&self) -> Result<(), TaskError> {
        let mut first = None;
        for task in &self.tasks {
            if let Err(e) = task.join().await {
                tracing::warn!(task = task.name(), error = %e, "task ended with failure");
                first.get_or_insert(e);
            }
        }

        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Resolves with the failure of the first member to stop with one.
    ///
    /// Members that stop cleanly are ignored, so with no failure (or no
    /// members) this never resolves. Meant as a `select!` arm next to the
    /// caller's other shutdown triggers.
    pub async fn first_failure(&self) -> TaskError {
        if self.tasks.is_empty() {
            return std::future::pending().await;
        }

        let waits = self.tasks.iter().map(|task| {
            async move {
                match task.join().await {
                    Err(e) => e,
                    Ok(()) => std::future::pending().await,
                }
            }
            .boxed()
        });

        let (failure, _, _) = select_all(waits).await;
        failure
    }

    /// Name and state of every member.
    pub fn states(&self) -> Vec<(String, TaskState)> {
        self.tasks
            .iter()
            .map(|t| (t.name().to_owned(), t.state()))
            .collect()
    }
}
