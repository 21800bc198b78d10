//! Single-loop controller with cooperative cancellation.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;

use crate::TaskError;

/// Lifecycle state of a [`TaskController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Created,
    Running,
    Cancelling,
    Stopped,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Cancelling => "cancelling",
            Self::Stopped => "stopped",
        })
    }
}

/// Outcome of one loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Run another iteration (unless cancellation has been requested).
    Continue,
    /// The body has nothing more to do; the loop exits normally.
    Finished,
}

/// The body of a long-running loop.
///
/// The controller calls [`step`](Self::step) once per iteration and checks
/// for cancellation between iterations. The token is passed in so a step that
/// waits (on a tick, a read, a sink) can choose to end that wait early; the
/// step is never interrupted from outside.
///
/// Returning an error is treated as unrecoverable: the loop ends and the
/// error is reported to whoever joins the controller.
pub trait LoopBody: Send + 'static {
    type Error: fmt::Display + Send + 'static;

    fn step(
        &mut self,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Step, Self::Error>> + Send;

    /// Runs once after the loop exits normally (cancelled or finished), e.g.
    /// for a final flush. Not called after a failed step.
    fn drain(&mut self) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async { Ok(()) }
    }
}

#[derive(Debug, Clone)]
struct Status {
    state: TaskState,
    failure: Option<TaskError>,
    cancel: Option<CancellationToken>,
}

/// Starts, cancels and joins one loop over a [`LoopBody`].
///
/// State transitions happen atomically through a `watch` channel, so two
/// concurrent `start()` calls spawn at most one loop and `join()` can be
/// awaited by any number of callers.
pub struct TaskController<B> {
    name: Arc<str>,
    body: Arc<Mutex<B>>,
    status: Arc<watch::Sender<Status>>,
    launches: AtomicU64,
}

impl<B: LoopBody> TaskController<B> {
    /// Creates a controller in the `Created` state. Nothing runs until
    /// [`start`](Self::start).
    pub fn new(name: impl Into<String>, body: B) -> Self {
        let (status, _) = watch::channel(Status {
            state: TaskState::Created,
            failure: None,
            cancel: None,
        });

        Self {
            name: Arc::from(name.into()),
            body: Arc::new(Mutex::new(body)),
            status: Arc::new(status),
            launches: AtomicU64::new(0),
        }
    }

    /// Name used in logs and errors.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        self.status.borrow().state
    }

    /// Number of loops this controller has spawned.
    pub fn launches(&self) -> u64 {
        self.launches.load(Ordering::Relaxed)
    }

    /// Spawns the loop on the current tokio runtime.
    ///
    /// Only acts from `Created` or `Stopped`; in any other state this is a
    /// no-op, so a controller never drives two loops at once. Restarting from
    /// `Stopped` clears the previously recorded failure.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start(&self) {
        let cancel = CancellationToken::new();
        let launched = self.status.send_if_modified(|s| match s.state {
            TaskState::Created | TaskState::Stopped => {
                s.state = TaskState::Running;
                s.failure = None;
                s.cancel = Some(cancel.clone());
                true
            }
            TaskState::Running | TaskState::Cancelling => false,
        });

        if !launched {
            tracing::debug!(task = %self.name, state = %self.state(), "start ignored");
            return;
        }

        let launch = self.launches.fetch_add(1, Ordering::Relaxed) + 1;
        tokio::spawn(run_loop(
            Arc::clone(&self.name),
            Arc::clone(&self.body),
            Arc::clone(&self.status),
            cancel,
        ));

        tracing::info!(task = %self.name, launch, "task started");
    }

    /// Signals the loop to exit at its next iteration boundary.
    ///
    /// Only acts from `Running`. Does not wait; use [`join`](Self::join).
    pub fn stop(&self) {
        let mut token = None;
        self.status.send_if_modified(|s| {
            if s.state == TaskState::Running {
                s.state = TaskState::Cancelling;
                token = s.cancel.clone();
                true
            } else {
                false
            }
        });

        if let Some(token) = token {
            token.cancel();
            tracing::info!(task = %self.name, "task cancellation requested");
        }
    }

    /// Waits until the loop has stopped and returns its recorded failure.
    ///
    /// Returns immediately for a controller that was never started. A body
    /// that finishes on its own completes the join without `stop()`.
    pub async fn join(&self) -> Result<(), TaskError> {
        let mut rx = self.status.subscribe();
        let failure = match rx
            .wait_for(|s| matches!(s.state, TaskState::Created | TaskState::Stopped))
            .await
        {
            Ok(status) => status.failure.clone(),
            // The sender lives in `self`, so the channel cannot close here.
            Err(_) => None,
        };

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Like [`join`](Self::join), but gives up after `timeout`.
    ///
    /// Protects callers from a body that does not observe cancellation
    /// within a reasonable polling interval.
    pub async fn join_timeout(&self, timeout: Duration) -> Result<(), TaskError> {
        match tokio::time::timeout(timeout, self.join()).await {
            Ok(result) => result,
            Err(_) => Err(TaskError::JoinTimeout {
                task: self.name.to_string(),
                timeout,
            }),
        }
    }

    /// Runs `f` against the body.
    ///
    /// The running loop holds the body for its whole lifetime, so this waits
    /// until the controller is not running.
    pub async fn inspect<R>(&self, f: impl FnOnce(&B) -> R) -> R {
        let body = self.body.lock().await;
        f(&body)
    }
}

impl<B> fmt::Debug for TaskController<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskController")
            .field("name", &self.name)
            .field("state", &self.status.borrow().state)
            .field("launches", &self.launches.load(Ordering::Relaxed))
            .finish()
    }
}

/// Object-safe view of a controller, used by [`TaskGroup`](crate::TaskGroup)
/// to manage loops with different body types together.
pub trait Lifecycle: Send + Sync {
    fn name(&self) -> &str;
    fn start(&self);
    fn stop(&self);
    fn state(&self) -> TaskState;
    fn join(&self) -> BoxFuture<'_, Result<(), TaskError>>;
}

impl<B: LoopBody> Lifecycle for TaskController<B> {
    fn name(&self) -> &str {
        TaskController::name(self)
    }

    fn start(&self) {
        TaskController::start(self);
    }

    fn stop(&self) {
        TaskController::stop(self);
    }

    fn state(&self) -> TaskState {
        TaskController::state(self)
    }

    fn join(&self) -> BoxFuture<'_, Result<(), TaskError>> {
        TaskController::join(self).boxed()
    }
}

/// Task entry point: drives the body, then records the outcome.
async fn run_loop<B: LoopBody>(
    name: Arc<str>,
    body: Arc<Mutex<B>>,
    status: Arc<watch::Sender<Status>>,
    cancel: CancellationToken,
) {
    let outcome = AssertUnwindSafe(drive(&name, &body, &cancel))
        .catch_unwind()
        .await;

    let failure = match outcome {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e),
        Err(panic) => Some(TaskError::Panicked {
            task: name.to_string(),
            message: panic_message(panic.as_ref()),
        }),
    };

    match &failure {
        Some(e) => tracing::error!(task = %name, error = %e, "task stopped with failure"),
        None => tracing::info!(task = %name, "task stopped"),
    }

    status.send_modify(|s| {
        s.state = TaskState::Stopped;
        s.failure = failure;
        s.cancel = None;
    });
}

async fn drive<B: LoopBody>(
    name: &str,
    body: &Mutex<B>,
    cancel: &CancellationToken,
) -> Result<(), TaskError> {
    let failed = |e: B::Error| TaskError::Failed {
        task: name.to_owned(),
        reason: e.to_string(),
    };

    let mut body = body.lock().await;
    let mut iterations: u64 = 0;

    loop {
        if cancel.is_cancelled() {
            tracing::debug!(task = name, iterations, "cancellation observed");
            break;
        }

        match body.step(cancel).await.map_err(failed)? {
            Step::Continue => iterations += 1,
            Step::Finished => {
                tracing::debug!(task = name, iterations, "loop body finished");
                break;
            }
        }

        // Let a body that never awaits still share its worker thread.
        tokio::task::yield_now().await;
    }

    body.drain().await.map_err(failed)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}
