//! # Shutdown tasks and the exit hook.
//!
//! A [`ShutdownTask`] is a named cleanup action registered on the cluster. Tasks run
//! strictly in registration order during final shutdown; each receives a [`Done`] and
//! the next one starts only after it is signalled.
//!
//! ## Example
//! ```rust
//! use procvisor::{ShutdownTask, TaskError};
//!
//! // Callback style: signal through the handle, possibly from another task.
//! let flush = ShutdownTask::new("flush-logs", |done| {
//!     // ... flush ...
//!     done.ok();
//! });
//!
//! // Future style: completion follows the future's result.
//! let drain = ShutdownTask::future("drain-queue", async {
//!     Ok::<_, TaskError>(())
//! })
//! .master_only(false);
//!
//! assert_eq!(flush.name(), "flush-logs");
//! assert!(!drain.runs_on_master());
//! ```

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::error::TaskError;
use crate::tasks::done::Done;

type Action = Box<dyn FnOnce(Done) + Send + 'static>;

/// Cleanup action that must complete before the process terminates.
pub struct ShutdownTask {
    name: Cow<'static, str>,
    action: Action,
    run_on_master: bool,
}

impl ShutdownTask {
    /// Creates a callback-style task. It runs on the master by default.
    pub fn new<F>(name: impl Into<Cow<'static, str>>, action: F) -> Self
    where
        F: FnOnce(Done) + Send + 'static,
    {
        Self {
            name: name.into(),
            action: Box::new(action),
            run_on_master: true,
        }
    }

    /// Creates a task from a future; completion follows its output.
    ///
    /// The future is spawned on the current tokio runtime when the task starts.
    pub fn future<Fut>(name: impl Into<Cow<'static, str>>, fut: Fut) -> Self
    where
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        Self::new(name, move |done: Done| {
            tokio::spawn(async move { done.complete(fut.await) });
        })
    }

    /// Sets whether the task also runs on a master that manages a pool.
    ///
    /// Workers, standalone processes and single-process masters run every task.
    #[must_use]
    pub fn master_only(mut self, run_on_master: bool) -> Self {
        self.run_on_master = run_on_master;
        self
    }

    /// Task name used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when the task runs on a pool-managing master.
    pub fn runs_on_master(&self) -> bool {
        self.run_on_master
    }

    /// Runs the action and waits for its completion signal.
    pub(crate) async fn run(self) -> Result<(), TaskError> {
        run_with_done(self.action).await
    }
}

impl fmt::Debug for ShutdownTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownTask")
            .field("name", &self.name)
            .field("run_on_master", &self.run_on_master)
            .finish_non_exhaustive()
    }
}

/// Single final hook invoked after the `Exit` event, before termination.
pub struct ExitHook {
    action: Action,
}

impl ExitHook {
    /// Wraps a callback.
    pub fn new<F>(action: F) -> Self
    where
        F: FnOnce(Done) + Send + 'static,
    {
        Self {
            action: Box::new(action),
        }
    }

    pub(crate) async fn run(self) -> Result<(), TaskError> {
        run_with_done(self.action).await
    }
}

impl fmt::Debug for ExitHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExitHook").finish_non_exhaustive()
    }
}

async fn run_with_done(action: Action) -> Result<(), TaskError> {
    let (done, completion) = Done::channel();
    if let Err(panic) = catch_unwind(AssertUnwindSafe(move || action(done))) {
        return Err(TaskError::Panicked {
            info: panic_message(&*panic),
        });
    }
    completion.wait().await
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn callback_task_completes() {
        let task = ShutdownTask::new("ok", |done| done.ok());
        assert!(task.runs_on_master());
        assert_eq!(task.run().await, Ok(()));
    }

    #[tokio::test]
    async fn future_task_reports_failure() {
        let task = ShutdownTask::future("bad", async { Err(TaskError::fail("nope")) });
        assert_eq!(task.run().await, Err(TaskError::fail("nope")));
    }

    #[tokio::test]
    async fn panicking_task_is_a_failure() {
        let task = ShutdownTask::new("boom", |_done| panic!("kaboom"));
        assert_eq!(
            task.run().await,
            Err(TaskError::Panicked {
                info: "kaboom".to_string()
            })
        );
    }

    #[tokio::test]
    async fn exit_hook_waits_for_signal() {
        let hook = ExitHook::new(|done| {
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                done.ok();
            });
        });
        assert_eq!(hook.run().await, Ok(()));
    }
}
