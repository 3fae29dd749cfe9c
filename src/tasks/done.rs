//! # Completion handle for callback-style tasks.
//!
//! [`Done`] is handed to every shutdown task and to the exit hook. Signalling consumes
//! it, so a task can report completion at most once; dropping it unsignalled is
//! reported as [`TaskError::Abandoned`].
//!
//! ```text
//! runner ── Done::channel() ──► (Done, Completion)
//!   │                             │
//!   ├─► action(done) ──► done.ok() / done.fail(e)
//!   └─► completion.wait().await   ◄── Ok(()) / Err(e) / Abandoned
//! ```

use tokio::sync::oneshot;

use crate::error::TaskError;

/// One-shot completion signal.
#[derive(Debug)]
#[must_use = "a task must signal completion or the runner reports it as abandoned"]
pub struct Done {
    tx: oneshot::Sender<Result<(), TaskError>>,
}

/// Receiving side of a [`Done`].
#[derive(Debug)]
pub(crate) struct Completion {
    rx: oneshot::Receiver<Result<(), TaskError>>,
}

impl Done {
    pub(crate) fn channel() -> (Done, Completion) {
        let (tx, rx) = oneshot::channel();
        (Done { tx }, Completion { rx })
    }

    /// Signals success.
    pub fn ok(self) {
        self.complete(Ok(()));
    }

    /// Signals failure; the process will exit with code 1.
    pub fn fail(self, error: impl std::fmt::Display) {
        self.complete(Err(TaskError::fail(error)));
    }

    /// Signals the given outcome.
    pub fn complete(self, result: Result<(), TaskError>) {
        let _ = self.tx.send(result);
    }
}

impl Completion {
    /// Waits for the paired [`Done`] to be signalled or dropped.
    pub(crate) async fn wait(self) -> Result<(), TaskError> {
        self.rx.await.unwrap_or(Err(TaskError::Abandoned))
    }
}
