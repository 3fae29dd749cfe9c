//! Control messages: the single input queue of the orchestrator.
//!
//! Every stimulus (worker frames and exits, OS signals, API calls, timers) becomes one
//! [`Control`] value. The orchestrator handles them one at a time, in arrival order, so
//! no state is ever written from two places.

use tokio::sync::{mpsc, oneshot};

use crate::core::Signal;
use crate::error::{ClusterError, RemoteError};
use crate::process::WorkerExit;
use crate::tasks::{ExitHook, ShutdownTask};
use crate::transport::WorkerId;

#[derive(Debug)]
pub(crate) enum Control {
    /// Raw inbound frame; `from` is `None` on the worker side (frame from the master).
    Frame {
        from: Option<WorkerId>,
        frame: Vec<u8>,
    },
    WorkerExited {
        id: WorkerId,
        exit: WorkerExit,
    },
    MasterClosed,
    Signal(Signal),
    Stop {
        error: Option<RemoteError>,
    },
    Reload,
    Send {
        to: Option<WorkerId>,
        payload: serde_json::Value,
        reply: oneshot::Sender<Result<(), ClusterError>>,
    },
    AddShutdownTask(ShutdownTask),
    OnExit(ExitHook),
    GraceElapsed,
}

/// Inbound handle given to [`Spawn`](crate::Spawn) and [`Connect`](crate::Connect)
/// implementations.
///
/// All methods fail with [`ClusterError::Closed`] once the cluster has finished.
#[derive(Clone, Debug)]
pub struct Inbox {
    tx: mpsc::UnboundedSender<Control>,
}

impl Inbox {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<Control>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Master side: a frame arrived from worker `id`.
    pub fn worker_frame(&self, id: WorkerId, frame: Vec<u8>) -> Result<(), ClusterError> {
        self.control(Control::Frame {
            from: Some(id),
            frame,
        })
    }

    /// Master side: worker `id` is gone.
    pub fn worker_exited(&self, id: WorkerId, exit: WorkerExit) -> Result<(), ClusterError> {
        self.control(Control::WorkerExited { id, exit })
    }

    /// Worker side: a frame arrived from the master.
    pub fn master_frame(&self, frame: Vec<u8>) -> Result<(), ClusterError> {
        self.control(Control::Frame { from: None, frame })
    }

    /// Worker side: the channel to the master is gone.
    pub fn master_closed(&self) -> Result<(), ClusterError> {
        self.control(Control::MasterClosed)
    }

    pub(crate) fn control(&self, control: Control) -> Result<(), ClusterError> {
        self.tx.send(control).map_err(|_| ClusterError::Closed)
    }
}
