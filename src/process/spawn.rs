//! # Process-spawn seams.
//!
//! The orchestrator never touches OS processes directly. It goes through two traits:
//!
//! - [`Spawn`] (master side): start a worker, hand back its pid, an outbound [`Link`]
//!   and a kill switch. The implementation reports inbound frames and the exit through
//!   the [`Inbox`] it was given.
//! - [`Connect`] (worker side): attach to the master's channel, reporting inbound frames
//!   and channel loss through the [`Inbox`].
//!
//! ```text
//! Orchestrator ── spawn(id, inbox) ──► Spawn impl ──► child process
//!      ▲                                   │
//!      └──── inbox.worker_frame / worker_exited ◄──┘
//! ```

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::Inbox;
use crate::error::ClusterError;
use crate::transport::{Link, WorkerId};

/// How a worker process ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerExit {
    /// Exit code, when the process exited normally.
    pub code: Option<i32>,
    /// Terminating signal number, when killed by a signal.
    pub signal: Option<i32>,
}

impl WorkerExit {
    /// Normal exit with `code`.
    pub const fn code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    /// Death by signal number `signal`.
    pub const fn signal(signal: i32) -> Self {
        Self {
            code: None,
            signal: Some(signal),
        }
    }

    /// True for a clean `0` exit.
    pub fn success(&self) -> bool {
        self.code == Some(0) && self.signal.is_none()
    }
}

impl From<std::process::ExitStatus> for WorkerExit {
    fn from(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = std::os::unix::process::ExitStatusExt::signal(&status);
        #[cfg(not(unix))]
        let signal = None;
        Self {
            code: status.code(),
            signal,
        }
    }
}

/// A started worker, as returned by [`Spawn::spawn`].
#[derive(Debug)]
pub struct Spawned {
    /// OS process id.
    pub pid: u32,
    /// Outbound channel to the worker.
    pub link: Link,
    /// Cancelling this token must kill the worker.
    pub kill: CancellationToken,
}

impl Spawned {
    /// Bundles the parts of a started worker.
    pub fn new(pid: u32, link: Link, kill: CancellationToken) -> Self {
        Self { pid, link, kill }
    }
}

/// Starts worker processes for a master.
#[async_trait]
pub trait Spawn: Send + Sync + 'static {
    /// Starts worker `id`.
    ///
    /// Implementations must eventually call [`Inbox::worker_exited`] exactly once for a
    /// worker they successfully started, and forward every inbound frame through
    /// [`Inbox::worker_frame`].
    async fn spawn(&self, id: WorkerId, inbox: Inbox) -> Result<Spawned, ClusterError>;
}

/// Attaches a worker process to its master's channel.
pub trait Connect: Send + Sync + 'static {
    /// Starts forwarding inbound frames to `inbox` and returns the outbound link.
    ///
    /// Loss of the channel must be reported through [`Inbox::master_closed`].
    fn connect(&self, inbox: Inbox) -> Result<Link, ClusterError>;
}
