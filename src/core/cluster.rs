//! # Cluster: public entry point and handle.
//!
//! [`Cluster`] owns the orchestrator until [`Cluster::run`] drives it; a cloneable
//! [`ClusterHandle`] carries the application-facing API.
//!
//! ## Lifecycle
//! ```text
//! Cluster::builder(cfg) ──► build() ──► Cluster
//!                                         ├─► handle() ──► ClusterHandle (stop, reload, send, ...)
//!                                         └─► run().await
//!                                               ├─ subscriber listener: Bus ─► SubscriberSet
//!                                               ├─ orchestrator (span "cluster")
//!                                               └─ flush subscribers after Exit ─► ClusterExit
//! ```
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use procvisor::{Cluster, ClusterConfig, LogWriter, ShutdownTask};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), procvisor::ClusterError> {
//!     let mut cfg = ClusterConfig::with_workers(4);
//!     cfg.auto_spawn = true;
//!
//!     let cluster = Cluster::builder(cfg)
//!         .with_subscribers(vec![Arc::new(LogWriter::new())])
//!         .build()?;
//!     let handle = cluster.handle();
//!
//!     handle.add_shutdown_task(ShutdownTask::new("flush", |done| done.ok()))?;
//!     if !handle.is_master() {
//!         // serve traffic ...
//!     }
//!
//!     cluster.run().await.terminate()
//! }
//! ```

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, oneshot, watch};
use tracing::{Instrument, info_span, warn};

use super::builder::ClusterBuilder;
use super::control::{Control, Inbox};
use super::orchestrator::Orchestrator;
use crate::config::ClusterConfig;
use crate::core::{ProcessRole, Signal};
use crate::error::{ClusterError, RemoteError, TransportError};
use crate::events::{Bus, Event};
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::tasks::{Done, ExitHook, ShutdownTask};
use crate::transport::{WorkerId, WorkerMap};

/// How the process should end, as decided by final shutdown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use]
pub struct ClusterExit {
    /// `0` on clean shutdown, `1` after a fatal error or a failed shutdown task.
    pub code: i32,
    /// Signal that triggered the shutdown, if any.
    pub signal: Option<Signal>,
}

impl ClusterExit {
    pub(crate) fn new(code: i32, signal: Option<Signal>) -> Self {
        Self { code, signal }
    }

    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Terminates the process with [`code`](Self::code).
    pub fn terminate(self) -> ! {
        std::process::exit(self.code)
    }
}

/// A cluster process, ready to run.
pub struct Cluster {
    orchestrator: Orchestrator,
    handle: ClusterHandle,
    bus: Bus,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl Cluster {
    /// Returns a builder for `cfg`.
    pub fn builder(cfg: ClusterConfig) -> ClusterBuilder {
        ClusterBuilder::new(cfg)
    }

    /// Builds a cluster with default seams, subscribers off.
    pub fn start(cfg: ClusterConfig) -> Result<Self, ClusterError> {
        ClusterBuilder::new(cfg).build()
    }

    pub(crate) fn new(
        orchestrator: Orchestrator,
        handle: ClusterHandle,
        bus: Bus,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Self {
        Self {
            orchestrator,
            handle,
            bus,
            subscribers,
        }
    }

    /// Returns a handle to the public API. Calls made before [`run`](Self::run) are
    /// queued and handled once it starts.
    pub fn handle(&self) -> ClusterHandle {
        self.handle.clone()
    }

    /// Runs the process in its role until final shutdown completes.
    ///
    /// Returns the exit decision instead of terminating, so embedding code and tests
    /// can observe it; call [`ClusterExit::terminate`] to end the process.
    pub async fn run(self) -> ClusterExit {
        let listener = subscriber_listener(
            SubscriberSet::new(self.subscribers, self.bus.clone()),
            self.bus.subscribe(),
        );

        let span = info_span!(
            "cluster",
            role = self.handle.role.as_str(),
            pid = std::process::id(),
            worker = self.handle.id.map(WorkerId::get),
        );
        let exit = self.orchestrator.run().instrument(span).await;

        if let Err(err) = listener.await {
            warn!(error = %err, "subscriber listener failed");
        }
        exit
    }
}

/// Forwards bus events to the subscriber set until the `Exit` event, then drains it.
fn subscriber_listener(
    set: SubscriberSet,
    mut rx: broadcast::Receiver<Event>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => {
                    set.emit(&ev);
                    if ev.is_exit() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "subscriber listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        set.shutdown().await;
    })
}

/// Cloneable handle to a cluster process.
///
/// Every command is queued for the orchestrator and fails with
/// [`ClusterError::Closed`] once the process has finished. Worker-map lookups read the
/// last published snapshot, which stays empty while sync is disabled.
#[derive(Clone, Debug)]
pub struct ClusterHandle {
    role: ProcessRole,
    id: Option<WorkerId>,
    inbox: Inbox,
    bus: Bus,
    workers: watch::Receiver<WorkerMap>,
}

impl ClusterHandle {
    pub(crate) fn new(
        role: ProcessRole,
        id: Option<WorkerId>,
        inbox: Inbox,
        bus: Bus,
        workers: watch::Receiver<WorkerMap>,
    ) -> Self {
        Self {
            role,
            id,
            inbox,
            bus,
            workers,
        }
    }

    pub fn role(&self) -> ProcessRole {
        self.role
    }

    /// True for the coordinating process of a pool.
    pub fn is_master(&self) -> bool {
        self.role == ProcessRole::Master
    }

    /// True unless the process runs standalone.
    pub fn is_cluster(&self) -> bool {
        self.role != ProcessRole::Standalone
    }

    /// Own worker id; `None` outside workers.
    pub fn id(&self) -> Option<WorkerId> {
        self.id
    }

    /// Requests a clean shutdown.
    pub fn stop(&self) -> Result<(), ClusterError> {
        self.inbox.control(Control::Stop { error: None })
    }

    /// Requests a shutdown caused by `error`; the process will exit with code 1.
    ///
    /// On a worker the error is forwarded to the master.
    pub fn stop_with_error(&self, error: RemoteError) -> Result<(), ClusterError> {
        self.inbox.control(Control::Stop { error: Some(error) })
    }

    /// Requests a rolling reload. A no-op anywhere but on a pool-managing master.
    pub fn reload(&self) -> Result<(), ClusterError> {
        self.inbox.control(Control::Reload)
    }

    /// Sends an application message to worker `to`, or to everyone when `None`.
    ///
    /// Fails with [`ClusterError::TargetNotFound`] when a master has no such worker.
    /// From a worker, delivery to the final addressee is not confirmed.
    pub async fn send<T: Serialize>(
        &self,
        to: Option<WorkerId>,
        payload: T,
    ) -> Result<(), ClusterError> {
        let payload = serde_json::to_value(payload).map_err(TransportError::Encode)?;
        let (reply, result) = oneshot::channel();
        self.inbox.control(Control::Send { to, payload, reply })?;
        result.await.map_err(|_| ClusterError::Closed)?
    }

    /// Registers a task for final shutdown.
    pub fn add_shutdown_task(&self, task: ShutdownTask) -> Result<(), ClusterError> {
        self.inbox.control(Control::AddShutdownTask(task))
    }

    /// Sets the final hook; the process terminates once it signals `done`.
    ///
    /// A later call replaces the previous hook.
    pub fn on_exit<F>(&self, hook: F) -> Result<(), ClusterError>
    where
        F: FnOnce(Done) + Send + 'static,
    {
        self.inbox.control(Control::OnExit(ExitHook::new(hook)))
    }

    /// Snapshot of the pool, `{id → {pid, started_at}}`.
    pub fn workers(&self) -> WorkerMap {
        self.workers.borrow().clone()
    }

    pub fn worker_id_by_pid(&self, pid: u32) -> Option<WorkerId> {
        self.workers
            .borrow()
            .iter()
            .find_map(|(id, info)| (info.pid == pid).then_some(*id))
    }

    pub fn worker_pid_by_id(&self, id: WorkerId) -> Option<u32> {
        self.workers.borrow().get(&id).map(|info| info.pid)
    }

    /// Creates a receiver for subsequent cluster events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }
}
