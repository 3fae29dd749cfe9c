//! # Orchestrator: the single control flow of one cluster process.
//!
//! The orchestrator owns every piece of mutable cluster state (role flags, the worker
//! registry, the reload plan, shutdown tasks and the exit hook) and processes
//! [`Control`] messages strictly one at a time:
//!
//! ```text
//! Spawn impl ─┐  (worker frames / exits)
//! Connect    ─┤  (master frames / channel loss)
//! signals    ─┼──► Inbox ──► [mpsc] ──► Orchestrator::dispatch
//! handle     ─┤  (stop / reload / send / tasks)            │
//! grace      ─┘  (timer)                                   ├─► mode      (startup, signals)
//!                                                          ├─► pool      (spawn, exit, respawn)
//!                                                          ├─► reload    (rolling replacement)
//!                                                          ├─► shutdown  (drain, tasks, exit)
//!                                                          └─► messaging (decode, relay, sync)
//! ```
//!
//! Handlers return [`ControlFlow`]: `Break(exit)` means final shutdown has completed and
//! the process should terminate with `exit`.

use std::ops::ControlFlow;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::ClusterConfig;
use crate::core::cluster::ClusterExit;
use crate::core::control::{Control, Inbox};
use crate::core::reload::ReloadPlan;
use crate::core::registry::Registry;
use crate::core::state::OrchestratorState;
use crate::core::ProcessRole;
use crate::events::{Bus, Event, EventKind};
use crate::policies::RespawnPolicy;
use crate::process::{Connect, Spawn};
use crate::tasks::{ExitHook, ShutdownTask};
use crate::transport::{Link, WorkerId, WorkerMap};

/// Everything the builder hands to a new orchestrator.
pub(crate) struct OrchestratorParams {
    pub(crate) cfg: ClusterConfig,
    pub(crate) role: ProcessRole,
    pub(crate) worker_id: Option<WorkerId>,
    pub(crate) bus: Bus,
    pub(crate) inbox: Inbox,
    pub(crate) rx: mpsc::UnboundedReceiver<Control>,
    pub(crate) spawner: Option<Arc<dyn Spawn>>,
    pub(crate) connector: Option<Arc<dyn Connect>>,
    pub(crate) peers: watch::Sender<WorkerMap>,
    pub(crate) signals: bool,
}

pub(crate) struct Orchestrator {
    pub(super) cfg: ClusterConfig,
    pub(super) state: OrchestratorState,
    pub(super) policy: RespawnPolicy,
    pub(super) pid: u32,
    /// Own id, workers only.
    pub(super) worker_id: Option<WorkerId>,
    pub(super) registry: Registry,
    pub(super) reload: Option<ReloadPlan>,
    pub(super) bus: Bus,
    pub(super) inbox: Inbox,
    rx: mpsc::UnboundedReceiver<Control>,
    pub(super) spawner: Option<Arc<dyn Spawn>>,
    pub(super) connector: Option<Arc<dyn Connect>>,
    /// Outbound link to the master, workers only.
    pub(super) master: Option<Link>,
    /// Published worker map; only written while sync is enabled.
    pub(super) peers: watch::Sender<WorkerMap>,
    pub(super) tasks: Vec<ShutdownTask>,
    pub(super) exit_hook: Option<ExitHook>,
    pub(super) signals: bool,
    /// Cancelled on final shutdown; stops the signal listener and grace timer.
    pub(super) runtime: CancellationToken,
}

impl Orchestrator {
    pub(crate) fn new(params: OrchestratorParams) -> Self {
        let state = OrchestratorState::new(params.role, params.cfg.workers);
        Self {
            policy: RespawnPolicy::from_config(&params.cfg),
            cfg: params.cfg,
            state,
            pid: std::process::id(),
            worker_id: params.worker_id,
            registry: Registry::new(),
            reload: None,
            bus: params.bus,
            inbox: params.inbox,
            rx: params.rx,
            spawner: params.spawner,
            connector: params.connector,
            master: None,
            peers: params.peers,
            tasks: Vec::new(),
            exit_hook: None,
            signals: params.signals,
            runtime: CancellationToken::new(),
        }
    }

    /// Starts the process in its role, then handles control messages until final
    /// shutdown completes.
    pub(crate) async fn run(mut self) -> ClusterExit {
        if let ControlFlow::Break(exit) = self.start().await {
            return exit;
        }
        while let Some(control) = self.rx.recv().await {
            if let ControlFlow::Break(exit) = self.dispatch(control).await {
                return exit;
            }
        }
        // The orchestrator holds an inbox itself, so the queue only ends with it.
        self.finish().await
    }

    async fn dispatch(&mut self, control: Control) -> ControlFlow<ClusterExit> {
        match control {
            Control::Frame { from, frame } => self.on_frame(from, &frame).await,
            Control::WorkerExited { id, exit } => self.on_worker_exit(id, exit).await,
            Control::MasterClosed => self.on_master_closed().await,
            Control::Signal(signal) => self.on_signal(signal).await,
            Control::Stop { error } => self.request_shutdown(None, error).await,
            Control::Reload => {
                self.begin_reload();
                ControlFlow::Continue(())
            }
            Control::Send { to, payload, reply } => {
                let _ = reply.send(self.send_message(to, payload));
                ControlFlow::Continue(())
            }
            Control::AddShutdownTask(task) => {
                debug!(task = task.name(), "shutdown task registered");
                self.tasks.push(task);
                ControlFlow::Continue(())
            }
            Control::OnExit(hook) => {
                if self.exit_hook.replace(hook).is_some() {
                    debug!("exit hook replaced");
                }
                ControlFlow::Continue(())
            }
            Control::GraceElapsed => {
                self.on_grace_elapsed();
                ControlFlow::Continue(())
            }
        }
    }

    pub(super) fn publish(&self, kind: EventKind) {
        self.bus.publish(Event::new(kind));
    }
}
