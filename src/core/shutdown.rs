//! # Coordinated shutdown.
//!
//! ```text
//! stop() / signal / worker EXIT
//!   ├─ worker ─► forward EXIT{error?} to the master, keep running
//!   └─ master / standalone
//!        ├─ lock already taken ─► log, return
//!        ├─ publish ShutdownRequested, abandon reload
//!        ├─ registry empty     ─► final shutdown
//!        └─ EXIT to every worker, arm grace timer
//!              └─ each exit drains the registry ─► empty ─► final shutdown
//!
//! final shutdown:
//!   shutdown tasks in order (failures set code 1, the rest still run)
//!     ─► publish Exit{code, signal} ─► exit hook ─► ClusterExit
//! ```
//!
//! If the grace period runs out first, the workers still registered are killed; their
//! exits then drain the registry the usual way.

use std::ops::ControlFlow;

use tracing::{debug, error, info, warn};

use crate::core::cluster::ClusterExit;
use crate::core::control::Control;
use crate::core::orchestrator::Orchestrator;
use crate::core::{ProcessRole, Signal};
use crate::error::RemoteError;
use crate::events::EventKind;
use crate::transport::{Command, Envelope, Peer};

impl Orchestrator {
    /// Entry point for every shutdown request. Workers never shut down on their own
    /// initiative: they hand the request to the master.
    pub(super) async fn request_shutdown(
        &mut self,
        signal: Option<Signal>,
        error: Option<RemoteError>,
    ) -> ControlFlow<ClusterExit> {
        if self.state.role == ProcessRole::Worker {
            if self.state.signal.is_none() {
                self.state.signal = signal;
            }
            return self.forward_exit(error).await;
        }
        self.shutdown(signal, error).await
    }

    /// Starts shutting this process down. Single-shot: later calls only log.
    pub(super) async fn shutdown(
        &mut self,
        signal: Option<Signal>,
        error: Option<RemoteError>,
    ) -> ControlFlow<ClusterExit> {
        if !self.state.lock_shutdown() {
            match &error {
                Some(err) => error!(
                    error = %err,
                    stack = err.stack.as_deref().unwrap_or(""),
                    "error during shutdown"
                ),
                None => debug!("shutdown already in progress"),
            }
            return ControlFlow::Continue(());
        }

        let fatal = error.is_some();
        if let Some(err) = &error {
            error!(
                fatal = true,
                error = %err,
                stack = err.stack.as_deref().unwrap_or(""),
                "fatal error; shutting down"
            );
            self.state.fail();
        }
        if signal.is_some() {
            self.state.signal = signal;
        }
        self.state.is_shutdown = true;
        info!(signal = ?self.state.signal, fatal, workers = self.registry.len(), "shutting down");
        self.publish(EventKind::ShutdownRequested {
            signal: self.state.signal,
            fatal,
        });
        self.abandon_reload();

        if self.registry.is_empty() {
            return ControlFlow::Break(self.finish().await);
        }
        self.retire_all();
        self.arm_grace();
        ControlFlow::Continue(())
    }

    /// Sends EXIT to every registered worker at once and closes their links.
    fn retire_all(&mut self) {
        for entry in self.registry.iter_mut() {
            let id = entry.record.id;
            if entry.retiring {
                debug!(worker = %id, "worker already leaving");
                continue;
            }
            let exit = Envelope::new(Peer::Master, Some(id), Command::Exit { error: None });
            if let Err(err) = entry.retire_with(exit) {
                warn!(worker = %id, error = %err, "cannot send exit; killing worker");
                entry.force_kill();
            }
        }
    }

    fn arm_grace(&self) {
        let Some(grace) = self.cfg.grace_period() else {
            return;
        };
        let inbox = self.inbox.clone();
        let runtime = self.runtime.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = runtime.cancelled() => {}
                _ = tokio::time::sleep(grace) => {
                    let _ = inbox.control(Control::GraceElapsed);
                }
            }
        });
    }

    /// Kills the workers that outlived the grace period.
    pub(super) fn on_grace_elapsed(&mut self) {
        if !self.state.is_shutdown || self.registry.is_empty() {
            return;
        }
        let stuck = self.registry.ids();
        warn!(?stuck, grace_ms = self.cfg.grace.as_millis() as u64, "grace exceeded; killing workers");
        self.publish(EventKind::GraceExceeded { stuck });
        for entry in self.registry.iter_mut() {
            entry.force_kill();
        }
    }

    /// Worker side: ask the master to shut the cluster down.
    pub(super) async fn forward_exit(
        &mut self,
        error: Option<RemoteError>,
    ) -> ControlFlow<ClusterExit> {
        let from = match self.worker_id {
            Some(id) => Peer::Worker(id),
            None => Peer::Master,
        };
        let Some(link) = &self.master else {
            return self.shutdown(None, error).await;
        };
        let sent = link.send(Envelope::new(from, None, Command::Exit { error }));
        match sent {
            Ok(()) => {
                debug!("exit request forwarded to master");
                ControlFlow::Continue(())
            }
            Err(err) => {
                error!(error = %err, "cannot reach master; shutting down locally");
                self.state.fail();
                self.shutdown(None, None).await
            }
        }
    }

    /// Final shutdown: runs shutdown tasks, publishes `Exit` and runs the exit hook.
    pub(super) async fn finish(&mut self) -> ClusterExit {
        self.runtime.cancel();

        // A pooled master only runs the tasks meant for it.
        let pooled = self.state.pooled;
        for task in std::mem::take(&mut self.tasks) {
            if pooled && !task.runs_on_master() {
                debug!(task = task.name(), "shutdown task skipped on master");
                continue;
            }
            let name = task.name().to_owned();
            match task.run().await {
                Ok(()) => debug!(task = %name, "shutdown task done"),
                Err(err) => {
                    error!(task = %name, error = %err, label = err.as_label(), "shutdown task failed");
                    self.state.fail();
                }
            }
        }

        let exit = ClusterExit::new(self.state.exit_code(), self.state.signal);
        info!(code = exit.code, signal = ?exit.signal, "exiting");
        self.publish(EventKind::Exit {
            code: exit.code,
            signal: exit.signal,
        });

        if let Some(hook) = self.exit_hook.take() {
            if let Err(err) = hook.run().await {
                warn!(error = %err, label = err.as_label(), "exit hook failed");
            }
        }
        exit
    }
}
