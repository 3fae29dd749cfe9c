//! Mode selection: role-specific startup and OS signal routing.

use std::ops::ControlFlow;

use tracing::{debug, error, info, warn};

use crate::core::cluster::ClusterExit;
use crate::core::control::Control;
use crate::core::orchestrator::Orchestrator;
use crate::core::signals::SignalListener;
use crate::core::{ProcessRole, Signal};
use crate::error::RemoteError;
use crate::events::EventKind;

impl Orchestrator {
    /// Brings the process up in its role and emits exactly one readiness event.
    ///
    /// - Standalone: nothing to start.
    /// - Master: spawns `workers` workers one after another (none for a single-process
    ///   master).
    /// - Worker: attaches to the master's channel. A worker that cannot reach its
    ///   master finishes immediately with code 1.
    pub(super) async fn start(&mut self) -> ControlFlow<ClusterExit> {
        if self.signals {
            self.listen_signals();
        }

        match self.state.role {
            ProcessRole::Standalone => {
                self.publish(EventKind::StandaloneReady { pid: self.pid });
            }
            ProcessRole::Master => {
                if self.state.pooled {
                    for _ in 0..self.state.desired_workers {
                        if let Err(err) = self.spawn_worker().await {
                            error!(error = %err, label = err.as_label(), "initial pool spawn failed");
                            let remote = RemoteError::from_error(&err);
                            return self.shutdown(None, Some(remote)).await;
                        }
                    }
                }
                info!(workers = self.registry.len(), "master started");
                self.publish(EventKind::MasterReady { pid: self.pid });
            }
            ProcessRole::Worker => {
                let Some(connector) = self.connector.clone() else {
                    error!("worker has no master channel");
                    self.state.fail();
                    return ControlFlow::Break(self.finish().await);
                };
                match connector.connect(self.inbox.clone()) {
                    Ok(link) => self.master = Some(link),
                    Err(err) => {
                        error!(error = %err, label = err.as_label(), "cannot attach to master");
                        self.state.fail();
                        return ControlFlow::Break(self.finish().await);
                    }
                }
                if let Some(id) = self.worker_id {
                    self.publish(EventKind::WorkerReady { pid: self.pid, id });
                }
            }
        }
        ControlFlow::Continue(())
    }

    /// Spawns the OS signal listener; it stops when the runtime token is cancelled.
    fn listen_signals(&self) {
        let inbox = self.inbox.clone();
        let runtime = self.runtime.clone();
        tokio::spawn(async move {
            let mut listener = match SignalListener::new() {
                Ok(listener) => listener,
                Err(err) => {
                    warn!(error = %err, "signal handlers unavailable");
                    return;
                }
            };
            loop {
                let signal = tokio::select! {
                    _ = runtime.cancelled() => return,
                    signal = listener.recv() => signal,
                };
                let Some(signal) = signal else { return };
                if inbox.control(Control::Signal(signal)).is_err() {
                    return;
                }
            }
        });
    }

    /// `SIGHUP` reloads a master; every other signal requests a graceful shutdown.
    pub(super) async fn on_signal(&mut self, signal: Signal) -> ControlFlow<ClusterExit> {
        info!(%signal, "signal received");
        match signal {
            Signal::Hangup => {
                self.begin_reload();
                ControlFlow::Continue(())
            }
            Signal::Interrupt | Signal::Quit | Signal::Terminate => {
                self.request_shutdown(Some(signal), None).await
            }
        }
    }

    /// Worker side: the master's channel is gone, so nobody will ever tell this
    /// worker to leave. It shuts itself down and reports failure.
    pub(super) async fn on_master_closed(&mut self) -> ControlFlow<ClusterExit> {
        if self.state.is_locked() {
            debug!("master channel closed during shutdown");
            return ControlFlow::Continue(());
        }
        error!(fatal = true, "lost the master channel; shutting down");
        self.state.fail();
        self.shutdown(None, None).await
    }
}
