//! Envelope handling: decoding inbound frames, relaying application messages and
//! keeping workers' copy of the worker map in sync.
//!
//! ## Routing
//! ```text
//! master  ─ send(Some(w)) ─► worker w
//! master  ─ send(None)    ─► every worker
//! worker a ─ send(Some(b)) ─► master ─ relay ─► worker b
//! worker a ─ send(None)    ─► master (Message event) ─ relay ─► every worker but a
//! standalone ─ send(None)  ─► itself (Message event)
//! ```
//!
//! Malformed frames are logged and dropped; the channel keeps working.

use std::ops::ControlFlow;

use tracing::{debug, warn};

use crate::core::ProcessRole;
use crate::core::cluster::ClusterExit;
use crate::core::orchestrator::Orchestrator;
use crate::error::ClusterError;
use crate::events::EventKind;
use crate::transport::{Command, Envelope, Peer, WorkerId, codec};

impl Orchestrator {
    pub(super) async fn on_frame(
        &mut self,
        from: Option<WorkerId>,
        frame: &[u8],
    ) -> ControlFlow<ClusterExit> {
        let envelope = match codec::decode(frame) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(
                    worker = ?from,
                    error = %err,
                    label = err.as_label(),
                    bytes = frame.len(),
                    "dropping malformed message"
                );
                return ControlFlow::Continue(());
            }
        };
        match from {
            Some(id) => self.on_worker_envelope(id, envelope).await,
            None => self.on_master_envelope(envelope).await,
        }
    }

    /// Master side.
    async fn on_worker_envelope(
        &mut self,
        id: WorkerId,
        envelope: Envelope,
    ) -> ControlFlow<ClusterExit> {
        match envelope.command {
            Command::Exit { error } => {
                debug!(worker = %id, fatal = error.is_some(), "worker requested shutdown");
                self.shutdown(None, error).await
            }
            Command::Msg { payload } => {
                let from = Peer::Worker(id);
                match envelope.to {
                    Some(target) => {
                        let relayed = Envelope::message(from, Some(target), payload);
                        if let Err(err) = self.deliver(target, relayed) {
                            warn!(from = %id, to = %target, error = %err, label = err.as_label(), "relay failed");
                        }
                    }
                    None => {
                        self.broadcast(&Envelope::message(from, None, payload.clone()), Some(id));
                        self.publish(EventKind::Message { from, payload });
                    }
                }
                ControlFlow::Continue(())
            }
            command => {
                warn!(worker = %id, command = command.name(), "unexpected command from worker");
                ControlFlow::Continue(())
            }
        }
    }

    /// Worker side.
    async fn on_master_envelope(&mut self, envelope: Envelope) -> ControlFlow<ClusterExit> {
        match envelope.command {
            Command::Reload | Command::Exit { .. } => {
                debug!(command = envelope.command.name(), "master asked this worker to leave");
                self.shutdown(None, None).await
            }
            Command::Sync { workers } => {
                if self.cfg.sync_enabled(self.state.role) {
                    self.peers.send_replace(workers.clone());
                    self.publish(EventKind::Sync { workers });
                }
                ControlFlow::Continue(())
            }
            Command::Msg { payload } => {
                self.publish(EventKind::Message {
                    from: envelope.from,
                    payload,
                });
                ControlFlow::Continue(())
            }
        }
    }

    /// Application message from the local handle; `from` is filled in by role.
    pub(super) fn send_message(
        &mut self,
        to: Option<WorkerId>,
        payload: serde_json::Value,
    ) -> Result<(), ClusterError> {
        let result = match self.state.role {
            ProcessRole::Standalone => match to {
                None => {
                    self.publish(EventKind::Message {
                        from: Peer::Master,
                        payload,
                    });
                    Ok(())
                }
                Some(id) => Err(ClusterError::TargetNotFound(id)),
            },
            ProcessRole::Master => {
                let envelope = Envelope::message(Peer::Master, to, payload);
                match to {
                    Some(id) => self.deliver(id, envelope),
                    None => {
                        self.broadcast(&envelope, None);
                        Ok(())
                    }
                }
            }
            ProcessRole::Worker => {
                let from = self.worker_id.map_or(Peer::Master, Peer::Worker);
                let link = self.master.as_ref().ok_or(ClusterError::Closed)?;
                link.send(Envelope::message(from, to, payload))
                    .map_err(ClusterError::from)
            }
        };
        if let Err(err) = &result {
            warn!(to = ?to, error = %err, label = err.as_label(), "message not sent");
        }
        result
    }

    /// Sends to one registered worker.
    fn deliver(&self, id: WorkerId, envelope: Envelope) -> Result<(), ClusterError> {
        let entry = self
            .registry
            .get(id)
            .ok_or(ClusterError::TargetNotFound(id))?;
        entry.send(envelope)?;
        Ok(())
    }

    /// Sends to every registered worker, optionally skipping one.
    fn broadcast(&self, envelope: &Envelope, except: Option<WorkerId>) {
        for entry in self.registry.iter() {
            let id = entry.record.id;
            if Some(id) == except {
                continue;
            }
            if let Err(err) = entry.send(envelope.clone()) {
                debug!(worker = %id, error = %err, command = envelope.command.name(), "broadcast skipped worker");
            }
        }
    }

    /// Publishes the current map locally and to every worker. No-op unless sync is on.
    pub(super) fn sync_workers(&mut self) {
        if !self.cfg.sync_enabled(self.state.role) {
            return;
        }
        let workers = self.registry.snapshot();
        self.peers.send_replace(workers.clone());
        self.broadcast(
            &Envelope::new(
                Peer::Master,
                None,
                Command::Sync {
                    workers: workers.clone(),
                },
            ),
            None,
        );
        self.publish(EventKind::Sync { workers });
    }
}
