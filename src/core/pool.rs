//! Worker pool management: spawning, exit handling and auto-respawn.
//!
//! ```text
//! WorkerExited(id)
//!   ├─► remove from registry, publish WorkerExited
//!   ├─► id is the worker being reloaded ─► continue reload
//!   ├─► else, no shutdown in progress    ─► RespawnPolicy::decide
//!   │        ├─ Replace   ─► spawn, publish AutoSpawn
//!   │        ├─ CrashLoop ─► desired_workers -= 1, publish CapacityReduced
//!   │        └─ Skip
//!   └─► registry empty?
//!            ├─ shutting down      ─► final shutdown
//!            ├─ last exit failed   ─► fatal shutdown
//!            └─ otherwise          ─► sync
//! ```

use std::ops::ControlFlow;

use tracing::{debug, error, info};

use crate::core::cluster::ClusterExit;
use crate::core::orchestrator::Orchestrator;
use crate::core::registry::WorkerRecord;
use crate::diag::describe_exit;
use crate::error::{ClusterError, RemoteError};
use crate::events::EventKind;
use crate::policies::Respawn;
use crate::process::WorkerExit;
use crate::transport::WorkerId;

impl Orchestrator {
    /// Starts one worker, registers it and syncs the new map.
    pub(super) async fn spawn_worker(&mut self) -> Result<WorkerRecord, ClusterError> {
        let spawner = self.spawner.clone().ok_or(ClusterError::NoPool)?;
        let id = self.registry.next_id()?;
        let spawned = spawner.spawn(id, self.inbox.clone()).await?;
        let record = self.registry.insert(id, spawned);

        debug!(worker = %id, pid = record.pid, "worker spawned");
        self.publish(EventKind::WorkerSpawned {
            id,
            pid: record.pid,
        });
        self.sync_workers();
        Ok(record)
    }

    pub(super) async fn on_worker_exit(
        &mut self,
        id: WorkerId,
        exit: WorkerExit,
    ) -> ControlFlow<ClusterExit> {
        let Some(entry) = self.registry.remove(id) else {
            debug!(worker = %id, "exit reported for unknown worker");
            return ControlFlow::Continue(());
        };
        let intentional = entry.retiring;
        let uptime = entry.record.started_at.elapsed();
        let pid = entry.record.pid;
        drop(entry);

        debug!(
            worker = %id,
            pid,
            status = %describe_exit(exit.code, exit.signal),
            intentional,
            uptime_ms = uptime.as_millis() as u64,
            "worker gone"
        );
        self.publish(EventKind::WorkerExited {
            id,
            pid,
            code: exit.code,
            signal: exit.signal,
            intentional,
        });

        if self.is_reload_target(id) {
            self.continue_reload().await;
        } else if !self.state.is_shutdown {
            match self.policy.decide(intentional, uptime) {
                Respawn::Skip => {}
                Respawn::Replace => self.respawn(id).await,
                Respawn::CrashLoop => {
                    let desired = self.state.reduce_capacity();
                    error!(
                        worker = %id,
                        uptime_ms = uptime.as_millis() as u64,
                        min_life_ms = self.policy.min_life.as_millis() as u64,
                        "worker died too early; not respawning"
                    );
                    self.publish(EventKind::CapacityReduced { id, desired });
                }
            }
        }

        if self.registry.is_empty() {
            if self.state.is_shutdown {
                return ControlFlow::Break(self.finish().await);
            }
            if !exit.success() {
                let status = describe_exit(exit.code, exit.signal);
                error!(worker = %id, %status, "last worker failed; shutting down");
                let error = RemoteError::new(format!("last worker {id} {status}"));
                return self.shutdown(None, Some(error)).await;
            }
        }
        self.sync_workers();
        ControlFlow::Continue(())
    }

    /// Replaces a crashed worker.
    async fn respawn(&mut self, replaced: WorkerId) {
        match self.spawn_worker().await {
            Ok(record) => {
                info!(replaced = %replaced, worker = %record.id, pid = record.pid, "worker respawned");
                self.publish(EventKind::AutoSpawn {
                    id: record.id,
                    pid: record.pid,
                });
            }
            Err(err) => {
                error!(replaced = %replaced, error = %err, label = err.as_label(), "respawn failed");
            }
        }
    }
}
