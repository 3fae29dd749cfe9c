//! # Rolling reload: sequential replacement of every worker.
//!
//! The worker ids present when the reload starts form a fixed queue. Exactly one worker
//! is retired at a time, and the next RELOAD is sent only once its replacement is
//! registered, so the pool never drops below `desired - 1` workers:
//!
//! ```text
//! begin ─► snapshot ids [1, 2, 3]
//!   RELOAD 1 ─► exit(1) ─► spawn 4 ─► Reloading{4}
//!   RELOAD 2 ─► exit(2) ─► spawn 5 ─► Reloading{5}
//!   RELOAD 3 ─► exit(3) ─► spawn 6 ─► Reloading{6}
//!   queue empty ─► ReloadComplete
//! ```
//!
//! A worker from the queue that is already gone when its turn comes is skipped. A
//! shutdown, or a replacement that fails to start, abandons whatever is left of the
//! queue.

use std::collections::VecDeque;

use tracing::{debug, error, info, warn};

use crate::core::ProcessRole;
use crate::core::orchestrator::Orchestrator;
use crate::events::EventKind;
use crate::transport::{Command, Envelope, Peer, WorkerId};

/// Remaining work of an in-flight reload.
#[derive(Debug, Default)]
pub(crate) struct ReloadPlan {
    queue: VecDeque<WorkerId>,
    /// Worker whose exit-and-replace cycle is in flight.
    current: Option<WorkerId>,
}

impl ReloadPlan {
    pub(crate) fn new(ids: impl IntoIterator<Item = WorkerId>) -> Self {
        Self {
            queue: ids.into_iter().collect(),
            current: None,
        }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl Orchestrator {
    /// Starts a rolling reload. Ignored anywhere but on a pool-managing master, and
    /// while another reload or a shutdown is in progress.
    pub(super) fn begin_reload(&mut self) {
        if self.state.role != ProcessRole::Master || !self.state.pooled {
            debug!(role = %self.state.role, "reload ignored: no worker pool");
            return;
        }
        if self.state.is_shutdown {
            debug!("reload ignored: shutting down");
            return;
        }
        if self.state.is_reloading {
            info!("reload already in progress");
            return;
        }
        if self.registry.is_empty() {
            debug!("reload ignored: no workers");
            return;
        }

        let plan = ReloadPlan::new(self.registry.ids());
        info!(workers = plan.remaining(), "reload started");
        self.state.begin_reload();
        self.reload = Some(plan);
        self.reload_next();
    }

    pub(super) fn is_reload_target(&self, id: WorkerId) -> bool {
        self.state.is_reloading && self.reload.as_ref().is_some_and(|p| p.current == Some(id))
    }

    /// Sends RELOAD to the next worker still registered, or completes the reload.
    fn reload_next(&mut self) {
        let Some(plan) = self.reload.as_mut() else {
            return;
        };
        plan.current = None;
        while let Some(id) = plan.queue.pop_front() {
            let Some(entry) = self.registry.get_mut(id) else {
                debug!(worker = %id, "worker gone before its reload turn");
                continue;
            };
            plan.current = Some(id);
            let reload = Envelope::new(Peer::Master, Some(id), Command::Reload);
            if let Err(err) = entry.retire_with(reload) {
                warn!(worker = %id, error = %err, "cannot send reload; killing worker");
                entry.force_kill();
            }
            return;
        }
        self.complete_reload();
    }

    /// The current worker exited: start its replacement, then move on.
    ///
    /// A replacement that fails to start ends the reload: retiring the next worker
    /// would leave two slots empty.
    pub(super) async fn continue_reload(&mut self) {
        match self.spawn_worker().await {
            Ok(record) => {
                self.state.reloaded_count += 1;
                info!(
                    worker = %record.id,
                    pid = record.pid,
                    reloaded = self.state.reloaded_count,
                    "worker reloaded"
                );
                self.publish(EventKind::Reloading {
                    id: record.id,
                    pid: record.pid,
                });
                self.reload_next();
            }
            Err(err) => {
                error!(error = %err, label = err.as_label(), "reload replacement failed");
                self.abandon_reload();
            }
        }
    }

    fn complete_reload(&mut self) {
        info!(reloaded = self.state.reloaded_count, "reload complete");
        self.state.end_reload();
        self.reload = None;
        self.publish(EventKind::ReloadComplete);
    }

    /// Drops the rest of an in-flight reload.
    pub(super) fn abandon_reload(&mut self) {
        if let Some(plan) = self.reload.take() {
            warn!(
                reloaded = self.state.reloaded_count,
                skipped = plan.remaining(),
                "reload abandoned"
            );
            self.state.end_reload();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_keeps_snapshot_order() {
        let ids = [3, 1, 2].map(WorkerId::new);
        let mut plan = ReloadPlan::new(ids);
        assert_eq!(plan.remaining(), 3);
        assert_eq!(plan.queue.pop_front(), Some(WorkerId::new(3)));
        assert_eq!(plan.current, None);
    }
}
