//! # Worker registry: the master's authoritative view of its pool.
//!
//! Owned by the orchestrator and mutated only from its control flow, so it needs no
//! lock. Each entry keeps what the master needs to talk to and retire a worker:
//!
//! ```text
//! WorkerId ──► WorkerEntry
//!                ├─ record   (id, pid, started_at, spawned_at)
//!                ├─ link     outbound envelopes, dropped once RELOAD / EXIT is queued
//!                ├─ kill     CancellationToken → Spawn impl kills the process
//!                └─ retiring master asked it to leave (RELOAD / EXIT / kill)
//! ```
//!
//! ## Rules
//! - Ids are allocated from a counter starting at 1 and never reused
//! - `retiring` is the source of the `intentional` flag on exit
//! - A retired worker's link is closed right after its last command, so the child
//!   reads EOF even if it never returns from its own shutdown

use std::collections::BTreeMap;
use std::time::SystemTime;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{ClusterError, TransportError};
use crate::process::Spawned;
use crate::transport::{Envelope, Link, WorkerId, WorkerInfo, WorkerMap};

/// Registry record of one worker.
#[derive(Clone, Copy, Debug)]
pub(crate) struct WorkerRecord {
    pub(crate) id: WorkerId,
    pub(crate) pid: u32,
    /// Monotonic spawn time, for uptime checks.
    pub(crate) started_at: Instant,
    /// Wall-clock spawn time, for the synced map.
    pub(crate) spawned_at: SystemTime,
}

impl WorkerRecord {
    pub(crate) fn info(&self) -> WorkerInfo {
        WorkerInfo {
            pid: self.pid,
            started_at: self.spawned_at,
        }
    }
}

#[derive(Debug)]
pub(crate) struct WorkerEntry {
    pub(crate) record: WorkerRecord,
    /// `None` once the worker has been told to leave.
    pub(crate) link: Option<Link>,
    pub(crate) kill: CancellationToken,
    pub(crate) retiring: bool,
}

impl WorkerEntry {
    pub(crate) fn send(&self, envelope: Envelope) -> Result<(), TransportError> {
        self.link
            .as_ref()
            .ok_or(TransportError::Closed)?
            .send(envelope)
    }

    /// Marks the worker as leaving, queues its last command and closes the link.
    ///
    /// The writer drains the queued envelope before it drops the pipe, so the
    /// worker sees the command first and EOF after it.
    pub(crate) fn retire_with(&mut self, envelope: Envelope) -> Result<(), TransportError> {
        self.retiring = true;
        let link = self.link.take().ok_or(TransportError::Closed)?;
        link.send(envelope)
    }

    /// Retires the worker and kills its process.
    pub(crate) fn force_kill(&mut self) {
        self.retiring = true;
        self.kill.cancel();
    }
}

#[derive(Debug, Default)]
pub(crate) struct Registry {
    workers: BTreeMap<WorkerId, WorkerEntry>,
    last_id: u32,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Allocates the next unused id.
    pub(crate) fn next_id(&mut self) -> Result<WorkerId, ClusterError> {
        self.last_id = self
            .last_id
            .checked_add(1)
            .ok_or(ClusterError::IdsExhausted)?;
        Ok(WorkerId::new(self.last_id))
    }

    /// Registers a freshly started worker and returns its record.
    pub(crate) fn insert(&mut self, id: WorkerId, spawned: Spawned) -> WorkerRecord {
        let record = WorkerRecord {
            id,
            pid: spawned.pid,
            started_at: Instant::now(),
            spawned_at: SystemTime::now(),
        };
        self.workers.insert(
            id,
            WorkerEntry {
                record,
                link: Some(spawned.link),
                kill: spawned.kill,
                retiring: false,
            },
        );
        record
    }

    pub(crate) fn remove(&mut self, id: WorkerId) -> Option<WorkerEntry> {
        self.workers.remove(&id)
    }

    pub(crate) fn get(&self, id: WorkerId) -> Option<&WorkerEntry> {
        self.workers.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: WorkerId) -> Option<&mut WorkerEntry> {
        self.workers.get_mut(&id)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &WorkerEntry> {
        self.workers.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut WorkerEntry> {
        self.workers.values_mut()
    }

    /// Ids in ascending order.
    pub(crate) fn ids(&self) -> Vec<WorkerId> {
        self.workers.keys().copied().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.workers.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Read-only copy for SYNC broadcasts and the public handle.
    pub(crate) fn snapshot(&self) -> WorkerMap {
        self.workers
            .iter()
            .map(|(id, entry)| (*id, entry.record.info()))
            .collect()
    }
}
