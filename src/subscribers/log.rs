//! # LogWriter: structured event logger
//!
//! A subscriber that renders every cluster [`Event`] as a `tracing` record, so an
//! application gets a readable lifecycle trail by installing a `tracing` subscriber.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO procvisor::subscribers::log: master ready pid=4120
//! INFO procvisor::subscribers::log: worker spawned worker=1 pid=4121
//! WARN procvisor::subscribers::log: worker exited worker=2 pid=4122 status="killed by SIGKILL" intentional=false
//! INFO procvisor::subscribers::log: auto-spawned replacement worker=5 pid=4130
//! INFO procvisor::subscribers::log: reload complete
//! INFO procvisor::subscribers::log: exit code=0 signal=Some(Interrupt)
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::diag::describe_exit;
use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event logger subscriber.
#[derive(Default, Debug)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        match &e.kind {
            EventKind::StandaloneReady { pid } => info!(pid, "standalone ready"),
            EventKind::MasterReady { pid } => info!(pid, "master ready"),
            EventKind::WorkerReady { pid, id } => info!(pid, worker = %id, "worker ready"),
            EventKind::WorkerSpawned { id, pid } => info!(worker = %id, pid, "worker spawned"),
            EventKind::WorkerExited {
                id,
                pid,
                code,
                signal,
                intentional,
            } => {
                let status = describe_exit(*code, *signal);
                if *intentional {
                    info!(worker = %id, pid, %status, "worker exited");
                } else {
                    warn!(worker = %id, pid, %status, intentional, "worker exited");
                }
            }
            EventKind::AutoSpawn { id, pid } => {
                info!(worker = %id, pid, "auto-spawned replacement")
            }
            EventKind::CapacityReduced { id, desired } => {
                error!(worker = %id, desired, "pool capacity reduced")
            }
            EventKind::Reloading { id, pid } => info!(worker = %id, pid, "reloaded worker"),
            EventKind::ReloadComplete => info!("reload complete"),
            EventKind::Message { from, payload } => debug!(?from, %payload, "message"),
            EventKind::Sync { workers } => debug!(workers = workers.len(), "worker map synced"),
            EventKind::ShutdownRequested { signal, fatal } => {
                info!(?signal, fatal, "shutdown requested")
            }
            EventKind::GraceExceeded { stuck } => warn!(?stuck, "grace exceeded"),
            EventKind::Exit { code, signal } => info!(code, ?signal, "exit"),
            EventKind::SubscriberOverflow { subscriber, reason } => {
                warn!(subscriber, reason, "subscriber overflow")
            }
            EventKind::SubscriberPanicked { subscriber, info } => {
                error!(subscriber, info = info.as_str(), "subscriber panicked")
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
