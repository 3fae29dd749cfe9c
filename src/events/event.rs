//! # Lifecycle events published by the cluster runtime.
//!
//! [`EventKind`] classifies events and carries their typed payload:
//! - **Readiness**: one of `StandaloneReady`, `MasterReady`, `WorkerReady` per process
//! - **Pool**: worker spawned/exited, auto-respawn, crash-loop capacity reduction
//! - **Reload**: one `Reloading` per replaced worker, then `ReloadComplete`
//! - **Messaging**: application messages and worker-map syncs
//! - **Shutdown**: request, grace overrun, final `Exit`
//! - **Subscribers**: overflow and panic reports from the fan-out
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use procvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::Exit { code: 0, signal: None });
//! assert!(ev.is_exit());
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::core::Signal;
use crate::transport::{Peer, WorkerId, WorkerMap};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of cluster events, with payload.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    // === Readiness (exactly one per process) ===
    /// Process runs without a pool (`cluster.non.ready`).
    StandaloneReady {
        /// Own pid.
        pid: u32,
    },

    /// Master finished spawning its initial pool (`cluster.master.ready`).
    MasterReady {
        /// Own pid.
        pid: u32,
    },

    /// Worker connected to its master (`cluster.worker.ready`).
    WorkerReady {
        /// Own pid.
        pid: u32,
        /// Own worker id.
        id: WorkerId,
    },

    // === Pool (master only) ===
    /// A worker process was started and registered.
    WorkerSpawned {
        /// New worker.
        id: WorkerId,
        /// Its pid.
        pid: u32,
    },

    /// A worker process ended and was removed from the registry.
    WorkerExited {
        /// Worker that ended.
        id: WorkerId,
        /// Its pid.
        pid: u32,
        /// Exit code, if it exited normally.
        code: Option<i32>,
        /// Terminating OS signal number, if any.
        signal: Option<i32>,
        /// True when the master had asked it to leave.
        intentional: bool,
    },

    /// A crashed worker was replaced (`auto.spawn`).
    AutoSpawn {
        /// Replacement id.
        id: WorkerId,
        /// Replacement pid.
        pid: u32,
    },

    /// A worker crashed before its minimum lifetime; the pool shrank for good.
    CapacityReduced {
        /// Worker that crash-looped.
        id: WorkerId,
        /// Desired pool size after the reduction.
        desired: usize,
    },

    // === Reload ===
    /// One worker has been replaced during a rolling reload (`reload.reloading`).
    Reloading {
        /// Replacement id.
        id: WorkerId,
        /// Replacement pid.
        pid: u32,
    },

    /// Every worker in the reload snapshot has been replaced (`reload.complete`).
    ReloadComplete,

    // === Messaging ===
    /// Application message delivered to this process.
    Message {
        /// Sender.
        from: Peer,
        /// Payload as sent.
        payload: serde_json::Value,
    },

    /// Worker map changed (master) or a fresh copy arrived (worker).
    Sync {
        /// Current pool.
        workers: WorkerMap,
    },

    // === Shutdown ===
    /// Shutdown accepted (first request only).
    ShutdownRequested {
        /// Triggering OS signal, if any.
        signal: Option<Signal>,
        /// True when a fatal error accompanied the request.
        fatal: bool,
    },

    /// Workers did not drain within the grace period and are being killed.
    GraceExceeded {
        /// Workers still registered when the grace period ran out.
        stuck: Vec<WorkerId>,
    },

    /// Final observation point before the process terminates.
    Exit {
        /// Exit code the process will end with.
        code: i32,
        /// Signal that triggered shutdown, if any.
        signal: Option<Signal>,
    },

    // === Subscriber events ===
    /// Subscriber dropped an event (queue full or worker closed).
    SubscriberOverflow {
        /// Subscriber name.
        subscriber: &'static str,
        /// `full` or `closed`.
        reason: &'static str,
    },

    /// Subscriber panicked during event processing.
    SubscriberPanicked {
        /// Subscriber name.
        subscriber: &'static str,
        /// Panic message.
        info: String,
    },
}

/// Cluster event with ordering metadata.
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification and payload.
    pub kind: EventKind,
}

impl Event {
    /// Creates a new event with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
        }
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow { subscriber, reason })
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked { subscriber, info })
    }

    /// True for the three readiness events (`cluster` state events).
    #[inline]
    pub fn is_ready(&self) -> bool {
        matches!(
            self.kind,
            EventKind::StandaloneReady { .. }
                | EventKind::MasterReady { .. }
                | EventKind::WorkerReady { .. }
        )
    }

    #[inline]
    pub fn is_exit(&self) -> bool {
        matches!(self.kind, EventKind::Exit { .. })
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow { .. })
    }
}
