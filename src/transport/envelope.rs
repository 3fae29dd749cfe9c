//! Envelope schema exchanged between master and workers.
//!
//! Every frame is one [`Envelope`]: who sent it, an optional addressee, and a tagged
//! [`Command`]. On the wire it is a single JSON object:
//!
//! ```text
//! {"from":"master","to":null,"command":{"cmd":"reload"}}
//! {"from":{"worker":2},"to":3,"command":{"cmd":"msg","payload":{"hello":"peer"}}}
//! {"from":{"worker":2},"to":null,"command":{"cmd":"exit","error":{"message":"boom"}}}
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::RemoteError;

/// Opaque, unique handle of a worker within one master's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(u32);

impl WorkerId {
    /// Wraps a raw id.
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for WorkerId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(WorkerId)
    }
}

/// Sender identity of an envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Peer {
    /// The coordinating process (also used by a standalone process).
    Master,
    /// A pool member.
    Worker(WorkerId),
}

/// Read-only view of one worker, as broadcast in SYNC envelopes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerInfo {
    /// OS process id.
    pub pid: u32,
    /// Wall-clock spawn time.
    pub started_at: SystemTime,
}

/// Snapshot of the pool keyed by worker id.
pub type WorkerMap = BTreeMap<WorkerId, WorkerInfo>;

/// Command carried by an envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
pub enum Command {
    /// Master → worker: run the local shutdown sequence and leave; a replacement follows.
    Reload,
    /// Master → worker: shut down. Worker → master: please shut the cluster down.
    Exit {
        /// Fatal error forwarded by a worker.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<RemoteError>,
    },
    /// Master → worker: fresh copy of the worker map.
    Sync {
        /// Current pool.
        workers: WorkerMap,
    },
    /// Application message, relayed through the master when addressed to a worker.
    Msg {
        /// Opaque application payload.
        payload: serde_json::Value,
    },
}

impl Command {
    /// Short name for log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Reload => "reload",
            Command::Exit { .. } => "exit",
            Command::Sync { .. } => "sync",
            Command::Msg { .. } => "msg",
        }
    }
}

/// One frame on the master/worker channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Sender.
    pub from: Peer,
    /// Addressed worker; `None` means the implicit peer (or everyone for messages).
    #[serde(default)]
    pub to: Option<WorkerId>,
    /// Payload.
    pub command: Command,
}

impl Envelope {
    /// Creates an envelope.
    pub fn new(from: Peer, to: Option<WorkerId>, command: Command) -> Self {
        Self { from, to, command }
    }

    /// Shorthand for an application message.
    pub fn message(from: Peer, to: Option<WorkerId>, payload: serde_json::Value) -> Self {
        Self::new(from, to, Command::Msg { payload })
    }
}
