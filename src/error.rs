//! Error types used by the cluster runtime, its transport and shutdown tasks.
//!
//! This module defines the main error enums:
//!
//! - [`ClusterError`] errors raised by the orchestration runtime or its public API.
//! - [`TransportError`] failures encoding, decoding or delivering envelopes.
//! - [`TaskError`] failures reported by shutdown tasks and exit hooks.
//!
//! [`RemoteError`] is not a Rust error type; it is the serialized `{message, stack}` form
//! an error takes when a worker forwards it to the master inside an EXIT envelope.
//!
//! Every enum provides `as_label` for logs.

use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transport::WorkerId;

/// # Errors produced by the cluster runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ClusterError {
    /// The OS refused to start a worker process.
    #[error("failed to spawn worker {id}: {source}")]
    Spawn {
        /// Id the worker would have received.
        id: WorkerId,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// A spawned worker is missing one of its channel pipes.
    #[error("worker {id} has no {stream} pipe")]
    MissingPipe {
        /// Affected worker.
        id: WorkerId,
        /// Which pipe (`stdin` / `stdout`).
        stream: &'static str,
    },

    /// The worker exited before the master could read its pid.
    #[error("worker {id} exited before its pid was known")]
    SpawnLost {
        /// Affected worker.
        id: WorkerId,
    },

    /// Every worker id has been handed out.
    #[error("worker ids exhausted")]
    IdsExhausted,

    /// The operation needs a master that manages a worker pool.
    #[error("no worker pool in this process")]
    NoPool,

    /// A message was addressed to a worker that is not in the registry.
    #[error("worker {0} not found")]
    TargetNotFound(WorkerId),

    /// The worker identity passed through the environment could not be parsed.
    #[error("invalid worker id in {var}: {value:?}")]
    InvalidWorkerId {
        /// Environment variable name.
        var: &'static str,
        /// Raw value found.
        value: String,
    },

    /// The current executable could not be located for re-execution.
    #[error("cannot locate current executable: {0}")]
    CurrentExe(#[source] io::Error),

    /// Transport-level failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The cluster control flow is no longer running.
    #[error("cluster runtime is not running")]
    Closed,
}

impl ClusterError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use procvisor::{ClusterError, WorkerId};
    ///
    /// let err = ClusterError::TargetNotFound(WorkerId::new(7));
    /// assert_eq!(err.as_label(), "cluster_target_not_found");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ClusterError::Spawn { .. } => "cluster_spawn_failed",
            ClusterError::MissingPipe { .. } => "cluster_missing_pipe",
            ClusterError::SpawnLost { .. } => "cluster_spawn_lost",
            ClusterError::IdsExhausted => "cluster_ids_exhausted",
            ClusterError::NoPool => "cluster_no_pool",
            ClusterError::TargetNotFound(_) => "cluster_target_not_found",
            ClusterError::InvalidWorkerId { .. } => "cluster_invalid_worker_id",
            ClusterError::CurrentExe(_) => "cluster_current_exe",
            ClusterError::Transport(e) => e.as_label(),
            ClusterError::Closed => "cluster_closed",
        }
    }
}

/// # Errors produced by the envelope transport.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TransportError {
    /// Envelope could not be serialized.
    #[error("failed to encode envelope: {0}")]
    Encode(#[source] serde_json::Error),

    /// Inbound frame is not a valid envelope.
    #[error("malformed message: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The peer side of the link is gone.
    #[error("link closed")]
    Closed,

    /// I/O failure on the underlying pipe.
    #[error("transport io: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            TransportError::Encode(_) => "transport_encode",
            TransportError::Malformed(_) => "transport_malformed",
            TransportError::Closed => "transport_closed",
            TransportError::Io(_) => "transport_io",
        }
    }
}

/// # Errors reported by shutdown tasks and the exit hook.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The task reported failure through its completion handle.
    #[error("task failed: {error}")]
    Fail {
        /// Failure message.
        error: String,
    },

    /// The task panicked before signalling completion.
    #[error("task panicked: {info}")]
    Panicked {
        /// Panic payload, if it was a string.
        info: String,
    },

    /// The completion handle was dropped without being signalled.
    #[error("task dropped its completion handle")]
    Abandoned,
}

impl TaskError {
    /// Convenience constructor for [`TaskError::Fail`].
    pub fn fail(error: impl fmt::Display) -> Self {
        TaskError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use procvisor::TaskError;
    ///
    /// assert_eq!(TaskError::Abandoned.as_label(), "task_abandoned");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Panicked { .. } => "task_panicked",
            TaskError::Abandoned => "task_abandoned",
        }
    }
}

/// Serialized error carried across the process boundary.
///
/// A worker never acts on a fatal error locally: it flattens it into this form and
/// forwards it to the master, which decides the exit code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    /// Top-level error message.
    pub message: String,
    /// Source chain, one cause per line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl RemoteError {
    /// Creates an error with a message and no stack.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
        }
    }

    /// Flattens any error and its `source()` chain.
    ///
    /// # Example
    /// ```
    /// use procvisor::RemoteError;
    ///
    /// let io = std::io::Error::other("disk full");
    /// let remote = RemoteError::from_error(&io);
    /// assert_eq!(remote.message, "disk full");
    /// assert!(remote.stack.is_none());
    /// ```
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut causes = Vec::new();
        let mut next = err.source();
        while let Some(cause) = next {
            causes.push(format!("caused by: {cause}"));
            next = cause.source();
        }
        Self {
            message: err.to_string(),
            stack: (!causes.is_empty()).then(|| causes.join("\n")),
        }
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
