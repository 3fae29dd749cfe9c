//! # Worker processes backed by `tokio::process`.
//!
//! [`ProcessSpawner`] re-executes a program (by default the current binary with the same
//! arguments) once per worker. The worker learns its identity from
//! [`WORKER_ID_ENV`] and talks to the master over its standard pipes:
//!
//! ```text
//! master ── Link ──► writer task ──► child stdin   (master → worker frames)
//! master ◄── Inbox ◄── reader task ◄── child stdout (worker → master frames)
//!                                      child stderr  inherited (logs)
//! master ◄── Inbox ◄── waiter task ◄── child.wait() / kill token
//! ```

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::Inbox;
use crate::error::ClusterError;
use crate::process::spawn::{Spawn, Spawned, WorkerExit};
use crate::process::WORKER_ID_ENV;
use crate::transport::{Link, WorkerId, codec};

/// Spawns workers as child OS processes.
#[derive(Clone, Debug)]
pub struct ProcessSpawner {
    program: PathBuf,
    args: Vec<OsString>,
    envs: Vec<(OsString, OsString)>,
}

impl ProcessSpawner {
    /// Spawner running `program` with no arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    /// Spawner re-executing the current binary with the current arguments.
    pub fn current_exe() -> Result<Self, ClusterError> {
        let program = std::env::current_exe().map_err(ClusterError::CurrentExe)?;
        Ok(Self {
            program,
            args: std::env::args_os().skip(1).collect(),
            envs: Vec::new(),
        })
    }

    /// Appends an argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Adds an environment variable for every worker.
    #[must_use]
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }
}

#[async_trait]
impl Spawn for ProcessSpawner {
    async fn spawn(&self, id: WorkerId, inbox: Inbox) -> Result<Spawned, ClusterError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k, v)))
            .env(WORKER_ID_ENV, id.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ClusterError::Spawn { id, source })?;

        let pid = child.id().ok_or(ClusterError::SpawnLost { id })?;
        let stdin = child.stdin.take().ok_or(ClusterError::MissingPipe {
            id,
            stream: "stdin",
        })?;
        let stdout = child.stdout.take().ok_or(ClusterError::MissingPipe {
            id,
            stream: "stdout",
        })?;

        let (link, outbound) = Link::channel();
        tokio::spawn(codec::write_frames(stdin, outbound));

        let frames = inbox.clone();
        tokio::spawn(async move {
            let read = codec::read_frames(stdout, |frame| frames.worker_frame(id, frame).is_ok());
            if let Err(err) = read.await {
                debug!(worker = %id, error = %err, "worker stdout closed with error");
            }
        });

        let kill = CancellationToken::new();
        tokio::spawn(watch_child(child, id, inbox, kill.clone()));

        Ok(Spawned::new(pid, link, kill))
    }
}

/// Waits for the child to end (killing it first if asked) and reports the exit.
async fn watch_child(mut child: Child, id: WorkerId, inbox: Inbox, kill: CancellationToken) {
    let status = tokio::select! {
        status = child.wait() => status,
        _ = kill.cancelled() => {
            if let Err(err) = child.start_kill() {
                warn!(worker = %id, error = %err, "failed to kill worker");
            }
            child.wait().await
        }
    };
    let exit = match status {
        Ok(status) => WorkerExit::from(status),
        Err(err) => {
            warn!(worker = %id, error = %err, "failed to reap worker");
            WorkerExit {
                code: None,
                signal: None,
            }
        }
    };
    let _ = inbox.worker_exited(id, exit);
}
